use leptos::*;
use std::rc::Rc;

use crate::session::{
    DurableStore, ExpiryReason, ProfileFragment, SessionController, SessionError, SessionInfo,
    SessionPolicy,
};
use crate::utils::clock::{Clock, SystemClock};

#[cfg(target_arch = "wasm32")]
use crate::session::monitor::ActivityMonitor;
#[cfg(target_arch = "wasm32")]
use gloo_timers::callback::{Interval, Timeout};
#[cfg(target_arch = "wasm32")]
use std::cell::RefCell;

/// Timers and listeners owned by the provider on wasm. Dropping a handle
/// cancels it, so `stop` is a plain `take` of everything.
#[cfg(target_arch = "wasm32")]
#[derive(Default)]
struct SessionRuntime {
    monitor: Option<ActivityMonitor>,
    check_timer: Option<Interval>,
    absolute_timer: Option<Timeout>,
}

#[cfg(target_arch = "wasm32")]
impl SessionRuntime {
    fn stop(&mut self) {
        self.monitor.take();
        self.check_timer.take();
        self.absolute_timer.take();
    }
}

/// The session subsystem as the rest of the app sees it: the controller
/// plus reactive views of the warning and expiry events.
#[derive(Clone)]
pub struct SessionHandle {
    pub controller: Rc<SessionController>,
    /// `Some(minutes)` while an expiry warning is pending.
    pub warning_minutes: RwSignal<Option<i64>>,
    /// Set once when the session expires, with the reason.
    pub expired: RwSignal<Option<ExpiryReason>>,
    #[cfg(target_arch = "wasm32")]
    runtime: Rc<RefCell<SessionRuntime>>,
}

impl SessionHandle {
    /// Start a fresh session (on login) and make sure monitoring runs.
    pub fn begin(&self, profile: Option<ProfileFragment>) -> String {
        let id = self.controller.create(profile);
        self.warning_minutes.set(None);
        self.expired.set(None);
        #[cfg(target_arch = "wasm32")]
        self.ensure_monitoring();
        id
    }

    /// Rotate the session id in place (re-authentication over a live
    /// session).
    pub fn rotate(&self) -> Result<(String, String), SessionError> {
        self.controller.regenerate()
    }

    /// Explicit logout.
    pub fn end(&self) {
        self.controller.invalidate();
        self.warning_minutes.set(None);
    }

    /// "Stay signed in" on the warning banner.
    pub fn stay_signed_in(&self) {
        self.controller.extend();
    }

    pub fn is_valid(&self) -> bool {
        self.controller.is_valid()
    }

    pub fn info(&self) -> Option<SessionInfo> {
        self.controller.get_info()
    }

    #[cfg(target_arch = "wasm32")]
    fn ensure_monitoring(&self) {
        let mut runtime = self.runtime.borrow_mut();
        if runtime.monitor.is_none() {
            let clock: Rc<dyn Clock> = Rc::new(SystemClock);
            match ActivityMonitor::attach(Rc::clone(&self.controller), clock) {
                Ok(monitor) => runtime.monitor = Some(monitor),
                Err(err) => log::warn!("session: activity monitor unavailable: {err}"),
            }
        }
        if runtime.check_timer.is_none() {
            let controller = Rc::clone(&self.controller);
            runtime.check_timer = Some(Interval::new(
                self.controller.policy().check_interval_ms,
                move || controller.check(),
            ));
        }
        // One-shot at the absolute deadline, clear-before-set.
        runtime.absolute_timer.take();
        if let Some(info) = self.controller.get_info() {
            let controller = Rc::clone(&self.controller);
            let delay = info.remaining_absolute_ms.clamp(0, u32::MAX as i64) as u32;
            runtime.absolute_timer = Some(Timeout::new(delay, move || controller.check()));
        }
    }
}

fn storage_backend() -> Rc<dyn DurableStore> {
    #[cfg(target_arch = "wasm32")]
    {
        Rc::new(crate::session::store::LocalStorageStore)
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        Rc::new(crate::session::MemoryStore::default())
    }
}

pub fn provide_session() -> SessionHandle {
    let clock: Rc<dyn Clock> = Rc::new(SystemClock);
    let controller = Rc::new(SessionController::new(
        Rc::clone(&clock),
        storage_backend(),
        SessionPolicy::default(),
    ));

    let handle = SessionHandle {
        controller,
        warning_minutes: create_rw_signal(None),
        expired: create_rw_signal(None),
        #[cfg(target_arch = "wasm32")]
        runtime: Rc::new(RefCell::new(SessionRuntime::default())),
    };

    wire_events(&handle);
    #[cfg(target_arch = "wasm32")]
    handle.ensure_monitoring();

    provide_context(handle.clone());
    handle
}

fn wire_events(handle: &SessionHandle) {
    let warning = handle.warning_minutes;
    let _ = handle.controller.on_warning(move |minutes| {
        warning.set(Some(*minutes));
        #[cfg(target_arch = "wasm32")]
        notify_expiring(*minutes);
    });

    // Any activity, local or cross-tab, dismisses the pending warning.
    let warning = handle.warning_minutes;
    let _ = handle.controller.on_activity(move |_| {
        if warning.get_untracked().is_some() {
            warning.set(None);
        }
    });

    let warning = handle.warning_minutes;
    let expired = handle.expired;
    let _ = handle.controller.on_expired(move |reason| {
        warning.set(None);
        expired.set(Some(*reason));
        #[cfg(target_arch = "wasm32")]
        {
            crate::api::client::clear_stored_auth();
            redirect_to_login();
        }
    });

    let warning = handle.warning_minutes;
    let _ = handle.controller.on_invalidated(move |_| warning.set(None));

    #[cfg(target_arch = "wasm32")]
    {
        // Deferred so a timer is never dropped from inside its own tick.
        let runtime = Rc::clone(&handle.runtime);
        let _ = handle.controller.on_expired(move |_| {
            let runtime = Rc::clone(&runtime);
            Timeout::new(0, move || runtime.borrow_mut().stop()).forget();
        });
        let runtime = Rc::clone(&handle.runtime);
        let _ = handle.controller.on_invalidated(move |_| {
            let runtime = Rc::clone(&runtime);
            Timeout::new(0, move || runtime.borrow_mut().stop()).forget();
        });
    }
}

#[cfg(target_arch = "wasm32")]
fn notify_expiring(minutes: i64) {
    use web_sys::{Notification, NotificationOptions, NotificationPermission};
    if Notification::permission() != NotificationPermission::Granted {
        return;
    }
    let options = NotificationOptions::new();
    options.set_body(&format!(
        "Your session will expire in {minutes} minutes due to inactivity."
    ));
    options.set_tag("session-warning");
    options.set_icon("/favicon.ico");
    let _ = Notification::new_with_options("Session expiring", &options);
}

#[cfg(target_arch = "wasm32")]
fn redirect_to_login() {
    if let Some(window) = web_sys::window() {
        let location = window.location();
        if let Ok(pathname) = location.pathname() {
            if pathname == "/login" {
                return;
            }
        }
        let _ = location.set_href("/login");
    }
}

pub fn use_session() -> SessionHandle {
    match use_context::<SessionHandle>() {
        Some(handle) => handle,
        None => provide_session(),
    }
}

#[component]
pub fn SessionProvider(children: Children) -> impl IntoView {
    provide_session();
    view! { <>{children()}</> }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::with_runtime;

    #[test]
    fn use_session_constructs_a_handle_without_context() {
        with_runtime(|| {
            let handle = use_session();
            assert!(!handle.is_valid());
            assert!(handle.warning_minutes.get_untracked().is_none());
        });
    }

    #[test]
    fn begin_makes_the_session_valid_and_end_tears_it_down() {
        with_runtime(|| {
            let handle = use_session();
            let id = handle.begin(None);
            assert!(handle.is_valid());
            assert_eq!(handle.info().unwrap().session_id, id);

            handle.end();
            assert!(!handle.is_valid());
            assert!(handle.info().is_none());
        });
    }

    #[test]
    fn rotate_requires_a_running_session() {
        with_runtime(|| {
            let handle = use_session();
            assert!(handle.rotate().is_err());

            let first = handle.begin(None);
            let (old, new) = handle.rotate().unwrap();
            assert_eq!(old, first);
            assert_ne!(new, first);
        });
    }

    #[test]
    fn warning_signal_clears_on_activity() {
        with_runtime(|| {
            let handle = use_session();
            handle.begin(None);
            handle.warning_minutes.set(Some(5));
            handle.stay_signed_in();
            assert!(handle.warning_minutes.get_untracked().is_none());
        });
    }
}
