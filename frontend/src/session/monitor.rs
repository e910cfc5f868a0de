use std::cell::Cell;

/// Rolling-window gate for interaction bursts: at most one admitted event
/// per `interval_ms`, so continuous mouse movement does not hammer storage.
pub struct ActivityThrottle {
    interval_ms: i64,
    last: Cell<Option<i64>>,
}

impl ActivityThrottle {
    pub fn new(interval_ms: i64) -> Self {
        Self {
            interval_ms,
            last: Cell::new(None),
        }
    }

    pub fn admit(&self, now: i64) -> bool {
        match self.last.get() {
            Some(last) if now - last < self.interval_ms => false,
            _ => {
                self.last.set(Some(now));
                true
            }
        }
    }
}

/// Default throttle window for interaction events.
pub const ACTIVITY_THROTTLE_MS: i64 = 1_000;

/// Interaction signals observed at the document level, capture phase.
pub const ACTIVITY_EVENTS: [&str; 7] = [
    "mousedown",
    "mousemove",
    "keypress",
    "scroll",
    "touchstart",
    "click",
    "keydown",
];

#[cfg(target_arch = "wasm32")]
pub use wasm::ActivityMonitor;

#[cfg(target_arch = "wasm32")]
mod wasm {
    use std::rc::Rc;

    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::JsCast;

    use super::{ActivityThrottle, ACTIVITY_EVENTS, ACTIVITY_THROTTLE_MS};
    use crate::session::controller::SessionController;
    use crate::session::store::LAST_ACTIVITY_KEY;
    use crate::utils::clock::Clock;

    type EventClosure = Closure<dyn FnMut(web_sys::Event)>;

    /// Document/window listeners feeding the session controller. Every
    /// listener added in [`ActivityMonitor::attach`] is removed again in
    /// [`ActivityMonitor::detach`]; dropping the monitor detaches it.
    pub struct ActivityMonitor {
        document: web_sys::Document,
        window: web_sys::Window,
        interaction: Vec<(&'static str, EventClosure)>,
        visibility: Option<EventClosure>,
        storage: Option<Closure<dyn FnMut(web_sys::StorageEvent)>>,
    }

    impl ActivityMonitor {
        pub fn attach(
            controller: Rc<SessionController>,
            clock: Rc<dyn Clock>,
        ) -> Result<Self, String> {
            let window = web_sys::window().ok_or("no window")?;
            let document = window.document().ok_or("no document")?;

            let throttle = Rc::new(ActivityThrottle::new(ACTIVITY_THROTTLE_MS));
            let mut interaction = Vec::with_capacity(ACTIVITY_EVENTS.len());
            for event in ACTIVITY_EVENTS {
                let controller = Rc::clone(&controller);
                let clock = Rc::clone(&clock);
                let throttle = Rc::clone(&throttle);
                let closure: EventClosure = Closure::wrap(Box::new(move |_| {
                    if throttle.admit(clock.now_ms()) {
                        controller.record_activity();
                    }
                }));
                document
                    .add_event_listener_with_callback_and_bool(
                        event,
                        closure.as_ref().unchecked_ref(),
                        true,
                    )
                    .map_err(|_| format!("failed to listen for {event}"))?;
                interaction.push((event, closure));
            }

            // Becoming visible again counts as activity, unthrottled.
            let visibility: EventClosure = {
                let controller = Rc::clone(&controller);
                let document = document.clone();
                Closure::wrap(Box::new(move |_| {
                    if !document.hidden() {
                        controller.record_activity();
                    }
                }))
            };
            document
                .add_event_listener_with_callback(
                    "visibilitychange",
                    visibility.as_ref().unchecked_ref(),
                )
                .map_err(|_| "failed to listen for visibilitychange".to_string())?;

            // Another tab touching the shared activity key is folded in
            // immediately rather than waiting for the next check tick.
            let storage: Closure<dyn FnMut(web_sys::StorageEvent)> = {
                let controller = Rc::clone(&controller);
                Closure::wrap(Box::new(move |event: web_sys::StorageEvent| {
                    if event.key().as_deref() == Some(LAST_ACTIVITY_KEY) {
                        controller.sync_from_storage();
                    }
                }))
            };
            window
                .add_event_listener_with_callback("storage", storage.as_ref().unchecked_ref())
                .map_err(|_| "failed to listen for storage".to_string())?;

            Ok(Self {
                document,
                window,
                interaction,
                visibility: Some(visibility),
                storage: Some(storage),
            })
        }

        /// Remove every listener registered by [`Self::attach`]. Safe to call
        /// more than once.
        pub fn detach(&mut self) {
            for (event, closure) in self.interaction.drain(..) {
                let _ = self.document.remove_event_listener_with_callback_and_bool(
                    event,
                    closure.as_ref().unchecked_ref(),
                    true,
                );
            }
            if let Some(closure) = self.visibility.take() {
                let _ = self.document.remove_event_listener_with_callback(
                    "visibilitychange",
                    closure.as_ref().unchecked_ref(),
                );
            }
            if let Some(closure) = self.storage.take() {
                let _ = self
                    .window
                    .remove_event_listener_with_callback("storage", closure.as_ref().unchecked_ref());
            }
        }
    }

    impl Drop for ActivityMonitor {
        fn drop(&mut self) {
            self.detach();
        }
    }
}
