use std::cell::Cell;
use std::rc::Rc;

use thiserror::Error;

use crate::session::events::{ExpiryReason, SessionEvents, Subscription};
use crate::session::id::generate_session_id;
use crate::session::policy::{remaining_minutes, SessionPolicy, SessionStatus};
use crate::session::store::{DurableStore, ProfileFragment, SessionRecord, SessionStore};
use crate::utils::clock::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Active,
    Warning,
    Expired,
    Invalidated,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("operation requires an active session (session is {phase:?})")]
    InvalidState { phase: SessionPhase },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: String,
    pub age_ms: i64,
    pub idle_ms: i64,
    pub remaining_absolute_ms: i64,
    pub remaining_idle_ms: i64,
}

/// Owns the session lifecycle: id creation and rotation, the periodic
/// validity check, and the lifecycle events consumed by the app shell.
///
/// The controller is tick-driven and never schedules anything itself; the
/// provider wires a timer to [`SessionController::check`] and the activity
/// monitor to [`SessionController::record_activity`]. All time flows through
/// the injected [`Clock`].
pub struct SessionController {
    clock: Rc<dyn Clock>,
    policy: SessionPolicy,
    store: SessionStore,
    phase: Cell<SessionPhase>,
    events: SessionEvents,
}

impl SessionController {
    /// Construct over a durable backend, restoring a persisted session when
    /// the policy still accepts it (bootstrap-if-valid).
    pub fn new(clock: Rc<dyn Clock>, backend: Rc<dyn DurableStore>, policy: SessionPolicy) -> Self {
        let store = SessionStore::new(backend);
        let phase = if store.restore(&policy, clock.now_ms()) {
            log::info!("session: restored persisted session");
            SessionPhase::Active
        } else {
            SessionPhase::Uninitialized
        };
        Self {
            clock,
            policy,
            store,
            phase: Cell::new(phase),
            events: SessionEvents::default(),
        }
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase.get()
    }

    pub fn session_id(&self) -> Option<String> {
        self.store.record().map(|r| r.session_id)
    }

    pub fn profile(&self) -> Option<ProfileFragment> {
        self.store.record().and_then(|r| r.profile)
    }

    /// Start a new session: fresh id, timestamps reset to now, persisted so
    /// sibling tabs pick it up. Valid from any phase; an expired or
    /// invalidated controller simply begins a new lifecycle.
    pub fn create(&self, profile: Option<ProfileFragment>) -> String {
        let now = self.clock.now_ms();
        let session_id = generate_session_id();
        self.store.start(SessionRecord {
            session_id: session_id.clone(),
            started_at: now,
            last_activity_at: now,
            profile,
        });
        self.phase.set(SessionPhase::Active);
        log::info!("session: created new session");
        session_id
    }

    /// Rotate the session id in place (fixation defense on authentication or
    /// privilege elevation). Timestamps and profile survive; consumers get a
    /// `regenerated` event carrying both ids so they can re-attach.
    pub fn regenerate(&self) -> Result<(String, String), SessionError> {
        if !self.is_running() {
            return Err(SessionError::InvalidState {
                phase: self.phase.get(),
            });
        }
        let new_id = generate_session_id();
        let old_id = self
            .store
            .replace_session_id(&new_id)
            .ok_or(SessionError::InvalidState {
                phase: self.phase.get(),
            })?;
        log::info!("session: rotated session id");
        self.events
            .regenerated
            .emit(&(old_id.clone(), new_id.clone()));
        Ok((old_id, new_id))
    }

    /// Replace the persisted profile fragment of the running session.
    pub fn set_profile(&self, profile: ProfileFragment) {
        if self.is_running() {
            self.store.set_profile(profile);
        }
    }

    /// User interaction observed in this tab. Bumps the shared activity
    /// timestamp, dismisses a pending warning, and notifies subscribers.
    pub fn record_activity(&self) {
        if !self.is_running() {
            return;
        }
        let now = self.clock.now_ms();
        if let Some((updated, previous)) = self.store.record_activity(now) {
            if self.phase.get() == SessionPhase::Warning {
                self.phase.set(SessionPhase::Active);
            }
            self.events.activity.emit(&(updated, previous));
        }
    }

    /// Explicit extension ("stay signed in"): counts as activity now.
    pub fn extend(&self) {
        self.record_activity();
    }

    /// Fold in activity another tab wrote to shared storage. Adoption counts
    /// as activity, so a pending warning clears and subscribers are told.
    pub fn sync_from_storage(&self) {
        if !self.is_running() {
            return;
        }
        if let Some(adopted) = self.store.sync_activity_from_storage() {
            if self.phase.get() == SessionPhase::Warning {
                self.phase.set(SessionPhase::Active);
            }
            self.events.activity.emit(&(adopted, adopted));
        }
    }

    /// Periodic validity check. Always re-reads the shared store first so the
    /// decision uses the freshest activity timestamp, local or cross-tab.
    pub fn check(&self) {
        if !self.is_running() {
            return;
        }
        self.sync_from_storage();

        let Some(record) = self.store.record() else {
            return;
        };
        let now = self.clock.now_ms();
        match self
            .policy
            .evaluate(record.started_at, record.last_activity_at, now)
        {
            SessionStatus::Valid => {
                self.phase.set(SessionPhase::Active);
            }
            SessionStatus::Warning { remaining_ms } => {
                if self.phase.get() == SessionPhase::Active {
                    self.phase.set(SessionPhase::Warning);
                    self.events.warning.emit(&remaining_minutes(remaining_ms));
                }
            }
            SessionStatus::IdleExpired => self.expire(ExpiryReason::IdleTimeout),
            SessionStatus::AbsoluteExpired => self.expire(ExpiryReason::AbsoluteTimeout),
        }
    }

    /// Explicit user-initiated termination (logout). Idempotent: the second
    /// call is a no-op.
    pub fn invalidate(&self) {
        match self.phase.get() {
            SessionPhase::Active | SessionPhase::Warning => {
                self.store.clear();
                self.phase.set(SessionPhase::Invalidated);
                log::info!("session: invalidated");
                self.events.invalidated.emit(&());
            }
            _ => {}
        }
    }

    pub fn is_valid(&self) -> bool {
        if !self.is_running() {
            return false;
        }
        let Some(record) = self.store.record() else {
            return false;
        };
        self.policy
            .is_alive(record.started_at, record.last_activity_at, self.clock.now_ms())
    }

    pub fn get_info(&self) -> Option<SessionInfo> {
        if !self.is_valid() {
            return None;
        }
        let record = self.store.record()?;
        let now = self.clock.now_ms();
        Some(SessionInfo {
            session_id: record.session_id,
            age_ms: now - record.started_at,
            idle_ms: now - record.last_activity_at,
            remaining_absolute_ms: self.policy.remaining_absolute_ms(record.started_at, now),
            remaining_idle_ms: self
                .policy
                .remaining_idle_ms(record.last_activity_at, now),
        })
    }

    pub fn on_activity(&self, handler: impl Fn(&(i64, i64)) + 'static) -> Subscription {
        self.events.activity.subscribe(handler)
    }

    pub fn on_warning(&self, handler: impl Fn(&i64) + 'static) -> Subscription {
        self.events.warning.subscribe(handler)
    }

    pub fn on_expired(&self, handler: impl Fn(&ExpiryReason) + 'static) -> Subscription {
        self.events.expired.subscribe(handler)
    }

    pub fn on_regenerated(&self, handler: impl Fn(&(String, String)) + 'static) -> Subscription {
        self.events.regenerated.subscribe(handler)
    }

    pub fn on_invalidated(&self, handler: impl Fn(&()) + 'static) -> Subscription {
        self.events.invalidated.subscribe(handler)
    }

    fn is_running(&self) -> bool {
        matches!(
            self.phase.get(),
            SessionPhase::Active | SessionPhase::Warning
        )
    }

    fn expire(&self, reason: ExpiryReason) {
        self.store.clear();
        self.phase.set(SessionPhase::Expired);
        log::info!("session: expired ({})", reason.as_str());
        self.events.expired.emit(&reason);
    }
}
