use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::types::UserRole;
use crate::session::policy::SessionPolicy;

pub const SESSION_ID_KEY: &str = "sessionId";
pub const SESSION_START_KEY: &str = "sessionStartTime";
pub const LAST_ACTIVITY_KEY: &str = "lastActivityTime";
pub const SESSION_DATA_KEY: &str = "sessionData";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Durable key/value storage shared by every tab of the same origin.
/// The browser binding is [`LocalStorageStore`]; tests and host builds use
/// [`MemoryStore`].
pub trait DurableStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<String, String>>,
}

impl DurableStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.borrow_mut().insert(key.into(), value.into());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
pub struct LocalStorageStore;

#[cfg(target_arch = "wasm32")]
impl LocalStorageStore {
    fn storage(&self) -> Result<web_sys::Storage, StoreError> {
        crate::utils::storage::local_storage()
            .ok_or_else(|| StoreError::Unavailable("localStorage disabled".into()))
    }
}

#[cfg(target_arch = "wasm32")]
impl DurableStore for LocalStorageStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.storage()?
            .get_item(key)
            .map_err(|_| StoreError::Unavailable(format!("get {key}")))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.storage()?
            .set_item(key, value)
            .map_err(|_| StoreError::Unavailable(format!("set {key}")))
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.storage()?
            .remove_item(key)
            .map_err(|_| StoreError::Unavailable(format!("remove {key}")))
    }
}

/// Sanitized identity slice persisted next to the session. Never holds
/// credentials or tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileFragment {
    pub id: String,
    pub email: String,
    pub role: UserRole,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub session_id: String,
    pub started_at: i64,
    pub last_activity_at: i64,
    pub profile: Option<ProfileFragment>,
}

/// In-memory mirror of the persisted session plus write-through persistence.
///
/// The durable backend is optional at runtime: the first failing storage
/// operation drops it and the store keeps tracking the session for this tab
/// only. Timestamps round-trip through storage as decimal millisecond
/// strings, so concurrent tabs converge by taking the maximum.
pub struct SessionStore {
    backend: RefCell<Option<Rc<dyn DurableStore>>>,
    record: RefCell<Option<SessionRecord>>,
}

impl SessionStore {
    pub fn new(backend: Rc<dyn DurableStore>) -> Self {
        Self {
            backend: RefCell::new(Some(backend)),
            record: RefCell::new(None),
        }
    }

    /// Tab-local store with no durable backing at all.
    pub fn detached() -> Self {
        Self {
            backend: RefCell::new(None),
            record: RefCell::new(None),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.backend.borrow().is_none()
    }

    pub fn record(&self) -> Option<SessionRecord> {
        self.record.borrow().clone()
    }

    /// Load the persisted session, adopt it when the policy still accepts it
    /// (extending silently: restoration itself counts as activity), and fail
    /// closed otherwise by clearing every key.
    pub fn restore(&self, policy: &SessionPolicy, now: i64) -> bool {
        let session_id = self.read(SESSION_ID_KEY);
        let started_at = self.read(SESSION_START_KEY).and_then(|v| v.parse().ok());

        let (session_id, started_at) = match (session_id, started_at) {
            (Some(id), Some(started)) => (id, started),
            _ => return false,
        };

        let last_activity_at = self
            .read(LAST_ACTIVITY_KEY)
            .and_then(|v| v.parse().ok())
            .unwrap_or(now);

        if !policy.is_alive(started_at, last_activity_at, now) {
            log::info!("session: persisted session expired, clearing");
            self.clear();
            return false;
        }

        let profile = self
            .read(SESSION_DATA_KEY)
            .and_then(|raw| serde_json::from_str(&raw).ok());

        *self.record.borrow_mut() = Some(SessionRecord {
            session_id,
            started_at,
            last_activity_at: last_activity_at.max(now),
            profile,
        });
        self.write(LAST_ACTIVITY_KEY, &now.to_string());
        true
    }

    /// Install a freshly created session and persist all four keys.
    pub fn start(&self, record: SessionRecord) {
        self.write(SESSION_ID_KEY, &record.session_id);
        self.write(SESSION_START_KEY, &record.started_at.to_string());
        self.write(LAST_ACTIVITY_KEY, &record.last_activity_at.to_string());
        match &record.profile {
            Some(profile) => self.write_profile(profile),
            None => self.remove(SESSION_DATA_KEY),
        }
        *self.record.borrow_mut() = Some(record);
    }

    /// Bump the activity timestamp, monotonically, and write it through so
    /// other tabs observe it. Returns `(new, previous)` when a session
    /// exists.
    pub fn record_activity(&self, now: i64) -> Option<(i64, i64)> {
        let mut record = self.record.borrow_mut();
        let record = record.as_mut()?;
        let previous = record.last_activity_at;
        record.last_activity_at = previous.max(now);
        let updated = record.last_activity_at;
        drop(record);
        self.write(LAST_ACTIVITY_KEY, &updated.to_string());
        Some((updated, previous))
    }

    /// Adopt a more recent activity timestamp written by another tab.
    /// Returns the adopted value when the stored one was newer.
    pub fn sync_activity_from_storage(&self) -> Option<i64> {
        let stored: i64 = self.read(LAST_ACTIVITY_KEY)?.parse().ok()?;
        let mut record = self.record.borrow_mut();
        let record = record.as_mut()?;
        if stored > record.last_activity_at {
            record.last_activity_at = stored;
            Some(stored)
        } else {
            None
        }
    }

    /// Swap in a new session id, preserving timestamps and profile.
    /// Returns the replaced id.
    pub fn replace_session_id(&self, new_id: &str) -> Option<String> {
        let mut record = self.record.borrow_mut();
        let record = record.as_mut()?;
        let old = std::mem::replace(&mut record.session_id, new_id.to_string());
        drop(record);
        self.write(SESSION_ID_KEY, new_id);
        Some(old)
    }

    pub fn set_profile(&self, profile: ProfileFragment) {
        let mut record = self.record.borrow_mut();
        if let Some(record) = record.as_mut() {
            record.profile = Some(profile.clone());
            drop(record);
            self.write_profile(&profile);
        }
    }

    /// Drop the mirror and every persisted key.
    pub fn clear(&self) {
        *self.record.borrow_mut() = None;
        for key in [
            SESSION_ID_KEY,
            SESSION_START_KEY,
            LAST_ACTIVITY_KEY,
            SESSION_DATA_KEY,
        ] {
            self.remove(key);
        }
    }

    fn write_profile(&self, profile: &ProfileFragment) {
        match serde_json::to_string(profile) {
            Ok(json) => self.write(SESSION_DATA_KEY, &json),
            Err(err) => log::warn!("session: failed to serialize profile: {err}"),
        }
    }

    fn read(&self, key: &str) -> Option<String> {
        let backend = self.backend.borrow().clone()?;
        match backend.get(key) {
            Ok(value) => value,
            Err(err) => {
                self.degrade(&err);
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) {
        let Some(backend) = self.backend.borrow().clone() else {
            return;
        };
        if let Err(err) = backend.set(key, value) {
            self.degrade(&err);
        }
    }

    fn remove(&self, key: &str) {
        let Some(backend) = self.backend.borrow().clone() else {
            return;
        };
        if let Err(err) = backend.remove(key) {
            self.degrade(&err);
        }
    }

    fn degrade(&self, err: &StoreError) {
        log::warn!("session: {err}; continuing with memory-only tracking");
        *self.backend.borrow_mut() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, started_at: i64) -> SessionRecord {
        SessionRecord {
            session_id: id.into(),
            started_at,
            last_activity_at: started_at,
            profile: None,
        }
    }

    #[test]
    fn start_persists_all_keys() {
        let backend = Rc::new(MemoryStore::default());
        let store = SessionStore::new(Rc::clone(&backend) as Rc<dyn DurableStore>);
        store.start(SessionRecord {
            profile: Some(ProfileFragment {
                id: "u1".into(),
                email: "a@example.com".into(),
                role: UserRole::Customer,
                display_name: "A".into(),
            }),
            ..record("sid-1", 1_000)
        });

        assert_eq!(backend.get(SESSION_ID_KEY).unwrap().as_deref(), Some("sid-1"));
        assert_eq!(backend.get(SESSION_START_KEY).unwrap().as_deref(), Some("1000"));
        assert_eq!(backend.get(LAST_ACTIVITY_KEY).unwrap().as_deref(), Some("1000"));
        assert!(backend.get(SESSION_DATA_KEY).unwrap().is_some());
    }

    #[test]
    fn restore_adopts_valid_session_and_extends() {
        let backend = Rc::new(MemoryStore::default());
        {
            let store = SessionStore::new(Rc::clone(&backend) as Rc<dyn DurableStore>);
            store.start(record("sid-1", 1_000));
        }

        let store = SessionStore::new(Rc::clone(&backend) as Rc<dyn DurableStore>);
        let now = 5_000;
        assert!(store.restore(&SessionPolicy::default(), now));
        let restored = store.record().unwrap();
        assert_eq!(restored.session_id, "sid-1");
        assert_eq!(restored.started_at, 1_000);
        assert_eq!(restored.last_activity_at, now);
        assert_eq!(
            backend.get(LAST_ACTIVITY_KEY).unwrap().as_deref(),
            Some("5000")
        );
    }

    #[test]
    fn restore_fails_closed_on_expired_session() {
        let backend = Rc::new(MemoryStore::default());
        {
            let store = SessionStore::new(Rc::clone(&backend) as Rc<dyn DurableStore>);
            store.start(record("sid-1", 0));
        }

        let store = SessionStore::new(Rc::clone(&backend) as Rc<dyn DurableStore>);
        let past_idle = SessionPolicy::default().idle_timeout_ms + 1;
        assert!(!store.restore(&SessionPolicy::default(), past_idle));
        assert!(store.record().is_none());
        assert!(backend.get(SESSION_ID_KEY).unwrap().is_none());
        assert!(backend.get(SESSION_START_KEY).unwrap().is_none());
    }

    #[test]
    fn restore_without_persisted_session_is_false() {
        let store = SessionStore::new(Rc::new(MemoryStore::default()));
        assert!(!store.restore(&SessionPolicy::default(), 0));
    }

    #[test]
    fn activity_is_monotonic_and_written_through() {
        let backend = Rc::new(MemoryStore::default());
        let store = SessionStore::new(Rc::clone(&backend) as Rc<dyn DurableStore>);
        store.start(record("sid-1", 1_000));

        assert_eq!(store.record_activity(4_000), Some((4_000, 1_000)));
        // A clock hiccup backwards must not regress the timestamp.
        assert_eq!(store.record_activity(3_000), Some((4_000, 4_000)));
        assert_eq!(
            backend.get(LAST_ACTIVITY_KEY).unwrap().as_deref(),
            Some("4000")
        );
    }

    #[test]
    fn cross_tab_activity_converges_on_max() {
        let backend = Rc::new(MemoryStore::default());
        let tab_a = SessionStore::new(Rc::clone(&backend) as Rc<dyn DurableStore>);
        let tab_b = SessionStore::new(Rc::clone(&backend) as Rc<dyn DurableStore>);

        tab_a.start(record("sid-1", 1_000));
        assert!(tab_b.restore(&SessionPolicy::default(), 1_500));

        // Tab A records activity; tab B observes at least that timestamp.
        tab_a.record_activity(9_000);
        assert_eq!(tab_b.sync_activity_from_storage(), Some(9_000));
        assert!(tab_b.record().unwrap().last_activity_at >= 9_000);

        // Older stored value is not adopted.
        assert_eq!(tab_b.sync_activity_from_storage(), None);
    }

    #[test]
    fn replace_session_id_keeps_timestamps() {
        let store = SessionStore::new(Rc::new(MemoryStore::default()));
        store.start(record("old-id", 1_000));
        store.record_activity(2_000);

        assert_eq!(store.replace_session_id("new-id").as_deref(), Some("old-id"));
        let record = store.record().unwrap();
        assert_eq!(record.session_id, "new-id");
        assert_eq!(record.started_at, 1_000);
        assert_eq!(record.last_activity_at, 2_000);
    }

    #[test]
    fn clear_removes_mirror_and_keys() {
        let backend = Rc::new(MemoryStore::default());
        let store = SessionStore::new(Rc::clone(&backend) as Rc<dyn DurableStore>);
        store.start(record("sid-1", 1_000));
        store.clear();

        assert!(store.record().is_none());
        for key in [
            SESSION_ID_KEY,
            SESSION_START_KEY,
            LAST_ACTIVITY_KEY,
            SESSION_DATA_KEY,
        ] {
            assert!(backend.get(key).unwrap().is_none(), "{key} not cleared");
        }
    }

    struct BrokenStore;

    impl DurableStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("quota".into()))
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("quota".into()))
        }
        fn remove(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("quota".into()))
        }
    }

    #[test]
    fn storage_failure_degrades_to_memory_only() {
        let store = SessionStore::new(Rc::new(BrokenStore));
        store.start(record("sid-1", 1_000));

        assert!(store.is_degraded());
        // The tab keeps tracking its own session.
        assert_eq!(store.record().unwrap().session_id, "sid-1");
        assert_eq!(store.record_activity(2_000), Some((2_000, 1_000)));
        assert_eq!(store.sync_activity_from_storage(), None);
    }
}
