pub mod controller;
pub mod events;
pub mod id;
pub mod monitor;
pub mod policy;
pub mod store;

pub use controller::{SessionController, SessionError, SessionInfo, SessionPhase};
pub use events::{ExpiryReason, Subscription};
pub use policy::{SessionPolicy, SessionStatus};
pub use store::{DurableStore, MemoryStore, ProfileFragment, SessionRecord};
