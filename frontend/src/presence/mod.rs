pub mod channel;
pub mod protocol;
pub mod roster;
pub mod socket;

pub use channel::{ChannelCore, ConnectionState, Disposition, ReconnectPolicy};
pub use protocol::{ClientMessage, ServerMessage};
pub use roster::{shop_status_display, PresenceRoster, ShopStatus};
pub use socket::{PresenceIdentity, PresenceSocket};
