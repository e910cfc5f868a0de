use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::types::UserRole;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed presence message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Messages the client writes to the presence endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Authenticate {
        user_id: String,
        user_type: UserRole,
        access_token: String,
    },
    Heartbeat {
        user_id: String,
        timestamp: String,
    },
}

impl ClientMessage {
    pub fn encode(&self) -> String {
        // Serialization of these enums cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OnlineUser {
    pub user_id: String,
    pub user_type: UserRole,
    #[serde(default)]
    pub shop_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LastSeenEntry {
    pub user_id: String,
    pub last_seen: DateTime<Utc>,
}

/// Messages the presence endpoint pushes to the client, tagged on `type`.
/// Unrecognized tags land on `Unknown` so new server message kinds never
/// break the channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    UserOnline {
        user_id: String,
        user_type: UserRole,
        #[serde(default)]
        shop_id: Option<String>,
        timestamp: DateTime<Utc>,
    },
    UserOffline {
        user_id: String,
        last_seen: DateTime<Utc>,
    },
    BulkStatusUpdate {
        online_users: Vec<OnlineUser>,
        last_seen: Vec<LastSeenEntry>,
    },
    AuthenticationSuccess,
    AuthenticationFailed,
    HeartbeatAck,
    #[serde(other)]
    Unknown,
}

pub fn parse_server_message(raw: &str) -> Result<ServerMessage, ProtocolError> {
    Ok(serde_json::from_str(raw)?)
}
