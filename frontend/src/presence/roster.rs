use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::api::types::UserRole;
use crate::presence::protocol::ServerMessage;

#[derive(Debug, Clone, PartialEq)]
pub struct PresenceRecord {
    pub user_id: String,
    pub user_type: UserRole,
    pub shop_id: Option<String>,
    pub last_event_at: DateTime<Utc>,
}

/// Live view of who is online plus when absent users were last seen.
///
/// A user is either in the online set or not; going offline records a
/// last-seen timestamp, coming back online leaves that history in place
/// until the next offline transition overwrites it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresenceRoster {
    online: HashMap<String, PresenceRecord>,
    last_seen: HashMap<String, DateTime<Utc>>,
}

impl PresenceRoster {
    /// Fold one server message into the roster. Non-presence messages
    /// (auth results, heartbeat acks, unknown tags) are no-ops.
    pub fn apply(&mut self, message: &ServerMessage) {
        match message {
            ServerMessage::UserOnline {
                user_id,
                user_type,
                shop_id,
                timestamp,
            } => {
                self.online.insert(
                    user_id.clone(),
                    PresenceRecord {
                        user_id: user_id.clone(),
                        user_type: *user_type,
                        shop_id: shop_id.clone(),
                        last_event_at: *timestamp,
                    },
                );
            }
            ServerMessage::UserOffline { user_id, last_seen } => {
                self.online.remove(user_id);
                self.last_seen.insert(user_id.clone(), *last_seen);
            }
            ServerMessage::BulkStatusUpdate {
                online_users,
                last_seen,
            } => {
                // A snapshot replaces both maps wholesale; merging would let
                // entries the server no longer reports linger as stale.
                self.online = online_users
                    .iter()
                    .map(|user| {
                        (
                            user.user_id.clone(),
                            PresenceRecord {
                                user_id: user.user_id.clone(),
                                user_type: user.user_type,
                                shop_id: user.shop_id.clone(),
                                last_event_at: user.timestamp,
                            },
                        )
                    })
                    .collect();
                self.last_seen = last_seen
                    .iter()
                    .map(|entry| (entry.user_id.clone(), entry.last_seen))
                    .collect();
            }
            ServerMessage::AuthenticationSuccess
            | ServerMessage::AuthenticationFailed
            | ServerMessage::HeartbeatAck
            | ServerMessage::Unknown => {}
        }
    }

    pub fn is_user_online(&self, user_id: &str) -> bool {
        self.online.contains_key(user_id)
    }

    /// A shop is online while any connected shop-owner belongs to it.
    pub fn is_shop_online(&self, shop_id: &str) -> bool {
        self.online.values().any(|record| {
            record.user_type == UserRole::ShopOwner && record.shop_id.as_deref() == Some(shop_id)
        })
    }

    pub fn last_seen(&self, user_id: &str) -> Option<DateTime<Utc>> {
        self.last_seen.get(user_id).copied()
    }

    pub fn online_count(&self) -> usize {
        self.online.len()
    }

    pub fn format_last_seen(&self, user_id: &str, now: DateTime<Utc>) -> String {
        match self.last_seen(user_id) {
            Some(at) => format_relative(at, now),
            None => "Never".to_string(),
        }
    }
}

/// Relative wording for a past timestamp: "Just now" under a minute, then
/// minutes, hours, days, and a literal date once it is a week or more ago.
pub fn format_relative(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - then).num_minutes();
    if minutes < 1 {
        return "Just now".to_string();
    }
    if minutes < 60 {
        return format!("{} minute{} ago", minutes, plural(minutes));
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{} hour{} ago", hours, plural(hours));
    }
    let days = hours / 24;
    if days < 7 {
        return format!("{} day{} ago", days, plural(days));
    }
    then.date_naive().format("%Y-%m-%d").to_string()
}

fn plural(n: i64) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// What a shop card shows for its owner: the online flag and the text next
/// to the indicator dot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopStatus {
    pub online: bool,
    pub display: String,
}

pub fn shop_status_display(
    roster: &PresenceRoster,
    shop_id: &str,
    owner_id: &str,
    now: DateTime<Utc>,
) -> ShopStatus {
    if roster.is_shop_online(shop_id) || roster.is_user_online(owner_id) {
        return ShopStatus {
            online: true,
            display: "Online".to_string(),
        };
    }
    let last_seen = roster.format_last_seen(owner_id, now);
    ShopStatus {
        online: false,
        display: if last_seen == "Never" {
            "Offline".to_string()
        } else {
            format!("Last seen {last_seen}")
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::protocol::{LastSeenEntry, OnlineUser};
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_750_000_000 + secs, 0).unwrap()
    }

    fn online(user_id: &str, user_type: UserRole, shop_id: Option<&str>) -> ServerMessage {
        ServerMessage::UserOnline {
            user_id: user_id.into(),
            user_type,
            shop_id: shop_id.map(Into::into),
            timestamp: at(0),
        }
    }

    #[test]
    fn online_and_offline_transitions() {
        let mut roster = PresenceRoster::default();
        roster.apply(&online("u1", UserRole::Customer, None));
        assert!(roster.is_user_online("u1"));

        roster.apply(&ServerMessage::UserOffline {
            user_id: "u1".into(),
            last_seen: at(100),
        });
        assert!(!roster.is_user_online("u1"));
        assert_eq!(roster.last_seen("u1"), Some(at(100)));

        // Coming back online keeps the recorded history.
        roster.apply(&online("u1", UserRole::Customer, None));
        assert!(roster.is_user_online("u1"));
        assert_eq!(roster.last_seen("u1"), Some(at(100)));
    }

    #[test]
    fn bulk_update_replaces_the_online_set() {
        let mut roster = PresenceRoster::default();
        roster.apply(&online("a", UserRole::Customer, None));
        roster.apply(&online("b", UserRole::ShopOwner, Some("s1")));
        assert_eq!(roster.online_count(), 2);

        roster.apply(&ServerMessage::BulkStatusUpdate {
            online_users: vec![OnlineUser {
                user_id: "c".into(),
                user_type: UserRole::Customer,
                shop_id: None,
                timestamp: at(10),
            }],
            last_seen: vec![LastSeenEntry {
                user_id: "a".into(),
                last_seen: at(5),
            }],
        });

        assert_eq!(roster.online_count(), 1);
        assert!(roster.is_user_online("c"));
        assert!(!roster.is_user_online("a"));
        assert!(!roster.is_user_online("b"));
        assert_eq!(roster.last_seen("a"), Some(at(5)));
    }

    #[test]
    fn shop_is_online_only_through_its_owner() {
        let mut roster = PresenceRoster::default();
        roster.apply(&online("owner", UserRole::ShopOwner, Some("s1")));
        roster.apply(&online("visitor", UserRole::Customer, Some("s2")));

        assert!(roster.is_shop_online("s1"));
        // A customer tagged with a shop id does not put the shop online.
        assert!(!roster.is_shop_online("s2"));
        assert!(!roster.is_shop_online("s3"));
    }

    #[test]
    fn non_presence_messages_are_ignored() {
        let mut roster = PresenceRoster::default();
        roster.apply(&online("u1", UserRole::Customer, None));
        let before = roster.clone();

        roster.apply(&ServerMessage::AuthenticationSuccess);
        roster.apply(&ServerMessage::HeartbeatAck);
        roster.apply(&ServerMessage::Unknown);
        assert_eq!(roster, before);
    }

    #[test]
    fn relative_formatting_buckets() {
        let now = at(0);
        assert_eq!(format_relative(now - chrono::Duration::seconds(45), now), "Just now");
        assert_eq!(
            format_relative(now - chrono::Duration::minutes(1), now),
            "1 minute ago"
        );
        assert_eq!(
            format_relative(now - chrono::Duration::minutes(45), now),
            "45 minutes ago"
        );
        assert_eq!(
            format_relative(now - chrono::Duration::minutes(90), now),
            "1 hour ago"
        );
        assert_eq!(
            format_relative(now - chrono::Duration::hours(26), now),
            "1 day ago"
        );
        assert_eq!(
            format_relative(now - chrono::Duration::days(6), now),
            "6 days ago"
        );
        let ten_days_back = now - chrono::Duration::days(10);
        assert_eq!(
            format_relative(ten_days_back, now),
            ten_days_back.date_naive().format("%Y-%m-%d").to_string()
        );
    }

    #[test]
    fn unknown_user_formats_as_never() {
        let roster = PresenceRoster::default();
        assert_eq!(roster.format_last_seen("ghost", at(0)), "Never");
    }

    #[test]
    fn shop_status_summarizes_owner_presence() {
        let mut roster = PresenceRoster::default();
        roster.apply(&online("owner", UserRole::ShopOwner, Some("s1")));
        let status = shop_status_display(&roster, "s1", "owner", at(0));
        assert!(status.online);
        assert_eq!(status.display, "Online");

        roster.apply(&ServerMessage::UserOffline {
            user_id: "owner".into(),
            last_seen: at(0),
        });
        let status = shop_status_display(&roster, "s1", "owner", at(120));
        assert!(!status.online);
        assert_eq!(status.display, "Last seen 2 minutes ago");

        let status = shop_status_display(&roster, "s2", "stranger", at(0));
        assert_eq!(status.display, "Offline");
    }
}
