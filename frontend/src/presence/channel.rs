use crate::presence::protocol::{parse_server_message, ServerMessage};

/// Heartbeat cadence for shop-owner connections.
pub const HEARTBEAT_INTERVAL_MS: u32 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    /// Socket open, `authenticate` sent, server verdict pending.
    Authenticating,
    Connected,
    /// Closed, a reconnect attempt is scheduled.
    BackoffWait,
    /// Retry budget exhausted; manual page reload required.
    Lost,
}

/// Exponential backoff schedule: `min(base · 2^attempt, max)` with a hard
/// attempt ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before attempt number `attempt` (zero-based), or `None` once
    /// the ceiling is reached.
    pub fn delay_for(&self, attempt: u32) -> Option<u64> {
        if attempt >= self.max_attempts {
            return None;
        }
        let exp = self.base_delay_ms.saturating_mul(1u64 << attempt.min(31));
        Some(exp.min(self.max_delay_ms))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Schedule another connection attempt after `delay_ms`.
    Retry { attempt: u32, delay_ms: u64 },
    /// Budget exhausted: surface the terminal connection-lost state.
    GiveUp,
}

/// Socket-free half of the presence channel: the connection state machine,
/// the attempt counter, and inbound message classification. The browser
/// adapter feeds it socket events and obeys the returned dispositions, which
/// keeps the reconnect behavior testable without a network.
pub struct ChannelCore {
    state: ConnectionState,
    attempts: u32,
    policy: ReconnectPolicy,
}

impl ChannelCore {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempts: 0,
            policy,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Open in the wire sense: the socket accepts writes. Authentication may
    /// still be pending.
    pub fn is_connected(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::Authenticating | ConnectionState::Connected
        )
    }

    pub fn on_connect_started(&mut self) {
        self.state = ConnectionState::Connecting;
    }

    /// Successful open resets the attempt counter; only an open does.
    pub fn on_open(&mut self) {
        self.attempts = 0;
        self.state = ConnectionState::Authenticating;
    }

    /// Socket closed, whatever the cause. Server-side auth rejection is not
    /// distinguished from a network drop here; both ride the same backoff.
    pub fn on_close(&mut self) -> Disposition {
        match self.policy.delay_for(self.attempts) {
            Some(delay_ms) => {
                let attempt = self.attempts;
                self.attempts += 1;
                self.state = ConnectionState::BackoffWait;
                Disposition::Retry { attempt, delay_ms }
            }
            None => {
                self.state = ConnectionState::Lost;
                Disposition::GiveUp
            }
        }
    }

    /// Classify one raw frame. Auth verdicts move the state machine;
    /// malformed frames are logged and dropped, never fatal.
    pub fn on_message(&mut self, raw: &str) -> Option<ServerMessage> {
        let message = match parse_server_message(raw) {
            Ok(message) => message,
            Err(err) => {
                log::warn!("presence: discarding inbound frame: {err}");
                return None;
            }
        };
        match &message {
            ServerMessage::AuthenticationSuccess => {
                log::info!("presence: authenticated");
                self.state = ConnectionState::Connected;
            }
            ServerMessage::AuthenticationFailed => {
                // Server policy keeps the socket open on a rejected
                // authenticate; the channel stays where it is.
                log::error!("presence: authentication failed");
            }
            ServerMessage::Unknown => {
                log::info!("presence: ignoring unknown message type");
            }
            _ => {}
        }
        Some(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_sequence_then_terminal_give_up() {
        let mut core = ChannelCore::new(ReconnectPolicy::default());
        let mut delays = Vec::new();

        for _ in 0..5 {
            core.on_connect_started();
            match core.on_close() {
                Disposition::Retry { delay_ms, .. } => delays.push(delay_ms),
                Disposition::GiveUp => panic!("gave up before the ceiling"),
            }
            assert_eq!(core.state(), ConnectionState::BackoffWait);
        }
        assert_eq!(delays, vec![1_000, 2_000, 4_000, 8_000, 16_000]);

        core.on_connect_started();
        assert_eq!(core.on_close(), Disposition::GiveUp);
        assert_eq!(core.state(), ConnectionState::Lost);
    }

    #[test]
    fn successful_open_resets_the_attempt_counter() {
        let mut core = ChannelCore::new(ReconnectPolicy::default());
        core.on_connect_started();
        assert!(matches!(
            core.on_close(),
            Disposition::Retry { delay_ms: 1_000, .. }
        ));
        core.on_connect_started();
        assert!(matches!(
            core.on_close(),
            Disposition::Retry { delay_ms: 2_000, .. }
        ));

        core.on_connect_started();
        core.on_open();
        assert!(matches!(
            core.on_close(),
            Disposition::Retry { delay_ms: 1_000, .. }
        ));
    }

    #[test]
    fn delay_is_capped_at_thirty_seconds() {
        let policy = ReconnectPolicy {
            max_attempts: 10,
            ..ReconnectPolicy::default()
        };
        assert_eq!(policy.delay_for(4), Some(16_000));
        assert_eq!(policy.delay_for(5), Some(30_000));
        assert_eq!(policy.delay_for(9), Some(30_000));
        assert_eq!(policy.delay_for(10), None);
    }

    #[test]
    fn open_means_connected_authenticated_stays_connected() {
        let mut core = ChannelCore::new(ReconnectPolicy::default());
        assert!(!core.is_connected());

        core.on_connect_started();
        assert_eq!(core.state(), ConnectionState::Connecting);
        assert!(!core.is_connected());

        core.on_open();
        assert_eq!(core.state(), ConnectionState::Authenticating);
        assert!(core.is_connected());

        core.on_message(r#"{"type":"authentication_success"}"#);
        assert_eq!(core.state(), ConnectionState::Connected);
        assert!(core.is_connected());
    }

    #[test]
    fn auth_failure_is_logged_but_does_not_close_or_retry() {
        let mut core = ChannelCore::new(ReconnectPolicy::default());
        core.on_connect_started();
        core.on_open();

        let message = core.on_message(r#"{"type":"authentication_failed"}"#);
        assert_eq!(message, Some(ServerMessage::AuthenticationFailed));
        // Still open, still pre-auth; no state regression.
        assert_eq!(core.state(), ConnectionState::Authenticating);
        assert!(core.is_connected());
    }

    #[test]
    fn malformed_frame_is_dropped_without_state_change() {
        let mut core = ChannelCore::new(ReconnectPolicy::default());
        core.on_connect_started();
        core.on_open();
        core.on_message(r#"{"type":"authentication_success"}"#);

        assert_eq!(core.on_message("{broken"), None);
        assert_eq!(core.state(), ConnectionState::Connected);
    }

    #[test]
    fn heartbeat_ack_passes_through_without_state_change() {
        let mut core = ChannelCore::new(ReconnectPolicy::default());
        core.on_connect_started();
        core.on_open();
        core.on_message(r#"{"type":"authentication_success"}"#);

        let message = core.on_message(r#"{"type":"heartbeat_ack"}"#);
        assert_eq!(message, Some(ServerMessage::HeartbeatAck));
        assert_eq!(core.state(), ConnectionState::Connected);
    }
}
