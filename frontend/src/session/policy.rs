/// Session timeout policy. All durations are milliseconds.
///
/// A session is alive while it is younger than `absolute_timeout_ms` and has
/// seen activity within `idle_timeout_ms`. During the last `warning_lead_ms`
/// of the idle window the session is still valid but in the warning band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    pub absolute_timeout_ms: i64,
    pub idle_timeout_ms: i64,
    pub warning_lead_ms: i64,
    pub check_interval_ms: u32,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            absolute_timeout_ms: 8 * 60 * 60 * 1000,
            idle_timeout_ms: 30 * 60 * 1000,
            warning_lead_ms: 5 * 60 * 1000,
            check_interval_ms: 60 * 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Valid,
    /// Still valid, but within the warning band; carries the idle time left.
    Warning { remaining_ms: i64 },
    IdleExpired,
    AbsoluteExpired,
}

impl SessionPolicy {
    /// Pure evaluation of a session against this policy. The absolute
    /// timeout dominates: a session past its maximum age is expired no
    /// matter how recent the activity. The warning band is entered strictly
    /// after `idle_timeout - warning_lead` of inactivity, so a session
    /// sitting exactly on that boundary is still plain `Valid`.
    pub fn evaluate(&self, started_at: i64, last_activity_at: i64, now: i64) -> SessionStatus {
        let age = now - started_at;
        if age >= self.absolute_timeout_ms {
            return SessionStatus::AbsoluteExpired;
        }

        let idle = now - last_activity_at;
        if idle >= self.idle_timeout_ms {
            return SessionStatus::IdleExpired;
        }

        if idle > self.idle_timeout_ms - self.warning_lead_ms {
            return SessionStatus::Warning {
                remaining_ms: self.idle_timeout_ms - idle,
            };
        }

        SessionStatus::Valid
    }

    pub fn is_alive(&self, started_at: i64, last_activity_at: i64, now: i64) -> bool {
        !matches!(
            self.evaluate(started_at, last_activity_at, now),
            SessionStatus::IdleExpired | SessionStatus::AbsoluteExpired
        )
    }

    /// Milliseconds of absolute lifetime left; never negative.
    pub fn remaining_absolute_ms(&self, started_at: i64, now: i64) -> i64 {
        (self.absolute_timeout_ms - (now - started_at)).max(0)
    }

    /// Milliseconds of idle allowance left; never negative.
    pub fn remaining_idle_ms(&self, last_activity_at: i64, now: i64) -> i64 {
        (self.idle_timeout_ms - (now - last_activity_at)).max(0)
    }
}

/// Remaining time rounded up to whole minutes, as surfaced in warnings.
pub fn remaining_minutes(remaining_ms: i64) -> i64 {
    (remaining_ms.max(0) + 59_999) / 60_000
}
