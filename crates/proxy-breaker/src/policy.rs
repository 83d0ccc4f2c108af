//! Trip policies.
//!
//! A [`TripPolicy`] decides when a breaker opens, when it closes again and
//! how long it cools down. The state machine itself lives in the breaker and
//! is shared by every policy.

use crate::circuit::Counts;
use crate::config::{ConsecutiveConfig, IntervalConfig};
use std::time::Duration;

/// Cooldown used by [`IntervalPolicy`] when none is configured.
pub const DEFAULT_INTERVAL_COOLDOWN: Duration = Duration::from_secs(60);

/// Longest cooldown or interval a policy keeps (one year). Longer settings
/// are capped.
pub const MAX_PERIOD: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Decides the transitions of a breaker.
///
/// Counts handed to the policy only cover the current state (and, for
/// policies with an [`interval`](TripPolicy::interval), the current interval).
pub trait TripPolicy: Send + Sync + 'static {
    /// Returns true if a closed breaker should open after a failure.
    fn should_trip(&self, counts: &Counts) -> bool;

    /// Returns true if a half-open breaker should close after a success.
    fn should_close(&self, counts: &Counts) -> bool;

    /// How long an open breaker rejects calls before admitting trial calls.
    fn cooldown(&self) -> Duration;

    /// How many trial calls a half-open breaker admits.
    fn half_open_calls(&self) -> u32 {
        1
    }

    /// Period after which closed-state counts are cleared.
    fn interval(&self) -> Option<Duration> {
        None
    }
}

/// Opens after N consecutive failures and closes after M consecutive
/// half-open successes.
///
/// While half-open, up to `max(M, 1)` trial calls are admitted at once.
/// Calls beyond that are rejected with
/// [`BreakerError::TooManyRequests`](crate::BreakerError::TooManyRequests)
/// rather than [`BreakerError::Open`](crate::BreakerError::Open), so callers
/// can tell a recovering backend from one still cooling down. Both are
/// rejections for [`is_rejection`](crate::is_rejection).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsecutivePolicy {
    failures_to_open: u32,
    successes_to_close: u32,
    cooldown: Duration,
}

impl ConsecutivePolicy {
    /// Creates a policy. `cooldown` is capped at [`MAX_PERIOD`].
    pub fn new(failures_to_open: u32, successes_to_close: u32, cooldown: Duration) -> Self {
        Self {
            failures_to_open,
            successes_to_close,
            cooldown: cooldown.min(MAX_PERIOD),
        }
    }
}

impl From<&ConsecutiveConfig> for ConsecutivePolicy {
    fn from(cfg: &ConsecutiveConfig) -> Self {
        Self::new(cfg.failures_to_open, cfg.successes_to_close, cfg.cooldown)
    }
}

impl TripPolicy for ConsecutivePolicy {
    fn should_trip(&self, counts: &Counts) -> bool {
        counts.consecutive_failures >= self.failures_to_open
    }

    fn should_close(&self, counts: &Counts) -> bool {
        counts.consecutive_successes >= self.successes_to_close
    }

    fn cooldown(&self) -> Duration {
        self.cooldown
    }

    // Every success needed to close must be able to get through.
    fn half_open_calls(&self) -> u32 {
        self.successes_to_close.max(1)
    }
}

/// Opens once consecutive failures exceed a maximum within the current
/// interval, and closes after a single successful trial call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalPolicy {
    max_errors: u32,
    cooldown: Duration,
    interval: Option<Duration>,
}

impl IntervalPolicy {
    /// Creates a policy. A zero `cooldown` falls back to
    /// [`DEFAULT_INTERVAL_COOLDOWN`]; a zero `interval` never clears counts.
    /// Both are capped at [`MAX_PERIOD`].
    pub fn new(max_errors: u32, cooldown: Duration, interval: Duration) -> Self {
        Self {
            max_errors,
            cooldown: if cooldown.is_zero() {
                DEFAULT_INTERVAL_COOLDOWN
            } else {
                cooldown.min(MAX_PERIOD)
            },
            interval: (!interval.is_zero()).then_some(interval.min(MAX_PERIOD)),
        }
    }
}

impl From<&IntervalConfig> for IntervalPolicy {
    fn from(cfg: &IntervalConfig) -> Self {
        Self::new(
            cfg.max_errors,
            Duration::from_secs(cfg.timeout_secs),
            Duration::from_secs(cfg.interval_secs),
        )
    }
}

impl TripPolicy for IntervalPolicy {
    fn should_trip(&self, counts: &Counts) -> bool {
        counts.consecutive_failures > self.max_errors
    }

    fn should_close(&self, counts: &Counts) -> bool {
        counts.consecutive_successes >= 1
    }

    fn cooldown(&self) -> Duration {
        self.cooldown
    }

    fn interval(&self) -> Option<Duration> {
        self.interval
    }
}
