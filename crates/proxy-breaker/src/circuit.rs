use crate::error::BreakerError;
use crate::policy::TripPolicy;
use serde::Serialize;
use std::fmt;
use tokio::time::Instant;

/// Represents the state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum CircuitState {
    /// The circuit is closed and calls are allowed.
    Closed = 0,
    /// The circuit is open and calls are rejected.
    Open = 1,
    /// The circuit is half-open and a limited number of trial calls are allowed.
    HalfOpen = 2,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Call counts for the current state (and interval, if the policy has one).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub requests: u32,
    pub total_successes: u32,
    pub total_failures: u32,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
}

impl Counts {
    fn on_request(&mut self) {
        self.requests = self.requests.saturating_add(1);
    }

    fn on_success(&mut self) {
        self.total_successes = self.total_successes.saturating_add(1);
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        self.consecutive_failures = 0;
    }

    fn on_failure(&mut self) {
        self.total_failures = self.total_failures.saturating_add(1);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_successes = 0;
    }
}

/// A state change, reported once the circuit lock is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transition {
    pub(crate) from: CircuitState,
    pub(crate) to: CircuitState,
}

/// The breaker state machine.
///
/// Every state change and every interval rollover starts a new generation.
/// Outcomes are recorded against the generation the call was admitted in, so
/// late results of calls admitted before a change are dropped.
pub(crate) struct Circuit {
    state: CircuitState,
    generation: u64,
    counts: Counts,
    // Cooldown deadline while open, interval rollover while closed.
    expiry: Option<Instant>,
    transition: Option<Transition>,
}

impl Circuit {
    pub(crate) fn new(policy: &dyn TripPolicy, now: Instant) -> Self {
        Self {
            state: CircuitState::Closed,
            generation: 0,
            counts: Counts::default(),
            expiry: expiry_for(CircuitState::Closed, policy, now),
            transition: None,
        }
    }

    /// Returns the current state, applying any transition that is due.
    pub(crate) fn state(&mut self, policy: &dyn TripPolicy, now: Instant) -> CircuitState {
        let due = matches!(self.expiry, Some(expiry) if expiry <= now);
        match self.state {
            CircuitState::Closed if due => self.new_generation(policy, now),
            CircuitState::Open if due => self.transition_to(CircuitState::HalfOpen, policy, now),
            _ => {}
        }
        self.state
    }

    pub(crate) fn counts(&self) -> Counts {
        self.counts
    }

    /// Admits a call, returning the generation its outcome belongs to.
    pub(crate) fn try_acquire(
        &mut self,
        policy: &dyn TripPolicy,
        now: Instant,
    ) -> Result<u64, BreakerError> {
        match self.state(policy, now) {
            CircuitState::Open => return Err(BreakerError::Open),
            CircuitState::HalfOpen if self.counts.requests >= policy.half_open_calls() => {
                return Err(BreakerError::TooManyRequests)
            }
            _ => {}
        }
        self.counts.on_request();
        Ok(self.generation)
    }

    pub(crate) fn record_success(&mut self, generation: u64, policy: &dyn TripPolicy, now: Instant) {
        let state = self.state(policy, now);
        if generation != self.generation {
            return;
        }
        self.counts.on_success();
        if state == CircuitState::HalfOpen && policy.should_close(&self.counts) {
            self.transition_to(CircuitState::Closed, policy, now);
        }
    }

    pub(crate) fn record_failure(&mut self, generation: u64, policy: &dyn TripPolicy, now: Instant) {
        let state = self.state(policy, now);
        if generation != self.generation {
            return;
        }
        self.counts.on_failure();
        match state {
            CircuitState::Closed if policy.should_trip(&self.counts) => {
                self.transition_to(CircuitState::Open, policy, now)
            }
            CircuitState::HalfOpen => self.transition_to(CircuitState::Open, policy, now),
            _ => {}
        }
    }

    /// Takes the transition made by the last operation, if any.
    pub(crate) fn take_transition(&mut self) -> Option<Transition> {
        self.transition.take()
    }

    fn transition_to(&mut self, state: CircuitState, policy: &dyn TripPolicy, now: Instant) {
        if self.state == state {
            return;
        }
        let expiry = expiry_for(state, policy, now);
        self.transition = Some(Transition {
            from: self.state,
            to: state,
        });
        self.state = state;
        self.start_generation(expiry);
    }

    fn new_generation(&mut self, policy: &dyn TripPolicy, now: Instant) {
        let expiry = expiry_for(self.state, policy, now);
        self.start_generation(expiry);
    }

    fn start_generation(&mut self, expiry: Option<Instant>) {
        self.generation = self.generation.wrapping_add(1);
        self.counts = Counts::default();
        self.expiry = expiry;
    }
}

/// Deadline of the given state: interval rollover while closed, end of the
/// cooldown while open, none while half-open.
///
/// A rollover the clock cannot represent never happens. A cooldown end the
/// clock cannot represent is due at once, so an open circuit always has a
/// deadline.
fn expiry_for(state: CircuitState, policy: &dyn TripPolicy, now: Instant) -> Option<Instant> {
    match state {
        CircuitState::Closed => policy
            .interval()
            .and_then(|interval| now.checked_add(interval)),
        CircuitState::Open => Some(now.checked_add(policy.cooldown()).unwrap_or(now)),
        CircuitState::HalfOpen => None,
    }
}
