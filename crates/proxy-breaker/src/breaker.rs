use crate::circuit::{Circuit, CircuitState, Counts, Transition};
use crate::config::BreakerConfig;
use crate::error::BreakerError;
use crate::events::{self, BreakerEvent, EventListener, EventListeners};
use crate::policy::{ConsecutivePolicy, IntervalPolicy, TripPolicy};
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

struct Shared {
    name: String,
    policy: Box<dyn TripPolicy>,
    circuit: Mutex<Circuit>,
    listeners: EventListeners,
}

/// A circuit breaker guarding one backend.
///
/// `Breaker` is a cheap handle: clones share the same state. The state is
/// kept behind a mutex held only for the bookkeeping around a call, never
/// while the call runs, and events are emitted after the lock is released.
///
/// # Example
///
/// ```rust
/// use proxy_breaker::{Breaker, BreakerError, CircuitState, ConsecutivePolicy};
/// use std::time::Duration;
///
/// # async fn example() {
/// let breaker = Breaker::builder(ConsecutivePolicy::new(1, 1, Duration::from_secs(10)))
///     .name("users")
///     .build();
///
/// let first: Result<(), BreakerError> = breaker.call(|| async { Err(BreakerError::Open) }).await;
/// assert!(first.is_err());
/// assert_eq!(breaker.state(), CircuitState::Open);
/// # }
/// ```
#[derive(Clone)]
pub struct Breaker {
    shared: Arc<Shared>,
}

impl Breaker {
    /// Returns a builder for a breaker driven by `policy`.
    pub fn builder<P: TripPolicy>(policy: P) -> BreakerBuilder {
        BreakerBuilder::new(policy)
    }

    /// Builds the breaker described by a backend configuration.
    ///
    /// Returns `None` for [`BreakerConfig::Disabled`]. Interval
    /// configurations use their own `name` and `logStatusChange` settings;
    /// `default_name` labels the breaker otherwise.
    pub fn from_config(config: &BreakerConfig, default_name: &str) -> Option<Breaker> {
        match config {
            BreakerConfig::Disabled => None,
            BreakerConfig::Consecutive(cfg) => Some(
                Breaker::builder(ConsecutivePolicy::from(cfg))
                    .name(default_name)
                    .build(),
            ),
            BreakerConfig::Interval(cfg) => Some(
                Breaker::builder(IntervalPolicy::from(cfg))
                    .name(cfg.name.as_deref().unwrap_or(default_name))
                    .log_state_changes(cfg.log_status_change)
                    .build(),
            ),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Returns the current state, moving an open breaker whose cooldown has
    /// elapsed to half-open.
    pub fn state(&self) -> CircuitState {
        self.with_circuit(|circuit, policy, now| circuit.state(policy, now))
    }

    /// Returns true if calls are currently rejected because the breaker is open.
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Returns the counts of the current state.
    pub fn counts(&self) -> Counts {
        self.with_circuit(|circuit, policy, now| {
            circuit.state(policy, now);
            circuit.counts()
        })
    }

    /// Asks for permission to make a call.
    ///
    /// The returned [`Permit`] must be resolved with the call's outcome.
    /// Dropping it unresolved (for instance when the call's future is
    /// cancelled) counts as a failure.
    pub fn try_acquire(&self) -> Result<Permit, BreakerError> {
        let admitted = self.with_circuit(|circuit, policy, now| circuit.try_acquire(policy, now));
        match admitted {
            Ok(generation) => Ok(Permit {
                breaker: self.clone(),
                generation,
                resolved: false,
            }),
            Err(reason) => {
                self.on_rejected(reason);
                Err(reason)
            }
        }
    }

    /// Runs `work` if the breaker lets it through and records its outcome.
    ///
    /// `work` is not invoked at all when the call is rejected; the rejection
    /// is returned through `E`'s `From<BreakerError>` conversion. Any `Err`
    /// returned by `work` counts as a failure and is handed back unchanged.
    pub async fn call<F, Fut, T, E>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<BreakerError>,
    {
        let permit = self.try_acquire()?;
        let result = work().await;
        permit.record(result.is_ok());
        result
    }

    fn record(&self, generation: u64, success: bool) {
        self.with_circuit(|circuit, policy, now| {
            if success {
                circuit.record_success(generation, policy, now);
            } else {
                circuit.record_failure(generation, policy, now);
            }
        });

        #[cfg(feature = "metrics")]
        counter!(
            "proxy_breaker_calls_total",
            "breaker" => self.shared.name.clone(),
            "outcome" => if success { "success" } else { "failure" }
        )
        .increment(1);
    }

    fn lock(&self) -> MutexGuard<'_, Circuit> {
        // Circuit updates cannot be left half-applied, so a poisoned lock is still usable.
        self.shared
            .circuit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn with_circuit<R>(&self, f: impl FnOnce(&mut Circuit, &dyn TripPolicy, Instant) -> R) -> R {
        let (result, transition) = {
            let mut circuit = self.lock();
            let result = f(&mut circuit, &*self.shared.policy, Instant::now());
            (result, circuit.take_transition())
        };
        if let Some(transition) = transition {
            self.on_transition(transition);
        }
        result
    }

    fn on_transition(&self, Transition { from, to }: Transition) {
        tracing::debug!(breaker = %self.shared.name, %from, %to, "circuit breaker state transition");

        #[cfg(feature = "metrics")]
        {
            counter!(
                "proxy_breaker_transitions_total",
                "breaker" => self.shared.name.clone(),
                "from" => from.as_str(),
                "to" => to.as_str()
            )
            .increment(1);
            for state in [CircuitState::Closed, CircuitState::Open, CircuitState::HalfOpen] {
                gauge!(
                    "proxy_breaker_state",
                    "breaker" => self.shared.name.clone(),
                    "state" => state.as_str()
                )
                .set(if state == to { 1.0 } else { 0.0 });
            }
        }

        self.shared.listeners.emit(&BreakerEvent::StateTransition {
            breaker: self.shared.name.clone(),
            timestamp: Instant::now(),
            from,
            to,
        });
    }

    fn on_rejected(&self, reason: BreakerError) {
        tracing::trace!(breaker = %self.shared.name, %reason, "circuit breaker rejected call");

        #[cfg(feature = "metrics")]
        counter!(
            "proxy_breaker_calls_total",
            "breaker" => self.shared.name.clone(),
            "outcome" => "rejected"
        )
        .increment(1);

        if !self.shared.listeners.is_empty() {
            self.shared.listeners.emit(&BreakerEvent::CallRejected {
                breaker: self.shared.name.clone(),
                timestamp: Instant::now(),
                reason,
            });
        }
    }
}

impl fmt::Debug for Breaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Breaker")
            .field("name", &self.shared.name)
            .field("listeners", &self.shared.listeners)
            .finish_non_exhaustive()
    }
}

/// Permission to make one call through a [`Breaker`].
#[must_use = "a permit records a failure when dropped without an outcome"]
pub struct Permit {
    breaker: Breaker,
    generation: u64,
    resolved: bool,
}

impl Permit {
    /// Records the outcome of the call.
    pub fn record(mut self, success: bool) {
        self.resolved = true;
        self.breaker.record(self.generation, success);
    }

    pub fn success(self) {
        self.record(true);
    }

    pub fn failure(self) {
        self.record(false);
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if !self.resolved {
            self.breaker.record(self.generation, false);
        }
    }
}

impl fmt::Debug for Permit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permit")
            .field("breaker", &self.breaker.name())
            .field("generation", &self.generation)
            .finish()
    }
}

/// Builder for [`Breaker`].
pub struct BreakerBuilder {
    policy: Box<dyn TripPolicy>,
    name: String,
    listeners: EventListeners,
}

impl BreakerBuilder {
    fn new<P: TripPolicy>(policy: P) -> Self {
        Self {
            policy: Box::new(policy),
            name: String::from("<unnamed>"),
            listeners: EventListeners::new(),
        }
    }

    /// Give this breaker a human-readable name for observability.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a listener for all breaker events.
    pub fn on_event<L>(mut self, listener: L) -> Self
    where
        L: EventListener + 'static,
    {
        self.listeners.add(listener);
        self
    }

    /// Registers a callback invoked with `(from, to)` on every state change.
    pub fn on_state_transition<F>(self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.on_event(move |event: &BreakerEvent| {
            if let BreakerEvent::StateTransition { from, to, .. } = event {
                f(*from, *to);
            }
        })
    }

    /// Logs every state change as a warning when `enabled` is true.
    pub fn log_state_changes(self, enabled: bool) -> Self {
        if enabled {
            self.on_event(events::log_state_changes)
        } else {
            self
        }
    }

    pub fn build(self) -> Breaker {
        let circuit = Circuit::new(&*self.policy, Instant::now());
        Breaker {
            shared: Arc::new(Shared {
                name: self.name,
                policy: self.policy,
                circuit: Mutex::new(circuit),
                listeners: self.listeners,
            }),
        }
    }
}
