//! Breaker events for observability.

use crate::circuit::CircuitState;
use crate::error::BreakerError;
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;

/// Events emitted by a breaker.
///
/// Nothing is emitted for calls that pass through a closed breaker.
#[derive(Debug, Clone)]
pub enum BreakerEvent {
    /// The breaker changed state.
    StateTransition {
        breaker: String,
        timestamp: Instant,
        from: CircuitState,
        to: CircuitState,
    },
    /// A call was rejected without reaching the backend.
    CallRejected {
        breaker: String,
        timestamp: Instant,
        reason: BreakerError,
    },
}

impl BreakerEvent {
    /// Returns the type of event (e.g. "state_transition").
    pub fn event_type(&self) -> &'static str {
        match self {
            BreakerEvent::StateTransition { .. } => "state_transition",
            BreakerEvent::CallRejected { .. } => "call_rejected",
        }
    }

    /// Returns the name of the breaker that emitted this event.
    pub fn breaker(&self) -> &str {
        match self {
            BreakerEvent::StateTransition { breaker, .. }
            | BreakerEvent::CallRejected { breaker, .. } => breaker,
        }
    }

    pub fn timestamp(&self) -> Instant {
        match self {
            BreakerEvent::StateTransition { timestamp, .. }
            | BreakerEvent::CallRejected { timestamp, .. } => *timestamp,
        }
    }
}

/// Trait for listening to breaker events.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &BreakerEvent);
}

impl<F> EventListener for F
where
    F: Fn(&BreakerEvent) + Send + Sync,
{
    fn on_event(&self, event: &BreakerEvent) {
        self(event)
    }
}

/// A collection of event listeners.
#[derive(Clone, Default)]
pub struct EventListeners {
    listeners: Vec<Arc<dyn EventListener>>,
}

impl EventListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Emits an event to all registered listeners.
    ///
    /// A panicking listener is skipped; the remaining listeners still run.
    pub fn emit(&self, event: &BreakerEvent) {
        for listener in &self.listeners {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl fmt::Debug for EventListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}

/// Listener that logs every state transition as a warning.
pub(crate) fn log_state_changes(event: &BreakerEvent) {
    if let BreakerEvent::StateTransition {
        breaker, from, to, ..
    } = event
    {
        tracing::warn!(
            breaker = %breaker,
            from = %from,
            to = %to,
            "[CB] circuit breaker named '{}' went from '{}' to '{}'",
            breaker,
            from,
            to
        );
    }
}
