//! Per-backend circuit breaker middleware for gateway proxy pipelines.
//!
//! A circuit breaker stops sending traffic to a backend that keeps failing,
//! giving it a cooldown period before probing it again.
//!
//! ## States
//! - **Closed**: Normal operation, all requests pass through
//! - **Open**: Circuit is tripped, requests are rejected immediately
//! - **Half-Open**: Cooldown elapsed, a few trial requests test the backend
//!
//! ## Configuration
//!
//! Breakers are configured per backend through its extra config. Two
//! policies are available, each under its own namespace:
//!
//! - [`CONSECUTIVE_NAMESPACE`]: opens after `error` consecutive failures,
//!   closes after `success` consecutive successes while half-open, and cools
//!   down for `timeout` (a duration string such as `"10s"`).
//! - [`INTERVAL_NAMESPACE`]: opens once consecutive failures exceed
//!   `maxErrors`, cools down for `timeout` seconds, clears its counts every
//!   `interval` seconds and, with `logStatusChange`, logs every transition.
//!
//! A backend without a usable entry is not guarded at all.
//!
//! ## Usage
//!
//! ### Backend Factory
//!
//! ```rust
//! use proxy_breaker::{backend_factory, CONSECUTIVE_NAMESPACE};
//! use proxy_breaker_core::{noop_proxy, Backend, BackendFactory, ExtraConfig};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let http: BackendFactory = Arc::new(|_backend: &Backend| noop_proxy());
//! let factory = backend_factory(http);
//!
//! let mut extra = ExtraConfig::new();
//! extra.insert(CONSECUTIVE_NAMESPACE, json!({ "error": 3, "success": 1, "timeout": "30s" }));
//! let proxy = factory(&Backend::with_extra_config(extra));
//! ```
//!
//! ### Middleware
//!
//! ```rust
//! use proxy_breaker::{new_middleware, INTERVAL_NAMESPACE};
//! use proxy_breaker_core::{noop_proxy, Backend, ExtraConfig};
//! use serde_json::json;
//!
//! let mut extra = ExtraConfig::new();
//! extra.insert(INTERVAL_NAMESPACE, json!({
//!     "interval": 60,
//!     "timeout": 10,
//!     "maxErrors": 5,
//!     "logStatusChange": true,
//!     "name": "users"
//! }));
//!
//! let proxy = new_middleware(&Backend::with_extra_config(extra)).wrap(noop_proxy());
//! ```
//!
//! ### Error Handling
//!
//! Downstream errors are returned untouched. Rejections are a
//! [`BreakerError`] inside the proxy's [`BoxError`](proxy_breaker_core::BoxError):
//!
//! ```rust
//! use proxy_breaker::BreakerError;
//! use proxy_breaker_core::BoxError;
//!
//! fn describe(err: &BoxError) -> &'static str {
//!     match BreakerError::from_proxy_error(err) {
//!         Some(BreakerError::Open) => "backend unavailable, breaker open",
//!         Some(BreakerError::TooManyRequests) => "backend recovering, try again",
//!         None => "backend error",
//!     }
//! }
//! ```
//!
//! ## Feature Flags
//! - `metrics`: enables metrics collection using the `metrics` crate

pub use breaker::{Breaker, BreakerBuilder, Permit};
pub use circuit::{CircuitState, Counts};
pub use config::{
    BreakerConfig, ConsecutiveConfig, IntervalConfig, CONSECUTIVE_NAMESPACE, INTERVAL_NAMESPACE,
};
pub use decode::{parse_duration, ParseDurationError};
pub use error::{is_rejection, BreakerError};
pub use events::{BreakerEvent, EventListener, EventListeners};
pub use factory::backend_factory;
pub use layer::{CircuitBreaker, CircuitBreakerLayer};
pub use middleware::{breaker_middleware, new_middleware};
pub use policy::{
    ConsecutivePolicy, IntervalPolicy, TripPolicy, DEFAULT_INTERVAL_COOLDOWN, MAX_PERIOD,
};

mod breaker;
mod circuit;
mod config;
mod decode;
mod error;
mod events;
mod factory;
mod layer;
mod middleware;
mod policy;
