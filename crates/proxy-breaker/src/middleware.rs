//! The per-backend breaker middleware.

use crate::breaker::Breaker;
use crate::config::BreakerConfig;
use crate::layer::CircuitBreakerLayer;
use proxy_breaker_core::{single_proxy, Backend, Middleware, Proxy};
use tower::util::BoxCloneService;
use tower::Layer;

/// Builds the breaker middleware for a backend.
///
/// The breaker configuration is read from the backend's extra config. When it
/// is absent or unusable the identity middleware is returned and the backend
/// is called directly. Otherwise one breaker is created for the backend and
/// every proxy produced by the middleware goes through it.
///
/// The middleware wraps exactly one downstream proxy; applying it to several
/// panics with [`WiringError::TooManyProxies`].
///
/// [`WiringError::TooManyProxies`]: proxy_breaker_core::WiringError::TooManyProxies
///
/// # Example
///
/// ```rust
/// use proxy_breaker::{new_middleware, CONSECUTIVE_NAMESPACE};
/// use proxy_breaker_core::{noop_proxy, Backend, ExtraConfig};
/// use serde_json::json;
///
/// let mut extra = ExtraConfig::new();
/// extra.insert(CONSECUTIVE_NAMESPACE, json!({ "error": 5, "success": 1, "timeout": "10s" }));
///
/// let proxy = new_middleware(&Backend::with_extra_config(extra)).wrap(noop_proxy());
/// ```
pub fn new_middleware(backend: &Backend) -> Middleware {
    let config = BreakerConfig::from_extra(&backend.extra_config);
    match Breaker::from_config(&config, &backend.label()) {
        Some(breaker) => {
            tracing::debug!(breaker = breaker.name(), ?config, "circuit breaker enabled for backend");
            breaker_middleware(breaker)
        }
        None => Middleware::identity(),
    }
}

/// Wraps a single downstream proxy with the given breaker.
pub fn breaker_middleware(breaker: Breaker) -> Middleware {
    let layer = CircuitBreakerLayer::new(breaker);
    Middleware::new(move |next: Vec<Proxy>| {
        let next = single_proxy(next);
        BoxCloneService::new(layer.layer(next))
    })
}
