use crate::middleware::new_middleware;
use proxy_breaker_core::{Backend, BackendFactory};
use std::sync::Arc;

/// Adds the breaker middleware on top of the proxies built by `next`.
///
/// The middleware (and its breaker) is built once per backend, when the
/// returned factory is invoked during pipeline assembly.
pub fn backend_factory(next: BackendFactory) -> BackendFactory {
    Arc::new(move |backend: &Backend| new_middleware(backend).wrap(next(backend)))
}
