//! Proxies, middlewares and backend factories.
//!
//! A [`Proxy`] is a backend call: a cloneable, boxed [`tower::Service`] that
//! turns a [`Request`] into a [`Response`]. A [`Middleware`] composes one or
//! more downstream proxies into an upstream one, and a [`BackendFactory`]
//! builds the proxy for a backend definition once, while the pipeline is
//! being assembled.

use crate::config::Backend;
use crate::error::WiringError;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tower::util::BoxCloneService;

/// Error type returned by every proxy.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A backend call.
pub type Proxy = BoxCloneService<Request, Response, BoxError>;

/// Builds the proxy for a backend definition.
pub type BackendFactory = Arc<dyn Fn(&Backend) -> Proxy + Send + Sync>;

/// A request travelling through the proxy pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    /// HTTP method of the outgoing call.
    pub method: String,
    /// Path of the outgoing call, after parameter substitution.
    pub path: String,
    /// Parameters extracted from the endpoint pattern.
    pub params: HashMap<String, String>,
    /// Headers forwarded to the backend.
    pub headers: HashMap<String, Vec<String>>,
    /// Raw request body, if any.
    pub body: Option<Vec<u8>>,
}

impl Request {
    /// Creates a request for the given method and path.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }
}

/// Transport-level details of a backend response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub status_code: u16,
    pub headers: HashMap<String, Vec<String>>,
}

/// A decoded backend response.
///
/// The status code is carried as metadata only. A response with an error
/// status is still an `Ok` value unless the proxy that produced it turned it
/// into an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    pub data: Map<String, Value>,
    pub is_complete: bool,
    pub metadata: Metadata,
}

/// Creates a [`Proxy`] from an async closure.
///
/// # Example
///
/// ```rust
/// use proxy_breaker_core::{proxy_fn, Request, Response};
/// use tower::ServiceExt;
///
/// # async fn example() {
/// let proxy = proxy_fn(|_req: Request| async { Ok(Response::default()) });
/// let response = proxy.oneshot(Request::new("GET", "/users")).await;
/// assert!(response.is_ok());
/// # }
/// ```
pub fn proxy_fn<F, Fut>(f: F) -> Proxy
where
    F: FnMut(Request) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = Result<Response, BoxError>> + Send + 'static,
{
    BoxCloneService::new(tower::service_fn(f))
}

/// A proxy that always answers with an empty response.
pub fn noop_proxy() -> Proxy {
    proxy_fn(|_req: Request| async { Ok(Response::default()) })
}

/// Takes the only proxy out of `next`.
///
/// Middlewares wrapping exactly one downstream call use this to enforce their
/// arity. Supplying more than one proxy (or none) is a wiring bug in the
/// pipeline assembly, so this panics with the matching [`WiringError`] as the
/// panic payload instead of returning.
pub fn single_proxy(mut next: Vec<Proxy>) -> Proxy {
    if next.len() > 1 {
        std::panic::panic_any(WiringError::TooManyProxies);
    }
    match next.pop() {
        Some(proxy) => proxy,
        None => std::panic::panic_any(WiringError::NotEnoughProxies),
    }
}

type MiddlewareFn = dyn Fn(Vec<Proxy>) -> Proxy + Send + Sync;

/// Composes downstream proxies into an upstream proxy.
#[derive(Clone)]
pub struct Middleware {
    f: Arc<MiddlewareFn>,
}

impl Middleware {
    /// Creates a middleware from a composition function.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Vec<Proxy>) -> Proxy + Send + Sync + 'static,
    {
        Self { f: Arc::new(f) }
    }

    /// The pass-through middleware: hands back its single downstream proxy
    /// untouched.
    pub fn identity() -> Self {
        Self::new(single_proxy)
    }

    /// Applies the middleware to the given downstream proxies.
    pub fn apply(&self, next: Vec<Proxy>) -> Proxy {
        (self.f)(next)
    }

    /// Applies the middleware to a single downstream proxy.
    pub fn wrap(&self, next: Proxy) -> Proxy {
        self.apply(vec![next])
    }
}

impl std::fmt::Debug for Middleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Middleware").finish_non_exhaustive()
    }
}
