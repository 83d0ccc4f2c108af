//! Pipeline contract for proxy-breaker.
//!
//! This crate holds the types a gateway pipeline and its middlewares agree on:
//! - [`Request`] and [`Response`], the values flowing through a backend call
//! - [`Proxy`], the backend call itself (a boxed, cloneable tower service)
//! - [`Middleware`], which composes downstream proxies into an upstream one
//! - [`BackendFactory`], which builds the proxy of a [`Backend`] at startup
//! - [`ExtraConfig`], the namespaced, untyped per-backend configuration

mod config;
mod error;
mod proxy;

pub use config::{Backend, ExtraConfig};
pub use error::WiringError;
pub use proxy::{
    noop_proxy, proxy_fn, single_proxy, BackendFactory, BoxError, Metadata, Middleware, Proxy,
    Request, Response,
};
