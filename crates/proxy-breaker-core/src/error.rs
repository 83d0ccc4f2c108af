use thiserror::Error;

/// Pipeline assembly mistakes.
///
/// These are programming errors, not runtime conditions: middlewares raise
/// them as panic payloads (see [`single_proxy`](crate::single_proxy)) so a
/// misassembled pipeline aborts at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WiringError {
    /// More than one downstream proxy was given to a single-proxy middleware.
    #[error("too many proxies for this proxy middleware")]
    TooManyProxies,

    /// No downstream proxy was given to a middleware that needs one.
    #[error("not enough proxies for this endpoint")]
    NotEnoughProxies,
}
