use proxy_breaker_core::BoxError;
use thiserror::Error;

/// Rejections produced by a breaker instead of running the guarded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BreakerError {
    /// The breaker is open and its cooldown has not elapsed.
    #[error("circuit breaker is open")]
    Open,

    /// The breaker is half-open and its trial calls are all taken.
    #[error("too many requests")]
    TooManyRequests,
}

impl BreakerError {
    /// Returns true if the error indicates the breaker is open.
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open)
    }

    /// Returns the breaker rejection wrapped in a proxy error, if any.
    ///
    /// Downstream errors are never rewritten by the breaker, so anything that
    /// does not downcast to [`BreakerError`] came from the backend call.
    pub fn from_proxy_error(err: &BoxError) -> Option<BreakerError> {
        err.downcast_ref::<BreakerError>().copied()
    }
}

/// Returns true if `err` is a breaker rejection rather than a downstream error.
pub fn is_rejection(err: &BoxError) -> bool {
    BreakerError::from_proxy_error(err).is_some()
}
