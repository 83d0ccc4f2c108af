use crate::breaker::Breaker;
use futures::future::BoxFuture;
use proxy_breaker_core::BoxError;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// A Tower Layer that guards an inner service with a [`Breaker`].
///
/// Every service produced by the same layer shares the layer's breaker, so
/// clone the layer (not the breaker configuration) to protect several
/// handles of one backend.
///
/// # Example
///
/// ```rust
/// use proxy_breaker::{Breaker, CircuitBreakerLayer, ConsecutivePolicy};
/// use std::time::Duration;
/// use tower::{service_fn, ServiceBuilder};
///
/// let breaker = Breaker::builder(ConsecutivePolicy::new(5, 2, Duration::from_secs(10))).build();
///
/// let service = ServiceBuilder::new()
///     .layer(CircuitBreakerLayer::new(breaker))
///     .service(service_fn(|req: String| async move { Ok::<_, std::io::Error>(req) }));
/// ```
#[derive(Clone, Debug)]
pub struct CircuitBreakerLayer {
    breaker: Breaker,
}

impl CircuitBreakerLayer {
    pub fn new(breaker: Breaker) -> Self {
        Self { breaker }
    }

    pub fn breaker(&self) -> &Breaker {
        &self.breaker
    }
}

impl<S> Layer<S> for CircuitBreakerLayer {
    type Service = CircuitBreaker<S>;

    fn layer(&self, service: S) -> Self::Service {
        CircuitBreaker::new(service, self.breaker.clone())
    }
}

/// A Tower Service that applies circuit breaker logic to an inner service.
///
/// Admission is decided synchronously in [`Service::call`]: a rejected call
/// never reaches the inner service and resolves to a [`BreakerError`]
/// boxed into [`BoxError`]. Errors from the inner service are returned as
/// they are, only converted into `BoxError`.
///
/// [`BreakerError`]: crate::BreakerError
#[derive(Clone, Debug)]
pub struct CircuitBreaker<S> {
    inner: S,
    breaker: Breaker,
}

impl<S> CircuitBreaker<S> {
    pub fn new(inner: S, breaker: Breaker) -> Self {
        Self { inner, breaker }
    }

    pub fn breaker(&self) -> &Breaker {
        &self.breaker
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S, Req> Service<Req> for CircuitBreaker<S>
where
    S: Service<Req>,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
{
    type Response = S::Response;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<S::Response, BoxError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let permit = match self.breaker.try_acquire() {
            Ok(permit) => permit,
            Err(reason) => return Box::pin(futures::future::ready(Err(reason.into()))),
        };

        let future = self.inner.call(req);
        Box::pin(async move {
            let result = future.await.map_err(Into::into);
            permit.record(result.is_ok());
            result
        })
    }
}
