use super::{counting_proxy, BackendDown};
use proxy_breaker::{
    breaker_middleware, is_rejection, Breaker, BreakerError, CircuitState, ConsecutivePolicy,
    IntervalPolicy,
};
use proxy_breaker_core::{proxy_fn, BoxError, Proxy, Request, Response};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::{Service, ServiceExt};

const COOLDOWN: Duration = Duration::from_secs(5);

/// A backend whose health is switched from the test.
fn switchable(calls: &Arc<AtomicUsize>, healthy: &Arc<AtomicBool>) -> Proxy {
    let healthy = Arc::clone(healthy);
    counting_proxy(calls, move |_| {
        if healthy.load(Ordering::SeqCst) {
            Ok(Response::default())
        } else {
            Err(BackendDown.into())
        }
    })
}

fn consecutive(failures: u32, successes: u32) -> Breaker {
    Breaker::builder(ConsecutivePolicy::new(failures, successes, COOLDOWN))
        .name("half-open-test")
        .build()
}

/// Test cooldown recovery needs the configured number of trial successes
#[tokio::test(start_paused = true)]
async fn closes_after_enough_trial_successes() {
    let calls = Arc::new(AtomicUsize::new(0));
    let healthy = Arc::new(AtomicBool::new(false));
    let breaker = consecutive(2, 2);
    let proxy = breaker_middleware(breaker.clone()).wrap(switchable(&calls, &healthy));

    for _ in 0..2 {
        let _ = proxy.clone().oneshot(Request::default()).await;
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    healthy.store(true, Ordering::SeqCst);
    tokio::time::advance(COOLDOWN).await;
    assert_eq!(breaker.state(), CircuitState::HalfOpen);

    proxy.clone().oneshot(Request::default()).await.unwrap();
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
    proxy.clone().oneshot(Request::default()).await.unwrap();
    assert_eq!(breaker.state(), CircuitState::Closed);

    for _ in 0..5 {
        proxy.clone().oneshot(Request::default()).await.unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 9);
}

/// Test a failed trial call reopens the breaker and restarts the cooldown
#[tokio::test(start_paused = true)]
async fn trial_failure_reopens_despite_prior_successes() {
    let calls = Arc::new(AtomicUsize::new(0));
    let healthy = Arc::new(AtomicBool::new(false));
    let breaker = consecutive(1, 3);
    let proxy = breaker_middleware(breaker.clone()).wrap(switchable(&calls, &healthy));

    let _ = proxy.clone().oneshot(Request::default()).await;
    tokio::time::advance(COOLDOWN).await;

    healthy.store(true, Ordering::SeqCst);
    proxy.clone().oneshot(Request::default()).await.unwrap();
    proxy.clone().oneshot(Request::default()).await.unwrap();

    healthy.store(false, Ordering::SeqCst);
    let err = proxy.clone().oneshot(Request::default()).await.unwrap_err();
    assert!(err.is::<BackendDown>());
    assert_eq!(breaker.state(), CircuitState::Open);

    tokio::time::advance(COOLDOWN - Duration::from_millis(1)).await;
    let err = proxy.clone().oneshot(Request::default()).await.unwrap_err();
    assert!(is_rejection(&err));
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    tokio::time::advance(Duration::from_millis(1)).await;
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
}

/// Test calls beyond the trial budget are rejected while a trial is in flight
#[tokio::test(start_paused = true)]
async fn saturated_half_open_rejects_extra_calls() {
    let calls = Arc::new(AtomicUsize::new(0));
    let healthy = Arc::new(AtomicBool::new(false));
    let breaker = consecutive(1, 1);
    let proxy = breaker_middleware(breaker.clone()).wrap(switchable(&calls, &healthy));

    let _ = proxy.clone().oneshot(Request::default()).await;
    tokio::time::advance(COOLDOWN).await;

    let trial = breaker.try_acquire().unwrap();
    let err = proxy.clone().oneshot(Request::default()).await.unwrap_err();
    assert_eq!(
        BreakerError::from_proxy_error(&err),
        Some(BreakerError::TooManyRequests)
    );
    assert_eq!(err.to_string(), "too many requests");
    assert!(is_rejection(&err));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    trial.success();
    assert_eq!(breaker.state(), CircuitState::Closed);
}

/// Test the interval policy defaults to a single trial success
#[tokio::test(start_paused = true)]
async fn interval_policy_closes_after_one_trial_success() {
    let calls = Arc::new(AtomicUsize::new(0));
    let healthy = Arc::new(AtomicBool::new(false));
    let breaker = Breaker::builder(IntervalPolicy::new(
        1,
        Duration::from_secs(10),
        Duration::from_secs(100),
    ))
    .build();
    let proxy = breaker_middleware(breaker.clone()).wrap(switchable(&calls, &healthy));

    for _ in 0..2 {
        let _ = proxy.clone().oneshot(Request::default()).await;
    }
    assert!(breaker.is_open());

    tokio::time::advance(Duration::from_secs(10)).await;
    healthy.store(true, Ordering::SeqCst);
    proxy.clone().oneshot(Request::default()).await.unwrap();
    assert_eq!(breaker.state(), CircuitState::Closed);
}

/// Test slow calls admitted before a trip cannot close the breaker
#[tokio::test]
async fn late_outcomes_from_before_a_trip_are_ignored() {
    let release = Arc::new(tokio::sync::Notify::new());
    let r = Arc::clone(&release);
    let breaker = consecutive(1, 1);
    let mut proxy = breaker_middleware(breaker.clone()).wrap(proxy_fn(
        move |req: Request| {
            let release = Arc::clone(&r);
            async move {
                if req.path == "/slow" {
                    release.notified().await;
                    Ok(Response::default())
                } else {
                    Err::<Response, BoxError>(Box::new(BackendDown))
                }
            }
        },
    ));

    let slow = proxy
        .ready()
        .await
        .unwrap()
        .call(Request::new("GET", "/slow"));

    let _ = proxy.clone().oneshot(Request::new("GET", "/fast")).await;
    assert!(breaker.is_open());

    release.notify_one();
    slow.await.unwrap();
    assert!(breaker.is_open());
}
