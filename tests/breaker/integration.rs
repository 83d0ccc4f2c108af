use super::{backend, counting_proxy, failing, succeeding, BackendDown};
use proxy_breaker::{
    backend_factory, is_rejection, new_middleware, BreakerError, CONSECUTIVE_NAMESPACE,
    INTERVAL_NAMESPACE,
};
use proxy_breaker_core::{Backend, BackendFactory, Metadata, Request, Response};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn users_response() -> Response {
    let mut data = serde_json::Map::new();
    data.insert("id".into(), json!(1));
    data.insert("name".into(), json!("ada"));
    Response {
        data,
        is_complete: true,
        metadata: Metadata {
            status_code: 200,
            ..Metadata::default()
        },
    }
}

/// Without any breaker configuration, responses come back untouched
#[tokio::test]
async fn absent_config_passes_every_call_through() {
    let calls = Arc::new(AtomicUsize::new(0));
    let proxy = new_middleware(&Backend::default())
        .wrap(counting_proxy(&calls, |_| Ok(users_response())));

    for _ in 0..100 {
        let response = proxy.clone().oneshot(Request::new("GET", "/users/1")).await.unwrap();
        assert_eq!(response, users_response());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 100);
}

/// Malformed entries disable the breaker instead of failing
#[tokio::test]
async fn malformed_config_passes_every_error_through() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut misconfigured = backend(CONSECUTIVE_NAMESPACE, json!(42));
    misconfigured
        .extra_config
        .insert(INTERVAL_NAMESPACE, json!("qos"));

    let proxy = new_middleware(&misconfigured).wrap(counting_proxy(&calls, failing));

    for _ in 0..100 {
        let err = proxy.clone().oneshot(Request::default()).await.unwrap_err();
        assert!(err.is::<BackendDown>());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 100);
}

/// First failure opens the breaker; nothing reaches the backend until the cooldown elapses
#[tokio::test(start_paused = true)]
async fn first_failure_opens_until_cooldown() {
    let calls = Arc::new(AtomicUsize::new(0));
    let proxy = new_middleware(&backend(
        CONSECUTIVE_NAMESPACE,
        json!({ "error": 1, "success": 1, "timeout": "1s" }),
    ))
    .wrap(counting_proxy(&calls, failing));

    let err = proxy.clone().oneshot(Request::default()).await.unwrap_err();
    assert!(err.is::<BackendDown>());

    let err = proxy.clone().oneshot(Request::default()).await.unwrap_err();
    assert_eq!(BreakerError::from_proxy_error(&err), Some(BreakerError::Open));
    assert_eq!(err.to_string(), "circuit breaker is open");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_millis(999)).await;
    let err = proxy.clone().oneshot(Request::default()).await.unwrap_err();
    assert!(is_rejection(&err));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_millis(1)).await;
    let err = proxy.clone().oneshot(Request::default()).await.unwrap_err();
    assert!(err.is::<BackendDown>());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// The interval variant lets `maxErrors` failures through before opening
#[tokio::test]
async fn interval_config_opens_past_max_errors() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let calls = Arc::new(AtomicUsize::new(0));
    let proxy = new_middleware(&backend(
        INTERVAL_NAMESPACE,
        json!({
            "name": "something",
            "interval": 100,
            "timeout": 100,
            "maxErrors": 1,
            "logStatusChange": true
        }),
    ))
    .wrap(counting_proxy(&calls, failing));

    for _ in 0..2 {
        let err = proxy.clone().oneshot(Request::default()).await.unwrap_err();
        assert!(err.is::<BackendDown>());
    }

    let err = proxy.clone().oneshot(Request::default()).await.unwrap_err();
    assert_eq!(err.to_string(), "circuit breaker is open");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// Deprecated snake_case keys still configure the interval variant
#[tokio::test]
async fn deprecated_interval_keys_are_honored() {
    let calls = Arc::new(AtomicUsize::new(0));
    let proxy = new_middleware(&backend(
        INTERVAL_NAMESPACE,
        json!({ "interval": 100, "timeout": 100, "max_errors": 1, "log_status_change": false }),
    ))
    .wrap(counting_proxy(&calls, failing));

    for _ in 0..5 {
        let _ = proxy.clone().oneshot(Request::default()).await;
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// A configured breaker never rewrites successful responses
#[tokio::test]
async fn enabled_breaker_returns_responses_untouched() {
    let calls = Arc::new(AtomicUsize::new(0));
    let proxy = new_middleware(&backend(
        CONSECUTIVE_NAMESPACE,
        json!({ "error": 1, "success": 1, "timeout": "1s" }),
    ))
    .wrap(counting_proxy(&calls, |_| Ok(users_response())));

    for _ in 0..10 {
        let response = proxy.clone().oneshot(Request::default()).await.unwrap();
        assert_eq!(response, users_response());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 10);
}

/// Successes between failures keep a consecutive breaker closed
#[tokio::test]
async fn alternating_outcomes_never_trip() {
    let calls = Arc::new(AtomicUsize::new(0));
    let proxy = new_middleware(&backend(
        CONSECUTIVE_NAMESPACE,
        json!({ "error": 2, "success": 1, "timeout": "1m" }),
    ))
    .wrap(counting_proxy(&calls, |n| {
        if n % 2 == 0 {
            failing(n)
        } else {
            succeeding(n)
        }
    }));

    for _ in 0..50 {
        let result = proxy.clone().oneshot(Request::default()).await;
        if let Err(err) = result {
            assert!(!is_rejection(&err));
        }
    }
    assert_eq!(calls.load(Ordering::SeqCst), 50);
}

/// The factory wrapper guards each backend it builds independently
#[tokio::test]
async fn factory_guards_only_configured_backends() {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let http: BackendFactory =
        Arc::new(move |_backend: &Backend| counting_proxy(&c, failing));
    let factory = backend_factory(http);

    let guarded = factory(&backend(
        CONSECUTIVE_NAMESPACE,
        json!({ "error": 3, "success": 1, "timeout": "10s" }),
    ));
    let unguarded = factory(&Backend::default());

    for _ in 0..10 {
        let _ = guarded.clone().oneshot(Request::default()).await;
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    for _ in 0..10 {
        let err = unguarded.clone().oneshot(Request::default()).await.unwrap_err();
        assert!(err.is::<BackendDown>());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 13);
}
