//! Tests for throttle-aware retry through the call interceptor.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tollgate_error::{RemoteError, RemoteErrorKind};
use tollgate_rate_limit::{
    AdmissionGate, CallInterceptor, CancelReason, InvokeError, RateLimitErrorKind, RetryPolicy,
    SignalClassifier, WindowConfig,
};

fn roomy_interceptor(max_retries: u32, initial_secs: u64) -> CallInterceptor {
    CallInterceptor::new(
        100,
        Duration::from_secs(60),
        max_retries,
        Duration::from_secs(initial_secs),
        2.0,
    )
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_persistent_throttle_exhausts_retries() {
    let interceptor = roomy_interceptor(3, 2);
    let calls = AtomicU32::new(0);
    let calls = &calls;

    let invocation = interceptor
        .run(move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>("HTTP 429 Too Many Requests".to_string())
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(invocation.attempts, 3);
    match invocation.outcome {
        Err(InvokeError::RetriesExhausted { attempts, source }) => {
            assert_eq!(attempts, 3);
            assert!(source.contains("429"));
        }
        other => panic!("expected retries exhausted, got {:?}", other),
    }

    // 2s + 4s, with no sleep after the final failure
    assert!(invocation.elapsed >= Duration::from_secs(6));
    assert!(invocation.elapsed < Duration::from_secs(7));
}

#[tokio::test(start_paused = true)]
async fn test_fatal_failure_short_circuits() {
    let interceptor = roomy_interceptor(5, 2);
    let calls = AtomicU32::new(0);
    let calls = &calls;

    let invocation = interceptor
        .run(move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>("invalid api key".to_string())
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(matches!(
        invocation.outcome,
        Err(InvokeError::Fatal { attempt: 1, .. })
    ));
    assert_eq!(invocation.elapsed, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_transient_throttle_is_recovered() {
    let interceptor = roomy_interceptor(5, 2);
    let calls = AtomicU32::new(0);
    let calls = &calls;
    let started = Instant::now();

    let value = interceptor
        .invoke(move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err("RESOURCE_EXHAUSTED: quota exceeded".to_string())
            } else {
                Ok(42)
            }
        })
        .await
        .unwrap();

    assert_eq!(value, 42);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(started.elapsed(), Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn test_each_retry_takes_a_fresh_admission() {
    let gate = Arc::new(AdmissionGate::new(
        WindowConfig::new(2, Duration::from_secs(60)).unwrap(),
    ));
    let policy = RetryPolicy::new(3, Duration::from_secs(1), 2.0).unwrap();
    let interceptor = CallInterceptor::sharing(gate.clone(), policy);
    let calls = AtomicU32::new(0);
    let calls = &calls;

    let invocation = interceptor
        .run(move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err("429".to_string())
            } else {
                Ok(())
            }
        })
        .await;

    assert!(invocation.outcome.is_ok());
    assert_eq!(invocation.attempts, 2);
    assert_eq!(gate.in_window().await, 2);
}

#[tokio::test(start_paused = true)]
async fn test_gate_wait_is_reported() {
    let gate = Arc::new(AdmissionGate::new(
        WindowConfig::new(1, Duration::from_secs(60)).unwrap(),
    ));
    let policy = RetryPolicy::new(2, Duration::from_secs(1), 2.0).unwrap();
    let interceptor = CallInterceptor::sharing(gate, policy);

    let first = interceptor.run(|| async { Ok::<_, String>(()) }).await;
    let second = interceptor.run(|| async { Ok::<_, String>(()) }).await;

    assert_eq!(first.gate_wait, Duration::ZERO);
    assert_eq!(second.gate_wait, Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_structured_classification() {
    let interceptor = roomy_interceptor(2, 1).with_classifier(SignalClassifier);

    let unavailable = interceptor
        .invoke(|| async {
            Err::<(), _>(RemoteError::new(RemoteErrorKind::HttpStatus {
                status_code: 503,
                message: "Service unavailable".to_string(),
            }))
        })
        .await
        .unwrap_err();
    assert!(matches!(unavailable, InvokeError::Fatal { .. }));

    let throttled = interceptor
        .invoke(|| async {
            Err::<(), _>(RemoteError::new(RemoteErrorKind::HttpStatus {
                status_code: 429,
                message: "Too many requests".to_string(),
            }))
        })
        .await
        .unwrap_err();
    assert!(throttled.is_retries_exhausted());
    assert_eq!(
        throttled.source_error().map(|e| e.kind().clone()),
        Some(RemoteErrorKind::HttpStatus {
            status_code: 429,
            message: "Too many requests".to_string(),
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancel_aborts_gate_wait() {
    let gate = Arc::new(AdmissionGate::new(
        WindowConfig::new(1, Duration::from_secs(60)).unwrap(),
    ));
    let policy = RetryPolicy::new(3, Duration::from_secs(1), 2.0).unwrap();
    let interceptor = CallInterceptor::sharing(gate.clone(), policy);

    interceptor
        .invoke(|| async { Ok::<_, String>(()) })
        .await
        .unwrap();

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let result = interceptor
        .invoke_with_cancel(&token, || async { Ok::<_, String>(()) })
        .await;

    assert!(matches!(
        result,
        Err(InvokeError::Cancelled(CancelReason::Signalled))
    ));
    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(gate.in_window().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_aborts_backoff() {
    let interceptor = roomy_interceptor(5, 10);
    let calls = AtomicU32::new(0);
    let calls = &calls;

    let result = interceptor
        .invoke_until(Instant::now() + Duration::from_secs(3), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>("quota exceeded".to_string())
        })
        .await;

    assert!(matches!(
        result,
        Err(InvokeError::Cancelled(CancelReason::DeadlineElapsed))
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_invokes_share_one_gate() {
    let interceptor = CallInterceptor::new(
        3,
        Duration::from_secs(60),
        2,
        Duration::from_secs(1),
        2.0,
    )
    .unwrap();
    let started = Instant::now();

    let mut handles = Vec::new();
    for i in 0..6u32 {
        let interceptor = interceptor.clone();
        handles.push(tokio::spawn(async move {
            interceptor
                .invoke(move || async move { Ok::<_, String>(i) })
                .await
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap().unwrap());
    }
    results.sort();

    assert_eq!(results, vec![0, 1, 2, 3, 4, 5]);
    assert!(started.elapsed() >= Duration::from_secs(60));
}

#[test]
fn test_invalid_construction_fails_fast() {
    assert!(CallInterceptor::new(0, Duration::from_secs(60), 3, Duration::from_secs(1), 2.0).is_err());
    assert!(CallInterceptor::new(3, Duration::ZERO, 3, Duration::from_secs(1), 2.0).is_err());
    assert!(CallInterceptor::new(3, Duration::from_secs(60), 0, Duration::from_secs(1), 2.0).is_err());
    assert!(CallInterceptor::new(3, Duration::from_secs(60), 3, Duration::ZERO, 2.0).is_err());
    assert!(CallInterceptor::new(3, Duration::from_secs(60), 3, Duration::from_secs(1), 0.5).is_err());
}

#[tokio::test(start_paused = true)]
async fn test_jittered_backoff_never_exceeds_schedule() {
    let policy = RetryPolicy::new(5, Duration::from_secs(2), 2.0)
        .unwrap()
        .with_jitter(true);
    let ceiling: Duration = policy.delays().iter().sum();
    let interceptor = CallInterceptor::with_gate(
        AdmissionGate::new(WindowConfig::new(1000, Duration::from_secs(60)).unwrap()),
        policy,
    );

    for _ in 0..20 {
        let invocation = interceptor
            .run(|| async { Err::<(), _>("HTTP 429".to_string()) })
            .await;

        assert!(invocation.outcome.unwrap_err().is_retries_exhausted());
        assert_eq!(invocation.attempts, 5);
        assert!(
            invocation.elapsed <= ceiling,
            "slept {:?}, schedule allows {:?}",
            invocation.elapsed,
            ceiling
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_stateful_call_site_closure() {
    let interceptor = roomy_interceptor(4, 1);
    let mut attempt = 0u32;

    let value = interceptor
        .invoke(|| {
            attempt += 1;
            let current = attempt;
            async move {
                if current < 3 {
                    Err(format!("attempt {}: quota exceeded", current))
                } else {
                    Ok(current)
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(value, 3);
    assert_eq!(attempt, 3);
}

#[test]
fn test_unrepresentable_backoff_fails_fast() {
    let err = CallInterceptor::new(
        100,
        Duration::from_secs(60),
        3,
        Duration::from_secs(u64::MAX / 2),
        4.0,
    )
    .unwrap_err();
    assert!(matches!(err.kind(), RateLimitErrorKind::InvalidRetry(_)));

    let err = CallInterceptor::new(1, Duration::from_secs(u64::MAX), 3, Duration::from_secs(1), 2.0)
        .unwrap_err();
    assert!(matches!(err.kind(), RateLimitErrorKind::InvalidWindow(_)));
}

#[test]
fn test_invoke_error_display() {
    let err: InvokeError<String> = InvokeError::RetriesExhausted {
        attempts: 5,
        source: "HTTP 429".to_string(),
    };
    assert_eq!(err.to_string(), "Retries exhausted after 5 attempts: HTTP 429");

    let err: InvokeError<String> = InvokeError::Cancelled(CancelReason::DeadlineElapsed);
    assert_eq!(err.to_string(), "Call cancelled: deadline elapsed");
}
