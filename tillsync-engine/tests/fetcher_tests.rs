use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tillsync_engine::{RetryConfig, RetryingFetcher, SyncError};
use tokio::time::Instant;

fn quick_config(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        base_delay: Duration::from_millis(100),
        attempt_timeout: Duration::from_secs(30),
        delay_cap: Duration::from_secs(30),
    }
}

// ── Success paths ────────────────────────────────────────────────

#[tokio::test]
async fn first_attempt_success_makes_one_call() {
    let fetcher = RetryingFetcher::new(quick_config(3));
    let calls = Arc::new(AtomicU32::new(0));

    let result = fetcher
        .fetch("ingredient", || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, SyncError>(42)
            }
        })
        .await
        .unwrap();

    assert_eq!(result, 42);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn retryable_failure_then_success() {
    let fetcher = RetryingFetcher::new(quick_config(3));
    let calls = Arc::new(AtomicU32::new(0));

    let result = fetcher
        .fetch("ingredient", || {
            let calls = calls.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(SyncError::Network("connection reset".into()))
                } else {
                    Ok("ok")
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(result, "ok");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

// ── Retry bounds ─────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn never_exceeds_max_attempts() {
    let fetcher = RetryingFetcher::new(quick_config(4));
    let calls = Arc::new(AtomicU32::new(0));

    let err = fetcher
        .fetch("menu_item", || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(SyncError::Network("network unreachable".into()))
            }
        })
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    match err {
        SyncError::RetriesExhausted {
            label,
            attempts,
            source,
        } => {
            assert_eq!(label, "menu_item");
            assert_eq!(attempts, 4);
            assert!(matches!(*source, SyncError::Network(_)));
        }
        other => panic!("expected RetriesExhausted, got {other}"),
    }
}

#[tokio::test]
async fn non_retryable_error_aborts_immediately() {
    let fetcher = RetryingFetcher::new(quick_config(5));
    let calls = Arc::new(AtomicU32::new(0));

    let err = fetcher
        .fetch("transaction", || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(SyncError::Validation {
                    entity_type: "transaction".into(),
                    errors: vec!["id missing".into()],
                })
            }
        })
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(matches!(err, SyncError::Validation { .. }));
}

// ── Timing ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn per_attempt_timeout_fires_on_hung_operation() {
    let fetcher = RetryingFetcher::new(RetryConfig {
        max_attempts: 1,
        attempt_timeout: Duration::from_millis(50),
        ..quick_config(1)
    });

    let err = fetcher
        .fetch("ingredient", || async {
            std::future::pending::<()>().await;
            Ok::<_, SyncError>(())
        })
        .await
        .unwrap_err();

    // A single attempt exhausts the budget; the final cause is the timeout.
    match err {
        SyncError::RetriesExhausted { attempts, source, .. } => {
            assert_eq!(attempts, 1);
            assert!(matches!(*source, SyncError::Timeout));
        }
        other => panic!("expected RetriesExhausted, got {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn backoff_grows_exponentially() {
    // base 100ms, two failures: waits of ~100ms and ~200ms (plus <=10%
    // jitter each) before the third attempt.
    let fetcher = RetryingFetcher::new(quick_config(3));
    let calls = Arc::new(AtomicU32::new(0));
    let started = Instant::now();

    let _ = fetcher
        .fetch::<(), _, _>("ingredient", || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SyncError::Network("timeout talking to backend".into()))
            }
        })
        .await;

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(300), "elapsed {elapsed:?}");
    assert!(elapsed <= Duration::from_millis(350), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn delay_cap_bounds_backoff() {
    let fetcher = RetryingFetcher::new(RetryConfig {
        max_attempts: 3,
        base_delay: Duration::from_millis(100),
        attempt_timeout: Duration::from_secs(30),
        delay_cap: Duration::from_millis(120),
    });
    let started = Instant::now();

    let _ = fetcher
        .fetch::<(), _, _>("ingredient", || async {
            Err(SyncError::Network("connection refused".into()))
        })
        .await;

    // Both backoffs are clamped to 120ms.
    assert!(started.elapsed() <= Duration::from_millis(250));
}

// ── Error classification ─────────────────────────────────────────

#[test]
fn retryable_keywords_are_recognized() {
    assert!(SyncError::Network("socket closed".into()).is_retryable());
    assert!(SyncError::Timeout.is_retryable());
    assert!(SyncError::Network("fetch aborted".into()).is_retryable());
    assert!(SyncError::Network("connection refused".into()).is_retryable());
}

#[test]
fn validation_and_conflict_errors_are_not_retryable() {
    let validation = SyncError::Validation {
        entity_type: "menu_item".into(),
        errors: vec!["price below cost".into()],
    };
    assert!(!validation.is_retryable());
    assert!(!SyncError::ChannelClosed.is_retryable());
}
