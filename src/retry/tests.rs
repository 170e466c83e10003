//! Tests for the retry executor.

use super::*;
use crate::taxonomy::{ErrorCategory, ErrorRecord};
use crate::testing::Flaky;
use std::cell::Cell;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn transient() -> ErrorRecord {
    ErrorRecord::network("CONN_RESET", "connection reset by peer")
}

#[test]
fn test_succeeds_on_third_attempt() {
    let calls = Cell::new(0);
    let executor = RetryExecutor::new(RetryPolicy::immediate().with_max_attempts(5));

    let result = executor.retry(|| {
        calls.set(calls.get() + 1);
        if calls.get() < 3 {
            Err(transient())
        } else {
            Ok("success")
        }
    });

    assert_eq!(result, Ok("success"));
    assert_eq!(calls.get(), 3);
}

#[test]
fn test_three_failures_then_success_with_three_attempts_fails() {
    let calls = Cell::new(0);
    let executor = RetryExecutor::new(RetryPolicy::immediate().with_max_attempts(3));

    let result = executor.retry_detailed(|| {
        calls.set(calls.get() + 1);
        if calls.get() <= 3 {
            Err(ErrorRecord::network(
                format!("ATTEMPT_{}", calls.get()),
                "connection reset by peer",
            ))
        } else {
            Ok(())
        }
    });

    let exhausted = result.unwrap_err();
    assert_eq!(exhausted.attempts, 3);
    assert_eq!(exhausted.reason, StopReason::Exhausted);
    assert_eq!(exhausted.final_error.code(), "ATTEMPT_3");
    assert_eq!(calls.get(), 3);
}

#[test]
fn test_exhaustion_returns_last_attempts_error() {
    let op = Flaky::new([Err("first"), Err("second"), Ok(())]);
    let executor = RetryExecutor::always(RetryPolicy::immediate().with_max_attempts(2));

    let exhausted = executor.retry_detailed(|| op.call()).unwrap_err();

    assert_eq!(exhausted.final_error, "second");
    assert_eq!(exhausted.attempts, 2);
    assert_eq!(op.calls(), 2);
}

#[test]
fn test_non_retryable_error_stops_immediately() {
    let calls = Cell::new(0);
    let executor = RetryExecutor::new(RetryPolicy::immediate().with_max_attempts(5));

    let result: Result<(), _> = executor.retry_detailed(|| {
        calls.set(calls.get() + 1);
        Err(ErrorRecord::authentication("TOKEN_EXPIRED", "token expired"))
    });

    let exhausted = result.unwrap_err();
    assert_eq!(exhausted.attempts, 1);
    assert_eq!(exhausted.reason, StopReason::NotRetryable);
    assert_eq!(exhausted.final_error.category(), ErrorCategory::Authentication);
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_retry_if_overrides_classification() {
    let calls = Cell::new(0);
    let executor = RetryExecutor::new(RetryPolicy::immediate().with_max_attempts(4))
        .retry_if(|e: &ErrorRecord| e.code() == "LOCKED");

    let result: Result<(), _> = executor.retry(|| {
        calls.set(calls.get() + 1);
        Err(ErrorRecord::database("LOCKED", "row is locked"))
    });

    assert!(result.is_err());
    assert_eq!(calls.get(), 4);
}

#[test]
fn test_single_attempt_policy_never_retries() {
    let calls = Cell::new(0);
    let executor = RetryExecutor::always(RetryPolicy::immediate().with_max_attempts(1));

    let result: Result<(), &str> = executor.retry(|| {
        calls.set(calls.get() + 1);
        Err("nope")
    });

    assert_eq!(result, Err("nope"));
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_hook_sees_every_retry() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let executor = RetryExecutor::<&'static str>::always(
        RetryPolicy::exponential(Duration::from_millis(100)).with_max_attempts(4),
    )
    .on_retry({
        let events = Arc::clone(&events);
        move |event| {
            events
                .lock()
                .unwrap()
                .push((event.attempt, *event.error, event.next_delay));
        }
    });

    let result: Result<(), _> = executor.retry(|| Err("flaky"));

    assert_eq!(result, Err("flaky"));
    assert_eq!(
        *events.lock().unwrap(),
        vec![
            (1, "flaky", Duration::from_millis(100)),
            (2, "flaky", Duration::from_millis(200)),
            (3, "flaky", Duration::from_millis(400)),
        ]
    );
}

#[test]
fn test_hook_not_called_on_success() {
    let hits = Arc::new(Mutex::new(0));
    let executor = RetryExecutor::<&'static str>::always(RetryPolicy::immediate()).on_retry({
        let hits = Arc::clone(&hits);
        move |_| *hits.lock().unwrap() += 1
    });

    assert_eq!(executor.retry(|| Ok(1)), Ok(1));
    assert_eq!(*hits.lock().unwrap(), 0);
}

#[test]
fn test_executor_clone_shares_predicate() {
    let executor = RetryExecutor::with_predicate(RetryPolicy::default(), |e: &i32| *e > 0);
    let cloned = executor.clone();
    assert!(cloned.is_retryable(&1));
    assert!(!cloned.is_retryable(&-1));
    assert_eq!(cloned.policy(), executor.policy());
}

#[cfg(feature = "async")]
mod async_tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_async_sleeps_backoff_between_attempts() {
        let attempts = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutor::always(
            RetryPolicy::exponential(Duration::from_millis(100)).with_max_attempts(4),
        );

        let started = Instant::now();
        let result = executor
            .retry_async(|| {
                let attempts = Arc::clone(&attempts);
                async move {
                    let n = attempts.fetch_add(1, Ordering::SeqCst);
                    if n < 3 {
                        Err("transient failure")
                    } else {
                        Ok("success")
                    }
                }
            })
            .await;

        assert_eq!(result, Ok("success"));
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        // 100 + 200 + 400
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(700), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(710), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_exhausted_reports_metadata() {
        let executor = RetryExecutor::always(
            RetryPolicy::constant(Duration::from_millis(50)).with_max_attempts(3),
        );

        let exhausted = executor
            .retry_async_detailed(|| async { Err::<(), _>("always fails") })
            .await
            .unwrap_err();

        assert_eq!(exhausted.attempts, 3);
        assert_eq!(exhausted.final_error, "always fails");
        assert_eq!(exhausted.reason, StopReason::Exhausted);
        assert!(exhausted.total_duration >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_non_retryable_does_not_sleep() {
        let executor = RetryExecutor::new(
            RetryPolicy::constant(Duration::from_secs(10)).with_max_attempts(3),
        );

        let started = Instant::now();
        let result: Result<(), _> = executor
            .retry_async(|| async { Err(ErrorRecord::validation("BAD_SUIT", "unknown suit")) })
            .await;

        assert_eq!(result.unwrap_err().code(), "BAD_SUIT");
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_jittered_sleep_within_bounds() {
        let executor = RetryExecutor::always(
            RetryPolicy::constant(Duration::from_millis(1000))
                .with_max_attempts(2)
                .with_jitter(true),
        );

        let started = Instant::now();
        let _ = executor
            .retry_async(|| async { Err::<(), _>("busy") })
            .await;

        let slept = started.elapsed();
        assert!(slept >= Duration::from_millis(500), "{slept:?}");
        assert!(slept <= Duration::from_millis(1001), "{slept:?}");
    }
}
