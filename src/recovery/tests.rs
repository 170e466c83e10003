//! Tests for the recovery orchestrator.

use super::*;
use crate::breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::taxonomy::{ErrorCategory, ErrorRecord};
use std::cell::Cell;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_test::traced_test;

fn immediate(attempts: u32) -> RetryExecutor<ErrorRecord> {
    RetryExecutor::new(RetryPolicy::immediate().with_max_attempts(attempts))
}

fn outage() -> ErrorRecord {
    ErrorRecord::network("UPSTREAM_DOWN", "upstream refused connection")
}

/// Strategy that records whether it was asked to recover.
struct Scripted {
    name: &'static str,
    applies: bool,
    outcome: Result<u32, ErrorRecord>,
    calls: Arc<AtomicU32>,
}

impl Scripted {
    fn new(name: &'static str, applies: bool, outcome: Result<u32, ErrorRecord>) -> Self {
        Scripted {
            name,
            applies,
            outcome,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }
}

impl RecoveryStrategy<u32, ErrorRecord> for Scripted {
    fn name(&self) -> &str {
        self.name
    }

    fn can_recover(&self, _error: &ErrorRecord) -> bool {
        self.applies
    }

    fn recover(&self, _error: &ErrorRecord, _ctx: &RecoveryContext) -> Result<u32, ErrorRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

#[test]
fn test_first_applicable_strategy_wins() {
    let a = Scripted::new("a", false, Ok(1));
    let b = Scripted::new("b", true, Ok(42));
    let c = Scripted::new("c", true, Ok(7));
    let (a_calls, c_calls) = (Arc::clone(&a.calls), Arc::clone(&c.calls));

    let orchestrator = RecoveryOrchestrator::new(immediate(2))
        .with_strategy(a)
        .with_strategy(b)
        .with_strategy(c);

    let result = orchestrator.execute_with_recovery(|| Err(outage()));

    assert_eq!(result, Ok(42));
    assert_eq!(a_calls.load(Ordering::SeqCst), 0);
    assert_eq!(c_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_failed_strategy_falls_through_to_next() {
    let orchestrator = RecoveryOrchestrator::new(immediate(1))
        .with_strategy(Scripted::new(
            "broken",
            true,
            Err(ErrorRecord::database("CACHE_GONE", "cache evicted")),
        ))
        .with_strategy(DefaultValue::new(5));

    assert_eq!(orchestrator.execute_with_recovery(|| Err(outage())), Ok(5));
}

#[test]
fn test_original_error_returned_when_nothing_recovers() {
    let orchestrator = RecoveryOrchestrator::new(immediate(3))
        .with_strategy(Scripted::new(
            "broken",
            true,
            Err(ErrorRecord::database("OTHER", "unrelated")),
        ))
        .with_strategy(DefaultValue::new(0).when(|e: &ErrorRecord| e.code() == "NEVER"));

    let result = orchestrator.execute_with_recovery(|| Err(outage()));

    assert_eq!(result, Err(outage()));
}

#[test]
fn test_success_skips_strategies() {
    let fallback = Scripted::new("fallback", true, Ok(0));
    let calls = Arc::clone(&fallback.calls);
    let orchestrator = RecoveryOrchestrator::new(immediate(3)).with_strategy(fallback);

    assert_eq!(orchestrator.execute_with_recovery(|| Ok(9)), Ok(9));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_retries_before_recovering() {
    let attempts = Cell::new(0);
    let orchestrator = RecoveryOrchestrator::new(immediate(3)).with_strategy(DefaultValue::new(0));

    let result = orchestrator.execute_with_recovery(|| {
        attempts.set(attempts.get() + 1);
        if attempts.get() < 3 {
            Err(outage())
        } else {
            Ok(77)
        }
    });

    assert_eq!(result, Ok(77));
    assert_eq!(attempts.get(), 3);
}

#[test]
fn test_context_reports_attempts_and_metadata() {
    let orchestrator = RecoveryOrchestrator::new(immediate(4)).with_strategy(
        AlternativeOperation::new("echo", |_: &ErrorRecord, ctx: &RecoveryContext| {
            Ok(format!(
                "{}/{} for {}",
                ctx.attempt_count,
                ctx.max_attempts,
                ctx.metadata("table").unwrap_or("?")
            ))
        }),
    );

    let metadata = BTreeMap::from([("table".to_string(), "7".to_string())]);
    let result = orchestrator.execute_with_metadata(metadata, || Err(outage()));

    assert_eq!(result, Ok("4/4 for 7".to_string()));
}

#[test]
fn test_cached_value_learns_from_successes() {
    let orchestrator = RecoveryOrchestrator::new(immediate(1)).with_strategy(CachedValue::new(
        |ctx: &RecoveryContext| ctx.metadata("player").map(String::from),
    ));
    let tags = |player: &str| BTreeMap::from([("player".to_string(), player.to_string())]);

    assert_eq!(orchestrator.execute_with_metadata(tags("ada"), || Ok(1800)), Ok(1800));

    assert_eq!(
        orchestrator.execute_with_metadata(tags("ada"), || Err(outage())),
        Ok(1800)
    );
    assert_eq!(
        orchestrator.execute_with_metadata(tags("grace"), || Err(outage())),
        Err(outage())
    );
}

#[test]
fn test_fallback_chain_is_consumed_across_calls() {
    let orchestrator = RecoveryOrchestrator::new(immediate(1))
        .with_strategy(FallbackChain::new(vec!["replica-1", "replica-2"]));

    assert_eq!(orchestrator.execute_with_recovery(|| Err(outage())), Ok("replica-1"));
    assert_eq!(orchestrator.execute_with_recovery(|| Err(outage())), Ok("replica-2"));
    assert_eq!(orchestrator.execute_with_recovery(|| Err(outage())), Err(outage()));
}

#[test]
fn test_open_breaker_short_circuits_then_recovers() {
    let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::new(
        2,
        Duration::from_secs(60),
    )));
    let calls = Cell::new(0);
    let orchestrator = RecoveryOrchestrator::new(immediate(5))
        .with_circuit_breaker(Arc::clone(&breaker))
        .with_strategy(DefaultValue::new(-1));

    let result = orchestrator.execute_with_recovery(|| {
        calls.set(calls.get() + 1);
        Err(outage())
    });

    // Two counted failures open the circuit; the third attempt is rejected
    // and the rejection is not retryable.
    assert_eq!(result, Ok(-1));
    assert_eq!(calls.get(), 2);
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(breaker.stats().rejected_calls, 1);
}

#[test]
fn test_breaker_rejection_returned_without_strategies() {
    let breaker: Arc<CircuitBreaker<ErrorRecord>> =
        Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default()));
    breaker.trip();
    let orchestrator = RecoveryOrchestrator::<u8, _>::new(immediate(3)).with_circuit_breaker(breaker);

    let error = orchestrator.execute_with_recovery(|| Ok(1)).unwrap_err();

    assert_eq!(error.code(), "CIRCUIT_OPEN");
    assert_eq!(error.category(), ErrorCategory::System);
}

#[test]
fn test_strategy_names_in_order() {
    let orchestrator = RecoveryOrchestrator::<u32, ErrorRecord>::new(immediate(1))
        .with_strategy(FallbackChain::new(vec![1]))
        .with_strategy(DefaultValue::new(0));

    assert_eq!(orchestrator.strategy_names(), vec!["fallback_chain", "default_value"]);
}

#[test]
#[traced_test]
fn test_recovery_is_logged() {
    let orchestrator = RecoveryOrchestrator::new(immediate(1)).with_strategy(DefaultValue::new(0));
    let _ = orchestrator.execute_with_recovery(|| Err(outage()));

    assert!(logs_contain("recovered from failure"));
    assert!(logs_contain("default_value"));
}

#[cfg(feature = "async")]
mod async_tests {
    use super::*;

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn test_async_calls_are_send() {
        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default()));
        let orchestrator = RecoveryOrchestrator::<u32, ErrorRecord>::new(immediate(2))
            .with_circuit_breaker(Arc::clone(&breaker));

        assert_send(&orchestrator.execute_with_recovery_async(|| async { Ok(1) }));
        assert_send(
            &orchestrator.execute_with_metadata_async(BTreeMap::new(), || async { Ok(1) }),
        );
        assert_send(&breaker.execute_async(|| async { Ok::<_, ErrorRecord>(1) }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_orchestrated_call_on_spawned_task() {
        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default()));
        let orchestrator = Arc::new(
            RecoveryOrchestrator::new(immediate(3))
                .with_circuit_breaker(Arc::clone(&breaker))
                .with_strategy(DefaultValue::new(0_u32)),
        );

        let handle = tokio::spawn({
            let orchestrator = Arc::clone(&orchestrator);
            async move {
                orchestrator
                    .execute_with_recovery_async(|| async { Err(outage()) })
                    .await
            }
        });

        assert_eq!(handle.await.unwrap(), Ok(0));
        assert_eq!(breaker.stats().failed_calls, 3);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_recovery_after_backoff() {
        let attempts = Arc::new(AtomicU32::new(0));
        let orchestrator = RecoveryOrchestrator::new(RetryExecutor::new(
            RetryPolicy::exponential(Duration::from_millis(100)).with_max_attempts(3),
        ))
        .with_strategy(Scripted::new("a", false, Ok(1)))
        .with_strategy(Scripted::new("b", true, Ok(42)));

        let started = tokio::time::Instant::now();
        let result = orchestrator
            .execute_with_recovery_async(|| {
                let attempts = Arc::clone(&attempts);
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(outage())
                }
            })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_async_breaker_rejects_without_invoking() {
        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::new(
            1,
            Duration::from_secs(60),
        )));
        breaker.trip();
        let invoked = Arc::new(AtomicU32::new(0));
        let orchestrator =
            RecoveryOrchestrator::<u32, _>::new(immediate(3)).with_circuit_breaker(breaker);

        let result = orchestrator
            .execute_with_recovery_async(|| {
                let invoked = Arc::clone(&invoked);
                async move {
                    invoked.fetch_add(1, Ordering::SeqCst);
                    Ok(1)
                }
            })
            .await;

        assert_eq!(result.unwrap_err().code(), "CIRCUIT_OPEN");
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_async_breaker_closed_passes_through() {
        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default()));
        let orchestrator = RecoveryOrchestrator::new(immediate(2))
            .with_circuit_breaker(Arc::clone(&breaker))
            .with_strategy(DefaultValue::new(0));

        let result = orchestrator
            .execute_with_metadata_async(BTreeMap::new(), || async { Ok(3) })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(breaker.stats().successful_calls, 1);
    }
}
