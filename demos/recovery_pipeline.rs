//! A betting-table lookup guarded by retries, a circuit breaker and fallbacks.
//!
//! Run with `RUST_LOG=debug cargo run --example recovery_pipeline` to see the
//! retry and breaker events.

use railyard::recovery::{CachedValue, DefaultValue, RecoveryContext, RecoveryOrchestrator};
use railyard::testing::Flaky;
use railyard::{
    AsyncRailway, CircuitBreaker, CircuitBreakerConfig, ErrorCategory, ErrorRecord, RetryExecutor,
    RetryPolicy,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

fn odds_down() -> ErrorRecord {
    ErrorRecord::external_service("ODDS_UNAVAILABLE", "odds service returned 503")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("railyard=info".parse()?)
                .add_directive("recovery_pipeline=info".parse()?),
        )
        .init();

    let breaker = Arc::new(
        CircuitBreaker::new(CircuitBreakerConfig::new(3, Duration::from_millis(200)))
            .with_name("odds-service")
            .with_expected_categories(&[ErrorCategory::ExternalService, ErrorCategory::Network]),
    );

    let orchestrator = RecoveryOrchestrator::new(RetryExecutor::new(
        RetryPolicy::exponential(Duration::from_millis(20))
            .with_max_attempts(3)
            .with_jitter(true),
    ))
    .with_circuit_breaker(Arc::clone(&breaker))
    .with_strategy(CachedValue::new(|ctx: &RecoveryContext| {
        ctx.metadata("table").map(String::from)
    }))
    .with_strategy(DefaultValue::new(1.0_f64));

    // One good answer, then a long outage.
    let odds = Flaky::new([Ok(2.5), Err(odds_down())]);
    let table = || BTreeMap::from([("table".to_string(), "roulette-3".to_string())]);

    for round in 1..=4 {
        let quoted = orchestrator
            .execute_with_metadata_async(table(), || {
                let result = odds.call();
                async move { result }
            })
            .await?;
        info!(round, quoted, breaker = %breaker.state(), "odds quoted");
    }

    let stats = breaker.stats();
    info!(
        total = stats.total_calls,
        failed = stats.failed_calls,
        rejected = stats.rejected_calls,
        "breaker statistics"
    );

    let payout = AsyncRailway::<f64, ErrorRecord>::of(10.0)
        .validate(
            |stake| *stake > 0.0,
            ErrorRecord::validation("STAKE", "stake must be positive"),
        )
        .bind(|stake| async move { Ok(stake * 2.5) })
        .timeout(
            Duration::from_millis(100),
            ErrorRecord::system("PAYOUT_TIMEOUT", "payout took too long"),
        )
        .await?;
    info!(payout, "payout computed");

    Ok(())
}
