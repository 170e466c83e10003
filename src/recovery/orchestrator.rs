//! Retry, breaker and fallbacks composed around one call.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::strategy::{RecoveryContext, RecoveryStrategy};
use crate::breaker::{CircuitBreaker, CircuitOpen};
use crate::retry::{RetryExecutor, RetryExhausted};

/// Composes a [`RetryExecutor`], an optional shared [`CircuitBreaker`] and an
/// ordered list of [`RecoveryStrategy`]s.
///
/// For every call:
///
/// 1. the operation runs through the breaker, if one is configured;
/// 2. the executor retries it according to its policy;
/// 3. on a terminal failure the strategies are consulted in registration
///    order, skipping those whose `can_recover` is false; the first `Ok`
///    wins;
/// 4. if none recovers, the terminal error is returned unchanged.
///
/// The orchestrator never panics on behalf of the operation; every outcome
/// is a `Result`.
///
/// # Example
///
/// ```rust
/// use railyard::recovery::{DefaultValue, RecoveryOrchestrator};
/// use railyard::{ErrorRecord, RetryExecutor, RetryPolicy};
///
/// let orchestrator = RecoveryOrchestrator::new(RetryExecutor::new(
///     RetryPolicy::immediate().with_max_attempts(2),
/// ))
/// .with_strategy(DefaultValue::new(0_u32));
///
/// let score = orchestrator.execute_with_recovery(|| {
///     Err(ErrorRecord::external_service("SCORES_DOWN", "score service timed out"))
/// });
/// assert_eq!(score, Ok(0));
/// ```
pub struct RecoveryOrchestrator<T, E> {
    strategies: Vec<Box<dyn RecoveryStrategy<T, E>>>,
    executor: RetryExecutor<E>,
    breaker: Option<Arc<CircuitBreaker<E>>>,
}

impl<T, E> fmt::Debug for RecoveryOrchestrator<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryOrchestrator")
            .field("strategies", &self.strategy_names())
            .field("executor", &self.executor)
            .field("breaker", &self.breaker)
            .finish()
    }
}

impl<T, E> RecoveryOrchestrator<T, E> {
    /// Orchestrator with no breaker and no strategies.
    pub fn new(executor: RetryExecutor<E>) -> Self {
        RecoveryOrchestrator {
            strategies: Vec::new(),
            executor,
            breaker: None,
        }
    }

    /// Append a strategy; strategies run in the order they were added.
    pub fn with_strategy<S>(mut self, strategy: S) -> Self
    where
        S: RecoveryStrategy<T, E> + 'static,
    {
        self.add_strategy(strategy);
        self
    }

    /// Append a strategy in place.
    pub fn add_strategy<S>(&mut self, strategy: S)
    where
        S: RecoveryStrategy<T, E> + 'static,
    {
        self.strategies.push(Box::new(strategy));
    }

    /// Route every attempt through `breaker`. The breaker may be shared with
    /// other orchestrators.
    pub fn with_circuit_breaker(mut self, breaker: Arc<CircuitBreaker<E>>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    /// Names of the registered strategies, in order.
    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// The shared breaker, if any.
    pub fn circuit_breaker(&self) -> Option<&Arc<CircuitBreaker<E>>> {
        self.breaker.as_ref()
    }

    /// The retry executor.
    pub fn executor(&self) -> &RetryExecutor<E> {
        &self.executor
    }
}

impl<T, E> RecoveryOrchestrator<T, E>
where
    E: From<CircuitOpen>,
{
    /// Run `op` with retries, the breaker and fallbacks.
    pub fn execute_with_recovery<F>(&self, op: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
    {
        self.execute_with_metadata(BTreeMap::new(), op)
    }

    /// Like [`execute_with_recovery`](RecoveryOrchestrator::execute_with_recovery),
    /// attaching `metadata` to the [`RecoveryContext`] seen by strategies.
    pub fn execute_with_metadata<F>(
        &self,
        metadata: BTreeMap<String, String>,
        mut op: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
    {
        let started = Instant::now();
        let attempts = AtomicU32::new(0);
        let outcome = match &self.breaker {
            Some(breaker) => self.executor.retry_detailed(|| {
                attempts.fetch_add(1, Ordering::Relaxed);
                breaker.execute(&mut op)
            }),
            None => self.executor.retry_detailed(|| {
                attempts.fetch_add(1, Ordering::Relaxed);
                op()
            }),
        };
        let context = self.context(metadata, attempts.into_inner(), started);
        self.settle(outcome, &context)
    }

    /// Async form of
    /// [`execute_with_recovery`](RecoveryOrchestrator::execute_with_recovery):
    /// the breaker check wraps each attempt and backoff delays are slept.
    ///
    /// ```rust
    /// use railyard::recovery::{FallbackChain, RecoveryOrchestrator};
    /// use railyard::{ErrorRecord, RetryExecutor, RetryPolicy};
    /// use std::time::Duration;
    ///
    /// # tokio_test::block_on(async {
    /// let orchestrator = RecoveryOrchestrator::new(RetryExecutor::new(
    ///     RetryPolicy::exponential(Duration::from_millis(1)).with_max_attempts(3),
    /// ))
    /// .with_strategy(FallbackChain::new(vec!["cached-deck".to_string()]));
    ///
    /// let deck = orchestrator
    ///     .execute_with_recovery_async(|| async {
    ///         Err(ErrorRecord::network("DECK_FETCH", "connection refused"))
    ///     })
    ///     .await;
    /// assert_eq!(deck, Ok("cached-deck".to_string()));
    /// # });
    /// ```
    #[cfg(feature = "async")]
    pub async fn execute_with_recovery_async<F, Fut>(&self, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        self.execute_with_metadata_async(BTreeMap::new(), op).await
    }

    /// Async form of
    /// [`execute_with_metadata`](RecoveryOrchestrator::execute_with_metadata).
    #[cfg(feature = "async")]
    pub async fn execute_with_metadata_async<F, Fut>(
        &self,
        metadata: BTreeMap<String, String>,
        mut op: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let started = Instant::now();
        let attempts = AtomicU32::new(0);
        let counter = &attempts;
        let outcome = match self.breaker.as_deref() {
            Some(breaker) => {
                self.executor
                    .retry_async_detailed(move || {
                        counter.fetch_add(1, Ordering::Relaxed);
                        let call = breaker.admit().map(|guard| (guard, op()));
                        async move {
                            match call {
                                Err(open) => Err(E::from(open)),
                                Ok((guard, attempt)) => {
                                    let result = attempt.await;
                                    guard.complete(&result);
                                    result
                                }
                            }
                        }
                    })
                    .await
            }
            None => {
                self.executor
                    .retry_async_detailed(move || {
                        counter.fetch_add(1, Ordering::Relaxed);
                        op()
                    })
                    .await
            }
        };
        let context = self.context(metadata, attempts.into_inner(), started);
        self.settle(outcome, &context)
    }
}

impl<T, E> RecoveryOrchestrator<T, E> {
    fn context(
        &self,
        metadata: BTreeMap<String, String>,
        attempts: u32,
        started: Instant,
    ) -> RecoveryContext {
        let mut context =
            RecoveryContext::new(self.executor.policy().max_attempts()).with_metadata(metadata);
        context.attempt_count = attempts;
        context.elapsed = started.elapsed();
        context
    }

    fn settle(&self, outcome: Result<T, RetryExhausted<E>>, context: &RecoveryContext) -> Result<T, E> {
        match outcome {
            Ok(value) => {
                for strategy in &self.strategies {
                    strategy.on_success(&value, context);
                }
                Ok(value)
            }
            Err(exhausted) => self.recover(exhausted.into_error(), context),
        }
    }

    fn recover(&self, error: E, context: &RecoveryContext) -> Result<T, E> {
        for strategy in &self.strategies {
            if !strategy.can_recover(&error) {
                tracing::debug!(strategy = strategy.name(), "strategy does not apply");
                continue;
            }
            match strategy.recover(&error, context) {
                Ok(value) => {
                    tracing::info!(
                        strategy = strategy.name(),
                        attempts = context.attempt_count,
                        "recovered from failure"
                    );
                    return Ok(value);
                }
                Err(_) => tracing::debug!(strategy = strategy.name(), "strategy failed to recover"),
            }
        }
        if !self.strategies.is_empty() {
            tracing::warn!(
                attempts = context.attempt_count,
                "no recovery strategy succeeded"
            );
        }
        Err(error)
    }
}
