//! The retry loop.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[cfg(not(feature = "async"))]
use std::time::Instant;
#[cfg(feature = "async")]
use tokio::time::Instant;

use super::error::{RetryExhausted, StopReason};
use super::policy::RetryPolicy;
use crate::taxonomy::Classify;

type Predicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;
type RetryHook<E> = Arc<dyn Fn(&RetryEvent<'_, E>) + Send + Sync>;

/// Information about a failed attempt that is about to be retried.
///
/// Passed to hooks registered with [`RetryExecutor::on_retry`].
#[derive(Debug)]
pub struct RetryEvent<'a, E> {
    /// Which attempt just failed (1-indexed).
    pub attempt: u32,
    /// The error from the failed attempt.
    pub error: &'a E,
    /// Delay before the next attempt, after jitter.
    pub next_delay: Duration,
    /// Total elapsed time since the first attempt.
    pub elapsed: Duration,
}

enum Next {
    Retry(Duration),
    Stop(StopReason),
}

/// Runs an operation until it succeeds, the policy runs out of attempts, or
/// the error is not worth retrying.
///
/// The executor owns a [`RetryPolicy`] plus the retryable predicate. With
/// [`RetryExecutor::new`] the predicate is [`Classify::should_retry`]; use
/// [`with_predicate`](RetryExecutor::with_predicate) or
/// [`retry_if`](RetryExecutor::retry_if) for anything else.
///
/// [`retry`](RetryExecutor::retry) retries immediately on the caller's
/// thread. [`retry_async`](RetryExecutor::retry_async) sleeps the backoff
/// delay between attempts.
///
/// # Examples
///
/// ```rust
/// use railyard::{ErrorRecord, RetryExecutor, RetryPolicy};
/// use std::cell::Cell;
///
/// let calls = Cell::new(0);
/// let executor = RetryExecutor::new(RetryPolicy::immediate().with_max_attempts(3));
///
/// let result = executor.retry(|| {
///     calls.set(calls.get() + 1);
///     if calls.get() < 3 {
///         Err(ErrorRecord::network("TIMEOUT", "upstream timed out"))
///     } else {
///         Ok("dealt")
///     }
/// });
///
/// assert_eq!(result, Ok("dealt"));
/// assert_eq!(calls.get(), 3);
/// ```
pub struct RetryExecutor<E> {
    policy: RetryPolicy,
    retryable: Predicate<E>,
    on_retry: Option<RetryHook<E>>,
}

impl<E> Clone for RetryExecutor<E> {
    fn clone(&self) -> Self {
        RetryExecutor {
            policy: self.policy.clone(),
            retryable: Arc::clone(&self.retryable),
            on_retry: self.on_retry.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryExecutor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("policy", &self.policy)
            .field("on_retry", &self.on_retry.is_some())
            .finish_non_exhaustive()
    }
}

impl<E: Classify + 'static> RetryExecutor<E> {
    /// Executor that retries whatever [`Classify::should_retry`] accepts.
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_predicate(policy, |error: &E| error.should_retry())
    }
}

impl<E: 'static> RetryExecutor<E> {
    /// Executor with a custom retryable predicate.
    pub fn with_predicate<P>(policy: RetryPolicy, predicate: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        RetryExecutor {
            policy,
            retryable: Arc::new(predicate),
            on_retry: None,
        }
    }

    /// Executor that retries every error.
    pub fn always(policy: RetryPolicy) -> Self {
        Self::with_predicate(policy, |_| true)
    }

    /// Replace the retryable predicate.
    ///
    /// ```rust
    /// use railyard::{RetryExecutor, RetryPolicy};
    ///
    /// #[derive(Debug, PartialEq)]
    /// enum Fetch { Busy, Gone }
    ///
    /// let executor = RetryExecutor::always(RetryPolicy::immediate())
    ///     .retry_if(|e: &Fetch| *e == Fetch::Busy);
    ///
    /// let mut calls = 0;
    /// let result: Result<(), _> = executor.retry(|| {
    ///     calls += 1;
    ///     Err(Fetch::Gone)
    /// });
    /// assert_eq!(result, Err(Fetch::Gone));
    /// assert_eq!(calls, 1);
    /// ```
    pub fn retry_if<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.retryable = Arc::new(predicate);
        self
    }

    /// Call `hook` before every retry.
    ///
    /// The hook runs synchronously inside the loop; keep it cheap.
    pub fn on_retry<H>(mut self, hook: H) -> Self
    where
        H: Fn(&RetryEvent<'_, E>) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(hook));
        self
    }
}

impl<E> RetryExecutor<E> {
    /// The policy driving this executor.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Whether `error` passes the retryable predicate.
    pub fn is_retryable(&self, error: &E) -> bool {
        (self.retryable)(error)
    }

    /// Run `op` until it succeeds or the loop gives up, returning the last
    /// error on failure.
    ///
    /// Retries happen immediately; the backoff delay is computed and reported
    /// to hooks but not slept.
    pub fn retry<T, F>(&self, op: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
    {
        self.retry_detailed(op).map_err(RetryExhausted::into_error)
    }

    /// Like [`retry`](RetryExecutor::retry), but failures carry attempt count,
    /// elapsed time and stop reason.
    pub fn retry_detailed<T, F>(&self, mut op: F) -> Result<T, RetryExhausted<E>>
    where
        F: FnMut() -> Result<T, E>,
    {
        let start = Instant::now();
        let mut attempt = 1u32;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(error) => match self.next_step(attempt, &error, start) {
                    Next::Retry(_) => attempt += 1,
                    Next::Stop(reason) => {
                        return Err(RetryExhausted::new(error, attempt, start.elapsed(), reason))
                    }
                },
            }
        }
    }

    /// Run the future produced by `op` until it succeeds or the loop gives
    /// up, sleeping the backoff delay between attempts.
    ///
    /// ```rust
    /// use railyard::{ErrorRecord, RetryExecutor, RetryPolicy};
    /// use std::time::Duration;
    ///
    /// # tokio_test::block_on(async {
    /// let executor = RetryExecutor::new(
    ///     RetryPolicy::exponential(Duration::from_millis(1)).with_max_attempts(2),
    /// );
    ///
    /// let result: Result<(), _> = executor
    ///     .retry_async(|| async { Err(ErrorRecord::network("RESET", "connection reset")) })
    ///     .await;
    ///
    /// assert_eq!(result.unwrap_err().code(), "RESET");
    /// # });
    /// ```
    #[cfg(feature = "async")]
    pub async fn retry_async<T, F, Fut>(&self, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        self.retry_async_detailed(op)
            .await
            .map_err(RetryExhausted::into_error)
    }

    /// Like [`retry_async`](RetryExecutor::retry_async), but failures carry
    /// attempt count, elapsed time and stop reason.
    #[cfg(feature = "async")]
    pub async fn retry_async_detailed<T, F, Fut>(
        &self,
        mut op: F,
    ) -> Result<T, RetryExhausted<E>>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let start = Instant::now();
        let mut attempt = 1u32;
        loop {
            let delay = match op().await {
                Ok(value) => return Ok(value),
                Err(error) => match self.next_step(attempt, &error, start) {
                    Next::Retry(delay) => delay,
                    Next::Stop(reason) => {
                        return Err(RetryExhausted::new(error, attempt, start.elapsed(), reason))
                    }
                },
            };
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }

    fn next_step(&self, attempt: u32, error: &E, start: Instant) -> Next {
        if attempt >= self.policy.max_attempts() {
            tracing::warn!(attempts = attempt, "retry attempts exhausted");
            return Next::Stop(StopReason::Exhausted);
        }
        if !(self.retryable)(error) {
            tracing::debug!(attempt, "error is not retryable");
            return Next::Stop(StopReason::NotRetryable);
        }

        let delay = self.policy.jittered_delay(attempt);
        tracing::debug!(attempt, delay = ?delay, "attempt failed, retrying");
        if let Some(hook) = &self.on_retry {
            hook(&RetryEvent {
                attempt,
                error,
                next_delay: delay,
                elapsed: start.elapsed(),
            });
        }
        Next::Retry(delay)
    }
}
