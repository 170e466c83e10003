//! Circuit breaker.
//!
//! A [`CircuitBreaker`] stops calling a dependency that keeps failing and
//! periodically lets one trial call through to see whether it recovered:
//!
//! - **Closed**: calls pass through. Each counted failure bumps the failure
//!   count; reaching `failure_threshold` opens the circuit. A success resets
//!   the count.
//! - **Open**: calls fail fast with [`CircuitOpen`] and never run. Once
//!   `recovery_timeout` has passed since the last failure, the next call
//!   moves the breaker to half-open and is admitted.
//! - **Half-open**: exactly one trial call runs at a time; other callers fail
//!   fast. Success closes the circuit, failure reopens it.
//!
//! The open-to-half-open move is checked lazily when a call arrives; there
//! is no background timer.
//!
//! # Rejections in your error type
//!
//! [`execute`](CircuitBreaker::execute) returns the operation's own error
//! type, so a rejection has to be expressible in it: `E` must implement
//! `From<CircuitOpen>`. [`ErrorRecord`] does, mapping to a non-recoverable
//! system error with code `CIRCUIT_OPEN`.
//!
//! # Example
//!
//! ```rust
//! use railyard::{CircuitBreaker, CircuitBreakerConfig, CircuitState, ErrorRecord};
//! use std::time::Duration;
//!
//! let breaker = CircuitBreaker::new(CircuitBreakerConfig::new(2, Duration::from_secs(30)))
//!     .with_name("ledger");
//!
//! for _ in 0..2 {
//!     let _ = breaker.execute(|| Err::<(), _>(ErrorRecord::network("DOWN", "ledger is down")));
//! }
//! assert_eq!(breaker.state(), CircuitState::Open);
//!
//! let rejected = breaker.execute(|| Ok::<_, ErrorRecord>(1)).unwrap_err();
//! assert_eq!(rejected.code(), "CIRCUIT_OPEN");
//! ```

mod config;

pub use config::{CircuitBreakerConfig, CircuitBreakerState, CircuitBreakerStats, CircuitState};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::retry::ConfigError;
use crate::taxonomy::{Classify, ErrorCategory, ErrorRecord};

type ExpectedErrors<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

const DEFAULT_NAME: &str = "circuit-breaker";

/// Rejection produced when a breaker refuses to run a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitOpen {
    /// Name of the breaker that rejected the call.
    pub name: String,
    /// Time left until a trial call will be admitted. `None` while a trial
    /// call is already in flight.
    pub retry_in: Option<Duration>,
}

impl fmt::Display for CircuitOpen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "circuit breaker '{}' is open", self.name)?;
        if let Some(wait) = self.retry_in {
            write!(f, "; retry in {:?}", wait)?;
        }
        Ok(())
    }
}

impl std::error::Error for CircuitOpen {}

impl From<CircuitOpen> for ErrorRecord {
    fn from(open: CircuitOpen) -> Self {
        let mut record = ErrorRecord::new("CIRCUIT_OPEN", ErrorCategory::System, open.to_string())
            .with_recoverable(false)
            .with_user_message("This service is temporarily unavailable. Please try again shortly.")
            .with_context("breaker", &open.name);
        if let Some(wait) = open.retry_in {
            record = record.with_context("retry_in_ms", wait.as_millis());
        }
        record
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failure_count: u32,
    last_failure_time: Option<Instant>,
    // Id of the trial call currently running, if any.
    trial: Option<u64>,
    trials_started: u64,
}

impl Inner {
    fn closed() -> Self {
        Inner {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_time: None,
            trial: None,
            trials_started: 0,
        }
    }

    fn start_trial(&mut self) -> u64 {
        self.trials_started += 1;
        self.trial = Some(self.trials_started);
        self.trials_started
    }

    /// Ends trial `id` if it is still the current one.
    fn end_trial(&mut self, id: Option<u64>) -> bool {
        let current = id.is_some() && self.trial == id;
        if current {
            self.trial = None;
        }
        current
    }
}

/// A process-local circuit breaker guarding calls that fail with `E`.
///
/// Share one breaker between callers with `Arc<CircuitBreaker<E>>`; every
/// method takes `&self`.
pub struct CircuitBreaker<E> {
    name: String,
    config: CircuitBreakerConfig,
    expected: Option<ExpectedErrors<E>>,
    inner: Mutex<Inner>,
    total_calls: AtomicU64,
    successful_calls: AtomicU64,
    failed_calls: AtomicU64,
    rejected_calls: AtomicU64,
}

impl<E> fmt::Debug for CircuitBreaker<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &self.state())
            .field("filtered", &self.expected.is_some())
            .finish()
    }
}

impl<E> CircuitBreaker<E> {
    /// Closed breaker with the given config. Every error counts as a
    /// failure until a filter is set.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        CircuitBreaker {
            name: DEFAULT_NAME.to_string(),
            config,
            expected: None,
            inner: Mutex::new(Inner::closed()),
            total_calls: AtomicU64::new(0),
            successful_calls: AtomicU64::new(0),
            failed_calls: AtomicU64::new(0),
            rejected_calls: AtomicU64::new(0),
        }
    }

    /// Like [`new`](CircuitBreaker::new) but rejects an invalid config.
    pub fn try_new(config: CircuitBreakerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// Name used in logs and rejections.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Only errors accepted by `filter` count as failures. Other errors pass
    /// through to the caller and leave the breaker untouched.
    pub fn with_expected_errors<P>(mut self, filter: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.expected = Some(Arc::new(filter));
        self
    }

    /// Breaker name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Breaker configuration.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state.
    ///
    /// An open breaker whose recovery timeout has passed still reports
    /// `Open` until the next call moves it to half-open.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Counted failures since the last success or reset.
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    /// Copy of the full state.
    pub fn snapshot(&self) -> CircuitBreakerState {
        let inner = self.inner.lock();
        CircuitBreakerState {
            state: inner.state,
            failure_count: inner.failure_count,
            last_failure_time: inner.last_failure_time,
            config: self.config.clone(),
        }
    }

    /// Call counters.
    pub fn stats(&self) -> CircuitBreakerStats {
        CircuitBreakerStats {
            total_calls: self.total_calls.load(Ordering::Relaxed),
            successful_calls: self.successful_calls.load(Ordering::Relaxed),
            failed_calls: self.failed_calls.load(Ordering::Relaxed),
            rejected_calls: self.rejected_calls.load(Ordering::Relaxed),
        }
    }

    /// Force the breaker closed and clear its failure history.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        let trials_started = inner.trials_started;
        *inner = Inner {
            trials_started,
            ..Inner::closed()
        };
        tracing::info!(breaker = %self.name, "circuit breaker reset");
    }

    /// Force the breaker open, as if it had just seen a failure.
    pub fn trip(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Open;
        inner.last_failure_time = Some(Instant::now());
        tracing::warn!(breaker = %self.name, "circuit breaker tripped manually");
    }

    /// Run `op` through the breaker.
    ///
    /// Rejected calls return `E::from(CircuitOpen)` without invoking `op`.
    pub fn execute<T, F>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<CircuitOpen>,
    {
        let guard = self.admit().map_err(E::from)?;
        let result = op();
        guard.complete(&result);
        result
    }

    /// Run the future produced by `op` through the breaker.
    ///
    /// Dropping the returned future while a trial call is in flight frees
    /// the trial slot without changing state.
    ///
    /// ```rust
    /// use railyard::{CircuitBreaker, CircuitBreakerConfig, ErrorRecord};
    ///
    /// # tokio_test::block_on(async {
    /// let breaker = CircuitBreaker::<ErrorRecord>::new(CircuitBreakerConfig::default());
    /// let value = breaker.execute_async(|| async { Ok(7) }).await;
    /// assert_eq!(value, Ok(7));
    /// # });
    /// ```
    #[cfg(feature = "async")]
    pub async fn execute_async<T, F, Fut>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: From<CircuitOpen>,
    {
        let guard = self.admit().map_err(E::from)?;
        let result = op().await;
        guard.complete(&result);
        result
    }

    pub(crate) fn admit(&self) -> Result<CallGuard<'_, E>, CircuitOpen> {
        let mut inner = self.inner.lock();
        let trial = match inner.state {
            CircuitState::Closed => None,
            CircuitState::Open => {
                // A trial that outlived a reopen still holds the slot.
                if inner.trial.is_some() {
                    return Err(self.reject(None));
                }
                let waited = inner
                    .last_failure_time
                    .map_or(self.config.recovery_timeout, |at| at.elapsed());
                if waited < self.config.recovery_timeout {
                    return Err(self.reject(Some(self.config.recovery_timeout - waited)));
                }
                inner.state = CircuitState::HalfOpen;
                tracing::info!(breaker = %self.name, "circuit breaker half-open; admitting trial call");
                Some(inner.start_trial())
            }
            CircuitState::HalfOpen => {
                if inner.trial.is_some() {
                    return Err(self.reject(None));
                }
                Some(inner.start_trial())
            }
        };
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        Ok(CallGuard {
            breaker: self,
            trial,
            done: false,
        })
    }

    fn reject(&self, retry_in: Option<Duration>) -> CircuitOpen {
        self.rejected_calls.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(breaker = %self.name, "circuit open; call rejected");
        CircuitOpen {
            name: self.name.clone(),
            retry_in,
        }
    }

    fn counts(&self, error: &E) -> bool {
        self.expected.as_ref().is_none_or(|filter| filter(error))
    }

    fn on_success(&self, trial: Option<u64>) {
        self.successful_calls.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock();
        let current_trial = inner.end_trial(trial);
        match inner.state {
            CircuitState::Closed => inner.failure_count = 0,
            CircuitState::HalfOpen if current_trial => {
                inner.state = CircuitState::Closed;
                inner.failure_count = 0;
                tracing::info!(breaker = %self.name, "circuit breaker closed");
            }
            // Calls admitted before the circuit opened, and trials that
            // outlived a reset, do not close it.
            _ => {}
        }
    }

    fn on_failure(&self, trial: Option<u64>) {
        self.failed_calls.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock();
        inner.end_trial(trial);
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure_time = Some(Instant::now());
        match inner.state {
            CircuitState::Closed if inner.failure_count >= self.config.failure_threshold => {
                inner.state = CircuitState::Open;
                tracing::warn!(
                    breaker = %self.name,
                    failures = inner.failure_count,
                    "circuit breaker opened"
                );
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                tracing::warn!(breaker = %self.name, "trial call failed; circuit breaker reopened");
            }
            _ => {}
        }
    }

    fn release_trial(&self, trial: Option<u64>) {
        self.inner.lock().end_trial(trial);
    }
}

impl<E: Classify + 'static> CircuitBreaker<E> {
    /// Only errors in `categories` count as failures.
    ///
    /// ```rust
    /// use railyard::{CircuitBreaker, CircuitBreakerConfig, ErrorCategory, ErrorRecord};
    ///
    /// let breaker = CircuitBreaker::new(CircuitBreakerConfig::default())
    ///     .with_expected_categories(&[ErrorCategory::Network]);
    ///
    /// let _ = breaker.execute(|| Err::<(), _>(ErrorRecord::validation("BAD", "bad input")));
    /// assert_eq!(breaker.failure_count(), 0);
    /// ```
    pub fn with_expected_categories(self, categories: &[ErrorCategory]) -> Self {
        let categories = categories.to_vec();
        self.with_expected_errors(move |error: &E| categories.contains(&error.category()))
    }
}

/// Tracks one admitted call. Dropped without `complete` (panic or future
/// cancellation), it frees the trial slot and records nothing.
pub(crate) struct CallGuard<'a, E> {
    breaker: &'a CircuitBreaker<E>,
    trial: Option<u64>,
    done: bool,
}

impl<E> CallGuard<'_, E> {
    pub(crate) fn complete<T>(mut self, result: &Result<T, E>) {
        self.done = true;
        let breaker = self.breaker;
        match result {
            Ok(_) => breaker.on_success(self.trial),
            Err(error) if breaker.counts(error) => breaker.on_failure(self.trial),
            Err(_) => {
                tracing::debug!(breaker = %breaker.name, "error not counted by breaker");
                breaker.release_trial(self.trial);
            }
        }
    }
}

impl<E> Drop for CallGuard<'_, E> {
    fn drop(&mut self) {
        if !self.done && self.trial.is_some() {
            tracing::debug!(breaker = %self.breaker.name, "trial call abandoned");
            self.breaker.release_trial(self.trial);
        }
    }
}
