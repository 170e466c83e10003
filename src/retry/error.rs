//! Failures reported by the retry loop, timeouts and config validation.

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

/// Why a retry loop gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every allowed attempt was used.
    Exhausted,
    /// The retryable predicate rejected the error.
    NotRetryable,
}

/// The last error of a retry loop that never succeeded, plus how the loop
/// got there.
///
/// Returned by [`retry_detailed`](super::RetryExecutor::retry_detailed) and
/// [`retry_async_detailed`](super::RetryExecutor::retry_async_detailed).
///
/// ```rust
/// use railyard::{RetryExecutor, RetryPolicy, StopReason};
///
/// let executor = RetryExecutor::always(RetryPolicy::immediate().with_max_attempts(3));
///
/// let exhausted = executor
///     .retry_detailed(|| Err::<(), _>("croupier unavailable"))
///     .unwrap_err();
///
/// assert_eq!(exhausted.final_error, "croupier unavailable");
/// assert_eq!(exhausted.attempts, 3);
/// assert_eq!(exhausted.reason, StopReason::Exhausted);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted<E> {
    /// Error of the last attempt.
    pub final_error: E,
    /// Attempts made, the first one included.
    pub attempts: u32,
    /// Wall time from the first attempt to giving up, sleeps included.
    pub total_duration: Duration,
    /// Why the loop stopped.
    pub reason: StopReason,
}

impl<E> RetryExhausted<E> {
    pub(crate) fn new(
        final_error: E,
        attempts: u32,
        total_duration: Duration,
        reason: StopReason,
    ) -> Self {
        RetryExhausted {
            final_error,
            attempts,
            total_duration,
            reason,
        }
    }

    /// True when the loop ran out of attempts rather than hitting a
    /// non-retryable error.
    pub fn is_exhausted(&self) -> bool {
        self.reason == StopReason::Exhausted
    }

    /// The last error.
    pub fn error(&self) -> &E {
        &self.final_error
    }

    /// Drop the bookkeeping and keep the last error.
    pub fn into_error(self) -> E {
        self.final_error
    }
}

impl<E: fmt::Display> fmt::Display for RetryExhausted<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_exhausted() {
            write!(
                f,
                "retry exhausted after {} attempts ({:?}): {}",
                self.attempts, self.total_duration, self.final_error
            )
        } else {
            write!(
                f,
                "non-retryable failure on attempt {}: {}",
                self.attempts, self.final_error
            )
        }
    }
}

impl<E: StdError + 'static> StdError for RetryExhausted<E> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.final_error)
    }
}

/// Outcome of a deadline that did not end in success.
///
/// Produced by `AsyncRailway::with_timeout`: either the deadline passed
/// first, or the computation failed on its own before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeoutError<E> {
    /// The deadline passed and the computation was dropped.
    Timeout {
        /// The deadline that elapsed.
        duration: Duration,
    },
    /// The computation failed before the deadline.
    Inner(E),
}

impl<E> TimeoutError<E> {
    /// Deadline of `duration` elapsed.
    pub fn timeout(duration: Duration) -> Self {
        TimeoutError::Timeout { duration }
    }

    /// Whether the deadline elapsed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TimeoutError::Timeout { .. })
    }

    /// The computation's own error, if it failed before the deadline.
    pub fn into_inner(self) -> Option<E> {
        match self {
            TimeoutError::Inner(error) => Some(error),
            TimeoutError::Timeout { .. } => None,
        }
    }

    /// Transform the computation's error, keeping timeouts as they are.
    pub fn map_inner<E2, F>(self, f: F) -> TimeoutError<E2>
    where
        F: FnOnce(E) -> E2,
    {
        match self {
            TimeoutError::Inner(error) => TimeoutError::Inner(f(error)),
            TimeoutError::Timeout { duration } => TimeoutError::Timeout { duration },
        }
    }
}

impl<E: fmt::Display> fmt::Display for TimeoutError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutError::Timeout { duration } => {
                write!(f, "deadline of {:?} elapsed before completion", duration)
            }
            TimeoutError::Inner(error) => error.fmt(f),
        }
    }
}

impl<E: StdError + 'static> StdError for TimeoutError<E> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            TimeoutError::Inner(error) => Some(error),
            TimeoutError::Timeout { .. } => None,
        }
    }
}

/// A retry policy or breaker configuration that breaks its invariants.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// `max_attempts` must be at least 1.
    ZeroAttempts,
    /// `backoff_multiplier` must be finite and at least 1.
    InvalidMultiplier(f64),
    /// `max_delay` must not be below `base_delay`.
    MaxDelayBelowBase {
        /// Configured base delay.
        base_delay: Duration,
        /// Configured max delay.
        max_delay: Duration,
    },
    /// `failure_threshold` must be at least 1.
    ZeroFailureThreshold,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroAttempts => f.write_str("max_attempts must be at least 1"),
            ConfigError::InvalidMultiplier(m) => {
                write!(f, "backoff_multiplier must be finite and >= 1.0, got {m}")
            }
            ConfigError::MaxDelayBelowBase {
                base_delay,
                max_delay,
            } => write!(f, "max_delay ({max_delay:?}) is below base_delay ({base_delay:?})"),
            ConfigError::ZeroFailureThreshold => f.write_str("failure_threshold must be at least 1"),
        }
    }
}

impl StdError for ConfigError {}
