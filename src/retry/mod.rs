//! Bounded retries with exponential backoff.
//!
//! The module separates *what* from *how*:
//!
//! - **[`RetryPolicy`]** is plain data: attempts, delays, multiplier, jitter.
//!   It computes delays but never sleeps.
//! - **[`RetryExecutor`]** owns a policy plus the retryable predicate and runs
//!   the loop, synchronously or on tokio.
//!
//! # Quick Start
//!
//! ```rust
//! use railyard::{ErrorRecord, RetryExecutor, RetryPolicy};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let policy = RetryPolicy::exponential(Duration::from_millis(1))
//!     .with_max_attempts(3)
//!     .with_jitter(true);
//!
//! let executor = RetryExecutor::new(policy);
//!
//! let value = executor
//!     .retry_async(|| async { Ok::<_, ErrorRecord>(42) })
//!     .await;
//!
//! assert_eq!(value, Ok(42));
//! # });
//! ```
//!
//! # Which errors are retried
//!
//! [`RetryExecutor::new`] defers to [`Classify::should_retry`](crate::taxonomy::Classify):
//! network and external-service failures are retried, recoverable system
//! failures are retried, everything else stops the loop on the first
//! attempt. A custom predicate replaces that rule entirely.
//!
//! # Jitter
//!
//! With jitter on, each delay `D` becomes a uniform draw from
//! `[0.5 * D, D]`. The `jitter` feature (on by default) pulls in `rand`;
//! without it jittered delays equal the plain ones.
//!
//! # Error Types
//!
//! - [`RetryExhausted`]: the final error plus attempts, elapsed time and
//!   [`StopReason`]
//! - [`TimeoutError`]: a typed timeout, used by
//!   [`AsyncRailway::with_timeout`](crate::AsyncRailway::with_timeout)
//! - [`ConfigError`]: an invalid policy or breaker configuration

mod error;
mod executor;
mod policy;

pub use error::{ConfigError, RetryExhausted, StopReason, TimeoutError};
pub use executor::{RetryEvent, RetryExecutor};
pub use policy::{scale_delay, RetryPolicy};

#[cfg(test)]
mod tests;
