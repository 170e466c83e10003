//! # Railyard
//!
//! Fault handling for Rust services, built on two-track results.
//!
//! - [`Railway`] and [`AsyncRailway`] chain fallible steps over `Result`,
//!   short-circuiting on the first failure.
//! - [`taxonomy`] classifies failures by category, severity and
//!   recoverability, which drives the default retry decision.
//! - [`RetryExecutor`] retries with exponential backoff and optional jitter.
//! - [`CircuitBreaker`] fails fast after repeated failures and lets a
//!   single trial call test recovery.
//! - [`RecoveryOrchestrator`] composes all of the above with fallback
//!   strategies.
//!
//! ## Quick Example
//!
//! ```rust
//! use railyard::recovery::{DefaultValue, RecoveryOrchestrator};
//! use railyard::{CircuitBreaker, CircuitBreakerConfig, ErrorRecord, RetryExecutor, RetryPolicy};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::new(
//!     3,
//!     Duration::from_secs(30),
//! )));
//!
//! let orchestrator = RecoveryOrchestrator::new(RetryExecutor::new(
//!     RetryPolicy::immediate().with_max_attempts(2),
//! ))
//! .with_circuit_breaker(breaker)
//! .with_strategy(DefaultValue::new(Vec::<String>::new()));
//!
//! let leaderboard = orchestrator.execute_with_recovery(|| {
//!     Err(ErrorRecord::external_service("RANKS_DOWN", "ranking service unavailable"))
//! });
//!
//! assert_eq!(leaderboard, Ok(vec![]));
//! ```
//!
//! ## Features
//!
//! - `async` (default): [`AsyncRailway`] and the `*_async` methods, on tokio.
//! - `jitter` (default): randomized backoff through `rand`.
//! - `serde`: `Serialize`/`Deserialize` for policies, configs and
//!   classifications.
//!
//! Railyard emits `tracing` events for retries, breaker transitions and
//! recoveries but never installs a subscriber.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

#[cfg(feature = "async")]
pub mod async_railway;
pub mod breaker;
pub mod railway;
pub mod recovery;
pub mod result;
pub mod retry;
pub mod taxonomy;
pub mod testing;

// Re-exports
#[cfg(feature = "async")]
pub use async_railway::AsyncRailway;
pub use breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerState, CircuitBreakerStats, CircuitOpen,
    CircuitState,
};
pub use railway::Railway;
pub use recovery::{RecoveryContext, RecoveryOrchestrator, RecoveryStrategy};
pub use result::{try_catch, PanicMessage, ResultExt};
pub use retry::{
    ConfigError, RetryEvent, RetryExecutor, RetryExhausted, RetryPolicy, StopReason, TimeoutError,
};
pub use taxonomy::{
    Classify, ErrorCategory, ErrorCollector, ErrorRecord, Severity, ValidationError,
};

/// Prelude module for convenient imports
pub mod prelude {
    #[cfg(feature = "async")]
    pub use crate::async_railway::AsyncRailway;
    pub use crate::breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitOpen, CircuitState};
    pub use crate::railway::Railway;
    pub use crate::recovery::{RecoveryOrchestrator, RecoveryStrategy};
    pub use crate::result::ResultExt;
    pub use crate::retry::{RetryExecutor, RetryPolicy};
    pub use crate::taxonomy::{Classify, ErrorCategory, ErrorRecord, Severity};
}
