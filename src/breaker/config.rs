//! Breaker configuration and observable state.

use std::fmt;
use std::time::{Duration, Instant};

use crate::retry::ConfigError;

/// Where a breaker currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CircuitState {
    /// Normal operation; calls pass through.
    Closed,
    /// Failing fast; calls are rejected without running.
    Open,
    /// Admitting one trial call to see whether the dependency recovered.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Thresholds for a [`CircuitBreaker`](super::CircuitBreaker).
///
/// ```rust
/// use railyard::CircuitBreakerConfig;
/// use std::time::Duration;
///
/// let config = CircuitBreakerConfig::new(3, Duration::from_secs(30));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CircuitBreakerConfig {
    /// Counted failures that open the circuit.
    pub failure_threshold: u32,
    /// Time after the last failure before a trial call is admitted.
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    /// Config with the given threshold (raised to at least 1) and timeout.
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            recovery_timeout,
        }
    }

    /// Check a hand-built or deserialized config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::ZeroFailureThreshold);
        }
        Ok(())
    }
}

/// Point-in-time copy of a breaker's state.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerState {
    /// Current state.
    pub state: CircuitState,
    /// Counted failures since the last success or reset.
    pub failure_count: u32,
    /// When the last counted failure happened.
    pub last_failure_time: Option<Instant>,
    /// The breaker's configuration.
    pub config: CircuitBreakerConfig,
}

/// Call counters for a breaker.
///
/// `total_calls` counts admitted calls. Failures the expected-error filter
/// ignores are in `total_calls` but in neither `successful_calls` nor
/// `failed_calls`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CircuitBreakerStats {
    /// Calls admitted to run.
    pub total_calls: u64,
    /// Admitted calls that succeeded.
    pub successful_calls: u64,
    /// Admitted calls that failed with a counted error.
    pub failed_calls: u64,
    /// Calls rejected without running.
    pub rejected_calls: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.recovery_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_new_clamps_threshold() {
        let config = CircuitBreakerConfig::new(0, Duration::from_secs(1));
        assert_eq!(config.failure_threshold, 1);
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        let config = CircuitBreakerConfig {
            failure_threshold: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroFailureThreshold));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(CircuitState::HalfOpen.to_string(), "half-open");
        assert_eq!(CircuitState::Open.to_string(), "open");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: CircuitBreakerConfig =
            serde_json::from_str(r#"{"failure_threshold": 2}"#).unwrap();
        assert_eq!(config.failure_threshold, 2);
        assert_eq!(config.recovery_timeout, Duration::from_secs(60));
    }
}
