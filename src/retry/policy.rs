//! Retry policy configuration.

use std::time::Duration;

use super::error::ConfigError;

/// Describes how often and how patiently to retry.
///
/// Policies are pure data: they compute delays but never sleep or run
/// anything. That keeps them easy to test, clone, compare and (with the
/// `serde` feature) load from configuration files.
///
/// The delay after failed attempt `n` (1-indexed) is
///
/// ```text
/// min(max_delay, base_delay * backoff_multiplier^(n - 1))
/// ```
///
/// and, when jitter is on, that delay is scaled by a uniform random factor
/// in `[0.5, 1.0]`.
///
/// # Examples
///
/// ```rust
/// use railyard::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::exponential(Duration::from_millis(100))
///     .with_max_attempts(5)
///     .with_max_delay(Duration::from_millis(500));
///
/// assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
/// assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
/// assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
/// assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(500)); // capped
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f64,
    jitter: bool,
}

impl Default for RetryPolicy {
    /// Three attempts, 100ms doubling up to 30s, no jitter.
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Policy with the [`Default`] settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Same delay before every retry.
    ///
    /// ```rust
    /// use railyard::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::constant(Duration::from_millis(250));
    /// assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(250));
    /// assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(250));
    /// ```
    pub fn constant(delay: Duration) -> Self {
        RetryPolicy {
            base_delay: delay,
            max_delay: delay.max(Self::default().max_delay),
            backoff_multiplier: 1.0,
            ..Self::default()
        }
    }

    /// Delay doubles after every failure, starting at `base`.
    pub fn exponential(base: Duration) -> Self {
        RetryPolicy {
            base_delay: base,
            max_delay: base.max(Self::default().max_delay),
            backoff_multiplier: 2.0,
            ..Self::default()
        }
    }

    /// Retry immediately, with no delay at all.
    pub fn immediate() -> Self {
        RetryPolicy {
            base_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            ..Self::default()
        }
    }

    /// Total number of attempts, including the first. Values below 1 are
    /// raised to 1.
    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    /// Delay after the first failure.
    pub fn with_base_delay(mut self, d: Duration) -> Self {
        self.base_delay = d;
        self
    }

    /// Upper bound for any single delay.
    pub fn with_max_delay(mut self, d: Duration) -> Self {
        self.max_delay = d;
        self
    }

    /// Growth factor between consecutive delays. Values below 1 (and NaN)
    /// are raised to 1.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = if multiplier >= 1.0 { multiplier } else { 1.0 };
        self
    }

    /// Randomize each delay into `[0.5 * delay, delay]`.
    ///
    /// **Note**: Requires the `jitter` feature. Without it, delays stay
    /// deterministic.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Total number of attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the first failure.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Upper bound for any single delay.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Growth factor between consecutive delays.
    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    /// Whether delays are randomized.
    pub fn jitter(&self) -> bool {
        self.jitter
    }

    /// Backoff delay after failed attempt `attempt` (1-indexed), before
    /// jitter.
    ///
    /// Attempt 0 is treated as attempt 1. Overflowing products saturate at
    /// `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.backoff_multiplier.powi(exponent);
        let secs = self.base_delay.as_secs_f64() * factor;
        let raw = Duration::try_from_secs_f64(secs).unwrap_or(self.max_delay);
        raw.min(self.max_delay)
    }

    /// Backoff delay after failed attempt `attempt`, with jitter applied
    /// when enabled.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        if self.jitter {
            scale_delay(delay, jitter_factor())
        } else {
            delay
        }
    }

    /// Check the invariants a hand-built or deserialized policy must hold.
    ///
    /// ```rust
    /// use railyard::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::constant(Duration::from_secs(5))
    ///     .with_max_delay(Duration::from_secs(1));
    /// assert!(policy.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if !(self.backoff_multiplier >= 1.0 && self.backoff_multiplier.is_finite()) {
            return Err(ConfigError::InvalidMultiplier(self.backoff_multiplier));
        }
        if self.max_delay < self.base_delay {
            return Err(ConfigError::MaxDelayBelowBase {
                base_delay: self.base_delay,
                max_delay: self.max_delay,
            });
        }
        Ok(())
    }
}

/// Scale `delay` by a jitter `factor`, clamped to `[0.5, 1.0]`.
///
/// Split out from the random draw so the bound can be checked
/// deterministically.
pub fn scale_delay(delay: Duration, factor: f64) -> Duration {
    let factor = if factor.is_nan() { 1.0 } else { factor.clamp(0.5, 1.0) };
    delay.mul_f64(factor)
}

#[cfg(feature = "jitter")]
fn jitter_factor() -> f64 {
    use rand::Rng;
    rand::rng().random_range(0.5..=1.0)
}

#[cfg(not(feature = "jitter"))]
fn jitter_factor() -> f64 {
    1.0
}
