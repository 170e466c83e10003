//! Recovery strategies and their context.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

type ErrorFilter<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// What a strategy knows about the call it is rescuing.
///
/// Built fresh for every orchestrated call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryContext {
    /// Attempts made by the retry loop.
    pub attempt_count: u32,
    /// Attempts the retry policy allowed.
    pub max_attempts: u32,
    /// When the last attempt finished.
    pub last_attempt_time: Instant,
    /// Time spent from the first attempt to the last.
    pub elapsed: Duration,
    /// Caller-supplied tags for the call.
    pub metadata: BTreeMap<String, String>,
}

impl RecoveryContext {
    /// Context for a call that has not run yet.
    pub fn new(max_attempts: u32) -> Self {
        RecoveryContext {
            attempt_count: 0,
            max_attempts,
            last_attempt_time: Instant::now(),
            elapsed: Duration::ZERO,
            metadata: BTreeMap::new(),
        }
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Look up one metadata value.
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// A way to turn a terminal failure into a value.
///
/// Strategies are tried in registration order by a
/// [`RecoveryOrchestrator`](super::RecoveryOrchestrator); the first `Ok` wins.
pub trait RecoveryStrategy<T, E>: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Whether this strategy applies to `error` at all.
    fn can_recover(&self, error: &E) -> bool;

    /// Try to produce a value in place of `error`.
    fn recover(&self, error: &E, context: &RecoveryContext) -> Result<T, E>;

    /// Observe a successful result. Does nothing by default.
    fn on_success(&self, _value: &T, _context: &RecoveryContext) {}
}

/// Recover with a fixed value.
///
/// ```rust
/// use railyard::recovery::{DefaultValue, RecoveryContext, RecoveryStrategy};
/// use railyard::ErrorRecord;
///
/// let fallback = DefaultValue::new(Vec::<String>::new())
///     .when(|e: &ErrorRecord| e.code() == "LEADERBOARD_DOWN");
///
/// let err = ErrorRecord::external_service("LEADERBOARD_DOWN", "503 from leaderboard");
/// assert!(fallback.can_recover(&err));
/// assert_eq!(fallback.recover(&err, &RecoveryContext::new(3)), Ok(vec![]));
/// ```
pub struct DefaultValue<T, E> {
    value: T,
    filter: Option<ErrorFilter<E>>,
}

impl<T, E> DefaultValue<T, E> {
    /// Recover every error with `value`.
    pub fn new(value: T) -> Self {
        DefaultValue {
            value,
            filter: None,
        }
    }

    /// Only recover errors accepted by `filter`.
    pub fn when<P>(mut self, filter: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }
}

impl<T: fmt::Debug, E> fmt::Debug for DefaultValue<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultValue")
            .field("value", &self.value)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

impl<T, E> RecoveryStrategy<T, E> for DefaultValue<T, E>
where
    T: Clone + Send + Sync,
{
    fn name(&self) -> &str {
        "default_value"
    }

    fn can_recover(&self, error: &E) -> bool {
        self.filter.as_ref().is_none_or(|filter| filter(error))
    }

    fn recover(&self, _error: &E, _context: &RecoveryContext) -> Result<T, E> {
        Ok(self.value.clone())
    }
}

/// Hand out a prioritized list of fallbacks, one per recovery.
///
/// Once every value has been used the chain stops applying, and a direct
/// `recover` call fails with the original error.
///
/// ```rust
/// use railyard::recovery::{FallbackChain, RecoveryContext, RecoveryStrategy};
///
/// let mirrors = FallbackChain::new(vec!["eu-mirror", "us-mirror"]);
/// let ctx = RecoveryContext::new(1);
///
/// assert_eq!(mirrors.recover(&"primary down", &ctx), Ok("eu-mirror"));
/// assert_eq!(mirrors.recover(&"primary down", &ctx), Ok("us-mirror"));
/// assert_eq!(mirrors.recover(&"primary down", &ctx), Err("primary down"));
/// assert!(!mirrors.can_recover(&"primary down"));
/// ```
#[derive(Debug)]
pub struct FallbackChain<T> {
    values: Vec<T>,
    cursor: AtomicUsize,
}

impl<T> FallbackChain<T> {
    /// Chain over `values`, highest priority first.
    pub fn new(values: Vec<T>) -> Self {
        FallbackChain {
            values,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Fallbacks not yet handed out.
    pub fn remaining(&self) -> usize {
        self.values
            .len()
            .saturating_sub(self.cursor.load(Ordering::SeqCst))
    }

    /// Start again from the first value.
    pub fn reset(&self) {
        self.cursor.store(0, Ordering::SeqCst);
    }
}

impl<T, E> RecoveryStrategy<T, E> for FallbackChain<T>
where
    T: Clone + Send + Sync,
    E: Clone,
{
    fn name(&self) -> &str {
        "fallback_chain"
    }

    fn can_recover(&self, _error: &E) -> bool {
        self.remaining() > 0
    }

    fn recover(&self, error: &E, _context: &RecoveryContext) -> Result<T, E> {
        let next = self
            .cursor
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |i| {
                (i < self.values.len()).then_some(i + 1)
            });
        match next {
            Ok(index) => Ok(self.values[index].clone()),
            Err(_) => Err(error.clone()),
        }
    }
}

/// Serve the last successful value recorded under the same key.
///
/// The key comes from a caller-supplied function over the
/// [`RecoveryContext`], usually reading its metadata. Values are recorded
/// through [`on_success`](RecoveryStrategy::on_success) when used with an
/// orchestrator, or seeded with [`remember`](CachedValue::remember).
///
/// ```rust
/// use railyard::recovery::{CachedValue, RecoveryContext, RecoveryStrategy};
/// use std::collections::BTreeMap;
///
/// let profiles = CachedValue::new(|ctx: &RecoveryContext| ctx.metadata("player").map(str::to_string));
/// profiles.remember("ada".to_string(), 1200_u32);
///
/// let ctx = RecoveryContext::new(3)
///     .with_metadata(BTreeMap::from([("player".to_string(), "ada".to_string())]));
/// assert_eq!(profiles.recover(&"timeout", &ctx), Ok(1200));
/// ```
pub struct CachedValue<K, T> {
    key: Arc<dyn Fn(&RecoveryContext) -> Option<K> + Send + Sync>,
    cache: Mutex<HashMap<K, T>>,
}

impl<K: Eq + Hash, T> CachedValue<K, T> {
    /// Empty cache keyed by `key`.
    pub fn new<F>(key: F) -> Self
    where
        F: Fn(&RecoveryContext) -> Option<K> + Send + Sync + 'static,
    {
        CachedValue {
            key: Arc::new(key),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Record `value` under `key`, replacing any earlier value.
    pub fn remember(&self, key: K, value: T) {
        self.cache.lock().insert(key, value);
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }
}

impl<K, T> fmt::Debug for CachedValue<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedValue")
            .field("entries", &self.cache.lock().len())
            .finish_non_exhaustive()
    }
}

impl<K, T, E> RecoveryStrategy<T, E> for CachedValue<K, T>
where
    K: Eq + Hash + Send,
    T: Clone + Send,
    E: Clone,
{
    fn name(&self) -> &str {
        "cached_value"
    }

    fn can_recover(&self, _error: &E) -> bool {
        !self.is_empty()
    }

    fn recover(&self, error: &E, context: &RecoveryContext) -> Result<T, E> {
        let cached = (self.key)(context).and_then(|key| self.cache.lock().get(&key).cloned());
        cached.ok_or_else(|| error.clone())
    }

    fn on_success(&self, value: &T, context: &RecoveryContext) {
        if let Some(key) = (self.key)(context) {
            self.remember(key, value.clone());
        }
    }
}

/// Run a substitute computation in place of the failed one.
///
/// ```rust
/// use railyard::recovery::{AlternativeOperation, RecoveryContext, RecoveryStrategy};
///
/// let local_shuffle = AlternativeOperation::new("local_shuffle", |_err: &String, _ctx| {
///     Ok(vec![3, 1, 2])
/// });
///
/// let restored = local_shuffle.recover(&"rng service down".to_string(), &RecoveryContext::new(1));
/// assert_eq!(restored, Ok(vec![3, 1, 2]));
/// ```
pub struct AlternativeOperation<T, E> {
    name: String,
    operation: Box<dyn Fn(&E, &RecoveryContext) -> Result<T, E> + Send + Sync>,
    filter: Option<ErrorFilter<E>>,
}

impl<T, E> AlternativeOperation<T, E> {
    /// Substitute named `name` that runs `operation`.
    pub fn new<F>(name: impl Into<String>, operation: F) -> Self
    where
        F: Fn(&E, &RecoveryContext) -> Result<T, E> + Send + Sync + 'static,
    {
        AlternativeOperation {
            name: name.into(),
            operation: Box::new(operation),
            filter: None,
        }
    }

    /// Only run for errors accepted by `filter`.
    pub fn when<P>(mut self, filter: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }
}

impl<T, E> fmt::Debug for AlternativeOperation<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlternativeOperation")
            .field("name", &self.name)
            .field("filtered", &self.filter.is_some())
            .finish_non_exhaustive()
    }
}

impl<T, E> RecoveryStrategy<T, E> for AlternativeOperation<T, E> {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_recover(&self, error: &E) -> bool {
        self.filter.as_ref().is_none_or(|filter| filter(error))
    }

    fn recover(&self, error: &E, context: &RecoveryContext) -> Result<T, E> {
        (self.operation)(error, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::ErrorRecord;

    fn ctx_for(player: &str) -> RecoveryContext {
        RecoveryContext::new(3).with_metadata(BTreeMap::from([(
            "player".to_string(),
            player.to_string(),
        )]))
    }

    #[test]
    fn test_default_value_filter() {
        let strategy: DefaultValue<u32, ErrorRecord> =
            DefaultValue::new(0).when(|e: &ErrorRecord| e.code() == "MISS");

        assert!(strategy.can_recover(&ErrorRecord::database("MISS", "no row")));
        assert!(!strategy.can_recover(&ErrorRecord::database("LOCKED", "row locked")));
        assert_eq!(
            strategy.recover(&ErrorRecord::database("MISS", "no row"), &RecoveryContext::new(1)),
            Ok(0)
        );
    }

    #[test]
    fn test_fallback_chain_exhausts_then_fails() {
        let chain = FallbackChain::new(vec![10, 20]);
        let ctx = RecoveryContext::new(1);

        assert_eq!(chain.remaining(), 2);
        assert_eq!(chain.recover(&"down", &ctx), Ok(10));
        assert_eq!(chain.recover(&"down", &ctx), Ok(20));
        assert_eq!(chain.remaining(), 0);
        assert_eq!(chain.recover(&"down", &ctx), Err("down"));
        assert_eq!(chain.recover(&"still down", &ctx), Err("still down"));

        chain.reset();
        assert_eq!(chain.recover(&"down", &ctx), Ok(10));
    }

    #[test]
    fn test_cached_value_keyed_by_metadata() {
        let cache = CachedValue::new(|ctx: &RecoveryContext| ctx.metadata("player").map(String::from));
        assert!(!RecoveryStrategy::<u32, &str>::can_recover(&cache, &"x"));

        RecoveryStrategy::<u32, &str>::on_success(&cache, &1500, &ctx_for("grace"));
        assert_eq!(cache.len(), 1);

        assert_eq!(cache.recover(&"timeout", &ctx_for("grace")), Ok(1500));
        assert_eq!(cache.recover(&"timeout", &ctx_for("alan")), Err("timeout"));
        assert_eq!(
            cache.recover(&"timeout", &RecoveryContext::new(3)),
            Err("timeout")
        );
    }

    #[test]
    fn test_alternative_operation_sees_error_and_context() {
        let alt = AlternativeOperation::new("replay", |err: &String, ctx: &RecoveryContext| {
            if ctx.attempt_count >= 2 {
                Ok(format!("replayed after {err}"))
            } else {
                Err(err.clone())
            }
        })
        .when(|err: &String| err.starts_with("net"));

        let mut ctx = RecoveryContext::new(3);
        ctx.attempt_count = 3;
        assert!(alt.can_recover(&"net: reset".to_string()));
        assert!(!alt.can_recover(&"auth: denied".to_string()));
        assert_eq!(
            alt.recover(&"net: reset".to_string(), &ctx),
            Ok("replayed after net: reset".to_string())
        );
        assert_eq!(RecoveryStrategy::name(&alt), "replay");
    }
}
