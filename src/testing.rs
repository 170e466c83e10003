//! Testing utilities for code built on railyard
//!
//! Assertion macros for `Result`s and classified errors, plus [`Flaky`], a
//! scripted operation for exercising retries, breakers and recovery.
//!
//! # Examples
//!
//! ```rust
//! use railyard::testing::Flaky;
//! use railyard::{assert_category, assert_ok, ErrorCategory, ErrorRecord, RetryExecutor, RetryPolicy};
//!
//! let lookup = Flaky::fail_then(
//!     2,
//!     ErrorRecord::network("RESET", "connection reset"),
//!     "table-7",
//! );
//! let executor = RetryExecutor::new(RetryPolicy::immediate().with_max_attempts(3));
//!
//! assert_ok!(executor.retry(|| lookup.call()), "table-7");
//! assert_eq!(lookup.calls(), 3);
//!
//! let error = ErrorRecord::database("DEADLOCK", "deadlock detected");
//! assert_category!(error, ErrorCategory::Database);
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

/// An operation that replays a fixed script of outcomes.
///
/// Each [`call`](Flaky::call) yields the next scripted outcome. Once the
/// script runs out, the last outcome repeats forever.
pub struct Flaky<T, E> {
    script: Mutex<VecDeque<Result<T, E>>>,
    last: Mutex<Option<Result<T, E>>>,
    calls: AtomicUsize,
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Flaky<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flaky")
            .field("remaining", &self.script.lock().len())
            .field("calls", &self.calls())
            .finish()
    }
}

impl<T: Clone, E: Clone> Flaky<T, E> {
    /// Replay `outcomes` in order.
    ///
    /// An empty script makes [`call`](Flaky::call) panic.
    pub fn new(outcomes: impl IntoIterator<Item = Result<T, E>>) -> Self {
        Flaky {
            script: Mutex::new(outcomes.into_iter().collect()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail `failures` times with `error`, then succeed with `value`.
    pub fn fail_then(failures: usize, error: E, value: T) -> Self {
        let mut outcomes: Vec<Result<T, E>> = vec![Err(error); failures];
        outcomes.push(Ok(value));
        Self::new(outcomes)
    }

    /// Always fail with `error`.
    pub fn always_failing(error: E) -> Self {
        Self::new([Err(error)])
    }

    /// Produce the next scripted outcome.
    pub fn call(&self) -> Result<T, E> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().pop_front();
        let mut last = self.last.lock();
        match next {
            Some(outcome) => {
                *last = Some(outcome.clone());
                outcome
            }
            None => last
                .clone()
                .unwrap_or_else(|| panic!("Flaky called with an empty script")),
        }
    }
}

impl<T, E> Flaky<T, E> {
    /// How many times [`call`](Flaky::call) ran.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Assert that a `Result` is `Ok`, evaluating to the value.
///
/// With a second argument, also assert the value equals it.
///
/// # Example
///
/// ```rust
/// use railyard::assert_ok;
///
/// let seats: Result<u8, String> = Ok(4);
/// let n = assert_ok!(seats);
/// assert_ok!(Ok::<_, ()>(n * 2), 8);
/// ```
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            ::std::result::Result::Ok(value) => value,
            ::std::result::Result::Err(e) => {
                panic!("Expected Ok, got Err: {:?}", e);
            }
        }
    };
    ($result:expr, $expected:expr) => {
        match $result {
            ::std::result::Result::Ok(value) => assert_eq!(value, $expected),
            ::std::result::Result::Err(e) => {
                panic!("Expected Ok({:?}), got Err: {:?}", $expected, e);
            }
        }
    };
}

/// Assert that a `Result` is `Err`, evaluating to the error.
///
/// With a second argument, also assert the error equals it.
///
/// # Example
///
/// ```rust
/// use railyard::assert_err;
///
/// let e = assert_err!(Err::<(), _>("table closed"));
/// assert_eq!(e, "table closed");
/// assert_err!(Err::<(), _>(3), 3);
/// ```
#[macro_export]
macro_rules! assert_err {
    ($result:expr) => {
        match $result {
            ::std::result::Result::Err(e) => e,
            ::std::result::Result::Ok(value) => {
                panic!("Expected Err, got Ok: {:?}", value);
            }
        }
    };
    ($result:expr, $expected:expr) => {
        match $result {
            ::std::result::Result::Err(e) => assert_eq!(e, $expected),
            ::std::result::Result::Ok(value) => {
                panic!("Expected Err({:?}), got Ok: {:?}", $expected, value);
            }
        }
    };
}

/// Assert that an error classifies into the given category.
///
/// Accepts any [`Classify`](crate::taxonomy::Classify) value.
///
/// # Example
///
/// ```rust
/// use railyard::{assert_category, ErrorCategory, ErrorRecord};
///
/// assert_category!(ErrorRecord::network("DNS", "lookup failed"), ErrorCategory::Network);
/// ```
#[macro_export]
macro_rules! assert_category {
    ($error:expr, $category:expr) => {{
        let actual = $crate::taxonomy::Classify::category(&$error);
        assert_eq!(
            actual, $category,
            "Expected category {:?}, got {:?}",
            $category, actual
        );
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::{ErrorCategory, ErrorRecord};

    #[test]
    fn flaky_replays_script_then_repeats_last() {
        let op = Flaky::new([Err("a"), Ok(1), Err("b")]);
        assert_eq!(op.call(), Err("a"));
        assert_eq!(op.call(), Ok(1));
        assert_eq!(op.call(), Err("b"));
        assert_eq!(op.call(), Err("b"));
        assert_eq!(op.calls(), 4);
    }

    #[test]
    fn flaky_debug_shows_progress() {
        let op = Flaky::new([Err("a"), Ok(1)]);
        let _ = op.call();
        assert_eq!(format!("{op:?}"), "Flaky { remaining: 1, calls: 1 }");
    }

    #[test]
    fn flaky_fail_then() {
        let op = Flaky::fail_then(2, "down", 5);
        assert_eq!(op.call(), Err("down"));
        assert_eq!(op.call(), Err("down"));
        assert_eq!(op.call(), Ok(5));
        assert_eq!(op.call(), Ok(5));
    }

    #[test]
    fn flaky_always_failing() {
        let op: Flaky<(), _> = Flaky::always_failing("gone");
        for _ in 0..3 {
            assert_eq!(op.call(), Err("gone"));
        }
    }

    #[test]
    #[should_panic(expected = "empty script")]
    fn flaky_empty_script_panics() {
        let op: Flaky<(), ()> = Flaky::new([]);
        let _ = op.call();
    }

    #[test]
    fn assert_ok_macro() {
        let value = assert_ok!(Ok::<_, ()>(42));
        assert_eq!(value, 42);
        assert_ok!(Ok::<_, ()>("x"), "x");
    }

    #[test]
    fn assert_err_macro() {
        let e = assert_err!(Err::<(), _>("boom"));
        assert_eq!(e, "boom");
        assert_err!(Err::<(), _>(7), 7);
    }

    #[test]
    fn assert_category_macro() {
        assert_category!(
            ErrorRecord::authentication("TOKEN", "expired"),
            ErrorCategory::Authentication
        );
    }

    #[test]
    #[should_panic(expected = "Expected Ok, got Err")]
    fn assert_ok_panics_on_err() {
        assert_ok!(Err::<(), _>("boom"));
    }

    #[test]
    #[should_panic(expected = "Expected Err, got Ok")]
    fn assert_err_panics_on_ok() {
        assert_err!(Ok::<_, ()>(1));
    }

    #[test]
    #[should_panic(expected = "Expected category")]
    fn assert_category_panics_on_mismatch() {
        assert_category!(ErrorRecord::network("DNS", "lookup failed"), ErrorCategory::Database);
    }
}
