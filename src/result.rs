//! Result algebra
//!
//! railyard uses `std::result::Result` as its success/failure sum type and
//! adds the missing vocabulary on top of it:
//!
//! - [`ok`] / [`err`] constructors
//! - [`ResultExt`]: `fold`, `get_or`, `get_or_else`, `recover`, `bind`, `tee`
//! - [`all`] / [`any`] over many results
//! - [`try_catch`]: the one place a panic becomes an `Err`
//!
//! `map` and `and_then` come from `std` and already short-circuit: on `Err`
//! the closure is never invoked and the error is returned unchanged.
//!
//! # Panics are not errors
//!
//! No combinator here catches panics. A bug inside a `map` closure unwinds
//! like any other Rust panic. Code that calls into something that may panic
//! and wants a value instead opts in at that call site with [`try_catch`].
//!
//! # Examples
//!
//! ```
//! use railyard::result::{all, err, ok, ResultExt};
//!
//! let total = all(vec![ok::<_, String>(1), ok(2), ok(3)])
//!     .map(|xs| xs.iter().sum::<i32>())
//!     .get_or(0);
//! assert_eq!(total, 6);
//!
//! let label = err::<i32, _>("no cards left").fold(
//!     |e| format!("failed: {e}"),
//!     |n| format!("drew {n}"),
//! );
//! assert_eq!(label, "failed: no cards left");
//! ```

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Wrap a value in `Ok`.
#[inline]
pub fn ok<T, E>(value: T) -> Result<T, E> {
    Ok(value)
}

/// Wrap an error in `Err`.
#[inline]
pub fn err<T, E>(error: E) -> Result<T, E> {
    Err(error)
}

/// Extra combinators for `Result`.
pub trait ResultExt<T, E>: Sized {
    /// Collapse both variants into one value.
    ///
    /// ```
    /// use railyard::result::ResultExt;
    ///
    /// let r: Result<i32, &str> = Ok(2);
    /// assert_eq!(r.fold(|_| 0, |n| n * 10), 20);
    /// ```
    fn fold<U, FE, FT>(self, on_err: FE, on_ok: FT) -> U
    where
        FE: FnOnce(E) -> U,
        FT: FnOnce(T) -> U;

    /// The `Ok` value, or `default`.
    fn get_or(self, default: T) -> T;

    /// The `Ok` value, or one computed from the error.
    fn get_or_else<F>(self, f: F) -> T
    where
        F: FnOnce(E) -> T;

    /// Give an `Err` a second chance; `Ok` passes through untouched.
    ///
    /// ```
    /// use railyard::result::ResultExt;
    ///
    /// let r: Result<i32, &str> = Err("cache miss");
    /// let r: Result<i32, String> = r.recover(|_| Ok(7));
    /// assert_eq!(r, Ok(7));
    /// ```
    fn recover<E2, F>(self, f: F) -> Result<T, E2>
    where
        F: FnOnce(E) -> Result<T, E2>;

    /// Railway name for `and_then`.
    fn bind<U, F>(self, f: F) -> Result<U, E>
    where
        F: FnOnce(T) -> Result<U, E>;

    /// Run a side effect on the `Ok` value and pass the result on unchanged.
    fn tee<F>(self, f: F) -> Self
    where
        F: FnOnce(&T);

    /// Run a side effect on the `Err` value and pass the result on unchanged.
    fn tee_err<F>(self, f: F) -> Self
    where
        F: FnOnce(&E);
}

impl<T, E> ResultExt<T, E> for Result<T, E> {
    #[inline]
    fn fold<U, FE, FT>(self, on_err: FE, on_ok: FT) -> U
    where
        FE: FnOnce(E) -> U,
        FT: FnOnce(T) -> U,
    {
        match self {
            Ok(value) => on_ok(value),
            Err(error) => on_err(error),
        }
    }

    #[inline]
    fn get_or(self, default: T) -> T {
        match self {
            Ok(value) => value,
            Err(_) => default,
        }
    }

    #[inline]
    fn get_or_else<F>(self, f: F) -> T
    where
        F: FnOnce(E) -> T,
    {
        match self {
            Ok(value) => value,
            Err(error) => f(error),
        }
    }

    #[inline]
    fn recover<E2, F>(self, f: F) -> Result<T, E2>
    where
        F: FnOnce(E) -> Result<T, E2>,
    {
        match self {
            Ok(value) => Ok(value),
            Err(error) => f(error),
        }
    }

    #[inline]
    fn bind<U, F>(self, f: F) -> Result<U, E>
    where
        F: FnOnce(T) -> Result<U, E>,
    {
        self.and_then(f)
    }

    #[inline]
    fn tee<F>(self, f: F) -> Self
    where
        F: FnOnce(&T),
    {
        if let Ok(value) = &self {
            f(value);
        }
        self
    }

    #[inline]
    fn tee_err<F>(self, f: F) -> Self
    where
        F: FnOnce(&E),
    {
        if let Err(error) = &self {
            f(error);
        }
        self
    }
}

/// Combine results: the first `Err` in order, or `Ok` of every value.
///
/// Stops pulling from the iterator at the first `Err`.
///
/// ```
/// use railyard::result::all;
///
/// assert_eq!(all(vec![Ok::<_, &str>(1), Ok(2)]), Ok(vec![1, 2]));
/// assert_eq!(all(vec![Ok(1), Err("a"), Err("b")]), Err("a"));
/// ```
pub fn all<T, E, I>(results: I) -> Result<Vec<T>, E>
where
    I: IntoIterator<Item = Result<T, E>>,
{
    results.into_iter().collect()
}

/// Pick a winner: the first `Ok`, or `Err` of every error in order.
///
/// ```
/// use railyard::result::any;
///
/// assert_eq!(any(vec![Err("a"), Ok(2), Ok(3)]), Ok(2));
/// assert_eq!(any(vec![Err::<i32, _>("a"), Err("b")]), Err(vec!["a", "b"]));
/// ```
pub fn any<T, E, I>(results: I) -> Result<T, Vec<E>>
where
    I: IntoIterator<Item = Result<T, E>>,
{
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(value) => return Ok(value),
            Err(error) => errors.push(error),
        }
    }
    Err(errors)
}

/// Message recovered from a caught panic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicMessage(String);

impl PanicMessage {
    /// Extract the message from a panic payload.
    ///
    /// `panic!` payloads are `&'static str` or `String`; anything else is
    /// reported as an opaque panic.
    pub fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "panic with non-string payload".to_string()
        };
        PanicMessage(message)
    }

    /// The panic message.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the owned message.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PanicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panicked: {}", self.0)
    }
}

impl StdError for PanicMessage {}

/// Run host code and turn a panic into `Err`.
///
/// This is the explicit boundary adapter: the closure runs under
/// `catch_unwind`, and if it panics `on_panic` maps the recovered message to
/// the caller's error type. Only unwinding panics are caught; with
/// `panic = "abort"` the process still aborts.
///
/// # Examples
///
/// ```
/// use railyard::result::try_catch;
/// use railyard::taxonomy::ErrorRecord;
///
/// let parsed = try_catch(
///     || "42".parse::<u32>().unwrap(),
///     |p| ErrorRecord::system("PARSER_PANIC", p.to_string()),
/// );
/// assert_eq!(parsed, Ok(42));
///
/// let crashed: Result<u32, ErrorRecord> = try_catch(
///     || panic!("deck is empty"),
///     |p| ErrorRecord::system("PARSER_PANIC", p.to_string()),
/// );
/// assert_eq!(crashed.unwrap_err().message(), "panicked: deck is empty");
/// ```
pub fn try_catch<T, E, F, H>(f: F, on_panic: H) -> Result<T, E>
where
    F: FnOnce() -> T,
    H: FnOnce(PanicMessage) -> E,
{
    panic::catch_unwind(AssertUnwindSafe(f))
        .map_err(|payload| on_panic(PanicMessage::from_payload(payload.as_ref())))
}
