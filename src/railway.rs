//! Synchronous railway pipeline
//!
//! [`Railway`] wraps one `Result` and threads it through a chain of steps.
//! Every step after the first failure is skipped, so a pipeline reads top to
//! bottom without nested `match` blocks:
//!
//! ```
//! use railyard::Railway;
//!
//! #[derive(Debug, PartialEq)]
//! enum DrawError {
//!     EmptyDeck,
//!     HandFull,
//! }
//!
//! let hand = Railway::of(vec![3, 7])
//!     .validate(|hand| hand.len() < 7, DrawError::HandFull)
//!     .bind(|mut hand| {
//!         hand.push(11);
//!         Ok(hand)
//!     })
//!     .map(|hand| hand.len())
//!     .run();
//!
//! assert_eq!(hand, Ok(3));
//!
//! let empty: Result<usize, DrawError> = Railway::fail(DrawError::EmptyDeck)
//!     .validate(|hand: &Vec<u8>| hand.len() < 7, DrawError::HandFull)
//!     .map(|hand| hand.len())
//!     .run();
//!
//! assert_eq!(empty, Err(DrawError::EmptyDeck));
//! ```
//!
//! Everything runs on the caller's stack. [`Railway::parallel`] has the
//! semantics of `AsyncRailway::all` but evaluates its thunks one after the
//! other.

use std::panic::{self, AssertUnwindSafe};

use crate::result::PanicMessage;

/// A fluent pipeline over one `Result`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[must_use = "a railway does nothing until `run` is called"]
pub struct Railway<T, E> {
    result: Result<T, E>,
}

impl<T, E> Railway<T, E> {
    /// Start on the success track.
    #[inline]
    pub fn of(value: T) -> Self {
        Railway { result: Ok(value) }
    }

    /// Start on the failure track.
    #[inline]
    pub fn fail(error: E) -> Self {
        Railway { result: Err(error) }
    }

    /// Start from an existing result.
    #[inline]
    pub fn from_result(result: Result<T, E>) -> Self {
        Railway { result }
    }

    /// True while on the success track.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// True once on the failure track.
    pub fn is_err(&self) -> bool {
        self.result.is_err()
    }

    /// Borrow the current result.
    pub fn as_result(&self) -> Result<&T, &E> {
        self.result.as_ref()
    }

    /// Chain a fallible step.
    #[inline]
    pub fn bind<U, F>(self, f: F) -> Railway<U, E>
    where
        F: FnOnce(T) -> Result<U, E>,
    {
        Railway {
            result: self.result.and_then(f),
        }
    }

    /// Transform the success value.
    #[inline]
    pub fn map<U, F>(self, f: F) -> Railway<U, E>
    where
        F: FnOnce(T) -> U,
    {
        Railway {
            result: self.result.map(f),
        }
    }

    /// Transform the error value.
    #[inline]
    pub fn map_err<E2, F>(self, f: F) -> Railway<T, E2>
    where
        F: FnOnce(E) -> E2,
    {
        Railway {
            result: self.result.map_err(f),
        }
    }

    /// Move to the failure track with `error` unless `predicate` holds.
    ///
    /// The predicate is only evaluated on the success track.
    #[inline]
    pub fn validate<P>(self, predicate: P, error: E) -> Self
    where
        P: FnOnce(&T) -> bool,
    {
        self.validate_with(predicate, move |_| error)
    }

    /// Like [`validate`](Railway::validate) but builds the error from the
    /// rejected value.
    pub fn validate_with<P, F>(self, predicate: P, error_fn: F) -> Self
    where
        P: FnOnce(&T) -> bool,
        F: FnOnce(&T) -> E,
    {
        match self.result {
            Ok(value) if predicate(&value) => Railway::of(value),
            Ok(value) => Railway::fail(error_fn(&value)),
            Err(error) => Railway::fail(error),
        }
    }

    /// Switch tracks: hand the error to `f`, which may get back on the
    /// success track.
    ///
    /// ```
    /// use railyard::Railway;
    ///
    /// let r = Railway::<u32, &str>::fail("cache miss")
    ///     .switch(|_| Ok::<_, String>(0))
    ///     .run();
    /// assert_eq!(r, Ok(0));
    /// ```
    #[inline]
    pub fn switch<E2, F>(self, f: F) -> Railway<T, E2>
    where
        F: FnOnce(E) -> Result<T, E2>,
    {
        match self.result {
            Ok(value) => Railway::of(value),
            Err(error) => Railway::from_result(f(error)),
        }
    }

    /// Observe the success value without changing the pipeline.
    ///
    /// The effect is fire-and-forget: if it panics, the panic is caught,
    /// logged at `warn`, and the pipeline continues with the original value.
    ///
    /// ```
    /// use railyard::Railway;
    ///
    /// let r = Railway::<_, ()>::of(5)
    ///     .tee(|_| panic!("analytics backend down"))
    ///     .map(|x| x + 1)
    ///     .run();
    /// assert_eq!(r, Ok(6));
    /// ```
    pub fn tee<F>(self, effect: F) -> Self
    where
        F: FnOnce(&T),
    {
        if let Ok(value) = &self.result {
            run_tee(|| effect(value));
        }
        self
    }

    /// Finish the pipeline.
    #[inline]
    pub fn run(self) -> Result<T, E> {
        self.result
    }

    /// Run pipeline thunks in order, stopping at the first failure.
    ///
    /// Thunks after the failing one are never invoked.
    ///
    /// ```
    /// use railyard::Railway;
    ///
    /// type Step = Box<dyn FnOnce() -> Railway<i32, &'static str>>;
    ///
    /// let steps: Vec<Step> = vec![
    ///     Box::new(|| Railway::of(1)),
    ///     Box::new(|| Railway::fail("shuffle failed")),
    ///     Box::new(|| Railway::of(3)),
    /// ];
    /// assert_eq!(Railway::sequence(steps).run(), Err("shuffle failed"));
    /// ```
    pub fn sequence<I, F>(thunks: I) -> Railway<Vec<T>, E>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> Railway<T, E>,
    {
        let mut values = Vec::new();
        for thunk in thunks {
            match thunk().run() {
                Ok(value) => values.push(value),
                Err(error) => return Railway::fail(error),
            }
        }
        Railway::of(values)
    }

    /// Invoke every thunk, then combine with [`all`](crate::result::all).
    ///
    /// Unlike [`sequence`](Railway::sequence), every thunk runs even after a
    /// failure; the first failure in order is the one reported.
    pub fn parallel<I, F>(thunks: I) -> Railway<Vec<T>, E>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> Railway<T, E>,
    {
        let results: Vec<Result<T, E>> = thunks.into_iter().map(|thunk| thunk().run()).collect();
        Railway::from_result(crate::result::all(results))
    }
}

impl<T, E> From<Result<T, E>> for Railway<T, E> {
    fn from(result: Result<T, E>) -> Self {
        Railway::from_result(result)
    }
}

impl<T, E> From<Railway<T, E>> for Result<T, E> {
    fn from(railway: Railway<T, E>) -> Self {
        railway.run()
    }
}

/// Run a fire-and-forget side effect, swallowing any panic.
pub(crate) fn run_tee<F: FnOnce()>(effect: F) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(effect)) {
        let message = PanicMessage::from_payload(payload.as_ref());
        tracing::warn!(panic = %message.as_str(), "tee side effect panicked; ignoring");
    }
}
