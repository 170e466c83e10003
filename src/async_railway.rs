//! Asynchronous railway pipeline
//!
//! [`AsyncRailway`] is the async counterpart of [`Railway`](crate::Railway):
//! a boxed `Send` future producing a `Result`, with the same track-switching
//! vocabulary plus timeouts, retries and concurrent fan-out.
//!
//! Nothing runs until the railway is awaited, either with
//! [`run`](AsyncRailway::run) or directly, since it implements
//! [`IntoFuture`].
//!
//! ```
//! use railyard::AsyncRailway;
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let total = AsyncRailway::<_, String>::of(vec![4_u32, 8])
//!     .validate(|bets| !bets.is_empty(), "no bets placed".to_string())
//!     .bind(|bets| async move { Ok(bets.iter().sum::<u32>()) })
//!     .timeout(Duration::from_secs(1), "bet service too slow".to_string())
//!     .await;
//!
//! assert_eq!(total, Ok(12));
//! # });
//! ```
//!
//! # Timeouts cancel
//!
//! [`timeout`](AsyncRailway::timeout) races the computation against a
//! timer. When the timer wins, the computation's future is dropped, which
//! cancels it at its current await point.

use std::fmt;
use std::future::{Future, IntoFuture};
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::time::Duration;

use futures::FutureExt;

use crate::railway::run_tee;
use crate::result::PanicMessage;
use crate::retry::{RetryExecutor, RetryPolicy, TimeoutError};

/// A boxed future that is Send
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A lazily evaluated async pipeline over one `Result`.
#[must_use = "an async railway does nothing until it is awaited"]
pub struct AsyncRailway<T, E> {
    future: BoxFuture<'static, Result<T, E>>,
}

impl<T, E> fmt::Debug for AsyncRailway<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncRailway").finish_non_exhaustive()
    }
}

impl<T, E> AsyncRailway<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Start on the success track.
    pub fn of(value: T) -> Self {
        Self::from_result(Ok(value))
    }

    /// Start on the failure track.
    pub fn fail(error: E) -> Self {
        Self::from_result(Err(error))
    }

    /// Start from an existing result.
    pub fn from_result(result: Result<T, E>) -> Self {
        AsyncRailway {
            future: Box::pin(async move { result }),
        }
    }

    /// Start from a future that produces a result.
    ///
    /// ```
    /// use railyard::AsyncRailway;
    ///
    /// # tokio_test::block_on(async {
    /// let seat = AsyncRailway::from_future(async { Ok::<_, String>(3) }).await;
    /// assert_eq!(seat, Ok(3));
    /// # });
    /// ```
    pub fn from_future<Fut>(future: Fut) -> Self
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        AsyncRailway {
            future: Box::pin(future),
        }
    }

    /// Await `future`, turning a panic inside it into `Err(on_panic(..))`.
    ///
    /// The async form of [`try_catch`](crate::result::try_catch).
    ///
    /// ```
    /// use railyard::AsyncRailway;
    ///
    /// # tokio_test::block_on(async {
    /// let r: Result<u32, String> = AsyncRailway::try_catch(
    ///     async { panic!("dealer crashed") },
    ///     |p| p.into_string(),
    /// )
    /// .await;
    /// assert_eq!(r, Err("dealer crashed".to_string()));
    /// # });
    /// ```
    pub fn try_catch<Fut, H>(future: Fut, on_panic: H) -> Self
    where
        Fut: Future<Output = T> + Send + 'static,
        H: FnOnce(PanicMessage) -> E + Send + 'static,
    {
        Self::from_future(async move {
            AssertUnwindSafe(future)
                .catch_unwind()
                .await
                .map_err(|payload| on_panic(PanicMessage::from_payload(payload.as_ref())))
        })
    }

    /// Chain an async step that may fail.
    ///
    /// `f` may return any future of a `Result`, including another
    /// `AsyncRailway`.
    pub fn bind<U, F, R>(self, f: F) -> AsyncRailway<U, E>
    where
        U: Send + 'static,
        F: FnOnce(T) -> R + Send + 'static,
        R: IntoFuture<Output = Result<U, E>>,
        R::IntoFuture: Send + 'static,
    {
        AsyncRailway::from_future(async move {
            let value = self.future.await?;
            f(value).into_future().await
        })
    }

    /// Transform the success value.
    pub fn map<U, F>(self, f: F) -> AsyncRailway<U, E>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        AsyncRailway::from_future(async move { self.future.await.map(f) })
    }

    /// Transform the error value.
    pub fn map_err<E2, F>(self, f: F) -> AsyncRailway<T, E2>
    where
        E2: Send + 'static,
        F: FnOnce(E) -> E2 + Send + 'static,
    {
        AsyncRailway::from_future(async move { self.future.await.map_err(f) })
    }

    /// Move to the failure track with `error` unless `predicate` holds.
    pub fn validate<P>(self, predicate: P, error: E) -> Self
    where
        P: FnOnce(&T) -> bool + Send + 'static,
    {
        Self::from_future(async move {
            match self.future.await {
                Ok(value) if predicate(&value) => Ok(value),
                Ok(_) => Err(error),
                Err(e) => Err(e),
            }
        })
    }

    /// Switch tracks synchronously: hand the error to `f`.
    pub fn switch<E2, F>(self, f: F) -> AsyncRailway<T, E2>
    where
        E2: Send + 'static,
        F: FnOnce(E) -> Result<T, E2> + Send + 'static,
    {
        AsyncRailway::from_future(async move {
            match self.future.await {
                Ok(value) => Ok(value),
                Err(error) => f(error),
            }
        })
    }

    /// On failure, run an alternate async computation.
    ///
    /// ```
    /// use railyard::AsyncRailway;
    ///
    /// # tokio_test::block_on(async {
    /// let odds = AsyncRailway::<f64, _>::fail("odds feed down")
    ///     .recover(|_| async { Ok::<_, String>(1.5) })
    ///     .await;
    /// assert_eq!(odds, Ok(1.5));
    /// # });
    /// ```
    pub fn recover<E2, F, R>(self, f: F) -> AsyncRailway<T, E2>
    where
        E2: Send + 'static,
        F: FnOnce(E) -> R + Send + 'static,
        R: IntoFuture<Output = Result<T, E2>>,
        R::IntoFuture: Send + 'static,
    {
        AsyncRailway::from_future(async move {
            match self.future.await {
                Ok(value) => Ok(value),
                Err(error) => f(error).into_future().await,
            }
        })
    }

    /// Observe the success value. A panic in `effect` is logged and
    /// swallowed.
    pub fn tee<F>(self, effect: F) -> Self
    where
        F: FnOnce(&T) + Send + 'static,
    {
        Self::from_future(async move {
            let result = self.future.await;
            if let Ok(value) = &result {
                run_tee(|| effect(value));
            }
            result
        })
    }

    /// Fail with `error` if the computation takes longer than `duration`.
    ///
    /// Requires a tokio runtime with the time driver enabled.
    pub fn timeout(self, duration: Duration, error: E) -> Self {
        Self::from_future(async move {
            match tokio::time::timeout(duration, self.future).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::debug!(timeout = ?duration, "async railway timed out");
                    Err(error)
                }
            }
        })
    }

    /// Like [`timeout`](AsyncRailway::timeout), but reports a typed
    /// [`TimeoutError`] instead of a caller-supplied error.
    ///
    /// ```
    /// use railyard::{AsyncRailway, TimeoutError};
    /// use std::time::Duration;
    ///
    /// # tokio_test::block_on(async {
    /// let slow = AsyncRailway::<(), String>::from_future(async {
    ///     tokio::time::sleep(Duration::from_secs(10)).await;
    ///     Ok(())
    /// })
    /// .with_timeout(Duration::from_millis(10))
    /// .await;
    ///
    /// assert_eq!(slow, Err(TimeoutError::timeout(Duration::from_millis(10))));
    /// # });
    /// ```
    pub fn with_timeout(self, duration: Duration) -> AsyncRailway<T, TimeoutError<E>> {
        AsyncRailway::from_future(async move {
            match tokio::time::timeout(duration, self.future).await {
                Ok(result) => result.map_err(TimeoutError::Inner),
                Err(_) => Err(TimeoutError::Timeout { duration }),
            }
        })
    }

    /// Re-run `factory` until it succeeds or `max_attempts` is reached,
    /// sleeping `base_delay * multiplier^(attempt - 1)` between attempts.
    ///
    /// Every error is retried; the last one is returned. For jitter, caps or
    /// a retryable predicate use a [`RetryExecutor`] directly.
    ///
    /// ```
    /// use railyard::AsyncRailway;
    /// use std::sync::atomic::{AtomicU32, Ordering};
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// # tokio_test::block_on(async {
    /// let calls = Arc::new(AtomicU32::new(0));
    /// let counter = Arc::clone(&calls);
    ///
    /// let r = AsyncRailway::retry(
    ///     move || {
    ///         let n = counter.fetch_add(1, Ordering::SeqCst);
    ///         async move { if n < 2 { Err("busy") } else { Ok(n) } }
    ///     },
    ///     3,
    ///     Duration::from_millis(1),
    ///     2.0,
    /// )
    /// .await;
    ///
    /// assert_eq!(r, Ok(2));
    /// assert_eq!(calls.load(Ordering::SeqCst), 3);
    /// # });
    /// ```
    pub fn retry<F, R>(mut factory: F, max_attempts: u32, base_delay: Duration, multiplier: f64) -> Self
    where
        F: FnMut() -> R + Send + 'static,
        R: IntoFuture<Output = Result<T, E>>,
        R::IntoFuture: Send + 'static,
    {
        let policy = RetryPolicy::new()
            .with_max_attempts(max_attempts)
            .with_base_delay(base_delay)
            .with_max_delay(Duration::MAX)
            .with_backoff_multiplier(multiplier);
        let executor = RetryExecutor::always(policy);
        Self::from_future(async move {
            executor
                .retry_async(move || factory().into_future())
                .await
        })
    }

    /// Run every railway concurrently and wait for all of them.
    ///
    /// Returns `Ok` of every value in list order, or the first `Err` in list
    /// order, regardless of which railway finished first.
    pub fn all<I>(railways: I) -> AsyncRailway<Vec<T>, E>
    where
        I: IntoIterator<Item = AsyncRailway<T, E>>,
    {
        let futures: Vec<_> = railways.into_iter().map(|r| r.future).collect();
        AsyncRailway::from_future(async move {
            futures::future::join_all(futures)
                .await
                .into_iter()
                .collect()
        })
    }

    /// Run railway thunks one after another, stopping at the first failure.
    ///
    /// Thunks after the failing one are never invoked.
    pub fn sequence<I, F>(thunks: I) -> AsyncRailway<Vec<T>, E>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> AsyncRailway<T, E> + Send + 'static,
    {
        let thunks: Vec<F> = thunks.into_iter().collect();
        AsyncRailway::from_future(async move {
            let mut values = Vec::with_capacity(thunks.len());
            for thunk in thunks {
                values.push(thunk().future.await?);
            }
            Ok(values)
        })
    }

    /// Await the pipeline.
    pub async fn run(self) -> Result<T, E> {
        self.future.await
    }
}

impl<T, E> IntoFuture for AsyncRailway<T, E> {
    type Output = Result<T, E>;
    type IntoFuture = BoxFuture<'static, Result<T, E>>;

    fn into_future(self) -> Self::IntoFuture {
        self.future
    }
}

impl<T, E> From<Result<T, E>> for AsyncRailway<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn from(result: Result<T, E>) -> Self {
        AsyncRailway::from_result(result)
    }
}
