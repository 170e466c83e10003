//! Failure classification.
//!
//! Every failure that flows through railyard can be described by three
//! facts fixed at the failure site:
//!
//! - **category**: what kind of thing broke ([`ErrorCategory`])
//! - **severity**: how bad it is ([`Severity`])
//! - **recoverable**: whether it may go away on its own
//!
//! From these the pure [`should_retry`] predicate decides whether a failure
//! is worth another attempt:
//!
//! | Category | Retried |
//! |----------|---------|
//! | Network, ExternalService | always |
//! | System | only when recoverable |
//! | everything else | never |
//!
//! # Examples
//!
//! ```
//! use railyard::taxonomy::{should_retry, ErrorRecord};
//!
//! assert!(should_retry(&ErrorRecord::network("RESET", "connection reset")));
//! assert!(!should_retry(&ErrorRecord::validation("EMPTY", "name is empty")));
//! assert!(should_retry(
//!     &ErrorRecord::system("BUSY", "worker pool saturated").with_recoverable(true)
//! ));
//! ```

mod collector;
mod record;

pub use collector::{ErrorCollector, ValidationError, Violation};
pub use record::{Cause, ErrorCategory, ErrorRecord, Severity};

/// Decide whether a failure should be retried.
///
/// True iff the category is `Network` or `ExternalService`, or the category
/// is `System` and the failure is recoverable.
pub fn should_retry<E: Classify + ?Sized>(error: &E) -> bool {
    match error.category() {
        ErrorCategory::Network | ErrorCategory::ExternalService => true,
        ErrorCategory::System => error.is_recoverable(),
        _ => false,
    }
}

/// Errors that carry a taxonomy classification.
///
/// Implementing this trait lets a custom error type use the default retry
/// decision of [`RetryExecutor::new`] and the category filter of
/// [`CircuitBreaker::with_expected_categories`].
///
/// [`RetryExecutor::new`]: crate::retry::RetryExecutor::new
/// [`CircuitBreaker::with_expected_categories`]: crate::breaker::CircuitBreaker::with_expected_categories
///
/// # Examples
///
/// ```
/// use railyard::taxonomy::{Classify, ErrorCategory};
///
/// #[derive(Debug)]
/// enum FetchError {
///     Timeout,
///     NotFound,
/// }
///
/// impl Classify for FetchError {
///     fn category(&self) -> ErrorCategory {
///         match self {
///             FetchError::Timeout => ErrorCategory::Network,
///             FetchError::NotFound => ErrorCategory::BusinessLogic,
///         }
///     }
///
///     fn is_recoverable(&self) -> bool {
///         matches!(self, FetchError::Timeout)
///     }
/// }
///
/// assert!(FetchError::Timeout.should_retry());
/// assert!(!FetchError::NotFound.should_retry());
/// ```
pub trait Classify {
    /// Category of the failure.
    fn category(&self) -> ErrorCategory;

    /// Whether the failure may go away on its own.
    fn is_recoverable(&self) -> bool;

    /// Severity of the failure. Defaults to the category's default.
    fn severity(&self) -> Severity {
        self.category().default_severity()
    }

    /// See [`should_retry`].
    fn should_retry(&self) -> bool {
        should_retry(self)
    }
}

impl Classify for ErrorRecord {
    fn category(&self) -> ErrorCategory {
        ErrorRecord::category(self)
    }

    fn is_recoverable(&self) -> bool {
        ErrorRecord::is_recoverable(self)
    }

    fn severity(&self) -> Severity {
        ErrorRecord::severity(self)
    }
}

impl<C: Classify + ?Sized> Classify for Box<C> {
    fn category(&self) -> ErrorCategory {
        (**self).category()
    }

    fn is_recoverable(&self) -> bool {
        (**self).is_recoverable()
    }

    fn severity(&self) -> Severity {
        (**self).severity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_retry_transient_categories() {
        for category in [ErrorCategory::Network, ErrorCategory::ExternalService] {
            let err = ErrorRecord::new("X", category, "x").with_recoverable(false);
            assert!(should_retry(&err), "{category} should be retried");
        }
    }

    #[test]
    fn test_should_retry_system_depends_on_recoverable() {
        let terminal = ErrorRecord::system("CRASH", "worker crashed");
        assert!(!should_retry(&terminal));

        let transient = terminal.clone().with_recoverable(true);
        assert!(should_retry(&transient));
    }

    #[test]
    fn test_should_retry_never_for_terminal_categories() {
        for category in ErrorCategory::ALL {
            if matches!(
                category,
                ErrorCategory::Network | ErrorCategory::ExternalService | ErrorCategory::System
            ) {
                continue;
            }
            let err = ErrorRecord::new("X", category, "x").with_recoverable(true);
            assert!(!should_retry(&err), "{category} must not be retried");
        }
    }

    #[test]
    fn test_classify_trait_matches_free_function() {
        let err = ErrorRecord::external_service("PAYMENTS_DOWN", "payments unavailable");
        assert_eq!(err.should_retry(), should_retry(&err));
        assert_eq!(Classify::severity(&err), Severity::Medium);
    }

    #[test]
    fn test_boxed_classify() {
        let boxed: Box<ErrorRecord> = Box::new(ErrorRecord::network("RESET", "reset"));
        assert!(boxed.should_retry());
    }
}
