//! Batch accumulation of error records.

use std::error::Error as StdError;
use std::fmt;

use super::record::{ErrorCategory, ErrorRecord, Severity};

/// Collects error records produced while validating a batch or a schema.
///
/// Unlike a `Result` pipeline, the collector never short-circuits: every
/// check runs and every failure is kept, in the order it was pushed.
///
/// # Examples
///
/// ```
/// use railyard::taxonomy::{ErrorCollector, ErrorRecord, Severity};
///
/// let mut errors = ErrorCollector::new();
/// errors.push(ErrorRecord::validation("NAME_EMPTY", "name is empty"));
/// errors.push(
///     ErrorRecord::validation("DECK_CORRUPT", "deck checksum mismatch")
///         .with_severity(Severity::Critical),
/// );
///
/// assert!(errors.has_errors());
/// assert_eq!(errors.critical_errors().len(), 1);
///
/// let composite = errors.into_validation_error().unwrap();
/// assert_eq!(composite.violations().len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorCollector {
    errors: Vec<ErrorRecord>,
}

impl ErrorCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one record.
    pub fn push(&mut self, error: ErrorRecord) {
        self.errors.push(error);
    }

    /// Record the error of a failed `Result` and hand back its value, if any.
    ///
    /// ```
    /// use railyard::taxonomy::{ErrorCollector, ErrorRecord};
    ///
    /// let mut errors = ErrorCollector::new();
    /// let age: Option<u32> = errors.check(Ok(30));
    /// let name: Option<String> =
    ///     errors.check(Err(ErrorRecord::validation("NAME_EMPTY", "name is empty")));
    ///
    /// assert_eq!(age, Some(30));
    /// assert_eq!(name, None);
    /// assert_eq!(errors.len(), 1);
    /// ```
    pub fn check<T>(&mut self, result: Result<T, ErrorRecord>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.push(error);
                None
            }
        }
    }

    /// Number of collected records.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// True when nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// True when at least one record was collected.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// All records in insertion order.
    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    /// Records with [`Severity::Critical`].
    pub fn critical_errors(&self) -> Vec<&ErrorRecord> {
        self.errors.iter().filter(|e| e.is_critical()).collect()
    }

    /// Records marked recoverable.
    pub fn recoverable_errors(&self) -> Vec<&ErrorRecord> {
        self.errors.iter().filter(|e| e.is_recoverable()).collect()
    }

    /// Highest severity collected, if any.
    pub fn max_severity(&self) -> Option<Severity> {
        self.errors.iter().map(ErrorRecord::severity).max()
    }

    /// Fold everything into one composite validation error.
    ///
    /// Returns `None` when nothing was collected.
    pub fn into_validation_error(self) -> Option<ValidationError> {
        if self.errors.is_empty() {
            return None;
        }
        Some(ValidationError {
            violations: self.errors.into_iter().map(Violation::from).collect(),
        })
    }

    /// `Ok(value)` when nothing was collected, otherwise the composite error.
    pub fn into_result<T>(self, value: T) -> Result<T, ValidationError> {
        match self.into_validation_error() {
            None => Ok(value),
            Some(error) => Err(error),
        }
    }
}

impl Extend<ErrorRecord> for ErrorCollector {
    fn extend<I: IntoIterator<Item = ErrorRecord>>(&mut self, iter: I) {
        self.errors.extend(iter);
    }
}

impl FromIterator<ErrorRecord> for ErrorCollector {
    fn from_iter<I: IntoIterator<Item = ErrorRecord>>(iter: I) -> Self {
        ErrorCollector {
            errors: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ErrorCollector {
    type Item = ErrorRecord;
    type IntoIter = std::vec::IntoIter<ErrorRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

/// One failed check inside a [`ValidationError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Code of the originating record.
    pub code: String,
    /// Technical message of the originating record.
    pub message: String,
    /// User-facing message of the originating record.
    pub user_message: String,
    /// Severity of the originating record.
    pub severity: Severity,
}

impl From<ErrorRecord> for Violation {
    fn from(record: ErrorRecord) -> Self {
        Violation {
            code: record.code().to_string(),
            message: record.message().to_string(),
            user_message: record.user_message().to_string(),
            severity: record.severity(),
        }
    }
}

/// Composite error carrying one [`Violation`] per collected record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    violations: Vec<Violation>,
}

impl ValidationError {
    /// Code of the composite record built by the `From` conversion.
    pub const CODE: &'static str = "VALIDATION_FAILED";

    /// The individual violations, in collection order.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Highest violation severity.
    pub fn severity(&self) -> Severity {
        self.violations
            .iter()
            .map(|v| v.severity)
            .max()
            .unwrap_or(Severity::Low)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation violation(s)", self.violations.len())?;
        for violation in &self.violations {
            write!(f, "\n  - {}: {}", violation.code, violation.message)?;
        }
        Ok(())
    }
}

impl StdError for ValidationError {}

impl From<ValidationError> for ErrorRecord {
    fn from(error: ValidationError) -> Self {
        let user_message = error
            .violations
            .iter()
            .map(|v| v.user_message.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let mut record = ErrorRecord::new(
            ValidationError::CODE,
            ErrorCategory::Validation,
            error.to_string(),
        )
        .with_severity(error.severity())
        .with_user_message(user_message)
        .with_context("violations", error.violations.len());
        for (index, violation) in error.violations.iter().enumerate() {
            record = record.with_context(
                format!("violation.{index}"),
                format!("{}: {}", violation.code, violation.message),
            );
        }
        record
    }
}
