//! The `ErrorRecord` value and its classification enums.

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Broad family a failure belongs to.
///
/// The category drives the default retry decision (see [`should_retry`]) and
/// is fixed when the record is built.
///
/// [`should_retry`]: crate::taxonomy::should_retry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorCategory {
    /// Input failed a structural or semantic check.
    Validation,
    /// A domain rule rejected the operation.
    BusinessLogic,
    /// Transport-level failure talking to another process.
    Network,
    /// Storage layer failure.
    Database,
    /// The caller could not be identified.
    Authentication,
    /// The caller is identified but not allowed.
    Authorization,
    /// Internal failure of the host process.
    System,
    /// A third-party dependency failed.
    ExternalService,
    /// The user supplied something unusable.
    UserInput,
    /// The process is misconfigured.
    Configuration,
}

impl ErrorCategory {
    /// Every category, in declaration order.
    pub const ALL: [ErrorCategory; 10] = [
        ErrorCategory::Validation,
        ErrorCategory::BusinessLogic,
        ErrorCategory::Network,
        ErrorCategory::Database,
        ErrorCategory::Authentication,
        ErrorCategory::Authorization,
        ErrorCategory::System,
        ErrorCategory::ExternalService,
        ErrorCategory::UserInput,
        ErrorCategory::Configuration,
    ];

    /// Severity a record of this category gets unless overridden.
    pub fn default_severity(self) -> Severity {
        match self {
            ErrorCategory::Validation | ErrorCategory::UserInput => Severity::Low,
            ErrorCategory::Network
            | ErrorCategory::ExternalService
            | ErrorCategory::BusinessLogic => Severity::Medium,
            ErrorCategory::Database
            | ErrorCategory::System
            | ErrorCategory::Authentication
            | ErrorCategory::Authorization
            | ErrorCategory::Configuration => Severity::High,
        }
    }

    /// Recoverability a record of this category gets unless overridden.
    pub fn default_recoverable(self) -> bool {
        matches!(
            self,
            ErrorCategory::Network
                | ErrorCategory::ExternalService
                | ErrorCategory::Validation
                | ErrorCategory::UserInput
        )
    }

    /// Short lowercase label used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::BusinessLogic => "business_logic",
            ErrorCategory::Network => "network",
            ErrorCategory::Database => "database",
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::Authorization => "authorization",
            ErrorCategory::System => "system",
            ErrorCategory::ExternalService => "external_service",
            ErrorCategory::UserInput => "user_input",
            ErrorCategory::Configuration => "configuration",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How bad a failure is. Ordered from `Low` to `Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Severity {
    /// Cosmetic or expected.
    Low,
    /// Degrades a single operation.
    #[default]
    Medium,
    /// Breaks a feature.
    High,
    /// Threatens the whole process.
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(label)
    }
}

/// Shared cause attached to a record.
pub type Cause = Arc<dyn StdError + Send + Sync + 'static>;

/// A classified failure.
///
/// Records are built at the failure site and never mutated afterwards: the
/// builder methods consume `self`, and there are no setters. The technical
/// `message` is what `Display` prints; presentation code reads
/// [`user_message`](ErrorRecord::user_message) instead.
///
/// # Examples
///
/// ```
/// use railyard::taxonomy::{ErrorCategory, ErrorRecord, Severity};
///
/// let err = ErrorRecord::network("UPSTREAM_RESET", "connection reset by peer")
///     .with_user_message("The server is unreachable. Please try again.")
///     .with_context("host", "api.example.com");
///
/// assert_eq!(err.category(), ErrorCategory::Network);
/// assert_eq!(err.severity(), Severity::Medium);
/// assert!(err.is_recoverable());
/// assert_eq!(err.context().get("host").map(String::as_str), Some("api.example.com"));
/// ```
#[derive(Clone)]
pub struct ErrorRecord {
    code: String,
    category: ErrorCategory,
    severity: Severity,
    recoverable: bool,
    message: String,
    user_message: String,
    context: BTreeMap<String, String>,
    cause: Option<Cause>,
}

const GENERIC_USER_MESSAGE: &str = "Something went wrong. Please try again.";

impl ErrorRecord {
    /// Create a record with the category's default severity and recoverability.
    pub fn new(
        code: impl Into<String>,
        category: ErrorCategory,
        message: impl Into<String>,
    ) -> Self {
        ErrorRecord {
            code: code.into(),
            category,
            severity: category.default_severity(),
            recoverable: category.default_recoverable(),
            message: message.into(),
            user_message: GENERIC_USER_MESSAGE.to_string(),
            context: BTreeMap::new(),
            cause: None,
        }
    }

    /// Shorthand for [`ErrorCategory::Validation`].
    pub fn validation(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, ErrorCategory::Validation, message)
    }

    /// Shorthand for [`ErrorCategory::BusinessLogic`].
    pub fn business_logic(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, ErrorCategory::BusinessLogic, message)
    }

    /// Shorthand for [`ErrorCategory::Network`].
    pub fn network(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, ErrorCategory::Network, message)
    }

    /// Shorthand for [`ErrorCategory::Database`].
    pub fn database(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, ErrorCategory::Database, message)
    }

    /// Shorthand for [`ErrorCategory::Authentication`].
    pub fn authentication(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, ErrorCategory::Authentication, message)
    }

    /// Shorthand for [`ErrorCategory::Authorization`].
    pub fn authorization(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, ErrorCategory::Authorization, message)
    }

    /// Shorthand for [`ErrorCategory::System`].
    pub fn system(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, ErrorCategory::System, message)
    }

    /// Shorthand for [`ErrorCategory::ExternalService`].
    pub fn external_service(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, ErrorCategory::ExternalService, message)
    }

    /// Shorthand for [`ErrorCategory::UserInput`].
    pub fn user_input(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, ErrorCategory::UserInput, message)
    }

    /// Shorthand for [`ErrorCategory::Configuration`].
    pub fn configuration(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, ErrorCategory::Configuration, message)
    }

    /// Override the default severity.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Override the default recoverability.
    pub fn with_recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = recoverable;
        self
    }

    /// Set the message shown to end users.
    pub fn with_user_message(mut self, user_message: impl Into<String>) -> Self {
        self.user_message = user_message.into();
        self
    }

    /// Attach a diagnostic key/value pair. Later values replace earlier ones.
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    /// Attach the underlying cause.
    pub fn with_cause<C>(mut self, cause: C) -> Self
    where
        C: StdError + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Stable identifier of the failure.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Category fixed at construction.
    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    /// Severity fixed at construction.
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Whether the failure may go away on its own.
    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }

    /// Technical description, for logs.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Display string for end users.
    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    /// Diagnostic values.
    pub fn context(&self) -> &BTreeMap<String, String> {
        &self.context
    }

    /// The underlying cause, if any.
    pub fn cause(&self) -> Option<&Cause> {
        self.cause.as_ref()
    }

    /// True for [`Severity::Critical`].
    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

impl fmt::Debug for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorRecord")
            .field("code", &self.code)
            .field("category", &self.category)
            .field("severity", &self.severity)
            .field("recoverable", &self.recoverable)
            .field("message", &self.message)
            .field("user_message", &self.user_message)
            .field("context", &self.context)
            .field("cause", &self.cause.as_ref().map(|c| c.to_string()))
            .finish()
    }
}

// Causes are compared by rendered message since `dyn Error` has no equality.
impl PartialEq for ErrorRecord {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
            && self.category == other.category
            && self.severity == other.severity
            && self.recoverable == other.recoverable
            && self.message == other.message
            && self.user_message == other.user_message
            && self.context == other.context
            && self.cause.as_ref().map(|c| c.to_string())
                == other.cause.as_ref().map(|c| c.to_string())
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.category, self.code, self.message)
    }
}

impl StdError for ErrorRecord {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_ref()
            .map(|c| c.as_ref() as &(dyn StdError + 'static))
    }
}
