//! Recovery from terminal failures.
//!
//! When retries are exhausted, a [`RecoveryOrchestrator`] hands the final
//! error to its [`RecoveryStrategy`]s in order. Four strategies ship with the
//! crate:
//!
//! - [`DefaultValue`]: a fixed value, optionally only for some errors
//! - [`FallbackChain`]: a prioritized list, one value per recovery
//! - [`CachedValue`]: the last good value recorded under the same key
//! - [`AlternativeOperation`]: a substitute computation
//!
//! Custom strategies implement the trait directly:
//!
//! ```rust
//! use railyard::recovery::{RecoveryContext, RecoveryStrategy};
//! use railyard::{ErrorCategory, ErrorRecord};
//!
//! struct GuestProfile;
//!
//! impl RecoveryStrategy<String, ErrorRecord> for GuestProfile {
//!     fn name(&self) -> &str {
//!         "guest_profile"
//!     }
//!
//!     fn can_recover(&self, error: &ErrorRecord) -> bool {
//!         error.category() == ErrorCategory::Authentication
//!     }
//!
//!     fn recover(&self, _: &ErrorRecord, _: &RecoveryContext) -> Result<String, ErrorRecord> {
//!         Ok("guest".to_string())
//!     }
//! }
//! ```

mod orchestrator;
mod strategy;

pub use orchestrator::RecoveryOrchestrator;
pub use strategy::{
    AlternativeOperation, CachedValue, DefaultValue, FallbackChain, RecoveryContext,
    RecoveryStrategy,
};

#[cfg(test)]
mod tests;
