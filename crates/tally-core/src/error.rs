//! Error types for tally.

use crate::ids::IdError;
use crate::subscription::SubscriptionStatus;

/// Result type for tally operations.
pub type Result<T> = std::result::Result<T, BillingError>;

/// Errors that can occur in billing operations.
///
/// Every error is reported synchronously to the caller; nothing is retried
/// inside the core. A failed monetary computation aborts the state transition
/// it belongs to rather than completing it without its financial side effect.
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The entity kind ("plan", "subscription", ...).
        entity: &'static str,
        /// The identifier that was not found.
        id: String,
    },

    /// A transition was attempted from a state that forbids it.
    #[error("cannot {operation} a {status} subscription")]
    InvalidState {
        /// The operation that was attempted.
        operation: &'static str,
        /// The subscription status at the time of the attempt.
        status: SubscriptionStatus,
    },

    /// Plan configuration does not support the operation
    /// (inactive plan, no price for the subscription currency).
    #[error("configuration mismatch: {0}")]
    ConfigurationMismatch(String),

    /// Invalid input (negative usage, malformed charge parameters,
    /// non-contiguous graduated ranges).
    #[error("validation error: {0}")]
    Validation(String),

    /// Billing configuration error (unrecognized interval, date overflow).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A concurrent writer updated the subscription first.
    #[error("concurrent update on subscription {id}")]
    ConcurrentUpdate {
        /// The subscription that was concurrently modified.
        id: String,
    },

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}
