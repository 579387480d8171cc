use common::{PaymentId, PaymentStatus};
use messaging::MessagingError;
use thiserror::Error;

/// Errors that can occur in the settlement service.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// A settlement request was rejected before anything was written.
    #[error("Invalid settlement request: {0}")]
    Validation(String),

    /// The payment does not exist.
    #[error("Payment not found: {0}")]
    NotFound(PaymentId),

    /// A status change would move a payment backwards.
    #[error("Invalid payment transition from {from} to {to}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    /// The repository or order directory could not be reached.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// An event could not be published.
    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),
}

/// Result type for settlement operations.
pub type Result<T> = std::result::Result<T, SettlementError>;
