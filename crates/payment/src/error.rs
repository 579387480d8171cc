use common::PaymentId;
use messaging::MessagingError;
use thiserror::Error;

/// Errors that can occur in the payment processor.
///
/// Gateway failures are not errors at this level: they are recorded as
/// FAILED payments and reported downstream.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// A payment for this request has already been recorded.
    #[error("Payment request {0} already processed")]
    Duplicate(PaymentId),

    /// The repository could not be reached.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The outcome could not be published.
    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),
}

/// Result type for payment processor operations.
pub type Result<T> = std::result::Result<T, PaymentError>;
