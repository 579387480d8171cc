use thiserror::Error;

/// Errors that can occur when talking to the message broker.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// The topic has no partition with this index.
    #[error("Unknown partition {partition} for topic {topic}")]
    UnknownPartition { topic: String, partition: u32 },

    /// The broker could not accept or serve the request.
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    /// A message payload could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The broker database failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The broker tables could not be migrated.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for broker operations.
pub type Result<T> = std::result::Result<T, MessagingError>;
