use common::{ContactType, NotificationId, NotificationType};
use thiserror::Error;

use crate::model::NotificationStatus;

/// Errors that can occur while dispatching notifications.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// No template is registered for the notification type.
    #[error("No template registered for notification type {0}")]
    MissingTemplate(NotificationType),

    /// No sender is registered for the contact type.
    #[error("No sender registered for contact type {0}")]
    MissingSender(ContactType),

    /// The payload lacks what the template needs.
    #[error("Invalid payload for {notification_type}: {reason}")]
    InvalidPayload {
        notification_type: NotificationType,
        reason: String,
    },

    /// The destination cannot be used on the selected channel.
    #[error("Invalid {contact_type} contact {contact:?}")]
    InvalidContact {
        contact_type: ContactType,
        contact: String,
    },

    /// The transport rejected or failed the delivery. Displays the
    /// transport's own message unchanged.
    #[error("{0}")]
    Delivery(String),

    /// A delivery attempt exceeded its time limit.
    #[error("Delivery timed out after {0}ms")]
    Timeout(u64),

    /// The notification does not exist.
    #[error("Notification not found: {0}")]
    NotFound(NotificationId),

    /// A status change would break the notification lifecycle.
    #[error("Invalid notification transition from {from} to {to}")]
    InvalidTransition {
        from: NotificationStatus,
        to: NotificationStatus,
    },

    /// The repository could not be reached.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored value could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl NotificationError {
    /// Structural errors cannot be fixed by retrying: the message is
    /// dropped after logging.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            NotificationError::MissingTemplate(_)
                | NotificationError::MissingSender(_)
                | NotificationError::InvalidPayload { .. }
                | NotificationError::InvalidContact { .. }
        )
    }

    /// Delivery failures count against the retry budget.
    pub fn is_delivery(&self) -> bool {
        matches!(
            self,
            NotificationError::Delivery(_) | NotificationError::Timeout(_)
        )
    }
}

/// Result type for notification operations.
pub type Result<T> = std::result::Result<T, NotificationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(NotificationError::MissingTemplate(NotificationType::UserRegistered).is_structural());
        assert!(
            NotificationError::InvalidContact {
                contact_type: ContactType::Email,
                contact: "nobody".into(),
            }
            .is_structural()
        );
        assert!(!NotificationError::Delivery("smtp down".into()).is_structural());
        assert!(NotificationError::Timeout(10).is_delivery());
        assert!(!NotificationError::Unavailable("db".into()).is_delivery());
    }

    #[test]
    fn delivery_error_keeps_transport_message() {
        assert_eq!(
            NotificationError::Delivery("mailbox full".into()).to_string(),
            "mailbox full"
        );
    }
}
