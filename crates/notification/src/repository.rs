use async_trait::async_trait;
use common::NotificationId;

use crate::error::Result;
use crate::model::{NewNotification, Notification, NotificationStatus};

/// Storage for notification records.
///
/// Implementations reject updates that would move a record backwards: a
/// terminal status never changes and `retry_count` never decreases.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Inserts a PENDING record and returns it with its assigned id.
    async fn create(&self, new: NewNotification) -> Result<Notification>;

    /// Writes the current state of an existing record.
    async fn save(&self, notification: &Notification) -> Result<()>;

    /// Loads a record by id.
    async fn find(&self, id: NotificationId) -> Result<Option<Notification>>;

    /// Loads every record in a status, oldest first.
    async fn find_by_status(&self, status: NotificationStatus) -> Result<Vec<Notification>>;
}
