use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::NotificationId;
use tokio::sync::RwLock;

use crate::error::{NotificationError, Result};
use crate::model::{NewNotification, Notification, NotificationStatus};
use crate::repository::NotificationRepository;

#[derive(Debug, Default)]
struct State {
    rows: BTreeMap<NotificationId, Notification>,
    next_id: i64,
}

/// In-memory notification repository for tests and database-less runs.
///
/// Enforces the same update rules as the PostgreSQL implementation.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationRepository {
    state: Arc<RwLock<State>>,
    fail_on_write: Arc<AtomicBool>,
}

impl InMemoryNotificationRepository {
    /// Creates a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every write fail until switched off again.
    pub fn set_fail_on_write(&self, fail: bool) {
        self.fail_on_write.store(fail, Ordering::SeqCst);
    }

    /// Returns every stored record, by id.
    pub async fn all(&self) -> Vec<Notification> {
        self.state.read().await.rows.values().cloned().collect()
    }

    /// Returns the number of stored records.
    pub async fn count(&self) -> usize {
        self.state.read().await.rows.len()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_on_write.load(Ordering::SeqCst) {
            return Err(NotificationError::Unavailable(
                "notification store rejected the write".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn create(&self, new: NewNotification) -> Result<Notification> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        state.next_id += 1;
        let notification = Notification::pending(NotificationId::new(state.next_id), new, Utc::now());
        state.rows.insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn save(&self, notification: &Notification) -> Result<()> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        let stored = state
            .rows
            .get_mut(&notification.id)
            .ok_or(NotificationError::NotFound(notification.id))?;

        if stored.status != notification.status
            && !stored.status.can_transition_to(notification.status)
        {
            return Err(NotificationError::InvalidTransition {
                from: stored.status,
                to: notification.status,
            });
        }
        if stored.status.is_terminal() || notification.retry_count < stored.retry_count {
            return Err(NotificationError::InvalidTransition {
                from: stored.status,
                to: notification.status,
            });
        }

        *stored = notification.clone();
        Ok(())
    }

    async fn find(&self, id: NotificationId) -> Result<Option<Notification>> {
        Ok(self.state.read().await.rows.get(&id).cloned())
    }

    async fn find_by_status(&self, status: NotificationStatus) -> Result<Vec<Notification>> {
        Ok(self
            .state
            .read()
            .await
            .rows
            .values()
            .filter(|n| n.status == status)
            .cloned()
            .collect())
    }
}
