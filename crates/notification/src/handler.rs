use async_trait::async_trait;
use common::NotificationRequested;
use messaging::{HandlerError, Message, MessageHandler};

use crate::dispatcher::NotificationDispatcher;
use crate::model::NotificationStatus;

/// Consumes `notification.requested` and hands each request to the
/// dispatcher.
pub struct NotificationRequestedHandler {
    dispatcher: NotificationDispatcher,
}

impl NotificationRequestedHandler {
    pub fn new(dispatcher: NotificationDispatcher) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl MessageHandler for NotificationRequestedHandler {
    fn name(&self) -> &'static str {
        "NotificationRequestedHandler"
    }

    #[tracing::instrument(skip_all, fields(partition = message.partition, offset = %message.offset, key = %message.key))]
    async fn handle(&self, message: &Message) -> Result<(), HandlerError> {
        let request: NotificationRequested = message.decode().map_err(|e| {
            tracing::error!(error = %e, "malformed notification request");
            HandlerError::discard(e)
        })?;

        match self.dispatcher.dispatch(&request).await {
            Ok(notification) => {
                if notification.status == NotificationStatus::Failed {
                    tracing::warn!(
                        notification_id = %notification.id,
                        "notification recorded as failed"
                    );
                }
                Ok(())
            }
            Err(e) if e.is_structural() => Err(HandlerError::discard(e)),
            Err(e) => Err(HandlerError::retry(e)),
        }
    }
}
