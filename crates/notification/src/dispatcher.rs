//! The delivery state machine for one notification request.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use common::NotificationRequested;

use crate::error::{NotificationError, Result};
use crate::model::{NewNotification, Notification, NotificationContent};
use crate::repository::NotificationRepository;
use crate::retry::RetryPolicy;
use crate::senders::{NotificationSender, SenderRegistry};
use crate::templates::TemplateRegistry;

/// Default time limit of a single delivery attempt.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Records, renders and delivers notifications.
///
/// Every request gets a PENDING row before anything else happens. The row
/// is then driven to `Sent` or `Failed`:
/// - template and sender problems fail it at once (structural errors),
/// - delivery failures are retried on the [`RetryPolicy`] schedule, with
///   the attempt counter saved before each attempt.
#[derive(Clone)]
pub struct NotificationDispatcher {
    repository: Arc<dyn NotificationRepository>,
    templates: Arc<TemplateRegistry>,
    senders: Arc<SenderRegistry>,
    policy: RetryPolicy,
    send_timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(
        repository: Arc<dyn NotificationRepository>,
        templates: Arc<TemplateRegistry>,
        senders: Arc<SenderRegistry>,
    ) -> Self {
        Self {
            repository,
            templates,
            senders,
            policy: RetryPolicy::default(),
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Handles one request and returns the final state of its record.
    ///
    /// A delivery that exhausts its retry budget is not an error: the
    /// returned record is `Failed`. Errors are structural problems (the
    /// record is marked `Failed` as well) or storage failures.
    #[tracing::instrument(
        skip(self, request),
        fields(
            notification_type = %request.notification_type,
            contact_type = %request.contact_type,
            notification_id = tracing::field::Empty
        )
    )]
    pub async fn dispatch(&self, request: &NotificationRequested) -> Result<Notification> {
        let mut notification = self
            .repository
            .create(NewNotification::from(request))
            .await?;
        tracing::Span::current().record("notification_id", notification.id.as_i64());
        metrics::counter!("notifications_requested_total").increment(1);

        let prepared = self
            .templates
            .render(request.notification_type, &request.payload)
            .and_then(|content| {
                let sender = self.senders.resolve(request.contact_type)?;
                sender.validate_contact(&request.contact)?;
                Ok((content, sender))
            });

        let (content, sender) = match prepared {
            Ok(prepared) => prepared,
            Err(error) => {
                tracing::error!(%error, "notification cannot be delivered");
                self.finish_failed(&mut notification, &error.to_string()).await?;
                return Err(error);
            }
        };

        self.deliver(&mut notification, sender, &content).await?;
        Ok(notification)
    }

    async fn deliver(
        &self,
        notification: &mut Notification,
        sender: &dyn NotificationSender,
        content: &NotificationContent,
    ) -> Result<()> {
        let mut last_error = String::new();

        for attempt in self.policy.attempts() {
            if let Some(wait) = attempt.wait {
                tracing::debug!(attempt = attempt.number, ?wait, "backing off before retry");
                tokio::time::sleep(wait).await;
            }

            notification.begin_attempt()?;
            self.repository.save(notification).await?;
            metrics::counter!("notification_delivery_attempts_total").increment(1);

            match self.send_once(sender, &notification.contact, content).await {
                Ok(()) => {
                    notification.mark_sent(Utc::now())?;
                    self.repository.save(notification).await?;
                    metrics::counter!("notifications_dispatched_total", "status" => "sent")
                        .increment(1);
                    tracing::info!(attempts = notification.retry_count, "notification sent");
                    return Ok(());
                }
                Err(error) => {
                    last_error = error.to_string();
                    if attempt.last {
                        break;
                    }
                    tracing::warn!(
                        attempt = attempt.number,
                        max_attempts = self.policy.max_attempts(),
                        %error,
                        "delivery attempt failed, retrying"
                    );
                    notification.record_failure(&last_error);
                }
            }
        }

        tracing::error!(
            attempts = notification.retry_count,
            error = %last_error,
            "notification failed after exhausting retries"
        );
        self.finish_failed(notification, &last_error).await
    }

    async fn send_once(
        &self,
        sender: &dyn NotificationSender,
        contact: &str,
        content: &NotificationContent,
    ) -> Result<()> {
        let started = Instant::now();
        match tokio::time::timeout(self.send_timeout, sender.send(contact, content)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(elapsed = ?started.elapsed(), "delivery attempt timed out");
                Err(NotificationError::Timeout(self.send_timeout.as_millis() as u64))
            }
        }
    }

    async fn finish_failed(&self, notification: &mut Notification, error: &str) -> Result<()> {
        notification.mark_failed(error)?;
        self.repository.save(notification).await?;
        metrics::counter!("notifications_dispatched_total", "status" => "failed").increment(1);
        Ok(())
    }
}
