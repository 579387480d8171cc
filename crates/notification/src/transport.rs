//! Channel transports: the last hop that actually hands a message over.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::{NotificationError, Result};
use crate::model::NotificationContent;

/// Delivers rendered content to a destination (mail relay, SMS provider).
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Sends one message. Failures are returned as
    /// [`NotificationError::Delivery`].
    async fn send(&self, contact: &str, content: &NotificationContent) -> Result<()>;
}

/// Transport that writes deliveries to the log. Used when no provider is
/// configured.
#[derive(Debug, Clone)]
pub struct LogTransport {
    channel: &'static str,
    from: Option<String>,
}

impl LogTransport {
    pub fn new(channel: &'static str) -> Self {
        Self {
            channel,
            from: None,
        }
    }

    /// Sets the sender address shown in the log.
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }
}

#[async_trait]
impl ChannelTransport for LogTransport {
    async fn send(&self, contact: &str, content: &NotificationContent) -> Result<()> {
        tracing::info!(
            channel = self.channel,
            from = self.from.as_deref().unwrap_or(""),
            to = contact,
            subject = %content.subject,
            body = %content.body,
            "notification handed to transport"
        );
        Ok(())
    }
}

/// One call made to a [`RecordingTransport`].
#[derive(Debug, Clone)]
pub struct RecordedAttempt {
    pub contact: String,
    pub content: NotificationContent,
    pub at: Instant,
    pub delivered: bool,
}

#[derive(Debug, Default)]
struct RecordingState {
    attempts: Vec<RecordedAttempt>,
    scripted_failures: VecDeque<String>,
    fail_always: Option<String>,
}

/// Transport for tests: records every call and fails on demand.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next calls fail, one per message, in order.
    pub fn fail_next<I, S>(&self, messages: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock()
            .scripted_failures
            .extend(messages.into_iter().map(Into::into));
    }

    /// Makes every call fail with `message` (or none with `None`).
    pub fn set_fail_always(&self, message: Option<&str>) {
        self.lock().fail_always = message.map(str::to_string);
    }

    /// Every call made so far.
    pub fn attempts(&self) -> Vec<RecordedAttempt> {
        self.lock().attempts.clone()
    }

    /// The calls that succeeded.
    pub fn delivered(&self) -> Vec<RecordedAttempt> {
        self.lock()
            .attempts
            .iter()
            .filter(|a| a.delivered)
            .cloned()
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, RecordingState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ChannelTransport for RecordingTransport {
    async fn send(&self, contact: &str, content: &NotificationContent) -> Result<()> {
        let mut state = self.lock();
        let failure = state
            .scripted_failures
            .pop_front()
            .or_else(|| state.fail_always.clone());

        state.attempts.push(RecordedAttempt {
            contact: contact.to_string(),
            content: content.clone(),
            at: Instant::now(),
            delivered: failure.is_none(),
        });

        match failure {
            Some(message) => Err(NotificationError::Delivery(message)),
            None => Ok(()),
        }
    }
}
