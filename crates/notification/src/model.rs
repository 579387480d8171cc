//! Notification records and their delivery state machine.

use chrono::{DateTime, Utc};
use common::text::truncate_chars;
use common::{ContactType, NotificationId, NotificationRequested, NotificationType, Payload, UnknownVariant};
use serde::{Deserialize, Serialize};

use crate::error::{NotificationError, Result};

/// Maximum number of characters kept in `last_error`.
pub const LAST_ERROR_MAX_CHARS: usize = 500;

/// The delivery status of a notification.
///
/// State transitions:
/// ```text
/// Pending ──┬──► Sent
///           └──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    /// Recorded, delivery still being attempted.
    #[default]
    Pending,

    /// Delivered (terminal state).
    Sent,

    /// Retry budget exhausted or structurally undeliverable (terminal state).
    Failed,
}

impl NotificationStatus {
    /// Returns true if a record in this status may move to `next`.
    pub fn can_transition_to(&self, next: NotificationStatus) -> bool {
        matches!(
            (self, next),
            (NotificationStatus::Pending, NotificationStatus::Sent)
                | (NotificationStatus::Pending, NotificationStatus::Failed)
        )
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, NotificationStatus::Pending)
    }

    /// Returns the status name as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "PENDING",
            NotificationStatus::Sent => "SENT",
            NotificationStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for NotificationStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(NotificationStatus::Pending),
            "SENT" => Ok(NotificationStatus::Sent),
            "FAILED" => Ok(NotificationStatus::Failed),
            other => Err(UnknownVariant::new("notification status", other)),
        }
    }
}

/// Rendered message text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationContent {
    pub subject: String,
    pub body: String,
}

impl NotificationContent {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// The data needed to record a new notification.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub contact: String,
    pub contact_type: ContactType,
    pub notification_type: NotificationType,
    pub payload: Payload,
}

impl From<&NotificationRequested> for NewNotification {
    fn from(request: &NotificationRequested) -> Self {
        Self {
            contact: request.contact.clone(),
            contact_type: request.contact_type,
            notification_type: request.notification_type,
            payload: request.payload.clone(),
        }
    }
}

/// A persisted notification and its delivery history.
///
/// `retry_count` counts attempts made and only grows. `sent_at` is set
/// exactly when the status is `Sent`; `last_error` holds the failure of the
/// most recent attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub contact: String,
    pub contact_type: ContactType,
    pub notification_type: NotificationType,
    pub status: NotificationStatus,
    pub payload: Payload,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    /// Builds a fresh PENDING record.
    pub fn pending(id: NotificationId, new: NewNotification, now: DateTime<Utc>) -> Self {
        Self {
            id,
            contact: new.contact,
            contact_type: new.contact_type,
            notification_type: new.notification_type,
            status: NotificationStatus::Pending,
            payload: new.payload,
            retry_count: 0,
            last_error: None,
            sent_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Counts a delivery attempt and returns its number (1-based).
    pub fn begin_attempt(&mut self) -> Result<u32> {
        self.ensure_pending(NotificationStatus::Pending)?;
        self.retry_count += 1;
        self.updated_at = Utc::now();
        Ok(self.retry_count)
    }

    /// Records a failed attempt without leaving PENDING.
    pub fn record_failure(&mut self, error: &str) {
        self.last_error = Some(truncate_chars(error, LAST_ERROR_MAX_CHARS));
        self.updated_at = Utc::now();
    }

    pub fn mark_sent(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.ensure_pending(NotificationStatus::Sent)?;
        self.status = NotificationStatus::Sent;
        self.sent_at = Some(at);
        self.last_error = None;
        self.updated_at = at;
        Ok(())
    }

    pub fn mark_failed(&mut self, error: &str) -> Result<()> {
        self.ensure_pending(NotificationStatus::Failed)?;
        self.status = NotificationStatus::Failed;
        self.record_failure(error);
        Ok(())
    }

    fn ensure_pending(&self, to: NotificationStatus) -> Result<()> {
        if self.status == NotificationStatus::Pending {
            Ok(())
        } else {
            Err(NotificationError::InvalidTransition {
                from: self.status,
                to,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification() -> Notification {
        Notification::pending(
            NotificationId::new(1),
            NewNotification {
                contact: "user@example.com".into(),
                contact_type: ContactType::Email,
                notification_type: NotificationType::UserRegistered,
                payload: Payload::new(),
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_status_transitions() {
        assert!(NotificationStatus::Pending.can_transition_to(NotificationStatus::Sent));
        assert!(NotificationStatus::Pending.can_transition_to(NotificationStatus::Failed));
        assert!(!NotificationStatus::Sent.can_transition_to(NotificationStatus::Pending));
        assert!(!NotificationStatus::Failed.can_transition_to(NotificationStatus::Sent));
        assert!(NotificationStatus::Sent.is_terminal());
        assert!(!NotificationStatus::Pending.is_terminal());
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            NotificationStatus::Pending,
            NotificationStatus::Sent,
            NotificationStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<NotificationStatus>().unwrap(), status);
        }
        assert!("DELIVERED".parse::<NotificationStatus>().is_err());
    }

    #[test]
    fn test_attempts_count_up() {
        let mut n = notification();
        assert_eq!(n.begin_attempt().unwrap(), 1);
        n.record_failure("smtp down");
        assert_eq!(n.begin_attempt().unwrap(), 2);
        assert_eq!(n.status, NotificationStatus::Pending);
        assert_eq!(n.last_error.as_deref(), Some("smtp down"));
    }

    #[test]
    fn test_mark_sent_sets_timestamp_and_clears_error() {
        let mut n = notification();
        n.begin_attempt().unwrap();
        n.record_failure("timeout");
        let at = Utc::now();
        n.mark_sent(at).unwrap();

        assert_eq!(n.status, NotificationStatus::Sent);
        assert_eq!(n.sent_at, Some(at));
        assert!(n.last_error.is_none());
    }

    #[test]
    fn test_terminal_records_reject_changes() {
        let mut n = notification();
        n.mark_failed("gave up").unwrap();
        assert!(n.sent_at.is_none());

        assert!(matches!(
            n.mark_sent(Utc::now()),
            Err(NotificationError::InvalidTransition {
                from: NotificationStatus::Failed,
                to: NotificationStatus::Sent
            })
        ));
        assert!(n.begin_attempt().is_err());
    }

    #[test]
    fn test_last_error_is_truncated() {
        let mut n = notification();
        n.record_failure(&"x".repeat(2 * LAST_ERROR_MAX_CHARS));
        assert_eq!(
            n.last_error.map(|e| e.chars().count()),
            Some(LAST_ERROR_MAX_CHARS)
        );
    }
}
