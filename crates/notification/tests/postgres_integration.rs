//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p notification --test postgres_integration -- --test-threads=1
//! ```

use chrono::Utc;
use common::{ContactType, NotificationType, Payload};
use messaging::testing::fresh_pool;
use notification::{
    NewNotification, NotificationError, NotificationRepository, NotificationStatus,
    PostgresNotificationRepository,
};

const SCHEMA: &str = include_str!("../migrations/001_create_notifications_table.sql");

/// Get a fresh repository with its own pool and a cleared table
async fn get_test_repository() -> PostgresNotificationRepository {
    PostgresNotificationRepository::new(fresh_pool(SCHEMA, &["notifications"]).await)
}

fn payment_notification() -> NewNotification {
    let payload: Payload =
        serde_json::from_value(serde_json::json!({"paymentId": 100, "orderId": 1, "amount": 99.99}))
            .unwrap();
    NewNotification {
        contact: "user@example.com".into(),
        contact_type: ContactType::Email,
        notification_type: NotificationType::PaymentSuccess,
        payload,
    }
}

#[tokio::test]
async fn create_returns_pending_row() {
    let repo = get_test_repository().await;

    let created = repo.create(payment_notification()).await.unwrap();
    assert_eq!(created.status, NotificationStatus::Pending);
    assert_eq!(created.retry_count, 0);
    assert!(created.sent_at.is_none());
    assert_eq!(created.payload["orderId"], serde_json::json!(1));

    let found = repo.find(created.id).await.unwrap().unwrap();
    assert_eq!(found.contact_type, ContactType::Email);
    assert_eq!(found.notification_type, NotificationType::PaymentSuccess);
}

#[tokio::test]
async fn attempts_and_sent_state_are_persisted() {
    let repo = get_test_repository().await;
    let mut n = repo.create(payment_notification()).await.unwrap();

    n.begin_attempt().unwrap();
    n.record_failure("smtp 451");
    repo.save(&n).await.unwrap();
    n.begin_attempt().unwrap();
    n.mark_sent(Utc::now()).unwrap();
    repo.save(&n).await.unwrap();

    let found = repo.find(n.id).await.unwrap().unwrap();
    assert_eq!(found.status, NotificationStatus::Sent);
    assert_eq!(found.retry_count, 2);
    assert!(found.sent_at.is_some());
    assert!(found.last_error.is_none());
}

#[tokio::test]
async fn terminal_rows_cannot_be_overwritten() {
    let repo = get_test_repository().await;
    let created = repo.create(payment_notification()).await.unwrap();

    let mut failed = created.clone();
    failed.mark_failed("gave up").unwrap();
    repo.save(&failed).await.unwrap();

    let result = repo.save(&created).await;
    assert!(matches!(
        result,
        Err(NotificationError::InvalidTransition {
            from: NotificationStatus::Failed,
            ..
        })
    ));
}

#[tokio::test]
async fn find_by_status_lists_oldest_first() {
    let repo = get_test_repository().await;
    let first = repo.create(payment_notification()).await.unwrap();
    let second = repo.create(payment_notification()).await.unwrap();
    let mut third = repo.create(payment_notification()).await.unwrap();
    third.mark_failed("invalid contact").unwrap();
    repo.save(&third).await.unwrap();

    let pending = repo
        .find_by_status(NotificationStatus::Pending)
        .await
        .unwrap();
    assert_eq!(
        pending.iter().map(|n| n.id).collect::<Vec<_>>(),
        vec![first.id, second.id]
    );
    assert_eq!(
        repo.find_by_status(NotificationStatus::Failed)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn save_unknown_row_is_not_found() {
    let repo = get_test_repository().await;
    let mut n = repo.create(payment_notification()).await.unwrap();
    sqlx::query("DELETE FROM notifications")
        .execute(repo.pool())
        .await
        .unwrap();

    n.begin_attempt().unwrap();
    assert!(matches!(
        repo.save(&n).await,
        Err(NotificationError::NotFound(_))
    ));
}
