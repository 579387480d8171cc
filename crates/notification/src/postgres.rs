use async_trait::async_trait;
use chrono::Utc;
use common::{NotificationId, Payload};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::error::{NotificationError, Result};
use crate::model::{NewNotification, Notification, NotificationStatus};
use crate::repository::NotificationRepository;

const COLUMNS: &str = "id, contact, contact_type, notification_type, status, payload, \
                       retry_count, last_error, sent_at, created_at, updated_at";

/// PostgreSQL-backed notification repository.
#[derive(Clone)]
pub struct PostgresNotificationRepository {
    pool: PgPool,
}

impl PostgresNotificationRepository {
    /// Creates a new repository over a pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    fn row_to_notification(row: PgRow) -> Result<Notification> {
        let payload: serde_json::Value = row.try_get("payload")?;
        let payload: Payload = match payload {
            serde_json::Value::Null => Payload::new(),
            other => serde_json::from_value(other)?,
        };
        let retry_count: i32 = row.try_get("retry_count")?;

        Ok(Notification {
            id: NotificationId::new(row.try_get("id")?),
            contact: row.try_get("contact")?,
            contact_type: parse_column(&row, "contact_type")?,
            notification_type: parse_column(&row, "notification_type")?,
            status: parse_column(&row, "status")?,
            payload,
            retry_count: u32::try_from(retry_count).unwrap_or_default(),
            last_error: row.try_get("last_error")?,
            sent_at: row.try_get("sent_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

fn parse_column<T>(row: &PgRow, column: &str) -> Result<T>
where
    T: std::str::FromStr<Err = common::UnknownVariant>,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e: common::UnknownVariant| {
        NotificationError::Database(sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: Box::new(e),
        })
    })
}

#[async_trait]
impl NotificationRepository for PostgresNotificationRepository {
    async fn create(&self, new: NewNotification) -> Result<Notification> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO notifications (contact, contact_type, notification_type, status, payload)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&new.contact)
        .bind(new.contact_type.as_str())
        .bind(new.notification_type.as_str())
        .bind(NotificationStatus::Pending.as_str())
        .bind(serde_json::Value::Object(new.payload))
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_notification(row)
    }

    async fn save(&self, notification: &Notification) -> Result<()> {
        // Only PENDING rows change, and never to a smaller retry count.
        let updated = sqlx::query(
            r#"
            UPDATE notifications
            SET status = $2, retry_count = $3, last_error = $4, sent_at = $5, updated_at = $6
            WHERE id = $1 AND status = 'PENDING' AND retry_count <= $3
            "#,
        )
        .bind(notification.id.as_i64())
        .bind(notification.status.as_str())
        .bind(i32::try_from(notification.retry_count).unwrap_or(i32::MAX))
        .bind(&notification.last_error)
        .bind(notification.sent_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 1 {
            return Ok(());
        }

        match self.find(notification.id).await? {
            None => Err(NotificationError::NotFound(notification.id)),
            Some(stored) => Err(NotificationError::InvalidTransition {
                from: stored.status,
                to: notification.status,
            }),
        }
    }

    async fn find(&self, id: NotificationId) -> Result<Option<Notification>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM notifications WHERE id = $1"))
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_notification).transpose()
    }

    async fn find_by_status(&self, status: NotificationStatus) -> Result<Vec<Notification>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM notifications WHERE status = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_notification).collect()
    }
}
