use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Message, MessageId, MessagePosition, MessagingError, Offset, OutboundMessage, Result,
    broker::{MessageBroker, partition_for_key},
};

/// Default pause between two reads of an empty partition.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// PostgreSQL-backed broker shared by separately deployed services.
///
/// Topic partitions are rows of `broker_messages`; consumer group offsets
/// live in `broker_consumer_offsets`, so a restarted consumer resumes at its
/// last commit. Every process attached to the same database must use the
/// same partition count.
#[derive(Clone)]
pub struct PostgresBroker {
    pool: PgPool,
    partitions: u32,
    poll_interval: Duration,
}

impl PostgresBroker {
    /// Creates a broker whose topics have `partitions` partitions.
    pub fn new(pool: PgPool, partitions: u32) -> Self {
        Self {
            pool,
            partitions: partitions.max(1),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Sets how long `fetch` sleeps before looking at an empty partition again.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    fn check_partition(&self, topic: &str, partition: u32) -> Result<()> {
        if partition >= self.partitions {
            return Err(MessagingError::UnknownPartition {
                topic: topic.to_string(),
                partition,
            });
        }
        Ok(())
    }

    fn row_to_message(row: PgRow) -> Result<Message> {
        let headers: HashMap<String, String> =
            serde_json::from_value(row.try_get("headers")?)?;

        Ok(Message {
            id: MessageId::from_uuid(row.try_get::<Uuid, _>("message_id")?),
            topic: row.try_get("topic")?,
            key: row.try_get("message_key")?,
            partition: row.try_get::<i32, _>("partition")? as u32,
            offset: Offset::new(row.try_get("message_offset")?),
            published_at: row.try_get("published_at")?,
            payload: row.try_get("payload")?,
            headers,
        })
    }
}

#[async_trait]
impl MessageBroker for PostgresBroker {
    async fn publish(&self, message: OutboundMessage) -> Result<MessagePosition> {
        let partition = partition_for_key(&message.key, self.partitions);
        let headers = serde_json::to_value(&message.headers)?;

        let mut tx = self.pool.begin().await?;

        // The head row stays locked until commit, so a later offset of this
        // partition can never become visible before an earlier one.
        let offset: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO broker_partition_heads (topic, partition, next_offset)
            VALUES ($1, $2, 1)
            ON CONFLICT (topic, partition)
            DO UPDATE SET next_offset = broker_partition_heads.next_offset + 1
            RETURNING next_offset - 1
            "#,
        )
        .bind(&message.topic)
        .bind(partition as i32)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO broker_messages
                (topic, partition, message_offset, message_id, message_key, payload, headers)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&message.topic)
        .bind(partition as i32)
        .bind(offset)
        .bind(message.id.as_uuid())
        .bind(&message.key)
        .bind(&message.payload)
        .bind(headers)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(MessagePosition {
            partition,
            offset: Offset::new(offset),
        })
    }

    fn partition_count(&self, _topic: &str) -> u32 {
        self.partitions
    }

    async fn fetch(
        &self,
        topic: &str,
        partition: u32,
        from: Offset,
        max: usize,
    ) -> Result<Vec<Message>> {
        self.check_partition(topic, partition)?;

        loop {
            let rows = sqlx::query(
                r#"
                SELECT topic, partition, message_offset, message_id, message_key,
                       payload, headers, published_at
                FROM broker_messages
                WHERE topic = $1 AND partition = $2 AND message_offset >= $3
                ORDER BY message_offset ASC
                LIMIT $4
                "#,
            )
            .bind(topic)
            .bind(partition as i32)
            .bind(from.as_i64().max(0))
            .bind(max.max(1) as i64)
            .fetch_all(&self.pool)
            .await?;

            if !rows.is_empty() {
                return rows.into_iter().map(Self::row_to_message).collect();
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn committed_offset(&self, group: &str, topic: &str, partition: u32) -> Result<Offset> {
        self.check_partition(topic, partition)?;

        let next: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT next_offset FROM broker_consumer_offsets
            WHERE group_name = $1 AND topic = $2 AND partition = $3
            "#,
        )
        .bind(group)
        .bind(topic)
        .bind(partition as i32)
        .fetch_optional(&self.pool)
        .await?;

        Ok(next.map(Offset::new).unwrap_or_default())
    }

    async fn commit(&self, group: &str, topic: &str, partition: u32, next: Offset) -> Result<()> {
        self.check_partition(topic, partition)?;

        // GREATEST keeps commits from moving backwards.
        sqlx::query(
            r#"
            INSERT INTO broker_consumer_offsets (group_name, topic, partition, next_offset, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (group_name, topic, partition)
            DO UPDATE SET
                next_offset = GREATEST(broker_consumer_offsets.next_offset, EXCLUDED.next_offset),
                updated_at = NOW()
            "#,
        )
        .bind(group)
        .bind(topic)
        .bind(partition as i32)
        .bind(next.as_i64())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
