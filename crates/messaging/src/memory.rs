use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::Contract;
use tokio::sync::{Notify, RwLock};

use crate::{
    Message, MessagePosition, MessagingError, Offset, OutboundMessage, Result,
    broker::{MessageBroker, partition_for_key},
};

/// Default number of partitions per topic.
pub const DEFAULT_PARTITIONS: u32 = 8;

#[derive(Default)]
struct PartitionLog {
    messages: RwLock<Vec<Message>>,
    appended: Notify,
}

struct TopicLog {
    partitions: Vec<PartitionLog>,
}

impl TopicLog {
    fn new(partitions: u32) -> Self {
        Self {
            partitions: (0..partitions).map(|_| PartitionLog::default()).collect(),
        }
    }
}

type GroupKey = (String, String, u32);

/// In-memory broker for tests and single-process runs.
///
/// Topics are created on first use with a fixed number of partitions. Each
/// partition is an append-only log; consumer-group offsets are tracked per
/// (group, topic, partition) exactly as an external broker would.
#[derive(Clone)]
pub struct InMemoryBroker {
    partitions: u32,
    topics: Arc<RwLock<HashMap<String, Arc<TopicLog>>>>,
    offsets: Arc<RwLock<HashMap<GroupKey, Offset>>>,
    fail_on_publish: Arc<AtomicBool>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::with_partitions(DEFAULT_PARTITIONS)
    }
}

impl InMemoryBroker {
    /// Creates a broker with the default partition count.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a broker whose topics have `partitions` partitions.
    pub fn with_partitions(partitions: u32) -> Self {
        Self {
            partitions: partitions.max(1),
            topics: Arc::new(RwLock::new(HashMap::new())),
            offsets: Arc::new(RwLock::new(HashMap::new())),
            fail_on_publish: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Makes every publish fail until switched off again.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.fail_on_publish.store(fail, Ordering::SeqCst);
    }

    /// Returns every message of a topic, partition by partition.
    pub async fn messages(&self, topic: &str) -> Vec<Message> {
        let log = self.topic(topic).await;
        let mut all = Vec::new();
        for partition in &log.partitions {
            all.extend(partition.messages.read().await.iter().cloned());
        }
        all
    }

    /// Returns every message of a contract's topic, decoded.
    pub async fn published<C: Contract>(&self) -> Result<Vec<C>> {
        self.messages(C::TOPIC)
            .await
            .iter()
            .map(|m| m.decode().map_err(MessagingError::from))
            .collect()
    }

    /// Total number of messages stored on a topic.
    pub async fn message_count(&self, topic: &str) -> usize {
        self.messages(topic).await.len()
    }

    async fn topic(&self, name: &str) -> Arc<TopicLog> {
        if let Some(log) = self.topics.read().await.get(name) {
            return Arc::clone(log);
        }
        let mut topics = self.topics.write().await;
        Arc::clone(
            topics
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(TopicLog::new(self.partitions))),
        )
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn publish(&self, message: OutboundMessage) -> Result<MessagePosition> {
        if self.fail_on_publish.load(Ordering::SeqCst) {
            return Err(MessagingError::Unavailable(format!(
                "publish to {} rejected",
                message.topic
            )));
        }

        let log = self.topic(&message.topic).await;
        let partition = partition_for_key(&message.key, self.partitions);
        let target = &log.partitions[partition as usize];

        let offset = {
            let mut messages = target.messages.write().await;
            let offset = Offset::new(messages.len() as i64);
            messages.push(Message::stored(message, partition, offset));
            offset
        };
        target.appended.notify_waiters();

        Ok(MessagePosition { partition, offset })
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
        let log = self.topic(topic).await;
        let source =
            log.partitions
                .get(partition as usize)
                .ok_or_else(|| MessagingError::UnknownPartition {
                    topic: topic.to_string(),
                    partition,
                })?;

        let start = from.as_i64().max(0) as usize;
        loop {
            // Register for wake-ups before looking, so an append between the
            // check and the wait is not missed.
            let appended = source.appended.notified();
            tokio::pin!(appended);
            appended.as_mut().enable();

            {
                let messages = source.messages.read().await;
                if start < messages.len() {
                    return Ok(messages[start..]
                        .iter()
                        .take(max.max(1))
                        .cloned()
                        .collect());
                }
            }

            appended.await;
        }
    }

    async fn committed_offset(&self, group: &str, topic: &str, partition: u32) -> Result<Offset> {
        let offsets = self.offsets.read().await;
        Ok(offsets
            .get(&(group.to_string(), topic.to_string(), partition))
            .copied()
            .unwrap_or_default())
    }

    async fn commit(&self, group: &str, topic: &str, partition: u32, next: Offset) -> Result<()> {
        let mut offsets = self.offsets.write().await;
        let committed = offsets
            .entry((group.to_string(), topic.to_string(), partition))
            .or_default();
        // Commits never move backwards.
        if next > *committed {
            *committed = next;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn message(key: &str, n: i64) -> OutboundMessage {
        OutboundMessage::new("orders", key, serde_json::json!({ "n": n }))
    }

    #[tokio::test]
    async fn publish_assigns_sequential_offsets_per_partition() {
        let broker = InMemoryBroker::with_partitions(1);

        let first = broker.publish(message("1", 1)).await.unwrap();
        let second = broker.publish(message("2", 2)).await.unwrap();

        assert_eq!(first.partition, 0);
        assert_eq!(first.offset, Offset::new(0));
        assert_eq!(second.offset, Offset::new(1));
    }

    #[tokio::test]
    async fn same_key_lands_on_same_partition() {
        let broker = InMemoryBroker::with_partitions(16);

        let a = broker.publish(message("order-7", 1)).await.unwrap();
        let b = broker.publish(message("order-7", 2)).await.unwrap();

        assert_eq!(a.partition, b.partition);
        assert!(a.offset < b.offset);
    }

    #[tokio::test]
    async fn fetch_returns_from_offset_and_respects_max() {
        let broker = InMemoryBroker::with_partitions(1);
        for n in 0..5 {
            broker.publish(message("k", n)).await.unwrap();
        }

        let batch = broker.fetch("orders", 0, Offset::new(2), 2).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].offset, Offset::new(2));
        assert_eq!(batch[1].payload, serde_json::json!({ "n": 3 }));
    }

    #[tokio::test]
    async fn fetch_waits_for_new_messages() {
        let broker = InMemoryBroker::with_partitions(1);
        let reader = broker.clone();

        let pending =
            tokio::spawn(async move { reader.fetch("orders", 0, Offset::initial(), 10).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());

        broker.publish(message("k", 1)).await.unwrap();
        let batch = tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(batch.len(), 1);
    }

    #[tokio::test]
    async fn fetch_rejects_unknown_partition() {
        let broker = InMemoryBroker::with_partitions(2);
        let result = broker.fetch("orders", 5, Offset::initial(), 1).await;
        assert!(matches!(
            result,
            Err(MessagingError::UnknownPartition { partition: 5, .. })
        ));
    }

    #[tokio::test]
    async fn commits_are_per_group_and_monotonic() {
        let broker = InMemoryBroker::new();

        assert_eq!(
            broker.committed_offset("g1", "orders", 0).await.unwrap(),
            Offset::initial()
        );

        broker.commit("g1", "orders", 0, Offset::new(3)).await.unwrap();
        broker.commit("g1", "orders", 0, Offset::new(1)).await.unwrap();

        assert_eq!(
            broker.committed_offset("g1", "orders", 0).await.unwrap(),
            Offset::new(3)
        );
        assert_eq!(
            broker.committed_offset("g2", "orders", 0).await.unwrap(),
            Offset::initial()
        );
    }

    #[tokio::test]
    async fn fail_on_publish_rejects_until_cleared() {
        let broker = InMemoryBroker::new();
        broker.set_fail_on_publish(true);
        assert!(matches!(
            broker.publish(message("k", 1)).await,
            Err(MessagingError::Unavailable(_))
        ));
        assert_eq!(broker.message_count("orders").await, 0);

        broker.set_fail_on_publish(false);
        broker.publish(message("k", 1)).await.unwrap();
        assert_eq!(broker.message_count("orders").await, 1);
    }
}
