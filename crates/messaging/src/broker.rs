use std::sync::Arc;

use async_trait::async_trait;
use common::Contract;

use crate::{Message, MessagePosition, Offset, OutboundMessage, Result};

/// Core trait for message broker implementations.
///
/// A broker stores messages in partitioned, append-only topic logs and
/// tracks per consumer group how far each partition has been processed.
/// Delivery is at-least-once: anything past the committed offset is
/// delivered again after a restart.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Appends a message to the partition its key maps to.
    async fn publish(&self, message: OutboundMessage) -> Result<MessagePosition>;

    /// Number of partitions of a topic.
    fn partition_count(&self, topic: &str) -> u32;

    /// Returns up to `max` messages of a partition starting at `from`.
    ///
    /// Waits until at least one message exists at or after `from`. Only
    /// reads, so dropping the future early loses nothing.
    async fn fetch(
        &self,
        topic: &str,
        partition: u32,
        from: Offset,
        max: usize,
    ) -> Result<Vec<Message>>;

    /// Returns the next offset the group has not processed yet.
    async fn committed_offset(&self, group: &str, topic: &str, partition: u32) -> Result<Offset>;

    /// Records that every message before `next` has been processed.
    async fn commit(&self, group: &str, topic: &str, partition: u32, next: Offset) -> Result<()>;
}

/// Lets services hold the broker chosen at startup as `Arc<dyn MessageBroker>`.
#[async_trait]
impl<T: MessageBroker + ?Sized> MessageBroker for Arc<T> {
    async fn publish(&self, message: OutboundMessage) -> Result<MessagePosition> {
        (**self).publish(message).await
    }

    fn partition_count(&self, topic: &str) -> u32 {
        (**self).partition_count(topic)
    }

    async fn fetch(
        &self,
        topic: &str,
        partition: u32,
        from: Offset,
        max: usize,
    ) -> Result<Vec<Message>> {
        (**self).fetch(topic, partition, from, max).await
    }

    async fn committed_offset(&self, group: &str, topic: &str, partition: u32) -> Result<Offset> {
        (**self).committed_offset(group, topic, partition).await
    }

    async fn commit(&self, group: &str, topic: &str, partition: u32, next: Offset) -> Result<()> {
        (**self).commit(group, topic, partition, next).await
    }
}

/// Extension trait for publishing typed contracts.
#[async_trait]
pub trait Publisher: MessageBroker {
    /// Publishes a contract on its topic, keyed by its partition key.
    async fn publish_contract<C: Contract>(&self, contract: &C) -> Result<MessagePosition> {
        let message = OutboundMessage::from_contract(contract)?;
        self.publish(message).await
    }
}

// Blanket implementation for all MessageBroker implementations
impl<T: MessageBroker + ?Sized> Publisher for T {}

/// Maps a key to a partition with a stable FNV-1a hash, so every producer
/// routes a given key to the same partition.
pub fn partition_for_key(key: &str, partitions: u32) -> u32 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let hash = key.bytes().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    });
    (hash % u64::from(partitions.max(1))) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitioning_is_stable() {
        assert_eq!(partition_for_key("42", 8), partition_for_key("42", 8));
        assert!(partition_for_key("42", 8) < 8);
    }

    #[test]
    fn single_partition_takes_everything() {
        for key in ["1", "2", "user@example.com"] {
            assert_eq!(partition_for_key(key, 1), 0);
        }
    }

    #[test]
    fn zero_partitions_does_not_divide_by_zero() {
        assert_eq!(partition_for_key("1", 0), 0);
    }

    #[test]
    fn keys_spread_over_partitions() {
        let used: std::collections::HashSet<u32> = (0..100)
            .map(|order| partition_for_key(&order.to_string(), 8))
            .collect();
        assert!(used.len() > 1);
    }
}
