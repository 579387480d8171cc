use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::Contract;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Header carrying the saga correlation key (the partition key).
pub const HEADER_CORRELATION_ID: &str = "correlation-id";

/// Unique identifier for a published message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Creates a new random message ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a message inside one topic partition.
///
/// Offsets start at 0. A committed offset names the next message a
/// consumer group has not processed yet.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Offset(i64);

impl Offset {
    /// Creates an offset from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// The beginning of a partition.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the following offset.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw offset value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Offset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where the broker stored a published message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessagePosition {
    pub partition: u32,
    pub offset: Offset,
}

/// A message ready to be published.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub id: MessageId,
    pub topic: String,
    /// Partition key; messages with equal keys stay ordered.
    pub key: String,
    pub payload: serde_json::Value,
    pub headers: HashMap<String, String>,
}

impl OutboundMessage {
    /// Creates a message from raw parts.
    pub fn new(
        topic: impl Into<String>,
        key: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: MessageId::new(),
            topic: topic.into(),
            key: key.into(),
            payload,
            headers: HashMap::new(),
        }
    }

    /// Creates a message for a contract on its topic, keyed by its
    /// partition key, with the correlation header set.
    pub fn from_contract<C: Contract>(contract: &C) -> Result<Self, serde_json::Error> {
        let key = contract.partition_key();
        Ok(Self::new(C::TOPIC, key.clone(), serde_json::to_value(contract)?)
            .with_header(HEADER_CORRELATION_ID, key))
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// A message as delivered to consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub topic: String,
    pub key: String,
    pub partition: u32,
    pub offset: Offset,
    pub published_at: DateTime<Utc>,
    pub payload: serde_json::Value,
    pub headers: HashMap<String, String>,
}

impl Message {
    /// Builds the stored form of an outbound message.
    pub fn stored(outbound: OutboundMessage, partition: u32, offset: Offset) -> Self {
        Self {
            id: outbound.id,
            topic: outbound.topic,
            key: outbound.key,
            partition,
            offset,
            published_at: Utc::now(),
            payload: outbound.payload,
            headers: outbound.headers,
        }
    }

    /// Deserializes the payload.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }

    /// Returns a header value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Returns the correlation id header, if present.
    pub fn correlation_id(&self) -> Option<&str> {
        self.header(HEADER_CORRELATION_ID)
    }
}
