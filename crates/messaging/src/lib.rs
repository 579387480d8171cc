//! Messaging layer for the settlement saga.
//!
//! The saga services never call each other; they only publish to and
//! consume from partitioned topics. This crate provides:
//! - `MessageBroker`: the broker port (publish, fetch, commit)
//! - `InMemoryBroker`: a partitioned, offset-tracking implementation
//! - `PostgresBroker`: the same log kept in PostgreSQL, shared by
//!   separately deployed services
//! - `ConsumerWorker`: the consumer loop that keeps per-key ordering and
//!   commits offsets only after the handler succeeded
//! - process runtime helpers (tracing, metrics exporter, shutdown signal)

pub mod broker;
pub mod consumer;
pub mod error;
pub mod memory;
pub mod message;
pub mod offsets;
pub mod postgres;
pub mod runtime;
#[cfg(feature = "test-support")]
pub mod testing;

pub use broker::{MessageBroker, Publisher, partition_for_key};
pub use consumer::{ConsumerConfig, ConsumerWorker, HandlerError, MessageHandler};
pub use error::{MessagingError, Result};
pub use memory::InMemoryBroker;
pub use message::{Message, MessageId, MessagePosition, Offset, OutboundMessage};
pub use postgres::PostgresBroker;
pub use runtime::{ConsumerSettings, LogFormat, Shutdown};
