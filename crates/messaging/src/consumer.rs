//! Consumer loop delivering topic messages to a handler.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

use crate::broker::MessageBroker;
use crate::offsets::OffsetTracker;
use crate::{Message, Offset, Result};

/// How a handler failed to process a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// Processing could not be recorded (e.g. the database is down). The
    /// message is not committed and is delivered again.
    #[error("retryable: {0}")]
    Retry(String),

    /// The message can never be processed (malformed payload, structural
    /// configuration error). Logged and committed.
    #[error("discarded: {0}")]
    Discard(String),
}

impl HandlerError {
    pub fn retry(reason: impl std::fmt::Display) -> Self {
        HandlerError::Retry(reason.to_string())
    }

    pub fn discard(reason: impl std::fmt::Display) -> Self {
        HandlerError::Discard(reason.to_string())
    }
}

/// Processes messages of one topic for one consumer group.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// Returns the name of this handler, used in logs.
    fn name(&self) -> &'static str;

    /// Handles a single message.
    async fn handle(&self, message: &Message) -> std::result::Result<(), HandlerError>;
}

/// Settings of one consumer worker.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub group: String,
    pub topic: String,
    /// Pause before a message whose handler asked for a retry is handled again.
    pub redelivery_delay: Duration,
    /// Upper bound of fetched-but-unfinished messages per partition.
    pub max_in_flight: usize,
}

impl ConsumerConfig {
    pub fn new(group: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            topic: topic.into(),
            redelivery_delay: Duration::from_secs(1),
            max_in_flight: 256,
        }
    }

    pub fn with_redelivery_delay(mut self, delay: Duration) -> Self {
        self.redelivery_delay = delay;
        self
    }

    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = max.max(1);
        self
    }
}

/// Drives a [`MessageHandler`] over every partition of a topic.
///
/// One task runs per partition. Inside a partition, messages are routed to
/// per-key lanes: a key's messages are handled strictly in offset order,
/// while different keys proceed concurrently, so a slow message (e.g. one
/// waiting out a retry backoff) only holds up its own key. Offsets are
/// committed up to the first message that has not finished yet.
pub struct ConsumerWorker<B, H> {
    broker: B,
    handler: Arc<H>,
    config: Arc<ConsumerConfig>,
}

impl<B, H> ConsumerWorker<B, H>
where
    B: MessageBroker + Clone + 'static,
    H: MessageHandler,
{
    /// Creates a new worker.
    pub fn new(broker: B, handler: Arc<H>, config: ConsumerConfig) -> Self {
        Self {
            broker,
            handler,
            config: Arc::new(config),
        }
    }

    /// Consumes until `shutdown` flips to true (or its sender is dropped).
    #[tracing::instrument(skip_all, fields(group = %self.config.group, topic = %self.config.topic, handler = self.handler.name()))]
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let partitions = self.broker.partition_count(&self.config.topic);
        tracing::info!(partitions, "consumer started");

        let mut tasks = JoinSet::new();
        for partition in 0..partitions {
            tasks.spawn(run_partition(
                self.broker.clone(),
                Arc::clone(&self.handler),
                Arc::clone(&self.config),
                partition,
                shutdown.clone(),
            ));
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "partition consumer failed");
                    first_error.get_or_insert(e);
                }
                Err(e) => tracing::error!(error = %e, "partition consumer task aborted"),
            }
        }

        tracing::info!("consumer stopped");
        first_error.map_or(Ok(()), Err)
    }
}

struct Completion {
    key: String,
    offset: Offset,
}

struct Lane {
    sender: mpsc::UnboundedSender<Message>,
    pending: usize,
}

const FETCH_BATCH: usize = 64;

async fn run_partition<B, H>(
    broker: B,
    handler: Arc<H>,
    config: Arc<ConsumerConfig>,
    partition: u32,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()>
where
    B: MessageBroker + Clone + 'static,
    H: MessageHandler,
{
    let group = config.group.as_str();
    let topic = config.topic.as_str();

    let mut next_fetch = broker.committed_offset(group, topic, partition).await?;
    let mut tracker = OffsetTracker::new(next_fetch);
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Completion>();
    let mut lanes: HashMap<String, Lane> = HashMap::new();
    let mut lane_tasks = JoinSet::new();

    loop {
        if *shutdown.borrow() {
            break;
        }
        let can_fetch = tracker.in_flight() < config.max_in_flight;

        tokio::select! {
            biased;

            _ = shutdown.changed() => break,

            Some(done) = done_rx.recv() => {
                if let Some(next) = tracker.complete(done.offset) {
                    broker.commit(group, topic, partition, next).await?;
                }
                if let Some(lane) = lanes.get_mut(&done.key) {
                    lane.pending -= 1;
                    if lane.pending == 0 {
                        // Dropping the sender ends the idle lane task.
                        lanes.remove(&done.key);
                    }
                }
            }

            fetched = broker.fetch(topic, partition, next_fetch, FETCH_BATCH), if can_fetch => {
                for message in fetched? {
                    next_fetch = message.offset.next();
                    tracker.track(message.offset);
                    metrics::counter!("messages_consumed_total", "topic" => config.topic.clone())
                        .increment(1);

                    let lane = lanes.entry(message.key.clone()).or_insert_with(|| {
                        let (sender, receiver) = mpsc::unbounded_channel();
                        lane_tasks.spawn(run_lane(
                            Arc::clone(&handler),
                            Arc::clone(&config),
                            receiver,
                            done_tx.clone(),
                            shutdown.clone(),
                        ));
                        Lane { sender, pending: 0 }
                    });
                    lane.pending += 1;
                    if lane.sender.send(message).is_err() {
                        tracing::warn!(partition, "lane closed before message could be queued");
                    }
                }
            }
        }
    }

    drop(lanes);
    drop(done_tx);
    while lane_tasks.join_next().await.is_some() {}

    // Commit what the lanes finished while shutting down.
    while let Ok(done) = done_rx.try_recv() {
        if let Some(next) = tracker.complete(done.offset) {
            broker.commit(group, topic, partition, next).await?;
        }
    }

    Ok(())
}

async fn run_lane<H: MessageHandler>(
    handler: Arc<H>,
    config: Arc<ConsumerConfig>,
    mut receiver: mpsc::UnboundedReceiver<Message>,
    done: mpsc::UnboundedSender<Completion>,
    mut shutdown: watch::Receiver<bool>,
) {
    while let Some(message) = receiver.recv().await {
        if *shutdown.borrow() {
            return;
        }

        let mut delivery = 1u32;
        loop {
            let outcome = AssertUnwindSafe(handler.handle(&message))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(HandlerError::discard("handler panicked")));

            match outcome {
                Ok(()) => break,
                Err(HandlerError::Discard(reason)) => {
                    tracing::error!(
                        handler = handler.name(),
                        topic = %message.topic,
                        partition = message.partition,
                        offset = %message.offset,
                        key = %message.key,
                        %reason,
                        "message discarded"
                    );
                    break;
                }
                Err(HandlerError::Retry(reason)) => {
                    tracing::warn!(
                        handler = handler.name(),
                        topic = %message.topic,
                        offset = %message.offset,
                        key = %message.key,
                        delivery,
                        %reason,
                        "message will be redelivered"
                    );
                    metrics::counter!("messages_redelivered_total", "topic" => message.topic.clone())
                        .increment(1);
                    delivery += 1;

                    tokio::select! {
                        _ = tokio::time::sleep(config.redelivery_delay) => {}
                        // Left uncommitted; the next run picks it up again.
                        _ = shutdown.changed() => return,
                    }
                }
            }
        }

        if done
            .send(Completion {
                key: message.key.clone(),
                offset: message.offset,
            })
            .is_err()
        {
            return;
        }
    }
}
