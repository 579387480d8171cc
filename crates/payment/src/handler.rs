use async_trait::async_trait;
use common::PaymentRequested;
use messaging::{HandlerError, Message, MessageBroker, MessageHandler, Publisher};

use crate::processor::PaymentProcessor;

/// Consumes `payment.requested`, charges, and publishes `payment.result`.
///
/// The result is published after the outcome was recorded; if publishing
/// fails the request is delivered again and the recorded outcome is
/// published without a new charge.
pub struct PaymentRequestedHandler<B> {
    processor: PaymentProcessor,
    broker: B,
}

impl<B: MessageBroker> PaymentRequestedHandler<B> {
    pub fn new(processor: PaymentProcessor, broker: B) -> Self {
        Self { processor, broker }
    }
}

#[async_trait]
impl<B: MessageBroker + 'static> MessageHandler for PaymentRequestedHandler<B> {
    fn name(&self) -> &'static str {
        "PaymentRequestedHandler"
    }

    #[tracing::instrument(skip_all, fields(partition = message.partition, offset = %message.offset, key = %message.key))]
    async fn handle(&self, message: &Message) -> Result<(), HandlerError> {
        let request: PaymentRequested = message.decode().map_err(|e| {
            tracing::error!(error = %e, "malformed payment request");
            HandlerError::discard(e)
        })?;

        let result = self
            .processor
            .process(&request)
            .await
            .map_err(HandlerError::retry)?;

        self.broker.publish_contract(&result).await.map_err(|e| {
            tracing::warn!(error = %e, order_id = %result.order_id, "payment result not published");
            HandlerError::retry(e)
        })?;
        Ok(())
    }
}
