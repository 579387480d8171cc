use async_trait::async_trait;
use common::PaymentResult;
use messaging::{HandlerError, Message, MessageBroker, MessageHandler};

use crate::reconciler::ResultReconciler;

/// Consumes `payment.result` into the reconciler.
///
/// Malformed results are discarded. A notification request that could not be
/// published is retried; the outcome is then already applied, so the retry
/// only publishes.
pub struct PaymentResultHandler<B> {
    reconciler: ResultReconciler<B>,
}

impl<B: MessageBroker> PaymentResultHandler<B> {
    pub fn new(reconciler: ResultReconciler<B>) -> Self {
        Self { reconciler }
    }
}

#[async_trait]
impl<B: MessageBroker + 'static> MessageHandler for PaymentResultHandler<B> {
    fn name(&self) -> &'static str {
        "PaymentResultHandler"
    }

    #[tracing::instrument(skip_all, fields(partition = message.partition, offset = %message.offset, key = %message.key))]
    async fn handle(&self, message: &Message) -> Result<(), HandlerError> {
        let result: PaymentResult = message.decode().map_err(|e| {
            tracing::error!(error = %e, "malformed payment result");
            HandlerError::discard(e)
        })?;

        self.reconciler
            .reconcile(&result)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "notification request not published");
                HandlerError::retry(e)
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use common::{NotificationRequested, NotificationType, OrderId, PaymentId, PaymentStatus};
    use messaging::{InMemoryBroker, Offset, OutboundMessage};
    use serde_json::json;

    use super::*;
    use crate::directory::InMemoryOrderDirectory;
    use crate::memory::InMemorySettlementPaymentRepository;
    use crate::model::{CustomerContact, NewSettlementPayment};
    use crate::repository::SettlementPaymentRepository;

    fn handler(
        repository: &InMemorySettlementPaymentRepository,
        broker: &InMemoryBroker,
    ) -> PaymentResultHandler<InMemoryBroker> {
        PaymentResultHandler::new(ResultReconciler::new(
            Arc::new(repository.clone()),
            Arc::new(InMemoryOrderDirectory::new()),
            broker.clone(),
        ))
    }

    fn result_message(value: serde_json::Value) -> Message {
        Message::stored(
            OutboundMessage::new("payment.result", "5", value),
            0,
            Offset::initial(),
        )
    }

    #[tokio::test]
    async fn test_unknown_payment_result_is_handled() {
        let repository = InMemorySettlementPaymentRepository::new();
        let broker = InMemoryBroker::new();

        handler(&repository, &broker)
            .handle(&result_message(
                json!({"orderId": 5, "paymentId": 999, "status": "SUCCEEDED"}),
            ))
            .await
            .unwrap();

        let notifications = broker.published::<NotificationRequested>().await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(
            notifications[0].notification_type,
            NotificationType::PaymentSuccess
        );
    }

    #[tokio::test]
    async fn test_publish_failure_is_retried_once_applied() {
        let repository = InMemorySettlementPaymentRepository::new();
        let broker = InMemoryBroker::new();
        let handler = handler(&repository, &broker);
        let payment = repository
            .create(NewSettlementPayment {
                order_id: OrderId::new(5),
                amount: common::Money::from_minor_units(1000),
                contact: Some(CustomerContact::email("user@example.com")),
            })
            .await
            .unwrap();
        let message = result_message(json!({
            "orderId": 5,
            "paymentId": payment.id.as_i64(),
            "status": "SUCCEEDED",
            "externalPaymentId": "pi_1"
        }));

        broker.set_fail_on_publish(true);
        assert!(matches!(
            handler.handle(&message).await,
            Err(HandlerError::Retry(_))
        ));
        assert_eq!(
            repository.find(payment.id).await.unwrap().unwrap().status,
            PaymentStatus::Succeeded
        );

        broker.set_fail_on_publish(false);
        handler.handle(&message).await.unwrap();
        assert_eq!(broker.message_count("notification.requested").await, 1);
        assert_eq!(
            repository.find(PaymentId::new(1)).await.unwrap().unwrap().external_payment_id.as_deref(),
            Some("pi_1")
        );
    }

    #[tokio::test]
    async fn test_malformed_result_is_discarded() {
        let repository = InMemorySettlementPaymentRepository::new();
        let broker = InMemoryBroker::new();

        let result = handler(&repository, &broker)
            .handle(&result_message(json!({"orderId": 5, "status": "MAYBE"})))
            .await;
        assert!(matches!(result, Err(HandlerError::Discard(_))));
        assert_eq!(broker.message_count("notification.requested").await, 0);
    }
}
