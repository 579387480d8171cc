//! Applying payment outcomes on the initiator side.

use std::sync::Arc;

use common::{
    ContactType, Money, NotificationRequested, NotificationType, Payload, PaymentOutcome,
    PaymentResult,
};
use messaging::{MessageBroker, Publisher};
use serde_json::Value;

use crate::directory::OrderDirectory;
use crate::error::Result;
use crate::model::{CustomerContact, SettlementPayment};
use crate::repository::SettlementPaymentRepository;

/// Consumes payment outcomes into the initiator's payment records and asks
/// for the customer to be told.
///
/// Bookkeeping never blocks the notification: a missing row, a rejected
/// transition or a storage error is logged, and exactly one
/// `notification.requested` is still published per result. Only a failed
/// publish is returned as an error.
pub struct ResultReconciler<B> {
    repository: Arc<dyn SettlementPaymentRepository>,
    directory: Arc<dyn OrderDirectory>,
    broker: B,
}

impl<B: MessageBroker> ResultReconciler<B> {
    pub fn new(
        repository: Arc<dyn SettlementPaymentRepository>,
        directory: Arc<dyn OrderDirectory>,
        broker: B,
    ) -> Self {
        Self {
            repository,
            directory,
            broker,
        }
    }

    /// Reconciles one result and returns the notification request it published.
    #[tracing::instrument(
        skip(self, result),
        fields(order_id = %result.order_id, payment_id = %result.payment_id, status = %result.status)
    )]
    pub async fn reconcile(&self, result: &PaymentResult) -> Result<NotificationRequested> {
        let payment = self.apply(result).await;

        let contact = match payment.as_ref().and_then(|p| p.contact.clone()) {
            Some(contact) => contact,
            None => self.lookup_contact(result).await,
        };

        let notification = NotificationRequested {
            notification_type: NotificationType::for_payment(result.status),
            contact_type: contact.contact_type,
            contact: contact.contact,
            payload: notification_payload(result, payment.as_ref().map(|p| p.amount)),
        };
        self.broker.publish_contract(&notification).await?;

        metrics::counter!("payment_results_reconciled_total", "status" => result.status.to_string())
            .increment(1);
        tracing::info!(notification_type = %notification.notification_type, "payment result reconciled");
        Ok(notification)
    }

    /// Moves the local payment to the reported outcome. Returns the row
    /// when it exists, whether or not the update went through.
    async fn apply(&self, result: &PaymentResult) -> Option<SettlementPayment> {
        let mut payment = match self.repository.find(result.payment_id).await {
            Ok(Some(payment)) => payment,
            Ok(None) => {
                tracing::warn!("no local payment for result, notifying from the event alone");
                return None;
            }
            Err(e) => {
                tracing::error!(error = %e, "payment lookup failed, notifying from the event alone");
                return None;
            }
        };

        if payment.order_id != result.order_id {
            tracing::warn!(local_order_id = %payment.order_id, "result names a different order than the local payment");
        }

        if result.status == PaymentOutcome::Succeeded && result.external_payment_id.is_none() {
            tracing::warn!("successful result carries no gateway reference");
        }

        match payment.apply_outcome(result.status, result.external_payment_id.clone()) {
            Ok(true) => {
                if let Err(e) = self.repository.save(&payment).await {
                    tracing::error!(error = %e, "payment status not persisted");
                }
            }
            Ok(false) => tracing::debug!("payment already has this outcome"),
            Err(e) => tracing::warn!(error = %e, current = %payment.status, "payment outcome not applied"),
        }
        Some(payment)
    }

    async fn lookup_contact(&self, result: &PaymentResult) -> CustomerContact {
        match self.directory.customer_contact(result.order_id).await {
            Ok(Some(contact)) => contact,
            Ok(None) => {
                tracing::warn!("no contact known for order");
                CustomerContact {
                    contact_type: ContactType::Email,
                    contact: String::new(),
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "order directory lookup failed");
                CustomerContact {
                    contact_type: ContactType::Email,
                    contact: String::new(),
                }
            }
        }
    }
}

/// Template inputs for a payment notification. The amount is only known
/// from the local row.
fn notification_payload(result: &PaymentResult, amount: Option<Money>) -> Payload {
    let mut payload = Payload::new();
    payload.insert("paymentId".into(), Value::from(result.payment_id.as_i64()));
    payload.insert("orderId".into(), Value::from(result.order_id.as_i64()));
    if let Some(amount) = amount.and_then(|a| serde_json::to_value(a).ok()) {
        payload.insert("amount".into(), amount);
    }
    payload
}

#[cfg(test)]
mod tests {
    use common::{OrderId, PaymentId, PaymentStatus};
    use messaging::InMemoryBroker;
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;
    use crate::directory::InMemoryOrderDirectory;
    use crate::memory::InMemorySettlementPaymentRepository;
    use crate::model::NewSettlementPayment;

    struct Fixture {
        repository: InMemorySettlementPaymentRepository,
        directory: InMemoryOrderDirectory,
        broker: InMemoryBroker,
        reconciler: ResultReconciler<InMemoryBroker>,
    }

    fn fixture() -> Fixture {
        let repository = InMemorySettlementPaymentRepository::new();
        let directory = InMemoryOrderDirectory::new();
        let broker = InMemoryBroker::new();
        let reconciler = ResultReconciler::new(
            Arc::new(repository.clone()),
            Arc::new(directory.clone()),
            broker.clone(),
        );
        Fixture {
            repository,
            directory,
            broker,
            reconciler,
        }
    }

    async fn pending_payment(f: &Fixture, contact: Option<CustomerContact>) -> SettlementPayment {
        f.repository
            .create(NewSettlementPayment {
                order_id: OrderId::new(1),
                amount: Money::new(dec!(99.99)),
                contact,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_success_updates_row_and_notifies() {
        let f = fixture();
        let payment = pending_payment(&f, Some(CustomerContact::email("user@example.com"))).await;

        let result = PaymentResult::succeeded(OrderId::new(1), payment.id, "pi_1");
        let notification = f.reconciler.reconcile(&result).await.unwrap();

        let stored = f.repository.find(payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Succeeded);
        assert_eq!(stored.external_payment_id.as_deref(), Some("pi_1"));

        assert_eq!(notification.notification_type, NotificationType::PaymentSuccess);
        assert_eq!(notification.contact, "user@example.com");
        assert_eq!(
            Value::Object(notification.payload.clone()),
            json!({"paymentId": 1, "orderId": 1, "amount": 99.99})
        );
        assert_eq!(
            f.broker.published::<NotificationRequested>().await.unwrap(),
            vec![notification]
        );
    }

    #[tokio::test]
    async fn test_result_without_gateway_reference_still_succeeds() {
        let f = fixture();
        let payment = pending_payment(&f, Some(CustomerContact::email("user@example.com"))).await;

        let wire = format!(r#"{{"orderId":1,"paymentId":{},"status":"SUCCEEDED"}}"#, payment.id);
        let result: PaymentResult = serde_json::from_str(&wire).unwrap();
        let notification = f.reconciler.reconcile(&result).await.unwrap();

        let stored = f.repository.find(payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Succeeded);
        assert!(stored.external_payment_id.is_none());
        assert_eq!(notification.notification_type, NotificationType::PaymentSuccess);

        // A redelivery of the same result changes nothing.
        f.reconciler.reconcile(&result).await.unwrap();
        assert_eq!(
            f.repository.find(payment.id).await.unwrap().unwrap().status,
            PaymentStatus::Succeeded
        );
    }

    #[tokio::test]
    async fn test_failure_maps_to_payment_failed() {
        let f = fixture();
        let payment = pending_payment(&f, Some(CustomerContact::sms("+4912345"))).await;

        let result = PaymentResult::failed(OrderId::new(1), payment.id, "card_declined");
        let notification = f.reconciler.reconcile(&result).await.unwrap();

        assert_eq!(notification.notification_type, NotificationType::PaymentFailed);
        assert_eq!(notification.contact_type, ContactType::Sms);
        let stored = f.repository.find(payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Failed);
        assert!(stored.external_payment_id.is_none());
    }

    #[tokio::test]
    async fn test_unknown_payment_still_notifies() {
        let f = fixture();
        f.directory
            .register(OrderId::new(5), CustomerContact::email("buyer@example.com"))
            .await;

        let result = PaymentResult {
            order_id: OrderId::new(5),
            payment_id: PaymentId::new(999),
            status: PaymentOutcome::Succeeded,
            error_message: None,
            external_payment_id: None,
        };
        let notification = f.reconciler.reconcile(&result).await.unwrap();

        assert_eq!(notification.notification_type, NotificationType::PaymentSuccess);
        assert_eq!(notification.contact, "buyer@example.com");
        assert_eq!(
            Value::Object(notification.payload),
            json!({"paymentId": 999, "orderId": 5})
        );
        assert_eq!(f.broker.message_count("notification.requested").await, 1);
    }

    #[tokio::test]
    async fn test_storage_failure_does_not_block_notification() {
        let f = fixture();
        let payment = pending_payment(&f, Some(CustomerContact::email("user@example.com"))).await;
        f.repository.set_fail_on_write(true);

        let result = PaymentResult::succeeded(OrderId::new(1), payment.id, "pi_1");
        f.reconciler.reconcile(&result).await.unwrap();

        assert_eq!(
            f.repository.find(payment.id).await.unwrap().unwrap().status,
            PaymentStatus::Pending
        );
        assert_eq!(f.broker.message_count("notification.requested").await, 1);
    }

    #[tokio::test]
    async fn test_conflicting_result_keeps_first_outcome() {
        let f = fixture();
        let payment = pending_payment(&f, Some(CustomerContact::email("user@example.com"))).await;

        f.reconciler
            .reconcile(&PaymentResult::failed(OrderId::new(1), payment.id, "card_declined"))
            .await
            .unwrap();
        f.reconciler
            .reconcile(&PaymentResult::succeeded(OrderId::new(1), payment.id, "pi_9"))
            .await
            .unwrap();

        let stored = f.repository.find(payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Failed);
        assert!(stored.external_payment_id.is_none());
        assert_eq!(f.broker.message_count("notification.requested").await, 2);
    }

    #[tokio::test]
    async fn test_contact_falls_back_to_directory() {
        let f = fixture();
        let payment = pending_payment(&f, None).await;
        f.directory
            .register(OrderId::new(1), CustomerContact::sms("+4912345"))
            .await;

        let notification = f
            .reconciler
            .reconcile(&PaymentResult::succeeded(OrderId::new(1), payment.id, "pi_1"))
            .await
            .unwrap();
        assert_eq!(notification.contact, "+4912345");
        assert_eq!(notification.contact_type, ContactType::Sms);
    }

    #[tokio::test]
    async fn test_unreachable_directory_still_notifies() {
        let f = fixture();
        f.directory.set_unavailable(true);

        let notification = f
            .reconciler
            .reconcile(&PaymentResult::failed(OrderId::new(3), PaymentId::new(7), "card_declined"))
            .await
            .unwrap();
        assert_eq!(notification.contact, "");
        assert_eq!(f.broker.message_count("notification.requested").await, 1);
    }

    #[tokio::test]
    async fn test_publish_failure_is_returned() {
        let f = fixture();
        f.broker.set_fail_on_publish(true);

        let result = f
            .reconciler
            .reconcile(&PaymentResult::failed(OrderId::new(3), PaymentId::new(7), "card_declined"))
            .await;
        assert!(result.is_err());
    }
}
