//! Starting settlements and other user-facing requests.

use std::sync::Arc;

use common::{
    ContactType, Money, NotificationRequested, NotificationType, OrderId, Payload,
    PaymentRequested,
};
use messaging::{MessageBroker, Publisher};

use crate::error::{Result, SettlementError};
use crate::model::{CustomerContact, NewSettlementPayment, SettlementPayment};
use crate::repository::SettlementPaymentRepository;

/// Opens settlements and asks the processor to charge them.
///
/// The payment row is written before the request is published, so the
/// processor can only ever report on a payment the initiator knows about.
/// If publishing fails the row stays PENDING and the error is returned to
/// the caller.
pub struct SettlementInitiator<B> {
    repository: Arc<dyn SettlementPaymentRepository>,
    broker: B,
}

impl<B: MessageBroker> SettlementInitiator<B> {
    pub fn new(repository: Arc<dyn SettlementPaymentRepository>, broker: B) -> Self {
        Self { repository, broker }
    }

    /// Records a PENDING payment for the order and publishes
    /// `payment.requested` keyed by the order.
    #[tracing::instrument(skip_all, fields(order_id = %order_id, amount = %amount))]
    pub async fn initiate_payment(
        &self,
        order_id: OrderId,
        amount: Money,
        payment_token: &str,
        contact: Option<CustomerContact>,
    ) -> Result<SettlementPayment> {
        if !amount.is_positive() {
            return Err(SettlementError::Validation(format!(
                "amount must be positive, got {amount}"
            )));
        }
        if amount.to_minor_units().is_none() {
            return Err(SettlementError::Validation(format!(
                "amount {amount} out of range"
            )));
        }
        if payment_token.trim().is_empty() {
            return Err(SettlementError::Validation(
                "payment token must not be blank".to_string(),
            ));
        }

        let payment = self
            .repository
            .create(NewSettlementPayment {
                order_id,
                amount,
                contact,
            })
            .await?;

        let request = PaymentRequested {
            payment_id: payment.id,
            order_id,
            amount,
            payment_token: payment_token.to_string(),
        };
        if let Err(e) = self.broker.publish_contract(&request).await {
            tracing::error!(error = %e, payment_id = %payment.id, "payment request not published, payment stays PENDING");
            return Err(e.into());
        }

        metrics::counter!("settlements_initiated_total").increment(1);
        tracing::info!(payment_id = %payment.id, "settlement initiated");
        Ok(payment)
    }

    /// Publishes the welcome e-mail request for a newly registered user.
    #[tracing::instrument(skip(self))]
    pub async fn request_welcome_notification(&self, contact: &str) -> Result<()> {
        if contact.trim().is_empty() {
            return Err(SettlementError::Validation(
                "contact must not be blank".to_string(),
            ));
        }

        let request = NotificationRequested {
            notification_type: NotificationType::UserRegistered,
            contact_type: ContactType::Email,
            contact: contact.to_string(),
            payload: Payload::new(),
        };
        self.broker.publish_contract(&request).await?;
        Ok(())
    }
}
