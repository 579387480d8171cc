//! The payment processor's own payment record.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, PaymentId, PaymentRequested, PaymentResult, PaymentStatus};

/// A charge outcome about to be recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProcessedPayment {
    pub request_payment_id: PaymentId,
    pub order_id: OrderId,
    pub external_payment_id: Option<String>,
    pub amount: Money,
    pub currency: String,
    pub status: PaymentStatus,
    pub failure_reason: Option<String>,
}

impl NewProcessedPayment {
    /// The gateway charged the payment.
    pub fn succeeded(
        request: &PaymentRequested,
        currency: &str,
        external_payment_id: impl Into<String>,
    ) -> Self {
        Self {
            request_payment_id: request.payment_id,
            order_id: request.order_id,
            external_payment_id: Some(external_payment_id.into()),
            amount: request.amount,
            currency: currency.to_string(),
            status: PaymentStatus::Succeeded,
            failure_reason: None,
        }
    }

    /// The charge was rejected or could not be made.
    pub fn failed(request: &PaymentRequested, currency: &str, reason: impl Into<String>) -> Self {
        Self {
            request_payment_id: request.payment_id,
            order_id: request.order_id,
            external_payment_id: None,
            amount: request.amount,
            currency: currency.to_string(),
            status: PaymentStatus::Failed,
            failure_reason: Some(reason.into()),
        }
    }
}

/// A payment as recorded by this service.
///
/// `id` is local to the processor; `request_payment_id` is the id the
/// settlement initiator minted and the one reported back to it. Rows are
/// written once, already in their terminal status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedPayment {
    pub id: PaymentId,
    pub request_payment_id: PaymentId,
    pub order_id: OrderId,
    pub external_payment_id: Option<String>,
    pub amount: Money,
    pub currency: String,
    pub status: PaymentStatus,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ProcessedPayment {
    pub fn from_new(id: PaymentId, new: NewProcessedPayment, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            request_payment_id: new.request_payment_id,
            order_id: new.order_id,
            external_payment_id: new.external_payment_id,
            amount: new.amount,
            currency: new.currency,
            status: new.status,
            failure_reason: new.failure_reason,
            created_at,
        }
    }

    /// The `payment.result` event reporting this payment. Carries the
    /// initiator's payment id, never the local one.
    pub fn to_result(&self) -> PaymentResult {
        match (&self.status, &self.external_payment_id) {
            (PaymentStatus::Succeeded, Some(external_id)) => {
                PaymentResult::succeeded(self.order_id, self.request_payment_id, external_id.clone())
            }
            _ => PaymentResult::failed(
                self.order_id,
                self.request_payment_id,
                self.failure_reason
                    .clone()
                    .unwrap_or_else(|| format!("payment ended with status {}", self.status)),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use common::PaymentOutcome;

    use super::*;

    fn request() -> PaymentRequested {
        PaymentRequested {
            payment_id: PaymentId::new(100),
            order_id: OrderId::new(1),
            amount: Money::from_minor_units(9999),
            payment_token: "tok_valid".into(),
        }
    }

    #[test]
    fn test_succeeded_result_uses_request_payment_id() {
        let payment = ProcessedPayment::from_new(
            PaymentId::new(1),
            NewProcessedPayment::succeeded(&request(), "EUR", "pi_1"),
            Utc::now(),
        );
        let result = payment.to_result();

        assert_eq!(result.payment_id, PaymentId::new(100));
        assert_eq!(result.order_id, OrderId::new(1));
        assert_eq!(result.status, PaymentOutcome::Succeeded);
        assert_eq!(result.external_payment_id.as_deref(), Some("pi_1"));
        assert!(result.error_message.is_none());
    }

    #[test]
    fn test_failed_result_carries_reason() {
        let new = NewProcessedPayment::failed(&request(), "EUR", "card_declined");
        assert!(new.external_payment_id.is_none());

        let result = ProcessedPayment::from_new(PaymentId::new(2), new, Utc::now()).to_result();
        assert_eq!(result.status, PaymentOutcome::Failed);
        assert_eq!(result.error_message.as_deref(), Some("card_declined"));
        assert!(result.external_payment_id.is_none());
    }
}
