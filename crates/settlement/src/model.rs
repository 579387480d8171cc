//! The settlement side's payment record.

use chrono::{DateTime, Utc};
use common::{ContactType, Money, OrderId, PaymentId, PaymentOutcome, PaymentStatus};

use crate::error::{Result, SettlementError};

/// Where to tell the customer about their payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerContact {
    pub contact_type: ContactType,
    pub contact: String,
}

impl CustomerContact {
    pub fn email(address: impl Into<String>) -> Self {
        Self {
            contact_type: ContactType::Email,
            contact: address.into(),
        }
    }

    pub fn sms(number: impl Into<String>) -> Self {
        Self {
            contact_type: ContactType::Sms,
            contact: number.into(),
        }
    }
}

/// The data needed to open a settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSettlementPayment {
    pub order_id: OrderId,
    pub amount: Money,
    pub contact: Option<CustomerContact>,
}

/// The authoritative payment record of an order.
///
/// Its `id` is the payment id sent to the processor. The record is created
/// PENDING and moves once, to SUCCEEDED or FAILED, when the result arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementPayment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub external_payment_id: Option<String>,
    pub amount: Money,
    pub status: PaymentStatus,
    pub contact: Option<CustomerContact>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SettlementPayment {
    /// Builds a fresh PENDING record.
    pub fn pending(id: PaymentId, new: NewSettlementPayment, now: DateTime<Utc>) -> Self {
        Self {
            id,
            order_id: new.order_id,
            external_payment_id: None,
            amount: new.amount,
            status: PaymentStatus::Pending,
            contact: new.contact,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a reported outcome. Returns `false` if the record already has
    /// that outcome (a redelivered result).
    ///
    /// A success keeps the gateway reference when the result carries one; a
    /// failure never keeps one.
    pub fn apply_outcome(
        &mut self,
        outcome: PaymentOutcome,
        external_payment_id: Option<String>,
    ) -> Result<bool> {
        let next = PaymentStatus::from(outcome);
        if self.status == next {
            return Ok(false);
        }
        if !self.status.can_transition_to(next) {
            return Err(SettlementError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        self.external_payment_id = match outcome {
            PaymentOutcome::Succeeded => external_payment_id,
            PaymentOutcome::Failed => None,
        };
        self.status = next;
        self.updated_at = Utc::now();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> SettlementPayment {
        SettlementPayment::pending(
            PaymentId::new(1),
            NewSettlementPayment {
                order_id: OrderId::new(5),
                amount: Money::from_minor_units(1050),
                contact: Some(CustomerContact::email("user@example.com")),
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_success_records_external_id() {
        let mut payment = pending();
        assert!(
            payment
                .apply_outcome(PaymentOutcome::Succeeded, Some("pi_1".into()))
                .unwrap()
        );
        assert_eq!(payment.status, PaymentStatus::Succeeded);
        assert_eq!(payment.external_payment_id.as_deref(), Some("pi_1"));
    }

    #[test]
    fn test_failure_never_carries_external_id() {
        let mut payment = pending();
        payment
            .apply_outcome(PaymentOutcome::Failed, Some("pi_ignored".into()))
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert!(payment.external_payment_id.is_none());
    }

    #[test]
    fn test_redelivered_outcome_is_a_no_op() {
        let mut payment = pending();
        payment
            .apply_outcome(PaymentOutcome::Succeeded, Some("pi_1".into()))
            .unwrap();
        assert!(
            !payment
                .apply_outcome(PaymentOutcome::Succeeded, Some("pi_1".into()))
                .unwrap()
        );
    }

    #[test]
    fn test_success_without_external_id_still_succeeds() {
        let mut payment = pending();
        assert!(payment.apply_outcome(PaymentOutcome::Succeeded, None).unwrap());
        assert_eq!(payment.status, PaymentStatus::Succeeded);
        assert!(payment.external_payment_id.is_none());
    }

    #[test]
    fn test_terminal_status_does_not_flip() {
        let mut payment = pending();
        payment.apply_outcome(PaymentOutcome::Failed, None).unwrap();

        let err = payment
            .apply_outcome(PaymentOutcome::Succeeded, Some("pi_1".into()))
            .unwrap_err();
        assert!(matches!(
            err,
            SettlementError::InvalidTransition {
                from: PaymentStatus::Failed,
                to: PaymentStatus::Succeeded
            }
        ));
        assert_eq!(payment.status, PaymentStatus::Failed);
    }
}
