use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, PaymentId};
use tokio::sync::RwLock;

use crate::error::{Result, SettlementError};
use crate::model::{NewSettlementPayment, SettlementPayment};
use crate::repository::SettlementPaymentRepository;

#[derive(Debug, Default)]
struct State {
    rows: BTreeMap<PaymentId, SettlementPayment>,
    next_id: i64,
}

/// In-memory settlement repository for tests and database-less runs.
#[derive(Debug, Clone, Default)]
pub struct InMemorySettlementPaymentRepository {
    state: Arc<RwLock<State>>,
    fail_on_write: Arc<AtomicBool>,
}

impl InMemorySettlementPaymentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every write fail until switched off again.
    pub fn set_fail_on_write(&self, fail: bool) {
        self.fail_on_write.store(fail, Ordering::SeqCst);
    }

    /// Returns every stored payment, by id.
    pub async fn all(&self) -> Vec<SettlementPayment> {
        self.state.read().await.rows.values().cloned().collect()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_on_write.load(Ordering::SeqCst) {
            return Err(SettlementError::Unavailable(
                "settlement store rejected the write".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl SettlementPaymentRepository for InMemorySettlementPaymentRepository {
    async fn create(&self, new: NewSettlementPayment) -> Result<SettlementPayment> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        state.next_id += 1;
        let payment = SettlementPayment::pending(PaymentId::new(state.next_id), new, Utc::now());
        state.rows.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn find(&self, id: PaymentId) -> Result<Option<SettlementPayment>> {
        Ok(self.state.read().await.rows.get(&id).cloned())
    }

    async fn find_by_order(&self, order_id: OrderId) -> Result<Vec<SettlementPayment>> {
        Ok(self
            .state
            .read()
            .await
            .rows
            .values()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn save(&self, payment: &SettlementPayment) -> Result<()> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        let stored = state
            .rows
            .get_mut(&payment.id)
            .ok_or(SettlementError::NotFound(payment.id))?;

        if !stored.status.can_transition_to(payment.status) {
            return Err(SettlementError::InvalidTransition {
                from: stored.status,
                to: payment.status,
            });
        }

        *stored = payment.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use common::{Money, PaymentOutcome, PaymentStatus};

    use super::*;
    use crate::model::CustomerContact;

    fn new_payment(order_id: i64) -> NewSettlementPayment {
        NewSettlementPayment {
            order_id: OrderId::new(order_id),
            amount: Money::from_minor_units(2500),
            contact: Some(CustomerContact::email("user@example.com")),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let repo = InMemorySettlementPaymentRepository::new();
        let first = repo.create(new_payment(1)).await.unwrap();
        let second = repo.create(new_payment(1)).await.unwrap();

        assert_eq!(first.id, PaymentId::new(1));
        assert_eq!(second.id, PaymentId::new(2));
        assert_eq!(first.status, PaymentStatus::Pending);
        assert_eq!(repo.find_by_order(OrderId::new(1)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_save_applies_a_transition_once() {
        let repo = InMemorySettlementPaymentRepository::new();
        let mut payment = repo.create(new_payment(1)).await.unwrap();
        payment
            .apply_outcome(PaymentOutcome::Succeeded, Some("pi_1".into()))
            .unwrap();
        repo.save(&payment).await.unwrap();

        let stored = repo.find(payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Succeeded);

        let mut flipped = stored.clone();
        flipped.status = PaymentStatus::Failed;
        flipped.external_payment_id = None;
        assert!(matches!(
            repo.save(&flipped).await,
            Err(SettlementError::InvalidTransition { .. })
        ));
        assert_eq!(
            repo.find(payment.id).await.unwrap().unwrap().status,
            PaymentStatus::Succeeded
        );
    }

    #[tokio::test]
    async fn test_save_unknown_payment() {
        let repo = InMemorySettlementPaymentRepository::new();
        let mut payment = repo.create(new_payment(1)).await.unwrap();
        payment.id = PaymentId::new(999);
        assert!(matches!(
            repo.save(&payment).await,
            Err(SettlementError::NotFound(id)) if id == PaymentId::new(999)
        ));
    }

    #[tokio::test]
    async fn test_fail_on_write() {
        let repo = InMemorySettlementPaymentRepository::new();
        repo.set_fail_on_write(true);
        assert!(matches!(
            repo.create(new_payment(1)).await,
            Err(SettlementError::Unavailable(_))
        ));
        assert!(repo.all().await.is_empty());
    }
}
