use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, PaymentId};
use tokio::sync::RwLock;

use crate::error::{PaymentError, Result};
use crate::model::{NewProcessedPayment, ProcessedPayment};
use crate::repository::ProcessedPaymentRepository;

#[derive(Debug, Default)]
struct State {
    rows: BTreeMap<PaymentId, ProcessedPayment>,
    next_id: i64,
}

/// In-memory payment repository for tests and database-less runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProcessedPaymentRepository {
    state: Arc<RwLock<State>>,
    fail_on_write: Arc<AtomicBool>,
}

impl InMemoryProcessedPaymentRepository {
    /// Creates a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every insert fail until switched off again.
    pub fn set_fail_on_write(&self, fail: bool) {
        self.fail_on_write.store(fail, Ordering::SeqCst);
    }

    /// Returns every stored record, by local id.
    pub async fn all(&self) -> Vec<ProcessedPayment> {
        self.state.read().await.rows.values().cloned().collect()
    }
}

#[async_trait]
impl ProcessedPaymentRepository for InMemoryProcessedPaymentRepository {
    async fn insert(&self, new: NewProcessedPayment) -> Result<ProcessedPayment> {
        if self.fail_on_write.load(Ordering::SeqCst) {
            return Err(PaymentError::Unavailable(
                "payment store rejected the write".to_string(),
            ));
        }

        let mut state = self.state.write().await;
        // Unique constraint simulation
        if state
            .rows
            .values()
            .any(|p| p.request_payment_id == new.request_payment_id)
        {
            return Err(PaymentError::Duplicate(new.request_payment_id));
        }

        state.next_id += 1;
        let payment = ProcessedPayment::from_new(PaymentId::new(state.next_id), new, Utc::now());
        state.rows.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn find_by_request(
        &self,
        request_payment_id: PaymentId,
    ) -> Result<Option<ProcessedPayment>> {
        Ok(self
            .state
            .read()
            .await
            .rows
            .values()
            .find(|p| p.request_payment_id == request_payment_id)
            .cloned())
    }

    async fn find_by_order(&self, order_id: OrderId) -> Result<Vec<ProcessedPayment>> {
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
}

#[cfg(test)]
mod tests {
    use common::{Money, PaymentRequested, PaymentStatus};

    use super::*;

    fn request(payment_id: i64, order_id: i64) -> PaymentRequested {
        PaymentRequested {
            payment_id: PaymentId::new(payment_id),
            order_id: OrderId::new(order_id),
            amount: Money::from_minor_units(500),
            payment_token: "tok_valid".into(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let repo = InMemoryProcessedPaymentRepository::new();
        let stored = repo
            .insert(NewProcessedPayment::succeeded(&request(100, 1), "EUR", "pi_1"))
            .await
            .unwrap();

        assert_eq!(stored.id, PaymentId::new(1));
        assert_eq!(stored.status, PaymentStatus::Succeeded);
        assert_eq!(
            repo.find_by_request(PaymentId::new(100)).await.unwrap(),
            Some(stored)
        );
        assert!(repo.find_by_request(PaymentId::new(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_request_is_rejected() {
        let repo = InMemoryProcessedPaymentRepository::new();
        repo.insert(NewProcessedPayment::failed(&request(100, 1), "EUR", "card_declined"))
            .await
            .unwrap();

        let result = repo
            .insert(NewProcessedPayment::succeeded(&request(100, 1), "EUR", "pi_2"))
            .await;
        assert!(matches!(result, Err(PaymentError::Duplicate(id)) if id == PaymentId::new(100)));
    }

    #[tokio::test]
    async fn test_find_by_order() {
        let repo = InMemoryProcessedPaymentRepository::new();
        repo.insert(NewProcessedPayment::failed(&request(1, 7), "EUR", "card_declined"))
            .await
            .unwrap();
        repo.insert(NewProcessedPayment::succeeded(&request(2, 7), "EUR", "pi_1"))
            .await
            .unwrap();
        repo.insert(NewProcessedPayment::succeeded(&request(3, 8), "EUR", "pi_2"))
            .await
            .unwrap();

        let order_7 = repo.find_by_order(OrderId::new(7)).await.unwrap();
        assert_eq!(order_7.len(), 2);
        assert_eq!(order_7[0].status, PaymentStatus::Failed);
    }
}
