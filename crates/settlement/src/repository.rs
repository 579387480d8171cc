use async_trait::async_trait;
use common::{OrderId, PaymentId};

use crate::error::Result;
use crate::model::{NewSettlementPayment, SettlementPayment};

/// Storage for the initiator's payment records.
#[async_trait]
pub trait SettlementPaymentRepository: Send + Sync {
    /// Stores a new PENDING payment and assigns its id.
    async fn create(&self, new: NewSettlementPayment) -> Result<SettlementPayment>;

    /// Finds a payment by id.
    async fn find(&self, id: PaymentId) -> Result<Option<SettlementPayment>>;

    /// Lists every payment of an order, oldest first.
    async fn find_by_order(&self, order_id: OrderId) -> Result<Vec<SettlementPayment>>;

    /// Persists a status change. Only a PENDING record can be changed;
    /// anything else fails with
    /// [`SettlementError::InvalidTransition`](crate::SettlementError::InvalidTransition).
    async fn save(&self, payment: &SettlementPayment) -> Result<()>;
}
