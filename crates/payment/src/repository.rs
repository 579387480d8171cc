use async_trait::async_trait;
use common::{OrderId, PaymentId};

use crate::error::Result;
use crate::model::{NewProcessedPayment, ProcessedPayment};

/// Storage for the processor's payment records.
#[async_trait]
pub trait ProcessedPaymentRepository: Send + Sync {
    /// Records a charge outcome. Fails with
    /// [`PaymentError::Duplicate`](crate::PaymentError::Duplicate) if the
    /// request was already recorded.
    async fn insert(&self, new: NewProcessedPayment) -> Result<ProcessedPayment>;

    /// Finds the record for an initiator payment id.
    async fn find_by_request(&self, request_payment_id: PaymentId)
    -> Result<Option<ProcessedPayment>>;

    /// Lists every record of an order, oldest first.
    async fn find_by_order(&self, order_id: OrderId) -> Result<Vec<ProcessedPayment>>;
}
