//! Lookup of customer contacts through the order owner.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::OrderId;
use tokio::sync::RwLock;

use crate::error::{Result, SettlementError};
use crate::model::CustomerContact;

/// Resolves who placed an order and how to reach them.
#[async_trait]
pub trait OrderDirectory: Send + Sync {
    /// Returns the contact of the order's customer, if known.
    async fn customer_contact(&self, order_id: OrderId) -> Result<Option<CustomerContact>>;
}

/// In-memory order directory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderDirectory {
    contacts: Arc<RwLock<HashMap<OrderId, CustomerContact>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryOrderDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the customer contact of an order.
    pub async fn register(&self, order_id: OrderId, contact: CustomerContact) {
        self.contacts.write().await.insert(order_id, contact);
    }

    /// Makes every lookup fail until switched off again.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl OrderDirectory for InMemoryOrderDirectory {
    async fn customer_contact(&self, order_id: OrderId) -> Result<Option<CustomerContact>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SettlementError::Unavailable(
                "order directory is not reachable".to_string(),
            ));
        }
        Ok(self.contacts.read().await.get(&order_id).cloned())
    }
}
