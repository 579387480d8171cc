//! Settlement Initiator and Result Reconciler.
//!
//! Owns the authoritative payment record of each order. The initiator
//! records a PENDING payment and publishes `payment.requested`; the
//! reconciler consumes `payment.result`, moves the record to its outcome
//! and publishes `notification.requested` for the customer.

pub mod config;
pub mod directory;
pub mod error;
pub mod handler;
pub mod initiator;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod reconciler;
pub mod repository;

pub use config::Config;
pub use directory::{InMemoryOrderDirectory, OrderDirectory};
pub use error::{Result, SettlementError};
pub use handler::PaymentResultHandler;
pub use initiator::SettlementInitiator;
pub use memory::InMemorySettlementPaymentRepository;
pub use model::{CustomerContact, NewSettlementPayment, SettlementPayment};
pub use postgres::PostgresSettlementPaymentRepository;
pub use reconciler::ResultReconciler;
pub use repository::SettlementPaymentRepository;
