//! Payment Processor.
//!
//! Consumes `payment.requested`, makes a single gateway charge per request,
//! records the outcome in its own table and publishes `payment.result`
//! carrying the initiator's payment id.

pub mod config;
pub mod error;
pub mod gateway;
pub mod handler;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod processor;
pub mod repository;

pub use config::Config;
pub use error::{PaymentError, Result};
pub use gateway::{ChargeResult, ChargeStatus, GatewayError, MockGateway, PaymentGateway};
pub use handler::PaymentRequestedHandler;
pub use memory::InMemoryProcessedPaymentRepository;
pub use model::{NewProcessedPayment, ProcessedPayment};
pub use postgres::PostgresProcessedPaymentRepository;
pub use processor::PaymentProcessor;
pub use repository::ProcessedPaymentRepository;
