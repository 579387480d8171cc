//! The settlement saga, run in one process.
//!
//! The saga settles an order across three services that never share a
//! transaction:
//! 1. the settlement initiator records a PENDING payment and publishes
//!    `payment.requested`
//! 2. the payment processor charges once and publishes `payment.result`
//! 3. the result reconciler applies the outcome and publishes
//!    `notification.requested`
//! 4. the notification dispatcher tells the customer, retrying failed sends
//!
//! [`SagaRuntime`] wires the four against one in-memory broker for local
//! runs and end-to-end tests. Deployed, each runs as its own binary.

pub mod config;
pub mod error;
pub mod runtime;

pub use config::SagaConfig;
pub use error::SagaError;
pub use runtime::SagaRuntime;
