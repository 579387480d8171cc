//! Saga runtime error types.

use messaging::MessagingError;
use settlement::SettlementError;
use thiserror::Error;

/// Errors that can occur while running the saga in-process.
#[derive(Debug, Error)]
pub enum SagaError {
    /// A settlement could not be started.
    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementError),

    /// A consumer worker stopped with an error.
    #[error("Consumer '{component}' failed: {source}")]
    Worker {
        component: &'static str,
        #[source]
        source: MessagingError,
    },

    /// A consumer worker panicked or was cancelled.
    #[error("Consumer '{component}' did not stop cleanly: {reason}")]
    WorkerAborted {
        component: &'static str,
        reason: String,
    },
}
