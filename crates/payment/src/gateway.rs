//! Payment gateway port and a scriptable mock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Status of a charge as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChargeStatus {
    Succeeded,
    /// The customer has to confirm the payment (e.g. 3-D Secure).
    RequiresAction,
    Failed,
}

impl ChargeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeStatus::Succeeded => "SUCCEEDED",
            ChargeStatus::RequiresAction => "REQUIRES_ACTION",
            ChargeStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for ChargeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A charge the gateway accepted for processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeResult {
    pub external_id: String,
    pub status: ChargeStatus,
}

/// The gateway rejected the charge or could not be reached. The message is
/// reported to the initiator as is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct GatewayError(pub String);

impl GatewayError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// External payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charges `amount_minor` (cents) in `currency` against a payment
    /// method token.
    async fn charge(
        &self,
        amount_minor: i64,
        currency: &str,
        payment_token: &str,
    ) -> Result<ChargeResult, GatewayError>;
}

/// A charge seen by the [`MockGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCharge {
    pub amount_minor: i64,
    pub currency: String,
    pub payment_token: String,
}

#[derive(Debug, Default)]
struct MockGatewayState {
    charges: Vec<RecordedCharge>,
    next_id: u32,
    declined_tokens: HashMap<String, String>,
    fail_on_charge: Option<String>,
    status: Option<ChargeStatus>,
    delay: Option<Duration>,
}

/// In-memory gateway for tests and local runs.
///
/// Every charge succeeds with external ids `pi_1`, `pi_2`, ... unless a
/// token was declined or a failure was configured.
#[derive(Debug, Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<MockGatewayState>>,
}

impl MockGateway {
    /// Creates a new mock gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects charges against `token` with `message`.
    pub fn decline_token(&self, token: impl Into<String>, message: impl Into<String>) {
        self.lock()
            .declined_tokens
            .insert(token.into(), message.into());
    }

    /// Configures every charge to fail with `message` (or none with `None`).
    pub fn set_fail_on_charge(&self, message: Option<&str>) {
        self.lock().fail_on_charge = message.map(str::to_string);
    }

    /// Overrides the status reported for accepted charges.
    pub fn set_charge_status(&self, status: ChargeStatus) {
        self.lock().status = Some(status);
    }

    /// Delays every charge, e.g. to trigger the caller's timeout.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.lock().delay = delay;
    }

    /// Returns every charge attempted so far.
    pub fn charges(&self) -> Vec<RecordedCharge> {
        self.lock().charges.clone()
    }

    /// Returns the number of charges attempted.
    pub fn charge_count(&self) -> usize {
        self.lock().charges.len()
    }

    fn lock(&self) -> MutexGuard<'_, MockGatewayState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn charge(
        &self,
        amount_minor: i64,
        currency: &str,
        payment_token: &str,
    ) -> Result<ChargeResult, GatewayError> {
        let delay = self.lock().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        state.charges.push(RecordedCharge {
            amount_minor,
            currency: currency.to_string(),
            payment_token: payment_token.to_string(),
        });

        if let Some(message) = state.fail_on_charge.clone() {
            return Err(GatewayError(message));
        }
        if let Some(message) = state.declined_tokens.get(payment_token) {
            return Err(GatewayError(message.clone()));
        }

        state.next_id += 1;
        Ok(ChargeResult {
            external_id: format!("pi_{}", state.next_id),
            status: state.status.unwrap_or(ChargeStatus::Succeeded),
        })
    }
}
