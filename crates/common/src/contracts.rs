//! Message contracts exchanged between the saga services.
//!
//! These are immutable value types. Field names are camelCase on the wire
//! and enum values SCREAMING_SNAKE_CASE, matching what the other services
//! publish.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::money::Money;
use crate::status::PaymentOutcome;
use crate::topics;
use crate::types::{OrderId, PaymentId};

/// Template inputs carried by a notification request.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// A string that does not name any variant of a closed enum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// A message contract bound to the topic it is published on.
pub trait Contract: Serialize + DeserializeOwned + Send + Sync {
    /// The topic this contract travels on.
    const TOPIC: &'static str;

    /// The partition key. All messages of one order share a key so they
    /// land on the same ordered stream.
    fn partition_key(&self) -> String;
}

/// Published by the settlement initiator to ask for a charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequested {
    /// The initiator's payment id; echoed back in the result.
    pub payment_id: PaymentId,
    pub order_id: OrderId,
    pub amount: Money,
    /// Opaque payment-method token handed to the gateway.
    pub payment_token: String,
}

impl Contract for PaymentRequested {
    const TOPIC: &'static str = topics::PAYMENT_REQUESTED;

    fn partition_key(&self) -> String {
        self.order_id.to_string()
    }
}

/// Published by the payment processor once the gateway call finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResult {
    pub order_id: OrderId,
    pub payment_id: PaymentId,
    pub status: PaymentOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Gateway reference of a successful charge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_payment_id: Option<String>,
}

impl PaymentResult {
    /// A successful charge.
    pub fn succeeded(
        order_id: OrderId,
        payment_id: PaymentId,
        external_payment_id: impl Into<String>,
    ) -> Self {
        Self {
            order_id,
            payment_id,
            status: PaymentOutcome::Succeeded,
            error_message: None,
            external_payment_id: Some(external_payment_id.into()),
        }
    }

    /// A rejected or failed charge.
    pub fn failed(order_id: OrderId, payment_id: PaymentId, error: impl Into<String>) -> Self {
        Self {
            order_id,
            payment_id,
            status: PaymentOutcome::Failed,
            error_message: Some(error.into()),
            external_payment_id: None,
        }
    }
}

impl Contract for PaymentResult {
    const TOPIC: &'static str = topics::PAYMENT_RESULT;

    fn partition_key(&self) -> String {
        self.order_id.to_string()
    }
}

/// Published whenever a user has to be told something.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequested {
    pub notification_type: NotificationType,
    pub contact_type: ContactType,
    /// Destination address (e-mail address, phone number).
    pub contact: String,
    #[serde(default, deserialize_with = "nullable_payload")]
    pub payload: Payload,
}

impl Contract for NotificationRequested {
    const TOPIC: &'static str = topics::NOTIFICATION_REQUESTED;

    /// Payment notifications are keyed by their order so they stay ordered
    /// with the rest of the order's messages; others by contact.
    fn partition_key(&self) -> String {
        match self.payload.get("orderId") {
            Some(serde_json::Value::Number(n)) => n.to_string(),
            Some(serde_json::Value::String(s)) => s.clone(),
            _ => self.contact.clone(),
        }
    }
}

fn nullable_payload<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Payload, D::Error> {
    Ok(Option::<Payload>::deserialize(deserializer)?.unwrap_or_default())
}

/// What a notification is about; selects the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    PaymentSuccess,
    PaymentFailed,
    UserRegistered,
}

impl NotificationType {
    /// Every notification type, for exhaustiveness checks.
    pub const ALL: [NotificationType; 3] = [
        NotificationType::PaymentSuccess,
        NotificationType::PaymentFailed,
        NotificationType::UserRegistered,
    ];

    /// Maps a payment outcome to the notification announcing it.
    pub fn for_payment(outcome: PaymentOutcome) -> Self {
        match outcome {
            PaymentOutcome::Succeeded => NotificationType::PaymentSuccess,
            PaymentOutcome::Failed => NotificationType::PaymentFailed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::PaymentSuccess => "PAYMENT_SUCCESS",
            NotificationType::PaymentFailed => "PAYMENT_FAILED",
            NotificationType::UserRegistered => "USER_REGISTERED",
        }
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for NotificationType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NotificationType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("notification type", s))
    }
}

/// The channel a notification is delivered through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContactType {
    Email,
    Sms,
}

impl ContactType {
    pub const ALL: [ContactType; 2] = [ContactType::Email, ContactType::Sms];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContactType::Email => "EMAIL",
            ContactType::Sms => "SMS",
        }
    }
}

impl std::fmt::Display for ContactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Case-insensitive: `"email"`, `"Email"` and `"EMAIL"` are all accepted.
impl std::str::FromStr for ContactType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContactType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownVariant::new("contact type", s))
    }
}

impl<'de> Deserialize<'de> for ContactType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
