//! Notification templates and the registry that selects them.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use common::{Money, NotificationType, Payload};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::{NotificationError, Result};
use crate::model::NotificationContent;

/// Renders the content of one notification type.
///
/// Rendering is a pure function of the payload: no I/O, and the same
/// payload always produces the same content.
pub trait NotificationTemplate: Send + Sync {
    /// The notification type this template renders.
    fn notification_type(&self) -> NotificationType;

    /// Builds the subject and body from the template inputs.
    fn build(&self, payload: &Payload) -> Result<NotificationContent>;
}

/// Template for `PAYMENT_SUCCESS`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PaymentSuccessTemplate;

impl NotificationTemplate for PaymentSuccessTemplate {
    fn notification_type(&self) -> NotificationType {
        NotificationType::PaymentSuccess
    }

    fn build(&self, payload: &Payload) -> Result<NotificationContent> {
        let fields = PaymentFields::from_payload(self.notification_type(), payload)?;
        Ok(NotificationContent::new(
            format!("Payment with ID {} successful", fields.payment_id),
            format!(
                "Your payment{} for order with ID {} was successful.",
                fields.amount_phrase(),
                fields.order_id
            ),
        ))
    }
}

/// Template for `PAYMENT_FAILED`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PaymentFailedTemplate;

impl NotificationTemplate for PaymentFailedTemplate {
    fn notification_type(&self) -> NotificationType {
        NotificationType::PaymentFailed
    }

    fn build(&self, payload: &Payload) -> Result<NotificationContent> {
        let fields = PaymentFields::from_payload(self.notification_type(), payload)?;
        Ok(NotificationContent::new(
            format!("Payment with ID {} failed", fields.payment_id),
            format!(
                "Your payment{} for order with ID {} failed. Please retry in your orders page",
                fields.amount_phrase(),
                fields.order_id
            ),
        ))
    }
}

/// Template for `USER_REGISTERED`. Ignores the payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserRegisteredTemplate;

impl NotificationTemplate for UserRegisteredTemplate {
    fn notification_type(&self) -> NotificationType {
        NotificationType::UserRegistered
    }

    fn build(&self, _payload: &Payload) -> Result<NotificationContent> {
        Ok(NotificationContent::new(
            "Welcome to Ecommerce Platform!",
            "We're happy to see you using our platform.",
        ))
    }
}

struct PaymentFields {
    payment_id: String,
    order_id: String,
    amount: Option<String>,
}

impl PaymentFields {
    fn from_payload(notification_type: NotificationType, payload: &Payload) -> Result<Self> {
        let required = |name: &str| {
            scalar(payload, name).ok_or_else(|| NotificationError::InvalidPayload {
                notification_type,
                reason: format!("missing {name}"),
            })
        };

        Ok(Self {
            payment_id: required("paymentId")?,
            order_id: required("orderId")?,
            amount: scalar(payload, "amount").map(|raw| format_amount(&raw)),
        })
    }

    fn amount_phrase(&self) -> String {
        self.amount
            .as_ref()
            .map(|amount| format!(" of {amount} €"))
            .unwrap_or_default()
    }
}

/// Reads a number or non-blank string field as text.
fn scalar(payload: &Payload, name: &str) -> Option<String> {
    match payload.get(name)? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Shows amounts with two decimals when they parse as a decimal.
fn format_amount(raw: &str) -> String {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map(|d| Money::new(d).to_string())
        .unwrap_or_else(|_| raw.to_string())
}

/// Returns the built-in template for a notification type.
pub fn standard_template(notification_type: NotificationType) -> Arc<dyn NotificationTemplate> {
    match notification_type {
        NotificationType::PaymentSuccess => Arc::new(PaymentSuccessTemplate),
        NotificationType::PaymentFailed => Arc::new(PaymentFailedTemplate),
        NotificationType::UserRegistered => Arc::new(UserRegisteredTemplate),
    }
}

/// Immutable mapping from notification type to template, built once at
/// startup and shared by every worker.
#[derive(Clone)]
pub struct TemplateRegistry {
    templates: HashMap<NotificationType, Arc<dyn NotificationTemplate>>,
}

impl TemplateRegistry {
    /// Builds a registry from the given templates. A later template for the
    /// same type replaces an earlier one.
    pub fn new(templates: impl IntoIterator<Item = Arc<dyn NotificationTemplate>>) -> Self {
        Self {
            templates: templates
                .into_iter()
                .map(|t| (t.notification_type(), t))
                .collect(),
        }
    }

    /// The registry with a built-in template for every notification type.
    pub fn standard() -> Self {
        Self::new(NotificationType::ALL.into_iter().map(standard_template))
    }

    /// Finds the template for a notification type.
    pub fn resolve(&self, notification_type: NotificationType) -> Result<&dyn NotificationTemplate> {
        self.templates
            .get(&notification_type)
            .map(|t| t.as_ref())
            .ok_or(NotificationError::MissingTemplate(notification_type))
    }

    /// Resolves and renders in one step.
    pub fn render(
        &self,
        notification_type: NotificationType,
        payload: &Payload,
    ) -> Result<NotificationContent> {
        self.resolve(notification_type)?.build(payload)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl std::fmt::Debug for TemplateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateRegistry")
            .field("types", &self.templates.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            _ => Payload::new(),
        }
    }

    #[test]
    fn test_payment_success_text() {
        let content = PaymentSuccessTemplate
            .build(&payload(json!({"paymentId": 100, "orderId": 1, "amount": 99.99})))
            .unwrap();
        assert_eq!(content.subject, "Payment with ID 100 successful");
        assert_eq!(
            content.body,
            "Your payment of 99.99 € for order with ID 1 was successful."
        );
    }

    #[test]
    fn test_payment_failed_text() {
        let content = PaymentFailedTemplate
            .build(&payload(json!({"paymentId": "7", "orderId": "3", "amount": 10})))
            .unwrap();
        assert_eq!(content.subject, "Payment with ID 7 failed");
        assert_eq!(
            content.body,
            "Your payment of 10.00 € for order with ID 3 failed. Please retry in your orders page"
        );
    }

    #[test]
    fn test_missing_amount_drops_the_phrase() {
        let content = PaymentSuccessTemplate
            .build(&payload(json!({"paymentId": 999, "orderId": 5})))
            .unwrap();
        assert_eq!(content.body, "Your payment for order with ID 5 was successful.");
    }

    #[test]
    fn test_missing_ids_are_structural() {
        let err = PaymentFailedTemplate
            .build(&payload(json!({"orderId": 5})))
            .unwrap_err();
        assert!(err.is_structural());
        assert!(err.to_string().contains("missing paymentId"));
    }

    #[test]
    fn test_user_registered_ignores_payload() {
        let content = UserRegisteredTemplate.build(&Payload::new()).unwrap();
        assert_eq!(content.subject, "Welcome to Ecommerce Platform!");
        assert_eq!(content.body, "We're happy to see you using our platform.");
    }

    #[test]
    fn test_build_is_idempotent() {
        let input = payload(json!({"paymentId": 1, "orderId": 2, "amount": "12.5"}));
        for notification_type in NotificationType::ALL {
            let template = standard_template(notification_type);
            assert_eq!(template.notification_type(), notification_type);
            assert_eq!(template.build(&input).unwrap(), template.build(&input).unwrap());
        }
    }

    #[test]
    fn test_standard_registry_covers_every_type() {
        let registry = TemplateRegistry::standard();
        assert_eq!(registry.len(), NotificationType::ALL.len());
        for notification_type in NotificationType::ALL {
            assert!(registry.resolve(notification_type).is_ok());
        }
    }

    #[test]
    fn test_missing_template_is_structural() {
        let registry = TemplateRegistry::new([standard_template(NotificationType::UserRegistered)]);
        let err = registry
            .render(NotificationType::PaymentSuccess, &Payload::new())
            .unwrap_err();
        assert!(matches!(
            err,
            NotificationError::MissingTemplate(NotificationType::PaymentSuccess)
        ));
        assert!(err.is_structural());
    }
}
