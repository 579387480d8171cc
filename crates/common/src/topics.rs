//! Topic, consumer-group and currency names shared by all services.

/// Payment requests from the settlement initiator.
pub const PAYMENT_REQUESTED: &str = "payment.requested";

/// Charge outcomes from the payment processor.
pub const PAYMENT_RESULT: &str = "payment.result";

/// Notification requests for the dispatcher.
pub const NOTIFICATION_REQUESTED: &str = "notification.requested";

/// Consumer group of the payment processor.
pub const PAYMENT_SERVICE_GROUP: &str = "payment-service";

/// Consumer group of the settlement initiator's result reconciler.
pub const SETTLEMENT_SERVICE_GROUP: &str = "settlement-service";

/// Consumer group of the notification dispatcher.
pub const NOTIFICATION_SERVICE_GROUP: &str = "notification-service";

/// Currency every charge is made in.
pub const SETTLEMENT_CURRENCY: &str = "EUR";
