//! Shared types for the settlement saga.
//!
//! Everything here travels between independently deployed services:
//! correlation ids, money, payment statuses and the three message
//! contracts, together with the topic and consumer-group names every
//! service has to agree on.

pub mod contracts;
pub mod money;
pub mod status;
pub mod text;
pub mod topics;
pub mod types;

pub use contracts::{
    ContactType, Contract, NotificationRequested, NotificationType, Payload, PaymentRequested,
    PaymentResult, UnknownVariant,
};
pub use money::Money;
pub use status::{PaymentOutcome, PaymentStatus};
pub use types::{NotificationId, OrderId, PaymentId};
