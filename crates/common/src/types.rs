use serde::{Deserialize, Serialize};

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates an id from its raw value.
            pub fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw value.
            pub fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

numeric_id!(
    /// Identifier of an order, owned by the settlement initiator.
    ///
    /// This is the correlation key that threads every saga message
    /// together and the partition key of every topic.
    OrderId
);

numeric_id!(
    /// Identifier of a payment as minted by the settlement initiator.
    ///
    /// The payment processor keeps its own row ids; messages always carry
    /// the initiator's id so the initiator can correlate results.
    PaymentId
);

numeric_id!(
    /// Service-local identifier of a notification row.
    NotificationId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_plain_numbers() {
        let id = OrderId::new(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");

        let parsed: PaymentId = serde_json::from_str("100").unwrap();
        assert_eq!(parsed, PaymentId::new(100));
    }

    #[test]
    fn ids_convert_to_and_from_i64() {
        let id = NotificationId::from(7);
        assert_eq!(i64::from(id), 7);
        assert_eq!(id.as_i64(), 7);
        assert_eq!(id.to_string(), "7");
    }
}
