//! Payment status state machine.

use serde::{Deserialize, Serialize};

use crate::contracts::UnknownVariant;

/// The status of a payment record.
///
/// State transitions:
/// ```text
/// Pending ──┬──► Succeeded
///           └──► Failed
/// ```
/// Both services keep their own payment record; each one moves out of
/// `Pending` exactly once and never returns to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Settlement started, outcome unknown.
    #[default]
    Pending,

    /// The gateway charged the payment (terminal state).
    Succeeded,

    /// The charge was rejected or could not be made (terminal state).
    Failed,
}

impl PaymentStatus {
    /// Returns true if a record in this status may move to `next`.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Succeeded)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
        )
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    /// Returns the status name as stored and sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Succeeded => "SUCCEEDED",
            PaymentStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "SUCCEEDED" => Ok(PaymentStatus::Succeeded),
            "FAILED" => Ok(PaymentStatus::Failed),
            other => Err(UnknownVariant::new("payment status", other)),
        }
    }
}

/// The outcome reported on `payment.result`.
///
/// Only terminal statuses can be reported, so `Pending` is not representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentOutcome {
    Succeeded,
    Failed,
}

impl PaymentOutcome {
    /// Returns true for a successful charge.
    pub fn is_success(&self) -> bool {
        matches!(self, PaymentOutcome::Succeeded)
    }
}

impl From<PaymentOutcome> for PaymentStatus {
    fn from(outcome: PaymentOutcome) -> Self {
        match outcome {
            PaymentOutcome::Succeeded => PaymentStatus::Succeeded,
            PaymentOutcome::Failed => PaymentStatus::Failed,
        }
    }
}

impl std::fmt::Display for PaymentOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        PaymentStatus::from(*self).fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(PaymentStatus::default(), PaymentStatus::Pending);
    }

    #[test]
    fn test_transitions_leave_pending_only_once() {
        use PaymentStatus::*;
        assert!(Pending.can_transition_to(Succeeded));
        assert!(Pending.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Pending));
        assert!(!Succeeded.can_transition_to(Pending));
        assert!(!Succeeded.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(Succeeded));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(PaymentStatus::Succeeded.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(
            serde_json::to_string(&PaymentStatus::Succeeded).unwrap(),
            "\"SUCCEEDED\""
        );
        assert_eq!(
            serde_json::from_str::<PaymentOutcome>("\"FAILED\"").unwrap(),
            PaymentOutcome::Failed
        );
        assert!(serde_json::from_str::<PaymentOutcome>("\"PENDING\"").is_err());
    }

    #[test]
    fn test_from_str_round_trip() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Succeeded,
            PaymentStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), status);
        }
        assert!("PAID".parse::<PaymentStatus>().is_err());
    }
}
