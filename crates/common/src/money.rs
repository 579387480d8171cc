//! Currency-scaled monetary amounts.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of fractional digits every amount is scaled to.
pub const CURRENCY_SCALE: u32 = 2;

/// A monetary amount with exactly two fractional digits.
///
/// Amounts travel as JSON numbers (`99.99`) but are held as exact decimals;
/// anything finer than a cent is rounded half away from zero on the way in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(Decimal);

impl Money {
    /// Creates an amount, rescaling it to [`CURRENCY_SCALE`].
    pub fn new(amount: Decimal) -> Self {
        let mut scaled =
            amount.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero);
        scaled.rescale(CURRENCY_SCALE);
        Self(scaled)
    }

    /// Creates an amount from minor units (cents).
    pub fn from_minor_units(minor: i64) -> Self {
        Self::new(Decimal::new(minor, CURRENCY_SCALE))
    }

    /// Returns zero.
    pub fn zero() -> Self {
        Self::new(Decimal::ZERO)
    }

    /// Returns the amount in minor units, as payment gateways expect it.
    ///
    /// `None` if the amount does not fit into an `i64`.
    pub fn to_minor_units(&self) -> Option<i64> {
        (self.0 * Decimal::ONE_HUNDRED).trunc().to_i64()
    }

    /// Returns the underlying decimal.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Returns true if the amount is strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self::new(amount)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        rust_decimal::serde::float::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Accepts numbers and numeric strings.
        <Decimal as Deserialize>::deserialize(deserializer).map(Money::new)
    }
}
