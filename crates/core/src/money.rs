//! Monetary amounts in the currency's minor unit.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// An amount of money in minor units (e.g. cents).
///
/// Arithmetic is exact integer arithmetic; there is no rounding anywhere. All
/// operations that could overflow are checked and surface a validation error
/// instead of wrapping.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor_units(minor: i64) -> Self {
        Self(minor)
    }

    pub const fn minor_units(&self) -> i64 {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// `self * quantity`, failing on overflow.
    pub fn times(self, quantity: i64) -> DomainResult<Money> {
        self.0
            .checked_mul(quantity)
            .map(Money)
            .ok_or_else(|| DomainError::validation(format!("amount overflow: {self} x {quantity}")))
    }

    /// `self + other`, failing on overflow.
    pub fn plus(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::validation(format!("amount overflow: {self} + {other}")))
    }

    /// Exact sum of an iterator of amounts.
    pub fn sum<I>(amounts: I) -> DomainResult<Money>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts.into_iter().try_fold(Money::ZERO, Money::plus)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}
