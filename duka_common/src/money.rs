use std::{fmt::Display, iter::Sum, ops::Add};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const DEFAULT_CURRENCY_CODE: &str = "TZS";

/// Rounds a float to 2 decimal places. Non-finite input (NaN, ±∞) maps to zero.
pub fn round_money(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value * 100.0).round() / 100.0
}

//--------------------------------------        Money         ---------------------------------------------------------
/// A monetary amount in cents (hundredths of the major currency unit).
///
/// Every value that enters the system from a float goes through [`round_money`] first. On the wire, money is
/// rendered in major units, e.g. `Money::from_cents(150_050)` serializes as `1500.5`.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[sqlx(transparent)]
pub struct Money(i64);

// Arithmetic saturates at the bounds of i64. Use the `checked_*` methods where overflow must be reported.
op!(saturating Money, Add, add, saturating_add);
op!(saturating Money, Sub, sub, saturating_sub);
op!(saturating_inplace Money, AddAssign, add_assign, saturating_add);
op!(saturating_inplace Money, SubAssign, sub_assign, saturating_sub);
op!(unary Money, Neg, neg);

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as money: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(cents: i64) -> Self {
        Self(cents)
    }
}

impl TryFrom<f64> for Money {
    type Error = MoneyConversionError;

    /// Strict conversion. Unlike [`Money::from_major`], non-finite or out-of-range values are an error.
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(MoneyConversionError(format!("{value} is not a finite amount")));
        }
        let cents = (round_money(value) * 100.0).round();
        #[allow(clippy::cast_precision_loss)]
        let limit = i64::MAX as f64;
        if cents.abs() >= limit {
            return Err(MoneyConversionError(format!("{value} is too large")));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self(cents as i64))
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Whole currency units, e.g. `Money::from_major_units(70_000)` is TSh 70,000.00
    pub fn from_major_units(units: i64) -> Self {
        Self(units.saturating_mul(100))
    }

    /// Lenient conversion from a float in major units. Non-finite and out-of-range input maps to zero.
    pub fn from_major(value: f64) -> Self {
        Self::try_from(value).unwrap_or_default()
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn to_major(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// `self - rhs`, floored at zero.
    pub fn saturating_sub(self, rhs: Money) -> Money {
        Money(self.0.saturating_sub(rhs.0).max(0))
    }

    /// Multiplies a unit price by a quantity, saturating on overflow.
    pub fn times(self, quantity: u32) -> Money {
        Money(self.0.saturating_mul(i64::from(quantity)))
    }

    pub fn checked_times(self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(i64::from(quantity)).map(Money)
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    /// Sums the amounts, or returns `None` if the total does not fit.
    pub fn checked_sum<I: IntoIterator<Item = Money>>(amounts: I) -> Option<Money> {
        amounts.into_iter().try_fold(Money::ZERO, Money::checked_add)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0 % 100 == 0 {
            serializer.serialize_i64(self.0 / 100)
        } else {
            serializer.serialize_f64(self.to_major())
        }
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Ok(Money::from_major(value))
    }
}
