//! Naira amounts and their kobo representation.
//!
//! Prices are stored and displayed in naira ([`Naira`], decimal). Payment
//! gateways bill in kobo ([`Kobo`], integer), the smallest subunit:
//! 100 kobo make one naira.
//!
//! ```
//! use rust_decimal::Decimal;
//! use swiftdrop_core::{Kobo, Naira};
//!
//! let price = Naira::new(Decimal::new(150_050, 2)); // ₦1,500.50
//! assert_eq!(price.to_kobo().unwrap(), Kobo::new(150_050));
//! assert_eq!(price.to_string(), "₦1,500.50");
//! ```

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign, Mul, Sub};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// ISO 4217 code sent to payment gateways.
pub const CURRENCY_CODE: &str = "NGN";

/// Number of kobo in one naira.
pub const KOBO_PER_NAIRA: i64 = 100;

/// Errors from naira arithmetic and kobo conversion.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// The amount does not fit in a 64-bit kobo count.
    #[error("amount {0} is too large to bill in kobo")]
    Overflow(Decimal),

    /// An addition or multiplication left the decimal range.
    #[error("amount {0} is out of range")]
    OutOfRange(Decimal),
}

/// An amount in naira (the major unit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Naira(Decimal);

impl Naira {
    /// Zero naira.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create an amount from a decimal value.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create an amount from a whole number of naira.
    #[must_use]
    pub fn from_whole(naira: i64) -> Self {
        Self(Decimal::from(naira))
    }

    /// Get the underlying decimal.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether the amount is strictly greater than zero.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Add two amounts.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::OutOfRange`] if the sum does not fit.
    pub fn checked_add(self, rhs: Self) -> Result<Self, MoneyError> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or(MoneyError::OutOfRange(self.0))
    }

    /// Multiply by a quantity.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::OutOfRange`] if the product does not fit.
    pub fn checked_mul(self, quantity: u32) -> Result<Self, MoneyError> {
        self.0
            .checked_mul(Decimal::from(quantity))
            .map(Self)
            .ok_or(MoneyError::OutOfRange(self.0))
    }

    /// Convert to kobo, rounding to the nearest kobo (midpoint away from zero).
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the result does not fit in `i64`.
    pub fn to_kobo(&self) -> Result<Kobo, MoneyError> {
        let scaled = self
            .0
            .checked_mul(Decimal::from(KOBO_PER_NAIRA))
            .ok_or(MoneyError::Overflow(self.0))?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

        scaled
            .to_i64()
            .map(Kobo)
            .ok_or(MoneyError::Overflow(self.0))
    }
}

impl fmt::Display for Naira {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rounded = self
            .0
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
            "-"
        } else {
            ""
        };
        let text = format!("{:.2}", rounded.abs());
        let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));
        write!(f, "{sign}₦{}.{fraction}", group_thousands(whole))
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

// Operators saturate at the decimal range. A saturated amount still fails
// `to_kobo`, so it can never be billed.
impl Add for Naira {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Naira {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Naira {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Mul<u32> for Naira {
    type Output = Self;

    fn mul(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(Decimal::from(quantity)))
    }
}

impl Sum for Naira {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Self> for Naira {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// An amount in kobo (the minor unit payment gateways bill in).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Kobo(i64);

impl Kobo {
    /// Create an amount from a raw kobo count.
    #[must_use]
    pub const fn new(kobo: i64) -> Self {
        Self(kobo)
    }

    /// Get the raw kobo count.
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }

    /// Convert back to naira. This conversion is exact.
    #[must_use]
    pub fn to_naira(&self) -> Naira {
        Naira(Decimal::new(self.0, 2))
    }
}

impl fmt::Display for Kobo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
