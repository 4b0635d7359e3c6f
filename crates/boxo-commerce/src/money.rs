//! Money type for representing monetary values.
//!
//! The store trades in Vietnamese dong. Amounts are kept as integer hundredths
//! of a dong so that the two-decimal rounding applied to shipping fees and
//! percentage discounts is exact and sums never drift.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Number of minor units per dong.
const MINOR_PER_MAJOR: i64 = 100;

/// A monetary amount in hundredths of a dong.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Money {
    amount_minor: i64,
}

impl Money {
    /// Zero.
    pub const ZERO: Money = Money { amount_minor: 0 };

    /// Create from minor units.
    pub const fn from_minor(amount_minor: i64) -> Self {
        Self { amount_minor }
    }

    /// Create from a whole-dong amount.
    pub const fn from_dong(amount: i64) -> Self {
        Self {
            amount_minor: amount * MINOR_PER_MAJOR,
        }
    }

    /// Create from a decimal amount, rounded to the nearest minor unit.
    ///
    /// ```
    /// use boxo_commerce::money::Money;
    /// let fee = Money::from_decimal(11_500.0);
    /// assert_eq!(fee.amount_minor(), 1_150_000);
    /// ```
    pub fn from_decimal(amount: f64) -> Self {
        Self::from_minor((amount * MINOR_PER_MAJOR as f64).round() as i64)
    }

    /// Amount in minor units.
    pub fn amount_minor(&self) -> i64 {
        self.amount_minor
    }

    /// Convert to a decimal value.
    pub fn to_decimal(&self) -> f64 {
        self.amount_minor as f64 / MINOR_PER_MAJOR as f64
    }

    pub fn is_zero(&self) -> bool {
        self.amount_minor == 0
    }

    /// Format as a display string (e.g., "111,500.00 ₫").
    pub fn display(&self) -> String {
        let sign = if self.amount_minor < 0 { "-" } else { "" };
        let abs = self.amount_minor.unsigned_abs();
        let whole = abs / MINOR_PER_MAJOR as u64;
        let frac = abs % MINOR_PER_MAJOR as u64;
        format!("{}{}.{:02} \u{20ab}", sign, group_thousands(whole), frac)
    }

    /// Checked addition.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.amount_minor
            .checked_add(other.amount_minor)
            .map(Money::from_minor)
    }

    /// Checked subtraction.
    pub fn checked_sub(&self, other: Money) -> Option<Money> {
        self.amount_minor
            .checked_sub(other.amount_minor)
            .map(Money::from_minor)
    }

    /// Subtract, never going below zero.
    pub fn saturating_sub_floor_zero(&self, other: Money) -> Money {
        Money::from_minor(self.amount_minor.saturating_sub(other.amount_minor).max(0))
    }

    /// Multiply by an integer quantity, returning None on overflow.
    pub fn checked_mul(&self, factor: i64) -> Option<Money> {
        self.amount_minor.checked_mul(factor).map(Money::from_minor)
    }

    /// Calculate a percentage of this amount, rounded to the nearest minor unit.
    pub fn percentage(&self, percent: f64) -> Money {
        Money::from_minor((self.amount_minor as f64 * percent / 100.0).round() as i64)
    }

    /// Sum an iterator of amounts, returning None on overflow.
    pub fn try_sum(iter: impl IntoIterator<Item = Money>) -> Option<Money> {
        iter.into_iter()
            .try_fold(Money::ZERO, |acc, m| acc.checked_add(m))
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, other: Money) -> Money {
        Money::from_minor(self.amount_minor.saturating_add(other.amount_minor))
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, other: Money) -> Money {
        Money::from_minor(self.amount_minor.saturating_sub(other.amount_minor))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_from_dong() {
        let m = Money::from_dong(100_000);
        assert_eq!(m.amount_minor(), 10_000_000);
        assert!((m.to_decimal() - 100_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_money_from_decimal_rounds() {
        assert_eq!(Money::from_decimal(12.346).amount_minor(), 1235);
        assert_eq!(Money::from_decimal(0.004).amount_minor(), 0);
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_dong(111_500).display(), "111,500.00 \u{20ab}");
        assert_eq!(Money::from_minor(-150).display(), "-1.50 \u{20ab}");
        assert_eq!(Money::ZERO.display(), "0.00 \u{20ab}");
    }

    #[test]
    fn test_money_percentage() {
        let m = Money::from_dong(100_000);
        assert_eq!(m.percentage(10.0), Money::from_dong(10_000));
    }

    #[test]
    fn test_money_floor_zero() {
        let subtotal = Money::from_dong(100_000);
        let off = Money::from_dong(200_000);
        assert_eq!(subtotal.saturating_sub_floor_zero(off), Money::ZERO);
    }

    #[test]
    fn test_try_sum_overflow() {
        let big = Money::from_minor(i64::MAX);
        assert!(Money::try_sum([big, Money::from_minor(1)]).is_none());
        assert_eq!(
            Money::try_sum([Money::from_dong(1), Money::from_dong(2)]),
            Some(Money::from_dong(3))
        );
    }
}
