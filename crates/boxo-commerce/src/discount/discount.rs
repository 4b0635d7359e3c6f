//! Discount code types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CommerceError;
use crate::ids::DiscountId;
use crate::money::Money;

/// How a discount reduces the subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountKind {
    /// Percentage off (0.0 - 100.0).
    Percentage(f64),
    /// Fixed amount off.
    Fixed(Money),
}

impl DiscountKind {
    /// Build a kind from its stored type name and raw value.
    ///
    /// Fixed values are in whole dong. Unknown type names fail with
    /// [`CommerceError::UnexpectedDiscountType`].
    pub fn from_parts(kind: &str, value: f64) -> Result<Self, CommerceError> {
        if !value.is_finite() || value < 0.0 {
            return Err(CommerceError::validation(format!(
                "Invalid discount value: {}",
                value
            )));
        }
        match kind.to_ascii_uppercase().as_str() {
            "PERCENTAGE" => Ok(DiscountKind::Percentage(value.min(100.0))),
            "FIXED" => Ok(DiscountKind::Fixed(Money::from_decimal(value))),
            other => Err(CommerceError::UnexpectedDiscountType(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountKind::Percentage(_) => "PERCENTAGE",
            DiscountKind::Fixed(_) => "FIXED",
        }
    }

    /// Amount taken off `subtotal`, always within `[0, subtotal]`.
    pub fn amount_off(&self, subtotal: Money) -> Money {
        let subtotal = subtotal.max(Money::ZERO);
        let raw = match self {
            DiscountKind::Percentage(percent) => subtotal.percentage(*percent),
            DiscountKind::Fixed(amount) => *amount,
        };
        raw.max(Money::ZERO).min(subtotal)
    }
}

/// A discount code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Discount {
    /// Unique discount identifier.
    pub id: DiscountId,
    /// Code the customer types at checkout. Unique.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Percentage or fixed.
    pub kind: DiscountKind,
    /// Remaining redemptions. Never negative.
    pub quantity: i64,
    /// Smallest subtotal the code applies to.
    pub min_required_value: Money,
    /// First instant the code is valid.
    pub start_date: DateTime<Utc>,
    /// Last instant the code is valid.
    pub end_date: DateTime<Utc>,
    /// Cleared when the code is found outside its window.
    pub is_active: bool,
    /// Listed on the storefront.
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

impl Discount {
    /// Create an active, private discount with a single redemption.
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        kind: DiscountKind,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: DiscountId::generate(),
            code: code.into(),
            name: name.into(),
            kind,
            quantity: 1,
            min_required_value: Money::ZERO,
            start_date,
            end_date,
            is_active: true,
            is_public: false,
            created_at: Utc::now(),
        }
    }

    /// Set the number of redemptions.
    pub fn with_quantity(mut self, quantity: i64) -> Self {
        self.quantity = quantity.max(0);
        self
    }

    /// Set the minimum subtotal.
    pub fn with_minimum(mut self, amount: Money) -> Self {
        self.min_required_value = amount;
        self
    }

    /// List on the storefront.
    pub fn public(mut self) -> Self {
        self.is_public = true;
        self
    }

    /// Outside the `[start_date, end_date]` window.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now < self.start_date || now > self.end_date
    }

    /// Whether the code can be applied to `subtotal` at `now`.
    pub fn is_usable_at(&self, subtotal: Money, now: DateTime<Utc>) -> bool {
        self.is_active
            && !self.is_expired_at(now)
            && self.quantity > 0
            && subtotal >= self.min_required_value
    }

    /// Amount this discount takes off `subtotal`.
    pub fn discount_amount(&self, subtotal: Money) -> Money {
        self.kind.amount_off(subtotal)
    }
}

/// A discount that has been applied to a checkout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppliedDiscount {
    /// The discount ID.
    pub discount_id: DiscountId,
    /// The discount code used.
    pub code: String,
    /// Amount discounted.
    pub amount: Money,
    /// Subtotal after the discount.
    pub adjusted_subtotal: Money,
}

impl AppliedDiscount {
    /// Apply a discount to a subtotal.
    pub fn from_discount(discount: &Discount, subtotal: Money) -> Self {
        let amount = discount.discount_amount(subtotal);
        Self {
            discount_id: discount.id.clone(),
            code: discount.code.clone(),
            amount,
            adjusted_subtotal: subtotal.saturating_sub_floor_zero(amount),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        let now = Utc::now();
        (now - Duration::days(1), now + Duration::days(1))
    }

    #[test]
    fn test_percentage_discount() {
        let (start, end) = window();
        let discount = Discount::new("SAVE10", "10% Off", DiscountKind::Percentage(10.0), start, end);
        let applied = AppliedDiscount::from_discount(&discount, Money::from_dong(100_000));
        assert_eq!(applied.amount, Money::from_dong(10_000));
        assert_eq!(applied.adjusted_subtotal, Money::from_dong(90_000));
    }

    #[test]
    fn test_fixed_discount_clamps_to_subtotal() {
        let (start, end) = window();
        let discount = Discount::new(
            "BIG",
            "200k off",
            DiscountKind::Fixed(Money::from_dong(200_000)),
            start,
            end,
        );
        let applied = AppliedDiscount::from_discount(&discount, Money::from_dong(100_000));
        assert_eq!(applied.amount, Money::from_dong(100_000));
        assert_eq!(applied.adjusted_subtotal, Money::ZERO);
    }

    #[test]
    fn test_usability() {
        let (start, end) = window();
        let now = Utc::now();
        let discount = Discount::new("MIN", "Min 50k", DiscountKind::Percentage(5.0), start, end)
            .with_quantity(1)
            .with_minimum(Money::from_dong(50_000));

        assert!(discount.is_usable_at(Money::from_dong(50_000), now));
        assert!(!discount.is_usable_at(Money::from_dong(49_999), now));
        assert!(!discount.clone().with_quantity(0).is_usable_at(Money::from_dong(60_000), now));
        assert!(!discount.is_usable_at(Money::from_dong(60_000), end + Duration::seconds(1)));
        assert!(!discount.is_usable_at(Money::from_dong(60_000), start - Duration::seconds(1)));
    }

    #[test]
    fn test_from_parts() {
        assert_eq!(
            DiscountKind::from_parts("percentage", 10.0).unwrap(),
            DiscountKind::Percentage(10.0)
        );
        assert_eq!(
            DiscountKind::from_parts("FIXED", 20_000.0).unwrap(),
            DiscountKind::Fixed(Money::from_dong(20_000))
        );
        assert!(matches!(
            DiscountKind::from_parts("BOGO", 1.0),
            Err(CommerceError::UnexpectedDiscountType(_))
        ));
        assert!(DiscountKind::from_parts("FIXED", -1.0).is_err());
    }

    #[test]
    fn test_kind_serializes_tagged() {
        let json = serde_json::to_value(DiscountKind::Percentage(10.0)).unwrap();
        assert_eq!(json["type"], "PERCENTAGE");
        assert_eq!(json["value"], 10.0);
    }
}
