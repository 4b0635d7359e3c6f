//! Shipping records, rates and tracking numbers.

use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::checkout::AddressSnapshot;
use crate::error::CommerceError;
use crate::ids::{OrderId, ShippingId};
use crate::money::Money;

/// Prefix of every tracking number.
pub const TRACKING_PREFIX: &str = "BOXO-";

const TRACKING_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Distance-tiered shipping tariff.
///
/// | distance (km) | fee                         |
/// |---------------|-----------------------------|
/// | < 10          | base + d * rate             |
/// | [10, 30)      | base + d * rate * 0.8       |
/// | [30, 100)     | base + d * rate * 0.6       |
/// | [100, 300)    | base + d * rate * 0.5       |
/// | >= 300        | flat                        |
///
/// The result is multiplied by `scale` to get dong.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShippingRates {
    pub base: f64,
    pub rate_per_km: f64,
    pub flat: f64,
    pub scale: f64,
}

impl Default for ShippingRates {
    fn default() -> Self {
        Self {
            base: 10.0,
            rate_per_km: 0.3,
            flat: 60.0,
            scale: 1000.0,
        }
    }
}

impl ShippingRates {
    /// Fee for a delivery distance. A missing, negative, NaN or infinite
    /// distance costs nothing.
    pub fn cost(&self, distance_km: Option<f64>) -> Money {
        let Some(d) = distance_km.filter(|d| d.is_finite() && *d >= 0.0) else {
            return Money::ZERO;
        };

        let units = if d < 10.0 {
            self.base + d * self.rate_per_km
        } else if d < 30.0 {
            self.base + d * self.rate_per_km * 0.8
        } else if d < 100.0 {
            self.base + d * self.rate_per_km * 0.6
        } else if d < 300.0 {
            self.base + d * self.rate_per_km * 0.5
        } else {
            self.flat
        };

        Money::from_decimal(units * self.scale)
    }
}

/// Shipping status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShippingStatus {
    /// Waiting for payment or pickup.
    #[default]
    Pending,
    /// Handed to the carrier.
    Shipped,
    /// Received by the customer.
    Delivered,
    /// Shipment canceled.
    Canceled,
}

impl ShippingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShippingStatus::Pending => "PENDING",
            ShippingStatus::Shipped => "SHIPPED",
            ShippingStatus::Delivered => "DELIVERED",
            ShippingStatus::Canceled => "CANCELED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ShippingStatus::Delivered | ShippingStatus::Canceled)
    }

    pub fn can_transition_to(&self, next: ShippingStatus) -> bool {
        use ShippingStatus::*;
        matches!(
            (self, next),
            (Pending, Shipped) | (Shipped, Delivered) | (Pending, Canceled) | (Shipped, Canceled)
        )
    }

    /// Validate a transition, returning the new status.
    pub fn transition(&self, next: ShippingStatus) -> Result<ShippingStatus, CommerceError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CommerceError::InvalidTransition {
                entity: "shipping",
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }
}

impl fmt::Display for ShippingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ShippingStatus {
    type Err = CommerceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(ShippingStatus::Pending),
            "SHIPPED" => Ok(ShippingStatus::Shipped),
            "DELIVERED" => Ok(ShippingStatus::Delivered),
            "CANCELED" | "CANCELLED" => Ok(ShippingStatus::Canceled),
            other => Err(CommerceError::validation(format!(
                "Unknown shipping status: {}",
                other
            ))),
        }
    }
}

/// Delivery of one order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShippingRecord {
    pub id: ShippingId,
    /// Order being delivered.
    pub order_id: OrderId,
    /// Globally unique tracking number.
    pub tracking_number: String,
    pub status: ShippingStatus,
    /// Delivery address at checkout time.
    pub address: AddressSnapshot,
    /// Shipping fee charged.
    pub value: Money,
    /// Free-form carrier notes.
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShippingRecord {
    /// Create a pending shipment.
    pub fn new(
        order_id: OrderId,
        tracking_number: String,
        address: AddressSnapshot,
        value: Money,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ShippingId::generate(),
            order_id,
            tracking_number,
            status: ShippingStatus::Pending,
            address,
            value,
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to a new status through the shipping state machine.
    pub fn set_status(&mut self, next: ShippingStatus) -> Result<(), CommerceError> {
        self.status = self.status.transition(next)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Apply an update command. The status is validated before anything changes.
    pub fn apply(&mut self, update: &ShippingUpdate) -> Result<(), CommerceError> {
        if let Some(next) = update.status {
            if next != self.status {
                self.status = self.status.transition(next)?;
            }
        }
        if let Some(description) = &update.description {
            self.description = Some(description.clone());
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Update command for a shipping record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ShippingUpdate {
    pub status: Option<ShippingStatus>,
    pub description: Option<String>,
}

impl ShippingUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.description.is_none()
    }
}

/// Generate a tracking number: the prefix, `random_len` random characters
/// from `[A-Z0-9]`, then the last six digits of the millisecond clock.
pub fn generate_tracking_number(random_len: usize) -> String {
    generate_tracking_number_at(random_len, Utc::now())
}

pub fn generate_tracking_number_at(random_len: usize, now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let mut out = String::with_capacity(TRACKING_PREFIX.len() + random_len + 6);
    out.push_str(TRACKING_PREFIX);
    for _ in 0..random_len {
        let idx = rng.gen_range(0..TRACKING_ALPHABET.len());
        out.push(TRACKING_ALPHABET[idx] as char);
    }
    let millis = now.timestamp_millis().unsigned_abs() % 1_000_000;
    out.push_str(&format!("{:06}", millis));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shipping_cost_tiers() {
        let rates = ShippingRates::default();
        assert_eq!(rates.cost(Some(5.0)), Money::from_dong(11_500));
        assert_eq!(rates.cost(Some(0.0)), Money::from_dong(10_000));
        assert_eq!(rates.cost(Some(20.0)), Money::from_dong(14_800));
        assert_eq!(rates.cost(Some(50.0)), Money::from_dong(19_000));
        assert_eq!(rates.cost(Some(200.0)), Money::from_dong(40_000));
        assert_eq!(rates.cost(Some(300.0)), Money::from_dong(60_000));
        assert_eq!(rates.cost(Some(5_000.0)), Money::from_dong(60_000));
    }

    #[test]
    fn test_shipping_cost_tier_boundaries() {
        let rates = ShippingRates::default();
        // Each tier starts at its lower bound.
        assert_eq!(rates.cost(Some(9.99)), Money::from_dong(12_997));
        assert_eq!(rates.cost(Some(10.0)), Money::from_dong(12_400));
        assert_eq!(rates.cost(Some(29.99)), Money::from_minor(1_719_760));
        assert_eq!(rates.cost(Some(30.0)), Money::from_dong(15_400));
        assert_eq!(rates.cost(Some(99.99)), Money::from_minor(2_799_820));
        assert_eq!(rates.cost(Some(100.0)), Money::from_dong(25_000));
        assert_eq!(rates.cost(Some(299.99)), Money::from_minor(5_499_850));
    }

    #[test]
    fn test_shipping_cost_invalid_distance() {
        let rates = ShippingRates::default();
        assert_eq!(rates.cost(None), Money::ZERO);
        assert_eq!(rates.cost(Some(f64::NAN)), Money::ZERO);
        assert_eq!(rates.cost(Some(-3.0)), Money::ZERO);
        assert_eq!(rates.cost(Some(f64::INFINITY)), Money::ZERO);
    }

    #[test]
    fn test_tracking_number_format() {
        let tn = generate_tracking_number(8);
        assert!(tn.starts_with(TRACKING_PREFIX));
        let rest = &tn[TRACKING_PREFIX.len()..];
        assert_eq!(rest.len(), 14);
        assert!(rest[..8]
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        assert!(rest[8..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_tracking_number_uses_clock_suffix() {
        let now = DateTime::<Utc>::from_timestamp_millis(1_700_000_123_456).unwrap();
        assert!(generate_tracking_number_at(4, now).ends_with("123456"));
    }

    #[test]
    fn test_shipping_fsm() {
        assert!(ShippingStatus::Pending.can_transition_to(ShippingStatus::Shipped));
        assert!(ShippingStatus::Shipped.can_transition_to(ShippingStatus::Delivered));
        assert!(ShippingStatus::Pending.can_transition_to(ShippingStatus::Canceled));
        assert!(!ShippingStatus::Pending.can_transition_to(ShippingStatus::Delivered));
        assert!(!ShippingStatus::Delivered.can_transition_to(ShippingStatus::Canceled));
        assert!(ShippingStatus::Canceled.transition(ShippingStatus::Pending).is_err());
    }

    #[test]
    fn test_apply_update_validates_first() {
        let mut record = ShippingRecord::new(
            OrderId::new("o-1"),
            "BOXO-TEST".into(),
            AddressSnapshot {
                name: "A".into(),
                phone: "1".into(),
                description: "d".into(),
                city: "c".into(),
                province: "p".into(),
            },
            Money::from_dong(11_500),
        );

        let bad = ShippingUpdate {
            status: Some(ShippingStatus::Delivered),
            description: Some("skipped ahead".into()),
        };
        assert!(record.apply(&bad).is_err());
        assert_eq!(record.description, None);

        let good = ShippingUpdate {
            status: Some(ShippingStatus::Shipped),
            description: Some("picked up".into()),
        };
        record.apply(&good).unwrap();
        assert_eq!(record.status, ShippingStatus::Shipped);
        assert_eq!(record.description.as_deref(), Some("picked up"));
    }
}
