//! Checkout settings.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::checkout::ShippingRates;
pub use crate::notification::Locale;

/// Tunables passed to the orchestrator. Every field has a default, so an
/// empty `[checkout]` table is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutSettings {
    /// Random characters in a tracking number.
    pub tracking_random_len: usize,
    /// Attempts at a unique tracking number before giving up.
    pub tracking_attempts: u32,
    /// Language of notification texts.
    pub locale: Locale,
    /// Seconds between reconciliation runs.
    pub reconcile_interval_secs: u64,
    /// In-progress sagas untouched for this long are treated as abandoned.
    pub saga_stale_after_secs: i64,
    /// Shipping tariff.
    pub shipping: ShippingRates,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            tracking_random_len: 8,
            tracking_attempts: 5,
            locale: Locale::default(),
            reconcile_interval_secs: 60,
            saga_stale_after_secs: 300,
            shipping: ShippingRates::default(),
        }
    }
}

impl CheckoutSettings {
    pub fn saga_stale_after(&self) -> Duration {
        Duration::seconds(self.saga_stale_after_secs.max(0))
    }

    pub fn reconcile_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.reconcile_interval_secs.max(1))
    }
}
