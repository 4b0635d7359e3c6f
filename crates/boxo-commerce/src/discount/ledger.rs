//! Discount resolution and redemption.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::discount::{AppliedDiscount, Discount};
use crate::error::CommerceError;
use crate::ids::DiscountId;
use crate::money::Money;
use crate::store::DiscountRepository;

/// Looks up discount codes, prices them against a subtotal and tracks the
/// remaining redemption count.
#[derive(Clone)]
pub struct DiscountLedger {
    repo: Arc<dyn DiscountRepository>,
}

impl DiscountLedger {
    pub fn new(repo: Arc<dyn DiscountRepository>) -> Self {
        Self { repo }
    }

    /// Resolve a code against a subtotal at the current time.
    pub async fn resolve(
        &self,
        code: &str,
        subtotal: Money,
    ) -> Result<Option<Discount>, CommerceError> {
        self.resolve_at(code, subtotal, Utc::now()).await
    }

    /// Resolve a code against a subtotal.
    ///
    /// Returns the discount only if it is active, inside its validity window,
    /// has redemptions left and `subtotal` meets its minimum. A discount found
    /// outside its window is deactivated and persisted as such.
    pub async fn resolve_at(
        &self,
        code: &str,
        subtotal: Money,
        now: DateTime<Utc>,
    ) -> Result<Option<Discount>, CommerceError> {
        let Some(mut discount) = self.repo.find_by_code(code).await? else {
            debug!(code, "Unknown discount code");
            return Ok(None);
        };

        if !discount.is_active {
            return Ok(None);
        }

        if discount.is_expired_at(now) {
            warn!(code, discount_id = %discount.id, "Deactivating discount outside its validity window");
            discount.is_active = false;
            self.repo.save_discount(&discount).await?;
            return Ok(None);
        }

        if !discount.is_usable_at(subtotal, now) {
            debug!(
                code,
                remaining = discount.quantity,
                minimum = %discount.min_required_value,
                subtotal = %subtotal,
                "Discount not applicable"
            );
            return Ok(None);
        }

        Ok(Some(discount))
    }

    /// Price a resolved discount against a subtotal.
    pub fn apply(&self, discount: &Discount, subtotal: Money) -> AppliedDiscount {
        AppliedDiscount::from_discount(discount, subtotal)
    }

    /// Consume one redemption. Fails with a validation error if none are left.
    pub async fn redeem(&self, discount_id: &DiscountId) -> Result<i64, CommerceError> {
        match self.repo.decrement_if_positive(discount_id).await? {
            Some(remaining) => {
                debug!(discount_id = %discount_id, remaining, "Discount redeemed");
                Ok(remaining)
            }
            None => Err(CommerceError::validation("Discount has no redemptions left")),
        }
    }

    /// Give back a redemption consumed by an interrupted checkout.
    pub async fn restore(&self, discount_id: &DiscountId) -> Result<(), CommerceError> {
        self.repo.increment_quantity(discount_id).await
    }

    /// Active discounts listed on the storefront.
    pub async fn public_discounts(&self) -> Result<Vec<Discount>, CommerceError> {
        self.public_discounts_at(Utc::now()).await
    }

    pub async fn public_discounts_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Discount>, CommerceError> {
        let mut discounts: Vec<Discount> = self
            .repo
            .list_discounts()
            .await?
            .into_iter()
            .filter(|d| d.is_public && d.is_active && !d.is_expired_at(now))
            .collect();
        discounts.sort_by(|a, b| a.end_date.cmp(&b.end_date));
        Ok(discounts)
    }

    /// Get a discount by ID.
    pub async fn get(&self, discount_id: &DiscountId) -> Result<Discount, CommerceError> {
        self.repo
            .get_discount(discount_id)
            .await?
            .ok_or_else(|| CommerceError::not_found("Discount", discount_id))
    }
}
