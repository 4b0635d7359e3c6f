//! Checkout saga: the mutating steps of placing an order and how to undo them.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::cart::CartItem;
use crate::catalog::StockReservation;
use crate::error::CommerceError;
use crate::ids::{DiscountId, OrderId, PaymentId, SagaId, ShippingId, UserId};

/// Mutating steps of a checkout, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    /// Pending order written.
    OrderCreated,
    /// Shipping record written.
    ShippingCreated,
    /// Unpaid payment record written.
    PaymentCreated,
    /// Shipping and payment IDs stored on the order.
    ReferencesLinked,
    /// Stock taken out of inventory.
    InventoryReserved,
    /// Checked items taken out of the cart.
    CartItemsRemoved,
    /// Discount redemption consumed.
    DiscountRedeemed,
    /// "Order placed" notification persisted.
    CustomerNotified,
}

impl CheckoutStep {
    pub const ALL: [CheckoutStep; 8] = [
        CheckoutStep::OrderCreated,
        CheckoutStep::ShippingCreated,
        CheckoutStep::PaymentCreated,
        CheckoutStep::ReferencesLinked,
        CheckoutStep::InventoryReserved,
        CheckoutStep::CartItemsRemoved,
        CheckoutStep::DiscountRedeemed,
        CheckoutStep::CustomerNotified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutStep::OrderCreated => "order_created",
            CheckoutStep::ShippingCreated => "shipping_created",
            CheckoutStep::PaymentCreated => "payment_created",
            CheckoutStep::ReferencesLinked => "references_linked",
            CheckoutStep::InventoryReserved => "inventory_reserved",
            CheckoutStep::CartItemsRemoved => "cart_items_removed",
            CheckoutStep::DiscountRedeemed => "discount_redeemed",
            CheckoutStep::CustomerNotified => "customer_notified",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            CheckoutStep::OrderCreated => "order created",
            CheckoutStep::ShippingCreated => "shipping created",
            CheckoutStep::PaymentCreated => "payment created",
            CheckoutStep::ReferencesLinked => "references linked",
            CheckoutStep::InventoryReserved => "inventory reserved",
            CheckoutStep::CartItemsRemoved => "cart items removed",
            CheckoutStep::DiscountRedeemed => "discount redeemed",
            CheckoutStep::CustomerNotified => "customer notified",
        }
    }

    /// Get the step number (1-indexed).
    pub fn number(&self) -> u8 {
        match self {
            CheckoutStep::OrderCreated => 1,
            CheckoutStep::ShippingCreated => 2,
            CheckoutStep::PaymentCreated => 3,
            CheckoutStep::ReferencesLinked => 4,
            CheckoutStep::InventoryReserved => 5,
            CheckoutStep::CartItemsRemoved => 6,
            CheckoutStep::DiscountRedeemed => 7,
            CheckoutStep::CustomerNotified => 8,
        }
    }

    /// Whether undoing the step changes anything.
    pub fn has_compensation(&self) -> bool {
        !matches!(
            self,
            CheckoutStep::ReferencesLinked | CheckoutStep::CustomerNotified
        )
    }
}

impl fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Where a checkout saga stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SagaState {
    /// Steps are still being applied.
    InProgress,
    /// Every step succeeded.
    Completed,
    /// A step failed; the completed steps await compensation.
    Failed { step: CheckoutStep, error: String },
    /// Every completed step has been undone.
    Compensated,
}

/// Log of one checkout's mutations and the data needed to undo them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutSaga {
    pub id: SagaId,
    pub user_id: UserId,
    pub order_id: OrderId,
    pub state: SagaState,
    /// Steps that succeeded, in order.
    pub completed: Vec<CheckoutStep>,
    /// Steps that have been undone.
    pub compensated: Vec<CheckoutStep>,
    pub shipping_id: Option<ShippingId>,
    pub payment_id: Option<PaymentId>,
    pub discount_id: Option<DiscountId>,
    /// Stock to give back if inventory was reserved.
    pub reservations: Vec<StockReservation>,
    /// Items to put back in the cart if they were removed.
    pub removed_items: Vec<CartItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CheckoutSaga {
    /// Start a saga for an order.
    pub fn begin(user_id: UserId, order_id: OrderId) -> Self {
        let now = Utc::now();
        Self {
            id: SagaId::generate(),
            user_id,
            order_id,
            state: SagaState::InProgress,
            completed: Vec::new(),
            compensated: Vec::new(),
            shipping_id: None,
            payment_id: None,
            discount_id: None,
            reservations: Vec::new(),
            removed_items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a successful step.
    pub fn record(&mut self, step: CheckoutStep) {
        if !self.completed.contains(&step) {
            self.completed.push(step);
        }
        self.updated_at = Utc::now();
    }

    pub fn has_completed(&self, step: CheckoutStep) -> bool {
        self.completed.contains(&step)
    }

    pub fn fail(&mut self, step: CheckoutStep, error: &CommerceError) {
        self.state = SagaState::Failed {
            step,
            error: error.to_string(),
        };
        self.updated_at = Utc::now();
    }

    pub fn complete(&mut self) {
        self.state = SagaState::Completed;
        self.updated_at = Utc::now();
    }

    /// Failed sagas, and sagas left in progress for longer than `stale_after`
    /// (the process died mid-checkout).
    pub fn needs_reconciliation(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        match self.state {
            SagaState::Failed { .. } => true,
            SagaState::InProgress => now - self.updated_at >= stale_after,
            SagaState::Completed | SagaState::Compensated => false,
        }
    }

    /// Completed steps still to undo, latest first.
    pub fn pending_compensations(&self) -> Vec<CheckoutStep> {
        self.completed
            .iter()
            .rev()
            .filter(|s| s.has_compensation() && !self.compensated.contains(*s))
            .copied()
            .collect()
    }

    pub fn mark_compensated(&mut self, step: CheckoutStep) {
        if !self.compensated.contains(&step) {
            self.compensated.push(step);
        }
        self.updated_at = Utc::now();
    }

    /// Close the saga once nothing is left to undo.
    pub fn finish_compensation(&mut self) -> bool {
        if self.pending_compensations().is_empty() {
            self.state = SagaState::Compensated;
            self.updated_at = Utc::now();
            true
        } else {
            false
        }
    }

    /// Every step that moves stock, cart or discount state has run. A saga in
    /// this state only missed its final bookkeeping.
    pub fn is_fully_applied(&self) -> bool {
        self.has_completed(CheckoutStep::InventoryReserved)
            && self.has_completed(CheckoutStep::CartItemsRemoved)
            && (self.discount_id.is_none() || self.has_completed(CheckoutStep::DiscountRedeemed))
    }

    /// Whether the checkout went through.
    pub fn is_completed(&self) -> bool {
        self.state == SagaState::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn saga() -> CheckoutSaga {
        CheckoutSaga::begin(UserId::new("u-1"), OrderId::new("o-1"))
    }

    #[test]
    fn test_step_order() {
        let numbers: Vec<u8> = CheckoutStep::ALL.iter().map(|s| s.number()).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(CheckoutStep::InventoryReserved.to_string(), "inventory reserved");
    }

    #[test]
    fn test_compensations_run_in_reverse() {
        let mut saga = saga();
        saga.record(CheckoutStep::OrderCreated);
        saga.record(CheckoutStep::ShippingCreated);
        saga.record(CheckoutStep::PaymentCreated);
        saga.record(CheckoutStep::ReferencesLinked);
        saga.fail(
            CheckoutStep::InventoryReserved,
            &CommerceError::validation("Not enough quantity"),
        );

        assert_eq!(
            saga.pending_compensations(),
            vec![
                CheckoutStep::PaymentCreated,
                CheckoutStep::ShippingCreated,
                CheckoutStep::OrderCreated
            ]
        );

        saga.mark_compensated(CheckoutStep::PaymentCreated);
        assert!(!saga.finish_compensation());
        saga.mark_compensated(CheckoutStep::ShippingCreated);
        saga.mark_compensated(CheckoutStep::OrderCreated);
        assert!(saga.finish_compensation());
        assert_eq!(saga.state, SagaState::Compensated);
    }

    #[test]
    fn test_needs_reconciliation() {
        let now = Utc::now();
        let mut saga = saga();
        assert!(!saga.needs_reconciliation(now, Duration::minutes(5)));
        assert!(saga.needs_reconciliation(now + Duration::minutes(6), Duration::minutes(5)));

        saga.complete();
        assert!(!saga.needs_reconciliation(now + Duration::hours(1), Duration::minutes(5)));
    }
}
