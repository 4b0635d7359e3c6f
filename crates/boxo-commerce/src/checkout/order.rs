//! Order types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cart::CartItem;
use crate::error::CommerceError;
use crate::ids::{BookId, DiscountId, OrderId, PaymentId, ShippingId, UserId};
use crate::money::Money;

/// Order status.
///
/// `Pending -> Paid -> Shipped -> Delivered`, with `Canceled` reachable from
/// any non-terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Placed, awaiting payment.
    #[default]
    Pending,
    /// Payment captured.
    Paid,
    /// Handed to the carrier.
    Shipped,
    /// Received by the customer.
    Delivered,
    /// Order canceled.
    Canceled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Canceled => "CANCELED",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Paid => "Paid",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Canceled => "Canceled",
        }
    }

    /// Check if order is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Canceled)
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Pending, Paid) | (Paid, Shipped) | (Shipped, Delivered) => true,
            (from, Canceled) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Validate a transition, returning the new status.
    pub fn transition(&self, next: OrderStatus) -> Result<OrderStatus, CommerceError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CommerceError::InvalidTransition {
                entity: "order",
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = CommerceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(OrderStatus::Pending),
            "PAID" => Ok(OrderStatus::Paid),
            "SHIPPED" => Ok(OrderStatus::Shipped),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "CANCELED" | "CANCELLED" => Ok(OrderStatus::Canceled),
            other => Err(CommerceError::validation(format!(
                "Unknown order status: {}",
                other
            ))),
        }
    }
}

/// An order placed from the checked items of a cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: OrderId,
    /// Customer.
    pub user_id: UserId,
    /// Snapshot of the checked cart items. Never changes after creation.
    pub line_items: Vec<OrderLineItem>,
    pub status: OrderStatus,
    /// Set once the shipping record exists.
    pub shipping_id: Option<ShippingId>,
    /// Set once the payment record exists.
    pub payment_id: Option<PaymentId>,
    /// Discount applied at checkout.
    pub discount_id: Option<DiscountId>,
    /// Sum of line totals.
    pub subtotal: Money,
    /// Amount taken off by the discount.
    pub discount_amount: Money,
    pub shipping_fee: Money,
    /// `subtotal - discount_amount + shipping_fee`.
    pub total_payment: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Total units ordered.
    pub fn item_count(&self) -> i64 {
        self.line_items.iter().map(|i| i.quantity).sum()
    }

    /// Move to a new status through the order state machine.
    pub fn set_status(&mut self, next: OrderStatus) -> Result<(), CommerceError> {
        self.status = self.status.transition(next)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Attach the shipping and payment records.
    pub fn link(&mut self, shipping_id: ShippingId, payment_id: PaymentId) {
        self.shipping_id = Some(shipping_id);
        self.payment_id = Some(payment_id);
        self.updated_at = Utc::now();
    }

    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }
}

/// A line in an order, copied from the cart at checkout time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderLineItem {
    pub book_id: BookId,
    /// Book title at checkout.
    pub name: String,
    pub unit_price: Money,
    pub discounted_unit_price: Option<Money>,
    pub image_url: String,
    pub quantity: i64,
    pub line_total: Money,
}

impl From<&CartItem> for OrderLineItem {
    fn from(item: &CartItem) -> Self {
        Self {
            book_id: item.book_id.clone(),
            name: item.name.clone(),
            unit_price: item.unit_price,
            discounted_unit_price: item.discounted_unit_price,
            image_url: item.image_url.clone(),
            quantity: item.quantity,
            line_total: item.line_total,
        }
    }
}
