//! Payment records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CommerceError;
use crate::ids::{DiscountId, OrderId, PaymentId};
use crate::money::Money;

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    /// Pay the courier on delivery.
    #[default]
    CashOnDelivery,
    /// Bank transfer.
    BankTransfer,
    /// Card through the payment gateway.
    Card,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::CashOnDelivery => "CASH_ON_DELIVERY",
            PaymentType::BankTransfer => "BANK_TRANSFER",
            PaymentType::Card => "CARD",
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentType {
    type Err = CommerceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "CASH_ON_DELIVERY" | "COD" => Ok(PaymentType::CashOnDelivery),
            "BANK_TRANSFER" => Ok(PaymentType::BankTransfer),
            "CARD" => Ok(PaymentType::Card),
            other => Err(CommerceError::validation(format!(
                "Unknown payment type: {}",
                other
            ))),
        }
    }
}

/// Payment owed for one order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub order_id: OrderId,
    /// Amount due, equal to the order's total payment.
    pub value: Money,
    pub payment_type: PaymentType,
    pub is_paid: bool,
    /// Discount applied to the order, if any.
    pub discount_id: Option<DiscountId>,
    /// Set when the payment is captured.
    pub paid_at: Option<DateTime<Utc>>,
    /// Set when an interrupted checkout voids the payment.
    pub voided: bool,
    pub created_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// Create an unpaid payment.
    pub fn new(
        order_id: OrderId,
        value: Money,
        payment_type: PaymentType,
        discount_id: Option<DiscountId>,
    ) -> Self {
        Self {
            id: PaymentId::generate(),
            order_id,
            value,
            payment_type,
            is_paid: false,
            discount_id,
            paid_at: None,
            voided: false,
            created_at: Utc::now(),
        }
    }

    /// Unpaid and not voided.
    pub fn is_pending(&self) -> bool {
        !self.is_paid && !self.voided
    }
}
