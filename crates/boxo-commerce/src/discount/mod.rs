//! Discount codes.
//!
//! Contains the discount record, its kinds, and the ledger that resolves and
//! redeems codes.

mod discount;
mod ledger;

pub use discount::{AppliedDiscount, Discount, DiscountKind};
pub use ledger::DiscountLedger;
