//! Inventory lookup and reservation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CommerceError;
use crate::ids::BookId;
use crate::money::Money;

/// What the cart and checkout need to know about a book.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookListing {
    /// Book identifier.
    pub id: BookId,
    /// Title shown in the cart.
    pub name: String,
    /// List price.
    pub price: Money,
    /// Sale price, when the book is on sale.
    pub discounted_price: Option<Money>,
    /// Units on hand.
    pub available_quantity: i64,
    /// URL of the first product image, empty when the book has none.
    pub primary_image_url: String,
}

impl BookListing {
    /// Price the customer pays per unit.
    pub fn effective_price(&self) -> Money {
        self.discounted_price.unwrap_or(self.price)
    }

    /// Check if a specific quantity is on hand.
    pub fn can_fulfill(&self, quantity: i64) -> bool {
        self.available_quantity >= quantity
    }

    /// Fail with [`CommerceError::InsufficientInventory`] if `quantity` is not on hand.
    pub fn ensure_available(&self, quantity: i64) -> Result<(), CommerceError> {
        if self.can_fulfill(quantity) {
            Ok(())
        } else {
            Err(CommerceError::InsufficientInventory {
                book_id: self.id.to_string(),
                requested: quantity,
                available: self.available_quantity,
            })
        }
    }
}

/// A quantity of one book taken out of stock for an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StockReservation {
    pub book_id: BookId,
    pub quantity: i64,
}

impl StockReservation {
    pub fn new(book_id: BookId, quantity: i64) -> Self {
        Self { book_id, quantity }
    }
}

/// Per-book stock owned by the catalog.
///
/// `reserve_for_order` is all-or-nothing: every line is checked against the
/// stock on hand before any decrement is applied, and a line that would drive
/// stock below zero rejects the whole batch. Implementations must make the
/// check and the decrement a single atomic step.
#[async_trait]
pub trait InventoryCatalog: Send + Sync {
    /// Look up a book's listing.
    async fn lookup(&self, book_id: &BookId) -> Result<Option<BookListing>, CommerceError>;

    /// Atomically decrement stock for every reservation.
    async fn reserve_for_order(&self, items: &[StockReservation]) -> Result<(), CommerceError>;

    /// Put previously reserved stock back (checkout compensation).
    async fn release(&self, items: &[StockReservation]) -> Result<(), CommerceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(available: i64) -> BookListing {
        BookListing {
            id: BookId::new("book-1"),
            name: "Dế Mèn phiêu lưu ký".to_string(),
            price: Money::from_dong(100_000),
            discounted_price: None,
            available_quantity: available,
            primary_image_url: String::new(),
        }
    }

    #[test]
    fn test_effective_price_prefers_sale_price() {
        let mut book = listing(5);
        assert_eq!(book.effective_price(), Money::from_dong(100_000));
        book.discounted_price = Some(Money::from_dong(80_000));
        assert_eq!(book.effective_price(), Money::from_dong(80_000));
    }

    #[test]
    fn test_ensure_available() {
        let book = listing(3);
        assert!(book.ensure_available(3).is_ok());
        match book.ensure_available(4) {
            Err(CommerceError::InsufficientInventory {
                requested,
                available,
                ..
            }) => {
                assert_eq!(requested, 4);
                assert_eq!(available, 3);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
