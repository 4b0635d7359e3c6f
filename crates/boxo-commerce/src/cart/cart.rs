//! Cart and cart item types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::BookListing;
use crate::error::CommerceError;
use crate::ids::{BookId, UserId};
use crate::money::Money;

/// A user's shopping cart. One per user, at most one item per book.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cart {
    /// Owner of the cart.
    pub user_id: UserId,
    /// Items in the cart.
    pub items: Vec<CartItem>,
    /// Time of the last mutation.
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Create an empty cart for a user.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            items: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Add a book to the cart.
    ///
    /// If the book is already in the cart the quantities are merged and the
    /// line total is re-derived from the price captured when the item was
    /// first added. Otherwise a new item is created from the listing's current
    /// price, sale price and primary image.
    pub fn add_item(&mut self, listing: &BookListing, quantity: i64) -> Result<&CartItem, CommerceError> {
        validate_quantity(quantity)?;

        let index = match self.items.iter().position(|i| i.book_id == listing.id) {
            Some(index) => {
                let item = &mut self.items[index];
                let merged = item
                    .quantity
                    .checked_add(quantity)
                    .ok_or(CommerceError::Overflow)?;
                item.set_quantity(merged)?;
                index
            }
            None => {
                self.items.push(CartItem::from_listing(listing, quantity)?);
                self.items.len() - 1
            }
        };

        self.touch();
        Ok(&self.items[index])
    }

    /// Replace an item's quantity.
    pub fn set_quantity(&mut self, book_id: &BookId, quantity: i64) -> Result<(), CommerceError> {
        let item = self.item_mut(book_id)?;
        item.set_quantity(quantity)?;
        self.touch();
        Ok(())
    }

    /// Remove an item. Returns false if the book was not in the cart.
    pub fn remove_item(&mut self, book_id: &BookId) -> bool {
        let len_before = self.items.len();
        self.items.retain(|i| &i.book_id != book_id);
        let removed = self.items.len() < len_before;
        if removed {
            self.touch();
        }
        removed
    }

    /// Remove every item.
    pub fn clear(&mut self) {
        self.items.clear();
        self.touch();
    }

    /// Flag one item for (or exclude it from) the next checkout.
    pub fn set_checked(&mut self, book_id: &BookId, checked: bool) -> Result<(), CommerceError> {
        self.item_mut(book_id)?.is_checked = checked;
        self.touch();
        Ok(())
    }

    /// Flag every item.
    pub fn set_all_checked(&mut self, checked: bool) {
        for item in &mut self.items {
            item.is_checked = checked;
        }
        self.touch();
    }

    /// Items selected for checkout.
    pub fn checked_items(&self) -> Vec<&CartItem> {
        self.items.iter().filter(|i| i.is_checked).collect()
    }

    /// Sum of the line totals of the checked items.
    pub fn checked_subtotal(&self) -> Result<Money, CommerceError> {
        Money::try_sum(self.items.iter().filter(|i| i.is_checked).map(|i| i.line_total))
            .ok_or(CommerceError::Overflow)
    }

    /// Remove and return the checked items, leaving unchecked ones in place.
    pub fn take_checked(&mut self) -> Vec<CartItem> {
        let (checked, kept): (Vec<_>, Vec<_>) =
            self.items.drain(..).partition(|i| i.is_checked);
        self.items = kept;
        self.touch();
        checked
    }

    /// Put items back after an interrupted checkout, merging with anything the
    /// user added in the meantime.
    pub fn restore(&mut self, items: Vec<CartItem>) -> Result<(), CommerceError> {
        for restored in items {
            match self.items.iter_mut().find(|i| i.book_id == restored.book_id) {
                Some(existing) => {
                    let merged = existing
                        .quantity
                        .checked_add(restored.quantity)
                        .ok_or(CommerceError::Overflow)?;
                    existing.set_quantity(merged)?;
                }
                None => self.items.push(restored),
            }
        }
        self.touch();
        Ok(())
    }

    /// Total number of units in the cart.
    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get an item by book.
    pub fn get_item(&self, book_id: &BookId) -> Option<&CartItem> {
        self.items.iter().find(|i| &i.book_id == book_id)
    }

    fn item_mut(&mut self, book_id: &BookId) -> Result<&mut CartItem, CommerceError> {
        self.items
            .iter_mut()
            .find(|i| &i.book_id == book_id)
            .ok_or_else(|| CommerceError::not_found("Cart item", book_id))
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A line in the cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartItem {
    /// Book being purchased.
    pub book_id: BookId,
    /// Book title at insertion time.
    pub name: String,
    /// List price at insertion time.
    pub unit_price: Money,
    /// Sale price at insertion time.
    pub discounted_unit_price: Option<Money>,
    /// Primary image at insertion time.
    pub image_url: String,
    /// Quantity, at least one.
    pub quantity: i64,
    /// Effective unit price times quantity. Re-derived on every quantity change.
    pub line_total: Money,
    /// Selected for the next checkout.
    pub is_checked: bool,
}

impl CartItem {
    /// Snapshot a listing into a new, unchecked cart item.
    pub fn from_listing(listing: &BookListing, quantity: i64) -> Result<Self, CommerceError> {
        validate_quantity(quantity)?;
        let line_total = listing
            .effective_price()
            .checked_mul(quantity)
            .ok_or(CommerceError::Overflow)?;
        Ok(Self {
            book_id: listing.id.clone(),
            name: listing.name.clone(),
            unit_price: listing.price,
            discounted_unit_price: listing.discounted_price,
            image_url: listing.primary_image_url.clone(),
            quantity,
            line_total,
            is_checked: false,
        })
    }

    /// Unit price the line total is computed from.
    pub fn effective_unit_price(&self) -> Money {
        self.discounted_unit_price.unwrap_or(self.unit_price)
    }

    /// Change the quantity and re-derive the line total.
    pub fn set_quantity(&mut self, quantity: i64) -> Result<(), CommerceError> {
        validate_quantity(quantity)?;
        self.line_total = self
            .effective_unit_price()
            .checked_mul(quantity)
            .ok_or(CommerceError::Overflow)?;
        self.quantity = quantity;
        Ok(())
    }
}

fn validate_quantity(quantity: i64) -> Result<(), CommerceError> {
    if quantity < 1 {
        return Err(CommerceError::InvalidQuantity(quantity));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(id: &str, price: i64) -> BookListing {
        BookListing {
            id: BookId::new(id),
            name: format!("Book {}", id),
            price: Money::from_dong(price),
            discounted_price: None,
            available_quantity: 100,
            primary_image_url: format!("https://img.example/{}.jpg", id),
        }
    }

    #[test]
    fn test_add_same_book_merges() {
        let mut cart = Cart::new(UserId::new("u-1"));
        let book = listing("x", 50_000);

        cart.add_item(&book, 2).unwrap();
        cart.add_item(&book, 3).unwrap();

        assert_eq!(cart.items.len(), 1);
        let item = cart.get_item(&book.id).unwrap();
        assert_eq!(item.quantity, 5);
        assert_eq!(item.line_total, Money::from_dong(250_000));
    }

    #[test]
    fn test_price_is_not_resynced_on_merge() {
        let mut cart = Cart::new(UserId::new("u-1"));
        let mut book = listing("x", 50_000);
        cart.add_item(&book, 1).unwrap();

        book.price = Money::from_dong(70_000);
        cart.add_item(&book, 1).unwrap();

        let item = cart.get_item(&book.id).unwrap();
        assert_eq!(item.unit_price, Money::from_dong(50_000));
        assert_eq!(item.line_total, Money::from_dong(100_000));
    }

    #[test]
    fn test_sale_price_drives_line_total() {
        let mut cart = Cart::new(UserId::new("u-1"));
        let mut book = listing("x", 50_000);
        book.discounted_price = Some(Money::from_dong(40_000));

        cart.add_item(&book, 2).unwrap();
        cart.set_quantity(&book.id, 3).unwrap();

        assert_eq!(
            cart.get_item(&book.id).unwrap().line_total,
            Money::from_dong(120_000)
        );
    }

    #[test]
    fn test_invalid_quantity() {
        let mut cart = Cart::new(UserId::new("u-1"));
        let book = listing("x", 50_000);
        assert!(matches!(
            cart.add_item(&book, 0),
            Err(CommerceError::InvalidQuantity(0))
        ));
    }

    #[test]
    fn test_checked_selection() {
        let mut cart = Cart::new(UserId::new("u-1"));
        let a = listing("a", 10_000);
        let b = listing("b", 20_000);
        cart.add_item(&a, 1).unwrap();
        cart.add_item(&b, 2).unwrap();

        assert!(cart.checked_items().is_empty());
        cart.set_checked(&b.id, true).unwrap();
        assert_eq!(cart.checked_subtotal().unwrap(), Money::from_dong(40_000));

        let taken = cart.take_checked();
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].book_id, b.id);
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].book_id, a.id);
    }

    #[test]
    fn test_set_checked_unknown_item() {
        let mut cart = Cart::new(UserId::new("u-1"));
        assert!(matches!(
            cart.set_checked(&BookId::new("nope"), true),
            Err(CommerceError::NotFound { .. })
        ));
    }

    #[test]
    fn test_restore_merges_with_new_items() {
        let mut cart = Cart::new(UserId::new("u-1"));
        let a = listing("a", 10_000);
        cart.add_item(&a, 2).unwrap();
        cart.set_all_checked(true);
        let taken = cart.take_checked();
        assert!(cart.is_empty());

        cart.add_item(&a, 1).unwrap();
        cart.restore(taken).unwrap();

        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.item_count(), 3);
        assert_eq!(cart.items[0].line_total, Money::from_dong(30_000));
    }
}
