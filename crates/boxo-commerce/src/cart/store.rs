//! Cart service: validates against inventory and persists carts.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::cart::Cart;
use crate::catalog::{BookListing, InventoryCatalog};
use crate::error::CommerceError;
use crate::ids::{BookId, UserId};
use crate::locks::UserLocks;
use crate::store::CartRepository;

/// Cart operations for one store. Mutations of the same user's cart run one
/// at a time and never overlap with that user's checkout.
#[derive(Clone)]
pub struct CartStore {
    carts: Arc<dyn CartRepository>,
    catalog: Arc<dyn InventoryCatalog>,
    locks: UserLocks,
}

impl CartStore {
    pub fn new(
        carts: Arc<dyn CartRepository>,
        catalog: Arc<dyn InventoryCatalog>,
        locks: UserLocks,
    ) -> Self {
        Self {
            carts,
            catalog,
            locks,
        }
    }

    /// Add a book, merging with an existing line. The requested quantity must
    /// be on hand.
    #[instrument(skip_all, fields(user_id = %user_id, book_id = %book_id))]
    pub async fn add_item(
        &self,
        user_id: &UserId,
        book_id: &BookId,
        quantity: i64,
    ) -> Result<Cart, CommerceError> {
        let _guard = self.locks.acquire(user_id).await;

        let listing = self.listing(book_id).await?;
        listing.ensure_available(quantity)?;

        let mut cart = self
            .carts
            .get_cart(user_id)
            .await?
            .unwrap_or_else(|| Cart::new(user_id.clone()));
        cart.add_item(&listing, quantity)?;
        self.carts.save_cart(&cart).await?;

        debug!(items = cart.items.len(), "Item added to cart");
        Ok(cart)
    }

    /// The user's cart.
    pub async fn get_cart(&self, user_id: &UserId) -> Result<Cart, CommerceError> {
        self.carts
            .get_cart(user_id)
            .await?
            .ok_or_else(|| CommerceError::not_found("Cart", user_id))
    }

    /// Replace a line's quantity. The new quantity must be on hand.
    #[instrument(skip_all, fields(user_id = %user_id, book_id = %book_id))]
    pub async fn update_item(
        &self,
        user_id: &UserId,
        book_id: &BookId,
        quantity: i64,
    ) -> Result<Cart, CommerceError> {
        let _guard = self.locks.acquire(user_id).await;

        let mut cart = self.get_cart(user_id).await?;
        let listing = self.listing(book_id).await?;
        listing.ensure_available(quantity)?;

        cart.set_quantity(book_id, quantity)?;
        self.carts.save_cart(&cart).await?;
        Ok(cart)
    }

    /// Remove a line.
    #[instrument(skip_all, fields(user_id = %user_id, book_id = %book_id))]
    pub async fn remove_item(&self, user_id: &UserId, book_id: &BookId) -> Result<Cart, CommerceError> {
        let _guard = self.locks.acquire(user_id).await;

        let mut cart = self.get_cart(user_id).await?;
        if !cart.remove_item(book_id) {
            return Err(CommerceError::not_found("Cart item", book_id));
        }
        self.carts.save_cart(&cart).await?;
        Ok(cart)
    }

    /// Empty the cart, creating it if the user has none.
    pub async fn clear(&self, user_id: &UserId) -> Result<Cart, CommerceError> {
        let _guard = self.locks.acquire(user_id).await;

        let mut cart = self
            .carts
            .get_cart(user_id)
            .await?
            .unwrap_or_else(|| Cart::new(user_id.clone()));
        cart.clear();
        self.carts.save_cart(&cart).await?;
        Ok(cart)
    }

    /// Select or deselect one line for checkout.
    pub async fn set_checked(
        &self,
        user_id: &UserId,
        book_id: &BookId,
        checked: bool,
    ) -> Result<Cart, CommerceError> {
        let _guard = self.locks.acquire(user_id).await;

        let mut cart = self.get_cart(user_id).await?;
        cart.set_checked(book_id, checked)?;
        self.carts.save_cart(&cart).await?;
        Ok(cart)
    }

    /// Select or deselect every line.
    pub async fn set_all_checked(&self, user_id: &UserId, checked: bool) -> Result<Cart, CommerceError> {
        let _guard = self.locks.acquire(user_id).await;

        let mut cart = self.get_cart(user_id).await?;
        cart.set_all_checked(checked);
        self.carts.save_cart(&cart).await?;
        Ok(cart)
    }

    async fn listing(&self, book_id: &BookId) -> Result<BookListing, CommerceError> {
        self.catalog
            .lookup(book_id)
            .await?
            .ok_or_else(|| CommerceError::not_found("Book", book_id))
    }
}
