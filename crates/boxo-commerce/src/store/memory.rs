//! In-memory backend for every repository.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cart::Cart;
use crate::catalog::{BookListing, InventoryCatalog, StockReservation};
use crate::checkout::{
    AddressProvider, CheckoutSaga, DefaultAddress, Order, OrderFilter, PaymentRecord,
    ShippingRecord,
};
use crate::discount::Discount;
use crate::error::CommerceError;
use crate::ids::{
    BookId, DiscountId, NotificationId, OrderId, PaymentId, SagaId, ShippingId, UserId,
};
use crate::notification::Notification;
use crate::store::{
    CartRepository, DiscountRepository, NotificationRepository, OrderRepository,
    PaymentRepository, SagaRepository, ShippingRepository,
};

/// Everything the store holds. Serializable so a process can persist it
/// between runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MemoryState {
    pub books: BTreeMap<BookId, BookListing>,
    pub addresses: BTreeMap<UserId, DefaultAddress>,
    pub carts: BTreeMap<UserId, Cart>,
    pub discounts: BTreeMap<DiscountId, Discount>,
    pub orders: BTreeMap<OrderId, Order>,
    pub shipping: BTreeMap<ShippingId, ShippingRecord>,
    pub payments: BTreeMap<PaymentId, PaymentRecord>,
    pub notifications: BTreeMap<NotificationId, Notification>,
    pub sagas: BTreeMap<SagaId, CheckoutSaga>,
}

/// Mutex-guarded [`MemoryState`]. Every trait method runs under one lock
/// acquisition, which makes the conditional updates atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: MemoryState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// Load a snapshot written by [`MemoryStore::to_json`].
    pub fn from_json(json: &str) -> Result<Self, CommerceError> {
        Ok(Self::from_state(serde_json::from_str(json)?))
    }

    pub fn to_json(&self) -> Result<String, CommerceError> {
        Ok(serde_json::to_string_pretty(&*self.lock())?)
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> MemoryState {
        self.lock().clone()
    }

    /// Add or replace a book.
    pub fn put_book(&self, book: BookListing) {
        self.lock().books.insert(book.id.clone(), book);
    }

    /// Set a user's default address.
    pub fn put_address(&self, user_id: UserId, address: DefaultAddress) {
        self.lock().addresses.insert(user_id, address);
    }

    /// Add or replace a discount.
    pub fn put_discount(&self, discount: Discount) {
        self.lock().discounts.insert(discount.id.clone(), discount);
    }

    /// Units of a book on hand.
    pub fn stock_of(&self, book_id: &BookId) -> Option<i64> {
        self.lock().books.get(book_id).map(|b| b.available_quantity)
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CartRepository for MemoryStore {
    async fn get_cart(&self, user_id: &UserId) -> Result<Option<Cart>, CommerceError> {
        Ok(self.lock().carts.get(user_id).cloned())
    }

    async fn save_cart(&self, cart: &Cart) -> Result<(), CommerceError> {
        self.lock().carts.insert(cart.user_id.clone(), cart.clone());
        Ok(())
    }
}

#[async_trait]
impl DiscountRepository for MemoryStore {
    async fn find_by_code(&self, code: &str) -> Result<Option<Discount>, CommerceError> {
        Ok(self
            .lock()
            .discounts
            .values()
            .find(|d| d.code == code)
            .cloned())
    }

    async fn get_discount(&self, id: &DiscountId) -> Result<Option<Discount>, CommerceError> {
        Ok(self.lock().discounts.get(id).cloned())
    }

    async fn save_discount(&self, discount: &Discount) -> Result<(), CommerceError> {
        let mut state = self.lock();
        if state
            .discounts
            .values()
            .any(|d| d.code == discount.code && d.id != discount.id)
        {
            return Err(CommerceError::validation(format!(
                "Discount code already in use: {}",
                discount.code
            )));
        }
        state.discounts.insert(discount.id.clone(), discount.clone());
        Ok(())
    }

    async fn list_discounts(&self) -> Result<Vec<Discount>, CommerceError> {
        Ok(self.lock().discounts.values().cloned().collect())
    }

    async fn decrement_if_positive(&self, id: &DiscountId) -> Result<Option<i64>, CommerceError> {
        let mut state = self.lock();
        let discount = state
            .discounts
            .get_mut(id)
            .ok_or_else(|| CommerceError::not_found("Discount", id))?;
        if discount.quantity > 0 {
            discount.quantity -= 1;
            Ok(Some(discount.quantity))
        } else {
            Ok(None)
        }
    }

    async fn increment_quantity(&self, id: &DiscountId) -> Result<(), CommerceError> {
        let mut state = self.lock();
        let discount = state
            .discounts
            .get_mut(id)
            .ok_or_else(|| CommerceError::not_found("Discount", id))?;
        discount.quantity = discount.quantity.saturating_add(1);
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<(), CommerceError> {
        let mut state = self.lock();
        if state.orders.contains_key(&order.id) {
            return Err(CommerceError::Storage(format!("Order {} already exists", order.id)));
        }
        state.orders.insert(order.id.clone(), order.clone());
        Ok(())
    }

    async fn save_order(&self, order: &Order) -> Result<(), CommerceError> {
        self.lock().orders.insert(order.id.clone(), order.clone());
        Ok(())
    }

    async fn get_order(&self, id: &OrderId) -> Result<Option<Order>, CommerceError> {
        Ok(self.lock().orders.get(id).cloned())
    }

    async fn find_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, CommerceError> {
        Ok(self
            .lock()
            .orders
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ShippingRepository for MemoryStore {
    async fn insert_shipping(&self, shipping: &ShippingRecord) -> Result<(), CommerceError> {
        let mut state = self.lock();
        if state
            .shipping
            .values()
            .any(|s| s.tracking_number == shipping.tracking_number)
        {
            return Err(CommerceError::DuplicateTrackingNumber(
                shipping.tracking_number.clone(),
            ));
        }
        state.shipping.insert(shipping.id.clone(), shipping.clone());
        Ok(())
    }

    async fn save_shipping(&self, shipping: &ShippingRecord) -> Result<(), CommerceError> {
        self.lock()
            .shipping
            .insert(shipping.id.clone(), shipping.clone());
        Ok(())
    }

    async fn find_shipping_by_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<ShippingRecord>, CommerceError> {
        Ok(self
            .lock()
            .shipping
            .values()
            .find(|s| &s.order_id == order_id)
            .cloned())
    }
}

#[async_trait]
impl PaymentRepository for MemoryStore {
    async fn insert_payment(&self, payment: &PaymentRecord) -> Result<(), CommerceError> {
        self.lock()
            .payments
            .insert(payment.id.clone(), payment.clone());
        Ok(())
    }

    async fn save_payment(&self, payment: &PaymentRecord) -> Result<(), CommerceError> {
        self.lock()
            .payments
            .insert(payment.id.clone(), payment.clone());
        Ok(())
    }

    async fn find_payment_by_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<PaymentRecord>, CommerceError> {
        Ok(self
            .lock()
            .payments
            .values()
            .find(|p| &p.order_id == order_id)
            .cloned())
    }

    async fn find_pending_payment(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<PaymentRecord>, CommerceError> {
        Ok(self
            .lock()
            .payments
            .values()
            .find(|p| &p.order_id == order_id && p.is_pending())
            .cloned())
    }

    async fn mark_paid_if_unpaid(
        &self,
        id: &PaymentId,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<PaymentRecord>, CommerceError> {
        let mut state = self.lock();
        let payment = state
            .payments
            .get_mut(id)
            .ok_or_else(|| CommerceError::not_found("Payment", id))?;
        if !payment.is_pending() {
            return Ok(None);
        }
        payment.is_paid = true;
        payment.paid_at = Some(paid_at);
        Ok(Some(payment.clone()))
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn insert_notification(&self, notification: &Notification) -> Result<(), CommerceError> {
        self.lock()
            .notifications
            .insert(notification.id.clone(), notification.clone());
        Ok(())
    }

    async fn list_notifications(&self, user_id: &UserId) -> Result<Vec<Notification>, CommerceError> {
        Ok(self
            .lock()
            .notifications
            .values()
            .filter(|n| &n.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn mark_read(
        &self,
        user_id: &UserId,
        id: &NotificationId,
    ) -> Result<Notification, CommerceError> {
        let mut state = self.lock();
        match state.notifications.get_mut(id) {
            Some(n) if &n.user_id == user_id => {
                n.is_read = true;
                Ok(n.clone())
            }
            _ => Err(CommerceError::not_found("Notification", id)),
        }
    }
}

#[async_trait]
impl SagaRepository for MemoryStore {
    async fn save_saga(&self, saga: &CheckoutSaga) -> Result<(), CommerceError> {
        self.lock().sagas.insert(saga.id.clone(), saga.clone());
        Ok(())
    }

    async fn get_saga(&self, id: &SagaId) -> Result<Option<CheckoutSaga>, CommerceError> {
        Ok(self.lock().sagas.get(id).cloned())
    }

    async fn find_saga_by_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<CheckoutSaga>, CommerceError> {
        Ok(self
            .lock()
            .sagas
            .values()
            .find(|s| &s.order_id == order_id)
            .cloned())
    }

    async fn list_sagas(&self) -> Result<Vec<CheckoutSaga>, CommerceError> {
        Ok(self.lock().sagas.values().cloned().collect())
    }
}

#[async_trait]
impl InventoryCatalog for MemoryStore {
    async fn lookup(&self, book_id: &BookId) -> Result<Option<BookListing>, CommerceError> {
        Ok(self.lock().books.get(book_id).cloned())
    }

    async fn reserve_for_order(&self, items: &[StockReservation]) -> Result<(), CommerceError> {
        let mut state = self.lock();

        let mut wanted: HashMap<&BookId, i64> = HashMap::new();
        for item in items {
            if item.quantity < 1 {
                return Err(CommerceError::InvalidQuantity(item.quantity));
            }
            let total = wanted.entry(&item.book_id).or_insert(0);
            *total = total
                .checked_add(item.quantity)
                .ok_or(CommerceError::Overflow)?;
        }

        for (book_id, quantity) in &wanted {
            let book = state
                .books
                .get(*book_id)
                .ok_or_else(|| CommerceError::not_found("Book", book_id))?;
            book.ensure_available(*quantity)?;
        }

        for (book_id, quantity) in wanted {
            if let Some(book) = state.books.get_mut(book_id) {
                book.available_quantity -= quantity;
            }
        }
        Ok(())
    }

    async fn release(&self, items: &[StockReservation]) -> Result<(), CommerceError> {
        let mut state = self.lock();
        for item in items {
            match state.books.get_mut(&item.book_id) {
                Some(book) => {
                    book.available_quantity = book.available_quantity.saturating_add(item.quantity)
                }
                None => tracing::warn!(book_id = %item.book_id, "Releasing stock of unknown book"),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AddressProvider for MemoryStore {
    async fn default_address(
        &self,
        user_id: &UserId,
    ) -> Result<Option<DefaultAddress>, CommerceError> {
        Ok(self.lock().addresses.get(user_id).cloned())
    }
}
