//! Persistence seams.
//!
//! One trait per aggregate. Conditional updates (`decrement_if_positive`,
//! `mark_paid_if_unpaid`, unique tracking-number inserts, all-or-nothing stock
//! reservation) must be atomic in every implementation; the orchestrator
//! relies on them instead of read-modify-write.

mod memory;

pub use memory::{MemoryState, MemoryStore};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::cart::Cart;
use crate::catalog::InventoryCatalog;
use crate::checkout::{
    AddressProvider, CheckoutSaga, Order, OrderFilter, PaymentRecord, ShippingRecord,
};
use crate::discount::Discount;
use crate::error::CommerceError;
use crate::ids::{DiscountId, NotificationId, OrderId, PaymentId, SagaId, UserId};
use crate::notification::Notification;

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn get_cart(&self, user_id: &UserId) -> Result<Option<Cart>, CommerceError>;

    /// Insert or replace.
    async fn save_cart(&self, cart: &Cart) -> Result<(), CommerceError>;
}

#[async_trait]
pub trait DiscountRepository: Send + Sync {
    async fn find_by_code(&self, code: &str) -> Result<Option<Discount>, CommerceError>;

    async fn get_discount(&self, id: &DiscountId) -> Result<Option<Discount>, CommerceError>;

    async fn save_discount(&self, discount: &Discount) -> Result<(), CommerceError>;

    async fn list_discounts(&self) -> Result<Vec<Discount>, CommerceError>;

    /// Decrement the remaining quantity if it is above zero. Returns the new
    /// quantity, or `None` if it was already zero.
    async fn decrement_if_positive(&self, id: &DiscountId) -> Result<Option<i64>, CommerceError>;

    async fn increment_quantity(&self, id: &DiscountId) -> Result<(), CommerceError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert_order(&self, order: &Order) -> Result<(), CommerceError>;

    async fn save_order(&self, order: &Order) -> Result<(), CommerceError>;

    async fn get_order(&self, id: &OrderId) -> Result<Option<Order>, CommerceError>;

    /// Every order matching the filter, unsorted.
    async fn find_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, CommerceError>;
}

#[async_trait]
pub trait ShippingRepository: Send + Sync {
    /// Insert a new record. Fails with
    /// [`CommerceError::DuplicateTrackingNumber`] if the tracking number is taken.
    async fn insert_shipping(&self, shipping: &ShippingRecord) -> Result<(), CommerceError>;

    async fn save_shipping(&self, shipping: &ShippingRecord) -> Result<(), CommerceError>;

    async fn find_shipping_by_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<ShippingRecord>, CommerceError>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn insert_payment(&self, payment: &PaymentRecord) -> Result<(), CommerceError>;

    async fn save_payment(&self, payment: &PaymentRecord) -> Result<(), CommerceError>;

    async fn find_payment_by_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<PaymentRecord>, CommerceError>;

    /// Unpaid, non-voided payment of an order.
    async fn find_pending_payment(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<PaymentRecord>, CommerceError>;

    /// Flip `is_paid` from false to true. Returns `None` if the payment was
    /// already paid or voided.
    async fn mark_paid_if_unpaid(
        &self,
        id: &PaymentId,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<PaymentRecord>, CommerceError>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert_notification(&self, notification: &Notification) -> Result<(), CommerceError>;

    async fn list_notifications(&self, user_id: &UserId) -> Result<Vec<Notification>, CommerceError>;

    /// Set the read flag. Not found if the notification belongs to another user.
    async fn mark_read(
        &self,
        user_id: &UserId,
        id: &NotificationId,
    ) -> Result<Notification, CommerceError>;
}

#[async_trait]
pub trait SagaRepository: Send + Sync {
    async fn save_saga(&self, saga: &CheckoutSaga) -> Result<(), CommerceError>;

    async fn get_saga(&self, id: &SagaId) -> Result<Option<CheckoutSaga>, CommerceError>;

    async fn find_saga_by_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<CheckoutSaga>, CommerceError>;

    async fn list_sagas(&self) -> Result<Vec<CheckoutSaga>, CommerceError>;
}

/// Every repository the orchestrator needs.
#[derive(Clone)]
pub struct Stores {
    pub carts: Arc<dyn CartRepository>,
    pub discounts: Arc<dyn DiscountRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub shipping: Arc<dyn ShippingRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub sagas: Arc<dyn SagaRepository>,
    pub catalog: Arc<dyn InventoryCatalog>,
    pub addresses: Arc<dyn AddressProvider>,
}

impl Stores {
    /// Use one backend for everything.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: CartRepository
            + DiscountRepository
            + OrderRepository
            + ShippingRepository
            + PaymentRepository
            + NotificationRepository
            + SagaRepository
            + InventoryCatalog
            + AddressProvider
            + 'static,
    {
        Self {
            carts: store.clone(),
            discounts: store.clone(),
            orders: store.clone(),
            shipping: store.clone(),
            payments: store.clone(),
            notifications: store.clone(),
            sagas: store.clone(),
            catalog: store.clone(),
            addresses: store,
        }
    }
}
