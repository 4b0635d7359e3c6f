#![allow(dead_code)]

use async_trait::async_trait;
use boxo_commerce::prelude::*;
use boxo_commerce::store::{DiscountRepository, PaymentRepository};
use chrono::{DateTime, Duration, Utc};

pub const BOOK_A: &str = "book-a";
pub const BOOK_B: &str = "book-b";

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub orchestrator: OrderOrchestrator,
    pub channel: BroadcastChannel,
    pub user: UserId,
}

impl Fixture {
    pub fn carts(&self) -> CartStore {
        self.orchestrator.carts()
    }

    /// Two units of book A (50,000 each) in the cart, checked.
    pub async fn cart_worth_100k(&self) {
        let carts = self.carts();
        carts
            .add_item(&self.user, &BookId::new(BOOK_A), 2)
            .await
            .unwrap();
        carts.set_all_checked(&self.user, true).await.unwrap();
    }

    pub fn stock(&self, book: &str) -> i64 {
        self.store.stock_of(&BookId::new(book)).unwrap()
    }
}

pub fn book(id: &str, price: i64, stock: i64) -> BookListing {
    BookListing {
        id: BookId::new(id),
        name: format!("Book {}", id),
        price: Money::from_dong(price),
        discounted_price: None,
        available_quantity: stock,
        primary_image_url: format!("https://cdn.boxo.test/{}.jpg", id),
    }
}

pub fn address(distance_km: f64) -> DefaultAddress {
    DefaultAddress {
        name: "Tran Thi B".into(),
        phone: "0912345678".into(),
        description: "45 Nguyen Hue".into(),
        city_name: "Quan 1".into(),
        province_name: "Ho Chi Minh".into(),
        distance_km: Some(distance_km),
    }
}

pub fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.put_book(book(BOOK_A, 50_000, 10));
    store.put_book(book(BOOK_B, 25_000, 5));
    store.put_address(UserId::new("user-1"), address(5.0));
    store
}

pub fn fixture() -> Fixture {
    fixture_with(seeded_store(), |stores| stores)
}

pub fn fixture_with(store: Arc<MemoryStore>, customize: impl FnOnce(Stores) -> Stores) -> Fixture {
    let channel = BroadcastChannel::default();
    let stores = customize(Stores::shared(store.clone()));
    let orchestrator =
        OrderOrchestrator::new(stores, Arc::new(channel.clone()), CheckoutSettings::default());
    Fixture {
        store,
        orchestrator,
        channel,
        user: UserId::new("user-1"),
    }
}

pub fn active_window() -> (DateTime<Utc>, DateTime<Utc>) {
    let now = Utc::now();
    (now - Duration::days(7), now + Duration::days(7))
}

pub fn percentage_discount(code: &str, percent: f64, quantity: i64, minimum: i64) -> Discount {
    let (start, end) = active_window();
    Discount::new(code, code, DiscountKind::Percentage(percent), start, end)
        .with_quantity(quantity)
        .with_minimum(Money::from_dong(minimum))
}

pub fn fixed_discount(code: &str, amount: i64, quantity: i64) -> Discount {
    let (start, end) = active_window();
    Discount::new(code, code, DiscountKind::Fixed(Money::from_dong(amount)), start, end)
        .with_quantity(quantity)
}

/// Payment backend that refuses to create payments.
pub struct FailingPayments {
    pub inner: Arc<MemoryStore>,
}

#[async_trait]
impl PaymentRepository for FailingPayments {
    async fn insert_payment(&self, _: &PaymentRecord) -> Result<(), CommerceError> {
        Err(CommerceError::Storage("payments table unavailable".into()))
    }

    async fn save_payment(&self, payment: &PaymentRecord) -> Result<(), CommerceError> {
        self.inner.save_payment(payment).await
    }

    async fn find_payment_by_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<PaymentRecord>, CommerceError> {
        self.inner.find_payment_by_order(order_id).await
    }

    async fn find_pending_payment(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<PaymentRecord>, CommerceError> {
        self.inner.find_pending_payment(order_id).await
    }

    async fn mark_paid_if_unpaid(
        &self,
        id: &PaymentId,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<PaymentRecord>, CommerceError> {
        self.inner.mark_paid_if_unpaid(id, paid_at).await
    }
}

/// Discount backend whose codes run out between resolution and redemption.
pub struct RedemptionRace {
    pub inner: Arc<MemoryStore>,
}

#[async_trait]
impl DiscountRepository for RedemptionRace {
    async fn find_by_code(&self, code: &str) -> Result<Option<Discount>, CommerceError> {
        self.inner.find_by_code(code).await
    }

    async fn get_discount(&self, id: &DiscountId) -> Result<Option<Discount>, CommerceError> {
        self.inner.get_discount(id).await
    }

    async fn save_discount(&self, discount: &Discount) -> Result<(), CommerceError> {
        self.inner.save_discount(discount).await
    }

    async fn list_discounts(&self) -> Result<Vec<Discount>, CommerceError> {
        self.inner.list_discounts().await
    }

    async fn decrement_if_positive(&self, _: &DiscountId) -> Result<Option<i64>, CommerceError> {
        Ok(None)
    }

    async fn increment_quantity(&self, id: &DiscountId) -> Result<(), CommerceError> {
        self.inner.increment_quantity(id).await
    }
}
