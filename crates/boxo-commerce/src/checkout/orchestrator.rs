//! Order orchestration: checkout, payment capture, status changes and
//! reconciliation of interrupted checkouts.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::cart::{Cart, CartItem, CartStore};
use crate::catalog::StockReservation;
use crate::checkout::{
    generate_tracking_number, CheckoutSaga, CheckoutStep, DefaultAddress, Order, OrderDetails,
    OrderFilter, OrderLineItem, OrderStatus, OrderSummary, Page, PageRequest, PaymentRecord,
    PaymentType, SagaState, ShippingRecord, ShippingStatus, ShippingUpdate,
};
use crate::config::CheckoutSettings;
use crate::discount::{AppliedDiscount, Discount, DiscountLedger};
use crate::error::CommerceError;
use crate::ids::{NotificationId, OrderId, UserId};
use crate::locks::UserLocks;
use crate::money::Money;
use crate::notification::{Notification, NotificationChannel, NotificationDispatcher};
use crate::store::Stores;

/// What the customer submits at checkout.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PaymentRequest {
    pub payment_type: PaymentType,
    /// Optional discount code. Blank is treated as absent.
    pub discount_code: Option<String>,
}

impl PaymentRequest {
    pub fn new(payment_type: PaymentType) -> Self {
        Self {
            payment_type,
            discount_code: None,
        }
    }

    pub fn with_discount_code(mut self, code: impl Into<String>) -> Self {
        self.discount_code = Some(code.into());
        self
    }

    fn code(&self) -> Option<&str> {
        self.discount_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

/// Outcome of a reconciliation pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReconcileReport {
    /// Sagas that needed attention.
    pub examined: usize,
    /// Abandoned sagas whose mutations had all landed; closed as completed.
    pub completed: Vec<OrderId>,
    /// Sagas fully unwound.
    pub compensated: Vec<OrderId>,
    /// Sagas whose compensation failed; retried on the next pass.
    pub failed: Vec<(OrderId, String)>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Everything a checkout needs, computed before any write.
struct Quote {
    items: Vec<CartItem>,
    subtotal: Money,
    discount: Option<AppliedDiscount>,
    address: DefaultAddress,
    shipping_fee: Money,
    total_payment: Money,
    reservations: Vec<StockReservation>,
}

type StepResult<T> = Result<T, (CheckoutStep, CommerceError)>;

/// Turns carts into orders and drives orders through their lifecycle.
#[derive(Clone)]
pub struct OrderOrchestrator {
    stores: Stores,
    ledger: DiscountLedger,
    notifier: NotificationDispatcher,
    settings: CheckoutSettings,
    locks: UserLocks,
}

impl OrderOrchestrator {
    pub fn new(
        stores: Stores,
        channel: Arc<dyn NotificationChannel>,
        settings: CheckoutSettings,
    ) -> Self {
        let ledger = DiscountLedger::new(Arc::clone(&stores.discounts));
        let notifier =
            NotificationDispatcher::new(Arc::clone(&stores.notifications), channel, settings.locale);
        Self {
            stores,
            ledger,
            notifier,
            settings,
            locks: UserLocks::new(),
        }
    }

    /// Cart service sharing this orchestrator's per-user locks.
    pub fn carts(&self) -> CartStore {
        CartStore::new(
            Arc::clone(&self.stores.carts),
            Arc::clone(&self.stores.catalog),
            self.locks.clone(),
        )
    }

    pub fn discounts(&self) -> &DiscountLedger {
        &self.ledger
    }

    pub fn settings(&self) -> &CheckoutSettings {
        &self.settings
    }

    /// Place an order from the checked items of the user's cart.
    ///
    /// Pricing, discount, address and stock are checked before anything is
    /// written; those failures leave no trace. After that the order, shipping
    /// and payment records are created, inventory and cart are updated, and
    /// the discount is redeemed, each step checkpointed in a
    /// [`CheckoutSaga`]. A failure there returns
    /// [`CommerceError::CheckoutInterrupted`] and leaves the saga for
    /// [`OrderOrchestrator::reconcile`].
    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn process_payment(
        &self,
        user_id: &UserId,
        request: PaymentRequest,
    ) -> Result<Order, CommerceError> {
        let _guard = self.locks.acquire(user_id).await;

        let (cart, quote) = self.quote(user_id, &request).await?;

        let now = Utc::now();
        let order = Order {
            id: OrderId::generate(),
            user_id: user_id.clone(),
            line_items: quote.items.iter().map(OrderLineItem::from).collect(),
            status: OrderStatus::Pending,
            shipping_id: None,
            payment_id: None,
            discount_id: quote.discount.as_ref().map(|d| d.discount_id.clone()),
            subtotal: quote.subtotal,
            discount_amount: quote.discount.as_ref().map_or(Money::ZERO, |d| d.amount),
            shipping_fee: quote.shipping_fee,
            total_payment: quote.total_payment,
            created_at: now,
            updated_at: now,
        };

        let mut saga = CheckoutSaga::begin(user_id.clone(), order.id.clone());
        saga.discount_id = order.discount_id.clone();
        saga.reservations = quote.reservations.clone();
        self.stores.sagas.save_saga(&saga).await?;

        let order = match self
            .apply_checkout(&mut saga, order, cart, &quote, request.payment_type)
            .await
        {
            Ok(order) => order,
            Err((step, e)) => {
                error!(
                    order_id = %saga.order_id,
                    step = step.as_str(),
                    error = %e,
                    "Checkout interrupted, leaving order for reconciliation"
                );
                saga.fail(step, &e);
                if let Err(save_err) = self.stores.sagas.save_saga(&saga).await {
                    error!(order_id = %saga.order_id, error = %save_err, "Failed to record checkout failure");
                }
                return Err(CommerceError::CheckoutInterrupted {
                    order_id: saga.order_id.to_string(),
                    step,
                    source: Box::new(e),
                });
            }
        };

        match self.notifier.order_placed(&order).await {
            Ok(_) => saga.record(CheckoutStep::CustomerNotified),
            Err(e) => warn!(order_id = %order.id, error = %e, "Order placed notification failed"),
        }

        saga.complete();
        if let Err(e) = self.stores.sagas.save_saga(&saga).await {
            error!(order_id = %order.id, error = %e, "Failed to close checkout saga");
        }

        info!(
            order_id = %order.id,
            items = order.line_items.len(),
            total = %order.total_payment,
            "Order placed"
        );
        Ok(order)
    }

    /// Read-only part of checkout.
    async fn quote(
        &self,
        user_id: &UserId,
        request: &PaymentRequest,
    ) -> Result<(Cart, Quote), CommerceError> {
        let cart = self
            .stores
            .carts
            .get_cart(user_id)
            .await?
            .ok_or_else(|| CommerceError::validation("Cart is empty"))?;

        let items: Vec<CartItem> = cart.checked_items().into_iter().cloned().collect();
        if items.is_empty() {
            return Err(CommerceError::validation("Cart is empty"));
        }
        let subtotal = cart.checked_subtotal()?;

        let discount = match request.code() {
            Some(code) => self
                .ledger
                .resolve(code, subtotal)
                .await?
                .map(|d: Discount| self.ledger.apply(&d, subtotal)),
            None => None,
        };
        let adjusted_subtotal = discount.as_ref().map_or(subtotal, |d| d.adjusted_subtotal);

        let address = self
            .stores
            .addresses
            .default_address(user_id)
            .await?
            .ok_or_else(|| CommerceError::validation("No default address found"))?;
        let shipping_fee = self.settings.shipping.cost(address.distance_km);

        let total_payment = adjusted_subtotal
            .checked_add(shipping_fee)
            .ok_or(CommerceError::Overflow)?;

        let reservations = reservations_for(&items);
        for reservation in &reservations {
            self.stores
                .catalog
                .lookup(&reservation.book_id)
                .await?
                .ok_or_else(|| CommerceError::not_found("Book", &reservation.book_id))?
                .ensure_available(reservation.quantity)?;
        }

        debug!(
            subtotal = %subtotal,
            shipping_fee = %shipping_fee,
            total = %total_payment,
            discount = discount.as_ref().map(|d| d.code.as_str()),
            "Checkout quoted"
        );

        Ok((
            cart,
            Quote {
                items,
                subtotal,
                discount,
                address,
                shipping_fee,
                total_payment,
                reservations,
            },
        ))
    }

    /// Mutating part of checkout. Inventory is reserved only after the order,
    /// shipping and payment records exist.
    async fn apply_checkout(
        &self,
        saga: &mut CheckoutSaga,
        mut order: Order,
        mut cart: Cart,
        quote: &Quote,
        payment_type: PaymentType,
    ) -> StepResult<Order> {
        use CheckoutStep::*;

        self.stores
            .orders
            .insert_order(&order)
            .await
            .map_err(|e| (OrderCreated, e))?;
        self.checkpoint(saga, OrderCreated).await?;

        let shipping = self
            .create_shipping(&order, &quote.address, quote.shipping_fee)
            .await
            .map_err(|e| (ShippingCreated, e))?;
        saga.shipping_id = Some(shipping.id.clone());
        self.checkpoint(saga, ShippingCreated).await?;

        let payment = PaymentRecord::new(
            order.id.clone(),
            order.total_payment,
            payment_type,
            order.discount_id.clone(),
        );
        self.stores
            .payments
            .insert_payment(&payment)
            .await
            .map_err(|e| (PaymentCreated, e))?;
        saga.payment_id = Some(payment.id.clone());
        self.checkpoint(saga, PaymentCreated).await?;

        order.link(shipping.id.clone(), payment.id.clone());
        self.stores
            .orders
            .save_order(&order)
            .await
            .map_err(|e| (ReferencesLinked, e))?;
        self.checkpoint(saga, ReferencesLinked).await?;

        self.stores
            .catalog
            .reserve_for_order(&quote.reservations)
            .await
            .map_err(|e| (InventoryReserved, e))?;
        self.checkpoint(saga, InventoryReserved).await?;

        let removed = cart.take_checked();
        self.stores
            .carts
            .save_cart(&cart)
            .await
            .map_err(|e| (CartItemsRemoved, e))?;
        saga.removed_items = removed;
        self.checkpoint(saga, CartItemsRemoved).await?;

        if let Some(discount_id) = &order.discount_id {
            self.ledger
                .redeem(discount_id)
                .await
                .map_err(|e| (DiscountRedeemed, e))?;
            self.checkpoint(saga, DiscountRedeemed).await?;
        }

        debug!(
            order_id = %order.id,
            tracking_number = %shipping.tracking_number,
            "Checkout steps applied"
        );
        Ok(order)
    }

    async fn checkpoint(&self, saga: &mut CheckoutSaga, step: CheckoutStep) -> StepResult<()> {
        saga.record(step);
        self.stores
            .sagas
            .save_saga(saga)
            .await
            .map_err(|e| (step, e))
    }

    /// Insert a shipping record, regenerating the tracking number on collision.
    async fn create_shipping(
        &self,
        order: &Order,
        address: &DefaultAddress,
        fee: Money,
    ) -> Result<ShippingRecord, CommerceError> {
        let attempts = self.settings.tracking_attempts.max(1);
        let mut last_err = None;

        for attempt in 1..=attempts {
            let record = ShippingRecord::new(
                order.id.clone(),
                generate_tracking_number(self.settings.tracking_random_len),
                address.snapshot(),
                fee,
            );
            match self.stores.shipping.insert_shipping(&record).await {
                Ok(()) => return Ok(record),
                Err(CommerceError::DuplicateTrackingNumber(tn)) => {
                    warn!(attempt, tracking_number = %tn, "Tracking number collision");
                    last_err = Some(CommerceError::DuplicateTrackingNumber(tn));
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| CommerceError::Storage("No tracking number attempts".into())))
    }

    /// Capture payment for a pending order.
    ///
    /// The order must belong to the user and be able to move to Paid, and its
    /// shipping record must be able to move to Shipped; all three are checked
    /// before the payment is flipped. The flip is a compare-and-set, so of two
    /// concurrent captures exactly one succeeds.
    #[instrument(skip_all, fields(user_id = %user_id, order_id = %order_id))]
    pub async fn checkout_order(
        &self,
        user_id: &UserId,
        order_id: &OrderId,
    ) -> Result<Order, CommerceError> {
        let _guard = self.locks.acquire(user_id).await;

        let mut order = self
            .stores
            .orders
            .get_order(order_id)
            .await?
            .filter(|o| o.is_owned_by(user_id))
            .ok_or_else(|| CommerceError::not_found("Order", order_id))?;

        if let Some(saga) = self.stores.sagas.find_saga_by_order(order_id).await? {
            if !saga.is_completed() {
                return Err(CommerceError::validation("Order checkout did not complete"));
            }
        }

        let payment = self
            .stores
            .payments
            .find_pending_payment(order_id)
            .await?
            .ok_or_else(|| CommerceError::validation("No payment found"))?;

        order.status.transition(OrderStatus::Paid)?;
        let mut shipping = self.shipping_for(order_id).await?;
        shipping.status.transition(ShippingStatus::Shipped)?;

        let paid_at = Utc::now();
        if self
            .stores
            .payments
            .mark_paid_if_unpaid(&payment.id, paid_at)
            .await?
            .is_none()
        {
            return Err(CommerceError::validation("No payment found"));
        }

        order.set_status(OrderStatus::Paid)?;
        shipping.set_status(ShippingStatus::Shipped)?;
        self.stores.orders.save_order(&order).await?;
        self.stores.shipping.save_shipping(&shipping).await?;

        info!(payment_id = %payment.id, "Payment captured");
        Ok(order)
    }

    /// Move an order to a new status and notify the customer.
    ///
    /// Only the order changes; the shipping record is updated separately
    /// through [`OrderOrchestrator::update_shipping`]. The notification is
    /// best-effort.
    #[instrument(skip_all, fields(order_id = %order_id, status = %status))]
    pub async fn update_status(
        &self,
        order_id: &OrderId,
        status: OrderStatus,
    ) -> Result<Order, CommerceError> {
        let mut order = self.order(order_id).await?;
        let _guard = self.locks.acquire(&order.user_id).await;

        // Re-read under the owner's lock.
        order = self.order(order_id).await?;
        let from = order.status;
        order.set_status(status)?;
        self.stores.orders.save_order(&order).await?;

        if let Err(e) = self.notifier.order_status_changed(&order).await {
            warn!(error = %e, "Status notification failed");
        }

        info!(from = %from, "Order status updated");
        Ok(order)
    }

    /// An order with its shipping and payment records.
    pub async fn get_order(&self, order_id: &OrderId) -> Result<OrderDetails, CommerceError> {
        let order = self.order(order_id).await?;
        let shipping = self.stores.shipping.find_shipping_by_order(order_id).await?;
        let payment = self.stores.payments.find_payment_by_order(order_id).await?;
        Ok(OrderDetails {
            order,
            shipping,
            payment,
        })
    }

    /// One page of orders matching the filter.
    pub async fn list_orders(
        &self,
        filter: &OrderFilter,
        page: PageRequest,
    ) -> Result<Page<Order>, CommerceError> {
        let mut orders = self.stores.orders.find_orders(filter).await?;
        page.sort.sort(&mut orders);
        Ok(Page::slice(orders, page))
    }

    /// One page of admin overview rows.
    pub async fn list_order_summaries(
        &self,
        filter: &OrderFilter,
        page: PageRequest,
    ) -> Result<Page<OrderSummary>, CommerceError> {
        let orders = self.list_orders(filter, page).await?;
        let mut summaries = Vec::with_capacity(orders.len());
        for order in &orders.items {
            let payment = self.stores.payments.find_payment_by_order(&order.id).await?;
            summaries.push(OrderSummary::new(order, payment.as_ref()));
        }
        Ok(Page {
            items: summaries,
            pagination: orders.pagination,
        })
    }

    /// The shipping record of an order.
    pub async fn get_shipping(&self, order_id: &OrderId) -> Result<ShippingRecord, CommerceError> {
        self.shipping_for(order_id).await
    }

    /// Apply an update command to an order's shipping record.
    #[instrument(skip_all, fields(order_id = %order_id))]
    pub async fn update_shipping(
        &self,
        order_id: &OrderId,
        update: ShippingUpdate,
    ) -> Result<ShippingRecord, CommerceError> {
        let mut shipping = self.shipping_for(order_id).await?;
        shipping.apply(&update)?;
        self.stores.shipping.save_shipping(&shipping).await?;
        info!(status = %shipping.status, "Shipping updated");
        Ok(shipping)
    }

    /// A user's notifications, newest first.
    pub async fn notifications_for(&self, user_id: &UserId) -> Result<Vec<Notification>, CommerceError> {
        self.notifier.list_for_user(user_id).await
    }

    pub async fn mark_notification_read(
        &self,
        user_id: &UserId,
        notification_id: &NotificationId,
    ) -> Result<Notification, CommerceError> {
        self.notifier.mark_read(user_id, notification_id).await
    }

    /// Active discounts listed on the storefront.
    pub async fn public_discounts(&self) -> Result<Vec<Discount>, CommerceError> {
        self.ledger.public_discounts().await
    }

    /// Unwind interrupted checkouts.
    ///
    /// Failed sagas and sagas abandoned in progress are compensated in reverse
    /// step order: discount redemption restored, removed cart items put back,
    /// reserved stock released, payment voided, shipping and order canceled.
    /// Each undone step is recorded, so a pass that stops halfway resumes
    /// where it left off.
    #[instrument(skip_all)]
    pub async fn reconcile(&self) -> Result<ReconcileReport, CommerceError> {
        let now = Utc::now();
        let stale_after = self.settings.saga_stale_after();
        let mut report = ReconcileReport::default();

        let candidates: Vec<CheckoutSaga> = self
            .stores
            .sagas
            .list_sagas()
            .await?
            .into_iter()
            .filter(|s| s.needs_reconciliation(now, stale_after))
            .collect();

        for candidate in candidates {
            let _guard = self.locks.acquire(&candidate.user_id).await;

            let Some(mut saga) = self.stores.sagas.get_saga(&candidate.id).await? else {
                continue;
            };
            if !saga.needs_reconciliation(Utc::now(), stale_after) {
                continue;
            }
            report.examined += 1;

            if saga.state == SagaState::InProgress && saga.is_fully_applied() {
                if !saga.has_completed(CheckoutStep::CustomerNotified) {
                    self.notify_placed_late(&mut saga).await;
                }
                saga.complete();
                self.stores.sagas.save_saga(&saga).await?;
                info!(order_id = %saga.order_id, "Closed abandoned but complete checkout");
                report.completed.push(saga.order_id.clone());
                continue;
            }

            match self.compensate(&mut saga).await {
                Ok(()) => {
                    info!(order_id = %saga.order_id, "Checkout compensated");
                    report.compensated.push(saga.order_id.clone());
                }
                Err(e) => {
                    error!(order_id = %saga.order_id, error = %e, "Compensation failed");
                    report.failed.push((saga.order_id.clone(), e.to_string()));
                }
            }
        }

        Ok(report)
    }

    /// Send the "order placed" notification a dead checkout never got to.
    /// Best-effort, like the notification in `process_payment`.
    async fn notify_placed_late(&self, saga: &mut CheckoutSaga) {
        let order = match self.order(&saga.order_id).await {
            Ok(order) => order,
            Err(e) => {
                warn!(order_id = %saga.order_id, error = %e, "Cannot load order to notify");
                return;
            }
        };
        match self.notifier.order_placed(&order).await {
            Ok(_) => saga.record(CheckoutStep::CustomerNotified),
            Err(e) => warn!(order_id = %order.id, error = %e, "Order placed notification failed"),
        }
    }

    async fn compensate(&self, saga: &mut CheckoutSaga) -> Result<(), CommerceError> {
        for step in saga.pending_compensations() {
            self.undo(saga, step).await?;
            saga.mark_compensated(step);
            self.stores.sagas.save_saga(saga).await?;
            debug!(order_id = %saga.order_id, step = step.as_str(), "Step undone");
        }
        saga.finish_compensation();
        self.stores.sagas.save_saga(saga).await
    }

    async fn undo(&self, saga: &CheckoutSaga, step: CheckoutStep) -> Result<(), CommerceError> {
        match step {
            CheckoutStep::DiscountRedeemed => {
                if let Some(discount_id) = &saga.discount_id {
                    self.ledger.restore(discount_id).await?;
                }
            }
            CheckoutStep::CartItemsRemoved => {
                let mut cart = self
                    .stores
                    .carts
                    .get_cart(&saga.user_id)
                    .await?
                    .unwrap_or_else(|| Cart::new(saga.user_id.clone()));
                cart.restore(saga.removed_items.clone())?;
                self.stores.carts.save_cart(&cart).await?;
            }
            CheckoutStep::InventoryReserved => {
                self.stores.catalog.release(&saga.reservations).await?;
            }
            CheckoutStep::PaymentCreated => {
                if let Some(mut payment) = self
                    .stores
                    .payments
                    .find_payment_by_order(&saga.order_id)
                    .await?
                {
                    payment.voided = true;
                    self.stores.payments.save_payment(&payment).await?;
                }
            }
            CheckoutStep::ShippingCreated => {
                if let Some(mut shipping) = self
                    .stores
                    .shipping
                    .find_shipping_by_order(&saga.order_id)
                    .await?
                {
                    if !shipping.status.is_terminal() {
                        shipping.set_status(ShippingStatus::Canceled)?;
                        self.stores.shipping.save_shipping(&shipping).await?;
                    }
                }
            }
            CheckoutStep::OrderCreated => {
                if let Some(mut order) = self.stores.orders.get_order(&saga.order_id).await? {
                    if !order.status.is_terminal() {
                        order.set_status(OrderStatus::Canceled)?;
                        self.stores.orders.save_order(&order).await?;
                    }
                }
            }
            CheckoutStep::ReferencesLinked | CheckoutStep::CustomerNotified => {}
        }
        Ok(())
    }

    async fn order(&self, order_id: &OrderId) -> Result<Order, CommerceError> {
        self.stores
            .orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| CommerceError::not_found("Order", order_id))
    }

    async fn shipping_for(&self, order_id: &OrderId) -> Result<ShippingRecord, CommerceError> {
        self.stores
            .shipping
            .find_shipping_by_order(order_id)
            .await?
            .ok_or_else(|| CommerceError::not_found("Shipping", order_id))
    }
}

/// One reservation per book, quantities summed.
fn reservations_for(items: &[CartItem]) -> Vec<StockReservation> {
    let mut by_book: BTreeMap<_, i64> = BTreeMap::new();
    for item in items {
        *by_book.entry(item.book_id.clone()).or_insert(0) += item.quantity;
    }
    by_book
        .into_iter()
        .map(|(book_id, quantity)| StockReservation::new(book_id, quantity))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::BookListing;
    use crate::ids::BookId;

    #[test]
    fn test_blank_discount_code_is_ignored() {
        let request = PaymentRequest::new(PaymentType::Card).with_discount_code("   ");
        assert_eq!(request.code(), None);
        let request = PaymentRequest::new(PaymentType::Card).with_discount_code(" SAVE10 ");
        assert_eq!(request.code(), Some("SAVE10"));
    }

    #[test]
    fn test_reservations_are_grouped_by_book() {
        let listing = BookListing {
            id: BookId::new("b-1"),
            name: "B".into(),
            price: Money::from_dong(1),
            discounted_price: None,
            available_quantity: 10,
            primary_image_url: String::new(),
        };
        let a = CartItem::from_listing(&listing, 2).unwrap();
        let b = CartItem::from_listing(&listing, 3).unwrap();

        let reservations = reservations_for(&[a, b]);
        assert_eq!(reservations, vec![StockReservation::new(BookId::new("b-1"), 5)]);
    }
}
