//! User notifications: persisted inbox entries plus a best-effort live push.
//!
//! The inbox row is written first. The push runs on a spawned task, so a slow
//! or failing channel never blocks or rolls back the order mutation that
//! triggered it.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::checkout::{Order, OrderStatus};
use crate::error::CommerceError;
use crate::ids::{NotificationId, OrderId, UserId};
use crate::store::NotificationRepository;

/// Notification category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    #[default]
    Order,
    System,
}

/// An inbox entry. Append-only apart from the read flag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub content: String,
    pub order_id: Option<OrderId>,
    pub order_status: Option<OrderStatus>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Create an unread order notification.
    pub fn for_order(
        order: &Order,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: NotificationId::generate(),
            user_id: order.user_id.clone(),
            kind: NotificationKind::Order,
            title: title.into(),
            content: content.into(),
            order_id: Some(order.id.clone()),
            order_status: Some(order.status),
            is_read: false,
            created_at: Utc::now(),
        }
    }

    pub fn payload(&self) -> NotificationPayload {
        NotificationPayload {
            notification_id: self.id.clone(),
            title: self.title.clone(),
            content: self.content.clone(),
            order_id: self.order_id.clone(),
            order_status: self.order_status,
        }
    }
}

/// What the live channel delivers to a connected client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationPayload {
    pub notification_id: NotificationId,
    pub title: String,
    pub content: String,
    pub order_id: Option<OrderId>,
    pub order_status: Option<OrderStatus>,
}

/// Push transport to a user's live session.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Deliver a payload. A user with no live session is not an error.
    async fn emit(&self, user_id: &UserId, payload: NotificationPayload)
        -> Result<(), CommerceError>;
}

/// An event on the [`BroadcastChannel`].
#[derive(Debug, Clone, PartialEq)]
pub struct LiveEvent {
    pub user_id: UserId,
    pub payload: NotificationPayload,
}

/// In-process fan-out channel. Each subscriber sees every user's events and
/// filters for the ones it serves.
#[derive(Debug, Clone)]
pub struct BroadcastChannel {
    sender: broadcast::Sender<LiveEvent>,
}

impl BroadcastChannel {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastChannel {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl NotificationChannel for BroadcastChannel {
    async fn emit(
        &self,
        user_id: &UserId,
        payload: NotificationPayload,
    ) -> Result<(), CommerceError> {
        let event = LiveEvent {
            user_id: user_id.clone(),
            payload,
        };
        if self.sender.send(event).is_err() {
            debug!(user_id = %user_id, "No live subscribers");
        }
        Ok(())
    }
}

/// Channel that only writes the event to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingChannel;

#[async_trait]
impl NotificationChannel for TracingChannel {
    async fn emit(
        &self,
        user_id: &UserId,
        payload: NotificationPayload,
    ) -> Result<(), CommerceError> {
        info!(
            user_id = %user_id,
            notification_id = %payload.notification_id,
            title = %payload.title,
            "Notification"
        );
        Ok(())
    }
}

/// Language of notification texts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    /// Vietnamese.
    #[default]
    Vi,
    /// English.
    En,
}

impl Locale {
    pub fn placed_title(&self) -> &'static str {
        match self {
            Locale::Vi => "Đặt hàng thành công",
            Locale::En => "Order placed",
        }
    }

    pub fn placed_content(&self, order_id: &OrderId) -> String {
        match self {
            Locale::Vi => format!("Đơn hàng {} của bạn đã được đặt thành công", order_id),
            Locale::En => format!("Your order {} has been placed", order_id),
        }
    }

    pub fn status_title(&self, status: OrderStatus) -> &'static str {
        match (self, status) {
            (Locale::Vi, OrderStatus::Paid) => "Đơn hàng đã được thanh toán",
            (Locale::Vi, OrderStatus::Shipped) => "Đơn hàng đã được giao cho đơn vị vận chuyển",
            (Locale::Vi, OrderStatus::Delivered) => "Đơn hàng đã được giao thành công",
            (Locale::Vi, OrderStatus::Canceled) => "Đơn hàng đã bị hủy",
            (Locale::Vi, _) => "Đơn hàng đã được cập nhật",
            (Locale::En, OrderStatus::Paid) => "Order paid",
            (Locale::En, OrderStatus::Shipped) => "Order handed to the carrier",
            (Locale::En, OrderStatus::Delivered) => "Order delivered",
            (Locale::En, OrderStatus::Canceled) => "Order canceled",
            (Locale::En, _) => "Order updated",
        }
    }

    pub fn status_content(&self, order_id: &OrderId, status: OrderStatus) -> String {
        match self {
            Locale::Vi => format!(
                "Đơn hàng {} của bạn đã được cập nhật sang trạng thái {}",
                order_id, status
            ),
            Locale::En => format!("Your order {} is now {}", order_id, status),
        }
    }
}

/// Persists notifications and pushes them to the live channel.
#[derive(Clone)]
pub struct NotificationDispatcher {
    repo: Arc<dyn NotificationRepository>,
    channel: Arc<dyn NotificationChannel>,
    locale: Locale,
}

impl NotificationDispatcher {
    pub fn new(
        repo: Arc<dyn NotificationRepository>,
        channel: Arc<dyn NotificationChannel>,
        locale: Locale,
    ) -> Self {
        Self {
            repo,
            channel,
            locale,
        }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Tell the customer their order was placed.
    pub async fn order_placed(&self, order: &Order) -> Result<Notification, CommerceError> {
        let notification = Notification::for_order(
            order,
            self.locale.placed_title(),
            self.locale.placed_content(&order.id),
        );
        self.dispatch(notification).await
    }

    /// Tell the customer their order moved to a new status.
    pub async fn order_status_changed(&self, order: &Order) -> Result<Notification, CommerceError> {
        let notification = Notification::for_order(
            order,
            self.locale.status_title(order.status),
            self.locale.status_content(&order.id, order.status),
        );
        self.dispatch(notification).await
    }

    /// Persist the notification, then push it without waiting for delivery.
    ///
    /// A persistence failure is returned. A push failure is only logged.
    pub async fn dispatch(&self, notification: Notification) -> Result<Notification, CommerceError> {
        self.repo.insert_notification(&notification).await?;

        let channel = Arc::clone(&self.channel);
        let user_id = notification.user_id.clone();
        let payload = notification.payload();
        tokio::spawn(async move {
            if let Err(e) = channel.emit(&user_id, payload).await {
                warn!(user_id = %user_id, error = %e, "Live notification push failed");
            }
        });

        Ok(notification)
    }

    /// A user's notifications, newest first.
    pub async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Notification>, CommerceError> {
        let mut notifications = self.repo.list_notifications(user_id).await?;
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(notifications)
    }

    /// Flag a notification as read. Fails with not-found for another user's notification.
    pub async fn mark_read(
        &self,
        user_id: &UserId,
        notification_id: &NotificationId,
    ) -> Result<Notification, CommerceError> {
        self.repo.mark_read(user_id, notification_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::store::MemoryStore;
    use std::time::Duration;

    struct FailingChannel;

    #[async_trait]
    impl NotificationChannel for FailingChannel {
        async fn emit(&self, _: &UserId, _: NotificationPayload) -> Result<(), CommerceError> {
            Err(CommerceError::External("socket closed".into()))
        }
    }

    fn order() -> Order {
        Order {
            id: OrderId::new("o-1"),
            user_id: UserId::new("u-1"),
            line_items: Vec::new(),
            status: OrderStatus::Pending,
            shipping_id: None,
            payment_id: None,
            discount_id: None,
            subtotal: Money::ZERO,
            discount_amount: Money::ZERO,
            shipping_fee: Money::ZERO,
            total_payment: Money::ZERO,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_vietnamese_texts() {
        let locale = Locale::default();
        assert_eq!(locale.placed_title(), "Đặt hàng thành công");
        assert_eq!(
            locale.placed_content(&OrderId::new("o-1")),
            "Đơn hàng o-1 của bạn đã được đặt thành công"
        );
        assert_eq!(locale.status_title(OrderStatus::Canceled), "Đơn hàng đã bị hủy");
        assert_eq!(locale.status_title(OrderStatus::Pending), "Đơn hàng đã được cập nhật");
        assert_eq!(
            locale.status_content(&OrderId::new("o-1"), OrderStatus::Paid),
            "Đơn hàng o-1 của bạn đã được cập nhật sang trạng thái PAID"
        );
    }

    #[tokio::test]
    async fn test_dispatch_persists_and_pushes() {
        let store = Arc::new(MemoryStore::new());
        let channel = BroadcastChannel::default();
        let mut rx = channel.subscribe();
        let dispatcher =
            NotificationDispatcher::new(store.clone(), Arc::new(channel), Locale::En);

        let sent = dispatcher.order_placed(&order()).await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.user_id, UserId::new("u-1"));
        assert_eq!(event.payload.notification_id, sent.id);
        assert_eq!(event.payload.title, "Order placed");

        let inbox = dispatcher.list_for_user(&UserId::new("u-1")).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert!(!inbox[0].is_read);
    }

    #[tokio::test]
    async fn test_push_failure_is_not_fatal() {
        let store = Arc::new(MemoryStore::new());
        let dispatcher =
            NotificationDispatcher::new(store.clone(), Arc::new(FailingChannel), Locale::Vi);

        dispatcher.order_placed(&order()).await.unwrap();
        let inbox = dispatcher.list_for_user(&UserId::new("u-1")).await.unwrap();
        assert_eq!(inbox.len(), 1);
    }

    #[tokio::test]
    async fn test_mark_read_checks_owner() {
        let store = Arc::new(MemoryStore::new());
        let dispatcher =
            NotificationDispatcher::new(store.clone(), Arc::new(TracingChannel), Locale::Vi);
        let sent = dispatcher.order_placed(&order()).await.unwrap();

        assert!(dispatcher
            .mark_read(&UserId::new("someone-else"), &sent.id)
            .await
            .is_err());
        let read = dispatcher.mark_read(&UserId::new("u-1"), &sent.id).await.unwrap();
        assert!(read.is_read);
    }
}
