//! Checkout and order fulfillment for the Boxo bookstore.
//!
//! This crate turns a user's cart into a durable order and drives that order
//! through its lifecycle:
//!
//! - **Cart**: line items with price snapshots and a per-item checked flag
//! - **Discount**: percentage and fixed codes with usage windows and redemption counts
//! - **Catalog**: the inventory seam the cart and checkout read and reserve from
//! - **Checkout**: orders, shipping and payment records, the checkout saga,
//!   and the orchestrator
//! - **Notification**: persisted inbox entries plus a fire-and-forget live push
//! - **Store**: repository traits and an in-memory backend
//! - **Jobs**: an injectable scheduler that runs reconciliation periodically
//!
//! # Example
//!
//! ```rust,ignore
//! use boxo_commerce::prelude::*;
//!
//! let store = Arc::new(MemoryStore::new());
//! let orchestrator = OrderOrchestrator::new(
//!     Stores::shared(store.clone()),
//!     Arc::new(TracingChannel),
//!     CheckoutSettings::default(),
//! );
//!
//! let carts = orchestrator.carts();
//! carts.add_item(&user, &book, 2).await?;
//! carts.set_all_checked(&user, true).await?;
//!
//! let order = orchestrator
//!     .process_payment(&user, PaymentRequest::new(PaymentType::CashOnDelivery))
//!     .await?;
//! orchestrator.checkout_order(&user, &order.id).await?;
//! ```

pub mod error;
pub mod ids;
pub mod money;

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod discount;
pub mod jobs;
pub mod locks;
pub mod notification;
pub mod store;

pub use error::{CommerceError, ErrorKind};
pub use ids::*;
pub use money::Money;

/// Prelude for convenient imports.
pub mod prelude {
    pub use std::sync::Arc;

    pub use crate::error::{CommerceError, ErrorKind};
    pub use crate::ids::*;
    pub use crate::money::Money;

    // Cart
    pub use crate::cart::{Cart, CartItem, CartStore};

    // Catalog
    pub use crate::catalog::{BookListing, InventoryCatalog, StockReservation};

    // Discount
    pub use crate::discount::{AppliedDiscount, Discount, DiscountKind, DiscountLedger};

    // Checkout
    pub use crate::checkout::{
        AddressProvider, AddressSnapshot, CheckoutSaga, CheckoutStep, DefaultAddress, Order,
        OrderDetails, OrderFilter, OrderLineItem, OrderOrchestrator, OrderStatus, OrderSummary,
        Page, PageRequest, Pagination, PaymentRecord, PaymentRequest, PaymentType,
        ReconcileReport, SagaState, ShippingRates, ShippingRecord, ShippingStatus,
        ShippingUpdate, SortOrder,
    };

    // Notification
    pub use crate::notification::{
        BroadcastChannel, LiveEvent, Locale, Notification, NotificationChannel,
        NotificationDispatcher, NotificationPayload, TracingChannel,
    };

    // Infrastructure
    pub use crate::config::CheckoutSettings;
    pub use crate::jobs::{Job, JobScheduler, JobStatus, ReconciliationJob};
    pub use crate::locks::UserLocks;
    pub use crate::store::{MemoryState, MemoryStore, Stores};
}
