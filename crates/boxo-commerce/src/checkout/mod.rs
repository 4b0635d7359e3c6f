//! Checkout module.
//!
//! Contains the order, shipping and payment records, the checkout saga, order
//! queries, and the orchestrator that drives them.

mod address;
mod flow;
mod order;
mod orchestrator;
mod payment;
mod query;
mod shipping;

pub use address::{AddressProvider, AddressSnapshot, DefaultAddress};
pub use flow::{CheckoutSaga, CheckoutStep, SagaState};
pub use orchestrator::{OrderOrchestrator, PaymentRequest, ReconcileReport};
pub use order::{Order, OrderLineItem, OrderStatus};
pub use payment::{PaymentRecord, PaymentType};
pub use query::{
    OrderDetails, OrderFilter, OrderSummary, Page, PageRequest, Pagination, SortOrder,
    DEFAULT_PER_PAGE, MAX_PER_PAGE,
};
pub use shipping::{
    generate_tracking_number, ShippingRates, ShippingRecord, ShippingStatus, ShippingUpdate,
    TRACKING_PREFIX,
};
