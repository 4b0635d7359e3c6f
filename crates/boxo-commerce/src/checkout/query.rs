//! Order queries and pagination.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checkout::{Order, OrderStatus, PaymentRecord, PaymentType, ShippingRecord};
use crate::ids::{OrderId, UserId};
use crate::money::Money;

/// Default page size.
pub const DEFAULT_PER_PAGE: i64 = 10;

/// Largest accepted page size.
pub const MAX_PER_PAGE: i64 = 100;

/// Which orders to return.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderFilter {
    pub user_id: Option<UserId>,
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    /// All orders of one user.
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            status: None,
        }
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.user_id.as_ref().map_or(true, |u| &order.user_id == u)
            && self.status.map_or(true, |s| order.status == s)
    }
}

/// Sort option.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
    TotalDesc,
    TotalAsc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::NewestFirst => "newest",
            SortOrder::OldestFirst => "oldest",
            SortOrder::TotalDesc => "total_desc",
            SortOrder::TotalAsc => "total_asc",
        }
    }

    /// Parse from the `sortBy`-style string used by the CLI.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "newest" | "created_at:desc" => Some(SortOrder::NewestFirst),
            "oldest" | "created_at:asc" => Some(SortOrder::OldestFirst),
            "total_desc" | "total:desc" => Some(SortOrder::TotalDesc),
            "total_asc" | "total:asc" => Some(SortOrder::TotalAsc),
            _ => None,
        }
    }

    /// Sort orders in place. Ties fall back to the order ID so pages are stable.
    pub fn sort(&self, orders: &mut [Order]) {
        match self {
            SortOrder::NewestFirst => {
                orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)))
            }
            SortOrder::OldestFirst => {
                orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            }
            SortOrder::TotalDesc => orders.sort_by(|a, b| {
                b.total_payment
                    .cmp(&a.total_payment)
                    .then(b.id.cmp(&a.id))
            }),
            SortOrder::TotalAsc => orders.sort_by(|a, b| {
                a.total_payment
                    .cmp(&b.total_payment)
                    .then(a.id.cmp(&b.id))
            }),
        }
    }
}

/// Requested page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageRequest {
    /// Page number (1-indexed).
    pub page: i64,
    pub per_page: i64,
    pub sort: SortOrder,
}

impl PageRequest {
    pub fn new(page: i64, per_page: i64) -> Self {
        Self {
            page,
            per_page,
            sort: SortOrder::default(),
        }
    }

    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    /// Page clamped to at least one, page size clamped to `[1, MAX_PER_PAGE]`.
    pub fn normalized(&self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, MAX_PER_PAGE),
            sort: self.sort,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PER_PAGE)
    }
}

/// Pagination info.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    /// Current page (1-indexed).
    pub page: i64,
    /// Items per page.
    pub per_page: i64,
    /// Total number of items.
    pub total: i64,
    /// Total number of pages.
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: i64, per_page: i64, total: i64) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            (total + per_page - 1) / per_page
        };

        Self {
            page,
            per_page,
            total,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    /// Cut a page out of an already sorted list.
    pub fn slice(all: Vec<T>, request: PageRequest) -> Self {
        let request = request.normalized();
        let pagination = Pagination::new(request.page, request.per_page, all.len() as i64);
        let items = all
            .into_iter()
            .skip(pagination.offset() as usize)
            .take(pagination.per_page as usize)
            .collect();
        Self { items, pagination }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// Admin overview row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderSummary {
    pub order_id: OrderId,
    pub user_id: UserId,
    /// Units across all lines.
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
    /// None if the checkout never got as far as the payment record.
    pub payment_type: Option<PaymentType>,
    pub total_payment: Money,
    pub status: OrderStatus,
}

impl OrderSummary {
    pub fn new(order: &Order, payment: Option<&PaymentRecord>) -> Self {
        Self {
            order_id: order.id.clone(),
            user_id: order.user_id.clone(),
            quantity: order.item_count(),
            created_at: order.created_at,
            payment_type: payment.map(|p| p.payment_type),
            total_payment: order.total_payment,
            status: order.status,
        }
    }
}

/// An order with its shipping and payment records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderDetails {
    pub order: Order,
    pub shipping: Option<ShippingRecord>,
    pub payment: Option<PaymentRecord>,
}
