//! CLI command implementations.

pub mod cart;
pub mod config;
pub mod discounts;
pub mod jobs;
pub mod notifications;
pub mod order;
pub mod reconcile;

use boxo_commerce::checkout::DEFAULT_PER_PAGE;
use boxo_commerce::prelude::*;
use clap::{Args, Subcommand};

/// Arguments for the cart command.
#[derive(Args)]
pub struct CartArgs {
    /// User whose cart to work on.
    #[arg(short, long)]
    pub user: String,

    #[command(subcommand)]
    pub command: Option<CartCommand>,
}

#[derive(Subcommand)]
pub enum CartCommand {
    /// Show the cart.
    Show,
    /// Add a book, merging with an existing line.
    Add {
        /// Book ID.
        book: String,
        /// Quantity to add.
        #[arg(short, long, default_value = "1")]
        quantity: i64,
    },
    /// Set the quantity of a line.
    Update {
        /// Book ID.
        book: String,
        /// New quantity.
        quantity: i64,
    },
    /// Remove a line.
    Remove {
        /// Book ID.
        book: String,
    },
    /// Select or deselect a line for checkout.
    Check {
        /// Book ID.
        book: String,
        /// Deselect instead.
        #[arg(long)]
        off: bool,
    },
    /// Select or deselect every line.
    CheckAll {
        /// Deselect instead.
        #[arg(long)]
        off: bool,
    },
    /// Empty the cart.
    Clear,
}

/// Arguments for the order command.
#[derive(Args)]
pub struct OrderArgs {
    #[command(subcommand)]
    pub command: OrderCommand,
}

#[derive(Subcommand)]
pub enum OrderCommand {
    /// Place an order from the checked cart items.
    Pay {
        /// Buyer.
        #[arg(short, long)]
        user: String,
        /// cash-on-delivery, bank-transfer or card.
        #[arg(short, long, default_value = "cash-on-delivery")]
        payment: PaymentType,
        /// Discount code.
        #[arg(short, long)]
        discount: Option<String>,
    },
    /// Capture payment for a pending order.
    Checkout {
        /// Buyer.
        #[arg(short, long)]
        user: String,
        /// Order ID.
        order: String,
    },
    /// Move an order to a new status.
    Status {
        /// Order ID.
        order: String,
        /// PENDING, PAID, SHIPPED, DELIVERED or CANCELED.
        status: OrderStatus,
    },
    /// Show an order with its shipping and payment.
    Show {
        /// Order ID.
        order: String,
    },
    /// List orders.
    List {
        #[command(flatten)]
        query: ListQuery,
    },
    /// Admin overview of orders.
    Summaries {
        #[command(flatten)]
        query: ListQuery,
    },
    /// Show an order's shipping record.
    Shipping {
        /// Order ID.
        order: String,
    },
    /// Update an order's shipping record.
    UpdateShipping {
        /// Order ID.
        order: String,
        /// New shipping status.
        #[arg(short, long)]
        status: Option<ShippingStatus>,
        /// Carrier note.
        #[arg(short, long)]
        description: Option<String>,
    },
}

/// Filter and paging options for order listings.
#[derive(Args)]
pub struct ListQuery {
    /// Only this user's orders.
    #[arg(short, long)]
    pub user: Option<String>,

    /// Only orders in this status.
    #[arg(short, long)]
    pub status: Option<OrderStatus>,

    /// Page number.
    #[arg(long, default_value = "1")]
    pub page: i64,

    /// Orders per page.
    #[arg(long, default_value_t = DEFAULT_PER_PAGE)]
    pub per_page: i64,

    /// newest, oldest, total_desc or total_asc.
    #[arg(long, default_value = "newest")]
    pub sort: String,
}

impl ListQuery {
    pub fn filter(&self) -> OrderFilter {
        OrderFilter {
            user_id: self.user.clone().map(UserId::new),
            status: self.status,
        }
    }

    pub fn page(&self) -> anyhow::Result<PageRequest> {
        let sort = SortOrder::parse(&self.sort)
            .ok_or_else(|| anyhow::anyhow!("Unknown sort order: {}", self.sort))?;
        Ok(PageRequest::new(self.page, self.per_page).with_sort(sort))
    }
}

/// Arguments for the notifications command.
#[derive(Args)]
pub struct NotificationsArgs {
    /// Recipient.
    #[arg(short, long)]
    pub user: String,

    #[command(subcommand)]
    pub command: Option<NotificationsCommand>,
}

#[derive(Subcommand)]
pub enum NotificationsCommand {
    /// List notifications, newest first.
    List {
        /// Only unread ones.
        #[arg(long)]
        unread: bool,
    },
    /// Mark a notification as read.
    Read {
        /// Notification ID.
        notification: String,
    },
}

/// Arguments for the discounts command.
#[derive(Args)]
pub struct DiscountsArgs {
    #[command(subcommand)]
    pub command: Option<DiscountsCommand>,
}

#[derive(Subcommand)]
pub enum DiscountsCommand {
    /// List public discounts currently on offer.
    List,
}

/// Arguments for the reconcile command.
#[derive(Args)]
pub struct ReconcileArgs {
    /// Report what needs reconciling without changing anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the jobs command.
#[derive(Args)]
pub struct JobsArgs {
    #[command(subcommand)]
    pub command: JobsCommand,
}

#[derive(Subcommand)]
pub enum JobsCommand {
    /// Run background jobs until interrupted.
    Run {
        /// Seconds between reconciliation runs (overrides config).
        #[arg(long)]
        interval: Option<u64>,
    },
}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration.
    Show,
    /// Initialize a new config file.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
        /// Write boxo.json instead of boxo.toml.
        #[arg(long = "as-json")]
        as_json: bool,
    },
    /// Validate the config file.
    Validate,
}
