//! Boxo CLI - checkout and order fulfillment from the command line.
//!
//! Commands:
//! - `boxo cart` - Manage a user's cart
//! - `boxo order` - Place, pay for, track and list orders
//! - `boxo notifications` - Read a user's notification inbox
//! - `boxo discounts` - List public discount codes
//! - `boxo reconcile` - Unwind interrupted checkouts
//! - `boxo jobs` - Run background jobs
//! - `boxo config` - Manage configuration

mod commands;
mod config;
mod context;
mod lock;
mod output;

use anyhow::Result;
use boxo_observability::LogLevel;
use clap::{Parser, Subcommand};

use commands::{
    CartArgs, ConfigArgs, DiscountsArgs, JobsArgs, NotificationsArgs, OrderArgs, ReconcileArgs,
};

/// Boxo CLI - Checkout and order fulfillment for the Boxo bookstore
#[derive(Parser)]
#[command(name = "boxo")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// State file path (overrides the config)
    #[arg(long, global = true)]
    state: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage a user's cart
    Cart(CartArgs),

    /// Place, pay for, track and list orders
    Order(OrderArgs),

    /// Read a user's notifications
    Notifications(NotificationsArgs),

    /// List public discount codes
    Discounts(DiscountsArgs),

    /// Unwind checkouts that failed partway
    Reconcile(ReconcileArgs),

    /// Run background jobs
    Jobs(JobsArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup output formatting
    let output = output::Output::new(cli.verbose, cli.json);

    // Load config
    let ctx = match context::Context::load(cli.config.as_deref(), cli.state.as_deref(), output) {
        Ok(ctx) => ctx,
        Err(e) => {
            output::Output::new(cli.verbose, cli.json).error(&format!("{:#}", e));
            std::process::exit(1);
        }
    };

    let mut logging = ctx.config.logging.clone();
    if ctx.output.is_verbose() {
        logging.level = logging.level.min(LogLevel::Debug);
    }
    if let Err(e) = boxo_observability::init(&logging) {
        ctx.output.warn(&format!("Logging disabled: {}", e));
    }
    ctx.output.debug(&format!("State file: {}", ctx.state_path.display()));

    // Execute command
    let result = match cli.command {
        Commands::Cart(args) => commands::cart::run(args, &ctx).await,
        Commands::Order(args) => commands::order::run(args, &ctx).await,
        Commands::Notifications(args) => commands::notifications::run(args, &ctx).await,
        Commands::Discounts(args) => commands::discounts::run(args, &ctx).await,
        Commands::Reconcile(args) => commands::reconcile::run(args, &ctx).await,
        Commands::Jobs(args) => commands::jobs::run(args, &ctx).await,
        Commands::Config(args) => commands::config::run(args, &ctx).await,
    };

    if let Err(e) = result {
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
