//! Configuration management commands.

use anyhow::{bail, Result};

use super::{ConfigArgs, ConfigCommand};
use crate::config::{generate_default_config, CliConfig, CONFIG_NAMES};
use crate::context::Context;

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx).await,
        ConfigCommand::Init { force, as_json } => init_config(force, as_json, ctx).await,
        ConfigCommand::Validate => validate_config(ctx).await,
    }
}

async fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    match &ctx.config_path {
        Some(path) => ctx.output.kv("file", &path.display().to_string()),
        None => ctx.output.kv("file", "(none, using defaults)"),
    }
    ctx.output.kv("state", &ctx.state_path.display().to_string());

    let logging = &ctx.config.logging;
    ctx.output.info("");
    ctx.output.info("[logging]");
    ctx.output.kv("level", logging.level.as_directive());
    ctx.output.kv("format", &format!("{:?}", logging.format).to_lowercase());
    if let Some(filter) = &logging.filter {
        ctx.output.kv("filter", filter);
    }

    let checkout = &ctx.config.checkout;
    ctx.output.info("");
    ctx.output.info("[checkout]");
    ctx.output
        .kv("tracking_random_len", &checkout.tracking_random_len.to_string());
    ctx.output
        .kv("tracking_attempts", &checkout.tracking_attempts.to_string());
    ctx.output.kv("locale", &format!("{:?}", checkout.locale).to_lowercase());
    ctx.output.kv(
        "reconcile_interval_secs",
        &checkout.reconcile_interval_secs.to_string(),
    );
    ctx.output.kv(
        "saga_stale_after_secs",
        &checkout.saga_stale_after_secs.to_string(),
    );
    let rates = &checkout.shipping;
    ctx.output.kv(
        "shipping",
        &format!(
            "base {} + {}/km, flat {} beyond range, x{}",
            rates.base, rates.rate_per_km, rates.flat, rates.scale
        ),
    );

    ctx.output.info("");
    ctx.output.info("[store]");
    ctx.output
        .kv("lock_timeout_ms", &ctx.config.store.lock_timeout_ms.to_string());

    let seed = &ctx.config.seed;
    if !seed.books.is_empty() || !seed.discounts.is_empty() || !seed.addresses.is_empty() {
        ctx.output.info("");
        ctx.output.info("Seed data:");
        ctx.output.list_item(&format!("{} book(s)", seed.books.len()));
        ctx.output
            .list_item(&format!("{} discount(s)", seed.discounts.len()));
        ctx.output
            .list_item(&format!("{} address(es)", seed.addresses.len()));
    }

    Ok(())
}

async fn init_config(force: bool, as_json: bool, ctx: &Context) -> Result<()> {
    let name = if as_json { CONFIG_NAMES[2] } else { CONFIG_NAMES[0] };
    let config_path = ctx.cwd.join(name);

    if config_path.exists() && !force {
        bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let template = generate_default_config();
    if as_json {
        let config: CliConfig = toml::from_str(&template)?;
        config.save(&config_path)?;
    } else {
        std::fs::write(&config_path, template)?;
    }
    ctx.output
        .success(&format!("Created: {}", config_path.display()));

    Ok(())
}

async fn validate_config(ctx: &Context) -> Result<()> {
    ctx.output.header("Validating configuration");

    if ctx.config_path.is_none() {
        ctx.output
            .warn("No config file found; validating built-in defaults");
    }

    let (errors, warnings) = ctx.config.validate();

    if errors.is_empty() && warnings.is_empty() {
        ctx.output.success("Configuration is valid");
        return Ok(());
    }

    for error in &errors {
        ctx.output.error(&format!("Error: {}", error));
    }

    for warning in &warnings {
        ctx.output.warn(&format!("Warning: {}", warning));
    }

    if !errors.is_empty() {
        bail!("Configuration has {} error(s)", errors.len());
    }

    ctx.output.success("Configuration is valid (with warnings)");

    Ok(())
}
