//! Discount commands.

use anyhow::Result;
use boxo_commerce::prelude::*;

use super::{DiscountsArgs, DiscountsCommand};
use crate::context::Context;
use crate::output::format_time;

/// Run the discounts command.
pub async fn run(args: DiscountsArgs, ctx: &Context) -> Result<()> {
    match args.command.unwrap_or(DiscountsCommand::List) {
        DiscountsCommand::List => list(ctx).await,
    }
}

async fn list(ctx: &Context) -> Result<()> {
    let session = ctx.session().await?;
    let discounts = session.orchestrator.public_discounts().await?;

    if ctx.output.is_json() {
        ctx.output.json(&discounts);
        return Ok(());
    }

    ctx.output.header("Public discounts");
    if discounts.is_empty() {
        ctx.output.info("No discounts on offer.");
        return Ok(());
    }

    let widths = [12, 14, 16, 6, 16];
    ctx.output
        .table_header(&["CODE", "OFF", "MIN ORDER", "LEFT", "ENDS"], &widths);
    for discount in &discounts {
        let off = match &discount.kind {
            DiscountKind::Percentage(p) => format!("{}%", p),
            DiscountKind::Fixed(amount) => amount.to_string(),
        };
        ctx.output.table_row(
            &[
                &discount.code,
                &off,
                &discount.min_required_value.to_string(),
                &discount.quantity.to_string(),
                &format_time(discount.end_date),
            ],
            &widths,
        );
    }
    Ok(())
}
