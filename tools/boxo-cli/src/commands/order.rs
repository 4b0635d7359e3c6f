//! Order commands.

use anyhow::{bail, Result};
use boxo_commerce::prelude::*;

use super::{ListQuery, OrderArgs, OrderCommand};
use crate::context::Context;
use crate::output::{format_time, order_badge, shipping_badge, short_id};

/// Run the order command.
pub async fn run(args: OrderArgs, ctx: &Context) -> Result<()> {
    match args.command {
        OrderCommand::Pay {
            user,
            payment,
            discount,
        } => pay(&user, payment, discount, ctx).await,
        OrderCommand::Checkout { user, order } => checkout(&user, &order, ctx).await,
        OrderCommand::Status { order, status } => update_status(&order, status, ctx).await,
        OrderCommand::Show { order } => show(&order, ctx).await,
        OrderCommand::List { query } => list(&query, ctx).await,
        OrderCommand::Summaries { query } => summaries(&query, ctx).await,
        OrderCommand::Shipping { order } => shipping(&order, ctx).await,
        OrderCommand::UpdateShipping {
            order,
            status,
            description,
        } => update_shipping(&order, ShippingUpdate { status, description }, ctx).await,
    }
}

async fn pay(
    user: &str,
    payment_type: PaymentType,
    discount: Option<String>,
    ctx: &Context,
) -> Result<()> {
    let session = ctx.session().await?;
    let mut request = PaymentRequest::new(payment_type);
    if let Some(code) = discount {
        request = request.with_discount_code(code);
    }

    let result = session
        .orchestrator
        .process_payment(&UserId::new(user), request)
        .await;

    // An interrupted checkout has already written part of its work, and the
    // saga that lets `boxo reconcile` undo it must be kept.
    if matches!(
        &result,
        Ok(_) | Err(CommerceError::CheckoutInterrupted { .. })
    ) {
        ctx.commit(&session)?;
    }
    let order = result?;

    if ctx.output.is_json() {
        ctx.output.json(&order);
        return Ok(());
    }

    ctx.output.success(&format!("Order placed: {}", order.id));
    print_order(&order, ctx);
    Ok(())
}

async fn checkout(user: &str, order_id: &str, ctx: &Context) -> Result<()> {
    let session = ctx.session().await?;
    let order = session
        .orchestrator
        .checkout_order(&UserId::new(user), &OrderId::new(order_id))
        .await?;
    ctx.commit(&session)?;

    if ctx.output.is_json() {
        ctx.output.json(&order);
        return Ok(());
    }
    ctx.output
        .success(&format!("Payment captured for order {}", order.id));
    ctx.output.kv("status", &order_badge(order.status));
    ctx.output.kv("total", &order.total_payment.to_string());
    Ok(())
}

async fn update_status(order_id: &str, status: OrderStatus, ctx: &Context) -> Result<()> {
    let session = ctx.session().await?;
    let order = session
        .orchestrator
        .update_status(&OrderId::new(order_id), status)
        .await?;
    ctx.commit(&session)?;

    if ctx.output.is_json() {
        ctx.output.json(&order);
        return Ok(());
    }
    ctx.output.success(&format!(
        "Order {} is now {}",
        order.id,
        order_badge(order.status)
    ));
    Ok(())
}

async fn show(order_id: &str, ctx: &Context) -> Result<()> {
    let session = ctx.session().await?;
    let details = session
        .orchestrator
        .get_order(&OrderId::new(order_id))
        .await?;

    if ctx.output.is_json() {
        ctx.output.json(&details);
        return Ok(());
    }

    ctx.output.header(&format!("Order {}", details.order.id));
    print_order(&details.order, ctx);

    if let Some(shipping) = &details.shipping {
        ctx.output.header("Shipping");
        print_shipping(shipping, ctx);
    }
    if let Some(payment) = &details.payment {
        ctx.output.header("Payment");
        ctx.output.kv("type", payment.payment_type.as_str());
        ctx.output.kv("amount", &payment.value.to_string());
        let state = if payment.voided {
            "voided".to_string()
        } else if let Some(at) = payment.paid_at {
            format!("paid at {}", format_time(at))
        } else {
            "unpaid".to_string()
        };
        ctx.output.kv("state", &state);
    }
    Ok(())
}

async fn list(query: &ListQuery, ctx: &Context) -> Result<()> {
    let session = ctx.session().await?;
    let page = session
        .orchestrator
        .list_orders(&query.filter(), query.page()?)
        .await?;

    if ctx.output.is_json() {
        ctx.output.json(&page);
        return Ok(());
    }

    ctx.output.header("Orders");
    if page.is_empty() {
        ctx.output.info("No orders found.");
        return Ok(());
    }

    let widths = [13, 12, 10, 6, 18, 16];
    ctx.output.table_header(
        &["ORDER", "USER", "STATUS", "ITEMS", "TOTAL", "CREATED"],
        &widths,
    );
    for order in &page.items {
        ctx.output.table_row(
            &[
                &short_id(order.id.as_str()),
                &short_id(order.user_id.as_str()),
                order.status.as_str(),
                &order.item_count().to_string(),
                &order.total_payment.to_string(),
                &format_time(order.created_at),
            ],
            &widths,
        );
    }
    print_pagination(&page.pagination, ctx);
    Ok(())
}

async fn summaries(query: &ListQuery, ctx: &Context) -> Result<()> {
    let session = ctx.session().await?;
    let page = session
        .orchestrator
        .list_order_summaries(&query.filter(), query.page()?)
        .await?;

    if ctx.output.is_json() {
        ctx.output.json(&page);
        return Ok(());
    }

    ctx.output.header("Order overview");
    if page.is_empty() {
        ctx.output.info("No orders found.");
        return Ok(());
    }

    let widths = [13, 12, 5, 16, 16, 18, 10];
    ctx.output.table_header(
        &["ORDER", "USER", "QTY", "DATE", "PAYMENT", "TOTAL", "STATUS"],
        &widths,
    );
    for summary in &page.items {
        ctx.output.table_row(
            &[
                &short_id(summary.order_id.as_str()),
                &short_id(summary.user_id.as_str()),
                &summary.quantity.to_string(),
                &format_time(summary.created_at),
                summary.payment_type.map_or("-", |p| p.as_str()),
                &summary.total_payment.to_string(),
                summary.status.as_str(),
            ],
            &widths,
        );
    }
    print_pagination(&page.pagination, ctx);
    Ok(())
}

async fn shipping(order_id: &str, ctx: &Context) -> Result<()> {
    let session = ctx.session().await?;
    let shipping = session
        .orchestrator
        .get_shipping(&OrderId::new(order_id))
        .await?;

    if ctx.output.is_json() {
        ctx.output.json(&shipping);
        return Ok(());
    }
    ctx.output.header(&format!("Shipping for order {}", order_id));
    print_shipping(&shipping, ctx);
    Ok(())
}

async fn update_shipping(order_id: &str, update: ShippingUpdate, ctx: &Context) -> Result<()> {
    if update.is_empty() {
        bail!("Nothing to update: pass --status and/or --description");
    }

    let session = ctx.session().await?;
    let shipping = session
        .orchestrator
        .update_shipping(&OrderId::new(order_id), update)
        .await?;
    ctx.commit(&session)?;

    if ctx.output.is_json() {
        ctx.output.json(&shipping);
        return Ok(());
    }
    ctx.output.success("Shipping updated");
    print_shipping(&shipping, ctx);
    Ok(())
}

fn print_order(order: &Order, ctx: &Context) {
    ctx.output.kv("user", order.user_id.as_str());
    ctx.output.kv("status", &order_badge(order.status));
    for item in &order.line_items {
        ctx.output.list_item(&format!(
            "{} × {} ({})",
            item.quantity, item.name, item.line_total
        ));
    }
    ctx.output.kv("subtotal", &order.subtotal.to_string());
    if !order.discount_amount.is_zero() {
        ctx.output
            .kv("discount", &format!("-{}", order.discount_amount));
    }
    ctx.output.kv("shipping", &order.shipping_fee.to_string());
    ctx.output.kv("total", &order.total_payment.to_string());
}

fn print_shipping(shipping: &ShippingRecord, ctx: &Context) {
    ctx.output.kv("tracking", &shipping.tracking_number);
    ctx.output.kv("status", &shipping_badge(shipping.status));
    ctx.output.kv("fee", &shipping.value.to_string());
    ctx.output.kv("address", &shipping.address.one_line());
    if let Some(description) = &shipping.description {
        ctx.output.kv("note", description);
    }
}

fn print_pagination(pagination: &Pagination, ctx: &Context) {
    println!();
    ctx.output.info(&format!(
        "Page {} of {} ({} orders)",
        pagination.page,
        pagination.total_pages.max(1),
        pagination.total
    ));
}
