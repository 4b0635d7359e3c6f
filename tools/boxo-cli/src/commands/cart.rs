//! Cart commands.

use anyhow::Result;
use boxo_commerce::prelude::*;

use super::{CartArgs, CartCommand};
use crate::context::Context;

/// Run the cart command.
pub async fn run(args: CartArgs, ctx: &Context) -> Result<()> {
    let session = ctx.session().await?;
    let carts = session.orchestrator.carts();
    let user = UserId::new(args.user);

    let (cart, changed) = match args.command.unwrap_or(CartCommand::Show) {
        CartCommand::Show => (carts.get_cart(&user).await?, false),
        CartCommand::Add { book, quantity } => {
            let cart = carts.add_item(&user, &BookId::new(book), quantity).await?;
            ctx.output.success("Added to cart");
            (cart, true)
        }
        CartCommand::Update { book, quantity } => {
            let cart = carts.update_item(&user, &BookId::new(book), quantity).await?;
            ctx.output.success("Quantity updated");
            (cart, true)
        }
        CartCommand::Remove { book } => {
            let cart = carts.remove_item(&user, &BookId::new(book)).await?;
            ctx.output.success("Removed from cart");
            (cart, true)
        }
        CartCommand::Check { book, off } => {
            (carts.set_checked(&user, &BookId::new(book), !off).await?, true)
        }
        CartCommand::CheckAll { off } => (carts.set_all_checked(&user, !off).await?, true),
        CartCommand::Clear => {
            let cart = carts.clear(&user).await?;
            ctx.output.success("Cart cleared");
            (cart, true)
        }
    };

    if changed {
        ctx.commit(&session)?;
    }
    print_cart(&cart, ctx)
}

fn print_cart(cart: &Cart, ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(cart);
        return Ok(());
    }

    ctx.output.header(&format!("Cart of {}", cart.user_id));
    if cart.is_empty() {
        ctx.output.info("Cart is empty.");
        return Ok(());
    }

    let widths = [3, 20, 30, 6, 18];
    ctx.output
        .table_header(&["", "BOOK", "NAME", "QTY", "LINE TOTAL"], &widths);
    for item in &cart.items {
        let mark = if item.is_checked { "[x]" } else { "[ ]" };
        ctx.output.table_row(
            &[
                mark,
                item.book_id.as_str(),
                &item.name,
                &item.quantity.to_string(),
                &item.line_total.to_string(),
            ],
            &widths,
        );
    }

    println!();
    ctx.output.kv("items", &cart.item_count().to_string());
    ctx.output
        .kv("selected subtotal", &cart.checked_subtotal()?.to_string());
    Ok(())
}
