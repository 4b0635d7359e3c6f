//! Reconciliation of interrupted checkouts.

use anyhow::{bail, Result};
use boxo_commerce::prelude::*;
use boxo_commerce::store::SagaRepository;
use chrono::Utc;

use super::ReconcileArgs;
use crate::context::Context;

/// Run the reconcile command.
pub async fn run(args: ReconcileArgs, ctx: &Context) -> Result<()> {
    let session = ctx.session().await?;

    if args.dry_run {
        return pending(&session.store, ctx).await;
    }

    let report = session.orchestrator.reconcile().await?;
    ctx.commit(&session)?;

    if ctx.output.is_json() {
        ctx.output.json(&report);
    } else if report.examined == 0 {
        ctx.output.success("Nothing to reconcile");
    } else {
        ctx.output.header("Reconciliation");
        ctx.output.kv("examined", &report.examined.to_string());
        for order in &report.compensated {
            ctx.output.list_item(&format!("{} compensated", order));
        }
        for order in &report.completed {
            ctx.output.list_item(&format!("{} closed as completed", order));
        }
        for (order, error) in &report.failed {
            ctx.output.warn(&format!("{} still failing: {}", order, error));
        }
    }

    if !report.is_clean() {
        bail!(
            "{} checkout(s) could not be compensated; they will be retried",
            report.failed.len()
        );
    }
    Ok(())
}

async fn pending(store: &MemoryStore, ctx: &Context) -> Result<()> {
    let now = Utc::now();
    let stale_after = ctx.config.checkout.saga_stale_after();
    let sagas: Vec<CheckoutSaga> = store
        .list_sagas()
        .await?
        .into_iter()
        .filter(|s| s.needs_reconciliation(now, stale_after))
        .collect();

    if ctx.output.is_json() {
        ctx.output.json(&sagas);
        return Ok(());
    }

    if sagas.is_empty() {
        ctx.output.success("Nothing to reconcile");
        return Ok(());
    }
    ctx.output.header("Checkouts awaiting reconciliation");
    for saga in &sagas {
        let state = match &saga.state {
            SagaState::Failed { step, error } => format!("failed at {}: {}", step, error),
            _ => "abandoned in progress".to_string(),
        };
        ctx.output.list_item(&format!("{} ({})", saga.order_id, state));
        let undo: Vec<&str> = saga
            .pending_compensations()
            .iter()
            .map(|s| s.display_name())
            .collect();
        if !undo.is_empty() {
            ctx.output.kv("  to undo", &undo.join(", "));
        }
    }
    Ok(())
}
