//! Long-running background jobs.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use boxo_commerce::prelude::*;

use super::{JobsArgs, JobsCommand};
use crate::context::Context;

/// Run the jobs command.
pub async fn run(args: JobsArgs, ctx: &Context) -> Result<()> {
    match args.command {
        JobsCommand::Run { interval } => run_jobs(interval, ctx).await,
    }
}

async fn run_jobs(interval: Option<u64>, ctx: &Context) -> Result<()> {
    let session = ctx.session().await?;
    ctx.commit(&session)?;
    let every = interval
        .map(|secs| Duration::from_secs(secs.max(1)))
        .unwrap_or_else(|| ctx.config.checkout.reconcile_interval());

    let mut scheduler = JobScheduler::new();
    scheduler.register(
        Arc::new(ReconciliationJob::new(session.orchestrator.clone())),
        every,
    );
    scheduler.register(
        Arc::new(SnapshotJob {
            store: session.store.clone(),
            path: ctx.state_path.clone(),
        }),
        every,
    );

    scheduler.start();
    ctx.output.success(&format!(
        "Running background jobs every {}s. Press Ctrl-C to stop.",
        every.as_secs()
    ));
    ctx.output.info(&format!(
        "Other boxo commands wait on {} until the jobs stop.",
        session.lock_path().display()
    ));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    ctx.output.info("Stopping jobs...");
    scheduler.stop().await;
    ctx.commit(&session)?;

    if let Some(status) = scheduler.status("reconcile-checkouts") {
        ctx.output.kv("reconcile runs", &status.runs.to_string());
        ctx.output.kv("reconcile failures", &status.failures.to_string());
        if let Some(error) = status.last_error {
            ctx.output.warn(&format!("Last reconcile error: {}", error));
        }
    }
    Ok(())
}

/// Writes the store snapshot so reconciliation results survive a crash.
struct SnapshotJob {
    store: Arc<MemoryStore>,
    path: PathBuf,
}

#[async_trait]
impl Job for SnapshotJob {
    fn name(&self) -> &str {
        "save-snapshot"
    }

    async fn run(&self) -> Result<(), CommerceError> {
        let json = self.store.to_json()?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| CommerceError::Storage(format!("{}: {}", self.path.display(), e)))
    }
}
