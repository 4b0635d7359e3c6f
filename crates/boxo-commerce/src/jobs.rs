//! Periodic background jobs.
//!
//! The scheduler is an ordinary value owned by whoever runs the process. It
//! does nothing until [`JobScheduler::start`] and stops cleanly on
//! [`JobScheduler::stop`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::checkout::OrderOrchestrator;
use crate::error::CommerceError;

/// A unit of periodic work.
#[async_trait]
pub trait Job: Send + Sync {
    /// Stable name used in logs and status lookups.
    fn name(&self) -> &str;

    async fn run(&self) -> Result<(), CommerceError>;
}

/// Last known state of a job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobStatus {
    pub runs: u64,
    pub failures: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

struct Registered {
    job: Arc<dyn Job>,
    interval: Duration,
}

/// Runs registered jobs on fixed intervals.
pub struct JobScheduler {
    jobs: Vec<Registered>,
    status: Arc<Mutex<HashMap<String, JobStatus>>>,
    shutdown: Option<watch::Sender<bool>>,
    handles: Vec<JoinHandle<()>>,
}

impl JobScheduler {
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            status: Arc::new(Mutex::new(HashMap::new())),
            shutdown: None,
            handles: Vec::new(),
        }
    }

    /// Add a job. Jobs registered after `start` run from the next `start`.
    pub fn register(&mut self, job: Arc<dyn Job>, interval: Duration) {
        self.status
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(job.name().to_string())
            .or_default();
        self.jobs.push(Registered { job, interval });
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_some()
    }

    /// Spawn one task per job. Each job runs immediately, then on its interval.
    /// Does nothing if already running.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        let (tx, rx) = watch::channel(false);

        for registered in &self.jobs {
            let job = Arc::clone(&registered.job);
            let period = registered.interval.max(Duration::from_millis(1));
            let status = Arc::clone(&self.status);
            let mut rx = rx.clone();

            self.handles.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => run_once(job.as_ref(), &status).await,
                        changed = rx.changed() => {
                            if changed.is_err() || *rx.borrow() {
                                break;
                            }
                        }
                    }
                }
                debug!(job = job.name(), "Job loop stopped");
            }));
        }

        info!(jobs = self.jobs.len(), "Job scheduler started");
        self.shutdown = Some(tx);
    }

    /// Signal every job loop and wait for it to finish its current run.
    pub async fn stop(&mut self) {
        let Some(tx) = self.shutdown.take() else {
            return;
        };
        let _ = tx.send(true);
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "Job task ended abnormally");
            }
        }
        info!("Job scheduler stopped");
    }

    pub fn status(&self, name: &str) -> Option<JobStatus> {
        self.status
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_once(job: &dyn Job, status: &Mutex<HashMap<String, JobStatus>>) {
    let result = job.run().await;
    if let Err(e) = &result {
        warn!(job = job.name(), error = %e, "Job failed");
    }

    let mut map = status.lock().unwrap_or_else(|e| e.into_inner());
    let entry = map.entry(job.name().to_string()).or_default();
    entry.runs += 1;
    entry.last_run = Some(Utc::now());
    match result {
        Ok(()) => entry.last_error = None,
        Err(e) => {
            entry.failures += 1;
            entry.last_error = Some(e.to_string());
        }
    }
}

/// Periodically unwinds interrupted checkouts.
pub struct ReconciliationJob {
    orchestrator: OrderOrchestrator,
}

impl ReconciliationJob {
    pub fn new(orchestrator: OrderOrchestrator) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl Job for ReconciliationJob {
    fn name(&self) -> &str {
        "reconcile-checkouts"
    }

    async fn run(&self) -> Result<(), CommerceError> {
        let report = self.orchestrator.reconcile().await?;
        if report.examined > 0 {
            info!(
                examined = report.examined,
                compensated = report.compensated.len(),
                completed = report.completed.len(),
                failed = report.failed.len(),
                "Reconciliation pass"
            );
        }
        Ok(())
    }
}
