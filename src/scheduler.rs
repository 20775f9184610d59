//! Periodic pull (and optional push) of the configured categories.
//!
//! The loop is strictly sequential: sleep, run one cycle, sleep again. A
//! cycle never overlaps the next. Shutdown is signalled through a
//! `tokio::sync::watch` channel and is honoured between cycles.

use anyhow::Result;
use chrono::{DateTime, Utc};
use lore_harness_core::remote::RemoteStore;
use lore_harness_core::Category;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::Config;
use crate::storage::LoreStore;
use crate::sync::{pull, push, PullReport, PushReport, SyncError, SyncLocks, SyncTarget};

#[derive(Debug, Clone, Serialize)]
pub struct CategoryCycle {
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull: Option<PullReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push: Option<PushReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CycleError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleError {
    pub code: String,
    pub message: String,
}

impl From<&SyncError> for CycleError {
    fn from(err: &SyncError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub categories: Vec<CategoryCycle>,
}

impl CycleReport {
    pub fn failed_categories(&self) -> usize {
        self.categories.iter().filter(|c| c.error.is_some()).count()
    }
}

/// Pull every scheduled category, then push it when `push_after_pull` is
/// set. A failing category is recorded and the others still run.
pub async fn run_cycle(config: &Config, store: &LoreStore, remote: &dyn RemoteStore, locks: &SyncLocks) -> CycleReport {
    let started_at = Utc::now();
    let mut categories = Vec::new();

    for &category in &config.scheduler.categories {
        let mut cycle = CategoryCycle {
            category,
            pull: None,
            push: None,
            error: None,
        };
        if let Err(e) = sync_category(config, store, remote, locks, &mut cycle).await {
            warn!(%category, code = e.code(), error = %e, "scheduled sync failed");
            cycle.error = Some(CycleError::from(&e));
        }
        categories.push(cycle);
    }

    let report = CycleReport {
        started_at,
        finished_at: Utc::now(),
        categories,
    };
    info!(
        categories = report.categories.len(),
        failed = report.failed_categories(),
        "sync cycle complete"
    );
    report
}

async fn sync_category(
    config: &Config,
    store: &LoreStore,
    remote: &dyn RemoteStore,
    locks: &SyncLocks,
    cycle: &mut CategoryCycle,
) -> Result<(), SyncError> {
    let target = SyncTarget::resolve(config, cycle.category, None)?;
    cycle.pull = Some(pull(store, remote, &target, locks).await?);
    if config.scheduler.push_after_pull {
        cycle.push = Some(push(store, remote, &target, locks).await?);
    }
    Ok(())
}

/// Run cycles every `scheduler.interval_secs` until `shutdown` turns true
/// or its sender is dropped.
pub async fn run_scheduler(
    config: Arc<Config>,
    remote: Arc<dyn RemoteStore>,
    locks: SyncLocks,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let interval = Duration::from_secs(config.scheduler.interval_secs);
    let store = LoreStore::from_config(&config);
    info!(interval_secs = config.scheduler.interval_secs, "scheduler started");

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                run_cycle(&config, &store, remote.as_ref(), &locks).await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    info!("scheduler stopped");
    Ok(())
}
