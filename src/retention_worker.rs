// Background worker: delete fact documents older than the retention window.
// Runs on a cron schedule (local time) when prune_schedule is set, else every prune_interval_secs.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{info, instrument, warn};

use crate::config::DatabaseConfig;
use crate::datastore::SqliteFactStore;
use crate::error::StoreError;

/// Config for the retention worker.
#[derive(Debug, Clone)]
pub struct RetentionWorkerConfig {
    pub retention_days: u32,
    pub prune_interval_secs: u64,
    /// Optional cron expression (e.g. "0 0 3 * * *" = 03:00 daily). Uses local time.
    pub prune_schedule: Option<String>,
}

impl From<&DatabaseConfig> for RetentionWorkerConfig {
    fn from(db: &DatabaseConfig) -> Self {
        Self {
            retention_days: db.retention_days,
            prune_interval_secs: db.prune_interval_secs,
            prune_schedule: db.prune_schedule.clone(),
        }
    }
}

/// Spawns the retention worker. Returns a join handle.
pub fn spawn(
    store: Arc<SqliteFactStore>,
    config: RetentionWorkerConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        run(store, config).await;
    })
}

#[instrument(skip(store), fields(retention_days = config.retention_days))]
async fn run(store: Arc<SqliteFactStore>, config: RetentionWorkerConfig) {
    let (tick_tx, mut tick_rx) = tokio::sync::mpsc::channel::<()>(1);
    tokio::spawn(prune_scheduler(config.clone(), tick_tx));

    while tick_rx.recv().await.is_some() {
        match prune_once(&store, config.retention_days, Utc::now()).await {
            Ok(0) => {}
            Ok(removed) => {
                info!(removed, "pruned expired fact documents");
                if let Err(e) = store.vacuum().await {
                    warn!(error = %e, "vacuum failed");
                }
            }
            Err(e) => warn!(error = %e, "prune failed"),
        }
    }
}

/// Sends a message on `tx` at each prune time (cron or fixed interval).
async fn prune_scheduler(config: RetentionWorkerConfig, tx: tokio::sync::mpsc::Sender<()>) {
    if let Some(ref cron_str) = config.prune_schedule {
        let Ok(schedule) = cron::Schedule::from_str(cron_str) else {
            warn!(cron = %cron_str, "invalid prune_schedule; pruning will not run");
            return;
        };
        loop {
            let now = chrono::Local::now();
            if let Some(next) = schedule.after(&now).next() {
                let delay = (next - now).to_std().unwrap_or(Duration::from_secs(1));
                tokio::time::sleep(delay).await;
                if tx.send(()).await.is_err() {
                    break;
                }
            } else {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        }
    } else {
        let interval = Duration::from_secs(config.prune_interval_secs);
        loop {
            tokio::time::sleep(interval).await;
            if tx.send(()).await.is_err() {
                break;
            }
        }
    }
}

/// Remove documents older than `retention_days` before `now`. Returns rows removed.
pub async fn prune_once(
    store: &SqliteFactStore,
    retention_days: u32,
    now: DateTime<Utc>,
) -> Result<u64, StoreError> {
    let cutoff = now - TimeDelta::days(retention_days as i64);
    store.prune_older_than(cutoff).await
}
