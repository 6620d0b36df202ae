// Incremental fetch scheduler.
// Waits for admission, bootstraps the store, resumes from the latest checkpoint, then runs
// fetch → normalize → persist one window at a time. A failed window is retried with the
// same cursor; losing admission ends the loop.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::oneshot;
use tracing::{debug, error, info, instrument, warn};

use crate::admission::AdmissionCheck;
use crate::analytics_api::AnalyticsSource;
use crate::clock::Clock;
use crate::config::{AppConfig, SchedulerSettings};
use crate::datastore::FactStore;
use crate::error::{StepError, StoreError};
use crate::normalizer;
use crate::window::{TimeWindow, WindowCursor};

/// Collaborators the scheduler drives.
pub struct SchedulerDeps {
    pub source: Arc<dyn AnalyticsSource>,
    pub store: Arc<dyn FactStore>,
    pub admission: Arc<dyn AdmissionCheck>,
    pub clock: Arc<dyn Clock>,
}

/// Timing and zone config, built once from AppConfig.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub cursor: WindowCursor,
    /// Zone id → zone name; the keys are the zones queried.
    pub zones: BTreeMap<String, String>,
    pub catchup_sleep: Duration,
    pub steady_sleep: Duration,
    pub admission_poll_interval: Duration,
    pub checkpoint_max_age: TimeDelta,
    pub alert_after_failures: u32,
    pub failure_backoff: Duration,
}

impl SchedulerConfig {
    pub fn from_settings(
        settings: &SchedulerSettings,
        admission_poll_interval_secs: u64,
        zones: BTreeMap<String, String>,
    ) -> Self {
        Self {
            cursor: WindowCursor::from_secs(settings.data_interval_secs, settings.fetch_delay_secs),
            zones,
            catchup_sleep: Duration::from_secs(settings.catchup_sleep_secs),
            steady_sleep: Duration::from_secs(settings.steady_sleep_secs),
            admission_poll_interval: Duration::from_secs(admission_poll_interval_secs),
            checkpoint_max_age: TimeDelta::seconds(settings.checkpoint_max_age_secs as i64),
            alert_after_failures: settings.alert_after_failures.max(1),
            failure_backoff: Duration::from_secs(settings.failure_backoff_secs),
        }
    }

    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::from_settings(
            &config.scheduler,
            config.admission.poll_interval_secs,
            config.zones.clone(),
        )
    }
}

/// Result of one fetch-and-persist iteration.
#[derive(Debug)]
pub enum StepOutcome {
    /// Window stored; `cursor` advanced and the caller should sleep `sleep`.
    Persisted {
        cursor: DateTime<Utc>,
        documents: usize,
        sleep: Duration,
    },
    /// Nothing stored; `cursor` is the one passed in.
    Failed {
        cursor: DateTime<Utc>,
        error: StepError,
    },
}

impl StepOutcome {
    pub fn cursor(&self) -> DateTime<Utc> {
        match self {
            StepOutcome::Persisted { cursor, .. } | StepOutcome::Failed { cursor, .. } => *cursor,
        }
    }

    /// None after a failure: the same window is retried without waiting.
    pub fn sleep(&self) -> Option<Duration> {
        match self {
            StepOutcome::Persisted { sleep, .. } => Some(*sleep),
            StepOutcome::Failed { .. } => None,
        }
    }
}

/// Consecutive failed steps. Every `alert_every`-th failure in a row raises an alert;
/// a successful step starts the count over.
#[derive(Debug, Clone)]
pub struct FailureStreak {
    count: u64,
    alert_every: u64,
}

impl FailureStreak {
    pub fn new(alert_every: u32) -> Self {
        Self {
            count: 0,
            alert_every: u64::from(alert_every.max(1)),
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Returns true when this failure should be alerted on.
    pub fn record_failure(&mut self) -> bool {
        self.count += 1;
        self.count % self.alert_every == 0
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }
}

/// Why the run loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    AdmissionLost,
    Shutdown,
}

pub struct Scheduler {
    deps: SchedulerDeps,
    config: SchedulerConfig,
    zone_ids: Vec<String>,
}

impl Scheduler {
    pub fn new(deps: SchedulerDeps, config: SchedulerConfig) -> Self {
        let zone_ids = config.zones.keys().cloned().collect();
        Self {
            deps,
            config,
            zone_ids,
        }
    }

    /// One fetch-and-persist iteration starting from `cursor`.
    pub async fn step(&self, cursor: DateTime<Utc>) -> StepOutcome {
        let window = self.config.cursor.window_for(cursor);
        match self.fetch_and_persist(&window).await {
            Ok(documents) => {
                let next = window.end();
                let now_delayed = self.config.cursor.now_delayed(self.deps.clock.now());
                let sleep = if self.config.cursor.needs_catchup(next, now_delayed) {
                    info!(documents, cursor = %next, "still behind; using short wait interval");
                    self.config.catchup_sleep
                } else {
                    info!(documents, cursor = %next, "up to date; sleeping");
                    self.config.steady_sleep
                };
                StepOutcome::Persisted {
                    cursor: next,
                    documents,
                    sleep,
                }
            }
            Err(error) => {
                warn!(
                    error = %error,
                    window_start = %window.start,
                    window_end = %window.end(),
                    operation = "fetch_and_persist",
                    "window failed; will retry"
                );
                StepOutcome::Failed { cursor, error }
            }
        }
    }

    async fn fetch_and_persist(&self, window: &TimeWindow) -> Result<usize, StepError> {
        debug!(window_start = %window.start, window_end = %window.end(), "fetching window");
        let response = self.deps.source.fetch(window, &self.zone_ids).await?;
        let docs = normalizer::normalize(&response, &self.config.zones)?;
        info!(documents = docs.len(), "indexing documents");
        self.deps.store.bulk_write(&docs).await?;
        Ok(docs.len())
    }

    /// Block until admitted. Returns false if shutdown was requested first.
    pub async fn wait_for_admission(&self, shutdown: &mut oneshot::Receiver<()>) -> bool {
        info!("checking whether this instance is allowed to run");
        loop {
            if self.deps.admission.is_active().await {
                info!("admitted; proceeding with startup");
                return true;
            }
            info!(
                retry_in_secs = self.config.admission_poll_interval.as_secs(),
                "not admitted; this instance is not the designated writer"
            );
            if sleep_or_shutdown(self.config.admission_poll_interval, shutdown).await {
                return false;
            }
        }
    }

    /// Resume point: a fresh checkpoint if the store has one, else `now - fetch_delay`.
    pub async fn initial_cursor(&self) -> DateTime<Utc> {
        let now = self.deps.clock.now();
        let fallback = self.config.cursor.now_delayed(now);
        match self.deps.store.find_latest_checkpoint().await {
            Ok(Some(checkpoint)) if !checkpoint.is_stale(now, self.config.checkpoint_max_age) => {
                info!(checkpoint = %checkpoint.timestamp, "resuming from stored checkpoint");
                checkpoint.timestamp
            }
            Ok(Some(checkpoint)) => {
                info!(checkpoint = %checkpoint.timestamp, cursor = %fallback, "stored checkpoint is stale; starting from now");
                fallback
            }
            Ok(None) => {
                info!(cursor = %fallback, "no stored checkpoint; starting from now");
                fallback
            }
            Err(e) => {
                warn!(error = %e, operation = "find_latest_checkpoint", "unable to determine checkpoint; starting from now");
                fallback
            }
        }
    }

    /// Full lifecycle: admission wait, schema bootstrap, resume, fetch loop.
    #[instrument(skip_all, name = "scheduler")]
    pub async fn run(&self, mut shutdown: oneshot::Receiver<()>) -> Result<ExitReason, StoreError> {
        if !self.wait_for_admission(&mut shutdown).await {
            return Ok(ExitReason::Shutdown);
        }
        self.deps.store.ensure_schema_ready().await?;

        let mut cursor = self.initial_cursor().await;
        let mut failures = FailureStreak::new(self.config.alert_after_failures);
        loop {
            if shutdown_requested(&mut shutdown) {
                info!("shutdown requested; stopping scheduler");
                return Ok(ExitReason::Shutdown);
            }
            if !self.deps.admission.is_active().await {
                warn!("admission lost; stopping scheduler");
                return Ok(ExitReason::AdmissionLost);
            }

            let outcome = self.step(cursor).await;
            cursor = outcome.cursor();
            let pause = match outcome.sleep() {
                Some(sleep) => {
                    failures.reset();
                    Some(sleep)
                }
                None => {
                    if failures.record_failure() {
                        error!(
                            consecutive_failures = failures.count(),
                            cursor = %cursor,
                            "window keeps failing; data is not being exported"
                        );
                    }
                    (!self.config.failure_backoff.is_zero()).then_some(self.config.failure_backoff)
                }
            };
            if let Some(pause) = pause
                && sleep_or_shutdown(pause, &mut shutdown).await
            {
                info!("shutdown requested; stopping scheduler");
                return Ok(ExitReason::Shutdown);
            }
        }
    }
}

/// Spawns the scheduler task. Returns a join handle.
pub fn spawn(
    scheduler: Scheduler,
    shutdown: oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<Result<ExitReason, StoreError>> {
    tokio::spawn(async move { scheduler.run(shutdown).await })
}

/// Sleep for `duration`; returns true if shutdown fired (or its sender was dropped) first.
async fn sleep_or_shutdown(duration: Duration, shutdown: &mut oneshot::Receiver<()>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = shutdown => true,
    }
}

fn shutdown_requested(shutdown: &mut oneshot::Receiver<()>) -> bool {
    !matches!(shutdown.try_recv(), Err(oneshot::error::TryRecvError::Empty))
}
