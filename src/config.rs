use std::collections::BTreeMap;

use serde::Deserialize;

use crate::window::{DEFAULT_DATA_INTERVAL_SECS, DEFAULT_FETCH_DELAY_SECS};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub admission: AdmissionConfig,
    /// Zone id → zone name.
    pub zones: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub endpoint: String,
    /// Sent as X-AUTH-EMAIL.
    pub user: String,
    /// Name of the environment variable holding the bearer token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Base delay between attempts; attempt n waits n times this.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_query_limit")]
    pub query_limit: u32,
}

fn default_token_env() -> String {
    "CF_API_TOKEN".into()
}

fn default_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    2000
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_query_limit() -> u32 {
    9999
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    #[serde(default = "default_fetch_delay_secs")]
    pub fetch_delay_secs: u64,
    /// Query window length; one second longer than a bucket.
    #[serde(default = "default_data_interval_secs")]
    pub data_interval_secs: u64,
    #[serde(default = "default_catchup_sleep_secs")]
    pub catchup_sleep_secs: u64,
    #[serde(default = "default_steady_sleep_secs")]
    pub steady_sleep_secs: u64,
    /// Checkpoints older than this are ignored on startup.
    #[serde(default = "default_checkpoint_max_age_secs")]
    pub checkpoint_max_age_secs: u64,
    /// Log an alert every N consecutive failures on the same window.
    #[serde(default = "default_alert_after_failures")]
    pub alert_after_failures: u32,
    /// Pause before retrying a failed window. 0 retries immediately.
    #[serde(default)]
    pub failure_backoff_secs: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            fetch_delay_secs: default_fetch_delay_secs(),
            data_interval_secs: default_data_interval_secs(),
            catchup_sleep_secs: default_catchup_sleep_secs(),
            steady_sleep_secs: default_steady_sleep_secs(),
            checkpoint_max_age_secs: default_checkpoint_max_age_secs(),
            alert_after_failures: default_alert_after_failures(),
            failure_backoff_secs: 0,
        }
    }
}

fn default_fetch_delay_secs() -> u64 {
    DEFAULT_FETCH_DELAY_SECS
}

fn default_data_interval_secs() -> u64 {
    DEFAULT_DATA_INTERVAL_SECS
}

fn default_catchup_sleep_secs() -> u64 {
    5
}

fn default_steady_sleep_secs() -> u64 {
    60
}

fn default_checkpoint_max_age_secs() -> u64 {
    608_400
}

fn default_alert_after_failures() -> u32 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_pool_size: u32,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Prune every N seconds when prune_schedule is not set.
    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,
    /// Optional cron expression for pruning (e.g. "0 0 3 * * *"). Uses local time.
    #[serde(default)]
    pub prune_schedule: Option<String>,
}

fn default_retention_days() -> u32 {
    90
}

fn default_prune_interval_secs() -> u64 {
    3600
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdmissionConfig {
    /// When false every admission check passes.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub uri: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_cluster_env")]
    pub cluster_env: String,
    #[serde(default = "default_namespace_env")]
    pub namespace_env: String,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            uri: String::new(),
            poll_interval_secs: default_poll_interval_secs(),
            cluster_env: default_cluster_env(),
            namespace_env: default_namespace_env(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    300
}

fn default_cluster_env() -> String {
    "LOCAL_CLUSTER".into()
}

fn default_namespace_env() -> String {
    "LOCAL_NAMESPACE".into()
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.api.endpoint.is_empty(), "api.endpoint must be non-empty");
        anyhow::ensure!(!self.api.token_env.is_empty(), "api.token_env must be non-empty");
        anyhow::ensure!(
            self.api.timeout_secs > 0,
            "api.timeout_secs must be > 0, got {}",
            self.api.timeout_secs
        );
        anyhow::ensure!(
            self.api.query_limit > 0,
            "api.query_limit must be > 0, got {}",
            self.api.query_limit
        );
        anyhow::ensure!(
            self.scheduler.data_interval_secs > 0,
            "scheduler.data_interval_secs must be > 0, got {}",
            self.scheduler.data_interval_secs
        );
        anyhow::ensure!(
            self.scheduler.steady_sleep_secs > 0,
            "scheduler.steady_sleep_secs must be > 0, got {}",
            self.scheduler.steady_sleep_secs
        );
        anyhow::ensure!(
            self.scheduler.checkpoint_max_age_secs > 0,
            "scheduler.checkpoint_max_age_secs must be > 0, got {}",
            self.scheduler.checkpoint_max_age_secs
        );
        anyhow::ensure!(
            self.scheduler.alert_after_failures > 0,
            "scheduler.alert_after_failures must be > 0, got {}",
            self.scheduler.alert_after_failures
        );
        anyhow::ensure!(
            !self.database.path.is_empty(),
            "database.path must be non-empty"
        );
        anyhow::ensure!(
            self.database.max_pool_size > 0,
            "database.max_pool_size must be > 0, got {}",
            self.database.max_pool_size
        );
        anyhow::ensure!(
            self.database.retention_days > 0,
            "database.retention_days must be > 0, got {}",
            self.database.retention_days
        );
        anyhow::ensure!(
            self.database.prune_interval_secs > 0,
            "database.prune_interval_secs must be > 0, got {}",
            self.database.prune_interval_secs
        );
        if self.admission.enabled {
            anyhow::ensure!(
                !self.admission.uri.is_empty(),
                "admission.uri must be non-empty when admission.enabled is true"
            );
        }
        anyhow::ensure!(
            self.admission.poll_interval_secs > 0,
            "admission.poll_interval_secs must be > 0, got {}",
            self.admission.poll_interval_secs
        );
        anyhow::ensure!(!self.zones.is_empty(), "zones must contain at least one zone");
        Ok(())
    }
}
