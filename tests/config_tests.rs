// Config loading and validation tests

use cf_analytics_exporter::config::AppConfig;
use cf_analytics_exporter::scheduler::SchedulerConfig;
use std::time::Duration;

const VALID_CONFIG: &str = r#"
[api]
endpoint = "https://api.cloudflare.com/client/v4/graphql"
user = "ops@example.com"

[database]
path = "data/cf-analytics.db"
max_pool_size = 4

[zones]
"00000000000000000000000000000000" = "domain.tld"
"11111111111111111111111111111111" = "example.tld"
"#;

#[test]
fn test_config_loads_from_str() {
    let config = AppConfig::load_from_str(VALID_CONFIG).expect("load_from_str");
    assert_eq!(config.api.user, "ops@example.com");
    assert_eq!(config.database.path, "data/cf-analytics.db");
    assert_eq!(config.database.max_pool_size, 4);
    assert_eq!(config.zones.len(), 2);
    assert_eq!(
        config.zones.get("11111111111111111111111111111111").map(String::as_str),
        Some("example.tld")
    );
}

#[test]
fn test_config_defaults() {
    let config = AppConfig::load_from_str(VALID_CONFIG).unwrap();
    assert_eq!(config.api.token_env, "CF_API_TOKEN");
    assert_eq!(config.api.retries, 3);
    assert_eq!(config.api.retry_backoff_ms, 2000);
    assert_eq!(config.api.query_limit, 9999);
    assert_eq!(config.scheduler.fetch_delay_secs, 300);
    assert_eq!(config.scheduler.data_interval_secs, 61);
    assert_eq!(config.scheduler.catchup_sleep_secs, 5);
    assert_eq!(config.scheduler.steady_sleep_secs, 60);
    assert_eq!(config.scheduler.checkpoint_max_age_secs, 608_400);
    assert_eq!(config.scheduler.failure_backoff_secs, 0);
    assert_eq!(config.database.retention_days, 90);
    assert!(config.database.prune_schedule.is_none());
    assert!(!config.admission.enabled);
    assert_eq!(config.admission.poll_interval_secs, 300);
    assert_eq!(config.admission.cluster_env, "LOCAL_CLUSTER");
}

#[test]
fn test_scheduler_config_from_app_config() {
    let toml = format!(
        "{VALID_CONFIG}\n[scheduler]\nfetch_delay_secs = 120\ncatchup_sleep_secs = 2\n\n[admission]\npoll_interval_secs = 30\n"
    );
    let config = AppConfig::load_from_str(&toml).unwrap();
    let sched = SchedulerConfig::from_app_config(&config);
    assert_eq!(sched.cursor.fetch_delay().num_seconds(), 120);
    assert_eq!(sched.cursor.data_interval().num_seconds(), 61);
    assert_eq!(sched.catchup_sleep, Duration::from_secs(2));
    assert_eq!(sched.steady_sleep, Duration::from_secs(60));
    assert_eq!(sched.admission_poll_interval, Duration::from_secs(30));
    assert_eq!(sched.zones.len(), 2);
}

#[test]
fn test_config_validation_rejects_empty_endpoint() {
    let bad = VALID_CONFIG.replace(
        "endpoint = \"https://api.cloudflare.com/client/v4/graphql\"",
        "endpoint = \"\"",
    );
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("api.endpoint"));
}

#[test]
fn test_config_validation_rejects_empty_db_path() {
    let bad = VALID_CONFIG.replace("path = \"data/cf-analytics.db\"", "path = \"\"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("database.path"));
}

#[test]
fn test_config_validation_rejects_max_pool_size_zero() {
    let bad = VALID_CONFIG.replace("max_pool_size = 4", "max_pool_size = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("max_pool_size"));
}

#[test]
fn test_config_validation_rejects_zero_data_interval() {
    let bad = format!("{VALID_CONFIG}\n[scheduler]\ndata_interval_secs = 0\n");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("scheduler.data_interval_secs"));
}

#[test]
fn test_config_validation_rejects_empty_zones() {
    let bad = r#"
[api]
endpoint = "https://api.cloudflare.com/client/v4/graphql"
user = "ops@example.com"

[database]
path = "data/cf-analytics.db"
max_pool_size = 4

[zones]
"#;
    let err = AppConfig::load_from_str(bad).unwrap_err();
    assert!(err.to_string().contains("zones"));
}

#[test]
fn test_config_validation_requires_uri_when_admission_enabled() {
    let bad = format!("{VALID_CONFIG}\n[admission]\nenabled = true\n");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("admission.uri"));

    let ok = format!("{VALID_CONFIG}\n[admission]\nenabled = true\nuri = \"https://admission.local/\"\n");
    assert!(AppConfig::load_from_str(&ok).unwrap().admission.enabled);
}

#[test]
fn test_config_rejects_missing_api_section() {
    let bad = VALID_CONFIG.replace("[api]", "[apx]");
    assert!(AppConfig::load_from_str(&bad).is_err());
}

#[test]
fn test_config_rejects_invalid_toml() {
    assert!(AppConfig::load_from_str("[api\nendpoint = ").is_err());
}
