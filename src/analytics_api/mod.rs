// Zone analytics over GraphQL. One POST per window; transient failures are retried here,
// so callers only see the final outcome.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::config::ApiConfig;
use crate::error::FetchError;
use crate::models::AggregateResponse;
use crate::version;
use crate::window::TimeWindow;

pub const ZONE_TOTALS_QUERY: &str = include_str!("zone_totals.graphql");

/// Query variable time format (second precision, explicit UTC suffix).
pub const QUERY_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

const MAX_ERROR_BODY_CHARS: usize = 512;

/// Source of per-minute zone aggregates.
#[async_trait]
pub trait AnalyticsSource: Send + Sync {
    async fn fetch(
        &self,
        window: &TimeWindow,
        zone_ids: &[String],
    ) -> Result<AggregateResponse, FetchError>;
}

pub struct GraphQlClient {
    http: reqwest::Client,
    endpoint: String,
    user: String,
    token: String,
    retries: u32,
    retry_backoff: Duration,
    query_limit: u32,
}

impl GraphQlClient {
    /// Build a client reading the bearer token from `config.token_env`.
    pub fn from_env(config: &ApiConfig) -> Result<Self, FetchError> {
        let token = std::env::var(&config.token_env)
            .map_err(|_| FetchError::MissingCredentials(config.token_env.clone()))?;
        Self::new(config, token)
    }

    pub fn new(config: &ApiConfig, token: String) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(format!("{}/{}", version::NAME, version::VERSION))
            .build()?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            user: config.user.clone(),
            token,
            retries: config.retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            query_limit: config.query_limit,
        })
    }

    async fn send_once(&self, body: &Value) -> Result<String, FetchError> {
        let resp = self
            .http
            .post(&self.endpoint)
            .header("X-AUTH-EMAIL", &self.user)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Auth {
                status: status.as_u16(),
            });
        }
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl AnalyticsSource for GraphQlClient {
    #[instrument(skip(self, zone_ids), fields(operation = "fetch_analytics", zones = zone_ids.len()))]
    async fn fetch(
        &self,
        window: &TimeWindow,
        zone_ids: &[String],
    ) -> Result<AggregateResponse, FetchError> {
        let body = request_body(window, zone_ids, self.query_limit);
        debug!(variables = %body["variables"], "querying analytics API");
        let mut attempt: u32 = 0;
        loop {
            match self.send_once(&body).await {
                Ok(text) => return decode_response(&text),
                Err(e) if attempt < self.retries && is_retryable(&e) => {
                    attempt += 1;
                    warn!(error = %e, attempt, retries = self.retries, "analytics request failed; retrying");
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn is_retryable(e: &FetchError) -> bool {
    match e {
        FetchError::Transport(_) => true,
        FetchError::Status { status, .. } => {
            *status >= 500 || *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
        }
        _ => false,
    }
}

/// Variables for the zone-totals query: `[mintime, maxtime)` plus the zone filter.
pub fn query_variables(window: &TimeWindow, zone_ids: &[String], limit: u32) -> Value {
    json!({
        "limit": limit,
        "mintime": window.start.format(QUERY_TIME_FORMAT).to_string(),
        "maxtime": window.end().format(QUERY_TIME_FORMAT).to_string(),
        "zoneIDs": zone_ids,
    })
}

pub fn request_body(window: &TimeWindow, zone_ids: &[String], limit: u32) -> Value {
    json!({
        "query": ZONE_TOTALS_QUERY,
        "variables": query_variables(window, zone_ids, limit),
    })
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<AggregateResponse>,
    #[serde(default)]
    errors: Option<Vec<ErrorEntry>>,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    #[serde(default)]
    message: String,
}

/// Decode a GraphQL response body. Reported errors win over partial data.
pub fn decode_response(body: &str) -> Result<AggregateResponse, FetchError> {
    let envelope: Envelope =
        serde_json::from_str(body).map_err(|e| FetchError::Malformed(e.to_string()))?;
    if let Some(errors) = envelope.errors.filter(|errs| !errs.is_empty()) {
        let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
        return Err(FetchError::GraphQl(messages.join("; ")));
    }
    envelope
        .data
        .ok_or_else(|| FetchError::Malformed("response has no data".into()))
}
