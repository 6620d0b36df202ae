// Single-writer admission: decides whether this instance may fetch and persist.
// Any failure to determine admission resolves to "not active".

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::config::AdmissionConfig;
use crate::version;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait AdmissionCheck: Send + Sync {
    async fn is_active(&self) -> bool;
}

/// Used when admission checking is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysActive;

#[async_trait]
impl AdmissionCheck for AlwaysActive {
    async fn is_active(&self) -> bool {
        true
    }
}

/// Asks a remote endpoint whether the local cluster/namespace is the designated writer.
pub struct HttpAdmissionCheck {
    http: reqwest::Client,
    uri: String,
    cluster: String,
    namespace: String,
}

impl HttpAdmissionCheck {
    pub fn new(
        uri: impl Into<String>,
        cluster: impl Into<String>,
        namespace: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(format!("{}/{}", version::NAME, version::VERSION))
            .build()?;
        Ok(Self {
            http,
            uri: uri.into(),
            cluster: cluster.into(),
            namespace: namespace.into(),
        })
    }

    /// Cluster and namespace are read from the env vars named in `config`; unset reads as empty.
    pub fn from_config(config: &AdmissionConfig) -> anyhow::Result<Self> {
        let cluster = std::env::var(&config.cluster_env).unwrap_or_default();
        let namespace = std::env::var(&config.namespace_env).unwrap_or_default();
        Self::new(config.uri.clone(), cluster, namespace)
    }
}

#[async_trait]
impl AdmissionCheck for HttpAdmissionCheck {
    async fn is_active(&self) -> bool {
        let resp = self
            .http
            .get(&self.uri)
            .query(&[("cluster", &self.cluster), ("namespace", &self.namespace)])
            .send()
            .await;
        let body = match resp {
            Ok(r) => r.text().await,
            Err(e) => Err(e),
        };
        match body {
            Ok(text) => is_affirmative(&text),
            Err(e) => {
                warn!(error = %e, operation = "admission_check", "admission request failed; treating as inactive");
                false
            }
        }
    }
}

/// Admission answer is `true` in any case, surrounding whitespace ignored.
pub fn is_affirmative(body: &str) -> bool {
    body.trim().eq_ignore_ascii_case("true")
}

/// Build the admission check selected by config.
pub fn from_config(config: &AdmissionConfig) -> anyhow::Result<Arc<dyn AdmissionCheck>> {
    if config.enabled {
        Ok(Arc::new(HttpAdmissionCheck::from_config(config)?))
    } else {
        Ok(Arc::new(AlwaysActive))
    }
}
