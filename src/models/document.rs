// Flat fact documents: one base row plus one row per dimension entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which breakdown a fact document belongs to; serializes to camelCase (e.g. "responseStatus").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataType {
    Base,
    ResponseStatus,
    Country,
    SslVersion,
    Browser,
    ContentType,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Base => "base",
            DataType::ResponseStatus => "responseStatus",
            DataType::Country => "country",
            DataType::SslVersion => "sslVersion",
            DataType::Browser => "browser",
            DataType::ContentType => "contentType",
        }
    }

    /// Parse the stored name back (e.g. from a database column).
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "base" => Some(DataType::Base),
            "responseStatus" => Some(DataType::ResponseStatus),
            "country" => Some(DataType::Country),
            "sslVersion" => Some(DataType::SslVersion),
            "browser" => Some(DataType::Browser),
            "contentType" => Some(DataType::ContentType),
            _ => None,
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric fields of a fact document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Uniques,
    Bytes,
    CachedBytes,
    CachedRequests,
    EncryptedBytes,
    EncryptedRequests,
    PageViews,
    Requests,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactDocument {
    pub data_type: DataType,
    pub data_key: String,
    pub zone_id: String,
    /// None when the zone id is not in the configured zone map.
    pub zone_name: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub uniques: u64,
    pub bytes: u64,
    pub cached_bytes: u64,
    pub cached_requests: u64,
    pub encrypted_bytes: u64,
    pub encrypted_requests: u64,
    pub page_views: u64,
    pub requests: u64,
}

impl FactDocument {
    /// A document with every metric zeroed.
    pub fn empty(
        data_type: DataType,
        data_key: impl Into<String>,
        zone_id: impl Into<String>,
        zone_name: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            data_type,
            data_key: data_key.into(),
            zone_id: zone_id.into(),
            zone_name,
            timestamp,
            uniques: 0,
            bytes: 0,
            cached_bytes: 0,
            cached_requests: 0,
            encrypted_bytes: 0,
            encrypted_requests: 0,
            page_views: 0,
            requests: 0,
        }
    }

    pub fn set_metric(&mut self, metric: Metric, value: u64) {
        let slot = match metric {
            Metric::Uniques => &mut self.uniques,
            Metric::Bytes => &mut self.bytes,
            Metric::CachedBytes => &mut self.cached_bytes,
            Metric::CachedRequests => &mut self.cached_requests,
            Metric::EncryptedBytes => &mut self.encrypted_bytes,
            Metric::EncryptedRequests => &mut self.encrypted_requests,
            Metric::PageViews => &mut self.page_views,
            Metric::Requests => &mut self.requests,
        };
        *slot = value;
    }

    pub fn metric(&self, metric: Metric) -> u64 {
        match metric {
            Metric::Uniques => self.uniques,
            Metric::Bytes => self.bytes,
            Metric::CachedBytes => self.cached_bytes,
            Metric::CachedRequests => self.cached_requests,
            Metric::EncryptedBytes => self.encrypted_bytes,
            Metric::EncryptedRequests => self.encrypted_requests,
            Metric::PageViews => self.page_views,
            Metric::Requests => self.requests,
        }
    }
}
