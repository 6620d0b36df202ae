// Nested zone-totals response → flat fact documents.
// Per (zone, bucket): one base document, then one document per dimension-map entry
// in DIMENSIONS order. Each dimension only fills the metrics listed in its table row;
// everything else stays zero. Missing or null numbers count as zero.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::NormalizationError;
use crate::models::{AggregateResponse, DataType, FactDocument, Metric, MinuteGroup};

const BUCKET_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const BASE_KEY: &str = "base";
const UNKNOWN_KEY: &str = "unknown";

/// How one dimension map inside `sum` turns into documents.
#[derive(Debug)]
pub struct DimensionSpec {
    pub data_type: DataType,
    /// Field in `sum` holding the list of entries.
    pub map_field: &'static str,
    /// Entry field used as `dataKey`.
    pub key_field: &'static str,
    /// Document metric ← entry field.
    pub metrics: &'static [(Metric, &'static str)],
}

/// Base document metrics ← `sum` fields. `uniques` comes from `uniq.uniques`.
pub const BASE_METRICS: &[(Metric, &str)] = &[
    (Metric::Bytes, "bytes"),
    (Metric::CachedBytes, "cachedBytes"),
    (Metric::CachedRequests, "cachedRequests"),
    (Metric::EncryptedBytes, "encryptedBytes"),
    (Metric::EncryptedRequests, "encryptedRequests"),
    (Metric::PageViews, "pageViews"),
    (Metric::Requests, "requests"),
];

pub const DIMENSIONS: [DimensionSpec; 5] = [
    DimensionSpec {
        data_type: DataType::ResponseStatus,
        map_field: "responseStatusMap",
        key_field: "edgeResponseStatus",
        metrics: &[(Metric::Requests, "requests")],
    },
    DimensionSpec {
        data_type: DataType::Country,
        map_field: "countryMap",
        key_field: "clientCountryName",
        metrics: &[(Metric::Requests, "requests"), (Metric::Bytes, "bytes")],
    },
    DimensionSpec {
        data_type: DataType::SslVersion,
        map_field: "clientSSLMap",
        key_field: "clientSSLProtocol",
        metrics: &[(Metric::Requests, "requests")],
    },
    DimensionSpec {
        data_type: DataType::Browser,
        map_field: "browserMap",
        key_field: "uaBrowserFamily",
        metrics: &[(Metric::PageViews, "pageViews")],
    },
    DimensionSpec {
        data_type: DataType::ContentType,
        map_field: "contentTypeMap",
        key_field: "edgeResponseContentTypeName",
        metrics: &[(Metric::Requests, "requests"), (Metric::Bytes, "bytes")],
    },
];

/// Flatten `response` into fact documents. `zone_names` maps zone id → display name.
pub fn normalize(
    response: &AggregateResponse,
    zone_names: &BTreeMap<String, String>,
) -> Result<Vec<FactDocument>, NormalizationError> {
    let zones = response
        .viewer
        .as_ref()
        .ok_or(NormalizationError::MissingStructure("viewer"))?
        .zones
        .as_ref()
        .ok_or(NormalizationError::MissingStructure("viewer.zones"))?;

    let mut docs = Vec::new();
    for zone in zones {
        let zone_id = match zone.zone_tag.as_deref() {
            Some(tag) => tag,
            None => {
                warn!(operation = "normalize", "zone entry without zoneTag; using \"{UNKNOWN_KEY}\"");
                UNKNOWN_KEY
            }
        };
        let zone_name = zone_names.get(zone_id).cloned();
        for group in zone.groups.iter().flatten() {
            let timestamp = bucket_timestamp(group)?;
            docs.push(base_document(zone_id, &zone_name, timestamp, group));
            let Some(sum) = group.sum.as_ref() else {
                continue;
            };
            for spec in &DIMENSIONS {
                push_dimension(&mut docs, spec, sum, zone_id, &zone_name, timestamp);
            }
        }
    }
    Ok(docs)
}

fn bucket_timestamp(group: &MinuteGroup) -> Result<DateTime<Utc>, NormalizationError> {
    let raw = group
        .dimensions
        .as_ref()
        .and_then(|d| d.datetime.as_deref())
        .ok_or(NormalizationError::MissingStructure("dimensions.datetime"))?;
    NaiveDateTime::parse_from_str(raw, BUCKET_DATETIME_FORMAT)
        .map(|naive| naive.and_utc())
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc)))
        .map_err(|_| NormalizationError::InvalidTimestamp(raw.to_string()))
}

fn base_document(
    zone_id: &str,
    zone_name: &Option<String>,
    timestamp: DateTime<Utc>,
    group: &MinuteGroup,
) -> FactDocument {
    let mut doc = FactDocument::empty(DataType::Base, BASE_KEY, zone_id, zone_name.clone(), timestamp);
    if let Some(sum) = group.sum.as_ref() {
        for &(metric, field) in BASE_METRICS {
            doc.set_metric(metric, count(sum.get(field)));
        }
    }
    doc.uniques = count(group.uniq.as_ref().and_then(|u| u.uniques.as_ref()));
    doc
}

fn push_dimension(
    docs: &mut Vec<FactDocument>,
    spec: &DimensionSpec,
    sum: &Map<String, Value>,
    zone_id: &str,
    zone_name: &Option<String>,
    timestamp: DateTime<Utc>,
) {
    let Some(Value::Array(entries)) = sum.get(spec.map_field) else {
        return;
    };
    for entry in entries {
        let key = dimension_key(entry.get(spec.key_field));
        let mut doc = FactDocument::empty(spec.data_type, key, zone_id, zone_name.clone(), timestamp);
        for &(metric, field) in spec.metrics {
            doc.set_metric(metric, count(entry.get(field)));
        }
        docs.push(doc);
    }
}

/// Status codes arrive as numbers, everything else as strings.
fn dimension_key(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => UNKNOWN_KEY.to_string(),
    }
}

/// Non-negative integer or float, truncated. Anything else counts as zero.
fn count(value: Option<&Value>) -> u64 {
    value
        .and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f as u64)))
        .unwrap_or(0)
}
