// Analytics API payload: viewer → zones → one-minute groups.
// `sum` is kept as a raw JSON object; the normalizer reads it through its field tables.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The `data` object of a zone-totals query response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateResponse {
    #[serde(default)]
    pub viewer: Option<Viewer>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Viewer {
    #[serde(default)]
    pub zones: Option<Vec<ZoneGroups>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZoneGroups {
    #[serde(rename = "zoneTag", default)]
    pub zone_tag: Option<String>,
    #[serde(rename = "httpRequests1mGroups", default)]
    pub groups: Option<Vec<MinuteGroup>>,
}

/// One one-minute bucket for a zone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MinuteGroup {
    #[serde(default)]
    pub dimensions: Option<GroupDimensions>,
    /// Base sums plus the dimension maps (`responseStatusMap`, `countryMap`, ...).
    #[serde(default)]
    pub sum: Option<Map<String, Value>>,
    #[serde(default)]
    pub uniq: Option<Uniq>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupDimensions {
    /// Bucket start, `%Y-%m-%dT%H:%M:%SZ`.
    #[serde(default)]
    pub datetime: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Uniq {
    /// Read leniently like the `sum` fields.
    #[serde(default)]
    pub uniques: Option<Value>,
}
