// Row <-> FactDocument conversion. Metrics are stored as INTEGER (i64).

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::error::StoreError;
use crate::models::{DataType, FactDocument};

pub(super) const SELECT_COLUMNS: &str = "data_type, data_key, zone_id, zone_name, timestamp, uniques, bytes, cached_bytes, cached_requests, encrypted_bytes, encrypted_requests, page_views, requests";

pub(super) fn to_db(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_db(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

pub(super) fn timestamp_from_secs(secs: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| StoreError::Schema(format!("timestamp {secs} out of range")))
}

pub(super) fn parse_document(row: &SqliteRow) -> Result<FactDocument, StoreError> {
    let data_type: String = row.try_get("data_type")?;
    let data_type = DataType::from_name(&data_type)
        .ok_or_else(|| StoreError::Schema(format!("unknown data_type {data_type:?}")))?;
    let timestamp: i64 = row.try_get("timestamp")?;
    Ok(FactDocument {
        data_type,
        data_key: row.try_get("data_key")?,
        zone_id: row.try_get("zone_id")?,
        zone_name: row.try_get("zone_name")?,
        timestamp: timestamp_from_secs(timestamp)?,
        uniques: from_db(row.try_get("uniques")?),
        bytes: from_db(row.try_get("bytes")?),
        cached_bytes: from_db(row.try_get("cached_bytes")?),
        cached_requests: from_db(row.try_get("cached_requests")?),
        encrypted_bytes: from_db(row.try_get("encrypted_bytes")?),
        encrypted_requests: from_db(row.try_get("encrypted_requests")?),
        page_views: from_db(row.try_get("page_views")?),
        requests: from_db(row.try_get("requests")?),
    })
}
