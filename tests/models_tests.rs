// Model tests: data type names, metric slots, checkpoint staleness

mod common;

use cf_analytics_exporter::models::{Checkpoint, DataType, FactDocument, Metric};
use chrono::TimeDelta;
use common::utc;

#[test]
fn data_type_names_round_trip() {
    for dt in [
        DataType::Base,
        DataType::ResponseStatus,
        DataType::Country,
        DataType::SslVersion,
        DataType::Browser,
        DataType::ContentType,
    ] {
        assert_eq!(DataType::from_name(dt.as_str()), Some(dt));
        assert_eq!(
            serde_json::to_value(dt).unwrap(),
            serde_json::Value::String(dt.as_str().to_string())
        );
    }
    assert_eq!(DataType::from_name("threats"), None);
}

#[test]
fn set_metric_writes_only_that_field() {
    let mut doc = FactDocument::empty(DataType::Browser, "Safari", "z", None, utc("2022-09-20T12:12:00"));
    doc.set_metric(Metric::PageViews, 9);
    assert_eq!(doc.metric(Metric::PageViews), 9);
    assert_eq!(doc.page_views, 9);
    for m in [
        Metric::Uniques,
        Metric::Bytes,
        Metric::CachedBytes,
        Metric::CachedRequests,
        Metric::EncryptedBytes,
        Metric::EncryptedRequests,
        Metric::Requests,
    ] {
        assert_eq!(doc.metric(m), 0);
    }
}

#[test]
fn checkpoint_staleness_bound() {
    let now = utc("2022-09-20T12:00:00");
    let max_age = TimeDelta::days(7);
    assert!(!Checkpoint::new(now - TimeDelta::hours(1)).is_stale(now, max_age));
    assert!(!Checkpoint::new(now - max_age).is_stale(now, max_age));
    assert!(Checkpoint::new(now - TimeDelta::days(10)).is_stale(now, max_age));
}
