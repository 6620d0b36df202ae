// Fixed-size query windows over a UTC cursor.
// Upstream finalizes one-minute buckets late, so the cursor never passes `now - fetch_delay`,
// and each window is one second longer than a bucket so boundary records are not lost.

use chrono::{DateTime, TimeDelta, Utc};

pub const DEFAULT_DATA_INTERVAL_SECS: u64 = 61;
pub const DEFAULT_FETCH_DELAY_SECS: u64 = 300;

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// Query interval `[start, start + length)`. `end` is always derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub length: TimeDelta,
}

impl TimeWindow {
    pub fn end(&self) -> DateTime<Utc> {
        self.start + self.length
    }
}

/// Truncate `t` down to a multiple of `granularity` counted from the unix epoch.
/// A non-positive granularity leaves `t` unchanged.
pub fn floor(t: DateTime<Utc>, granularity: TimeDelta) -> DateTime<Utc> {
    let step = granularity.num_seconds() as i128 * NANOS_PER_SEC + granularity.subsec_nanos() as i128;
    if step <= 0 {
        return t;
    }
    let since_epoch = t.timestamp() as i128 * NANOS_PER_SEC + t.timestamp_subsec_nanos() as i128;
    let rem = since_epoch.rem_euclid(step);
    // rem < step, and step came from a TimeDelta, so it fits in i64 nanoseconds
    t - TimeDelta::nanoseconds(rem as i64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCursor {
    data_interval: TimeDelta,
    fetch_delay: TimeDelta,
}

impl Default for WindowCursor {
    fn default() -> Self {
        Self::from_secs(DEFAULT_DATA_INTERVAL_SECS, DEFAULT_FETCH_DELAY_SECS)
    }
}

impl WindowCursor {
    pub fn new(data_interval: TimeDelta, fetch_delay: TimeDelta) -> Self {
        Self {
            data_interval,
            fetch_delay,
        }
    }

    pub fn from_secs(data_interval_secs: u64, fetch_delay_secs: u64) -> Self {
        Self::new(
            TimeDelta::seconds(data_interval_secs as i64),
            TimeDelta::seconds(fetch_delay_secs as i64),
        )
    }

    pub fn data_interval(&self) -> TimeDelta {
        self.data_interval
    }

    pub fn fetch_delay(&self) -> TimeDelta {
        self.fetch_delay
    }

    pub fn advance(&self, window_start: DateTime<Utc>) -> DateTime<Utc> {
        window_start + self.data_interval
    }

    /// Window to request next for `cursor`: start floored to the minute, length = data interval.
    pub fn window_for(&self, cursor: DateTime<Utc>) -> TimeWindow {
        TimeWindow {
            start: floor(cursor, TimeDelta::minutes(1)),
            length: self.data_interval,
        }
    }

    /// Newest point upstream is expected to have finalized.
    pub fn now_delayed(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.fetch_delay
    }

    /// Strictly-less comparison: a window ending exactly at `now_delayed` is caught up.
    pub fn needs_catchup(&self, candidate: DateTime<Utc>, now_delayed: DateTime<Utc>) -> bool {
        self.advance(candidate) < now_delayed
    }
}
