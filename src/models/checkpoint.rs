// Resume point recovered from the store.

use chrono::{DateTime, TimeDelta, Utc};

/// Timestamp of the most recently persisted fact document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pub timestamp: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self { timestamp }
    }

    /// True when the checkpoint is older than `max_age` relative to `now`.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: TimeDelta) -> bool {
        now - max_age > self.timestamp
    }
}
