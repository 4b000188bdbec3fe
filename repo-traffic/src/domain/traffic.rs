use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One day of page views for a repository, as reported by
/// https://docs.github.com/en/rest/metrics/traffic#get-page-views
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficRecord {
    /// Start of the day the counts refer to, in UTC.
    pub timestamp: DateTime<Utc>,
    /// Total number of views.
    pub count: u64,
    /// Number of unique visitors.
    pub uniques: u64,
}

impl TrafficRecord {
    /// Column names, in the order `Serialize` emits the fields.
    pub const FIELDS: [&'static str; 3] = ["timestamp", "count", "uniques"];
}
