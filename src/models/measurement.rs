use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub id: i64,
    pub weight: f64,
    pub height: f64,
    pub head_circumference: f64,
    pub time: DateTime<Utc>,
    pub author: String,
}

/// True when `time` is strictly later than every entry in `history`.
///
/// Equal timestamps do not count as later. An empty history always yields
/// true.
pub fn is_latest(time: DateTime<Utc>, history: &[Measurement]) -> bool {
    history.iter().all(|m| time > m.time)
}
