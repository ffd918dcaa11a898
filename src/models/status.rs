//! Daily reachability status rows and the compact per-day wire item.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Color code for a day's outcome.
///
/// `0` = failure or no data, `1` = success, `2` = reserved (the schema
/// permits it for forward compatibility but the monitor never writes it).
pub const COLOR_FAILURE: i64 = 0;
/// Color code for a successful day.
pub const COLOR_SUCCESS: i64 = 1;

/// A persisted daily status row. One per `(entity, UTC day)`.
#[derive(Debug, Clone, FromRow)]
pub struct DailyStatus {
    /// Row identifier.
    pub id: i64,
    /// The monitored entity this row belongs to.
    pub entity_id: i64,
    /// UTC calendar day of the probe.
    pub date: NaiveDate,
    /// Day color, see [`COLOR_FAILURE`] / [`COLOR_SUCCESS`].
    pub color: i64,
    /// Number of probe attempts executed; 0 when the address failed to parse.
    pub attempts: i64,
    /// Whether any attempt succeeded.
    pub success: bool,
    /// Error from the last failing attempt, if any.
    pub error_msg: Option<String>,
    /// Round-trip time of the successful attempt.
    pub response_time_ms: Option<i64>,
    /// Chain height reported by the endpoint (JSON-RPC probes only).
    pub blockchain_height: Option<i64>,
    /// Row creation (or last upsert) timestamp.
    pub created_at: DateTime<Utc>,
}

/// Payload for recording one day's probe outcome.
#[derive(Debug, Clone)]
pub struct NewDailyStatus {
    /// The monitored entity.
    pub entity_id: i64,
    /// UTC calendar day.
    pub date: NaiveDate,
    /// Day color.
    pub color: i64,
    /// Attempts executed.
    pub attempts: i64,
    /// Whether the probe succeeded.
    pub success: bool,
    /// Error from the last failing attempt.
    pub error_msg: Option<String>,
    /// Round-trip time of the successful attempt.
    pub response_time_ms: Option<i64>,
    /// Reported chain height, JSON-RPC only.
    pub blockchain_height: Option<i64>,
}

/// One element of the dense 30-day series returned to API clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusItem {
    /// Day color; 0 also fills days with no recorded row.
    pub color: i64,
    /// The day, formatted `YYYY-MM-DD`.
    pub date: String,
}
