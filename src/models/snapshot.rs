//! Network-wide aggregate shapes: stats reports, map nodes, and persisted
//! point-in-time snapshots.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Node count per country, used in the top-countries ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryStats {
    /// Country name.
    pub country: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country_code: String,
    /// Number of reachable peers in the country.
    pub count: i64,
}

/// The current network-wide aggregate counts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatsReport {
    /// Sum of reachable peers and active servers of every class.
    pub total_nodes: i64,
    /// Reachable peer count.
    pub reachable_nodes: i64,
    /// Distinct countries across reachable peers.
    pub countries_count: i64,
    /// Mean score across reachable peers.
    pub avg_uptime: f64,
    /// Top countries by reachable-peer count, at most 10.
    pub top_countries: Vec<CountryStats>,
    /// Active gRPC server count.
    pub grpc_nodes: i64,
    /// Active JSON-RPC server count.
    pub jsonrpc_nodes: i64,
    /// Active bootstrap node count.
    pub bootstrap_nodes: i64,
}

/// A node placed on the world map. Only entities with a geo fix are listed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapNode {
    /// Store identifier within its class.
    pub id: i64,
    /// Display name; peer names are the truncated peer id.
    pub name: String,
    /// Entity class: `bootstrap`, `grpc`, `jsonrpc`, or `peer`.
    #[serde(rename = "type")]
    pub node_type: String,
    /// `[latitude, longitude]`.
    pub coordinates: [f64; 2],
    /// `online` or `offline`.
    pub status: String,
    /// Country name.
    pub country: String,
    /// City, omitted when empty.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub city: String,
}

/// A persisted point-in-time snapshot of the aggregate counts.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSnapshot {
    /// Row identifier.
    pub id: i64,
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
    /// Total node count at snapshot time.
    pub total_nodes: i64,
    /// Reachable peer count at snapshot time.
    pub reachable_nodes: i64,
    /// Distinct-country count at snapshot time.
    pub countries_count: i64,
    /// Active gRPC server count.
    pub grpc_nodes: i64,
    /// Active JSON-RPC server count.
    pub jsonrpc_nodes: i64,
    /// Active bootstrap node count.
    pub bootstrap_nodes: i64,
    /// Reserved per-snapshot detail; currently always `{}`.
    pub snapshot_data: sqlx::types::Json<serde_json::Value>,
    /// Row creation timestamp.
    pub created_at: DateTime<Utc>,
}
