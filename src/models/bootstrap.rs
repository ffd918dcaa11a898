//! Bootstrap nodes: the well-known seed peers clients use for their initial
//! connection to the network.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::status::StatusItem;

/// A bootstrap node from the monitored roster.
#[derive(Debug, Clone, FromRow)]
pub struct BootstrapNode {
    /// Unique identifier assigned by the store.
    pub id: i64,

    /// Operator-supplied display name.
    pub name: String,

    /// Operator contact email.
    pub email: String,

    /// Operator website.
    pub website: String,

    /// Canonical multiaddress of the node, unique across the roster.
    pub address: String,

    /// Rolling 30-day health score, 0..=100.
    pub overall_score: f64,

    /// Whether the node is part of the active roster. Nodes dropped from the
    /// roster source are deactivated, never deleted.
    pub is_active: bool,

    /// Resolved country name, empty until geo enrichment runs.
    pub country: String,

    /// ISO 3166-1 alpha-2 country code.
    pub country_code: String,

    /// Resolved city.
    pub city: String,

    /// Latitude of the resolved location, 0 when unknown.
    pub latitude: f64,

    /// Longitude of the resolved location, 0 when unknown.
    pub longitude: f64,

    /// Timestamp when the row was created.
    pub created_at: DateTime<Utc>,

    /// Timestamp of the last mutation.
    pub updated_at: DateTime<Utc>,
}

/// Wire shape for a bootstrap node with its 30-day status series.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapNodeResponse {
    /// Store identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// Operator website.
    pub website: String,
    /// Canonical multiaddress.
    pub address: String,
    /// Country name, empty when unresolved.
    pub country: String,
    /// City, empty when unresolved.
    pub city: String,
    /// Latitude, 0 when unresolved.
    pub latitude: f64,
    /// Longitude, 0 when unresolved.
    pub longitude: f64,
    /// Dense 30-day series, today last.
    pub status: Vec<StatusItem>,
    /// Rolling health score.
    pub overall_score: f64,
}

impl BootstrapNodeResponse {
    /// Combines a node with its dense status series.
    pub fn new(node: BootstrapNode, status: Vec<StatusItem>) -> Self {
        Self {
            id: node.id,
            name: node.name,
            email: node.email,
            website: node.website,
            address: node.address,
            country: node.country,
            city: node.city,
            latitude: node.latitude,
            longitude: node.longitude,
            status,
            overall_score: node.overall_score,
        }
    }
}
