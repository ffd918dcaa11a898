//! gRPC and JSON-RPC server entities: publicly reachable endpoints exposing
//! the blockchain's administrative APIs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::status::StatusItem;

/// The network a public server belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Network {
    /// The production network.
    Mainnet,
    /// The public test network.
    Testnet,
}

impl Network {
    /// Canonical lowercase name, as stored and as accepted on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A public gRPC server from the monitored roster.
#[derive(Debug, Clone, FromRow)]
pub struct GrpcServer {
    /// Unique identifier assigned by the store.
    pub id: i64,
    /// Display name; roster syncs default this to the address.
    pub name: String,
    /// `host:port` endpoint, unique across the roster.
    pub address: String,
    /// Network the server serves.
    pub network: Network,
    /// Operator contact email.
    pub email: String,
    /// Operator website.
    pub website: String,
    /// Rolling 30-day health score, 0..=100.
    pub overall_score: f64,
    /// Active-roster flag; soft-delete.
    pub is_active: bool,
    /// Resolved country name.
    pub country: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country_code: String,
    /// Resolved city.
    pub city: String,
    /// Latitude, 0 when unknown.
    pub latitude: f64,
    /// Longitude, 0 when unknown.
    pub longitude: f64,
    /// Row creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A public JSON-RPC server from the monitored roster.
///
/// Same shape as [`GrpcServer`] plus the operator-verification flag.
#[derive(Debug, Clone, FromRow)]
pub struct JsonRpcServer {
    /// Unique identifier assigned by the store.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// HTTP(S) endpoint URL, unique across the roster.
    pub address: String,
    /// Network the server serves.
    pub network: Network,
    /// Operator contact email.
    pub email: String,
    /// Operator website.
    pub website: String,
    /// Rolling 30-day health score, 0..=100.
    pub overall_score: f64,
    /// Active-roster flag; soft-delete.
    pub is_active: bool,
    /// Whether the operator's ownership of the endpoint has been verified.
    pub is_verified: bool,
    /// Resolved country name.
    pub country: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country_code: String,
    /// Resolved city.
    pub city: String,
    /// Latitude, 0 when unknown.
    pub latitude: f64,
    /// Longitude, 0 when unknown.
    pub longitude: f64,
    /// Row creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Wire shape for a public server (gRPC or JSON-RPC) with its 30-day series.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerResponse {
    /// Store identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Endpoint address.
    pub address: String,
    /// Network served.
    pub network: Network,
    /// Contact email.
    pub email: String,
    /// Operator website.
    pub website: String,
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

impl ServerResponse {
    /// Combines a gRPC server with its dense status series.
    pub fn from_grpc(server: GrpcServer, status: Vec<StatusItem>) -> Self {
        Self {
            id: server.id,
            name: server.name,
            address: server.address,
            network: server.network,
            email: server.email,
            website: server.website,
            country: server.country,
            city: server.city,
            latitude: server.latitude,
            longitude: server.longitude,
            status,
            overall_score: server.overall_score,
        }
    }

    /// Combines a JSON-RPC server with its dense status series.
    pub fn from_jsonrpc(server: JsonRpcServer, status: Vec<StatusItem>) -> Self {
        Self {
            id: server.id,
            name: server.name,
            address: server.address,
            network: server.network,
            email: server.email,
            website: server.website,
            country: server.country,
            city: server.city,
            latitude: server.latitude,
            longitude: server.longitude,
            status,
            overall_score: server.overall_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_round_trips_through_serde() {
        let json = serde_json::to_string(&Network::Mainnet).unwrap();
        assert_eq!(json, "\"mainnet\"");
        let back: Network = serde_json::from_str("\"testnet\"").unwrap();
        assert_eq!(back, Network::Testnet);
    }

    #[test]
    fn network_rejects_unknown_values() {
        assert!(serde_json::from_str::<Network>("\"devnet\"").is_err());
    }
}
