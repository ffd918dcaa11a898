//! Reachable peers discovered by the upstream crawler.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// A peer discovered by the crawler and considered live within a recent
/// window. The tracker reads and geo-enriches these rows; probing and the
/// connection counters are owned by the crawler.
#[derive(Debug, Clone, FromRow)]
pub struct ReachablePeer {
    /// Unique identifier assigned by the store.
    pub id: i64,
    /// Network-level peer identifier, unique.
    pub peer_id: String,
    /// Last observed multiaddress.
    pub address: String,
    /// Protocol tag reported by the peer.
    pub protocol: String,
    /// User-agent string reported by the peer.
    pub user_agent: String,
    /// When the crawler last saw the peer.
    pub last_seen: DateTime<Utc>,
    /// When the crawler first saw the peer.
    pub first_seen: DateTime<Utc>,
    /// Resolved IP address, empty when unknown.
    pub ip_address: String,
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
    /// IANA timezone of the resolved location.
    pub timezone: String,
    /// Autonomous system of the resolved IP.
    pub asn: String,
    /// Organization owning the resolved IP.
    pub organization: String,
    /// Whether the peer answered the crawler's last connection attempt.
    pub is_reachable: bool,
    /// Crawler connection attempts to date.
    pub connection_attempts: i64,
    /// Successful crawler connections to date.
    pub successful_connections: i64,
    /// Rolling health score, 0..=100.
    pub overall_score: f64,
    /// Row creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Fields the crawler supplies when reporting a peer sighting.
#[derive(Debug, Clone)]
pub struct PeerSighting {
    /// Network-level peer identifier.
    pub peer_id: String,
    /// Observed multiaddress.
    pub address: String,
    /// Protocol tag.
    pub protocol: String,
    /// User-agent string.
    pub user_agent: String,
    /// Sighting time.
    pub seen_at: DateTime<Utc>,
    /// Whether the connection attempt succeeded.
    pub connected: bool,
}
