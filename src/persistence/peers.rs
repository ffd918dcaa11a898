//! Repository for crawler-discovered reachable peers.

use chrono::Utc;
use sqlx::SqlitePool;

use super::error::PersistenceError;
use crate::models::{peer::PeerSighting, CountryStats, GeoLocation, ReachablePeer};

mod peer_sql {
    pub const SELECT_COLUMNS: &str = "id, peer_id, address, protocol, user_agent, last_seen, \
         first_seen, ip_address, country, country_code, city, latitude, longitude, timezone, \
         asn, organization, is_reachable, connection_attempts, successful_connections, \
         overall_score, created_at, updated_at";

    pub const COUNT_REACHABLE: &str =
        "SELECT COUNT(*) FROM reachable_peers WHERE is_reachable = 1";

    pub const COUNT_COUNTRIES: &str =
        "SELECT COUNT(DISTINCT country_code) FROM reachable_peers WHERE country_code != ''";

    pub const AVG_UPTIME: &str =
        "SELECT COALESCE(AVG(overall_score), 0.0) FROM reachable_peers WHERE is_reachable = 1";

    pub const TOP_COUNTRIES: &str = "SELECT country, country_code, COUNT(*) AS count \
         FROM reachable_peers \
         WHERE is_reachable = 1 AND country != '' \
         GROUP BY country, country_code \
         ORDER BY count DESC \
         LIMIT ?";

    /// The crawler reports sightings; the counters and the derived score are
    /// maintained here so the tracker can read them without re-aggregating.
    pub const UPSERT_SIGHTING: &str = "INSERT INTO reachable_peers \
         (peer_id, address, protocol, user_agent, last_seen, first_seen, is_reachable, \
          connection_attempts, successful_connections, overall_score, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?, ?) \
         ON CONFLICT (peer_id) DO UPDATE SET \
             address = excluded.address, \
             protocol = excluded.protocol, \
             user_agent = excluded.user_agent, \
             last_seen = excluded.last_seen, \
             is_reachable = excluded.is_reachable, \
             connection_attempts = reachable_peers.connection_attempts + 1, \
             successful_connections = reachable_peers.successful_connections \
                 + excluded.successful_connections, \
             overall_score = ROUND(100.0 * (reachable_peers.successful_connections \
                 + excluded.successful_connections) \
                 / (reachable_peers.connection_attempts + 1), 2), \
             updated_at = excluded.updated_at";

    pub const UPDATE_GEO: &str = "UPDATE reachable_peers SET ip_address = ?, country = ?, \
         country_code = ?, city = ?, latitude = ?, longitude = ?, timezone = ?, asn = ?, \
         organization = ?, updated_at = ? WHERE id = ?";
}

/// SQLite-backed access to the `reachable_peers` table.
#[derive(Debug, Clone)]
pub struct SqlitePeerRepository {
    pool: SqlitePool,
}

impl SqlitePeerRepository {
    /// Creates a repository over the shared pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All currently reachable peers, most recently seen first.
    pub async fn reachable_peers(&self) -> Result<Vec<ReachablePeer>, PersistenceError> {
        let sql = format!(
            "SELECT {} FROM reachable_peers WHERE is_reachable = 1 ORDER BY last_seen DESC",
            peer_sql::SELECT_COLUMNS,
        );
        let peers = sqlx::query_as::<_, ReachablePeer>(&sql).fetch_all(&self.pool).await?;
        Ok(peers)
    }

    /// The peer owning a network-level peer id, if known.
    pub async fn peer_by_peer_id(
        &self,
        peer_id: &str,
    ) -> Result<Option<ReachablePeer>, PersistenceError> {
        let sql = format!(
            "SELECT {} FROM reachable_peers WHERE peer_id = ?",
            peer_sql::SELECT_COLUMNS,
        );
        let peer = sqlx::query_as::<_, ReachablePeer>(&sql)
            .bind(peer_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(peer)
    }

    /// Number of currently reachable peers.
    pub async fn count_reachable(&self) -> Result<i64, PersistenceError> {
        let count = sqlx::query_scalar::<_, i64>(peer_sql::COUNT_REACHABLE)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Distinct non-empty country codes across all peers.
    pub async fn count_countries(&self) -> Result<i64, PersistenceError> {
        let count = sqlx::query_scalar::<_, i64>(peer_sql::COUNT_COUNTRIES)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Mean score across reachable peers; 0 when there are none.
    pub async fn avg_uptime(&self) -> Result<f64, PersistenceError> {
        let avg = sqlx::query_scalar::<_, f64>(peer_sql::AVG_UPTIME)
            .fetch_one(&self.pool)
            .await?;
        Ok(avg)
    }

    /// Countries ranked by reachable-peer count, descending.
    pub async fn top_countries(&self, limit: i64) -> Result<Vec<CountryStats>, PersistenceError> {
        let rows: Vec<(String, String, i64)> = sqlx::query_as(peer_sql::TOP_COUNTRIES)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(country, country_code, count)| CountryStats { country, country_code, count })
            .collect())
    }

    /// Records a crawler sighting, creating the peer on first contact and
    /// bumping the connection counters and derived score afterwards.
    #[tracing::instrument(skip(self, sighting), fields(peer_id = %sighting.peer_id), level = "debug")]
    pub async fn upsert_sighting(&self, sighting: &PeerSighting) -> Result<(), PersistenceError> {
        let successful = i64::from(sighting.connected);
        sqlx::query(peer_sql::UPSERT_SIGHTING)
            .bind(&sighting.peer_id)
            .bind(&sighting.address)
            .bind(&sighting.protocol)
            .bind(&sighting.user_agent)
            .bind(sighting.seen_at)
            .bind(sighting.seen_at)
            .bind(sighting.connected)
            .bind(successful)
            .bind(100.0 * successful as f64)
            .bind(Utc::now())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Stores a resolved location (and the IP it came from) on a peer.
    pub async fn update_geo(
        &self,
        id: i64,
        ip: &str,
        geo: &GeoLocation,
    ) -> Result<(), PersistenceError> {
        sqlx::query(peer_sql::UPDATE_GEO)
            .bind(ip)
            .bind(&geo.country)
            .bind(&geo.country_code)
            .bind(&geo.city)
            .bind(geo.latitude)
            .bind(geo.longitude)
            .bind(&geo.timezone)
            .bind(&geo.asn)
            .bind(&geo.org)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
