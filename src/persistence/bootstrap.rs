//! Repository for the bootstrap-node roster.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, SqlitePool};

use super::{
    error::PersistenceError,
    traits::RosterRepository,
};
use crate::{
    models::{BootstrapNode, GeoLocation},
    monitor::roster::BootstrapRosterEntry,
};

mod node_sql {
    pub const SELECT_ACTIVE: &str = "SELECT id, name, email, website, address, overall_score, \
         is_active, country, country_code, city, latitude, longitude, created_at, updated_at \
         FROM bootstrap_nodes WHERE is_active = 1 ORDER BY id";

    pub const UPSERT_ROSTER_ENTRY: &str = "INSERT INTO bootstrap_nodes \
         (name, email, website, address, is_active, created_at, updated_at) \
         VALUES (?, ?, ?, ?, 1, ?, ?) \
         ON CONFLICT (address) DO UPDATE SET \
             name = excluded.name, \
             email = excluded.email, \
             website = excluded.website, \
             is_active = 1, \
             updated_at = excluded.updated_at";

    pub const EXISTS_BY_ADDRESS: &str =
        "SELECT EXISTS(SELECT 1 FROM bootstrap_nodes WHERE address = ?)";

    pub const COUNT_ACTIVE: &str = "SELECT COUNT(*) FROM bootstrap_nodes WHERE is_active = 1";

    pub const UPDATE_GEO: &str = "UPDATE bootstrap_nodes SET country = ?, country_code = ?, \
         city = ?, latitude = ?, longitude = ?, updated_at = ? WHERE id = ?";

    /// Percent of successful daily rows over the trailing 30 UTC days;
    /// entities with no rows in the window score 0.
    pub const UPDATE_ALL_SCORES: &str = "UPDATE bootstrap_nodes SET \
         overall_score = COALESCE(( \
             SELECT ROUND(SUM(s.success) * 100.0 / COUNT(*), 2) \
             FROM daily_status AS s \
             WHERE s.node_id = bootstrap_nodes.id \
               AND s.date >= date('now', '-30 day') \
         ), 0), \
         updated_at = ? \
         WHERE is_active = 1";
}

/// SQLite-backed access to the `bootstrap_nodes` table.
#[derive(Debug, Clone)]
pub struct SqliteBootstrapRepository {
    pool: SqlitePool,
}

impl SqliteBootstrapRepository {
    /// Creates a repository over the shared pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All active nodes, ordered by id.
    pub async fn active_nodes(&self) -> Result<Vec<BootstrapNode>, PersistenceError> {
        let nodes = sqlx::query_as::<_, BootstrapNode>(node_sql::SELECT_ACTIVE)
            .fetch_all(&self.pool)
            .await?;
        Ok(nodes)
    }

    /// Inserts a roster entry, or refreshes its mutable fields and reactivates
    /// it when the address already exists.
    #[tracing::instrument(skip(self, entry), fields(address = %entry.address), level = "debug")]
    pub async fn upsert_roster_entry(
        &self,
        entry: &BootstrapRosterEntry,
    ) -> Result<(), PersistenceError> {
        let now = Utc::now();
        sqlx::query(node_sql::UPSERT_ROSTER_ENTRY)
            .bind(&entry.name)
            .bind(&entry.email)
            .bind(&entry.website)
            .bind(&entry.address)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Whether any node (active or not) owns this address.
    pub async fn exists_by_address(&self, address: &str) -> Result<bool, PersistenceError> {
        let exists = sqlx::query_scalar::<_, bool>(node_sql::EXISTS_BY_ADDRESS)
            .bind(address)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// Number of active nodes.
    pub async fn active_count(&self) -> Result<i64, PersistenceError> {
        let count = sqlx::query_scalar::<_, i64>(node_sql::COUNT_ACTIVE)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Deactivates every active node whose address is not in `keep`.
    /// Returns the number of nodes deactivated. Rows and history remain.
    #[tracing::instrument(skip_all, level = "debug")]
    pub async fn deactivate_missing(&self, keep: &[String]) -> Result<u64, PersistenceError> {
        let mut qb: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("UPDATE bootstrap_nodes SET is_active = 0, updated_at = ");
        qb.push_bind(Utc::now());
        qb.push(" WHERE is_active = 1");
        if !keep.is_empty() {
            qb.push(" AND address NOT IN (");
            let mut addresses = qb.separated(", ");
            for address in keep {
                addresses.push_bind(address);
            }
            qb.push(")");
        }
        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Stores a resolved location on a node.
    pub async fn update_geo(&self, id: i64, geo: &GeoLocation) -> Result<(), PersistenceError> {
        sqlx::query(node_sql::UPDATE_GEO)
            .bind(&geo.country)
            .bind(&geo.country_code)
            .bind(&geo.city)
            .bind(geo.latitude)
            .bind(geo.longitude)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RosterRepository for SqliteBootstrapRepository {
    type Entity = BootstrapNode;

    async fn active_entities(&self) -> Result<Vec<BootstrapNode>, PersistenceError> {
        self.active_nodes().await
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn update_all_scores(&self) -> Result<(), PersistenceError> {
        sqlx::query(node_sql::UPDATE_ALL_SCORES)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
