//! Repository for persisted network snapshots.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::error::PersistenceError;
use crate::models::{NetworkSnapshot, NetworkStatsReport};

mod snapshot_sql {
    pub const INSERT: &str = "INSERT INTO network_snapshots \
         (timestamp, total_nodes, reachable_nodes, countries_count, grpc_nodes, jsonrpc_nodes, \
          bootstrap_nodes, snapshot_data, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
         RETURNING id";

    pub const SELECT_RECENT: &str = "SELECT id, timestamp, total_nodes, reachable_nodes, \
         countries_count, grpc_nodes, jsonrpc_nodes, bootstrap_nodes, snapshot_data, created_at \
         FROM network_snapshots ORDER BY timestamp DESC LIMIT ?";
}

/// SQLite-backed access to the `network_snapshots` table.
#[derive(Debug, Clone)]
pub struct SqliteSnapshotRepository {
    pool: SqlitePool,
}

impl SqliteSnapshotRepository {
    /// Creates a repository over the shared pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persists one snapshot row keyed by `timestamp`. The detail blob is
    /// reserved and always written empty. Returns the row id.
    #[tracing::instrument(skip(self, stats), level = "debug")]
    pub async fn create_snapshot(
        &self,
        timestamp: DateTime<Utc>,
        stats: &NetworkStatsReport,
    ) -> Result<i64, PersistenceError> {
        let id = sqlx::query_scalar::<_, i64>(snapshot_sql::INSERT)
            .bind(timestamp)
            .bind(stats.total_nodes)
            .bind(stats.reachable_nodes)
            .bind(stats.countries_count)
            .bind(stats.grpc_nodes)
            .bind(stats.jsonrpc_nodes)
            .bind(stats.bootstrap_nodes)
            .bind("{}")
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    /// The most recent snapshots, newest first.
    pub async fn snapshots(&self, limit: i64) -> Result<Vec<NetworkSnapshot>, PersistenceError> {
        let snapshots = sqlx::query_as::<_, NetworkSnapshot>(snapshot_sql::SELECT_RECENT)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(snapshots)
    }
}
