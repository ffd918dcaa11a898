//! The daily-status repository, parameterized by table so one implementation
//! serves every entity class.

use std::collections::HashMap;

use chrono::{Days, NaiveDate, Utc};
use sqlx::SqlitePool;

use super::error::PersistenceError;
use crate::models::status::{DailyStatus, NewDailyStatus, StatusItem, COLOR_FAILURE};

/// SQLite-backed access to one daily-status table.
///
/// All four status tables share a shape; only the table name and the
/// entity foreign-key column differ, so the SQL is built per instance.
#[derive(Debug, Clone)]
pub struct SqliteStatusRepository {
    pool: SqlitePool,
    table: &'static str,
    entity_column: &'static str,
}

impl SqliteStatusRepository {
    /// The bootstrap-node status table.
    pub fn bootstrap(pool: SqlitePool) -> Self {
        Self { pool, table: "daily_status", entity_column: "node_id" }
    }

    /// The gRPC-server status table.
    pub fn grpc(pool: SqlitePool) -> Self {
        Self { pool, table: "grpc_daily_status", entity_column: "server_id" }
    }

    /// The JSON-RPC-server status table.
    pub fn jsonrpc(pool: SqlitePool) -> Self {
        Self { pool, table: "jsonrpc_daily_status", entity_column: "server_id" }
    }

    /// The reachable-peer status table.
    pub fn peers(pool: SqlitePool) -> Self {
        Self { pool, table: "peer_daily_status", entity_column: "peer_id" }
    }

    /// Records one day's probe outcome. Idempotent per `(entity, date)`:
    /// a re-probe on the same UTC day overwrites the prior row, last writer
    /// wins. Returns the row id.
    #[tracing::instrument(
        skip(self, status),
        fields(table = self.table, entity_id = status.entity_id, date = %status.date),
        level = "debug"
    )]
    pub async fn create_status(&self, status: &NewDailyStatus) -> Result<i64, PersistenceError> {
        let sql = format!(
            "INSERT INTO {table} ({entity}, date, color, attempts, success, error_msg, \
                 response_time_ms, blockchain_height, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT ({entity}, date) DO UPDATE SET \
                 color = excluded.color, \
                 attempts = excluded.attempts, \
                 success = excluded.success, \
                 error_msg = excluded.error_msg, \
                 response_time_ms = excluded.response_time_ms, \
                 blockchain_height = excluded.blockchain_height, \
                 created_at = excluded.created_at \
             RETURNING id",
            table = self.table,
            entity = self.entity_column,
        );
        let id = sqlx::query_scalar::<_, i64>(&sql)
            .bind(status.entity_id)
            .bind(status.date)
            .bind(status.color)
            .bind(status.attempts)
            .bind(status.success)
            .bind(&status.error_msg)
            .bind(status.response_time_ms)
            .bind(status.blockchain_height)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    /// Whether a row already exists for the entity on the given day.
    pub async fn has_status_for_date(
        &self,
        entity_id: i64,
        date: NaiveDate,
    ) -> Result<bool, PersistenceError> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {table} WHERE {entity} = ? AND date = ?)",
            table = self.table,
            entity = self.entity_column,
        );
        let exists = sqlx::query_scalar::<_, bool>(&sql)
            .bind(entity_id)
            .bind(date)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// The row for an entity on a given day, if any.
    pub async fn status_for_date(
        &self,
        entity_id: i64,
        date: NaiveDate,
    ) -> Result<Option<DailyStatus>, PersistenceError> {
        let sql = format!(
            "SELECT id, {entity} AS entity_id, date, color, attempts, success, error_msg, \
                 response_time_ms, blockchain_height, created_at \
             FROM {table} WHERE {entity} = ? AND date = ?",
            table = self.table,
            entity = self.entity_column,
        );
        let status = sqlx::query_as::<_, DailyStatus>(&sql)
            .bind(entity_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;
        Ok(status)
    }

    /// The dense series of the entity's last `days` days, chronologically
    /// ordered from `today - (days-1)` through today (UTC). Days without a
    /// recorded row are filled with color 0.
    pub async fn recent_statuses(
        &self,
        entity_id: i64,
        days: u64,
    ) -> Result<Vec<StatusItem>, PersistenceError> {
        let today = Utc::now().date_naive();
        let start = today
            .checked_sub_days(Days::new(days.saturating_sub(1)))
            .unwrap_or(today);
        let sql = format!(
            "SELECT date, color FROM {table} WHERE {entity} = ? AND date >= ?",
            table = self.table,
            entity = self.entity_column,
        );
        let rows: Vec<(NaiveDate, i64)> = sqlx::query_as(&sql)
            .bind(entity_id)
            .bind(start)
            .fetch_all(&self.pool)
            .await?;
        let by_date: HashMap<NaiveDate, i64> = rows.into_iter().collect();

        let series = (0..days)
            .map(|offset| {
                let date = start.checked_add_days(Days::new(offset)).unwrap_or(today);
                StatusItem {
                    color: by_date.get(&date).copied().unwrap_or(COLOR_FAILURE),
                    date: date.format("%Y-%m-%d").to_string(),
                }
            })
            .collect();
        Ok(series)
    }

    /// All rows in the inclusive date range, newest first. Operator tooling.
    pub async fn statuses_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyStatus>, PersistenceError> {
        let sql = format!(
            "SELECT id, {entity} AS entity_id, date, color, attempts, success, error_msg, \
                 response_time_ms, blockchain_height, created_at \
             FROM {table} WHERE date >= ? AND date <= ? ORDER BY date DESC, {entity}",
            table = self.table,
            entity = self.entity_column,
        );
        let statuses = sqlx::query_as::<_, DailyStatus>(&sql)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;
        Ok(statuses)
    }

    /// Deletes rows older than `before`. Returns the number removed.
    /// Operator tooling; the scheduler never prunes.
    pub async fn delete_statuses_before(&self, before: NaiveDate) -> Result<u64, PersistenceError> {
        let sql = format!("DELETE FROM {table} WHERE date < ?", table = self.table);
        let result = sqlx::query(&sql).bind(before).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Number of rows recorded for a given day, across all entities.
    pub async fn count_for_date(&self, date: NaiveDate) -> Result<i64, PersistenceError> {
        let sql = format!("SELECT COUNT(*) FROM {table} WHERE date = ?", table = self.table);
        let count = sqlx::query_scalar::<_, i64>(&sql)
            .bind(date)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
