//! Repository for user-submitted node registrations.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::error::PersistenceError;
use crate::models::{NodeRegistration, NodeType, Network, RegistrationStatus};

/// Fields of a fresh registration submission.
#[derive(Debug, Clone)]
pub struct NewRegistration {
    /// Proposed endpoint class.
    pub node_type: NodeType,
    /// Display name.
    pub name: String,
    /// Endpoint address.
    pub address: String,
    /// Network the endpoint serves.
    pub network: Network,
    /// Contact email.
    pub email: String,
    /// Operator website.
    pub website: String,
}

mod registration_sql {
    pub const SELECT_COLUMNS: &str = "id, node_type, name, address, network, email, website, \
         status, rejection_reason, created_at, reviewed_at, reviewed_by";

    pub const INSERT: &str = "INSERT INTO node_registrations \
         (node_type, name, address, network, email, website, status, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, 'pending', ?) \
         RETURNING id";

    /// A registration whose status is not `rejected` still owns its address.
    pub const EXISTS_ACTIVE_BY_ADDRESS: &str = "SELECT EXISTS(SELECT 1 FROM node_registrations \
         WHERE address = ? AND status != 'rejected')";

    pub const MARK_REVIEWED: &str = "UPDATE node_registrations SET status = ?, \
         rejection_reason = ?, reviewed_by = ?, reviewed_at = ? WHERE id = ?";
}

/// SQLite-backed access to the `node_registrations` table.
#[derive(Debug, Clone)]
pub struct SqliteRegistrationRepository {
    pool: SqlitePool,
}

impl SqliteRegistrationRepository {
    /// Creates a repository over the shared pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Stores a pending registration and returns its id.
    #[tracing::instrument(skip(self, registration), fields(address = %registration.address), level = "debug")]
    pub async fn create(&self, registration: &NewRegistration) -> Result<i64, PersistenceError> {
        let id = sqlx::query_scalar::<_, i64>(registration_sql::INSERT)
            .bind(registration.node_type)
            .bind(&registration.name)
            .bind(&registration.address)
            .bind(registration.network)
            .bind(&registration.email)
            .bind(&registration.website)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    /// The registration with the given id, if any.
    pub async fn get(&self, id: i64) -> Result<Option<NodeRegistration>, PersistenceError> {
        let sql = format!(
            "SELECT {} FROM node_registrations WHERE id = ?",
            registration_sql::SELECT_COLUMNS,
        );
        let registration = sqlx::query_as::<_, NodeRegistration>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(registration)
    }

    /// All registrations in a given state, oldest first.
    pub async fn by_status(
        &self,
        status: RegistrationStatus,
    ) -> Result<Vec<NodeRegistration>, PersistenceError> {
        let sql = format!(
            "SELECT {} FROM node_registrations WHERE status = ? ORDER BY created_at",
            registration_sql::SELECT_COLUMNS,
        );
        let registrations = sqlx::query_as::<_, NodeRegistration>(&sql)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;
        Ok(registrations)
    }

    /// Whether a non-rejected registration already owns this address.
    pub async fn exists_active_by_address(
        &self,
        address: &str,
    ) -> Result<bool, PersistenceError> {
        let exists = sqlx::query_scalar::<_, bool>(registration_sql::EXISTS_ACTIVE_BY_ADDRESS)
            .bind(address)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// Records the moderation outcome on a registration.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn mark_reviewed(
        &self,
        id: i64,
        status: RegistrationStatus,
        rejection_reason: &str,
        reviewed_by: &str,
        reviewed_at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        sqlx::query(registration_sql::MARK_REVIEWED)
            .bind(status)
            .bind(rejection_reason)
            .bind(reviewed_by)
            .bind(reviewed_at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
