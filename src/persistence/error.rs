//! Error types for the persistence layer.

use thiserror::Error;

/// Errors that can occur in the persistence layer.
///
/// "Not found" is not represented here: single-row getters return
/// `Ok(None)` instead, so only genuine store failures surface as errors.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// A store operation failed.
    #[error("store operation failed: {0}")]
    Database(#[from] sqlx::Error),

    /// A schema migration failed.
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}
