//! SQLite persistence: the shared connection pool and one typed repository
//! per table family. Repositories exclusively own the store handle; the rest
//! of the crate never sees SQL.

pub mod bootstrap;
pub mod error;
pub mod peers;
pub mod registrations;
pub mod servers;
pub mod snapshots;
pub mod status;
pub mod traits;

use std::str::FromStr;

use sqlx::{
    sqlite,
    sqlite::SqliteConnectOptions,
    SqlitePool,
};

pub use bootstrap::SqliteBootstrapRepository;
pub use error::PersistenceError;
pub use peers::SqlitePeerRepository;
pub use registrations::SqliteRegistrationRepository;
pub use servers::{NewServer, SqliteGrpcServerRepository, SqliteJsonRpcServerRepository};
pub use snapshots::SqliteSnapshotRepository;
pub use status::SqliteStatusRepository;
pub use traits::{MonitoredEntity, RosterRepository};

/// The SQLite database handle: owns the pool and runs migrations.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (and creates, if missing) the database at `database_url`.
    #[tracing::instrument(level = "info")]
    pub async fn connect(database_url: &str) -> Result<Self, PersistenceError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(sqlx::Error::from)?
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        tracing::info!(database_url, "connected to database");
        Ok(Self { pool })
    }

    /// Opens a single-connection in-memory database. A pooled `:memory:`
    /// database gives every connection its own empty store, so the pool is
    /// capped at one connection here. Intended for tests and one-shot use.
    pub async fn connect_in_memory() -> Result<Self, PersistenceError> {
        let options =
            SqliteConnectOptions::from_str("sqlite::memory:").map_err(sqlx::Error::from)?;
        let pool = sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Applies pending schema migrations.
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn run_migrations(&self) -> Result<(), PersistenceError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }

    /// A clone of the underlying pool for constructing repositories.
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    /// Closes the pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("database pool closed");
    }
}
