//! Repositories for the gRPC and JSON-RPC server rosters.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, SqlitePool};

use super::{
    error::PersistenceError,
    traits::RosterRepository,
};
use crate::models::{GeoLocation, GrpcServer, JsonRpcServer, Network};

/// Fields for promoting an endpoint into a monitored server table.
#[derive(Debug, Clone)]
pub struct NewServer {
    /// Display name.
    pub name: String,
    /// Endpoint address.
    pub address: String,
    /// Network the server serves.
    pub network: Network,
    /// Operator contact email.
    pub email: String,
    /// Operator website.
    pub website: String,
    /// Resolved location, when the lookup succeeded.
    pub geo: Option<GeoLocation>,
}

mod grpc_sql {
    pub const SELECT_ACTIVE: &str = "SELECT id, name, address, network, email, website, \
         overall_score, is_active, country, country_code, city, latitude, longitude, \
         created_at, updated_at \
         FROM grpc_servers WHERE is_active = 1 ORDER BY id";

    pub const UPSERT_ROSTER_SERVER: &str = "INSERT INTO grpc_servers \
         (name, address, network, is_active, created_at, updated_at) \
         VALUES (?, ?, ?, 1, ?, ?) \
         ON CONFLICT (address) DO UPDATE SET \
             network = excluded.network, \
             is_active = 1, \
             updated_at = excluded.updated_at";

    pub const INSERT_SERVER: &str = "INSERT INTO grpc_servers \
         (name, address, network, email, website, is_active, country, country_code, city, \
          latitude, longitude, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, 1, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT (address) DO NOTHING";

    pub const EXISTS_BY_ADDRESS: &str =
        "SELECT EXISTS(SELECT 1 FROM grpc_servers WHERE address = ?)";

    pub const COUNT_ACTIVE: &str = "SELECT COUNT(*) FROM grpc_servers WHERE is_active = 1";

    pub const UPDATE_GEO: &str = "UPDATE grpc_servers SET country = ?, country_code = ?, \
         city = ?, latitude = ?, longitude = ?, updated_at = ? WHERE id = ?";

    pub const UPDATE_ALL_SCORES: &str = "UPDATE grpc_servers SET \
         overall_score = COALESCE(( \
             SELECT ROUND(SUM(s.success) * 100.0 / COUNT(*), 2) \
             FROM grpc_daily_status AS s \
             WHERE s.server_id = grpc_servers.id \
               AND s.date >= date('now', '-30 day') \
         ), 0), \
         updated_at = ? \
         WHERE is_active = 1";
}

/// SQLite-backed access to the `grpc_servers` table.
#[derive(Debug, Clone)]
pub struct SqliteGrpcServerRepository {
    pool: SqlitePool,
}

impl SqliteGrpcServerRepository {
    /// Creates a repository over the shared pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All active servers, ordered by id.
    pub async fn active_servers(&self) -> Result<Vec<GrpcServer>, PersistenceError> {
        let servers = sqlx::query_as::<_, GrpcServer>(grpc_sql::SELECT_ACTIVE)
            .fetch_all(&self.pool)
            .await?;
        Ok(servers)
    }

    /// Inserts a roster server (named after its address), or refreshes its
    /// network and reactivates it when the address already exists.
    pub async fn upsert_roster_server(
        &self,
        address: &str,
        network: Network,
    ) -> Result<(), PersistenceError> {
        let now = Utc::now();
        sqlx::query(grpc_sql::UPSERT_ROSTER_SERVER)
            .bind(address)
            .bind(address)
            .bind(network)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Inserts a fully described server (registration approval). A duplicate
    /// address is silently ignored via the unique constraint.
    #[tracing::instrument(skip(self, server), fields(address = %server.address), level = "debug")]
    pub async fn create_server(&self, server: &NewServer) -> Result<(), PersistenceError> {
        let now = Utc::now();
        let geo = server.geo.clone().unwrap_or_default();
        sqlx::query(grpc_sql::INSERT_SERVER)
            .bind(&server.name)
            .bind(&server.address)
            .bind(server.network)
            .bind(&server.email)
            .bind(&server.website)
            .bind(&geo.country)
            .bind(&geo.country_code)
            .bind(&geo.city)
            .bind(geo.latitude)
            .bind(geo.longitude)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Whether any server (active or not) owns this address.
    pub async fn exists_by_address(&self, address: &str) -> Result<bool, PersistenceError> {
        let exists = sqlx::query_scalar::<_, bool>(grpc_sql::EXISTS_BY_ADDRESS)
            .bind(address)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// Number of active servers.
    pub async fn active_count(&self) -> Result<i64, PersistenceError> {
        let count = sqlx::query_scalar::<_, i64>(grpc_sql::COUNT_ACTIVE)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Deactivates every active server whose address is not in `keep`.
    pub async fn deactivate_missing(&self, keep: &[String]) -> Result<u64, PersistenceError> {
        let mut qb: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("UPDATE grpc_servers SET is_active = 0, updated_at = ");
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

    /// Stores a resolved location on a server.
    pub async fn update_geo(&self, id: i64, geo: &GeoLocation) -> Result<(), PersistenceError> {
        sqlx::query(grpc_sql::UPDATE_GEO)
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
impl RosterRepository for SqliteGrpcServerRepository {
    type Entity = GrpcServer;

    async fn active_entities(&self) -> Result<Vec<GrpcServer>, PersistenceError> {
        self.active_servers().await
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn update_all_scores(&self) -> Result<(), PersistenceError> {
        sqlx::query(grpc_sql::UPDATE_ALL_SCORES)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

mod jsonrpc_sql {
    pub const SELECT_ACTIVE: &str = "SELECT id, name, address, network, email, website, \
         overall_score, is_active, is_verified, country, country_code, city, latitude, \
         longitude, created_at, updated_at \
         FROM jsonrpc_servers WHERE is_active = 1 ORDER BY id";

    pub const SELECT_ACTIVE_BY_NETWORK: &str = "SELECT id, name, address, network, email, \
         website, overall_score, is_active, is_verified, country, country_code, city, latitude, \
         longitude, created_at, updated_at \
         FROM jsonrpc_servers WHERE is_active = 1 AND network = ? ORDER BY id";

    pub const INSERT_SERVER: &str = "INSERT INTO jsonrpc_servers \
         (name, address, network, email, website, is_active, country, country_code, city, \
          latitude, longitude, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, 1, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT (address) DO NOTHING";

    pub const EXISTS_BY_ADDRESS: &str =
        "SELECT EXISTS(SELECT 1 FROM jsonrpc_servers WHERE address = ?)";

    pub const COUNT_ACTIVE: &str = "SELECT COUNT(*) FROM jsonrpc_servers WHERE is_active = 1";

    pub const UPDATE_GEO: &str = "UPDATE jsonrpc_servers SET country = ?, country_code = ?, \
         city = ?, latitude = ?, longitude = ?, updated_at = ? WHERE id = ?";

    pub const UPDATE_ALL_SCORES: &str = "UPDATE jsonrpc_servers SET \
         overall_score = COALESCE(( \
             SELECT ROUND(SUM(s.success) * 100.0 / COUNT(*), 2) \
             FROM jsonrpc_daily_status AS s \
             WHERE s.server_id = jsonrpc_servers.id \
               AND s.date >= date('now', '-30 day') \
         ), 0), \
         updated_at = ? \
         WHERE is_active = 1";
}

/// SQLite-backed access to the `jsonrpc_servers` table.
///
/// JSON-RPC servers have no roster source file; rows arrive exclusively
/// through registration approval, so there is no sync-time deactivation.
#[derive(Debug, Clone)]
pub struct SqliteJsonRpcServerRepository {
    pool: SqlitePool,
}

impl SqliteJsonRpcServerRepository {
    /// Creates a repository over the shared pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All active servers, ordered by id.
    pub async fn active_servers(&self) -> Result<Vec<JsonRpcServer>, PersistenceError> {
        let servers = sqlx::query_as::<_, JsonRpcServer>(jsonrpc_sql::SELECT_ACTIVE)
            .fetch_all(&self.pool)
            .await?;
        Ok(servers)
    }

    /// Active servers on one network, ordered by id.
    pub async fn active_servers_by_network(
        &self,
        network: Network,
    ) -> Result<Vec<JsonRpcServer>, PersistenceError> {
        let servers = sqlx::query_as::<_, JsonRpcServer>(jsonrpc_sql::SELECT_ACTIVE_BY_NETWORK)
            .bind(network)
            .fetch_all(&self.pool)
            .await?;
        Ok(servers)
    }

    /// Inserts a fully described server (registration approval). A duplicate
    /// address is silently ignored via the unique constraint.
    #[tracing::instrument(skip(self, server), fields(address = %server.address), level = "debug")]
    pub async fn create_server(&self, server: &NewServer) -> Result<(), PersistenceError> {
        let now = Utc::now();
        let geo = server.geo.clone().unwrap_or_default();
        sqlx::query(jsonrpc_sql::INSERT_SERVER)
            .bind(&server.name)
            .bind(&server.address)
            .bind(server.network)
            .bind(&server.email)
            .bind(&server.website)
            .bind(&geo.country)
            .bind(&geo.country_code)
            .bind(&geo.city)
            .bind(geo.latitude)
            .bind(geo.longitude)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Whether any server (active or not) owns this address.
    pub async fn exists_by_address(&self, address: &str) -> Result<bool, PersistenceError> {
        let exists = sqlx::query_scalar::<_, bool>(jsonrpc_sql::EXISTS_BY_ADDRESS)
            .bind(address)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// Number of active servers.
    pub async fn active_count(&self) -> Result<i64, PersistenceError> {
        let count = sqlx::query_scalar::<_, i64>(jsonrpc_sql::COUNT_ACTIVE)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Stores a resolved location on a server.
    pub async fn update_geo(&self, id: i64, geo: &GeoLocation) -> Result<(), PersistenceError> {
        sqlx::query(jsonrpc_sql::UPDATE_GEO)
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
impl RosterRepository for SqliteJsonRpcServerRepository {
    type Entity = JsonRpcServer;

    async fn active_entities(&self) -> Result<Vec<JsonRpcServer>, PersistenceError> {
        self.active_servers().await
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn update_all_scores(&self) -> Result<(), PersistenceError> {
        sqlx::query(jsonrpc_sql::UPDATE_ALL_SCORES)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
