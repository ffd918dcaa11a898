//! The supervisor wires every component together and manages the process
//! lifecycle: config in, repositories and services built, scheduler and
//! JSON-RPC server running, graceful shutdown on SIGINT/SIGTERM.

use std::{path::PathBuf, sync::Arc};

use thiserror::Error;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::{
    config::AppConfig,
    context::Metrics,
    geo::GeoCache,
    monitor::{roster, BootstrapMonitor, GrpcMonitor, HealthMonitor, JsonRpcMonitor},
    persistence::{
        Database, PersistenceError, SqliteBootstrapRepository, SqliteGrpcServerRepository,
        SqliteJsonRpcServerRepository, SqlitePeerRepository, SqliteRegistrationRepository,
        SqliteSnapshotRepository, SqliteStatusRepository,
    },
    probes::{GrpcProbe, JsonRpcProbe, TcpProbe},
    registration::RegistrationService,
    rpc::{self, RpcServices, RpcState},
    scheduler::{Scheduler, SchedulerError},
    stats::NetworkStats,
};

/// Errors that can occur while building or running the supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The store could not be opened or migrated.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// An HTTP client could not be constructed.
    #[error("failed to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// A default job's cron expression failed to parse.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The configured listen address.
        addr: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// The HTTP server failed while running.
    #[error("server error: {0}")]
    Server(std::io::Error),
}

/// Owns the built components and runs the process until shutdown.
pub struct Supervisor {
    config: AppConfig,
    database: Database,
    services: Arc<RpcServices>,
    scheduler: Scheduler,
    shutdown: CancellationToken,
}

impl Supervisor {
    /// Connects the store, builds every repository, probe, and service, and
    /// registers the default job schedule.
    pub async fn build(config: AppConfig) -> Result<Self, SupervisorError> {
        let database = Database::connect(&config.database_url).await?;
        database.run_migrations().await?;
        let pool = database.pool();

        let metrics = Metrics::new();
        let shutdown = CancellationToken::new();

        let bootstrap_repo = Arc::new(SqliteBootstrapRepository::new(pool.clone()));
        let grpc_repo = Arc::new(SqliteGrpcServerRepository::new(pool.clone()));
        let jsonrpc_repo = Arc::new(SqliteJsonRpcServerRepository::new(pool.clone()));
        let peer_repo = Arc::new(SqlitePeerRepository::new(pool.clone()));
        let snapshot_repo = Arc::new(SqliteSnapshotRepository::new(pool.clone()));
        let registration_repo = Arc::new(SqliteRegistrationRepository::new(pool.clone()));

        let tcp_probe =
            Arc::new(TcpProbe::new(config.probe.timeout(), config.probe.max_retries));
        let grpc_probe =
            Arc::new(GrpcProbe::new(config.probe.timeout(), config.probe.max_retries));
        let jsonrpc_probe =
            Arc::new(JsonRpcProbe::new(config.probe.timeout(), config.probe.max_retries)?);

        let geo = Arc::new(GeoCache::new(
            config.geo.api_url.clone(),
            config.geo.cache_ttl(),
            config.geo.pace(),
        )?);

        let bootstrap_monitor = Arc::new(HealthMonitor::new(
            "bootstrap",
            Arc::clone(&bootstrap_repo),
            SqliteStatusRepository::bootstrap(pool.clone()),
            tcp_probe,
            metrics.clone(),
        ));
        let grpc_monitor = Arc::new(HealthMonitor::new(
            "grpc",
            Arc::clone(&grpc_repo),
            SqliteStatusRepository::grpc(pool.clone()),
            Arc::clone(&grpc_probe) as _,
            metrics.clone(),
        ));
        let jsonrpc_monitor = Arc::new(HealthMonitor::new(
            "jsonrpc",
            Arc::clone(&jsonrpc_repo),
            SqliteStatusRepository::jsonrpc(pool.clone()),
            Arc::clone(&jsonrpc_probe) as _,
            metrics.clone(),
        ));

        let stats = Arc::new(NetworkStats::new(
            peer_repo,
            Arc::clone(&grpc_repo),
            Arc::clone(&jsonrpc_repo),
            Arc::clone(&bootstrap_repo),
            snapshot_repo,
            Arc::clone(&geo),
        ));

        let registration = Arc::new(RegistrationService::new(
            registration_repo,
            Arc::clone(&grpc_repo),
            Arc::clone(&jsonrpc_repo),
            grpc_probe,
            jsonrpc_probe,
            geo,
        ));

        let services = Arc::new(RpcServices {
            bootstrap_monitor: Arc::clone(&bootstrap_monitor),
            grpc_monitor: Arc::clone(&grpc_monitor),
            jsonrpc_monitor: Arc::clone(&jsonrpc_monitor),
            bootstrap_repo: Arc::clone(&bootstrap_repo),
            grpc_repo: Arc::clone(&grpc_repo),
            jsonrpc_repo,
            stats: Arc::clone(&stats),
            registration,
            bootstrap_roster_path: PathBuf::from(&config.bootstrap_roster_path),
            grpc_roster_path: PathBuf::from(&config.grpc_roster_path),
            metrics: metrics.clone(),
            shutdown: shutdown.clone(),
        });

        let scheduler = build_scheduler(
            &config,
            metrics,
            bootstrap_monitor,
            grpc_monitor,
            jsonrpc_monitor,
            bootstrap_repo,
            grpc_repo,
            stats,
        )?;

        Ok(Self { config, database, services, scheduler, shutdown })
    }

    /// The built services, for one-shot command-line use.
    pub fn services(&self) -> Arc<RpcServices> {
        Arc::clone(&self.services)
    }

    /// Runs the scheduler and the JSON-RPC server until a shutdown signal
    /// arrives, then drains jobs and closes the store.
    pub async fn run(self) -> Result<(), SupervisorError> {
        let signal_token = self.shutdown.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            signal_token.cancel();
        });

        self.scheduler.start();

        let listener = tokio::net::TcpListener::bind(&self.config.listen_address)
            .await
            .map_err(|source| SupervisorError::Bind {
                addr: self.config.listen_address.clone(),
                source,
            })?;
        tracing::info!(addr = %self.config.listen_address, "json-rpc server listening");

        let app = rpc::router(RpcState::new(Arc::clone(&self.services)));
        let shutdown = self.shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(SupervisorError::Server)?;

        tracing::info!("server stopped, draining scheduler");
        self.scheduler.stop().await;
        self.database.close().await;
        tracing::info!("shutdown complete");
        Ok(())
    }
}

/// Registers the default UTC schedule, staggered so the daily checks,
/// roster syncs, snapshots, and the geo backfill do not pile up.
#[allow(clippy::too_many_arguments)]
fn build_scheduler(
    config: &AppConfig,
    metrics: Metrics,
    bootstrap_monitor: Arc<BootstrapMonitor>,
    grpc_monitor: Arc<GrpcMonitor>,
    jsonrpc_monitor: Arc<JsonRpcMonitor>,
    bootstrap_repo: Arc<SqliteBootstrapRepository>,
    grpc_repo: Arc<SqliteGrpcServerRepository>,
    stats: Arc<NetworkStats>,
) -> Result<Scheduler, SchedulerError> {
    let mut scheduler = Scheduler::new(
        config.scheduler.job_timeout(),
        config.scheduler.drain_timeout(),
        metrics,
    );

    {
        let monitor = Arc::clone(&bootstrap_monitor);
        scheduler.add_job("bootstrap health check", "0 1 * * *", move |cancel| {
            let monitor = Arc::clone(&monitor);
            Box::pin(async move {
                monitor.check_all(&cancel).await?;
                Ok(())
            })
        })?;
    }
    {
        let monitor = Arc::clone(&grpc_monitor);
        scheduler.add_job("grpc health check", "0 2 * * *", move |cancel| {
            let monitor = Arc::clone(&monitor);
            Box::pin(async move {
                monitor.check_all(&cancel).await?;
                Ok(())
            })
        })?;
    }
    {
        let monitor = Arc::clone(&jsonrpc_monitor);
        scheduler.add_job("jsonrpc health check", "0 3 * * *", move |cancel| {
            let monitor = Arc::clone(&monitor);
            Box::pin(async move {
                monitor.check_all(&cancel).await?;
                Ok(())
            })
        })?;
    }
    {
        // Single-tier bootstrap check at 06:00, kept for operators still
        // running the original one-roster deployment. Idempotent with the
        // 01:00 run: the daily rows already exist, so it only re-probes
        // nodes the early batch missed.
        let monitor = bootstrap_monitor;
        scheduler.add_job("bootstrap health check (legacy)", "0 6 * * *", move |cancel| {
            let monitor = Arc::clone(&monitor);
            Box::pin(async move {
                monitor.check_all(&cancel).await?;
                Ok(())
            })
        })?;
    }
    {
        let repo = bootstrap_repo;
        let path = PathBuf::from(&config.bootstrap_roster_path);
        scheduler.add_job("bootstrap roster sync", "0 */6 * * *", move |_cancel| {
            let repo = Arc::clone(&repo);
            let path = path.clone();
            Box::pin(async move {
                roster::sync_bootstrap_nodes(&repo, &path).await?;
                Ok(())
            })
        })?;
    }
    {
        let stats = Arc::clone(&stats);
        scheduler.add_job("network snapshot", "0 */6 * * *", move |_cancel| {
            let stats = Arc::clone(&stats);
            Box::pin(async move {
                stats.create_snapshot().await?;
                Ok(())
            })
        })?;
    }
    {
        let repo = grpc_repo;
        let path = PathBuf::from(&config.grpc_roster_path);
        scheduler.add_job("grpc roster sync", "30 */6 * * *", move |_cancel| {
            let repo = Arc::clone(&repo);
            let path = path.clone();
            Box::pin(async move {
                roster::sync_grpc_servers(&repo, &path).await?;
                Ok(())
            })
        })?;
    }
    {
        scheduler.add_job("geo location backfill", "0 */12 * * *", move |cancel| {
            let stats = Arc::clone(&stats);
            Box::pin(async move {
                stats.update_all_geo_locations(&cancel).await?;
                Ok(())
            })
        })?;
    }

    Ok(scheduler)
}

async fn wait_for_signal() {
    let ctrl_c = signal::ctrl_c();
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("SIGINT received, initiating graceful shutdown"),
        _ = terminate => tracing::info!("SIGTERM received, initiating graceful shutdown"),
    }
}
