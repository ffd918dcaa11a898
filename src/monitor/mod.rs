//! The health-monitor template.
//!
//! One monitor exists per entity class, but they share a single algorithm:
//! load the active roster, fan out bounded-parallel probes, skip entities
//! that already have a row for today, persist each outcome, then recompute
//! scores in one set-based statement. Per-entity failures are logged and
//! never abort the batch.

pub mod roster;

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use chrono::Utc;
use futures::StreamExt;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::{
    context::Metrics,
    models::status::{NewDailyStatus, StatusItem, COLOR_FAILURE, COLOR_SUCCESS},
    persistence::{
        error::PersistenceError,
        status::SqliteStatusRepository,
        traits::{MonitoredEntity, RosterRepository},
    },
    probes::Probe,
};

/// The bootstrap-node monitor.
pub type BootstrapMonitor = HealthMonitor<crate::persistence::SqliteBootstrapRepository>;
/// The gRPC-server monitor.
pub type GrpcMonitor = HealthMonitor<crate::persistence::SqliteGrpcServerRepository>;
/// The JSON-RPC-server monitor.
pub type JsonRpcMonitor = HealthMonitor<crate::persistence::SqliteJsonRpcServerRepository>;

/// Bound on concurrently running probes within one batch.
pub const PROBE_CONCURRENCY: usize = 10;

/// Length of the presented status window, in days.
pub const STATUS_WINDOW_DAYS: u64 = 30;

/// Errors from a monitor run.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Loading the roster or another required store operation failed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// The batch was cancelled before it completed; scores were not
    /// recomputed.
    #[error("health check cancelled")]
    Cancelled,
}

/// Outcome counts of one `check_all` batch.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckSummary {
    /// Active entities in the roster.
    pub roster: u64,
    /// Probes that succeeded and were recorded.
    pub succeeded: u64,
    /// Probes that failed and were recorded.
    pub failed: u64,
    /// Entities skipped because today's row already existed.
    pub skipped: u64,
    /// Entities whose work was abandoned due to cancellation.
    pub aborted: u64,
    /// Entities whose store operations errored; logged, not recorded.
    pub errors: u64,
}

#[derive(Default)]
struct CheckCounters {
    succeeded: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    aborted: AtomicU64,
    errors: AtomicU64,
}

enum EntityOutcome {
    Succeeded,
    Failed,
    Skipped,
    Aborted,
}

/// The monitor for one entity class, parameterized by its roster repository
/// and probe.
pub struct HealthMonitor<R: RosterRepository> {
    name: &'static str,
    roster: Arc<R>,
    statuses: SqliteStatusRepository,
    probe: Arc<dyn Probe>,
    metrics: Metrics,
}

impl<R: RosterRepository> HealthMonitor<R> {
    /// Creates a monitor over a roster repository, its status table, and the
    /// probe matching the entity class. `name` labels log lines.
    pub fn new(
        name: &'static str,
        roster: Arc<R>,
        statuses: SqliteStatusRepository,
        probe: Arc<dyn Probe>,
        metrics: Metrics,
    ) -> Self {
        Self { name, roster, statuses, probe, metrics }
    }

    /// Probes every active entity that has no status row for today (UTC),
    /// persisting one row per probe, then recomputes scores. Idempotent per
    /// UTC day: a second run finds the rows present and records nothing new.
    #[tracing::instrument(skip_all, fields(monitor = self.name))]
    pub async fn check_all(
        &self,
        cancel: &CancellationToken,
    ) -> Result<CheckSummary, MonitorError> {
        let entities = self.roster.active_entities().await?;
        let today = Utc::now().date_naive();
        let roster_size = entities.len() as u64;
        tracing::info!(roster = roster_size, "starting health check batch");

        let counters = CheckCounters::default();
        futures::stream::iter(entities)
            .for_each_concurrent(PROBE_CONCURRENCY, |entity| {
                let counters = &counters;
                async move {
                    if cancel.is_cancelled() {
                        counters.aborted.fetch_add(1, Ordering::Relaxed);
                        return;
                    }
                    match self.check_single(cancel, &entity, today).await {
                        Ok(EntityOutcome::Succeeded) => {
                            counters.succeeded.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(EntityOutcome::Failed) => {
                            counters.failed.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(EntityOutcome::Skipped) => {
                            counters.skipped.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(EntityOutcome::Aborted) => {
                            counters.aborted.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            counters.errors.fetch_add(1, Ordering::Relaxed);
                            tracing::error!(
                                entity_id = entity.entity_id(),
                                error = %e,
                                "failed to check entity",
                            );
                        }
                    }
                }
            })
            .await;

        if cancel.is_cancelled() {
            tracing::warn!("health check batch cancelled, skipping score update");
            return Err(MonitorError::Cancelled);
        }

        // A score-update failure is logged but does not fail the run.
        if let Err(e) = self.roster.update_all_scores().await {
            tracing::error!(error = %e, "failed to update scores");
        }

        let summary = CheckSummary {
            roster: roster_size,
            succeeded: counters.succeeded.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            skipped: counters.skipped.load(Ordering::Relaxed),
            aborted: counters.aborted.load(Ordering::Relaxed),
            errors: counters.errors.load(Ordering::Relaxed),
        };
        tracing::info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "health check batch finished",
        );
        Ok(summary)
    }

    async fn check_single(
        &self,
        cancel: &CancellationToken,
        entity: &R::Entity,
        today: chrono::NaiveDate,
    ) -> Result<EntityOutcome, PersistenceError> {
        if self.statuses.has_status_for_date(entity.entity_id(), today).await? {
            return Ok(EntityOutcome::Skipped);
        }

        let result = self.probe.check(cancel, entity.probe_address()).await;
        self.metrics.record_probe(result.success);

        // A probe interrupted by shutdown is abandoned, not recorded as an
        // outage.
        if cancel.is_cancelled() && !result.success {
            return Ok(EntityOutcome::Aborted);
        }

        let status = NewDailyStatus {
            entity_id: entity.entity_id(),
            date: today,
            color: if result.success { COLOR_SUCCESS } else { COLOR_FAILURE },
            attempts: result.attempts,
            success: result.success,
            error_msg: result.error_msg,
            response_time_ms: result.response_time_ms,
            blockchain_height: result.block_height,
        };
        self.statuses.create_status(&status).await?;

        Ok(if result.success { EntityOutcome::Succeeded } else { EntityOutcome::Failed })
    }

    /// Every active entity paired with its dense 30-day series. Entities
    /// whose series cannot be loaded are logged and omitted.
    pub async fn get_with_status(
        &self,
    ) -> Result<Vec<(R::Entity, Vec<StatusItem>)>, MonitorError> {
        let entities = self.roster.active_entities().await?;
        Ok(self.attach_status(entities).await)
    }

    /// Pairs an already-loaded entity list with dense series.
    pub async fn attach_status(
        &self,
        entities: Vec<R::Entity>,
    ) -> Vec<(R::Entity, Vec<StatusItem>)> {
        let mut out = Vec::with_capacity(entities.len());
        for entity in entities {
            match self.statuses.recent_statuses(entity.entity_id(), STATUS_WINDOW_DAYS).await {
                Ok(series) => out.push((entity, series)),
                Err(e) => {
                    tracing::error!(
                        entity_id = entity.entity_id(),
                        error = %e,
                        "failed to get statuses",
                    );
                }
            }
        }
        out
    }
}
