//! Cron-driven job runner.
//!
//! Each named job has a cron expression and a run function. The policies,
//! all local to this module:
//!
//! - **Overlap suppression** — a tick that fires while the prior run of the
//!   same job is still in flight is skipped.
//! - **Per-job timeout** — every run receives a cancellation token derived
//!   from the shutdown token and cancelled at the job deadline.
//! - **Panic containment** — the run body executes in its own task; a panic
//!   is caught at the join, logged, and counted.
//! - **Graceful stop** — `stop` cancels the shutdown token (which propagates
//!   into in-flight runs), then waits up to the drain deadline for active
//!   runs to finish.
//!
//! Expression parsing and next-fire-time computation are delegated to the
//! `cron` crate; standard five-field expressions are accepted and get a
//! seconds field of `0` prepended.

use std::{
    str::FromStr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use chrono::Utc;
use cron::Schedule;
use futures::future::BoxFuture;
use thiserror::Error;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::context::Metrics;

/// What a job run returns.
pub type JobResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// The future a job's run function produces.
pub type JobFuture = BoxFuture<'static, JobResult>;

type JobFn = Arc<dyn Fn(CancellationToken) -> JobFuture + Send + Sync>;

/// Errors from scheduler construction.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The cron expression for a job did not parse.
    #[error("invalid cron expression {expression:?} for job {job}: {source}")]
    InvalidExpression {
        /// The job being added.
        job: String,
        /// The offending expression.
        expression: String,
        /// The parser's complaint.
        source: cron::error::Error,
    },
}

struct Job {
    name: String,
    schedule: Schedule,
    run: JobFn,
    running: AtomicBool,
}

/// The cron scheduler. Create, add jobs, `start`, and eventually `stop`.
pub struct Scheduler {
    jobs: Vec<Arc<Job>>,
    job_timeout: Duration,
    drain_timeout: Duration,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    metrics: Metrics,
}

impl Scheduler {
    /// Creates an empty scheduler with the given per-job and drain deadlines.
    pub fn new(job_timeout: Duration, drain_timeout: Duration, metrics: Metrics) -> Self {
        Self {
            jobs: Vec::new(),
            job_timeout,
            drain_timeout,
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
            metrics,
        }
    }

    /// Registers a named job. `expression` is standard five-field cron
    /// (UTC); six- and seven-field expressions are accepted as-is.
    pub fn add_job<F>(
        &mut self,
        name: impl Into<String>,
        expression: &str,
        run: F,
    ) -> Result<(), SchedulerError>
    where
        F: Fn(CancellationToken) -> JobFuture + Send + Sync + 'static,
    {
        let name = name.into();
        let schedule = Schedule::from_str(&normalize_cron(expression)).map_err(|source| {
            SchedulerError::InvalidExpression {
                job: name.clone(),
                expression: expression.to_string(),
                source,
            }
        })?;
        self.jobs.push(Arc::new(Job {
            name,
            schedule,
            run: Arc::new(run),
            running: AtomicBool::new(false),
        }));
        Ok(())
    }

    /// Spawns one ticking task per job. Returns immediately.
    pub fn start(&self) {
        for job in &self.jobs {
            let job = Arc::clone(job);
            let shutdown = self.shutdown.clone();
            let tracker = self.tracker.clone();
            let job_timeout = self.job_timeout;
            let metrics = self.metrics.clone();
            self.tracker.spawn(async move {
                tick_loop(job, shutdown, tracker, job_timeout, metrics).await;
            });
        }
        tracing::info!(jobs = self.jobs.len(), "scheduler started");
    }

    /// Stops ticking, cancels in-flight runs, and waits up to the drain
    /// deadline for them to finish.
    pub async fn stop(&self) {
        tracing::info!("stopping scheduler");
        self.shutdown.cancel();
        self.tracker.close();
        if tokio::time::timeout(self.drain_timeout, self.tracker.wait()).await.is_err() {
            tracing::warn!("timed out waiting for scheduled jobs to finish");
        } else {
            tracing::info!("all scheduled jobs drained");
        }
    }
}

async fn tick_loop(
    job: Arc<Job>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    job_timeout: Duration,
    metrics: Metrics,
) {
    loop {
        let now = Utc::now();
        let Some(next) = job.schedule.after(&now).next() else {
            tracing::warn!(job = %job.name, "schedule has no future fire times, stopping");
            return;
        };
        let delay = (next - now).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }

        // Overlap suppression: the flag stays held until the prior run's
        // task actually returns, even past its deadline.
        if job.running.swap(true, Ordering::SeqCst) {
            metrics.record_job_skipped();
            tracing::warn!(job = %job.name, "previous run still in flight, skipping tick");
            continue;
        }

        let job = Arc::clone(&job);
        let shutdown = shutdown.clone();
        let metrics = metrics.clone();
        tracker.spawn(async move {
            run_job(&job, shutdown, job_timeout, &metrics).await;
            job.running.store(false, Ordering::SeqCst);
        });
    }
}

enum RunOutcome {
    Completed,
    Failed(String),
    Panicked(String),
}

async fn run_job(
    job: &Job,
    shutdown: CancellationToken,
    job_timeout: Duration,
    metrics: &Metrics,
) {
    let started = Instant::now();
    tracing::info!(job = %job.name, "starting scheduled job");

    let job_token = shutdown.child_token();
    // The body runs in its own task so a panic is contained at the join.
    let mut handle = tokio::spawn((job.run)(job_token.clone()));

    let mut deadline_exceeded = false;
    let join_result = match tokio::time::timeout(job_timeout, &mut handle).await {
        Ok(join_result) => join_result,
        Err(_) => {
            deadline_exceeded = true;
            metrics.record_job_deadline_exceeded();
            job_token.cancel();
            tracing::warn!(
                job = %job.name,
                timeout = ?job_timeout,
                "job deadline exceeded, cancelling",
            );
            (&mut handle).await
        }
    };

    let outcome = match join_result {
        Ok(Ok(())) => RunOutcome::Completed,
        Ok(Err(e)) => RunOutcome::Failed(e.to_string()),
        Err(join_error) if join_error.is_panic() => RunOutcome::Panicked(format!("{join_error}")),
        Err(join_error) => RunOutcome::Failed(join_error.to_string()),
    };

    let duration = started.elapsed();
    match outcome {
        RunOutcome::Completed => {
            metrics.record_job_completed();
            tracing::info!(
                job = %job.name,
                duration = ?duration,
                deadline_exceeded,
                "job completed",
            );
        }
        RunOutcome::Failed(error) => {
            metrics.record_job_failed();
            tracing::error!(
                job = %job.name,
                duration = ?duration,
                deadline_exceeded,
                error,
                "job failed",
            );
        }
        RunOutcome::Panicked(panic) => {
            metrics.record_job_panicked();
            tracing::error!(job = %job.name, duration = ?duration, panic, "job panicked");
        }
    }
}

/// Prepends a `0` seconds field to standard five-field cron expressions.
fn normalize_cron(expression: &str) -> String {
    if expression.split_whitespace().count() == 5 {
        format!("0 {expression}")
    } else {
        expression.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_five_field_expressions() {
        assert_eq!(normalize_cron("0 1 * * *"), "0 0 1 * * *");
        assert_eq!(normalize_cron("*/5 * * * * *"), "*/5 * * * * *");
    }

    #[test]
    fn five_field_expressions_parse() {
        for expression in
            ["0 1 * * *", "0 2 * * *", "0 3 * * *", "0 6 * * *", "0 */6 * * *", "30 */6 * * *", "0 */12 * * *"]
        {
            assert!(
                Schedule::from_str(&normalize_cron(expression)).is_ok(),
                "expression {expression:?} should parse",
            );
        }
    }

    #[test]
    fn add_job_rejects_malformed_expression() {
        let mut scheduler =
            Scheduler::new(Duration::from_secs(1), Duration::from_secs(1), Metrics::new());
        let err = scheduler
            .add_job("broken", "not a cron", |_| Box::pin(async { Ok(()) }))
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidExpression { .. }));
    }
}
