//! Process metrics as an injected capability.
//!
//! A cloneable handle over shared counters, handed to the monitors, the
//! scheduler, and the RPC facade. There is no process-global registry; a
//! component that wants to count something holds a `Metrics`.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use serde::Serialize;

#[derive(Default)]
struct Counters {
    probes_succeeded: AtomicU64,
    probes_failed: AtomicU64,
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
    jobs_skipped: AtomicU64,
    jobs_panicked: AtomicU64,
    jobs_deadline_exceeded: AtomicU64,
    rpc_requests: AtomicU64,
    rpc_failures: AtomicU64,
}

/// Cloneable handle to the shared counters.
#[derive(Clone, Default)]
pub struct Metrics {
    counters: Arc<Counters>,
}

impl Metrics {
    /// Creates an independent set of counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one probe outcome.
    pub fn record_probe(&self, success: bool) {
        if success {
            self.counters.probes_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.probes_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records a job that ran to completion without error.
    pub fn record_job_completed(&self) {
        self.counters.jobs_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a job that returned an error.
    pub fn record_job_failed(&self) {
        self.counters.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a tick skipped because the prior run was still in flight.
    pub fn record_job_skipped(&self) {
        self.counters.jobs_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a contained job panic.
    pub fn record_job_panicked(&self) {
        self.counters.jobs_panicked.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a job that outlived its deadline.
    pub fn record_job_deadline_exceeded(&self) {
        self.counters.jobs_deadline_exceeded.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one RPC method dispatch.
    pub fn record_rpc(&self, success: bool) {
        self.counters.rpc_requests.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.counters.rpc_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// A point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let c = &self.counters;
        MetricsSnapshot {
            probes_succeeded: c.probes_succeeded.load(Ordering::Relaxed),
            probes_failed: c.probes_failed.load(Ordering::Relaxed),
            jobs_completed: c.jobs_completed.load(Ordering::Relaxed),
            jobs_failed: c.jobs_failed.load(Ordering::Relaxed),
            jobs_skipped: c.jobs_skipped.load(Ordering::Relaxed),
            jobs_panicked: c.jobs_panicked.load(Ordering::Relaxed),
            jobs_deadline_exceeded: c.jobs_deadline_exceeded.load(Ordering::Relaxed),
            rpc_requests: c.rpc_requests.load(Ordering::Relaxed),
            rpc_failures: c.rpc_failures.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time view of the counters, serialized into diagnostics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Probes that succeeded.
    pub probes_succeeded: u64,
    /// Probes that exhausted their retries.
    pub probes_failed: u64,
    /// Jobs that completed cleanly.
    pub jobs_completed: u64,
    /// Jobs that returned an error.
    pub jobs_failed: u64,
    /// Ticks skipped due to overlap suppression.
    pub jobs_skipped: u64,
    /// Contained job panics.
    pub jobs_panicked: u64,
    /// Jobs that outlived their deadline.
    pub jobs_deadline_exceeded: u64,
    /// RPC method dispatches.
    pub rpc_requests: u64,
    /// RPC dispatches that returned an error object.
    pub rpc_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_across_clones() {
        let metrics = Metrics::new();
        let clone = metrics.clone();

        metrics.record_probe(true);
        clone.record_probe(false);
        clone.record_job_skipped();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.probes_succeeded, 1);
        assert_eq!(snapshot.probes_failed, 1);
        assert_eq!(snapshot.jobs_skipped, 1);
    }
}
