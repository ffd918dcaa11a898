//! Helpers shared by the integration tests. Enabled with the
//! `test-helpers` feature.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    persistence::Database,
    probes::{CheckResult, Probe},
};

/// An in-memory database with migrations applied.
pub async fn memory_database() -> Database {
    let database = Database::connect_in_memory()
        .await
        .expect("failed to open in-memory database");
    database.run_migrations().await.expect("failed to run migrations");
    database
}

/// A probe whose outcomes are scripted per address, with a default for
/// anything unscripted. Counts calls so tests can assert dedupe behavior.
pub struct ScriptedProbe {
    outcomes: HashMap<String, bool>,
    default_success: bool,
    calls: AtomicU64,
}

impl ScriptedProbe {
    /// Every unscripted address succeeds.
    pub fn succeeding() -> Self {
        Self { outcomes: HashMap::new(), default_success: true, calls: AtomicU64::new(0) }
    }

    /// Every unscripted address fails.
    pub fn failing() -> Self {
        Self { outcomes: HashMap::new(), default_success: false, calls: AtomicU64::new(0) }
    }

    /// Scripts the outcome for one address.
    pub fn with_outcome(mut self, address: impl Into<String>, success: bool) -> Self {
        self.outcomes.insert(address.into(), success);
        self
    }

    /// How many checks have run.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn check(&self, _cancel: &CancellationToken, address: &str) -> CheckResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let success = self.outcomes.get(address).copied().unwrap_or(self.default_success);
        if success {
            CheckResult {
                success: true,
                attempts: 1,
                response_time_ms: Some(5),
                error_msg: None,
                block_height: None,
            }
        } else {
            CheckResult {
                success: false,
                attempts: 3,
                response_time_ms: None,
                error_msg: Some("scripted failure".into()),
                block_height: None,
            }
        }
    }
}
