//! Traits that let one monitor template work across every entity class.

use async_trait::async_trait;

use super::error::PersistenceError;
use crate::models::{BootstrapNode, GrpcServer, JsonRpcServer};

/// A roster entry the health monitor can probe: anything with a store id and
/// a probeable address.
pub trait MonitoredEntity: Clone + Send + Sync + 'static {
    /// The store identifier, used as the daily-status foreign key.
    fn entity_id(&self) -> i64;

    /// The address handed to the probe.
    fn probe_address(&self) -> &str;
}

impl MonitoredEntity for BootstrapNode {
    fn entity_id(&self) -> i64 {
        self.id
    }

    fn probe_address(&self) -> &str {
        &self.address
    }
}

impl MonitoredEntity for GrpcServer {
    fn entity_id(&self) -> i64 {
        self.id
    }

    fn probe_address(&self) -> &str {
        &self.address
    }
}

impl MonitoredEntity for JsonRpcServer {
    fn entity_id(&self) -> i64 {
        self.id
    }

    fn probe_address(&self) -> &str {
        &self.address
    }
}

/// The repository surface the health monitor needs from an entity class.
#[async_trait]
pub trait RosterRepository: Send + Sync {
    /// The entity class this repository manages.
    type Entity: MonitoredEntity;

    /// All entities currently part of the active roster.
    async fn active_entities(&self) -> Result<Vec<Self::Entity>, PersistenceError>;

    /// Set-based recomputation of every active entity's rolling score from
    /// its last 30 days of status rows.
    async fn update_all_scores(&self) -> Result<(), PersistenceError>;
}
