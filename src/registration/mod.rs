//! The registration pipeline: validation, reachability probing, duplicate
//! detection, and admin-moderated promotion into the monitored roster.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use validator::Validate;

use crate::{
    geo::GeoCache,
    models::{
        NodeRegistration, NodeType, RegisterNodeParams, RegistrationResponse, RegistrationStatus,
    },
    persistence::{
        error::PersistenceError,
        registrations::{NewRegistration, SqliteRegistrationRepository},
        servers::{NewServer, SqliteGrpcServerRepository, SqliteJsonRpcServerRepository},
    },
    probes::Probe,
};

/// Errors from the registration pipeline.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The submission failed shape validation.
    #[error("invalid registration: {0}")]
    Validation(String),

    /// The endpoint did not answer the matching probe.
    #[error("node at {0} is not reachable")]
    Unreachable(String),

    /// The address is already in the monitored roster.
    #[error("a node with address {0} is already registered")]
    DuplicateNode(String),

    /// A non-rejected registration already owns the address.
    #[error("a registration for address {0} already exists")]
    DuplicateRegistration(String),

    /// No registration with that id.
    #[error("registration not found: {0}")]
    NotFound(i64),

    /// The registration has already been reviewed.
    #[error("registration {0} is not pending")]
    NotPending(i64),

    /// A store operation failed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Validates, stores, and moderates user-submitted node registrations.
pub struct RegistrationService {
    registrations: Arc<SqliteRegistrationRepository>,
    grpc_servers: Arc<SqliteGrpcServerRepository>,
    jsonrpc_servers: Arc<SqliteJsonRpcServerRepository>,
    grpc_probe: Arc<dyn Probe>,
    jsonrpc_probe: Arc<dyn Probe>,
    geo: Arc<GeoCache>,
}

impl RegistrationService {
    /// Creates the service over the repositories, the class probes, and the
    /// geo cache.
    pub fn new(
        registrations: Arc<SqliteRegistrationRepository>,
        grpc_servers: Arc<SqliteGrpcServerRepository>,
        jsonrpc_servers: Arc<SqliteJsonRpcServerRepository>,
        grpc_probe: Arc<dyn Probe>,
        jsonrpc_probe: Arc<dyn Probe>,
        geo: Arc<GeoCache>,
    ) -> Self {
        Self { registrations, grpc_servers, jsonrpc_servers, grpc_probe, jsonrpc_probe, geo }
    }

    /// Handles a submission: validate the shape, probe the endpoint, reject
    /// duplicates, then store the registration as pending.
    #[tracing::instrument(skip_all, fields(address = %params.address), level = "info")]
    pub async fn submit(
        &self,
        cancel: &CancellationToken,
        params: RegisterNodeParams,
    ) -> Result<RegistrationResponse, RegistrationError> {
        params.validate().map_err(|e| RegistrationError::Validation(e.to_string()))?;

        let probe = self.probe_for(params.node_type);
        let result = probe.check(cancel, &params.address).await;
        if !result.success {
            return Err(RegistrationError::Unreachable(params.address));
        }

        let already_monitored = match params.node_type {
            NodeType::Grpc => self.grpc_servers.exists_by_address(&params.address).await?,
            NodeType::Jsonrpc => self.jsonrpc_servers.exists_by_address(&params.address).await?,
        };
        if already_monitored {
            return Err(RegistrationError::DuplicateNode(params.address));
        }

        if self.registrations.exists_active_by_address(&params.address).await? {
            return Err(RegistrationError::DuplicateRegistration(params.address));
        }

        let id = self
            .registrations
            .create(&NewRegistration {
                node_type: params.node_type,
                name: params.name,
                address: params.address,
                network: params.network,
                email: params.email,
                website: params.website,
            })
            .await?;

        tracing::info!(id, "node registration submitted");
        Ok(RegistrationResponse {
            id,
            status: RegistrationStatus::Pending,
            message: "Your node registration has been submitted and is pending review.".into(),
        })
    }

    /// Promotes a pending registration into the matching monitored table,
    /// geo-enriched on a best-effort basis, and marks it approved.
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn approve(&self, id: i64, reviewed_by: &str) -> Result<(), RegistrationError> {
        let registration = self.require_pending(id).await?;

        // Geo enrichment is best effort; a failed lookup never blocks
        // approval.
        let geo = self
            .geo
            .lookup_address(&registration.address)
            .await
            .ok()
            .filter(|g| g.is_valid());

        let server = NewServer {
            name: registration.name,
            address: registration.address,
            network: registration.network,
            email: registration.email,
            website: registration.website,
            geo,
        };
        match registration.node_type {
            NodeType::Grpc => self.grpc_servers.create_server(&server).await?,
            NodeType::Jsonrpc => self.jsonrpc_servers.create_server(&server).await?,
        }

        self.registrations
            .mark_reviewed(id, RegistrationStatus::Approved, "", reviewed_by, Utc::now())
            .await?;
        tracing::info!(id, reviewed_by, "registration approved");
        Ok(())
    }

    /// Marks a pending registration rejected with a reason.
    #[tracing::instrument(skip(self, reason), level = "info")]
    pub async fn reject(
        &self,
        id: i64,
        reason: &str,
        reviewed_by: &str,
    ) -> Result<(), RegistrationError> {
        self.require_pending(id).await?;
        self.registrations
            .mark_reviewed(id, RegistrationStatus::Rejected, reason, reviewed_by, Utc::now())
            .await?;
        tracing::info!(id, reviewed_by, "registration rejected");
        Ok(())
    }

    /// All registrations awaiting review, oldest first.
    pub async fn pending(&self) -> Result<Vec<NodeRegistration>, RegistrationError> {
        Ok(self.registrations.by_status(RegistrationStatus::Pending).await?)
    }

    /// The registration with the given id, if any.
    pub async fn get(&self, id: i64) -> Result<Option<NodeRegistration>, RegistrationError> {
        Ok(self.registrations.get(id).await?)
    }

    async fn require_pending(&self, id: i64) -> Result<NodeRegistration, RegistrationError> {
        let registration =
            self.registrations.get(id).await?.ok_or(RegistrationError::NotFound(id))?;
        if registration.status != RegistrationStatus::Pending {
            return Err(RegistrationError::NotPending(id));
        }
        Ok(registration)
    }

    fn probe_for(&self, node_type: NodeType) -> &dyn Probe {
        match node_type {
            NodeType::Grpc => self.grpc_probe.as_ref(),
            NodeType::Jsonrpc => self.jsonrpc_probe.as_ref(),
        }
    }
}
