//! User-submitted node registrations and their moderation lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::server::Network;

/// The class of endpoint a registration proposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum NodeType {
    /// A public gRPC server.
    Grpc,
    /// A public JSON-RPC server.
    Jsonrpc,
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            NodeType::Grpc => "grpc",
            NodeType::Jsonrpc => "jsonrpc",
        })
    }
}

/// Moderation state of a registration.
///
/// `pending → approved` and `pending → rejected` are the only transitions;
/// both outcomes are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum RegistrationStatus {
    /// Submitted and awaiting review.
    Pending,
    /// Promoted into the monitored roster.
    Approved,
    /// Declined with a reason.
    Rejected,
}

/// A persisted registration request.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRegistration {
    /// Row identifier.
    pub id: i64,
    /// Proposed endpoint class.
    pub node_type: NodeType,
    /// Operator-supplied display name.
    pub name: String,
    /// Proposed endpoint address.
    pub address: String,
    /// Network the endpoint serves.
    pub network: Network,
    /// Operator contact email.
    pub email: String,
    /// Operator website.
    pub website: String,
    /// Moderation state.
    pub status: RegistrationStatus,
    /// Reviewer-supplied reason, set on rejection.
    pub rejection_reason: String,
    /// Submission timestamp.
    pub created_at: DateTime<Utc>,
    /// Review timestamp, unset while pending.
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Reviewer identity, empty while pending.
    pub reviewed_by: String,
}

/// Parameters of the `registerNode` RPC method.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterNodeParams {
    /// Proposed endpoint class.
    pub node_type: NodeType,
    /// Display name, 2 to 255 characters.
    #[validate(length(min = 2, max = 255, message = "name must be 2-255 characters"))]
    pub name: String,
    /// Endpoint address to probe and monitor.
    #[validate(length(min = 1, message = "address must not be empty"))]
    pub address: String,
    /// Network the endpoint serves.
    pub network: Network,
    /// Contact email.
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    /// Operator website, optional.
    #[serde(default)]
    pub website: String,
}

/// Wire response for a successful submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    /// Identifier of the stored registration.
    pub id: i64,
    /// Always `pending` on submission.
    pub status: RegistrationStatus,
    /// Human-readable confirmation.
    pub message: String,
}
