//! The JSON-RPC facade: a single POST route demultiplexing wire-version-2.0
//! requests, single or batch, onto the core services.

pub mod error;
pub mod methods;

use std::{path::PathBuf, sync::Arc};

use axum::{
    extract::State,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::{
    context::Metrics,
    monitor::{BootstrapMonitor, GrpcMonitor, JsonRpcMonitor},
    persistence::{
        bootstrap::SqliteBootstrapRepository,
        servers::{SqliteGrpcServerRepository, SqliteJsonRpcServerRepository},
    },
    registration::RegistrationService,
    stats::NetworkStats,
};
pub use error::RpcError;

/// Everything the method handlers reach into.
pub struct RpcServices {
    /// The bootstrap-node monitor.
    pub bootstrap_monitor: Arc<BootstrapMonitor>,
    /// The gRPC-server monitor.
    pub grpc_monitor: Arc<GrpcMonitor>,
    /// The JSON-RPC-server monitor.
    pub jsonrpc_monitor: Arc<JsonRpcMonitor>,
    /// Bootstrap repository, for counts and syncs.
    pub bootstrap_repo: Arc<SqliteBootstrapRepository>,
    /// gRPC repository, for counts and syncs.
    pub grpc_repo: Arc<SqliteGrpcServerRepository>,
    /// JSON-RPC repository, for counts and network filtering.
    pub jsonrpc_repo: Arc<SqliteJsonRpcServerRepository>,
    /// The aggregation service.
    pub stats: Arc<NetworkStats>,
    /// The registration pipeline.
    pub registration: Arc<RegistrationService>,
    /// Bootstrap roster source for `syncBootstrapNodes`.
    pub bootstrap_roster_path: PathBuf,
    /// gRPC roster source for `syncNodes`.
    pub grpc_roster_path: PathBuf,
    /// Shared metrics handle.
    pub metrics: Metrics,
    /// The shutdown token; in-flight probes started by RPC calls abort with
    /// it.
    pub shutdown: CancellationToken,
}

/// Shared state for the HTTP server.
#[derive(Clone)]
pub struct RpcState {
    services: Arc<RpcServices>,
}

impl RpcState {
    /// Wraps the services for the router.
    pub fn new(services: Arc<RpcServices>) -> Self {
        Self { services }
    }
}

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    #[allow(dead_code)]
    jsonrpc: String,
    method: String,
    #[serde(default)]
    params: Value,
    #[serde(default)]
    id: Value,
}

#[derive(Debug, Serialize)]
struct RpcResponse {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
    id: Value,
}

impl RpcResponse {
    fn result(id: Value, result: Value) -> Self {
        Self { jsonrpc: "2.0", result: Some(result), error: None, id }
    }

    fn error(id: Value, error: RpcError) -> Self {
        Self { jsonrpc: "2.0", result: None, error: Some(error), id }
    }
}

/// Builds the HTTP router serving the JSON-RPC endpoint and a plain health
/// probe.
pub fn router(state: RpcState) -> Router {
    Router::new()
        .route("/", post(handle_rpc))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn handle_rpc(State(state): State<RpcState>, body: String) -> Json<Value> {
    let parsed: Value = match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(e) => {
            let response = RpcResponse::error(Value::Null, RpcError::parse(e));
            return Json(to_json(&response));
        }
    };

    match parsed {
        // Batch: dispatch per entry, preserve order and per-entry failures.
        Value::Array(entries) => {
            if entries.is_empty() {
                let response = RpcResponse::error(Value::Null, RpcError::invalid_request());
                return Json(to_json(&response));
            }
            let mut responses = Vec::with_capacity(entries.len());
            for entry in entries {
                responses.push(to_json(&process(&state, entry).await));
            }
            Json(Value::Array(responses))
        }
        value => Json(to_json(&process(&state, value).await)),
    }
}

async fn process(state: &RpcState, value: Value) -> RpcResponse {
    let request: RpcRequest = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(_) => return RpcResponse::error(Value::Null, RpcError::invalid_request()),
    };

    let services = &state.services;
    match methods::dispatch(services, &request.method, request.params).await {
        Ok(result) => {
            services.metrics.record_rpc(true);
            RpcResponse::result(request.id, result)
        }
        Err(error) => {
            services.metrics.record_rpc(false);
            tracing::warn!(method = %request.method, code = error.code, message = %error.message, "rpc method failed");
            RpcResponse::error(request.id, error)
        }
    }
}

fn to_json(response: &RpcResponse) -> Value {
    serde_json::to_value(response).unwrap_or_else(|e| {
        json!({
            "jsonrpc": "2.0",
            "error": { "code": error::SERVER_ERROR, "message": format!("failed to serialize response: {e}") },
            "id": null,
        })
    })
}
