//! The static method registry: every JSON-RPC method name mapped to a typed
//! handler over the core services.

use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};

use super::{error::RpcError, RpcServices};
use crate::{
    models::{BootstrapNodeResponse, Network, RegisterNodeParams, ServerResponse},
    monitor::roster,
};

/// Dispatches one method call. Unknown names yield `-32601`.
pub async fn dispatch(
    services: &RpcServices,
    method: &str,
    params: Value,
) -> Result<Value, RpcError> {
    match method {
        "getBootstrapNodes" => get_bootstrap_nodes(services).await,
        "getNodes" => get_nodes(services).await,
        "getJSONRPCNodes" => {
            let params: NetworkFilterParams = optional_params(params)?;
            get_jsonrpc_nodes(services, params).await
        }
        "checkAllBootstrapNodes" => check_all_bootstrap_nodes(services).await,
        "checkAllNodes" => check_all_nodes(services).await,
        "checkAllJSONRPCNodes" => check_all_jsonrpc_nodes(services).await,
        "getBootstrapNodeCount" => count(services.bootstrap_repo.active_count().await),
        "getNodeCount" => count(services.grpc_repo.active_count().await),
        "getJSONRPCNodeCount" => count(services.jsonrpc_repo.active_count().await),
        "syncBootstrapNodes" => sync_bootstrap_nodes(services).await,
        "syncNodes" => sync_nodes(services).await,
        "getNetworkStats" => to_result(services.stats.get_stats().await),
        "getMapNodes" => to_result(services.stats.get_map_nodes().await),
        "getSnapshots" => {
            let params: LimitParams = optional_params(params)?;
            to_result(services.stats.get_snapshots(params.limit.unwrap_or(0)).await)
        }
        "updateGeoLocations" => {
            to_result(services.stats.update_all_geo_locations(&services.shutdown).await)
        }
        "registerNode" => {
            let params: RegisterNodeParams = required_params(params)?;
            to_result(services.registration.submit(&services.shutdown, params).await)
        }
        "getRegistrationStatus" => {
            let params: RegistrationIdParams = required_params(params)?;
            to_result(services.registration.get(params.id).await)
        }
        "getPendingRegistrations" => to_result(services.registration.pending().await),
        "approveRegistration" => {
            let params: ReviewParams = required_params(params)?;
            services
                .registration
                .approve(params.id, &params.reviewed_by)
                .await
                .map_err(RpcError::core)?;
            Ok(json!({ "id": params.id, "status": "approved" }))
        }
        "rejectRegistration" => {
            let params: RejectParams = required_params(params)?;
            services
                .registration
                .reject(params.id, &params.reason, &params.reviewed_by)
                .await
                .map_err(RpcError::core)?;
            Ok(json!({ "id": params.id, "status": "rejected" }))
        }
        "getHealth" => get_health(services),
        _ => Err(RpcError::method_not_found(method)),
    }
}

#[derive(Debug, Default, Deserialize)]
struct NetworkFilterParams {
    network: Option<Network>,
}

#[derive(Debug, Default, Deserialize)]
struct LimitParams {
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RegistrationIdParams {
    id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewParams {
    id: i64,
    reviewed_by: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RejectParams {
    id: i64,
    reason: String,
    reviewed_by: String,
}

/// Missing or null params deserialize to the schema's default.
fn optional_params<T: DeserializeOwned + Default>(params: Value) -> Result<T, RpcError> {
    if params.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(params).map_err(RpcError::invalid_params)
}

fn required_params<T: DeserializeOwned>(params: Value) -> Result<T, RpcError> {
    serde_json::from_value(params).map_err(RpcError::invalid_params)
}

fn to_result<T, E>(result: Result<T, E>) -> Result<Value, RpcError>
where
    T: serde::Serialize,
    E: std::fmt::Display,
{
    let value = result.map_err(RpcError::core)?;
    serde_json::to_value(value).map_err(RpcError::core)
}

fn count(result: Result<i64, crate::persistence::PersistenceError>) -> Result<Value, RpcError> {
    let count = result.map_err(RpcError::core)?;
    Ok(json!({ "count": count }))
}

async fn get_bootstrap_nodes(services: &RpcServices) -> Result<Value, RpcError> {
    let nodes = services.bootstrap_monitor.get_with_status().await.map_err(RpcError::core)?;
    let response: Vec<BootstrapNodeResponse> = nodes
        .into_iter()
        .map(|(node, status)| BootstrapNodeResponse::new(node, status))
        .collect();
    serde_json::to_value(response).map_err(RpcError::core)
}

async fn get_nodes(services: &RpcServices) -> Result<Value, RpcError> {
    let servers = services.grpc_monitor.get_with_status().await.map_err(RpcError::core)?;
    let response: Vec<ServerResponse> = servers
        .into_iter()
        .map(|(server, status)| ServerResponse::from_grpc(server, status))
        .collect();
    serde_json::to_value(response).map_err(RpcError::core)
}

async fn get_jsonrpc_nodes(
    services: &RpcServices,
    params: NetworkFilterParams,
) -> Result<Value, RpcError> {
    let servers = match params.network {
        Some(network) => {
            let filtered = services
                .jsonrpc_repo
                .active_servers_by_network(network)
                .await
                .map_err(RpcError::core)?;
            services.jsonrpc_monitor.attach_status(filtered).await
        }
        None => services.jsonrpc_monitor.get_with_status().await.map_err(RpcError::core)?,
    };
    let response: Vec<ServerResponse> = servers
        .into_iter()
        .map(|(server, status)| ServerResponse::from_jsonrpc(server, status))
        .collect();
    serde_json::to_value(response).map_err(RpcError::core)
}

async fn check_all_bootstrap_nodes(services: &RpcServices) -> Result<Value, RpcError> {
    to_result(services.bootstrap_monitor.check_all(&services.shutdown).await)
}

async fn check_all_nodes(services: &RpcServices) -> Result<Value, RpcError> {
    to_result(services.grpc_monitor.check_all(&services.shutdown).await)
}

async fn check_all_jsonrpc_nodes(services: &RpcServices) -> Result<Value, RpcError> {
    to_result(services.jsonrpc_monitor.check_all(&services.shutdown).await)
}

async fn sync_bootstrap_nodes(services: &RpcServices) -> Result<Value, RpcError> {
    to_result(
        roster::sync_bootstrap_nodes(&services.bootstrap_repo, &services.bootstrap_roster_path)
            .await,
    )
}

async fn sync_nodes(services: &RpcServices) -> Result<Value, RpcError> {
    to_result(roster::sync_grpc_servers(&services.grpc_repo, &services.grpc_roster_path).await)
}

fn get_health(services: &RpcServices) -> Result<Value, RpcError> {
    Ok(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
        "metrics": services.metrics.snapshot(),
    }))
}
