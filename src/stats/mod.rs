//! Network-wide aggregation: stats reports, map nodes, snapshots, and the
//! paced geolocation backfill.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::{
    geo::GeoCache,
    models::{MapNode, NetworkSnapshot, NetworkStatsReport},
    persistence::{
        bootstrap::SqliteBootstrapRepository, error::PersistenceError,
        peers::SqlitePeerRepository, servers::SqliteGrpcServerRepository,
        servers::SqliteJsonRpcServerRepository, snapshots::SqliteSnapshotRepository,
    },
};

/// Servers and nodes at or above this score are shown as online.
const ONLINE_SCORE_THRESHOLD: f64 = 50.0;

/// How many countries the stats report ranks.
const TOP_COUNTRIES_LIMIT: i64 = 10;

/// Default page size for snapshot listings.
const DEFAULT_SNAPSHOT_LIMIT: i64 = 10;

/// Outcome counts of one geolocation backfill pass.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillSummary {
    /// Entities that received a geo fix.
    pub updated: u64,
    /// Entities whose lookup failed; logged and skipped.
    pub failed: u64,
}

/// Aggregates repository state into network-wide reports and snapshots.
pub struct NetworkStats {
    peers: Arc<SqlitePeerRepository>,
    grpc: Arc<SqliteGrpcServerRepository>,
    jsonrpc: Arc<SqliteJsonRpcServerRepository>,
    bootstrap: Arc<SqliteBootstrapRepository>,
    snapshots: Arc<SqliteSnapshotRepository>,
    geo: Arc<GeoCache>,
}

impl NetworkStats {
    /// Creates the service over the repositories and the geo cache.
    pub fn new(
        peers: Arc<SqlitePeerRepository>,
        grpc: Arc<SqliteGrpcServerRepository>,
        jsonrpc: Arc<SqliteJsonRpcServerRepository>,
        bootstrap: Arc<SqliteBootstrapRepository>,
        snapshots: Arc<SqliteSnapshotRepository>,
        geo: Arc<GeoCache>,
    ) -> Self {
        Self { peers, grpc, jsonrpc, bootstrap, snapshots, geo }
    }

    /// The current aggregate counts and rankings.
    pub async fn get_stats(&self) -> Result<NetworkStatsReport, PersistenceError> {
        let reachable_nodes = self.peers.count_reachable().await?;
        let avg_uptime = self.peers.avg_uptime().await?;
        let countries_count = self.peers.count_countries().await?;
        let top_countries = self.peers.top_countries(TOP_COUNTRIES_LIMIT).await?;

        let grpc_nodes = self.grpc.active_count().await?;
        let jsonrpc_nodes = self.jsonrpc.active_count().await?;
        let bootstrap_nodes = self.bootstrap.active_count().await?;

        Ok(NetworkStatsReport {
            total_nodes: reachable_nodes + grpc_nodes + jsonrpc_nodes + bootstrap_nodes,
            reachable_nodes,
            countries_count,
            avg_uptime,
            top_countries,
            grpc_nodes,
            jsonrpc_nodes,
            bootstrap_nodes,
        })
    }

    /// Every entity with a geo fix, formatted for map display.
    pub async fn get_map_nodes(&self) -> Result<Vec<MapNode>, PersistenceError> {
        let mut nodes = Vec::new();

        for server in self.grpc.active_servers().await? {
            if server.latitude != 0.0 || server.longitude != 0.0 {
                nodes.push(MapNode {
                    id: server.id,
                    name: server.name,
                    node_type: "grpc".into(),
                    coordinates: [server.latitude, server.longitude],
                    status: score_status(server.overall_score),
                    country: server.country,
                    city: server.city,
                });
            }
        }

        for server in self.jsonrpc.active_servers().await? {
            if server.latitude != 0.0 || server.longitude != 0.0 {
                nodes.push(MapNode {
                    id: server.id,
                    name: server.name,
                    node_type: "jsonrpc".into(),
                    coordinates: [server.latitude, server.longitude],
                    status: score_status(server.overall_score),
                    country: server.country,
                    city: server.city,
                });
            }
        }

        for node in self.bootstrap.active_nodes().await? {
            if node.latitude != 0.0 || node.longitude != 0.0 {
                nodes.push(MapNode {
                    id: node.id,
                    name: node.name,
                    node_type: "bootstrap".into(),
                    coordinates: [node.latitude, node.longitude],
                    status: score_status(node.overall_score),
                    country: node.country,
                    city: node.city,
                });
            }
        }

        for peer in self.peers.reachable_peers().await? {
            if peer.latitude != 0.0 || peer.longitude != 0.0 {
                let name: String = peer.peer_id.chars().take(12).collect();
                nodes.push(MapNode {
                    id: peer.id,
                    name: format!("{name}..."),
                    node_type: "peer".into(),
                    coordinates: [peer.latitude, peer.longitude],
                    status: if peer.is_reachable { "online".into() } else { "offline".into() },
                    country: peer.country,
                    city: peer.city,
                });
            }
        }

        Ok(nodes)
    }

    /// Computes the current stats and persists them as one snapshot row.
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn create_snapshot(&self) -> Result<i64, PersistenceError> {
        let stats = self.get_stats().await?;
        let id = self.snapshots.create_snapshot(Utc::now(), &stats).await?;
        tracing::info!(id, total_nodes = stats.total_nodes, "network snapshot created");
        Ok(id)
    }

    /// The most recent snapshots; a non-positive limit falls back to the
    /// default page size.
    pub async fn get_snapshots(
        &self,
        limit: i64,
    ) -> Result<Vec<NetworkSnapshot>, PersistenceError> {
        let limit = if limit <= 0 { DEFAULT_SNAPSHOT_LIMIT } else { limit };
        self.snapshots.snapshots(limit).await
    }

    /// Resolves locations for every active gRPC server and bootstrap node
    /// without a geo fix, paced at the oracle quota. Lookup failures are
    /// logged and skipped; the pass keeps going.
    #[tracing::instrument(skip_all, level = "info")]
    pub async fn update_all_geo_locations(
        &self,
        cancel: &CancellationToken,
    ) -> Result<BackfillSummary, PersistenceError> {
        let mut summary = BackfillSummary::default();

        for server in self.grpc.active_servers().await? {
            if cancel.is_cancelled() {
                return Ok(summary);
            }
            if server.latitude != 0.0 || server.longitude != 0.0 || server.address.is_empty() {
                continue;
            }
            match self.geo.lookup_address(&server.address).await {
                Ok(geo) if geo.is_valid() => {
                    self.grpc.update_geo(server.id, &geo).await?;
                    summary.updated += 1;
                    tracing::info!(
                        server = %server.name,
                        country = %geo.country,
                        city = %geo.city,
                        "updated geo for grpc server",
                    );
                }
                Ok(_) => {
                    summary.failed += 1;
                    tracing::warn!(address = %server.address, "geo lookup returned no usable fix");
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(address = %server.address, error = %e, "geo lookup failed");
                }
            }
            tokio::time::sleep(self.geo.pace()).await;
        }

        for node in self.bootstrap.active_nodes().await? {
            if cancel.is_cancelled() {
                return Ok(summary);
            }
            if node.latitude != 0.0 || node.longitude != 0.0 || node.address.is_empty() {
                continue;
            }
            match self.geo.lookup_address(&node.address).await {
                Ok(geo) if geo.is_valid() => {
                    self.bootstrap.update_geo(node.id, &geo).await?;
                    summary.updated += 1;
                    tracing::info!(
                        node = %node.name,
                        country = %geo.country,
                        city = %geo.city,
                        "updated geo for bootstrap node",
                    );
                }
                Ok(_) => {
                    summary.failed += 1;
                    tracing::warn!(address = %node.address, "geo lookup returned no usable fix");
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(address = %node.address, error = %e, "geo lookup failed");
                }
            }
            tokio::time::sleep(self.geo.pace()).await;
        }

        tracing::info!(
            updated = summary.updated,
            failed = summary.failed,
            "geo location backfill finished",
        );
        Ok(summary)
    }
}

fn score_status(score: f64) -> String {
    if score >= ONLINE_SCORE_THRESHOLD { "online".into() } else { "offline".into() }
}
