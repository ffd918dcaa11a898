//! Integration tests for the health-monitor template and roster sync.

use std::{io::Write, sync::Arc};

use chrono::Utc;
use nodewatch::{
    context::Metrics,
    geo::GeoCache,
    models::{Network, NodeType, RegisterNodeParams},
    monitor::{roster, HealthMonitor},
    persistence::{
        SqliteBootstrapRepository, SqliteGrpcServerRepository, SqliteJsonRpcServerRepository,
        SqliteRegistrationRepository, SqliteStatusRepository,
    },
    registration::RegistrationService,
    test_helpers::{memory_database, ScriptedProbe},
};
use tokio_util::sync::CancellationToken;

const ADDR_1: &str = "/dns/n1.example.org/tcp/21888/p2p/Qm1";
const ADDR_2: &str = "/dns/n2.example.org/tcp/21888/p2p/Qm2";
const ADDR_3: &str = "/dns/n3.example.org/tcp/21888/p2p/Qm3";

fn entry(name: &str, address: &str) -> roster::BootstrapRosterEntry {
    roster::BootstrapRosterEntry {
        name: name.to_string(),
        email: String::new(),
        website: String::new(),
        address: address.to_string(),
    }
}

/// A geo cache pointed at an unroutable oracle: every lookup fails fast,
/// exercising the best-effort paths.
fn offline_geo() -> Arc<GeoCache> {
    Arc::new(
        GeoCache::new(
            "http://127.0.0.1:1".into(),
            std::time::Duration::from_secs(600),
            std::time::Duration::from_millis(1),
        )
        .unwrap(),
    )
}

#[tokio::test]
async fn check_all_records_one_row_per_entity_and_is_idempotent() {
    let db = memory_database().await;
    let repo = Arc::new(SqliteBootstrapRepository::new(db.pool()));
    let statuses = SqliteStatusRepository::bootstrap(db.pool());

    for (name, address) in [("n1", ADDR_1), ("n2", ADDR_2), ("n3", ADDR_3)] {
        repo.upsert_roster_entry(&entry(name, address)).await.unwrap();
    }

    // Node 2 answers; 1 and 3 do not.
    let probe = Arc::new(
        ScriptedProbe::failing().with_outcome(ADDR_2, true),
    );
    let monitor = HealthMonitor::new(
        "bootstrap",
        Arc::clone(&repo),
        statuses.clone(),
        Arc::clone(&probe) as _,
        Metrics::new(),
    );

    let summary = monitor.check_all(&CancellationToken::new()).await.unwrap();
    assert_eq!(summary.roster, 3);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.skipped, 0);

    let today = Utc::now().date_naive();
    assert_eq!(statuses.count_for_date(today).await.unwrap(), 3);

    let nodes = repo.active_nodes().await.unwrap();
    for node in &nodes {
        let row = statuses.status_for_date(node.id, today).await.unwrap().unwrap();
        if node.address == ADDR_2 {
            assert!(row.success);
            assert_eq!(row.color, 1);
        } else {
            assert!(!row.success);
            assert_eq!(row.color, 0);
            assert!(row.error_msg.is_some());
        }
        assert!(row.attempts >= 1);
    }

    // Scores recomputed after the batch.
    let nodes = repo.active_nodes().await.unwrap();
    let up = nodes.iter().find(|n| n.address == ADDR_2).unwrap();
    let down = nodes.iter().find(|n| n.address == ADDR_1).unwrap();
    assert_eq!(up.overall_score, 100.0);
    assert_eq!(down.overall_score, 0.0);

    // Second run on the same UTC day short-circuits on the per-day check:
    // same row count, no further probe calls.
    assert_eq!(probe.calls(), 3);
    let summary = monitor.check_all(&CancellationToken::new()).await.unwrap();
    assert_eq!(summary.skipped, 3);
    assert_eq!(summary.succeeded + summary.failed, 0);
    assert_eq!(statuses.count_for_date(today).await.unwrap(), 3);
    assert_eq!(probe.calls(), 3);
}

#[tokio::test]
async fn cancelled_batch_skips_score_update_and_records_nothing() {
    let db = memory_database().await;
    let repo = Arc::new(SqliteBootstrapRepository::new(db.pool()));
    let statuses = SqliteStatusRepository::bootstrap(db.pool());
    repo.upsert_roster_entry(&entry("n1", ADDR_1)).await.unwrap();

    let monitor = HealthMonitor::new(
        "bootstrap",
        Arc::clone(&repo),
        statuses.clone(),
        Arc::new(ScriptedProbe::failing()) as _,
        Metrics::new(),
    );

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = monitor.check_all(&cancel).await.unwrap_err();
    assert!(matches!(err, nodewatch::monitor::MonitorError::Cancelled));
    assert_eq!(statuses.count_for_date(Utc::now().date_naive()).await.unwrap(), 0);
}

#[tokio::test]
async fn roster_sync_is_idempotent_and_deactivates_dropped_entries() {
    let db = memory_database().await;
    let repo = SqliteBootstrapRepository::new(db.pool());

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"[{{"name":"n1","address":"{ADDR_1}"}},{{"name":"n2","address":"{ADDR_2}"}}]"#,
    )
    .unwrap();

    let summary = roster::sync_bootstrap_nodes(&repo, file.path()).await.unwrap();
    assert_eq!(summary.added, 2);
    assert_eq!(summary.updated, 0);
    assert_eq!(summary.deactivated, 0);

    // Unchanged source: no net mutation.
    let summary = roster::sync_bootstrap_nodes(&repo, file.path()).await.unwrap();
    assert_eq!(summary.added, 0);
    assert_eq!(summary.updated, 2);
    assert_eq!(summary.deactivated, 0);
    assert_eq!(repo.active_nodes().await.unwrap().len(), 2);

    // Dropping an entry deactivates it, keeping its row.
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"[{{"name":"n1","address":"{ADDR_1}"}}]"#).unwrap();
    let summary = roster::sync_bootstrap_nodes(&repo, file.path()).await.unwrap();
    assert_eq!(summary.deactivated, 1);
    assert_eq!(repo.active_nodes().await.unwrap().len(), 1);
    assert!(repo.exists_by_address(ADDR_2).await.unwrap());
}

#[tokio::test]
async fn grpc_roster_sync_assigns_networks() {
    let db = memory_database().await;
    let repo = SqliteGrpcServerRepository::new(db.pool());

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"mainnet":["grpc1.example.org:50051"],"testnet":["tn1.example.org:50052"]}}"#,
    )
    .unwrap();

    let summary = roster::sync_grpc_servers(&repo, file.path()).await.unwrap();
    assert_eq!(summary.added, 2);

    let servers = repo.active_servers().await.unwrap();
    assert_eq!(servers.len(), 2);
    let mainnet = servers.iter().find(|s| s.address == "grpc1.example.org:50051").unwrap();
    assert_eq!(mainnet.network, Network::Mainnet);
    // Roster servers are named after their address.
    assert_eq!(mainnet.name, "grpc1.example.org:50051");
}

#[tokio::test]
async fn approved_registration_joins_the_next_batch() {
    let db = memory_database().await;
    let grpc_repo = Arc::new(SqliteGrpcServerRepository::new(db.pool()));
    let jsonrpc_repo = Arc::new(SqliteJsonRpcServerRepository::new(db.pool()));
    let registration_repo = Arc::new(SqliteRegistrationRepository::new(db.pool()));

    let probe = Arc::new(ScriptedProbe::succeeding());
    let service = RegistrationService::new(
        registration_repo,
        Arc::clone(&grpc_repo),
        Arc::clone(&jsonrpc_repo),
        Arc::clone(&probe) as _,
        Arc::new(ScriptedProbe::succeeding()) as _,
        offline_geo(),
    );

    let response = service
        .submit(
            &CancellationToken::new(),
            RegisterNodeParams {
                node_type: NodeType::Grpc,
                name: "Example".into(),
                address: "10.0.0.7:50051".into(),
                network: Network::Mainnet,
                email: "o@x.y".into(),
                website: String::new(),
            },
        )
        .await
        .unwrap();

    service.approve(response.id, "admin").await.unwrap();
    assert!(grpc_repo.exists_by_address("10.0.0.7:50051").await.unwrap());

    // The promoted server is part of the next monitor batch.
    let monitor = HealthMonitor::new(
        "grpc",
        Arc::clone(&grpc_repo),
        SqliteStatusRepository::grpc(db.pool()),
        Arc::new(ScriptedProbe::succeeding()) as _,
        Metrics::new(),
    );
    let summary = monitor.check_all(&CancellationToken::new()).await.unwrap();
    assert_eq!(summary.roster, 1);
    assert_eq!(summary.succeeded, 1);
}
