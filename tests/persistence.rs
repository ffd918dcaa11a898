//! Integration tests for the persistence layer.

use chrono::{Days, Utc};
use nodewatch::{
    models::{
        peer::PeerSighting,
        status::NewDailyStatus,
        Network, NetworkStatsReport, NodeType, RegistrationStatus,
    },
    monitor::roster::BootstrapRosterEntry,
    persistence::{
        registrations::NewRegistration, RosterRepository, SqliteBootstrapRepository,
        SqlitePeerRepository, SqliteRegistrationRepository, SqliteSnapshotRepository,
        SqliteStatusRepository,
    },
    test_helpers::memory_database,
};

fn roster_entry(name: &str, address: &str) -> BootstrapRosterEntry {
    BootstrapRosterEntry {
        name: name.to_string(),
        email: format!("{name}@example.org"),
        website: String::new(),
        address: address.to_string(),
    }
}

fn status(entity_id: i64, date: chrono::NaiveDate, success: bool) -> NewDailyStatus {
    NewDailyStatus {
        entity_id,
        date,
        color: i64::from(success),
        attempts: 1,
        success,
        error_msg: (!success).then(|| "connection refused".to_string()),
        response_time_ms: success.then_some(12),
        blockchain_height: None,
    }
}

#[tokio::test]
async fn upsert_roster_entry_inserts_then_refreshes() {
    let db = memory_database().await;
    let repo = SqliteBootstrapRepository::new(db.pool());

    repo.upsert_roster_entry(&roster_entry("node-1", "/dns/n1.example.org/tcp/21888/p2p/Qm1"))
        .await
        .unwrap();
    let nodes = repo.active_nodes().await.unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].name, "node-1");

    // Same address, new metadata: refreshed, not duplicated.
    repo.upsert_roster_entry(&roster_entry("node-1-renamed", "/dns/n1.example.org/tcp/21888/p2p/Qm1"))
        .await
        .unwrap();
    let nodes = repo.active_nodes().await.unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].name, "node-1-renamed");
    assert!(repo.exists_by_address("/dns/n1.example.org/tcp/21888/p2p/Qm1").await.unwrap());
}

#[tokio::test]
async fn deactivate_missing_soft_deletes_dropped_nodes() {
    let db = memory_database().await;
    let repo = SqliteBootstrapRepository::new(db.pool());

    repo.upsert_roster_entry(&roster_entry("a", "/dns/a.example.org/tcp/1/p2p/QmA"))
        .await
        .unwrap();
    repo.upsert_roster_entry(&roster_entry("b", "/dns/b.example.org/tcp/1/p2p/QmB"))
        .await
        .unwrap();

    let deactivated = repo
        .deactivate_missing(&["/dns/a.example.org/tcp/1/p2p/QmA".to_string()])
        .await
        .unwrap();
    assert_eq!(deactivated, 1);

    let nodes = repo.active_nodes().await.unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].name, "a");

    // The dropped node's row remains and reactivates on re-sync.
    assert!(repo.exists_by_address("/dns/b.example.org/tcp/1/p2p/QmB").await.unwrap());
    repo.upsert_roster_entry(&roster_entry("b", "/dns/b.example.org/tcp/1/p2p/QmB"))
        .await
        .unwrap();
    assert_eq!(repo.active_nodes().await.unwrap().len(), 2);
}

#[tokio::test]
async fn create_status_upserts_per_entity_and_day() {
    let db = memory_database().await;
    let repo = SqliteBootstrapRepository::new(db.pool());
    let statuses = SqliteStatusRepository::bootstrap(db.pool());

    repo.upsert_roster_entry(&roster_entry("a", "/dns/a.example.org/tcp/1/p2p/QmA"))
        .await
        .unwrap();
    let node = &repo.active_nodes().await.unwrap()[0];
    let today = Utc::now().date_naive();

    let first_id = statuses.create_status(&status(node.id, today, false)).await.unwrap();
    assert!(statuses.has_status_for_date(node.id, today).await.unwrap());

    // Re-probe on the same day: same row, last writer wins.
    let second_id = statuses.create_status(&status(node.id, today, true)).await.unwrap();
    assert_eq!(first_id, second_id);
    assert_eq!(statuses.count_for_date(today).await.unwrap(), 1);

    let row = statuses.status_for_date(node.id, today).await.unwrap().unwrap();
    assert!(row.success);
    assert_eq!(row.color, 1);
    assert_eq!(row.error_msg, None);
}

#[tokio::test]
async fn update_all_scores_matches_success_ratio() {
    let db = memory_database().await;
    let repo = SqliteBootstrapRepository::new(db.pool());
    let statuses = SqliteStatusRepository::bootstrap(db.pool());

    repo.upsert_roster_entry(&roster_entry("x", "/dns/x.example.org/tcp/1/p2p/QmX"))
        .await
        .unwrap();
    let node = &repo.active_nodes().await.unwrap()[0];
    let today = Utc::now().date_naive();

    // 18 successful and 12 failed days inside the trailing window.
    for offset in 0..30u64 {
        let date = today.checked_sub_days(Days::new(offset)).unwrap();
        statuses.create_status(&status(node.id, date, offset < 18)).await.unwrap();
    }

    repo.update_all_scores().await.unwrap();
    let node = &repo.active_nodes().await.unwrap()[0];
    assert_eq!(node.overall_score, 60.0);
}

#[tokio::test]
async fn score_is_zero_without_status_rows() {
    let db = memory_database().await;
    let repo = SqliteBootstrapRepository::new(db.pool());

    repo.upsert_roster_entry(&roster_entry("x", "/dns/x.example.org/tcp/1/p2p/QmX"))
        .await
        .unwrap();
    repo.update_all_scores().await.unwrap();

    let node = &repo.active_nodes().await.unwrap()[0];
    assert_eq!(node.overall_score, 0.0);
}

#[tokio::test]
async fn recent_statuses_returns_dense_series() {
    let db = memory_database().await;
    let repo = SqliteBootstrapRepository::new(db.pool());
    let statuses = SqliteStatusRepository::bootstrap(db.pool());

    repo.upsert_roster_entry(&roster_entry("x", "/dns/x.example.org/tcp/1/p2p/QmX"))
        .await
        .unwrap();
    let node = &repo.active_nodes().await.unwrap()[0];
    let today = Utc::now().date_naive();

    // Only two recorded days: success two days ago, failure five days ago.
    statuses
        .create_status(&status(node.id, today.checked_sub_days(Days::new(2)).unwrap(), true))
        .await
        .unwrap();
    statuses
        .create_status(&status(node.id, today.checked_sub_days(Days::new(5)).unwrap(), false))
        .await
        .unwrap();

    let series = statuses.recent_statuses(node.id, 30).await.unwrap();
    assert_eq!(series.len(), 30);
    assert_eq!(series[27].color, 1);
    assert_eq!(series[24].color, 0);
    assert_eq!(series[29].date, today.format("%Y-%m-%d").to_string());

    // Dates strictly increase by one day; gaps are color 0.
    for (i, item) in series.iter().enumerate() {
        let expected = today.checked_sub_days(Days::new(29 - i as u64)).unwrap();
        assert_eq!(item.date, expected.format("%Y-%m-%d").to_string());
        if i != 27 {
            assert_eq!(item.color, 0, "unexpected color at index {i}");
        }
    }
}

#[tokio::test]
async fn status_maintenance_operations() {
    let db = memory_database().await;
    let repo = SqliteBootstrapRepository::new(db.pool());
    let statuses = SqliteStatusRepository::bootstrap(db.pool());

    repo.upsert_roster_entry(&roster_entry("x", "/dns/x.example.org/tcp/1/p2p/QmX"))
        .await
        .unwrap();
    let node = &repo.active_nodes().await.unwrap()[0];
    let today = Utc::now().date_naive();

    for offset in 0..10u64 {
        let date = today.checked_sub_days(Days::new(offset)).unwrap();
        statuses.create_status(&status(node.id, date, true)).await.unwrap();
    }

    let window_start = today.checked_sub_days(Days::new(4)).unwrap();
    let in_range = statuses.statuses_in_range(window_start, today).await.unwrap();
    assert_eq!(in_range.len(), 5);
    assert_eq!(in_range[0].date, today);

    let removed = statuses.delete_statuses_before(window_start).await.unwrap();
    assert_eq!(removed, 5);
}

#[tokio::test]
async fn peer_aggregations() {
    let db = memory_database().await;
    let repo = SqlitePeerRepository::new(db.pool());
    let now = Utc::now();

    let sightings = [
        ("peer-de-1", "Germany", "DE", true),
        ("peer-de-2", "Germany", "DE", true),
        ("peer-fi-1", "Finland", "FI", true),
        ("peer-unreachable", "Finland", "FI", false),
    ];
    for (peer_id, country, code, connected) in sightings {
        repo.upsert_sighting(&PeerSighting {
            peer_id: peer_id.to_string(),
            address: format!("/ip4/10.0.0.1/tcp/21888/p2p/{peer_id}"),
            protocol: "/pactus/1.0".to_string(),
            user_agent: "pactus/1.7".to_string(),
            seen_at: now,
            connected,
        })
        .await
        .unwrap();
        let peer = repo.peer_by_peer_id(peer_id).await.unwrap().unwrap();
        repo.update_geo(
            peer.id,
            "10.0.0.1",
            &nodewatch::models::GeoLocation {
                status: "success".into(),
                country: country.into(),
                country_code: code.into(),
                latitude: 50.0,
                longitude: 10.0,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    }

    assert_eq!(repo.count_reachable().await.unwrap(), 3);
    assert_eq!(repo.count_countries().await.unwrap(), 2);
    assert_eq!(repo.avg_uptime().await.unwrap(), 100.0);

    let top = repo.top_countries(10).await.unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].country, "Germany");
    assert_eq!(top[0].count, 2);
    assert_eq!(top[1].country_code, "FI");
}

#[tokio::test]
async fn repeated_sightings_accumulate_counters() {
    let db = memory_database().await;
    let repo = SqlitePeerRepository::new(db.pool());
    let now = Utc::now();

    for connected in [true, true, false, true] {
        repo.upsert_sighting(&PeerSighting {
            peer_id: "peer-1".to_string(),
            address: "/ip4/10.0.0.1/tcp/21888/p2p/peer-1".to_string(),
            protocol: "/pactus/1.0".to_string(),
            user_agent: "pactus/1.7".to_string(),
            seen_at: now,
            connected,
        })
        .await
        .unwrap();
    }

    let peer = repo.peer_by_peer_id("peer-1").await.unwrap().unwrap();
    assert_eq!(peer.connection_attempts, 4);
    assert_eq!(peer.successful_connections, 3);
    assert_eq!(peer.overall_score, 75.0);
    assert!(peer.is_reachable);
}

#[tokio::test]
async fn peer_status_table_shares_the_daily_status_shape() {
    let db = memory_database().await;
    let peers = SqlitePeerRepository::new(db.pool());
    let statuses = SqliteStatusRepository::peers(db.pool());
    let today = Utc::now().date_naive();

    peers
        .upsert_sighting(&PeerSighting {
            peer_id: "peer-1".to_string(),
            address: "/ip4/10.0.0.1/tcp/21888/p2p/peer-1".to_string(),
            protocol: "/pactus/1.0".to_string(),
            user_agent: "pactus/1.7".to_string(),
            seen_at: Utc::now(),
            connected: true,
        })
        .await
        .unwrap();
    let peer = peers.peer_by_peer_id("peer-1").await.unwrap().unwrap();

    let id = statuses.create_status(&status(peer.id, today, true)).await.unwrap();
    let again = statuses.create_status(&status(peer.id, today, true)).await.unwrap();
    assert_eq!(id, again);

    let series = statuses.recent_statuses(peer.id, 30).await.unwrap();
    assert_eq!(series.len(), 30);
    assert_eq!(series[29].color, 1);
}

#[tokio::test]
async fn snapshots_are_persisted_and_listed_newest_first() {
    let db = memory_database().await;
    let repo = SqliteSnapshotRepository::new(db.pool());

    let stats = NetworkStatsReport {
        total_nodes: 12,
        reachable_nodes: 8,
        countries_count: 3,
        avg_uptime: 91.5,
        top_countries: vec![],
        grpc_nodes: 2,
        jsonrpc_nodes: 1,
        bootstrap_nodes: 1,
    };

    let earlier = Utc::now().checked_sub_days(Days::new(1)).unwrap();
    repo.create_snapshot(earlier, &stats).await.unwrap();
    repo.create_snapshot(Utc::now(), &stats).await.unwrap();

    let snapshots = repo.snapshots(10).await.unwrap();
    assert_eq!(snapshots.len(), 2);
    assert!(snapshots[0].timestamp > snapshots[1].timestamp);
    assert_eq!(snapshots[0].total_nodes, 12);
    assert!(snapshots[0].reachable_nodes <= snapshots[0].total_nodes);
    assert_eq!(snapshots[0].snapshot_data.0, serde_json::json!({}));

    let limited = repo.snapshots(1).await.unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn registration_lifecycle_in_store() {
    let db = memory_database().await;
    let repo = SqliteRegistrationRepository::new(db.pool());

    let id = repo
        .create(&NewRegistration {
            node_type: NodeType::Grpc,
            name: "Example".to_string(),
            address: "grpc.example.com:50051".to_string(),
            network: Network::Mainnet,
            email: "o@x.y".to_string(),
            website: String::new(),
        })
        .await
        .unwrap();

    let registration = repo.get(id).await.unwrap().unwrap();
    assert_eq!(registration.status, RegistrationStatus::Pending);
    assert!(repo.exists_active_by_address("grpc.example.com:50051").await.unwrap());
    assert_eq!(repo.by_status(RegistrationStatus::Pending).await.unwrap().len(), 1);

    repo.mark_reviewed(id, RegistrationStatus::Rejected, "unreachable from EU", "admin", Utc::now())
        .await
        .unwrap();
    let registration = repo.get(id).await.unwrap().unwrap();
    assert_eq!(registration.status, RegistrationStatus::Rejected);
    assert_eq!(registration.rejection_reason, "unreachable from EU");
    assert_eq!(registration.reviewed_by, "admin");
    assert!(registration.reviewed_at.is_some());

    // A rejected registration no longer owns its address.
    assert!(!repo.exists_active_by_address("grpc.example.com:50051").await.unwrap());

    assert!(repo.get(9999).await.unwrap().is_none());
}
