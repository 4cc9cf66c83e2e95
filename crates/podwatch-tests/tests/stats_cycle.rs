//! End-to-end tests for the stats updater reconciliation cycle.

use podwatch_core::types::{NodeStatus, NodeTopologyUpdate};
use podwatch_db::{ErrorLogQueries, NetworkStatsQueries, NodeQueries, SnapshotQueries};
use podwatch_rpc::GET_STATS;
use podwatch_sync::{StatsScope, SyncConfig};
use podwatch_tests::helpers::*;

fn seed_node(db: &podwatch_db::Database, ip: &str, credits: i64, status: NodeStatus) {
    db.with_connection(|conn| {
        conn.upsert_topology(
            &NodeTopologyUpdate {
                ip: ip.to_string(),
                pubkey: Some(format!("pk-{ip}")),
                version: None,
                country: "US".to_string(),
                lat: 0.0,
                lon: 0.0,
                credits,
                storage_gb: 1.0,
                uptime_secs: 10,
                is_public: false,
            },
            500,
        )?;
        conn.set_status(ip, status, 500)?;
        Ok(())
    })
    .unwrap();
}

/// A responsive pod gets its stats-owned fields updated, status active,
/// and one populated snapshot. file_size arrives in bytes and is stored
/// in gigabytes; ram percent is computed from used/total.
#[tokio::test]
async fn responsive_pod_updates_metrics_and_appends_snapshot() {
    let h = harness(test_config(&[]));
    seed_node(&h.db, "10.1.1.1", 75, NodeStatus::Inactive);
    h.rpc.script(
        "10.1.1.1:6000",
        GET_STATS,
        Ok(stats_json(12.5, 512, 1024, 2 * 1_073_741_824)),
    );

    let report = h.stats.run().await;

    assert!(report.success, "report: {report:?}");
    assert_eq!(report.processed, 1);
    assert_eq!(report.updated, 1);

    let node = h.db.with_connection(|c| c.load_node("10.1.1.1")).unwrap().unwrap();
    assert_eq!(node.status, NodeStatus::Active);
    assert_eq!(node.cpu_percent, 12.5);
    assert_eq!(node.ram_percent, 50.0);
    assert_eq!(node.ram_used, 512);
    assert_eq!(node.ram_total, 1024);
    assert_eq!(node.storage_gb, 2.0);
    assert_eq!(node.uptime_secs, 300);
    assert_eq!(node.active_streams, 2);
    // Topology-owned fields are untouched by the stats cycle.
    assert_eq!(node.credits, 75);
    assert_eq!(node.country, "US");

    let snapshots = h
        .db
        .with_connection(|c| c.load_recent_snapshots("10.1.1.1", 10))
        .unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].status, NodeStatus::Active);
    assert_eq!(snapshots[0].credits, 75);
    assert_eq!(snapshots[0].ram_percent, 50.0);

    let rollup = h.db.with_connection(|c| c.latest_network_stats()).unwrap().unwrap();
    assert_eq!(rollup.active_nodes, 1);
    assert_eq!(rollup.inactive_nodes, 0);
    assert_eq!(rollup.total_storage_gb, 2.0);
    assert_eq!(rollup.total_credits, 75);
}

/// ram_total of zero must not divide: percent reads as zero.
#[tokio::test]
async fn zero_ram_total_yields_zero_percent() {
    let h = harness(test_config(&[]));
    seed_node(&h.db, "10.1.1.1", 0, NodeStatus::Active);
    h.rpc.script("10.1.1.1:6000", GET_STATS, Ok(stats_json(5.0, 512, 0, 0)));

    let report = h.stats.run().await;
    assert!(report.success);

    let node = h.db.with_connection(|c| c.load_node("10.1.1.1")).unwrap().unwrap();
    assert_eq!(node.ram_percent, 0.0);
}

/// An unreachable pod flips to inactive and gets a zeroed snapshot.
#[tokio::test]
async fn unreachable_pod_goes_inactive_with_zeroed_snapshot() {
    let h = harness(test_config(&[]));
    seed_node(&h.db, "10.1.1.1", 40, NodeStatus::Active);
    // Nothing scripted: the call times out.

    let report = h.stats.run().await;

    assert!(report.success);
    assert_eq!(report.dropped, 1);
    assert_eq!(report.updated, 0);

    let node = h.db.with_connection(|c| c.load_node("10.1.1.1")).unwrap().unwrap();
    assert_eq!(node.status, NodeStatus::Inactive);

    let snapshots = h
        .db
        .with_connection(|c| c.load_recent_snapshots("10.1.1.1", 10))
        .unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].status, NodeStatus::Inactive);
    assert_eq!(snapshots[0].credits, 0);
    assert_eq!(snapshots[0].storage_gb, 0.0);
    assert_eq!(snapshots[0].cpu_percent, 0.0);
}

/// A node whose update itself errors keeps its prior stored status and
/// produces no snapshot that cycle — transient store errors must not
/// flap the node.
#[tokio::test]
async fn failing_update_keeps_prior_status_and_skips_snapshot() {
    let h = harness(test_config(&[]));
    seed_node(&h.db, "10.1.1.1", 10, NodeStatus::Active);
    seed_node(&h.db, "10.1.1.2", 20, NodeStatus::Active);

    // Poison every UPDATE touching the second node.
    h.db.with_connection(|conn| {
        conn.execute_batch(
            "CREATE TRIGGER poison_update BEFORE UPDATE ON nodes \
             WHEN NEW.ip = '10.1.1.2' \
             BEGIN SELECT RAISE(ABORT, 'induced update failure'); END;",
        )
        .map_err(Into::into)
    })
    .unwrap();

    h.rpc.script("10.1.1.1:6000", GET_STATS, Ok(stats_json(1.0, 1, 2, 0)));
    h.rpc.script("10.1.1.2:6000", GET_STATS, Ok(stats_json(2.0, 1, 2, 0)));

    let report = h.stats.run().await;

    // The healthy node went through; the poisoned one is an error.
    assert_eq!(report.processed, 2);
    assert_eq!(report.updated, 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].node_ip.as_deref(), Some("10.1.1.2"));

    let poisoned = h.db.with_connection(|c| c.load_node("10.1.1.2")).unwrap().unwrap();
    assert_eq!(poisoned.status, NodeStatus::Active, "status must not flap");

    let snapshots = h
        .db
        .with_connection(|c| c.load_recent_snapshots("10.1.1.2", 10))
        .unwrap();
    assert!(snapshots.is_empty(), "no snapshot for the errored node");

    let logged = h
        .db
        .with_connection(|c| c.load_errors(Some("stats_updater"), Some("stats_query"), 10))
        .unwrap();
    assert_eq!(logged.len(), 1);
}

/// With `ActiveOnly` scope, inactive nodes are not queried at all.
#[tokio::test]
async fn active_only_scope_skips_inactive_nodes() {
    let config = SyncConfig {
        stats_scope: StatsScope::ActiveOnly,
        ..test_config(&[])
    };
    let h = harness(config);
    seed_node(&h.db, "10.1.1.1", 0, NodeStatus::Active);
    seed_node(&h.db, "10.1.1.2", 0, NodeStatus::Inactive);
    h.rpc.script("10.1.1.1:6000", GET_STATS, Ok(stats_json(1.0, 1, 2, 0)));

    let report = h.stats.run().await;

    assert!(report.success);
    assert_eq!(report.processed, 1);
    let called: Vec<String> = h.rpc.call_log().into_iter().map(|(e, _)| e).collect();
    assert_eq!(called, vec!["10.1.1.1:6000".to_string()]);
}

/// Every candidate across multiple batches is processed.
#[tokio::test]
async fn batching_covers_all_candidates() {
    let config = SyncConfig {
        stats_batch_size: 2,
        ..test_config(&[])
    };
    let h = harness(config);
    for i in 1..=5 {
        seed_node(&h.db, &format!("10.1.1.{i}"), 0, NodeStatus::Active);
    }

    let report = h.stats.run().await;

    assert_eq!(report.processed, 5);
    assert_eq!(h.rpc.call_count(), 5);
    // All unreachable, so all are now inactive with zeroed snapshots.
    assert_eq!(report.dropped, 5);
    assert_eq!(h.db.with_connection(|c| c.count_snapshots()).unwrap(), 5);
}

/// A store with no nodes is "ran but found nothing to do".
#[tokio::test]
async fn empty_candidate_set_is_not_an_error() {
    let h = harness(test_config(&[]));
    let report = h.stats.run().await;

    assert!(!report.success);
    assert!(!report.is_critical());
    assert_eq!(report.processed, 0);
}
