//! End-to-end tests for the gossip topology reconciliation cycle.
//!
//! Each test wires the pipeline over an in-memory database and a
//! scripted RPC transport, runs one or more cycles, and verifies the
//! committed state: node rows, snapshot history, rollups, and the
//! durable error log.

use podwatch_core::types::{NodeStatus, NodeTopologyUpdate, Phase};
use podwatch_db::{ErrorLogQueries, NetworkStatsQueries, NodeQueries, SnapshotQueries};
use podwatch_rpc::GET_PODS_WITH_STATS;
use podwatch_tests::helpers::*;
use serde_json::json;

/// Seed one already-known node directly, bypassing the pipeline.
fn seed_node(db: &podwatch_db::Database, ip: &str, status: NodeStatus) {
    db.with_connection(|conn| {
        conn.upsert_topology(
            &NodeTopologyUpdate {
                ip: ip.to_string(),
                pubkey: None,
                version: None,
                country: "Unknown".to_string(),
                lat: 0.0,
                lon: 0.0,
                credits: 0,
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

/// Three candidates: the first two time out, the third answers with one
/// pod in the `{list: [...]}` shape. The cycle must commit that pod and
/// record exactly two transport errors — one per dead candidate.
#[tokio::test]
async fn third_candidate_wins_and_two_errors_are_recorded() {
    let h = harness(test_config(&["10.0.0.1", "10.0.0.2", "10.0.0.3"]));
    h.rpc.script(
        "10.0.0.3:6000",
        GET_PODS_WITH_STATS,
        Ok(json!({"list": [pod_json("10.1.1.1", "abc", "5.5", 120)]})),
    );

    let report = h.gossip.run().await;

    assert!(report.success, "report: {report:?}");
    assert_eq!(report.created, 1);
    assert_eq!(report.errors.len(), 2);

    let node = h
        .db
        .with_connection(|conn| conn.load_node("10.1.1.1"))
        .unwrap()
        .expect("node committed");
    assert_eq!(node.storage_gb, 5.5);
    assert_eq!(node.uptime_secs, 120);
    assert_eq!(node.status, NodeStatus::Active);
    assert_eq!(node.pubkey.as_deref(), Some("abc"));

    let snapshots = h
        .db
        .with_connection(|conn| conn.load_recent_snapshots("10.1.1.1", 10))
        .unwrap();
    assert_eq!(snapshots.len(), 1);

    let rollup = h
        .db
        .with_connection(|conn| conn.latest_network_stats())
        .unwrap()
        .expect("rollup committed");
    assert_eq!(rollup.active_nodes, 1);

    let fetch_errors = h
        .db
        .with_connection(|conn| conn.load_errors(Some("gossip_sync"), Some("fetch"), 10))
        .unwrap();
    assert_eq!(fetch_errors.len(), 2, "one error per dead candidate");
}

/// N valid pods and M invalid (empty or all-zero IP) pods: exactly N
/// active upserts, M validation errors, and every stored node absent
/// from the response flips to inactive.
#[tokio::test]
async fn invalid_pods_are_dropped_and_absent_nodes_deactivate() {
    let h = harness(test_config(&["10.0.0.1"]));
    seed_node(&h.db, "10.9.9.9", NodeStatus::Active);

    h.rpc.script(
        "10.0.0.1:6000",
        GET_PODS_WITH_STATS,
        Ok(json!({"pods": [
            pod_json("10.1.1.1", "aa", "1.0", 60),
            pod_json("10.1.1.2:9001", "bb", "2.0", 61),
            pod_json("", "cc", "3.0", 62),
            pod_json("0.0.0.0", "dd", "4.0", 63),
        ]})),
    );

    let report = h.gossip.run().await;

    assert!(report.success);
    assert_eq!(report.created, 2);
    assert_eq!(report.dropped, 2);

    // Ports are stripped before persisting.
    assert!(h.db.with_connection(|c| c.load_node("10.1.1.2")).unwrap().is_some());
    assert!(h.db.with_connection(|c| c.load_node("10.1.1.2:9001")).unwrap().is_none());

    let active = h.db.with_connection(|c| c.count_by_status(NodeStatus::Active)).unwrap();
    assert_eq!(active, 2);

    // The node missing from this response is now inactive.
    let stale = h.db.with_connection(|c| c.load_node("10.9.9.9")).unwrap().unwrap();
    assert_eq!(stale.status, NodeStatus::Inactive);

    let validation_errors = h
        .db
        .with_connection(|conn| conn.load_errors(None, Some("validation"), 10))
        .unwrap();
    assert_eq!(validation_errors.len(), 2);
}

/// Running the cycle twice on identical upstream data yields identical
/// node rows but one extra snapshot and rollup per run: snapshots are
/// never deduplicated.
#[tokio::test]
async fn rerun_with_identical_input_is_idempotent_on_nodes() {
    let h = harness(test_config(&["10.0.0.1"]));
    h.rpc.script(
        "10.0.0.1:6000",
        GET_PODS_WITH_STATS,
        Ok(json!([pod_json("10.1.1.1", "abc", "5.5", 120)])),
    );

    let first = h.gossip.run().await;
    assert!(first.success);
    assert_eq!(first.created, 1);
    let node_after_first = h.db.with_connection(|c| c.load_node("10.1.1.1")).unwrap().unwrap();

    let second = h.gossip.run().await;
    assert!(second.success);
    assert_eq!(second.created, 0);
    assert_eq!(second.updated, 1);
    let node_after_second = h.db.with_connection(|c| c.load_node("10.1.1.1")).unwrap().unwrap();

    // Same values in every column except the touch timestamp.
    assert_eq!(
        podwatch_core::types::NodeRecord {
            updated_at: 0,
            ..node_after_first
        },
        podwatch_core::types::NodeRecord {
            updated_at: 0,
            ..node_after_second
        }
    );

    let snapshots = h.db.with_connection(|c| c.count_snapshots()).unwrap();
    assert_eq!(snapshots, 2);

    let rollups = h
        .db
        .with_connection(|c| c.load_network_stats_since(0))
        .unwrap();
    assert_eq!(rollups.len(), 2);
}

/// Total fetch exhaustion aborts the cycle before any database write:
/// prior state is untouched and the report is a critical fetch failure.
#[tokio::test]
async fn fetch_exhaustion_leaves_the_store_untouched() {
    let h = harness(test_config(&["10.0.0.1", "10.0.0.2"]));
    seed_node(&h.db, "10.9.9.9", NodeStatus::Active);

    let report = h.gossip.run().await;

    assert!(!report.success);
    assert!(report.is_critical());
    assert_eq!(report.failed_phase, Some(Phase::Fetch));
    assert_eq!(report.errors.len(), 2);

    let node = h.db.with_connection(|c| c.load_node("10.9.9.9")).unwrap().unwrap();
    assert_eq!(node.status, NodeStatus::Active, "prior state must stand");
    assert_eq!(h.db.with_connection(|c| c.count_snapshots()).unwrap(), 0);
    assert!(h.db.with_connection(|c| c.latest_network_stats()).unwrap().is_none());
}

/// A failure inside the commit transaction rolls back everything: the
/// mark-inactive step, the upserts, the snapshots, and the rollup.
#[tokio::test]
async fn commit_failure_rolls_back_the_whole_transaction() {
    let h = harness(test_config(&["10.0.0.1"]));
    seed_node(&h.db, "10.9.9.9", NodeStatus::Active);

    // Poison the snapshot insert for one specific pod.
    h.db.with_connection(|conn| {
        conn.execute_batch(
            "CREATE TRIGGER poison_snapshot BEFORE INSERT ON node_snapshots \
             WHEN NEW.node_ip = '10.1.1.2' \
             BEGIN SELECT RAISE(ABORT, 'induced snapshot failure'); END;",
        )
        .map_err(Into::into)
    })
    .unwrap();

    h.rpc.script(
        "10.0.0.1:6000",
        GET_PODS_WITH_STATS,
        Ok(json!([
            pod_json("10.1.1.1", "aa", "1.0", 60),
            pod_json("10.1.1.2", "bb", "2.0", 61),
        ])),
    );

    let report = h.gossip.run().await;

    assert!(!report.success);
    assert_eq!(report.failed_phase, Some(Phase::Transaction));

    // Nothing from the cycle persisted, including the healthy pod.
    assert!(h.db.with_connection(|c| c.load_node("10.1.1.1")).unwrap().is_none());
    assert_eq!(h.db.with_connection(|c| c.count_snapshots()).unwrap(), 0);
    assert!(h.db.with_connection(|c| c.latest_network_stats()).unwrap().is_none());

    // And the mark-inactive step was rolled back too.
    let prior = h.db.with_connection(|c| c.load_node("10.9.9.9")).unwrap().unwrap();
    assert_eq!(prior.status, NodeStatus::Active);
}

/// Duplicate canonical IPs in one response collapse to a single row
/// (the later record wins), not two rows or two snapshots.
#[tokio::test]
async fn duplicate_addresses_collapse_to_one_canonical_row() {
    let h = harness(test_config(&["10.0.0.1"]));
    h.rpc.script(
        "10.0.0.1:6000",
        GET_PODS_WITH_STATS,
        Ok(json!([
            pod_json("10.1.1.1:9001", "old", "1.0", 60),
            pod_json("10.1.1.1", "new", "2.0", 61),
        ])),
    );

    let report = h.gossip.run().await;
    assert!(report.success);
    assert_eq!(report.created, 1);

    let node = h.db.with_connection(|c| c.load_node("10.1.1.1")).unwrap().unwrap();
    assert_eq!(node.pubkey.as_deref(), Some("new"));
    assert_eq!(node.storage_gb, 2.0);
    assert_eq!(h.db.with_connection(|c| c.count_snapshots()).unwrap(), 1);
}

/// An empty-but-valid pod list is "ran but found nothing to do": a 200
/// class report with `success: false` and no database mutation.
#[tokio::test]
async fn empty_pod_list_commits_nothing() {
    let h = harness(test_config(&["10.0.0.1"]));
    seed_node(&h.db, "10.9.9.9", NodeStatus::Active);
    h.rpc.script("10.0.0.1:6000", GET_PODS_WITH_STATS, Ok(json!({"pods": []})));

    let report = h.gossip.run().await;

    assert!(!report.success);
    assert!(!report.is_critical(), "nothing-to-do is not a failure");

    let node = h.db.with_connection(|c| c.load_node("10.9.9.9")).unwrap().unwrap();
    assert_eq!(node.status, NodeStatus::Active);
}
