//! Cache-layer behavior across the pipeline: eager refresh after
//! commits, hit-without-store-query semantics, and the geo cache's
//! zero-outbound-call guarantee.

use podwatch_core::types::{GeoInfo, NodeStatus, NodeTopologyUpdate};
use podwatch_db::{GeoQueries, NodeQueries};
use podwatch_rpc::GET_PODS_WITH_STATS;
use podwatch_sync::{compute_node_list, StatsRange};
use podwatch_tests::helpers::*;
use serde_json::json;

/// After a successful gossip commit both cache layers are eagerly
/// repopulated — a subsequent read is a hit, not a recompute.
#[tokio::test]
async fn gossip_commit_eagerly_repopulates_both_caches() {
    let h = harness(test_config(&["10.0.0.1"]));
    h.rpc.script(
        "10.0.0.1:6000",
        GET_PODS_WITH_STATS,
        Ok(json!([pod_json("10.1.1.1", "abc", "5.5", 120)])),
    );

    assert!(h.node_cache.get().is_none());
    let report = h.gossip.run().await;
    assert!(report.success);

    let list = h.node_cache.get().expect("node-list cache populated");
    assert_eq!(list.nodes.len(), 1);
    assert_eq!(list.nodes[0].ip, "10.1.1.1");
    assert_eq!(list.stats.active_count, 1);

    for range in StatsRange::ALL {
        let payload = h.stats_cache.get(range).expect("stats cache populated");
        assert_eq!(payload.current.as_ref().unwrap().active_nodes, 1);
    }
}

/// The read path never re-queries the store on a hit: the cached
/// payload stays byte-identical even after the store changes underneath
/// it. Only explicit invalidation (the next refresh) moves it forward.
#[tokio::test]
async fn cache_hit_ignores_store_changes_until_invalidated() {
    let h = harness(test_config(&[]));
    h.db.with_connection(|conn| {
        conn.upsert_topology(
            &NodeTopologyUpdate {
                ip: "10.1.1.1".to_string(),
                pubkey: None,
                version: None,
                country: "US".to_string(),
                lat: 0.0,
                lon: 0.0,
                credits: 5,
                storage_gb: 1.0,
                uptime_secs: 10,
                is_public: false,
            },
            500,
        )?;
        Ok(())
    })
    .unwrap();

    // First read: compute from the store and populate the slot.
    let payload = compute_node_list(&h.db, 1_000).unwrap();
    h.node_cache.set(payload);
    let first = h.node_cache.get().unwrap();
    let first_json = serde_json::to_string(&*first).unwrap();

    // Mutate the store directly. The cached slot must not notice.
    h.db.with_connection(|conn| conn.set_status("10.1.1.1", NodeStatus::Inactive, 2_000))
        .unwrap();

    let second = h.node_cache.get().unwrap();
    let second_json = serde_json::to_string(&*second).unwrap();
    assert_eq!(first_json, second_json, "hit must be byte-identical");

    // Explicit invalidation brings the change into view.
    h.node_cache.clear();
    assert!(h.node_cache.get().is_none());
    let recomputed = compute_node_list(&h.db, 3_000).unwrap();
    assert_eq!(recomputed.stats.active_count, 0);
}

/// A pre-resolved IP in the geo cache is served with zero outbound
/// calls: the gossip cycle picks up the cached triple even with the
/// lookup endpoint disabled.
#[tokio::test]
async fn gossip_uses_cached_geo_without_outbound_lookup() {
    let h = harness(test_config(&["10.0.0.1"]));
    h.db.with_connection(|conn| {
        conn.put_geo(
            "10.1.1.1",
            &GeoInfo { country: "US".to_string(), lat: 1.0, lon: 2.0 },
        )
    })
    .unwrap();

    h.rpc.script(
        "10.0.0.1:6000",
        GET_PODS_WITH_STATS,
        Ok(json!([pod_json("10.1.1.1", "abc", "5.5", 120)])),
    );

    let report = h.gossip.run().await;
    assert!(report.success);

    let node = h.db.with_connection(|c| c.load_node("10.1.1.1")).unwrap().unwrap();
    assert_eq!(node.country, "US");
    assert_eq!(node.lat, 1.0);
    assert_eq!(node.lon, 2.0);

    // The only RPC traffic was the gossip fetch itself.
    assert_eq!(h.rpc.call_count(), 1);
}

/// An unresolved IP with lookups disabled falls back to the Unknown
/// sentinel, and the sentinel is not written into the cache.
#[tokio::test]
async fn unresolved_geo_falls_back_to_sentinel_uncached() {
    let h = harness(test_config(&["10.0.0.1"]));
    h.rpc.script(
        "10.0.0.1:6000",
        GET_PODS_WITH_STATS,
        Ok(json!([pod_json("10.1.1.1", "abc", "5.5", 120)])),
    );

    let report = h.gossip.run().await;
    assert!(report.success);

    let node = h.db.with_connection(|c| c.load_node("10.1.1.1")).unwrap().unwrap();
    assert_eq!(node.country, "Unknown");

    let cached = h.db.with_connection(|c| c.get_geo("10.1.1.1")).unwrap();
    assert!(cached.is_none(), "sentinel must never be cached");
}
