//! Read-path payload computation.
//!
//! Everything the read API serves is computed here, from the store, in
//! one place — both for eager cache refresh after a commit and as the
//! direct-computation fallback when a refresh has failed.

use serde::Serialize;
use tracing::debug;

use podwatch_core::types::{NetworkStatsRow, NodeRecord};
use podwatch_db::{Database, NetworkStatsQueries, NodeQueries, StoreError};

use crate::cache::{NetworkStatsCache, NodeListCache, StatsRange};

/// One node as served by the list and detail endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeView {
    pub ip: String,
    pub pubkey: Option<String>,
    pub version: Option<String>,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    pub credits: i64,
    pub storage_gb: f64,
    pub uptime_secs: i64,
    pub status: String,
    pub cpu_percent: f64,
    pub ram_percent: f64,
    pub ram_used: i64,
    pub ram_total: i64,
    pub active_streams: i64,
    pub packets_received: i64,
    pub packets_sent: i64,
    pub is_public: bool,
    pub updated_at: i64,
}

impl From<&NodeRecord> for NodeView {
    fn from(n: &NodeRecord) -> Self {
        Self {
            ip: n.ip.clone(),
            pubkey: n.pubkey.clone(),
            version: n.version.clone(),
            country: n.country.clone(),
            lat: n.lat,
            lon: n.lon,
            credits: n.credits,
            storage_gb: n.storage_gb,
            uptime_secs: n.uptime_secs,
            status: n.status.as_str().to_string(),
            cpu_percent: n.cpu_percent,
            ram_percent: n.ram_percent,
            ram_used: n.ram_used,
            ram_total: n.ram_total,
            active_streams: n.active_streams,
            packets_received: n.packets_received,
            packets_sent: n.packets_sent,
            is_public: n.is_public,
            updated_at: n.updated_at,
        }
    }
}

/// Aggregates precomputed alongside the node list.
///
/// Credit totals are serialized as decimal strings: the network-wide sum
/// can exceed what a browser-side double represents exactly.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAggregates {
    pub total_storage_gb: f64,
    pub total_credits: String,
    pub active_count: i64,
    pub avg_uptime_secs: f64,
}

/// The node-list cache payload: full formatted list plus aggregates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeListPayload {
    pub nodes: Vec<NodeView>,
    pub stats: ListAggregates,
    pub captured_at: i64,
}

/// Current totals as served by the network-stats endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupView {
    pub active_nodes: i64,
    pub inactive_nodes: i64,
    pub total_storage_gb: f64,
    pub total_credits: String,
    pub created_at: i64,
}

impl From<&NetworkStatsRow> for RollupView {
    fn from(r: &NetworkStatsRow) -> Self {
        Self {
            active_nodes: r.active_nodes,
            inactive_nodes: r.inactive_nodes,
            total_storage_gb: r.total_storage_gb,
            total_credits: r.total_credits.to_string(),
            created_at: r.created_at,
        }
    }
}

/// One time bucket of the series: the last rollup that fell inside it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketView {
    pub bucket_start: i64,
    pub active_nodes: i64,
    pub inactive_nodes: i64,
    pub total_storage_gb: f64,
    pub total_credits: String,
}

/// The network-stats cache payload for one range.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatsPayload {
    pub range: &'static str,
    pub bucket_secs: i64,
    pub current: Option<RollupView>,
    pub series: Vec<BucketView>,
    pub captured_at: i64,
}

impl NetworkStatsPayload {
    /// Payload for a range with no data yet.
    pub fn empty(range: StatsRange, bucket_secs: i64) -> Self {
        Self {
            range: range.label(),
            bucket_secs,
            current: None,
            series: Vec::new(),
            captured_at: 0,
        }
    }
}

/// Bucket width for a series spanning `age_secs` of actual data.
///
/// Bounded ranges get a fixed width matched to their span; the unbounded
/// range picks a width from how old the data really is, so a young
/// deployment still charts hourly instead of one flat weekly bar.
pub fn bucket_width_secs(range: StatsRange, age_secs: i64) -> i64 {
    match range {
        StatsRange::H24 => 3_600,
        StatsRange::D7 => 6 * 3_600,
        StatsRange::D30 => 86_400,
        StatsRange::All => {
            if age_secs <= 2 * 86_400 {
                3_600
            } else if age_secs <= 14 * 86_400 {
                6 * 3_600
            } else if age_secs <= 90 * 86_400 {
                86_400
            } else {
                7 * 86_400
            }
        }
    }
}

/// Compute the node-list payload directly from the store.
pub fn compute_node_list(db: &Database, now: i64) -> Result<NodeListPayload, StoreError> {
    let records = db.with_connection(|conn| conn.load_nodes())?;

    let total_storage_gb: f64 = records.iter().map(|n| n.storage_gb).sum();
    let total_credits: i128 = records.iter().map(|n| n.credits as i128).sum();
    let active_count = records
        .iter()
        .filter(|n| n.status == podwatch_core::types::NodeStatus::Active)
        .count() as i64;
    let avg_uptime_secs = if records.is_empty() {
        0.0
    } else {
        records.iter().map(|n| n.uptime_secs as f64).sum::<f64>() / records.len() as f64
    };

    Ok(NodeListPayload {
        nodes: records.iter().map(NodeView::from).collect(),
        stats: ListAggregates {
            total_storage_gb,
            total_credits: total_credits.to_string(),
            active_count,
            avg_uptime_secs,
        },
        captured_at: now,
    })
}

/// Compute the network-stats payload for one range directly from the
/// store.
pub fn compute_network_stats(
    db: &Database,
    range: StatsRange,
    now: i64,
) -> Result<NetworkStatsPayload, StoreError> {
    let since = match range.window_secs() {
        Some(window) => now - window,
        None => 0,
    };

    let (rows, current) = db.with_connection(|conn| {
        Ok((
            conn.load_network_stats_since(since)?,
            conn.latest_network_stats()?,
        ))
    })?;

    let age_secs = rows.first().map(|r| now - r.created_at).unwrap_or(0);
    let bucket_secs = bucket_width_secs(range, age_secs);

    Ok(NetworkStatsPayload {
        range: range.label(),
        bucket_secs,
        current: current.as_ref().map(RollupView::from),
        series: bucket_series(&rows, bucket_secs),
        captured_at: now,
    })
}

/// Collapse rollup rows into buckets, keeping the last row per bucket.
///
/// Rows arrive oldest-first, so a later row in the same bucket simply
/// replaces its predecessor.
fn bucket_series(rows: &[NetworkStatsRow], bucket_secs: i64) -> Vec<BucketView> {
    let mut series: Vec<BucketView> = Vec::new();

    for row in rows {
        let bucket_start = row.created_at - row.created_at.rem_euclid(bucket_secs);
        let view = BucketView {
            bucket_start,
            active_nodes: row.active_nodes,
            inactive_nodes: row.inactive_nodes,
            total_storage_gb: row.total_storage_gb,
            total_credits: row.total_credits.to_string(),
        };

        match series.last_mut() {
            Some(last) if last.bucket_start == bucket_start => *last = view,
            _ => series.push(view),
        }
    }

    series
}

/// Clear and eagerly repopulate both cache layers.
///
/// Called after every successful reconciliation commit. On error the
/// caches are left cleared; the read path falls back to direct
/// computation until the next successful cycle.
pub fn refresh_caches(
    db: &Database,
    node_cache: &NodeListCache,
    stats_cache: &NetworkStatsCache,
    now: i64,
) -> Result<(), StoreError> {
    node_cache.clear();
    stats_cache.clear();

    let list = compute_node_list(db, now)?;
    debug!(nodes = list.nodes.len(), "node-list cache refreshed");
    node_cache.set(list);

    for range in StatsRange::ALL {
        let payload = compute_network_stats(db, range, now)?;
        stats_cache.set(range, payload);
    }
    debug!("network-stats cache refreshed");

    Ok(())
}
