//! Core record types shared across the workspace.
//!
//! These mirror the relational schema owned by `podwatch-db`: one
//! [`NodeRecord`] per canonical IP, append-only [`NodeSnapshot`] history,
//! per-cycle [`NetworkStatsRow`] rollups, and [`ErrorLogEntry`] facts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Liveness of a pod as last observed by a reconciliation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Active,
    Inactive,
    Unknown,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Active => "active",
            NodeStatus::Inactive => "inactive",
            NodeStatus::Unknown => "unknown",
        }
    }
}

impl FromStr for NodeStatus {
    type Err = ();

    /// Unrecognized strings decode to [`NodeStatus::Unknown`] rather than
    /// failing; upstream pods report status in free text.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "active" => NodeStatus::Active,
            "inactive" => NodeStatus::Inactive,
            _ => NodeStatus::Unknown,
        })
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the `nodes` table: the current view of a single pod.
///
/// `ip` is the canonical bare IP (never carries a port) and is the sole
/// join key into snapshot history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub ip: String,
    pub pubkey: Option<String>,
    pub version: Option<String>,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    pub credits: i64,
    pub storage_gb: f64,
    pub uptime_secs: i64,
    pub status: NodeStatus,
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

/// Immutable per-cycle snapshot of one pod's metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub node_ip: String,
    pub credits: i64,
    pub storage_gb: f64,
    pub uptime_secs: i64,
    pub status: NodeStatus,
    pub cpu_percent: f64,
    pub ram_percent: f64,
    pub active_streams: i64,
    pub packets_received: i64,
    pub packets_sent: i64,
    pub created_at: i64,
}

impl NodeSnapshot {
    /// Snapshot for a pod that did not answer its stats call: status
    /// inactive, every metric zeroed.
    pub fn zeroed(node_ip: &str, created_at: i64) -> Self {
        Self {
            node_ip: node_ip.to_string(),
            credits: 0,
            storage_gb: 0.0,
            uptime_secs: 0,
            status: NodeStatus::Inactive,
            cpu_percent: 0.0,
            ram_percent: 0.0,
            active_streams: 0,
            packets_received: 0,
            packets_sent: 0,
            created_at,
        }
    }
}

/// Per-cycle network rollup.
///
/// `total_credits` is carried as i128: per-pod balances are i64 and the
/// network-wide sum can exceed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkStatsRow {
    pub active_nodes: i64,
    pub inactive_nodes: i64,
    pub total_storage_gb: f64,
    pub total_credits: i128,
    pub created_at: i64,
}

/// Append-only observability fact recorded by any pipeline phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub source: Source,
    pub phase: Phase,
    pub node_ip: Option<String>,
    pub message: String,
    pub details: Option<String>,
    pub created_at: i64,
}

/// Geo lookup result for one IP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoInfo {
    pub country: String,
    pub lat: f64,
    pub lon: f64,
}

impl GeoInfo {
    /// Sentinel returned when resolution fails. Never cached, so future
    /// cycles retry the lookup.
    pub fn unknown() -> Self {
        Self {
            country: "Unknown".to_string(),
            lat: 0.0,
            lon: 0.0,
        }
    }
}

/// Which subsystem recorded an error-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    GossipSync,
    StatsUpdater,
    Enrichment,
    Api,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::GossipSync => "gossip_sync",
            Source::StatsUpdater => "stats_updater",
            Source::Enrichment => "enrichment",
            Source::Api => "api",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which cycle phase recorded an error-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Fetch,
    Validation,
    Transaction,
    CacheRefresh,
    StatsQuery,
    Aggregate,
    Budget,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Fetch => "fetch",
            Phase::Validation => "validation",
            Phase::Transaction => "transaction",
            Phase::CacheRefresh => "cache_refresh",
            Phase::StatsQuery => "stats_query",
            Phase::Aggregate => "aggregate",
            Phase::Budget => "budget",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Topology-owned fields written by the gossip sync cycle.
///
/// The stats-owned metric fields of an existing row are left untouched by
/// an upsert of this struct.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeTopologyUpdate {
    pub ip: String,
    pub pubkey: Option<String>,
    pub version: Option<String>,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    pub credits: i64,
    pub storage_gb: f64,
    pub uptime_secs: i64,
    pub is_public: bool,
}

/// Stats-owned fields written by the stats updater cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeStatsUpdate {
    pub ip: String,
    pub cpu_percent: f64,
    pub ram_percent: f64,
    pub ram_used: i64,
    pub ram_total: i64,
    pub active_streams: i64,
    pub packets_received: i64,
    pub packets_sent: i64,
    pub storage_gb: f64,
    pub uptime_secs: i64,
    pub status: NodeStatus,
}

/// ramPercent = 100 * used / total, guarding the total == 0 case.
pub fn ram_percent(ram_used: i64, ram_total: i64) -> f64 {
    if ram_total == 0 {
        0.0
    } else {
        100.0 * ram_used as f64 / ram_total as f64
    }
}
