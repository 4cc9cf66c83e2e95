//! # podwatch-sync
//! The reconciliation pipeline: gossip topology sync, per-node stats
//! updates, the process-local cache layer, and the read-path payload
//! computation that feeds it.
//!
//! The two cycles are independently scheduled and may overlap. There is
//! no locking between them: the gossip cycle writes the topology-owned
//! columns, the stats cycle the stats-owned ones, and the shared
//! storage/uptime/status columns follow the last writer.

pub mod cache;
pub mod config;
pub mod gossip;
pub mod report;
pub mod stats;
pub mod views;

pub use cache::{CacheSlot, NetworkStatsCache, NodeListCache, StatsRange};
pub use config::{StatsScope, SyncConfig};
pub use gossip::GossipSync;
pub use report::{CycleErrorDetail, CycleReport};
pub use stats::StatsUpdater;
pub use views::{
    compute_network_stats, compute_node_list, refresh_caches, NetworkStatsPayload,
    NodeListPayload, NodeView,
};
