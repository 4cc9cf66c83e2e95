//! Stats updater: the per-node metrics reconciliation cycle.
//!
//! Runs far more often than the gossip sync and must tolerate a network
//! where most pods are unreachable. No single failure is cycle-fatal:
//! per-node outcomes are isolated, and the cycle writes with plain
//! sequential updates (no transaction), trading strict atomicity for
//! short lock durations.
//!
//! Outcome rules per node:
//! - no response / malformed response → status inactive, zeroed snapshot
//! - good response → stats-owned fields updated, status active,
//!   populated snapshot
//! - the update itself errors → error-logged, status untouched, no
//!   snapshot (a transient store error must not flap the node)

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::json;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use podwatch_core::addr::normalize_for_rpc;
use podwatch_core::constants::BYTES_PER_GB;
use podwatch_core::types::{
    ram_percent, ErrorLogEntry, NetworkStatsRow, NodeRecord, NodeSnapshot, NodeStatsUpdate,
    NodeStatus, Phase, Source,
};
use podwatch_db::{Database, NetworkStatsQueries, NodeQueries};
use podwatch_rpc::{decode_pod_stats, PodStatsRaw, RpcTransport, GET_STATS};

use crate::cache::{NetworkStatsCache, NodeListCache};
use crate::config::{StatsScope, SyncConfig};
use crate::report::{CycleErrorDetail, CycleReport};
use crate::views::refresh_caches;

/// The per-node metrics reconciliation cycle.
pub struct StatsUpdater {
    rpc: Arc<dyn RpcTransport>,
    db: Database,
    node_cache: Arc<NodeListCache>,
    stats_cache: Arc<NetworkStatsCache>,
    config: SyncConfig,
}

impl StatsUpdater {
    pub fn new(
        rpc: Arc<dyn RpcTransport>,
        db: Database,
        node_cache: Arc<NodeListCache>,
        stats_cache: Arc<NetworkStatsCache>,
        config: SyncConfig,
    ) -> Self {
        Self {
            rpc,
            db,
            node_cache,
            stats_cache,
            config,
        }
    }

    /// Run one stats reconciliation cycle.
    pub async fn run(&self) -> CycleReport {
        let started = Instant::now();
        let now = Utc::now().timestamp();
        let mut report = CycleReport::new("stats_updater");

        // --- Querying: load the candidate set ---

        let candidates = match self.load_candidates() {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, "failed to load stats candidates");
                let message = e.to_string();
                self.log_error(Phase::StatsQuery, None, &message, now);
                report.errors.push(CycleErrorDetail {
                    node_ip: None,
                    phase: Phase::StatsQuery,
                    message,
                });
                report.failed_phase = Some(Phase::StatsQuery);
                report.duration_ms = started.elapsed().as_millis() as u64;
                return report;
            }
        };

        if candidates.is_empty() {
            info!("stats cycle has no candidate nodes; nothing to do");
            report.duration_ms = started.elapsed().as_millis() as u64;
            return report;
        }

        // --- Per-batch query + sequential apply ---

        let mut snapshots: Vec<NodeSnapshot> = Vec::new();
        let mut budget_exceeded = false;

        for batch in candidates.chunks(self.config.stats_batch_size.max(1)) {
            if started.elapsed() >= self.config.cycle_budget {
                budget_exceeded = true;
                break;
            }

            let outcomes = self.query_batch(batch).await;
            for (node, stats) in outcomes {
                self.apply_outcome(&node, stats, now, &mut report, &mut snapshots);
            }
        }

        if budget_exceeded {
            let message = format!(
                "cycle budget of {:?} exhausted; {} of {} nodes unprocessed",
                self.config.cycle_budget,
                candidates.len() - report.processed,
                candidates.len()
            );
            warn!("{message}");
            self.log_error(Phase::Budget, None, &message, now);
            report.errors.push(CycleErrorDetail {
                node_ip: None,
                phase: Phase::Budget,
                message,
            });
        }

        // --- Aggregating ---

        if !snapshots.is_empty() {
            self.aggregate(&snapshots, now);
        }
        // Partial completion still counts as a ran-but-incomplete cycle,
        // not a critical failure: committed per-node writes stand.
        report.success = !budget_exceeded && report.processed > 0;

        // --- Cache refresh (best-effort) ---

        if let Err(e) = refresh_caches(&self.db, &self.node_cache, &self.stats_cache, now) {
            warn!(error = %e, "cache refresh failed after stats cycle");
            self.log_error(Phase::CacheRefresh, None, &e.to_string(), now);
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            processed = report.processed,
            updated = report.updated,
            unreachable = report.dropped,
            duration_ms = report.duration_ms,
            "stats cycle finished"
        );
        report
    }

    /// Bulk-insert the cycle's snapshots and one rollup computed over
    /// them. Both writes are best-effort at this point: the per-node
    /// updates already stand.
    fn aggregate(&self, snapshots: &[NodeSnapshot], now: i64) {
        if let Err(e) = self.db.insert_snapshots(snapshots) {
            warn!(error = %e, "bulk snapshot insert failed");
            self.log_error(Phase::Aggregate, None, &e.to_string(), now);
        }

        let rollup = NetworkStatsRow {
            active_nodes: snapshots
                .iter()
                .filter(|s| s.status == NodeStatus::Active)
                .count() as i64,
            inactive_nodes: snapshots
                .iter()
                .filter(|s| s.status != NodeStatus::Active)
                .count() as i64,
            total_storage_gb: snapshots.iter().map(|s| s.storage_gb).sum(),
            total_credits: snapshots.iter().map(|s| s.credits as i128).sum(),
            created_at: now,
        };
        if let Err(e) = self
            .db
            .with_connection(|conn| conn.insert_network_stats(&rollup))
        {
            warn!(error = %e, "network-stats rollup insert failed");
            self.log_error(Phase::Aggregate, None, &e.to_string(), now);
        }
    }

    fn load_candidates(&self) -> podwatch_db::Result<Vec<NodeRecord>> {
        self.db.with_connection(|conn| match self.config.stats_scope {
            StatsScope::All => conn.load_nodes(),
            StatsScope::ActiveOnly => conn.load_nodes_by_status(NodeStatus::Active),
        })
    }

    /// Issue the batch's stats calls concurrently.
    ///
    /// `None` covers every way a pod can fail to answer: transport
    /// error, timeout, remote error, null result, malformed result, or
    /// a panicked task.
    async fn query_batch(&self, batch: &[NodeRecord]) -> Vec<(NodeRecord, Option<PodStatsRaw>)> {
        let mut set = JoinSet::new();

        for (i, node) in batch.iter().enumerate() {
            let rpc = Arc::clone(&self.rpc);
            let endpoint = normalize_for_rpc(&node.ip);
            let timeout = self.config.stats_timeout;
            set.spawn(async move {
                let stats = match rpc.call(&endpoint, GET_STATS, json!([]), timeout).await {
                    Ok(value) => decode_pod_stats(&value),
                    Err(e) => {
                        debug!(%endpoint, error = %e, "stats call failed");
                        None
                    }
                };
                (i, stats)
            });
        }

        let mut by_index: Vec<Option<PodStatsRaw>> = vec![None; batch.len()];
        while let Some(joined) = set.join_next().await {
            if let Ok((i, stats)) = joined {
                by_index[i] = stats;
            }
        }

        batch
            .iter()
            .cloned()
            .zip(by_index)
            .collect()
    }

    /// Apply one node's outcome with plain sequential updates.
    fn apply_outcome(
        &self,
        node: &NodeRecord,
        stats: Option<PodStatsRaw>,
        now: i64,
        report: &mut CycleReport,
        snapshots: &mut Vec<NodeSnapshot>,
    ) {
        report.processed += 1;

        match stats {
            None => {
                match self
                    .db
                    .with_connection(|conn| conn.set_status(&node.ip, NodeStatus::Inactive, now))
                {
                    Ok(()) => {
                        report.dropped += 1;
                        snapshots.push(NodeSnapshot::zeroed(&node.ip, now));
                    }
                    Err(e) => self.node_error(&node.ip, &e.to_string(), now, report),
                }
            }
            Some(raw) => {
                let ram_used = raw.ram_used.unwrap_or(0);
                let ram_total = raw.ram_total.unwrap_or(0);
                let storage_gb = raw.file_size.unwrap_or(0) as f64 / BYTES_PER_GB;
                let update = NodeStatsUpdate {
                    ip: node.ip.clone(),
                    cpu_percent: raw.cpu_percent.unwrap_or(0.0),
                    ram_percent: ram_percent(ram_used, ram_total),
                    ram_used,
                    ram_total,
                    active_streams: raw.active_streams.unwrap_or(0),
                    packets_received: raw.packets_received.unwrap_or(0),
                    packets_sent: raw.packets_sent.unwrap_or(0),
                    storage_gb,
                    uptime_secs: raw.uptime.unwrap_or(0),
                    status: NodeStatus::Active,
                };

                match self.db.with_connection(|conn| conn.apply_stats(&update, now)) {
                    Ok(()) => {
                        report.updated += 1;
                        snapshots.push(NodeSnapshot {
                            node_ip: node.ip.clone(),
                            credits: node.credits,
                            storage_gb,
                            uptime_secs: update.uptime_secs,
                            status: NodeStatus::Active,
                            cpu_percent: update.cpu_percent,
                            ram_percent: update.ram_percent,
                            active_streams: update.active_streams,
                            packets_received: update.packets_received,
                            packets_sent: update.packets_sent,
                            created_at: now,
                        });
                    }
                    Err(e) => self.node_error(&node.ip, &e.to_string(), now, report),
                }
            }
        }
    }

    /// A node whose update itself failed: error-logged, status
    /// untouched, no snapshot this cycle.
    fn node_error(&self, ip: &str, message: &str, now: i64, report: &mut CycleReport) {
        warn!(%ip, "{message}");
        self.log_error(Phase::StatsQuery, Some(ip), message, now);
        report.errors.push(CycleErrorDetail {
            node_ip: Some(ip.to_string()),
            phase: Phase::StatsQuery,
            message: message.to_string(),
        });
    }

    fn log_error(&self, phase: Phase, node_ip: Option<&str>, message: &str, now: i64) {
        self.db.record_error(&ErrorLogEntry {
            source: Source::StatsUpdater,
            phase,
            node_ip: node_ip.map(str::to_string),
            message: message.to_string(),
            details: None,
            created_at: now,
        });
    }
}
