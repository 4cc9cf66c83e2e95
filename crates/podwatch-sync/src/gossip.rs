//! Gossip sync: the topology reconciliation cycle.
//!
//! One run moves through Fetching → Preprocessing → Committing →
//! CacheRefresh. Fetch exhaustion or a failed commit aborts the cycle
//! (nothing persists); everything else is per-record and isolated. All
//! the heavy, slow work — enrichment, geo lookups, parsing — happens in
//! preprocessing, outside the transaction, so the commit itself stays
//! short.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use podwatch_core::addr::{canonical_key, is_placeholder_ip};
use podwatch_core::error::ValidationError;
use podwatch_core::types::{
    ErrorLogEntry, NetworkStatsRow, NodeSnapshot, NodeStatus, NodeTopologyUpdate, Phase, Source,
};
use podwatch_db::{Database, NetworkStatsQueries, NodeQueries, SnapshotQueries};
use podwatch_enrich::{CreditsClient, GeoResolver};
use podwatch_rpc::{fetch_pods, shuffled, RawPod, RpcTransport};

use crate::cache::{NetworkStatsCache, NodeListCache};
use crate::config::SyncConfig;
use crate::report::{CycleErrorDetail, CycleReport};
use crate::views::refresh_caches;

/// A pod that survived preprocessing: canonical identity, resolved geo,
/// parsed storage, looked-up credits.
#[derive(Debug, Clone)]
struct PreparedPod {
    topology: NodeTopologyUpdate,
}

impl PreparedPod {
    /// Snapshot row for this cycle. Stats-owned metrics are zero here;
    /// the gossip layer does not observe them.
    fn snapshot(&self, at: i64) -> NodeSnapshot {
        NodeSnapshot {
            node_ip: self.topology.ip.clone(),
            credits: self.topology.credits,
            storage_gb: self.topology.storage_gb,
            uptime_secs: self.topology.uptime_secs,
            status: NodeStatus::Active,
            cpu_percent: 0.0,
            ram_percent: 0.0,
            active_streams: 0,
            packets_received: 0,
            packets_sent: 0,
            created_at: at,
        }
    }
}

/// The topology reconciliation cycle.
pub struct GossipSync {
    rpc: Arc<dyn RpcTransport>,
    db: Database,
    credits: CreditsClient,
    /// Geo resolution is rate-limited upstream; the mutex keeps it
    /// sequential even across overlapping cycles.
    geo: Mutex<GeoResolver>,
    node_cache: Arc<NodeListCache>,
    stats_cache: Arc<NetworkStatsCache>,
    config: SyncConfig,
}

impl GossipSync {
    pub fn new(
        rpc: Arc<dyn RpcTransport>,
        db: Database,
        node_cache: Arc<NodeListCache>,
        stats_cache: Arc<NetworkStatsCache>,
        config: SyncConfig,
    ) -> Self {
        let credits = CreditsClient::new(config.credits_url.clone(), config.enrich_timeout);
        let geo = Mutex::new(GeoResolver::new(
            config.geo_url.clone(),
            config.enrich_timeout,
            db.clone(),
        ));
        Self {
            rpc,
            db,
            credits,
            geo,
            node_cache,
            stats_cache,
            config,
        }
    }

    /// Run one full topology reconciliation cycle.
    pub async fn run(&self) -> CycleReport {
        let started = Instant::now();
        let now = Utc::now().timestamp();
        let mut report = CycleReport::new("gossip_sync");

        // --- Fetching ---

        let endpoints = if self.config.shuffle_endpoints {
            shuffled(&self.config.gossip_endpoints)
        } else {
            self.config.gossip_endpoints.clone()
        };

        let fetch = match fetch_pods(self.rpc.as_ref(), &endpoints, self.config.gossip_timeout).await
        {
            Ok(fetch) => fetch,
            Err(e) => {
                warn!(error = %e, "gossip fetch exhausted all candidates");
                for attempt in &e.attempts {
                    self.log_error(Phase::Fetch, None, attempt, now);
                    report.errors.push(CycleErrorDetail {
                        node_ip: None,
                        phase: Phase::Fetch,
                        message: attempt.clone(),
                    });
                }
                report.failed_phase = Some(Phase::Fetch);
                report.duration_ms = started.elapsed().as_millis() as u64;
                return report;
            }
        };

        // Candidates that failed before the winner are still recorded.
        for attempt in &fetch.failed_attempts {
            self.log_error(Phase::Fetch, None, attempt, now);
            report.errors.push(CycleErrorDetail {
                node_ip: None,
                phase: Phase::Fetch,
                message: attempt.clone(),
            });
        }

        info!(
            endpoint = %fetch.endpoint,
            raw = fetch.pods.len(),
            "gossip fetch succeeded"
        );
        report.processed = fetch.pods.len();

        // --- Preprocessing (outside the transaction) ---

        let prepared = match self.preprocess(fetch.pods, started, now, &mut report).await {
            Ok(prepared) => prepared,
            Err(()) => {
                report.duration_ms = started.elapsed().as_millis() as u64;
                return report;
            }
        };

        if prepared.is_empty() {
            info!("gossip cycle found no valid pods; nothing to commit");
            report.duration_ms = started.elapsed().as_millis() as u64;
            return report;
        }

        // --- Committing ---

        let commit = self.commit(&prepared, now);
        let created = match commit {
            Ok(created) => created,
            Err(e) => {
                warn!(error = %e, "gossip commit rolled back");
                let message = e.to_string();
                self.log_error(Phase::Transaction, None, &message, now);
                report.errors.push(CycleErrorDetail {
                    node_ip: None,
                    phase: Phase::Transaction,
                    message,
                });
                report.failed_phase = Some(Phase::Transaction);
                report.duration_ms = started.elapsed().as_millis() as u64;
                return report;
            }
        };

        report.created = created;
        report.updated = prepared.len() - created;
        report.success = true;

        // --- Cache refresh (best-effort) ---

        if let Err(e) = refresh_caches(&self.db, &self.node_cache, &self.stats_cache, now) {
            warn!(error = %e, "cache refresh failed after gossip commit");
            self.log_error(Phase::CacheRefresh, None, &e.to_string(), now);
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            created = report.created,
            updated = report.updated,
            dropped = report.dropped,
            duration_ms = report.duration_ms,
            "gossip cycle committed"
        );
        report
    }

    /// Validate, enrich, and normalize raw pods.
    ///
    /// Per-pod failures are logged and excluded; only a blown cycle
    /// budget aborts the cycle (marked on the report).
    async fn preprocess(
        &self,
        pods: Vec<RawPod>,
        started: Instant,
        now: i64,
        report: &mut CycleReport,
    ) -> Result<Vec<PreparedPod>, ()> {
        let credit_map = self.credits.fetch_credit_map().await;
        let mut geo = self.geo.lock().await;

        // Order-preserving dedupe: a later record for the same canonical
        // IP replaces the earlier one.
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut prepared: Vec<PreparedPod> = Vec::new();

        for pod in pods {
            if started.elapsed() >= self.config.cycle_budget {
                let message = format!(
                    "cycle budget of {:?} exhausted during preprocessing",
                    self.config.cycle_budget
                );
                warn!("{message}");
                self.log_error(Phase::Budget, None, &message, now);
                report.errors.push(CycleErrorDetail {
                    node_ip: None,
                    phase: Phase::Budget,
                    message,
                });
                report.failed_phase = Some(Phase::Budget);
                return Err(());
            }

            let ip = match &pod.ip {
                Some(raw_ip) => canonical_key(raw_ip),
                None => {
                    self.drop_pod(report, None, &ValidationError::MissingIp.to_string(), now);
                    continue;
                }
            };
            if is_placeholder_ip(&ip) {
                let err = ValidationError::PlaceholderIp(ip.clone());
                self.drop_pod(report, Some(&ip), &err.to_string(), now);
                continue;
            }

            let geo_info = geo.resolve(&ip).await;
            let credits = pod
                .pubkey
                .as_ref()
                .and_then(|pk| credit_map.get(pk))
                .copied()
                .unwrap_or(0);
            let storage_gb = pod
                .storage
                .as_ref()
                .and_then(|s| s.as_gb())
                .unwrap_or(0.0);

            let entry = PreparedPod {
                topology: NodeTopologyUpdate {
                    ip: ip.clone(),
                    pubkey: pod.pubkey.clone(),
                    version: pod.version.clone(),
                    country: geo_info.country,
                    lat: geo_info.lat,
                    lon: geo_info.lon,
                    credits,
                    storage_gb,
                    uptime_secs: pod.uptime.unwrap_or(0),
                    is_public: pod.is_public.unwrap_or(false),
                },
            };

            match index.get(&ip) {
                Some(&i) => prepared[i] = entry,
                None => {
                    index.insert(ip, prepared.len());
                    prepared.push(entry);
                }
            }
        }

        Ok(prepared)
    }

    /// The short commit transaction.
    ///
    /// Mark-all-inactive precedes every upsert in program order, so a pod
    /// dropped from the latest gossip response cannot stay stale-active.
    /// Returns the number of newly created node rows.
    fn commit(&self, prepared: &[PreparedPod], now: i64) -> podwatch_db::Result<usize> {
        self.db.transaction(|tx| {
            tx.mark_all_inactive(now)?;

            let mut created = 0;
            for pod in prepared {
                if tx.upsert_topology(&pod.topology, now)? {
                    created += 1;
                }
            }
            for pod in prepared {
                tx.insert_snapshot(&pod.snapshot(now))?;
            }

            let inactive_nodes = tx.count_by_status(NodeStatus::Inactive)?;
            let rollup = NetworkStatsRow {
                active_nodes: prepared.len() as i64,
                inactive_nodes,
                total_storage_gb: prepared.iter().map(|p| p.topology.storage_gb).sum(),
                total_credits: prepared.iter().map(|p| p.topology.credits as i128).sum(),
                created_at: now,
            };
            tx.insert_network_stats(&rollup)?;

            Ok(created)
        })
    }

    fn drop_pod(&self, report: &mut CycleReport, ip: Option<&str>, message: &str, now: i64) {
        warn!(ip = ip.unwrap_or("<missing>"), "{message}");
        self.log_error(Phase::Validation, ip, message, now);
        report.dropped += 1;
        report.errors.push(CycleErrorDetail {
            node_ip: ip.map(str::to_string),
            phase: Phase::Validation,
            message: message.to_string(),
        });
    }

    fn log_error(&self, phase: Phase, node_ip: Option<&str>, message: &str, now: i64) {
        self.db.record_error(&ErrorLogEntry {
            source: Source::GossipSync,
            phase,
            node_ip: node_ip.map(str::to_string),
            message: message.to_string(),
            details: None,
            created_at: now,
        });
    }
}
