//! Reconciliation pipeline configuration.

use std::time::Duration;

use podwatch_core::constants::{
    DEFAULT_CYCLE_BUDGET_SECS, DEFAULT_GOSSIP_TIMEOUT_MS, DEFAULT_STATS_BATCH_SIZE,
    DEFAULT_STATS_TIMEOUT_MS,
};

/// Which nodes the stats updater queries each cycle.
///
/// The original behavior here was inconsistent across cycle variants, so
/// it is an explicit policy choice. `All` is the default: inactive nodes
/// that come back online are noticed by the (frequent) stats cycle
/// instead of waiting for the next topology sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsScope {
    /// Query every known node.
    All,
    /// Query only nodes currently marked active.
    ActiveOnly,
}

/// Configuration for both reconciliation cycles.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Candidate gossip endpoints (`host` or `host:port`), tried in order.
    pub gossip_endpoints: Vec<String>,
    /// Shuffle the candidate list each cycle to spread fetch load.
    pub shuffle_endpoints: bool,
    /// Timeout for the gossip topology fetch.
    pub gossip_timeout: Duration,
    /// Timeout for one per-node stats call. Kept short: this cycle runs
    /// often and must tolerate many unreachable pods.
    pub stats_timeout: Duration,
    /// Simultaneous in-flight stats calls per batch.
    pub stats_batch_size: usize,
    /// Candidate-set policy for the stats updater.
    pub stats_scope: StatsScope,
    /// Hard wall-clock budget for one cycle. Unstarted work past this
    /// point is abandoned; committed writes stand.
    pub cycle_budget: Duration,
    /// Third-party credits endpoint. `None` disables the lookup.
    pub credits_url: Option<String>,
    /// Third-party geo-IP endpoint prefix. `None` disables lookups.
    pub geo_url: Option<String>,
    /// Timeout for enrichment HTTP calls.
    pub enrich_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            gossip_endpoints: Vec::new(),
            shuffle_endpoints: true,
            gossip_timeout: Duration::from_millis(DEFAULT_GOSSIP_TIMEOUT_MS),
            stats_timeout: Duration::from_millis(DEFAULT_STATS_TIMEOUT_MS),
            stats_batch_size: DEFAULT_STATS_BATCH_SIZE,
            stats_scope: StatsScope::All,
            cycle_budget: Duration::from_secs(DEFAULT_CYCLE_BUDGET_SECS),
            credits_url: None,
            geo_url: None,
            enrich_timeout: Duration::from_secs(10),
        }
    }
}
