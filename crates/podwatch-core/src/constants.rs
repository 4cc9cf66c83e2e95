//! Network-wide constants.

/// Canonical JSON-RPC port exposed by every pod.
pub const DEFAULT_RPC_PORT: u16 = 6000;

/// Gossip port some pods advertise instead of their RPC port.
///
/// Addresses carrying this port are rewritten to [`DEFAULT_RPC_PORT`]
/// before an RPC URL is built from them.
pub const GOSSIP_PORT: u16 = 9001;

/// Timeout for the gossip topology fetch (`get-pods-with-stats`).
pub const DEFAULT_GOSSIP_TIMEOUT_MS: u64 = 10_000;

/// Timeout for a single per-node stats call (`get-stats`).
///
/// Deliberately shorter than [`DEFAULT_GOSSIP_TIMEOUT_MS`]: the stats cycle
/// runs far more often and must tolerate many unreachable pods without
/// stalling the whole cycle.
pub const DEFAULT_STATS_TIMEOUT_MS: u64 = 3_000;

/// Number of simultaneous in-flight stats calls per batch.
pub const DEFAULT_STATS_BATCH_SIZE: usize = 10;

/// Hard wall-clock budget for one reconciliation cycle, in seconds.
pub const DEFAULT_CYCLE_BUDGET_SECS: u64 = 120;

/// Maximum snapshot rows returned with a single-node detail view.
pub const NODE_HISTORY_LIMIT: usize = 100;

/// Bytes per gigabyte, used when converting reported byte counts.
pub const BYTES_PER_GB: f64 = 1_073_741_824.0;
