//! Server configuration.

use std::path::PathBuf;

use podwatch_sync::SyncConfig;

/// Runtime configuration for the dashboard server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Reconciliation pipeline settings.
    pub sync: SyncConfig,
    /// Seconds between in-process gossip cycles; 0 leaves scheduling to
    /// an external caller of the POST trigger endpoint.
    pub gossip_interval_secs: u64,
    /// Seconds between in-process stats cycles; 0 disables the ticker.
    pub stats_interval_secs: u64,
}
