//! Database schema definition.
//!
//! The full current schema, executed as one batch on a fresh database.
//! Existing databases are upgraded through [`crate::migrations`] instead.

/// SQL executed to create a fresh database at the current schema version.
///
/// `nodes.ip` is the canonical bare IP and the sole join key into
/// `node_snapshots`. The snapshot table carries no foreign key: history
/// must survive node-row churn, so orphaned snapshots are accepted.
pub const CREATE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS app_state (
    statename TEXT PRIMARY KEY,
    state TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS nodes (
    ip TEXT PRIMARY KEY,
    pubkey TEXT,
    version TEXT,
    country TEXT NOT NULL DEFAULT 'Unknown',
    lat REAL NOT NULL DEFAULT 0,
    lon REAL NOT NULL DEFAULT 0,
    credits INTEGER NOT NULL DEFAULT 0,
    storage_gb REAL NOT NULL DEFAULT 0,
    uptime_secs INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'unknown',
    cpu_percent REAL NOT NULL DEFAULT 0,
    ram_percent REAL NOT NULL DEFAULT 0,
    ram_used INTEGER NOT NULL DEFAULT 0,
    ram_total INTEGER NOT NULL DEFAULT 0,
    active_streams INTEGER NOT NULL DEFAULT 0,
    packets_received INTEGER NOT NULL DEFAULT 0,
    packets_sent INTEGER NOT NULL DEFAULT 0,
    is_public INTEGER NOT NULL DEFAULT 0,
    updated_at INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS node_snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    node_ip TEXT NOT NULL,
    credits INTEGER NOT NULL,
    storage_gb REAL NOT NULL,
    uptime_secs INTEGER NOT NULL,
    status TEXT NOT NULL,
    cpu_percent REAL NOT NULL,
    ram_percent REAL NOT NULL,
    active_streams INTEGER NOT NULL,
    packets_received INTEGER NOT NULL,
    packets_sent INTEGER NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS snapshots_node_time ON node_snapshots(node_ip, created_at);

CREATE TABLE IF NOT EXISTS network_stats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    active_nodes INTEGER NOT NULL,
    inactive_nodes INTEGER NOT NULL,
    total_storage_gb REAL NOT NULL,
    total_credits TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS network_stats_time ON network_stats(created_at);

CREATE TABLE IF NOT EXISTS error_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    phase TEXT NOT NULL,
    node_ip TEXT,
    message TEXT NOT NULL,
    details TEXT,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS error_log_time ON error_log(created_at);

CREATE TABLE IF NOT EXISTS geo_cache (
    ip TEXT PRIMARY KEY,
    country TEXT NOT NULL,
    lat REAL NOT NULL,
    lon REAL NOT NULL
);
"#;
