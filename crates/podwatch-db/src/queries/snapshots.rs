//! Snapshot history queries.
//!
//! `node_snapshots` is append-only: rows are created by the reconciliation
//! cycles and never updated or deleted. `node_ip` has no foreign key, so
//! history survives node-row churn.

use rusqlite::{params, Connection, Row};

use podwatch_core::types::{NodeSnapshot, NodeStatus};

use super::super::error::StoreError;

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<NodeSnapshot> {
    let status: String = row.get("status")?;
    Ok(NodeSnapshot {
        node_ip: row.get("node_ip")?,
        credits: row.get("credits")?,
        storage_gb: row.get("storage_gb")?,
        uptime_secs: row.get("uptime_secs")?,
        status: status.parse().unwrap_or(NodeStatus::Unknown),
        cpu_percent: row.get("cpu_percent")?,
        ram_percent: row.get("ram_percent")?,
        active_streams: row.get("active_streams")?,
        packets_received: row.get("packets_received")?,
        packets_sent: row.get("packets_sent")?,
        created_at: row.get("created_at")?,
    })
}

/// Queries against the `node_snapshots` table.
pub trait SnapshotQueries {
    /// Append one snapshot row.
    fn insert_snapshot(&self, snap: &NodeSnapshot) -> Result<(), StoreError>;

    /// Most recent snapshots for one node, newest first.
    fn load_recent_snapshots(
        &self,
        node_ip: &str,
        limit: usize,
    ) -> Result<Vec<NodeSnapshot>, StoreError>;

    /// Total snapshot rows, across all nodes.
    fn count_snapshots(&self) -> Result<i64, StoreError>;
}

impl SnapshotQueries for Connection {
    fn insert_snapshot(&self, snap: &NodeSnapshot) -> Result<(), StoreError> {
        self.execute(
            "INSERT INTO node_snapshots (node_ip, credits, storage_gb, uptime_secs, status, \
                                         cpu_percent, ram_percent, active_streams, \
                                         packets_received, packets_sent, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                snap.node_ip,
                snap.credits,
                snap.storage_gb,
                snap.uptime_secs,
                snap.status.as_str(),
                snap.cpu_percent,
                snap.ram_percent,
                snap.active_streams,
                snap.packets_received,
                snap.packets_sent,
                snap.created_at,
            ],
        )?;
        Ok(())
    }

    fn load_recent_snapshots(
        &self,
        node_ip: &str,
        limit: usize,
    ) -> Result<Vec<NodeSnapshot>, StoreError> {
        let mut stmt = self.prepare(
            "SELECT node_ip, credits, storage_gb, uptime_secs, status, cpu_percent, \
                    ram_percent, active_streams, packets_received, packets_sent, created_at \
             FROM node_snapshots WHERE node_ip = ?1 \
             ORDER BY created_at DESC, id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![node_ip, limit as i64], snapshot_from_row)?;

        let mut snaps = Vec::new();
        for row in rows {
            snaps.push(row?);
        }
        Ok(snaps)
    }

    fn count_snapshots(&self) -> Result<i64, StoreError> {
        let count = self.query_row("SELECT COUNT(*) FROM node_snapshots", [], |row| row.get(0))?;
        Ok(count)
    }
}
