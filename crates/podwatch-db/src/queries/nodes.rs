//! Node table queries.
//!
//! The two reconciliation cycles write disjoint field sets:
//! [`upsert_topology`](NodeQueries::upsert_topology) touches only the
//! topology-owned columns, [`apply_stats`](NodeQueries::apply_stats) only
//! the stats-owned ones (plus the shared storage/uptime/status columns).
//! Last writer wins on the shared columns.

use rusqlite::{params, Connection, OptionalExtension, Row};

use podwatch_core::types::{NodeRecord, NodeStatsUpdate, NodeStatus, NodeTopologyUpdate};

use super::super::error::StoreError;

fn node_from_row(row: &Row<'_>) -> rusqlite::Result<NodeRecord> {
    let status: String = row.get("status")?;
    Ok(NodeRecord {
        ip: row.get("ip")?,
        pubkey: row.get("pubkey")?,
        version: row.get("version")?,
        country: row.get("country")?,
        lat: row.get("lat")?,
        lon: row.get("lon")?,
        credits: row.get("credits")?,
        storage_gb: row.get("storage_gb")?,
        uptime_secs: row.get("uptime_secs")?,
        status: status.parse().unwrap_or(NodeStatus::Unknown),
        cpu_percent: row.get("cpu_percent")?,
        ram_percent: row.get("ram_percent")?,
        ram_used: row.get("ram_used")?,
        ram_total: row.get("ram_total")?,
        active_streams: row.get("active_streams")?,
        packets_received: row.get("packets_received")?,
        packets_sent: row.get("packets_sent")?,
        is_public: row.get::<_, i64>("is_public")? != 0,
        updated_at: row.get("updated_at")?,
    })
}

const NODE_COLUMNS: &str = "ip, pubkey, version, country, lat, lon, credits, storage_gb, \
     uptime_secs, status, cpu_percent, ram_percent, ram_used, ram_total, \
     active_streams, packets_received, packets_sent, is_public, updated_at";

/// Queries against the `nodes` table.
pub trait NodeQueries {
    /// Insert or update the topology-owned fields of a node, setting
    /// status active. Returns `true` when a new row was created.
    fn upsert_topology(&self, u: &NodeTopologyUpdate, now: i64) -> Result<bool, StoreError>;

    /// Update the stats-owned fields of a node. A missing row is not an
    /// error: the node may have been dropped between load and update.
    fn apply_stats(&self, u: &NodeStatsUpdate, now: i64) -> Result<(), StoreError>;

    /// Mark every node inactive. Returns the number of rows touched.
    fn mark_all_inactive(&self, now: i64) -> Result<usize, StoreError>;

    /// Update only the status of one node.
    fn set_status(&self, ip: &str, status: NodeStatus, now: i64) -> Result<(), StoreError>;

    /// Load a single node by canonical IP.
    fn load_node(&self, ip: &str) -> Result<Option<NodeRecord>, StoreError>;

    /// Load all nodes, highest credits first.
    fn load_nodes(&self) -> Result<Vec<NodeRecord>, StoreError>;

    /// Load all nodes currently in the given status.
    fn load_nodes_by_status(&self, status: NodeStatus) -> Result<Vec<NodeRecord>, StoreError>;

    /// Count nodes currently in the given status.
    fn count_by_status(&self, status: NodeStatus) -> Result<i64, StoreError>;
}

impl NodeQueries for Connection {
    fn upsert_topology(&self, u: &NodeTopologyUpdate, now: i64) -> Result<bool, StoreError> {
        let exists: bool = self
            .query_row("SELECT 1 FROM nodes WHERE ip = ?1", params![u.ip], |_| Ok(true))
            .optional()?
            .unwrap_or(false);

        self.execute(
            "INSERT INTO nodes (ip, pubkey, version, country, lat, lon, credits, storage_gb, \
                                uptime_secs, is_public, status, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 'active', ?11) \
             ON CONFLICT(ip) DO UPDATE SET \
                pubkey = excluded.pubkey, \
                version = excluded.version, \
                country = excluded.country, \
                lat = excluded.lat, \
                lon = excluded.lon, \
                credits = excluded.credits, \
                storage_gb = excluded.storage_gb, \
                uptime_secs = excluded.uptime_secs, \
                is_public = excluded.is_public, \
                status = 'active', \
                updated_at = excluded.updated_at",
            params![
                u.ip,
                u.pubkey,
                u.version,
                u.country,
                u.lat,
                u.lon,
                u.credits,
                u.storage_gb,
                u.uptime_secs,
                u.is_public as i64,
                now,
            ],
        )?;
        Ok(!exists)
    }

    fn apply_stats(&self, u: &NodeStatsUpdate, now: i64) -> Result<(), StoreError> {
        self.execute(
            "UPDATE nodes SET \
                cpu_percent = ?2, \
                ram_percent = ?3, \
                ram_used = ?4, \
                ram_total = ?5, \
                active_streams = ?6, \
                packets_received = ?7, \
                packets_sent = ?8, \
                storage_gb = ?9, \
                uptime_secs = ?10, \
                status = ?11, \
                updated_at = ?12 \
             WHERE ip = ?1",
            params![
                u.ip,
                u.cpu_percent,
                u.ram_percent,
                u.ram_used,
                u.ram_total,
                u.active_streams,
                u.packets_received,
                u.packets_sent,
                u.storage_gb,
                u.uptime_secs,
                u.status.as_str(),
                now,
            ],
        )?;
        Ok(())
    }

    fn mark_all_inactive(&self, now: i64) -> Result<usize, StoreError> {
        let touched = self.execute(
            "UPDATE nodes SET status = 'inactive', updated_at = ?1",
            params![now],
        )?;
        Ok(touched)
    }

    fn set_status(&self, ip: &str, status: NodeStatus, now: i64) -> Result<(), StoreError> {
        self.execute(
            "UPDATE nodes SET status = ?2, updated_at = ?3 WHERE ip = ?1",
            params![ip, status.as_str(), now],
        )?;
        Ok(())
    }

    fn load_node(&self, ip: &str) -> Result<Option<NodeRecord>, StoreError> {
        let node = self
            .query_row(
                &format!("SELECT {NODE_COLUMNS} FROM nodes WHERE ip = ?1"),
                params![ip],
                node_from_row,
            )
            .optional()?;
        Ok(node)
    }

    fn load_nodes(&self) -> Result<Vec<NodeRecord>, StoreError> {
        let mut stmt = self.prepare(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes ORDER BY credits DESC, ip ASC"
        ))?;
        let rows = stmt.query_map([], node_from_row)?;

        let mut nodes = Vec::new();
        for row in rows {
            nodes.push(row?);
        }
        Ok(nodes)
    }

    fn load_nodes_by_status(&self, status: NodeStatus) -> Result<Vec<NodeRecord>, StoreError> {
        let mut stmt = self.prepare(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE status = ?1 ORDER BY credits DESC, ip ASC"
        ))?;
        let rows = stmt.query_map(params![status.as_str()], node_from_row)?;

        let mut nodes = Vec::new();
        for row in rows {
            nodes.push(row?);
        }
        Ok(nodes)
    }

    fn count_by_status(&self, status: NodeStatus) -> Result<i64, StoreError> {
        let count = self.query_row(
            "SELECT COUNT(*) FROM nodes WHERE status = ?1",
            params![status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
