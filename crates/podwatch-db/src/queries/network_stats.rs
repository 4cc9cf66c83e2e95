//! Network rollup queries.
//!
//! One `network_stats` row per completed reconciliation cycle. The credit
//! total is stored as a decimal TEXT column: per-pod balances are i64 and
//! the network-wide sum can exceed it.

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use podwatch_core::types::NetworkStatsRow;

use super::super::error::StoreError;

fn rollup_from_row(row: &Row<'_>) -> rusqlite::Result<NetworkStatsRow> {
    let credits: String = row.get("total_credits")?;
    let total_credits = credits.parse::<i128>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e))
    })?;
    Ok(NetworkStatsRow {
        active_nodes: row.get("active_nodes")?,
        inactive_nodes: row.get("inactive_nodes")?,
        total_storage_gb: row.get("total_storage_gb")?,
        total_credits,
        created_at: row.get("created_at")?,
    })
}

/// Queries against the `network_stats` table.
pub trait NetworkStatsQueries {
    /// Append one per-cycle rollup row.
    fn insert_network_stats(&self, rollup: &NetworkStatsRow) -> Result<(), StoreError>;

    /// All rollups at or after `since`, oldest first.
    fn load_network_stats_since(&self, since: i64) -> Result<Vec<NetworkStatsRow>, StoreError>;

    /// The most recent rollup, if any cycle has completed.
    fn latest_network_stats(&self) -> Result<Option<NetworkStatsRow>, StoreError>;

    /// Timestamp of the oldest rollup; drives dynamic bucket sizing.
    fn earliest_network_stats_at(&self) -> Result<Option<i64>, StoreError>;
}

impl NetworkStatsQueries for Connection {
    fn insert_network_stats(&self, rollup: &NetworkStatsRow) -> Result<(), StoreError> {
        self.execute(
            "INSERT INTO network_stats (active_nodes, inactive_nodes, total_storage_gb, \
                                        total_credits, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                rollup.active_nodes,
                rollup.inactive_nodes,
                rollup.total_storage_gb,
                rollup.total_credits.to_string(),
                rollup.created_at,
            ],
        )?;
        Ok(())
    }

    fn load_network_stats_since(&self, since: i64) -> Result<Vec<NetworkStatsRow>, StoreError> {
        let mut stmt = self.prepare(
            "SELECT active_nodes, inactive_nodes, total_storage_gb, total_credits, created_at \
             FROM network_stats WHERE created_at >= ?1 ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![since], rollup_from_row)?;

        let mut rollups = Vec::new();
        for row in rows {
            rollups.push(row?);
        }
        Ok(rollups)
    }

    fn latest_network_stats(&self) -> Result<Option<NetworkStatsRow>, StoreError> {
        let rollup = self
            .query_row(
                "SELECT active_nodes, inactive_nodes, total_storage_gb, total_credits, created_at \
                 FROM network_stats ORDER BY created_at DESC, id DESC LIMIT 1",
                [],
                rollup_from_row,
            )
            .optional()?;
        Ok(rollup)
    }

    fn earliest_network_stats_at(&self) -> Result<Option<i64>, StoreError> {
        let at = self
            .query_row("SELECT MIN(created_at) FROM network_stats", [], |row| {
                row.get::<_, Option<i64>>(0)
            })?;
        Ok(at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrations::initialize_schema(&conn).unwrap();
        conn
    }

    fn rollup(at: i64, active: i64) -> NetworkStatsRow {
        NetworkStatsRow {
            active_nodes: active,
            inactive_nodes: 2,
            total_storage_gb: 100.5,
            total_credits: 1_000_000,
            created_at: at,
        }
    }

    #[test]
    fn rollup_round_trips() {
        let conn = setup_db();
        conn.insert_network_stats(&rollup(1000, 7)).unwrap();

        let latest = conn.latest_network_stats().unwrap().unwrap();
        assert_eq!(latest, rollup(1000, 7));
    }

    #[test]
    fn credit_totals_survive_beyond_i64() {
        let conn = setup_db();
        let big = NetworkStatsRow {
            total_credits: i64::MAX as i128 * 3,
            ..rollup(1000, 1)
        };
        conn.insert_network_stats(&big).unwrap();
        let latest = conn.latest_network_stats().unwrap().unwrap();
        assert_eq!(latest.total_credits, i64::MAX as i128 * 3);
    }

    #[test]
    fn since_filter_and_ordering() {
        let conn = setup_db();
        for at in [3000, 1000, 2000] {
            conn.insert_network_stats(&rollup(at, 1)).unwrap();
        }

        let rows = conn.load_network_stats_since(2000).unwrap();
        let times: Vec<i64> = rows.iter().map(|r| r.created_at).collect();
        assert_eq!(times, vec![2000, 3000]);
        assert_eq!(conn.earliest_network_stats_at().unwrap(), Some(1000));
    }

    #[test]
    fn empty_table_yields_none() {
        let conn = setup_db();
        assert!(conn.latest_network_stats().unwrap().is_none());
        assert_eq!(conn.earliest_network_stats_at().unwrap(), None);
    }
}
