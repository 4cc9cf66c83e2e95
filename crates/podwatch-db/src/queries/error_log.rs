//! Error log queries.
//!
//! Writes take the typed [`ErrorLogEntry`]; reads return [`ErrorLogRow`]
//! with source/phase as plain strings, which is what the API serves.

use rusqlite::{params, Connection};
use serde::Serialize;

use podwatch_core::types::ErrorLogEntry;

use super::super::error::StoreError;

/// One stored error-log row, as served by the read API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorLogRow {
    pub id: i64,
    pub source: String,
    pub phase: String,
    pub node_ip: Option<String>,
    pub message: String,
    pub details: Option<String>,
    pub created_at: i64,
}

/// Queries against the `error_log` table.
pub trait ErrorLogQueries {
    /// Append one error fact.
    fn insert_error(&self, entry: &ErrorLogEntry) -> Result<(), StoreError>;

    /// Recent errors, newest first, optionally filtered by source and phase.
    fn load_errors(
        &self,
        source: Option<&str>,
        phase: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ErrorLogRow>, StoreError>;
}

impl ErrorLogQueries for Connection {
    fn insert_error(&self, entry: &ErrorLogEntry) -> Result<(), StoreError> {
        self.execute(
            "INSERT INTO error_log (source, phase, node_ip, message, details, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                entry.source.as_str(),
                entry.phase.as_str(),
                entry.node_ip,
                entry.message,
                entry.details,
                entry.created_at,
            ],
        )?;
        Ok(())
    }

    fn load_errors(
        &self,
        source: Option<&str>,
        phase: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ErrorLogRow>, StoreError> {
        let mut stmt = self.prepare(
            "SELECT id, source, phase, node_ip, message, details, created_at FROM error_log \
             WHERE (?1 IS NULL OR source = ?1) AND (?2 IS NULL OR phase = ?2) \
             ORDER BY created_at DESC, id DESC LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![source, phase, limit as i64], |row| {
            Ok(ErrorLogRow {
                id: row.get(0)?,
                source: row.get(1)?,
                phase: row.get(2)?,
                node_ip: row.get(3)?,
                message: row.get(4)?,
                details: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?;

        let mut errors = Vec::new();
        for row in rows {
            errors.push(row?);
        }
        Ok(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations;
    use podwatch_core::types::{Phase, Source};

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrations::initialize_schema(&conn).unwrap();
        conn
    }

    fn entry(source: Source, phase: Phase, at: i64) -> ErrorLogEntry {
        ErrorLogEntry {
            source,
            phase,
            node_ip: Some("10.0.0.1".to_string()),
            message: "boom".to_string(),
            details: None,
            created_at: at,
        }
    }

    #[test]
    fn insert_and_load_newest_first() {
        let conn = setup_db();
        conn.insert_error(&entry(Source::GossipSync, Phase::Fetch, 1000)).unwrap();
        conn.insert_error(&entry(Source::GossipSync, Phase::Fetch, 2000)).unwrap();

        let rows = conn.load_errors(None, None, 10).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].created_at, 2000);
        assert_eq!(rows[0].source, "gossip_sync");
        assert_eq!(rows[0].phase, "fetch");
    }

    #[test]
    fn filters_by_source_and_phase() {
        let conn = setup_db();
        conn.insert_error(&entry(Source::GossipSync, Phase::Fetch, 1000)).unwrap();
        conn.insert_error(&entry(Source::GossipSync, Phase::Validation, 1001)).unwrap();
        conn.insert_error(&entry(Source::StatsUpdater, Phase::StatsQuery, 1002)).unwrap();

        let by_source = conn.load_errors(Some("gossip_sync"), None, 10).unwrap();
        assert_eq!(by_source.len(), 2);

        let by_both = conn
            .load_errors(Some("gossip_sync"), Some("validation"), 10)
            .unwrap();
        assert_eq!(by_both.len(), 1);
        assert_eq!(by_both[0].phase, "validation");
    }

    #[test]
    fn limit_is_honored() {
        let conn = setup_db();
        for at in 0..20 {
            conn.insert_error(&entry(Source::Api, Phase::Aggregate, at)).unwrap();
        }
        let rows = conn.load_errors(None, None, 5).unwrap();
        assert_eq!(rows.len(), 5);
    }
}
