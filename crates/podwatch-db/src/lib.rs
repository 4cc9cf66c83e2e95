//! SQLite persistence layer for Podwatch.
//!
//! Stores the reconciled view of the pod network:
//!
//! - **nodes**: one row per canonical IP, the current view of each pod
//! - **node_snapshots**: append-only per-cycle metric history
//! - **network_stats**: one rollup row per completed reconciliation cycle
//! - **error_log**: best-effort observability facts from any pipeline phase
//! - **geo_cache**: durable geo-IP lookups, populated once per unique IP
//!
//! # Architecture
//!
//! - [`pool`]: connection pool management using r2d2
//! - [`schema`]: schema definition for fresh databases
//! - [`migrations`]: schema versioning and upgrade system
//! - [`queries`]: typed query traits per data domain
//! - [`error`]: error types
//!
//! Query functionality is organized into domain traits implemented on
//! [`rusqlite::Connection`]; [`Database`] hands out pooled connections and
//! scopes transactions around them.

pub mod error;
pub mod migrations;
pub mod pool;
pub mod queries;
pub mod schema;

pub use error::StoreError;
pub use migrations::{needs_migration, run_migrations, verify_schema, CURRENT_VERSION};
pub use pool::{Database, PooledConnection};
pub use queries::*;

use std::path::Path;

use podwatch_core::types::{ErrorLogEntry, NodeSnapshot};
use tracing::{debug, info};

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, StoreError>;

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// Creates the parent directory, configures SQLite pragmas, and either
    /// initializes a fresh schema or migrates an existing one.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = r2d2_sqlite::SqliteConnectionManager::file(path);
        let pool = r2d2::Pool::builder().max_size(10).build(manager)?;

        let db = Self { pool };
        db.initialize()?;
        Ok(db)
    }

    /// Opens an in-memory database, primarily for testing.
    ///
    /// The pool is limited to a single connection: each in-memory SQLite
    /// connection is its own database.
    pub fn open_in_memory() -> Result<Self> {
        let manager = r2d2_sqlite::SqliteConnectionManager::memory();
        let pool = r2d2::Pool::builder().max_size(1).build(manager)?;

        let db = Self { pool };
        db.initialize()?;
        Ok(db)
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.connection()?;

        // WAL for concurrent reads during the commit transaction, NORMAL
        // sync as the safety/speed balance, memory temp store.
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        "#,
        )?;

        let tables_exist: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='app_state'",
                [],
                |row| row.get(0),
            )
            .unwrap_or(false);

        if tables_exist {
            if migrations::needs_migration(&conn)? {
                info!("Database requires migration");
                migrations::run_migrations(&conn)?;
            }
            migrations::verify_schema(&conn)?;
        } else {
            migrations::initialize_schema(&conn)?;
        }

        Ok(())
    }

    /// Fire-and-forget error logging.
    ///
    /// The error log must never block or fail the pipeline, so a failed
    /// write is traced at debug level and otherwise swallowed.
    pub fn record_error(&self, entry: &ErrorLogEntry) {
        let result = self.with_connection(|conn| conn.insert_error(entry));
        if let Err(e) = result {
            debug!(error = %e, "error-log write dropped");
        }
    }

    /// Append a batch of snapshots in one transaction.
    pub fn insert_snapshots(&self, snapshots: &[NodeSnapshot]) -> Result<()> {
        if snapshots.is_empty() {
            return Ok(());
        }
        self.transaction(|tx| {
            for snap in snapshots {
                tx.insert_snapshot(snap)?;
            }
            Ok(())
        })
    }
}
