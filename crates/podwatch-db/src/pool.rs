//! Connection pool management.
//!
//! Provides the [`Database`] struct wrapping an r2d2 connection pool for
//! SQLite. The handle is `Clone` and can be shared across threads; each
//! call to [`connection`](Database::connection) borrows a connection from
//! the pool, returned when dropped.
//!
//! Operations that require atomicity go through
//! [`transaction`](Database::transaction); everything else uses
//! [`with_connection`](Database::with_connection).

use crate::error::StoreError;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

/// A pooled SQLite connection, returned to the pool when dropped.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Database handle with connection pooling.
///
/// The primary entry point for all persistence. Query functionality lives
/// in the domain traits under [`crate::queries`], implemented directly on
/// [`rusqlite::Connection`]; this handle hands out connections and scopes
/// transactions.
pub struct Database {
    pub(crate) pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Obtains a connection from the pool.
    pub fn connection(&self) -> Result<PooledConnection, StoreError> {
        self.pool.get().map_err(StoreError::from)
    }

    /// Executes a closure within a database transaction.
    ///
    /// If the closure returns `Ok` the transaction is committed; on `Err`
    /// it is rolled back and nothing the closure did persists.
    pub fn transaction<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&rusqlite::Transaction) -> Result<T, StoreError>,
    {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Executes a closure with a plain pooled connection.
    ///
    /// For reads and single-statement writes that don't need explicit
    /// transaction handling.
    pub fn with_connection<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self.connection()?;
        f(&conn)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}
