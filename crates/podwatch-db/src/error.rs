//! Database error types.

use thiserror::Error;

/// Database errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Data not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(String),
}
