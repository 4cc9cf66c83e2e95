//! Typed query traits, one per data domain, implemented on
//! [`rusqlite::Connection`].
//!
//! Because [`rusqlite::Transaction`] derefs to `Connection`, every trait
//! works identically inside [`crate::Database::transaction`] closures.

pub mod error_log;
pub mod geo;
pub mod network_stats;
pub mod nodes;
pub mod snapshots;

pub use error_log::{ErrorLogQueries, ErrorLogRow};
pub use geo::GeoQueries;
pub use network_stats::NetworkStatsQueries;
pub use nodes::NodeQueries;
pub use snapshots::SnapshotQueries;
