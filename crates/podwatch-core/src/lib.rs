//! # podwatch-core
//! Foundation types for the Podwatch dashboard backend.

pub mod addr;
pub mod constants;
pub mod error;
pub mod types;

pub use error::{FallbackError, RpcError, ValidationError};
pub use types::{
    ErrorLogEntry, GeoInfo, NetworkStatsRow, NodeRecord, NodeSnapshot, NodeStatsUpdate,
    NodeStatus, NodeTopologyUpdate, Phase, Source,
};
