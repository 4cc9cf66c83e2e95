//! Error types for the Podwatch pipeline.
use thiserror::Error;

/// Failure of a single JSON-RPC call to one endpoint.
///
/// There is no retry at this layer; callers implement fallback across
/// multiple endpoints and decide what a failure means for the cycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    #[error("transport: {0}")] Transport(String),
    #[error("timed out after {timeout_ms}ms")] Timeout { timeout_ms: u64 },
    #[error("remote error: {0}")] Remote(String),
    #[error("unrecognized response shape: {0}")] UnrecognizedShape(String),
}

/// A record that cannot identify a pod.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("record has no ip/address field")] MissingIp,
    #[error("placeholder ip: {0}")] PlaceholderIp(String),
}

/// Every candidate endpoint in a fallback list failed.
///
/// Carries one message per candidate, in attempt order.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("all {} candidate endpoints failed: {}", .attempts.len(), .attempts.join("; "))]
pub struct FallbackError {
    pub attempts: Vec<String>,
}
