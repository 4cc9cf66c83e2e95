//! Multi-endpoint fallback for the gossip topology fetch.
//!
//! Candidates are tried strictly in sequence; the first structurally
//! valid response wins. Failures (call errors and unrecognized shapes)
//! are recorded per candidate and the iteration continues. Only when
//! every candidate has failed does the caller see an aggregate error
//! listing one message per candidate.

use std::time::Duration;

use rand::seq::SliceRandom;
use serde_json::json;
use tracing::{debug, warn};

use podwatch_core::addr::normalize_for_rpc;
use podwatch_core::error::FallbackError;

use crate::client::RpcTransport;
use crate::shape::{decode_pod_list, RawPod};

/// Method name for the gossip topology fetch.
pub const GET_PODS_WITH_STATS: &str = "get-pods-with-stats";

/// Method name for the per-node stats call.
pub const GET_STATS: &str = "get-stats";

/// Outcome of a successful fallback fetch.
#[derive(Debug)]
pub struct FallbackFetch {
    /// Decoded records from the first valid candidate.
    pub pods: Vec<RawPod>,
    /// Endpoint that produced them (post-normalization).
    pub endpoint: String,
    /// One message per candidate that failed before the winner.
    pub failed_attempts: Vec<String>,
}

/// Return a shuffled copy of the candidate list.
///
/// Shuffling spreads fetch load across seed endpoints over many cycles;
/// within one cycle the order is still strictly sequential.
pub fn shuffled(endpoints: &[String]) -> Vec<String> {
    let mut out = endpoints.to_vec();
    out.shuffle(&mut rand::thread_rng());
    out
}

/// Fetch the pod list, trying each candidate endpoint in order.
///
/// Addresses are normalized to their RPC form before dialing. On total
/// exhaustion the error carries one message per candidate, in attempt
/// order.
pub async fn fetch_pods(
    transport: &dyn RpcTransport,
    endpoints: &[String],
    timeout: Duration,
) -> Result<FallbackFetch, FallbackError> {
    let mut failed_attempts = Vec::new();

    for candidate in endpoints {
        let endpoint = normalize_for_rpc(candidate);
        debug!(%endpoint, "trying gossip candidate");

        let result = transport
            .call(&endpoint, GET_PODS_WITH_STATS, json!([]), timeout)
            .await;

        let value = match result {
            Ok(value) => value,
            Err(e) => {
                warn!(%endpoint, error = %e, "gossip candidate failed");
                failed_attempts.push(format!("{endpoint}: {e}"));
                continue;
            }
        };

        match decode_pod_list(&value) {
            Ok(pods) => {
                debug!(%endpoint, count = pods.len(), "gossip candidate accepted");
                return Ok(FallbackFetch {
                    pods,
                    endpoint,
                    failed_attempts,
                });
            }
            Err(e) => {
                warn!(%endpoint, error = %e, "gossip candidate returned bad shape");
                failed_attempts.push(format!("{endpoint}: {e}"));
            }
        }
    }

    Err(FallbackError {
        attempts: failed_attempts,
    })
}
