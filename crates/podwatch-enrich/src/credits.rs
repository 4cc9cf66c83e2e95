//! Bulk credit balance lookup.
//!
//! One GET per gossip cycle against the third-party credits endpoint.
//! The result is an in-process map keyed by pod pubkey; it is never
//! cached across cycles. Any failure degrades to an empty map — callers
//! treat a missing entry as a zero balance, and the cycle proceeds.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct CreditsResponse {
    pods_credits: Vec<PodCredits>,
}

#[derive(Debug, Deserialize)]
struct PodCredits {
    pod_id: String,
    credits: i64,
}

/// Client for the third-party credits endpoint.
pub struct CreditsClient {
    client: Client,
    /// `None` disables the lookup entirely (every balance reads as 0).
    url: Option<String>,
    timeout: Duration,
}

impl CreditsClient {
    pub fn new(url: Option<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            url,
            timeout,
        }
    }

    /// Fetch the full credit map.
    ///
    /// Infallible by contract: network errors, bad status codes, and
    /// malformed JSON all degrade to an empty map with a warning.
    pub async fn fetch_credit_map(&self) -> HashMap<String, i64> {
        let Some(url) = &self.url else {
            return HashMap::new();
        };

        let response = match self.client.get(url).timeout(self.timeout).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "credits fetch failed; treating all balances as 0");
                return HashMap::new();
            }
        };

        match response.json::<CreditsResponse>().await {
            Ok(body) => body
                .pods_credits
                .into_iter()
                .map(|p| (p.pod_id, p.credits))
                .collect(),
            Err(e) => {
                warn!(error = %e, "credits response malformed; treating all balances as 0");
                HashMap::new()
            }
        }
    }
}
