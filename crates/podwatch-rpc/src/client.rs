//! JSON-RPC 2.0 client.
//!
//! One trait seam, [`RpcTransport`], and one production implementation
//! backed by reqwest. This layer never retries: the reconciliation
//! pipeline implements fallback across multiple endpoints and decides
//! what a failure means for the cycle.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use podwatch_core::error::RpcError;

/// Async seam for issuing one JSON-RPC call to one endpoint.
///
/// `endpoint` is a `host:port` address (already normalized for RPC);
/// implementations build the URL from it. Returns the envelope's `result`
/// value on success.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn call(
        &self,
        endpoint: &str,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, RpcError>;
}

/// Production transport: JSON-RPC 2.0 over HTTP POST via reqwest.
pub struct HttpRpcClient {
    client: Client,
}

impl HttpRpcClient {
    pub fn new() -> Result<Self, RpcError> {
        let client = Client::builder()
            .build()
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RpcTransport for HttpRpcClient {
    async fn call(
        &self,
        endpoint: &str,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, RpcError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let url = format!("http://{endpoint}/");
        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(e, timeout))?;

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| classify_reqwest_error(e, timeout))?;

        if let Some(err) = envelope.get("error") {
            if !err.is_null() {
                return Err(RpcError::Remote(err.to_string()));
            }
        }

        Ok(envelope.get("result").cloned().unwrap_or(Value::Null))
    }
}

fn classify_reqwest_error(e: reqwest::Error, timeout: Duration) -> RpcError {
    if e.is_timeout() {
        RpcError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    } else {
        RpcError::Transport(e.to_string())
    }
}
