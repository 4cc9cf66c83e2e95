//! Shared test helpers: a scripted RPC transport and a wired-up
//! pipeline harness over an in-memory database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use podwatch_core::error::RpcError;
use podwatch_db::Database;
use podwatch_rpc::RpcTransport;
use podwatch_sync::{
    GossipSync, NetworkStatsCache, NodeListCache, StatsUpdater, SyncConfig,
};

/// Scripted in-process transport.
///
/// Responses are keyed by `(endpoint, method)` where the endpoint is the
/// post-normalization `host:port` form. Anything unscripted times out,
/// which is also how tests simulate unreachable pods.
pub struct ScriptedRpc {
    responses: Mutex<HashMap<(String, String), Result<Value, RpcError>>>,
    call_log: Mutex<Vec<(String, String)>>,
    calls: AtomicUsize,
}

impl ScriptedRpc {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            call_log: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Script the response for one `(endpoint, method)` pair.
    pub fn script(&self, endpoint: &str, method: &str, response: Result<Value, RpcError>) {
        self.responses
            .lock()
            .unwrap()
            .insert((endpoint.to_string(), method.to_string()), response);
    }

    /// Total calls issued through this transport.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every `(endpoint, method)` pair called, in order.
    pub fn call_log(&self) -> Vec<(String, String)> {
        self.call_log.lock().unwrap().clone()
    }
}

impl Default for ScriptedRpc {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RpcTransport for ScriptedRpc {
    async fn call(
        &self,
        endpoint: &str,
        method: &str,
        _params: Value,
        timeout: Duration,
    ) -> Result<Value, RpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_log
            .lock()
            .unwrap()
            .push((endpoint.to_string(), method.to_string()));

        self.responses
            .lock()
            .unwrap()
            .get(&(endpoint.to_string(), method.to_string()))
            .cloned()
            .unwrap_or(Err(RpcError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }))
    }
}

/// A fully wired pipeline over an in-memory database and scripted RPC.
pub struct Harness {
    pub db: Database,
    pub rpc: Arc<ScriptedRpc>,
    pub node_cache: Arc<NodeListCache>,
    pub stats_cache: Arc<NetworkStatsCache>,
    pub gossip: GossipSync,
    pub stats: StatsUpdater,
}

/// Deterministic test config: no endpoint shuffling, no enrichment
/// endpoints (credits read as 0, geo resolves from cache or sentinel).
pub fn test_config(endpoints: &[&str]) -> SyncConfig {
    SyncConfig {
        gossip_endpoints: endpoints.iter().map(|e| e.to_string()).collect(),
        shuffle_endpoints: false,
        gossip_timeout: Duration::from_millis(100),
        stats_timeout: Duration::from_millis(50),
        stats_batch_size: 4,
        cycle_budget: Duration::from_secs(30),
        ..SyncConfig::default()
    }
}

/// Build a harness around the given config.
pub fn harness(config: SyncConfig) -> Harness {
    let db = Database::open_in_memory().expect("in-memory db");
    let rpc = Arc::new(ScriptedRpc::new());
    let node_cache = Arc::new(NodeListCache::new());
    let stats_cache = Arc::new(NetworkStatsCache::new());

    let gossip = GossipSync::new(
        rpc.clone(),
        db.clone(),
        node_cache.clone(),
        stats_cache.clone(),
        config.clone(),
    );
    let stats = StatsUpdater::new(
        rpc.clone(),
        db.clone(),
        node_cache.clone(),
        stats_cache.clone(),
        config,
    );

    Harness {
        db,
        rpc,
        node_cache,
        stats_cache,
        gossip,
        stats,
    }
}

/// A gossip pod record in the `{list: [...]}` wire shape.
pub fn pod_json(ip: &str, pubkey: &str, storage: &str, uptime: i64) -> Value {
    json!({
        "ip": ip,
        "pubkey": pubkey,
        "storage": storage,
        "uptime": uptime,
    })
}

/// A healthy `get-stats` response body.
pub fn stats_json(cpu: f64, ram_used: i64, ram_total: i64, file_size: i64) -> Value {
    json!({
        "cpu_percent": cpu,
        "ram_used": ram_used,
        "ram_total": ram_total,
        "uptime": 300,
        "file_size": file_size,
        "active_streams": 2,
        "packets_received": 50,
        "packets_sent": 60,
    })
}
