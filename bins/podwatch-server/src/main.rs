//! Podwatch dashboard server.
//!
//! Serves the cached read API and the two POST-triggered reconciliation
//! entry points. The reconciliation cycles can also run on in-process
//! tickers; by default they are driven externally (cron hitting the POST
//! endpoints).

mod config;
mod routes;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tracing::{error, info, warn};

use podwatch_core::constants::{
    DEFAULT_CYCLE_BUDGET_SECS, DEFAULT_GOSSIP_TIMEOUT_MS, DEFAULT_STATS_BATCH_SIZE,
    DEFAULT_STATS_TIMEOUT_MS,
};
use podwatch_db::Database;
use podwatch_rpc::HttpRpcClient;
use podwatch_sync::{
    refresh_caches, GossipSync, NetworkStatsCache, NodeListCache, StatsScope, StatsUpdater,
    SyncConfig,
};

use config::Config;

/// Podwatch dashboard server.
#[derive(Parser, Debug)]
#[command(
    name = "podwatch-server",
    version,
    about = "Dashboard backend for gossip-based pod networks"
)]
struct Args {
    /// HTTP bind address
    #[arg(long, env = "PODWATCH_BIND_ADDR", default_value = "0.0.0.0:8080")]
    bind_addr: String,

    /// SQLite database path
    #[arg(long, env = "PODWATCH_DB_PATH", default_value = "podwatch.db")]
    db_path: PathBuf,

    /// Gossip seed endpoints (comma-separated host[:port])
    #[arg(long, env = "PODWATCH_GOSSIP_ENDPOINTS", value_delimiter = ',')]
    gossip_endpoints: Vec<String>,

    /// Third-party credits endpoint URL
    #[arg(long, env = "PODWATCH_CREDITS_URL")]
    credits_url: Option<String>,

    /// Third-party geo-IP endpoint URL prefix
    #[arg(long, env = "PODWATCH_GEO_URL")]
    geo_url: Option<String>,

    /// Gossip fetch timeout (milliseconds)
    #[arg(long, default_value_t = DEFAULT_GOSSIP_TIMEOUT_MS)]
    gossip_timeout_ms: u64,

    /// Per-node stats call timeout (milliseconds)
    #[arg(long, default_value_t = DEFAULT_STATS_TIMEOUT_MS)]
    stats_timeout_ms: u64,

    /// Simultaneous in-flight stats calls per batch
    #[arg(long, default_value_t = DEFAULT_STATS_BATCH_SIZE)]
    stats_batch_size: usize,

    /// Stats candidate scope: "all" or "active"
    #[arg(long, default_value = "all")]
    stats_scope: String,

    /// Hard wall-clock budget per reconciliation cycle (seconds)
    #[arg(long, default_value_t = DEFAULT_CYCLE_BUDGET_SECS)]
    cycle_budget_secs: u64,

    /// Try gossip endpoints in configured order instead of shuffling
    #[arg(long)]
    no_shuffle: bool,

    /// In-process gossip cycle interval (seconds, 0 = external scheduler)
    #[arg(long, env = "PODWATCH_GOSSIP_INTERVAL_SECS", default_value_t = 0)]
    gossip_interval_secs: u64,

    /// In-process stats cycle interval (seconds, 0 = external scheduler)
    #[arg(long, env = "PODWATCH_STATS_INTERVAL_SECS", default_value_t = 0)]
    stats_interval_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,
}

impl Args {
    fn into_config(self) -> (Config, String, String) {
        let stats_scope = match self.stats_scope.as_str() {
            "active" => StatsScope::ActiveOnly,
            _ => StatsScope::All,
        };

        let sync = SyncConfig {
            gossip_endpoints: self.gossip_endpoints,
            shuffle_endpoints: !self.no_shuffle,
            gossip_timeout: Duration::from_millis(self.gossip_timeout_ms),
            stats_timeout: Duration::from_millis(self.stats_timeout_ms),
            stats_batch_size: self.stats_batch_size,
            stats_scope,
            cycle_budget: Duration::from_secs(self.cycle_budget_secs),
            credits_url: self.credits_url,
            geo_url: self.geo_url,
            ..SyncConfig::default()
        };

        let config = Config {
            bind_addr: self.bind_addr,
            db_path: self.db_path,
            sync,
            gossip_interval_secs: self.gossip_interval_secs,
            stats_interval_secs: self.stats_interval_secs,
        };

        (config, self.log_level, self.log_format)
    }
}

/// Shared state for all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub node_cache: Arc<NodeListCache>,
    pub stats_cache: Arc<NetworkStatsCache>,
    pub gossip: Arc<GossipSync>,
    pub stats: Arc<StatsUpdater>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let (config, log_level, log_format) = args.into_config();

    init_logging(&log_level, &log_format);

    info!("Podwatch Server v{}", env!("CARGO_PKG_VERSION"));
    info!("bind_addr: {}", config.bind_addr);
    info!("db_path: {:?}", config.db_path);
    info!("gossip_endpoints: {:?}", config.sync.gossip_endpoints);
    info!("stats_scope: {:?}", config.sync.stats_scope);

    if config.sync.gossip_endpoints.is_empty() {
        warn!("no gossip endpoints configured; topology sync will find nothing to fetch");
    }

    if let Err(e) = run(config).await {
        error!("server failed: {e:#}");
        process::exit(1);
    }
}

async fn run(config: Config) -> Result<()> {
    let db = Database::open(&config.db_path)?;
    let node_cache = Arc::new(NodeListCache::new());
    let stats_cache = Arc::new(NetworkStatsCache::new());

    let rpc = Arc::new(HttpRpcClient::new()?);

    let gossip = Arc::new(GossipSync::new(
        rpc.clone(),
        db.clone(),
        node_cache.clone(),
        stats_cache.clone(),
        config.sync.clone(),
    ));
    let stats = Arc::new(StatsUpdater::new(
        rpc,
        db.clone(),
        node_cache.clone(),
        stats_cache.clone(),
        config.sync.clone(),
    ));

    // Warm the caches from whatever the store already holds, so the
    // first read after a restart is a hit rather than a recompute.
    if let Err(e) = refresh_caches(&db, &node_cache, &stats_cache, Utc::now().timestamp()) {
        warn!(error = %e, "initial cache warm-up failed; read paths will fall back");
    }

    if config.gossip_interval_secs > 0 {
        let gossip = gossip.clone();
        let interval = Duration::from_secs(config.gossip_interval_secs);
        tokio::spawn(async move {
            let mut ticker = cycle_ticker(interval);
            loop {
                ticker.tick().await;
                info!("gossip ticker firing");
                gossip.run().await;
            }
        });
    } else {
        info!("gossip ticker disabled; cycles run via POST trigger only");
    }

    if config.stats_interval_secs > 0 {
        let stats = stats.clone();
        let interval = Duration::from_secs(config.stats_interval_secs);
        tokio::spawn(async move {
            let mut ticker = cycle_ticker(interval);
            loop {
                ticker.tick().await;
                stats.run().await;
            }
        });
    } else {
        info!("stats ticker disabled; cycles run via POST trigger only");
    }

    let state = AppState {
        db,
        node_cache,
        stats_cache,
        gossip,
        stats,
    };
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Dashboard API listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Interval that delays rather than bursts when a cycle overruns.
fn cycle_ticker(period: Duration) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker
}

fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
