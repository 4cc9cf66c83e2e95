use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

use podwatch_core::addr::canonical_key;
use podwatch_core::constants::NODE_HISTORY_LIMIT;
use podwatch_sync::{compute_network_stats, compute_node_list, StatsRange};
use podwatch_db::{ErrorLogQueries, NodeQueries, SnapshotQueries};

// ── Error helper ─────────────────────────────────────────────────────────────

enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Internal(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for ApiError {
    fn from(e: E) -> Self {
        ApiError::Internal(e.into())
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ── Router ───────────────────────────────────────────────────────────────────

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/nodes", get(list_nodes))
        .route("/api/nodes/:ip", get(node_detail))
        .route("/api/network/stats", get(network_stats))
        .route("/api/errors", get(error_log))
        .route("/api/sync/gossip", post(trigger_gossip))
        .route("/api/sync/stats", post(trigger_stats))
        .layer(cors)
        .with_state(state)
}

// ── /api/health ──────────────────────────────────────────────────────────────

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ── /api/nodes?page&limit ────────────────────────────────────────────────────

#[derive(Deserialize)]
struct NodesQuery {
    page: Option<usize>,
    limit: Option<usize>,
}

/// Paginated node list, served from the node-list cache.
///
/// Pagination slices the cached array; a cache hit never re-queries the
/// store. A miss (only possible after a failed refresh) computes from
/// the store and repopulates the slot.
async fn list_nodes(
    State(s): State<AppState>,
    Query(q): Query<NodesQuery>,
) -> ApiResult<Value> {
    let payload = match s.node_cache.get() {
        Some(payload) => payload,
        None => {
            let computed = compute_node_list(&s.db, Utc::now().timestamp())?;
            s.node_cache.set(computed);
            s.node_cache
                .get()
                .ok_or_else(|| anyhow::anyhow!("node-list cache vanished after set"))?
        }
    };

    let page = q.page.unwrap_or(1).max(1);
    let limit = q.limit.unwrap_or(50).clamp(1, 500);
    let total = payload.nodes.len();
    let total_pages = total.div_ceil(limit).max(1);
    let start = (page - 1).saturating_mul(limit).min(total);
    let end = (start + limit).min(total);

    Ok(Json(json!({
        "nodes": &payload.nodes[start..end],
        "stats": payload.stats,
        "pagination": {
            "page": page,
            "limit": limit,
            "total": total,
            "totalPages": total_pages,
        },
    })))
}

// ── /api/nodes/:ip ───────────────────────────────────────────────────────────

/// Single-node detail plus bounded recent history. 404 for unknown IPs.
async fn node_detail(
    State(s): State<AppState>,
    Path(ip): Path<String>,
) -> ApiResult<Value> {
    let ip = canonical_key(&ip);

    let (node, history) = s.db.with_connection(|conn| {
        let node = conn.load_node(&ip)?;
        let history = conn.load_recent_snapshots(&ip, NODE_HISTORY_LIMIT)?;
        Ok((node, history))
    })?;

    let Some(node) = node else {
        return Err(ApiError::NotFound(format!("unknown node: {ip}")));
    };

    Ok(Json(json!({
        "node": podwatch_sync::NodeView::from(&node),
        "history": history,
    })))
}

// ── /api/network/stats?range= ────────────────────────────────────────────────

#[derive(Deserialize)]
struct StatsQueryParams {
    range: Option<String>,
}

async fn network_stats(
    State(s): State<AppState>,
    Query(q): Query<StatsQueryParams>,
) -> ApiResult<Value> {
    let label = q.range.as_deref().unwrap_or("24h");
    let range: StatsRange = label
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid range: {label}")))?;

    let payload = match s.stats_cache.get(range) {
        Some(payload) => payload,
        None => {
            let computed = compute_network_stats(&s.db, range, Utc::now().timestamp())?;
            s.stats_cache.set(range, computed);
            s.stats_cache
                .get(range)
                .ok_or_else(|| anyhow::anyhow!("network-stats cache vanished after set"))?
        }
    };

    Ok(Json(serde_json::to_value(&*payload)?))
}

// ── /api/errors?source&phase&limit ───────────────────────────────────────────

#[derive(Deserialize)]
struct ErrorsQuery {
    source: Option<String>,
    phase: Option<String>,
    limit: Option<usize>,
}

async fn error_log(
    State(s): State<AppState>,
    Query(q): Query<ErrorsQuery>,
) -> ApiResult<Value> {
    let limit = q.limit.unwrap_or(50).clamp(1, 500);
    let rows = s.db.with_connection(|conn| {
        conn.load_errors(q.source.as_deref(), q.phase.as_deref(), limit)
    })?;

    Ok(Json(json!({ "errors": rows })))
}

// ── POST /api/sync/gossip, /api/sync/stats ───────────────────────────────────

/// Run one gossip cycle and return its report.
///
/// Non-2xx only for a critical failure (fetch exhausted, transaction
/// rolled back); a cycle that ran but found nothing to do is a 200 with
/// `success: false`.
async fn trigger_gossip(State(s): State<AppState>) -> Response {
    let report = s.gossip.run().await;
    let status = if report.is_critical() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    (status, Json(report)).into_response()
}

async fn trigger_stats(State(s): State<AppState>) -> Response {
    let report = s.stats.run().await;
    let status = if report.is_critical() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    (status, Json(report)).into_response()
}
