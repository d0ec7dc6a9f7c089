//! HTTP surface: the query and ingest endpoints clients use when they have
//! no live channel, plus the channel upgrade route itself.

use std::sync::Arc;

use axum::{
    extract::{Query, State, WebSocketUpgrade},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use fresco_store::constants::MAX_BATCH_HTTP;
use fresco_store::{Database, TileCoord, TileStrokes};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::ingest::IngestCoordinator;
use crate::protocol;
use crate::relay::Relay;
use crate::sessions::SessionRegistry;
use crate::ws;

#[derive(Clone)]
pub struct AppState {
    pub ingest: Arc<IngestCoordinator>,
    pub registry: Arc<SessionRegistry>,
    pub relay: Relay,
}

/// Open the store and wire the registry, relay, and coordinator together.
pub fn build_state(config: &ServerConfig) -> Result<AppState, ServerError> {
    let db = Database::open_in(&config.data_dir)?;
    let registry = Arc::new(SessionRegistry::new());
    let relay = Relay::new(registry.clone());
    let ingest = Arc::new(IngestCoordinator::new(
        db,
        relay.clone(),
        config.gzip_level,
        config.max_store_bytes,
    ));

    Ok(AppState {
        ingest,
        registry,
        relay,
    })
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_headers(Any);

    Router::new()
        .route("/api/ping", get(ping))
        .route("/api/tile-strokes", get(tile_strokes))
        .route("/api/tile-strokes-batch", post(tile_strokes_batch))
        .route("/api/stroke", post(submit_stroke))
        .route("/api/db-status", get(db_status))
        .route("/ws", get(ws_upgrade))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn ping() -> Json<Value> {
    Json(json!({"ok": true}))
}

#[derive(Deserialize)]
struct TileParams {
    #[serde(default)]
    z: i64,
    tx: Option<f64>,
    ty: Option<f64>,
    since: Option<i64>,
}

async fn tile_strokes(
    State(state): State<AppState>,
    Query(params): Query<TileParams>,
) -> Result<Json<TileStrokes>, ServerError> {
    let (tx, ty) = match (params.tx, params.ty) {
        (Some(tx), Some(ty)) if tx.is_finite() && ty.is_finite() => (tx as i64, ty as i64),
        _ => return Err(ServerError::BadRequest("tx and ty are required".into())),
    };

    let strokes = state.ingest.scan_tile(params.z, tx, ty, params.since).await?;
    Ok(Json(TileStrokes {
        z: params.z,
        tx,
        ty,
        strokes,
    }))
}

#[derive(Deserialize)]
struct BatchRequest {
    #[serde(default)]
    z: i64,
    #[serde(default)]
    tiles: Vec<Value>,
}

async fn tile_strokes_batch(
    State(state): State<AppState>,
    Json(req): Json<BatchRequest>,
) -> Result<Json<Value>, ServerError> {
    if req.tiles.len() > MAX_BATCH_HTTP {
        return Err(ServerError::BadRequest(format!(
            "too many tiles: {} (max {MAX_BATCH_HTTP})",
            req.tiles.len()
        )));
    }

    let mut out = Vec::new();
    for entry in &req.tiles {
        // Invalid entries are skipped, not errors.
        let Some(TileCoord { tx, ty }) = protocol::tile_entry(entry) else {
            continue;
        };
        let strokes = state.ingest.scan_tile(req.z, tx, ty, None).await?;
        out.push(TileStrokes {
            z: req.z,
            tx,
            ty,
            strokes,
        });
    }

    Ok(Json(json!({"tiles": out})))
}

async fn submit_stroke(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<Value>, ServerError> {
    let raw: Value = serde_json::from_str(&body)
        .map_err(|e| ServerError::BadRequest(format!("invalid JSON: {e}")))?;

    let outcome = state.ingest.ingest(&raw, None).await?;
    Ok(Json(json!({
        "ok": true,
        "id": outcome.stroke.id,
        "t": outcome.stroke.t,
    })))
}

async fn db_status(State(state): State<AppState>) -> Result<Json<Value>, ServerError> {
    let stats = state.ingest.stats().await?;
    let max = state.ingest.max_store_bytes();

    let utilization = if max == 0 {
        100.0
    } else {
        round2(stats.total_bytes as f64 / max as f64 * 100.0)
    };

    Ok(Json(json!({
        "sizeBytes": stats.total_bytes,
        "sizeMB": mb(stats.total_bytes),
        "maxSizeBytes": max,
        "maxSizeMB": mb(max),
        "strokeCount": stats.row_count,
        "utilizationPercent": utilization,
    })))
}

async fn ws_upgrade(State(state): State<AppState>, upgrade: WebSocketUpgrade) -> Response {
    upgrade.on_upgrade(move |socket| ws::handle_socket(socket, state))
}

fn mb(bytes: u64) -> f64 {
    round2(bytes as f64 / (1024.0 * 1024.0))
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
