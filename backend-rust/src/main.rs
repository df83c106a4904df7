mod collector;
mod handlers;
mod persistence;
mod state;
mod store;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use socketioxide::SocketIo;
use tokio::sync::{mpsc, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use collector::{start_collector, CollectorConfig};
use handlers::{ingest_and_collect, now_ms, on_connect, SharedState};
use persistence::load_server_default;
use state::{LogChannel, SessionState};
use track_types::{Position, ServerInfo, TrackPoint};

// ─── Time Sync Endpoint ───────────────────────────────────────────────────────

async fn time_sync() -> Json<Value> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    Json(json!({ "serverTime": now }))
}

// ─── Read API ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionsQuery {
    id: Option<i64>,
    device_id: Option<String>,
}

async fn api_server(State(shared): State<SharedState>) -> Json<ServerInfo> {
    let state = shared.read().await;
    Json(state.server.clone())
}

/// Latest positions — all devices, or filtered by observation id / device id.
/// The `?id=` form is what the notification drawer uses before re-injecting
/// an event's position through the `positions` socket channel.
async fn api_positions(
    State(shared): State<SharedState>,
    Query(query): Query<PositionsQuery>,
) -> Json<Vec<Position>> {
    let state = shared.read().await;
    let positions = if let Some(id) = query.id {
        state.store.by_position_id(id).cloned().into_iter().collect()
    } else if let Some(device_id) = &query.device_id {
        state.store.latest(device_id).cloned().into_iter().collect()
    } else {
        state.store.positions().values().cloned().collect()
    };
    Json(positions)
}

/// Live-route trail for one device, oldest point first.
async fn api_history(
    State(shared): State<SharedState>,
    Path(device_id): Path<String>,
) -> Json<Vec<TrackPoint>> {
    let state = shared.read().await;
    let trail = state
        .store
        .route(&device_id)
        .map(|route| route.iter().copied().collect())
        .unwrap_or_default();
    Json(trail)
}

// ─── Ingest Pump Task ─────────────────────────────────────────────────────────

/// Drains the collector channel: each batch is merged into the store under
/// the session write lock and the post-merge records are pushed to clients.
async fn run_ingest_pump(
    mut batch_rx: mpsc::Receiver<Vec<Position>>,
    shared: SharedState,
    io: SocketIo,
) {
    while let Some(batch) = batch_rx.recv().await {
        let merged = {
            let mut state = shared.write().await;
            if state.include_logs {
                let payload = serde_json::to_value(&batch).unwrap_or(Value::Null);
                state.push_log(now_ms(), LogChannel::Positions, payload);
            }
            ingest_and_collect(&mut state, batch)
        };

        if !merged.is_empty() {
            let _ = io.emit("positions", &merged);
        }
    }
}

// ─── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleetlive_backend=info,socketioxide=warn".into()),
        )
        .init();

    info!("🛰️  FleetLive Backend starting...");

    // Load persisted server preferences
    let server = load_server_default().await;
    let shared: SharedState = Arc::new(RwLock::new(SessionState::new(server)));

    // Build Socket.IO layer
    let (socket_layer, io) = SocketIo::builder().build_layer();

    let shared_sock = shared.clone();
    io.ns("/", move |socket: socketioxide::extract::SocketRef| {
        let shared = shared_sock.clone();
        async move {
            on_connect(socket, shared).await;
        }
    });

    // UDP collector feeding the ingest pump
    let (batch_tx, batch_rx) = mpsc::channel::<Vec<Position>>(256);
    tokio::spawn(start_collector(CollectorConfig::default(), batch_tx));
    tokio::spawn(run_ingest_pump(batch_rx, shared.clone(), io.clone()));

    // CORS — allow all origins (local UI dev servers connect cross-origin)
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build Axum router
    let app = Router::new()
        .route("/sync", get(time_sync))
        .route("/api/server", get(api_server))
        .route("/api/positions", get(api_positions))
        .route("/api/history/:device_id", get(api_history))
        .with_state(shared.clone())
        .layer(socket_layer)
        .layer(cors);

    let port = std::env::var("PORT").unwrap_or_else(|_| "8082".to_string());
    let addr = format!("0.0.0.0:{port}");
    info!("🚀 Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
