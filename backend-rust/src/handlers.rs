use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;
use socketioxide::extract::{Data, SocketRef};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::persistence::save_server;
use crate::state::{LogChannel, SessionState};
use track_types::{Event, Position, ServerInfo, UserInfo};

// ─── Shared State Types ───────────────────────────────────────────────────────

pub type SharedState = Arc<RwLock<SessionState>>;

// ─── Helper: get unix ms ─────────────────────────────────────────────────────

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

// ─── Helper: batch payload parsing ───────────────────────────────────────────

/// Clients may push a single record or an array; accept both.
fn batch_from_value<T: serde::de::DeserializeOwned>(data: Value) -> Option<Vec<T>> {
    if data.is_array() {
        serde_json::from_value::<Vec<T>>(data).ok()
    } else {
        serde_json::from_value::<T>(data).ok().map(|one| vec![one])
    }
}

/// Run a batch through the store and collect the post-merge records for
/// broadcast, one per device touched, in first-touch order.
pub fn ingest_and_collect(state: &mut SessionState, batch: Vec<Position>) -> Vec<Position> {
    let mut device_ids: Vec<String> = Vec::new();
    for position in &batch {
        if !device_ids.contains(&position.device_id) {
            device_ids.push(position.device_id.clone());
        }
    }

    state.store.ingest(batch);

    device_ids
        .iter()
        .filter_map(|id| state.store.latest(id).cloned())
        .collect()
}

/// Snapshot sent to a freshly connected client.
fn session_snapshot(state: &SessionState) -> Value {
    serde_json::json!({
        "server": state.server,
        "user": state.user,
        "positions": state.store.positions(),
        "history": state.store.history(),
        "events": state.events,
    })
}

// ─── Main Connection Handler ──────────────────────────────────────────────────

pub async fn on_connect(socket: SocketRef, shared: SharedState) {
    let socket_id = socket.id.to_string();
    info!("Client connected: {socket_id}");

    socket.on_disconnect({
        let sid = socket_id.clone();
        move |_: SocketRef| async move {
            info!("Client disconnected: {sid}");
        }
    });

    // Fresh clients get the full read model up front.
    {
        let state = shared.read().await;
        let _ = socket.emit("session-init", &session_snapshot(&state));
    }

    // ── session (signed-in user) ──────────────────────────────────────────────
    {
        let socket = socket.clone();
        let shared = shared.clone();
        socket.on("session", move |s: SocketRef, Data::<Value>(data)| {
            let shared = shared.clone();
            async move {
                match serde_json::from_value::<UserInfo>(data.clone()) {
                    Ok(user) => {
                        let mut state = shared.write().await;
                        info!("Session user set: {}", user.name);
                        state.user = Some(user);
                        state.apply_live_route_preferences();

                        let snapshot = session_snapshot(&state);
                        let _ = s.broadcast().emit("session-updated", &snapshot);
                        let _ = s.emit("session-updated", &snapshot);
                    }
                    Err(e) => warn!("Failed to parse session payload: {e} | Raw Data: {data}"),
                }
            }
        });
    }

    // ── update-server ─────────────────────────────────────────────────────────
    {
        let socket = socket.clone();
        let shared = shared.clone();
        socket.on("update-server", move |s: SocketRef, Data::<Value>(data)| {
            let shared = shared.clone();
            async move {
                match serde_json::from_value::<ServerInfo>(data.clone()) {
                    Ok(server) => {
                        let mut state = shared.write().await;
                        state.server = server;
                        state.apply_live_route_preferences();
                        let _ = save_server(&state.server).await;

                        let _ = s.broadcast().emit("server-updated", &state.server);
                        let _ = s.emit("server-updated", &state.server);
                    }
                    Err(e) => warn!("Failed to parse server payload: {e} | Raw Data: {data}"),
                }
            }
        });
    }

    // ── positions ─────────────────────────────────────────────────────────────
    // Push path used by browser-side components re-injecting a fetched
    // position (notification drawer) and by gateways without UDP access.
    {
        let socket = socket.clone();
        let shared = shared.clone();
        socket.on("positions", move |s: SocketRef, Data::<Value>(data)| {
            let shared = shared.clone();
            async move {
                let Some(batch) = batch_from_value::<Position>(data.clone()) else {
                    warn!("Failed to parse positions payload | Raw Data: {data}");
                    return;
                };
                if batch.is_empty() {
                    return;
                }

                let merged = {
                    let mut state = shared.write().await;
                    state.push_log(now_ms(), LogChannel::Positions, data);
                    ingest_and_collect(&mut state, batch)
                };

                let _ = s.broadcast().emit("positions", &merged);
                let _ = s.emit("positions", &merged);
            }
        });
    }

    // ── events ────────────────────────────────────────────────────────────────
    {
        let socket = socket.clone();
        let shared = shared.clone();
        socket.on("events", move |s: SocketRef, Data::<Value>(data)| {
            let shared = shared.clone();
            async move {
                let Some(batch) = batch_from_value::<Event>(data.clone()) else {
                    warn!("Failed to parse events payload | Raw Data: {data}");
                    return;
                };
                if batch.is_empty() {
                    return;
                }

                {
                    let mut state = shared.write().await;
                    state.push_log(now_ms(), LogChannel::Events, data);
                    state.push_events(batch.clone());
                }

                let _ = s.broadcast().emit("events", &batch);
                let _ = s.emit("events", &batch);
            }
        });
    }

    // ── enable-logs ───────────────────────────────────────────────────────────
    {
        let socket = socket.clone();
        let shared = shared.clone();
        socket.on("enable-logs", move |s: SocketRef, Data::<Value>(data)| {
            let shared = shared.clone();
            async move {
                let enabled = data.as_bool().unwrap_or(false);
                {
                    let mut state = shared.write().await;
                    state.enable_logs(enabled);
                }
                info!("Log capture {}", if enabled { "enabled" } else { "disabled" });
                let _ = s.emit("logs-state", &serde_json::json!({ "enabled": enabled }));
            }
        });
    }

    info!("All handlers registered for socket {socket_id}");
}
