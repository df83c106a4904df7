use serde::{Deserialize, Serialize};
use serde_json::Value;

use track_types::{Event, ServerInfo, UserInfo};

use crate::store::{resolve_live_route_mode, PositionStore};

// Oldest entries are dropped past this many logs/events.
pub const RING_LIMIT: usize = 100;

// ─── Debug Log Buffer ─────────────────────────────────────────────────────────

/// Which inbound channel a logged payload arrived on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum LogChannel {
    Positions,
    Events,
}

/// One raw inbound payload, captured only while log capture is enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub timestamp: i64,
    pub channel: LogChannel,
    pub payload: Value,
}

// ─── Session State ────────────────────────────────────────────────────────────

/// Everything one backend session holds in memory: resolved configuration,
/// the position store, recent events, and the optional debug log buffer.
/// Created empty at startup, never persisted (server preferences aside).
#[derive(Debug)]
pub struct SessionState {
    pub server: ServerInfo,
    pub user: Option<UserInfo>,
    pub include_logs: bool,
    pub logs: Vec<LogRecord>,
    pub events: Vec<Event>,
    pub store: PositionStore,
}

impl SessionState {
    pub fn new(server: ServerInfo) -> Self {
        let mode = resolve_live_route_mode(None, &server.attributes);
        Self {
            server,
            user: None,
            include_logs: false,
            logs: Vec::new(),
            events: Vec::new(),
            store: PositionStore::new(mode),
        }
    }

    /// Re-resolve the live-route mode after a user or server change and push
    /// it into the store (the store wipes trails on the disable edge).
    pub fn apply_live_route_preferences(&mut self) {
        let mode = resolve_live_route_mode(
            self.user.as_ref().map(|u| &u.attributes),
            &self.server.attributes,
        );
        self.store.set_mode(mode);
    }

    /// Capture a raw inbound payload while log capture is on.
    pub fn push_log(&mut self, timestamp: i64, channel: LogChannel, payload: Value) {
        if !self.include_logs {
            return;
        }
        self.logs.push(LogRecord {
            timestamp,
            channel,
            payload,
        });
        if self.logs.len() > RING_LIMIT {
            self.logs.remove(0);
        }
    }

    /// Toggle log capture. Turning it off discards the buffer.
    pub fn enable_logs(&mut self, enabled: bool) {
        self.include_logs = enabled;
        if !enabled {
            self.logs.clear();
        }
    }

    /// Append freshly received events, keeping the recent window bounded.
    pub fn push_events(&mut self, batch: Vec<Event>) {
        self.events.extend(batch);
        while self.events.len() > RING_LIMIT {
            self.events.remove(0);
        }
    }
}
