//! # track-types
//!
//! Shared wire structures for the FleetLive tracking platform.
//!
//! These types are used by:
//! - `backend-rust`: receiving and merging position/event records from trackers
//! - `track-simulator`: producing synthetic tracker traffic over UDP
//! - browser clients: the same camelCase JSON shapes travel over Socket.IO
//!
//! ## Conventions
//!
//! - All wire-facing structs serialize camelCase.
//! - `attributes` is an open string→scalar mapping; keys are device- and
//!   firmware-specific and never enumerated here. The backend forwards them
//!   untouched.
//! - Trail points are `[longitude, latitude]` pairs, matching the order the
//!   map layer feeds to its route sources.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Attribute Maps ────────────────────────────────────────────────────────────

/// Open key/value mapping carried by positions, events, users, and the server.
/// Values are heterogeneous scalars (bool, number, string) as delivered.
pub type Attributes = HashMap<String, Value>;

/// One trail coordinate: `[longitude, latitude]`.
pub type TrackPoint = [f64; 2];

// ── Position Record ───────────────────────────────────────────────────────────

/// One telemetry observation from a tracked device.
///
/// Every field other than `deviceId` may be absent on the wire — command
/// acknowledgments in particular arrive with little more than an `attributes`
/// map holding a `result` key. Consumers treat missing fields as "unknown".
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Unique id of this observation. Absent on synthetic/partial updates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Owning device — the key the backend stores under.
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    /// Sensor/state flags (ignition, power voltage, fuel level, immobiliser,
    /// command `result`, ...). Forwarded verbatim.
    #[serde(default)]
    pub attributes: Attributes,
}

impl Position {
    /// True when this record is a command acknowledgment rather than a full
    /// telemetry report — the signal that most sensor attributes are missing.
    pub fn is_command_result(&self) -> bool {
        self.attributes.contains_key("result")
    }
}

// ── Event Record ──────────────────────────────────────────────────────────────

/// A discrete notification referencing a device and optionally one of its
/// positions. Consumed by the notification drawer; the drawer may fetch the
/// referenced position over REST and push it back through the position path.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub device_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_id: Option<i64>,
    #[serde(default)]
    pub attributes: Attributes,
}

// ── Server / User Configuration ───────────────────────────────────────────────

/// Global server preferences. The backend only interprets `mapLiveRoutes`
/// and `web.liveRouteLength` from `attributes`; everything else is carried
/// for the clients.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub attributes: Attributes,
}

/// The signed-in user. User attribute values win over server values when
/// both carry the same preference key.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub attributes: Attributes,
}
