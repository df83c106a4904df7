//! # store
//!
//! Position Store — the single in-memory read model behind the map, the
//! device list, and the status cards. Ingests batches of position records
//! (UDP collector, Socket.IO pushes, notification-drawer re-injections) and
//! maintains two views per device:
//!   1. the latest known position
//!   2. a bounded trail of recent coordinates for live-route overlays
//!
//! ## Merge rule
//! A record whose `attributes` carry a `result` key is a command
//! acknowledgment, not a full telemetry report — it usually omits sensor
//! state. Such a record is merged over the previously stored attributes so
//! ignition/fuel/immobiliser badges survive a command round-trip. Records
//! without `result` replace wholesale.
//!
//! ## Invariants
//! - at most one stored position per device
//! - every trail holds at most `limit` points, oldest dropped first
//! - all trails are empty whenever live routes are disabled
//! - all mutation flows through `ingest` / `set_mode`; readers only borrow

use std::collections::{HashMap, VecDeque};

use serde_json::Value;
use tracing::info;

use track_types::{Attributes, Position, TrackPoint};

// ── Live-Route Mode ───────────────────────────────────────────────────────────

/// Whether per-device trails are retained, and how many points each keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveRouteMode {
    /// No trails. Entering this mode discards every accumulated trail.
    Disabled,
    /// Trails accumulate with FIFO eviction past `limit` points.
    Tracking { limit: usize },
}

/// Resolve the live-route preference from user attributes falling back to
/// server attributes falling back to defaults (`"none"`, 10).
///
/// Pure — same inputs always yield the same mode. `mapLiveRoutes` selects
/// the mode (`"none"` disables), `web.liveRouteLength` bounds the trail.
/// A configured length below 1 is clamped to 1 so the bound stays meaningful.
pub fn resolve_live_route_mode(user: Option<&Attributes>, server: &Attributes) -> LiveRouteMode {
    let mode = user
        .and_then(|attrs| attrs.get("mapLiveRoutes"))
        .and_then(Value::as_str)
        .or_else(|| server.get("mapLiveRoutes").and_then(Value::as_str))
        .unwrap_or("none");

    if mode == "none" {
        return LiveRouteMode::Disabled;
    }

    let limit = user
        .and_then(|attrs| attrs.get("web.liveRouteLength"))
        .and_then(Value::as_u64)
        .or_else(|| server.get("web.liveRouteLength").and_then(Value::as_u64))
        .unwrap_or(10) as usize;

    LiveRouteMode::Tracking { limit: limit.max(1) }
}

// ── Position Store ────────────────────────────────────────────────────────────

/// Session-lifetime mapping of device id → latest position and recent trail.
///
/// Single-writer: the socket/collector tasks mutate it behind the session
/// write lock, UI readers only see borrowed snapshots. Entries are never
/// pruned per device; only the mode transition into `Disabled` clears trails.
#[derive(Debug)]
pub struct PositionStore {
    mode: LiveRouteMode,
    positions: HashMap<String, Position>,
    history: HashMap<String, VecDeque<TrackPoint>>,
}

impl Default for PositionStore {
    fn default() -> Self {
        Self::new(LiveRouteMode::Disabled)
    }
}

impl PositionStore {
    pub fn new(mode: LiveRouteMode) -> Self {
        Self {
            mode,
            positions: HashMap::new(),
            history: HashMap::new(),
        }
    }

    pub fn mode(&self) -> LiveRouteMode {
        self.mode
    }

    /// Apply a newly resolved live-route mode.
    ///
    /// Entering `Disabled` wipes every trail once, on this edge — trails
    /// cannot accumulate while disabled, so the maps stay empty until the
    /// feature is re-enabled. Shrinking the limit trims existing trails from
    /// the front immediately.
    pub fn set_mode(&mut self, mode: LiveRouteMode) {
        if self.mode == mode {
            return;
        }
        match mode {
            LiveRouteMode::Disabled => {
                if !self.history.is_empty() {
                    info!("Live routes disabled — discarding {} trails", self.history.len());
                }
                self.history.clear();
            }
            LiveRouteMode::Tracking { limit } => {
                for route in self.history.values_mut() {
                    while route.len() > limit {
                        route.pop_front();
                    }
                }
            }
        }
        self.mode = mode;
    }

    /// Ingest a batch of position records, in arrival order.
    ///
    /// Per record: merge command-result attributes over the prior record if
    /// one exists, replace the stored latest position, then extend the trail
    /// unless the coordinate repeats the trail tail. Malformed or partial
    /// records are never rejected — missing fields read as unknown downstream.
    pub fn ingest(&mut self, batch: Vec<Position>) {
        for mut position in batch {
            if position.is_command_result() {
                if let Some(existing) = self.positions.get(&position.device_id) {
                    let mut merged = existing.attributes.clone();
                    merged.extend(position.attributes);
                    position.attributes = merged;
                }
            }

            if let LiveRouteMode::Tracking { limit } = self.mode {
                let route = self.history.entry(position.device_id.clone()).or_default();
                let appendable = match route.back() {
                    None => true,
                    // Kept as-is from observed behavior: a point only counts
                    // as new when it differs from the tail on BOTH axes.
                    Some(last) => last[0] != position.longitude && last[1] != position.latitude,
                };
                if appendable {
                    while !route.is_empty() && route.len() + 1 > limit {
                        route.pop_front();
                    }
                    route.push_back([position.longitude, position.latitude]);
                }
            }

            self.positions.insert(position.device_id.clone(), position);
        }
    }

    // ── Read API ──────────────────────────────────────────────────────────────

    /// Latest known position for one device, or `None` if never seen.
    pub fn latest(&self, device_id: &str) -> Option<&Position> {
        self.positions.get(device_id)
    }

    /// Latest position matching a specific observation id, if still current.
    pub fn by_position_id(&self, id: i64) -> Option<&Position> {
        self.positions.values().find(|p| p.id == Some(id))
    }

    pub fn positions(&self) -> &HashMap<String, Position> {
        &self.positions
    }

    /// Recent trail for one device, oldest point first. Empty slice-view when
    /// the device has no trail (never seen, or live routes disabled).
    pub fn route(&self, device_id: &str) -> Option<&VecDeque<TrackPoint>> {
        self.history.get(device_id)
    }

    pub fn history(&self) -> &HashMap<String, VecDeque<TrackPoint>> {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(pairs: &[(&str, Value)]) -> Attributes {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn report(device_id: &str, lon: f64, lat: f64, attributes: Attributes) -> Position {
        Position {
            device_id: device_id.to_string(),
            longitude: lon,
            latitude: lat,
            attributes,
            ..Position::default()
        }
    }

    fn tracking(limit: usize) -> PositionStore {
        PositionStore::new(LiveRouteMode::Tracking { limit })
    }

    #[test]
    fn command_result_merges_over_prior_sensor_attributes() {
        let mut store = PositionStore::default();
        store.ingest(vec![report(
            "7",
            1.0,
            1.0,
            attrs(&[("ignition", json!(true)), ("power", json!("12.1"))]),
        )]);
        store.ingest(vec![report("7", 1.0, 1.0, attrs(&[("result", json!("ok"))]))]);

        let merged = &store.latest("7").unwrap().attributes;
        assert_eq!(merged["ignition"], json!(true));
        assert_eq!(merged["power"], json!("12.1"));
        assert_eq!(merged["result"], json!("ok"));
    }

    #[test]
    fn incoming_values_win_on_key_collision() {
        let mut store = PositionStore::default();
        store.ingest(vec![report("7", 1.0, 1.0, attrs(&[("power", json!("12.1"))]))]);
        store.ingest(vec![report(
            "7",
            1.0,
            1.0,
            attrs(&[("result", json!("ok")), ("power", json!("11.8"))]),
        )]);

        assert_eq!(store.latest("7").unwrap().attributes["power"], json!("11.8"));
    }

    #[test]
    fn full_report_replaces_attributes_wholesale() {
        let mut store = PositionStore::default();
        store.ingest(vec![report("7", 1.0, 1.0, attrs(&[("ignition", json!(true))]))]);
        store.ingest(vec![report("7", 1.0, 2.0, attrs(&[("power", json!("12.1"))]))]);

        let replaced = &store.latest("7").unwrap().attributes;
        assert_eq!(replaced.len(), 1);
        assert_eq!(replaced["power"], json!("12.1"));
    }

    #[test]
    fn command_result_without_prior_record_stored_as_is() {
        let mut store = PositionStore::default();
        store.ingest(vec![report("7", 0.0, 0.0, attrs(&[("result", json!("ok"))]))]);

        let stored = &store.latest("7").unwrap().attributes;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored["result"], json!("ok"));
    }

    #[test]
    fn non_result_fields_of_a_command_result_are_kept_unmerged() {
        let mut store = PositionStore::default();
        let mut full = report("7", 10.0, 20.0, attrs(&[("ignition", json!(true))]));
        full.speed = Some(9.5);
        store.ingest(vec![full]);

        let ack = report("7", 10.5, 20.5, attrs(&[("result", json!("ok"))]));
        store.ingest(vec![ack]);

        let latest = store.latest("7").unwrap();
        assert_eq!(latest.longitude, 10.5);
        assert_eq!(latest.speed, None);
        assert_eq!(latest.attributes["ignition"], json!(true));
    }

    #[test]
    fn trail_keeps_only_the_last_points_within_limit() {
        let mut store = tracking(3);
        for i in 1..=5 {
            let coord = f64::from(i);
            store.ingest(vec![report("7", coord, coord, Attributes::new())]);
        }

        let route = store.route("7").unwrap();
        assert_eq!(route.len(), 3);
        let collected: Vec<TrackPoint> = route.iter().copied().collect();
        assert_eq!(collected, vec![[3.0, 3.0], [4.0, 4.0], [5.0, 5.0]]);
    }

    #[test]
    fn identical_coordinates_do_not_extend_trail() {
        let mut store = tracking(5);
        store.ingest(vec![report("7", 1.0, 1.0, Attributes::new())]);
        store.ingest(vec![report("7", 1.0, 1.0, Attributes::new())]);

        assert_eq!(store.route("7").unwrap().len(), 1);
    }

    #[test]
    fn single_axis_change_does_not_extend_trail() {
        // Observed behavior of the trail predicate: a point appends only when
        // both longitude and latitude differ from the tail.
        let mut store = tracking(5);
        store.ingest(vec![report("7", 1.0, 1.0, Attributes::new())]);
        store.ingest(vec![report("7", 2.0, 1.0, Attributes::new())]);
        assert_eq!(store.route("7").unwrap().len(), 1);

        store.ingest(vec![report("7", 2.0, 2.0, Attributes::new())]);
        assert_eq!(store.route("7").unwrap().len(), 2);
    }

    #[test]
    fn disabling_live_routes_wipes_every_trail_once() {
        let mut store = tracking(5);
        store.ingest(vec![
            report("A", 1.0, 1.0, Attributes::new()),
            report("B", 2.0, 2.0, Attributes::new()),
        ]);
        assert_eq!(store.history().len(), 2);

        store.set_mode(LiveRouteMode::Disabled);
        assert!(store.history().is_empty());

        // While disabled, ingesting keeps trails empty but latest positions move.
        store.ingest(vec![report("A", 3.0, 3.0, Attributes::new())]);
        assert!(store.history().is_empty());
        assert_eq!(store.latest("A").unwrap().longitude, 3.0);
    }

    #[test]
    fn reenabling_live_routes_resumes_from_empty() {
        let mut store = tracking(5);
        store.ingest(vec![report("A", 1.0, 1.0, Attributes::new())]);
        store.set_mode(LiveRouteMode::Disabled);
        store.set_mode(LiveRouteMode::Tracking { limit: 5 });

        store.ingest(vec![report("A", 4.0, 4.0, Attributes::new())]);
        let collected: Vec<TrackPoint> = store.route("A").unwrap().iter().copied().collect();
        assert_eq!(collected, vec![[4.0, 4.0]]);
    }

    #[test]
    fn shrinking_the_limit_trims_existing_trails() {
        let mut store = tracking(5);
        for i in 1..=5 {
            let coord = f64::from(i);
            store.ingest(vec![report("7", coord, coord, Attributes::new())]);
        }

        store.set_mode(LiveRouteMode::Tracking { limit: 2 });
        let collected: Vec<TrackPoint> = store.route("7").unwrap().iter().copied().collect();
        assert_eq!(collected, vec![[4.0, 4.0], [5.0, 5.0]]);
    }

    #[test]
    fn batch_records_apply_in_arrival_order() {
        let mut store = tracking(5);
        store.ingest(vec![
            report("7", 1.0, 1.0, Attributes::new()),
            report("7", 2.0, 2.0, Attributes::new()),
        ]);

        assert_eq!(store.latest("7").unwrap().longitude, 2.0);
        let collected: Vec<TrackPoint> = store.route("7").unwrap().iter().copied().collect();
        assert_eq!(collected, vec![[1.0, 1.0], [2.0, 2.0]]);
    }

    #[test]
    fn devices_keep_independent_trails() {
        let mut store = tracking(2);
        store.ingest(vec![
            report("A", 1.0, 1.0, Attributes::new()),
            report("B", 9.0, 9.0, Attributes::new()),
            report("A", 2.0, 2.0, Attributes::new()),
        ]);

        assert_eq!(store.route("A").unwrap().len(), 2);
        assert_eq!(store.route("B").unwrap().len(), 1);
    }

    #[test]
    fn command_result_scenario_merges_and_dedupes() {
        let mut store = tracking(5);
        store.ingest(vec![
            report("7", 1.0, 1.0, attrs(&[("ignition", json!(true))])),
            report("7", 1.0, 1.0, attrs(&[("result", json!("ack"))])),
        ]);

        let latest = store.latest("7").unwrap();
        assert_eq!(latest.attributes["ignition"], json!(true));
        assert_eq!(latest.attributes["result"], json!("ack"));

        let collected: Vec<TrackPoint> = store.route("7").unwrap().iter().copied().collect();
        assert_eq!(collected, vec![[1.0, 1.0]]);
    }

    #[test]
    fn lookup_by_position_id() {
        let mut store = PositionStore::default();
        let mut pos = report("7", 1.0, 1.0, Attributes::new());
        pos.id = Some(42);
        store.ingest(vec![pos]);

        assert_eq!(store.by_position_id(42).unwrap().device_id, "7");
        assert!(store.by_position_id(43).is_none());
    }

    // ── resolve_live_route_mode ───────────────────────────────────────────────

    #[test]
    fn resolve_defaults_to_disabled() {
        assert_eq!(
            resolve_live_route_mode(None, &Attributes::new()),
            LiveRouteMode::Disabled
        );
    }

    #[test]
    fn resolve_reads_server_attributes_when_user_is_silent() {
        let server = attrs(&[
            ("mapLiveRoutes", json!("full")),
            ("web.liveRouteLength", json!(25)),
        ]);
        assert_eq!(
            resolve_live_route_mode(None, &server),
            LiveRouteMode::Tracking { limit: 25 }
        );
    }

    #[test]
    fn user_preferences_win_over_server_preferences() {
        let server = attrs(&[
            ("mapLiveRoutes", json!("none")),
            ("web.liveRouteLength", json!(25)),
        ]);
        let user = attrs(&[
            ("mapLiveRoutes", json!("full")),
            ("web.liveRouteLength", json!(3)),
        ]);
        assert_eq!(
            resolve_live_route_mode(Some(&user), &server),
            LiveRouteMode::Tracking { limit: 3 }
        );

        // And the same inputs resolve identically on a second call.
        assert_eq!(
            resolve_live_route_mode(Some(&user), &server),
            LiveRouteMode::Tracking { limit: 3 }
        );
    }

    #[test]
    fn user_disable_overrides_server_enable() {
        let server = attrs(&[("mapLiveRoutes", json!("full"))]);
        let user = attrs(&[("mapLiveRoutes", json!("none"))]);
        assert_eq!(
            resolve_live_route_mode(Some(&user), &server),
            LiveRouteMode::Disabled
        );
    }

    #[test]
    fn resolve_clamps_degenerate_length_to_one() {
        let server = attrs(&[
            ("mapLiveRoutes", json!("full")),
            ("web.liveRouteLength", json!(0)),
        ]);
        assert_eq!(
            resolve_live_route_mode(None, &server),
            LiveRouteMode::Tracking { limit: 1 }
        );
    }
}
