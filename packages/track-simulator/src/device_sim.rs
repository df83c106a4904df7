//! device_sim.rs — synthetic tracker physics
//!
//! Simulates N GPS trackers wandering around a starting point. Each device
//! holds a course and speed, drifts both with Gaussian jitter per step, and
//! reports camelCase position records identical to real tracker traffic:
//! coordinates, speed/course, and a sensor attribute map (ignition, power).
//!
//! Devices can also emit a command acknowledgment packet — an update whose
//! attributes carry only a `result` key — to exercise the backend's
//! merge path the way real command round-trips do.

use chrono::Utc;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde_json::json;

use track_types::{Attributes, Position};

const KNOTS_TO_MPS: f64 = 0.514444;
const METERS_PER_DEG_LAT: f64 = 111_320.0;

pub struct DeviceSim {
    pub device_id: String,
    lat: f64,
    lon: f64,
    speed_kn: f64,
    course_deg: f64,
    ignition: bool,
    next_id: i64,
}

impl DeviceSim {
    pub fn new(index: usize, origin_lat: f64, origin_lon: f64, rng: &mut impl Rng) -> Self {
        // Scatter the fleet a few hundred meters around the origin
        let lat = origin_lat + rng.gen_range(-0.003..0.003);
        let lon = origin_lon + rng.gen_range(-0.003..0.003);
        Self {
            device_id: format!("sim-{:02}", index + 1),
            lat,
            lon,
            speed_kn: rng.gen_range(5.0..25.0),
            course_deg: rng.gen_range(0.0..360.0),
            ignition: true,
            next_id: (index as i64 + 1) * 100_000,
        }
    }

    /// Advance the device by `dt_s` seconds: drift course and speed, then
    /// move along the current heading.
    pub fn step(&mut self, dt_s: f64, rng: &mut impl Rng) {
        let course_jitter = Normal::new(0.0, 4.0).unwrap();
        let speed_jitter = Normal::new(0.0, 0.5).unwrap();

        self.course_deg = (self.course_deg + course_jitter.sample(rng)).rem_euclid(360.0);
        self.speed_kn = (self.speed_kn + speed_jitter.sample(rng)).clamp(0.0, 60.0);

        let meters = self.speed_kn * KNOTS_TO_MPS * dt_s;
        let course_rad = self.course_deg.to_radians();
        self.lat += meters * course_rad.cos() / METERS_PER_DEG_LAT;
        self.lon += meters * course_rad.sin()
            / (METERS_PER_DEG_LAT * self.lat.to_radians().cos().max(0.01));
    }

    /// Full telemetry report with the sensor attribute map.
    pub fn report(&mut self, rng: &mut impl Rng) -> Position {
        let id = self.next_id;
        self.next_id += 1;

        let mut attributes = Attributes::new();
        attributes.insert("ignition".into(), json!(self.ignition));
        attributes.insert(
            "power".into(),
            json!(format!("{:.1}", 12.0 + rng.gen_range(-0.4..0.6))),
        );
        attributes.insert("sat".into(), json!(rng.gen_range(6..14)));

        Position {
            id: Some(id),
            device_id: self.device_id.clone(),
            fix_time: Some(Utc::now()),
            latitude: self.lat,
            longitude: self.lon,
            speed: Some(self.speed_kn),
            course: Some(self.course_deg),
            altitude: Some(0.0),
            accuracy: Some(rng.gen_range(2.0..12.0)),
            attributes,
        }
    }

    /// Command acknowledgment — no sensor attributes, just a `result`.
    /// Mirrors what trackers send after an engine-stop / output command.
    pub fn command_ack(&mut self) -> Position {
        let id = self.next_id;
        self.next_id += 1;

        let mut attributes = Attributes::new();
        attributes.insert("result".into(), json!("Command executed"));

        Position {
            id: Some(id),
            device_id: self.device_id.clone(),
            fix_time: Some(Utc::now()),
            latitude: self.lat,
            longitude: self.lon,
            attributes,
            ..Position::default()
        }
    }
}
