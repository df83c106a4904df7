//! main.rs — FleetLive tracker fleet simulator entry point
//!
//! Spawns N synthetic devices and pushes their position batches to the
//! backend collector over UDP at a fixed interval. Every `--ack-every`
//! intervals each device also emits a command acknowledgment packet
//! (attributes = { result }) so the backend's attribute merge can be
//! observed end to end in the UI.

mod device_sim;
mod feed;

use std::time::Duration;

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::time::interval;
use tracing::info;

use device_sim::DeviceSim;
use feed::UdpFeed;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "track-sim", about = "FleetLive synthetic tracker fleet")]
struct Args {
    /// Number of simulated devices
    #[arg(long, default_value_t = 6)]
    devices: usize,

    /// Reporting interval in milliseconds
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// Collector address (backend FLEET_UDP_PORT)
    #[arg(long, default_value = "127.0.0.1:5055")]
    target: String,

    /// Emit a command acknowledgment every N intervals (0 = never)
    #[arg(long, default_value_t = 15)]
    ack_every: u64,

    /// Fleet origin latitude
    #[arg(long, default_value_t = -36.8485)]
    lat: f64,

    /// Fleet origin longitude
    #[arg(long, default_value_t = 174.7633)]
    lon: f64,

    /// RNG seed (omit for a random fleet)
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "track_simulator=info".into()),
        )
        .init();

    let args = Args::parse();
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut fleet: Vec<DeviceSim> = (0..args.devices)
        .map(|i| DeviceSim::new(i, args.lat, args.lon, &mut rng))
        .collect();

    let feed = match UdpFeed::new(&args.target) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Cannot open UDP socket: {e}");
            std::process::exit(1);
        }
    };

    info!(
        "🛰️  Simulating {} devices → {} every {}ms",
        args.devices, args.target, args.interval_ms
    );

    let dt_s = args.interval_ms as f64 / 1000.0;
    let mut ticker = interval(Duration::from_millis(args.interval_ms));
    let mut tick: u64 = 0;

    loop {
        ticker.tick().await;
        tick += 1;

        let mut batch = Vec::with_capacity(fleet.len());
        for device in &mut fleet {
            device.step(dt_s, &mut rng);
            batch.push(device.report(&mut rng));
        }
        feed.send_batch(&batch);

        if args.ack_every > 0 && tick % args.ack_every == 0 {
            let acks: Vec<_> = fleet.iter_mut().map(DeviceSim::command_ack).collect();
            info!("Command acknowledgments for {} devices", acks.len());
            feed.send_batch(&acks);
        }
    }
}
