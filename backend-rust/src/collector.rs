//! # collector
//!
//! UDP position collector — receives position records from tracker gateways
//! (and the `track-sim` fleet simulator) and feeds parsed batches into the
//! session state.
//!
//! ## Architecture
//! Runs as a separate Tokio task (tokio::spawn) alongside the Socket.IO
//! handler. It:
//!   1. Binds a UDP socket on port 5055 (configurable via FLEET_UDP_PORT env)
//!   2. Receives JSON datagrams — a single position object or an array
//!   3. Forwards parsed batches over an mpsc channel to the ingest pump
//!
//! ## Invariants
//! - malformed datagrams are dropped with a debug log, never an error
//! - UDP errors never crash the server

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use track_types::Position;

// ── Configuration ─────────────────────────────────────────────────────────────

pub struct CollectorConfig {
    /// UDP port to listen on (default 5055)
    pub udp_port: u16,
    /// Receive buffer size in bytes (default 16 KiB — batches stay small)
    pub buffer_size: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            udp_port: std::env::var("FLEET_UDP_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5055),
            buffer_size: 16 * 1024,
        }
    }
}

// ── Datagram parsing ──────────────────────────────────────────────────────────

/// Parse one datagram into a position batch. Accepts either a JSON array of
/// positions or a single position object; anything else is `None`.
pub fn parse_batch(data: &[u8]) -> Option<Vec<Position>> {
    if let Ok(batch) = serde_json::from_slice::<Vec<Position>>(data) {
        return Some(batch);
    }
    serde_json::from_slice::<Position>(data)
        .ok()
        .map(|position| vec![position])
}

// ── Main UDP listener task ────────────────────────────────────────────────────

/// Start the collector UDP listener as a background Tokio task. Parsed
/// batches are handed to the ingest pump through `batch_tx`.
pub async fn start_collector(config: CollectorConfig, batch_tx: mpsc::Sender<Vec<Position>>) {
    let addr = format!("0.0.0.0:{}", config.udp_port);
    let socket = match UdpSocket::bind(&addr).await {
        Ok(s) => {
            info!("📡 Position collector listening on UDP {addr}");
            s
        }
        Err(e) => {
            // No tracker traffic expected (port taken, restricted env) —
            // socket pushes still work, so keep the server up.
            warn!("Collector: could not bind UDP {addr}: {e} (UDP ingest disabled)");
            return;
        }
    };

    let mut buf = vec![0u8; config.buffer_size];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, src)) => {
                process_datagram(&buf[..len], src, &batch_tx).await;
            }
            Err(e) => {
                // Never crash — log and continue
                warn!("Collector: UDP recv error: {e}");
            }
        }
    }
}

async fn process_datagram(data: &[u8], src: SocketAddr, batch_tx: &mpsc::Sender<Vec<Position>>) {
    let Some(batch) = parse_batch(data) else {
        debug!("Collector: malformed datagram from {src} ({} bytes)", data.len());
        return;
    };
    if batch.is_empty() {
        return;
    }

    debug!("Collector: {} record(s) from {src}", batch.len());
    if batch_tx.send(batch).await.is_err() {
        warn!("Collector: ingest pump gone, dropping batch");
    }
}
