//! feed.rs — UDP feed toward the backend collector
//!
//! Serializes position batches as JSON arrays and sends them to the
//! collector (default 127.0.0.1:5055). Send errors are logged but never
//! crash the simulator.

use std::net::UdpSocket;
use tracing::{debug, warn};

use track_types::Position;

pub struct UdpFeed {
    socket: UdpSocket,
    target: String,
}

impl UdpFeed {
    pub fn new(target: &str) -> Result<Self, std::io::Error> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        Ok(Self {
            socket,
            target: target.to_string(),
        })
    }

    pub fn send_batch(&self, batch: &[Position]) {
        let bytes = match serde_json::to_vec(batch) {
            Ok(b) => b,
            Err(e) => {
                warn!("Feed: serialize failed: {e}");
                return;
            }
        };

        if let Err(e) = self.socket.send_to(&bytes, &self.target) {
            warn!("Feed: UDP send failed: {e}");
        } else {
            debug!("Feed → {} ({} records, {} bytes)", self.target, batch.len(), bytes.len());
        }
    }
}
