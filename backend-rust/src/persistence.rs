use anyhow::Result;
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

use track_types::ServerInfo;

const SERVER_FILE: &str = "server.json";

/// Load persisted server preferences from disk. Returns defaults if the file
/// is missing or corrupt — the backend always comes up.
pub async fn load_server(path: &str) -> ServerInfo {
    if !Path::new(path).exists() {
        info!("No {path} found, using default server preferences");
        return ServerInfo::default();
    }

    match fs::read_to_string(path).await {
        Ok(data) => match serde_json::from_str::<ServerInfo>(&data) {
            Ok(server) => {
                info!(
                    "Loaded server preferences from {path} ({} attributes)",
                    server.attributes.len()
                );
                server
            }
            Err(e) => {
                warn!("Failed to parse {path}: {e}, using defaults");
                ServerInfo::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {path}: {e}, using defaults");
            ServerInfo::default()
        }
    }
}

pub async fn load_server_default() -> ServerInfo {
    load_server(SERVER_FILE).await
}

/// Save server preferences to disk.
pub async fn save_server(server: &ServerInfo) -> Result<()> {
    let json = serde_json::to_string_pretty(server)?;
    fs::write(SERVER_FILE, json).await?;
    Ok(())
}
