use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub url: String,
    /// Admin JWT sent as a Bearer token
    pub token: Option<String>,
    pub added_at: DateTime<Utc>,
    pub last_ping: Option<DateTime<Utc>>,
    pub status: ServerStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Up,
    Down,
    Unknown,
}

impl ServerInfo {
    pub fn new(url: String, token: Option<String>) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            token,
            added_at: Utc::now(),
            last_ping: None,
            status: ServerStatus::Unknown,
        }
    }

    pub fn update_ping(&mut self, status: ServerStatus) {
        self.last_ping = Some(Utc::now());
        self.status = status;
    }
}

pub fn get_config_dir() -> anyhow::Result<PathBuf> {
    let config_dir = if let Ok(custom_dir) = std::env::var("PORTAL_CLI_CONFIG_DIR") {
        PathBuf::from(custom_dir)
    } else {
        let home = std::env::var("HOME")
            .map_err(|_| anyhow::anyhow!("HOME environment variable not set"))?;
        PathBuf::from(home).join(".config").join("portal").join("cli")
    };

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

pub fn load_server_config() -> anyhow::Result<Option<ServerInfo>> {
    let server_file = get_config_dir()?.join("server.json");

    if !server_file.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(server_file)?;
    Ok(Some(serde_json::from_str(&content)?))
}

pub fn save_server_config(server: &ServerInfo) -> anyhow::Result<()> {
    let server_file = get_config_dir()?.join("server.json");

    let content = serde_json::to_string_pretty(server)?;
    fs::write(server_file, content)?;
    Ok(())
}

/// The configured server, or an error telling the user how to set one
pub fn require_server() -> anyhow::Result<ServerInfo> {
    load_server_config()?.ok_or_else(|| {
        anyhow::anyhow!("No server configured; run `portal server set <url> --token <jwt>`")
    })
}

pub async fn ping_server(server_info: &ServerInfo) -> ServerStatus {
    let client = reqwest::Client::new();
    let url = format!("{}/health", server_info.url);

    match client.get(&url).timeout(std::time::Duration::from_secs(5)).send().await {
        Ok(response) if response.status().is_success() => ServerStatus::Up,
        _ => ServerStatus::Down,
    }
}
