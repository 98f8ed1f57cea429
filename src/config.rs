use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::storage::ensure_parent_dir;

pub const DEFAULT_CONFIG_PATH: &str = "config/client.json";
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_SESSION_DB: &str = "data/session.db";

/// Environment variable overriding the backend root from the config file.
pub const BASE_URL_ENV: &str = "CHAT_API_BASE_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_session_db")]
    pub session_db: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_session_db() -> String {
    DEFAULT_SESSION_DB.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_base_url(),
            session_db: default_session_db(),
        }
    }
}

impl AppConfig {
    /// Backend root, by precedence: `--base-url` flag, environment, config file.
    pub fn resolve_base_url(&self, flag: Option<&str>, env: Option<&str>) -> String {
        let given = |url: &&str| !url.trim().is_empty();
        flag.filter(given)
            .or(env.filter(given))
            .unwrap_or(self.api_base_url.as_str())
            .trim_end_matches('/')
            .to_string()
    }
}

pub fn load_config(path: &str) -> AppConfig {
    let path = Path::new(path);
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Failed to parse config file {}: {err}", path.display());
                AppConfig::default()
            }
        },
        Err(err) => {
            log::info!(
                "Config file {} not found ({err}); using defaults",
                path.display()
            );
            AppConfig::default()
        }
    }
}

pub fn save_config(path: &str, config: &AppConfig) -> std::io::Result<()> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json)
}

pub fn persist_base_url(path: &str, base_url: &str) -> std::io::Result<AppConfig> {
    let mut config = load_config(path);
    config.api_base_url = base_url.trim_end_matches('/').to_string();
    save_config(path, &config)?;
    log::info!("Persisted API base URL {} to {}", config.api_base_url, path);
    Ok(config)
}
