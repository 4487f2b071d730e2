/// Client configuration.
/// Reads client.json from ~/.config/taskboard/client.json (or platform
/// equivalent), then applies TASKBOARD_* environment overrides.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the persistence service, e.g. `https://xyz.example.co`.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    /// Session token of the signed-in user.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Owner stamped on boards this client creates.
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Append log lines here instead of stderr.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_log_filter() -> String {
    "warn".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            access_token: None,
            user_id: None,
            request_timeout_secs: default_request_timeout_secs(),
            log_filter: default_log_filter(),
            log_file: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("No service URL configured (set `url` in {0} or TASKBOARD_URL)")]
    MissingUrl(PathBuf),
}

/// Default config path: ~/.config/taskboard/client.json
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskboard")
        .join("client.json")
}

/// Load config from path. A missing file yields the defaults; an unreadable
/// or malformed one is an error.
pub fn load_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ClientConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

impl ClientConfig {
    /// Overlay values from `lookup` (normally `std::env::var`).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("TASKBOARD_URL") {
            self.url = url;
        }
        if let Some(api_key) = lookup("TASKBOARD_API_KEY") {
            self.api_key = api_key;
        }
        if let Some(token) = lookup("TASKBOARD_TOKEN") {
            self.access_token = Some(token);
        }
        if let Some(user_id) = lookup("TASKBOARD_USER_ID") {
            self.user_id = Some(user_id);
        }
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok().filter(|v| !v.is_empty()));
    }

    /// Fail early when there is nowhere to send requests.
    pub fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::MissingUrl(path.to_path_buf()));
        }
        Ok(())
    }
}
