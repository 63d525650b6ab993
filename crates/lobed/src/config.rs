use crate::error::ConfigError;
use crate::paths::AppPaths;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Daemon configuration.
///
/// Built from defaults, then `config.json` in the data directory (if any),
/// then `LOBED_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Streak and stats service.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_report_url")]
    pub report_url: String,
    /// `host:port` of the shape-recognition channel.
    #[serde(default = "default_recognition_addr")]
    pub recognition_addr: String,
    /// Still-frame camera directory; defaults to `<data dir>/frames`.
    #[serde(default)]
    pub frames_dir: Option<PathBuf>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_listen_addr() -> String {
    "127.0.0.1:9877".to_string()
}

fn default_api_url() -> String {
    "https://megamindapi.andrewbarber.dev".to_string()
}

fn default_auth_url() -> String {
    "http://34.236.152.229".to_string()
}

fn default_report_url() -> String {
    "http://localhost:3001".to_string()
}

fn default_recognition_addr() -> String {
    "127.0.0.1:5001".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            api_url: default_api_url(),
            auth_url: default_auth_url(),
            report_url: default_report_url(),
            recognition_addr: default_recognition_addr(),
            frames_dir: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Config {
    pub fn load(paths: &AppPaths) -> Result<Self, ConfigError> {
        let path = paths.config_file();
        let mut cfg = if path.exists() {
            let display = path.display().to_string();
            let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: display.clone(),
                source,
            })?;
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: display,
                source,
            })?
        } else {
            Self::default()
        };
        cfg.apply_overrides(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get("LOBED_LISTEN") {
            self.listen_addr = v;
        }
        if let Some(v) = get("LOBED_API_URL") {
            self.api_url = v;
        }
        if let Some(v) = get("LOBED_AUTH_URL") {
            self.auth_url = v;
        }
        if let Some(v) = get("LOBED_REPORT_URL") {
            self.report_url = v;
        }
        if let Some(v) = get("LOBED_RECOGNITION_ADDR") {
            self.recognition_addr = v;
        }
        if let Some(v) = get("LOBED_FRAMES_DIR") {
            self.frames_dir = Some(PathBuf::from(v));
        }
        // LOBED_REQUEST_TIMEOUT_MS=10000
        if let Some(n) = get("LOBED_REQUEST_TIMEOUT_MS").and_then(|v| v.parse::<u64>().ok()) {
            self.request_timeout_ms = n.max(100);
        }
    }

    pub fn frames_dir(&self, paths: &AppPaths) -> PathBuf {
        self.frames_dir.clone().unwrap_or_else(|| paths.frames_dir())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
