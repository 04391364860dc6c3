//! Persistent configuration for wdpilot.
//!
//! Stores user settings in `~/.wdpilot/config.json`. Every field is optional;
//! command-line flags take precedence over anything recorded here.
//!
//! # Example
//!
//! ```no_run
//! use wdpilot_core::config::WdpilotConfig;
//!
//! // Load (returns defaults if file doesn't exist)
//! let config = WdpilotConfig::load();
//! println!("server: {}", config.server_url());
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIG_FILENAME: &str = "config.json";

/// Default remote automation server.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:4723";

/// Default element lookup timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECS: f64 = 10.0;

/// Errors that can occur while saving configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Returns the wdpilot state directory (`~/.wdpilot`), creating it if needed.
///
/// Falls back to the system temp directory when no home directory is known.
pub fn wdpilot_dir() -> PathBuf {
    let dir = dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".wdpilot");
    std::fs::create_dir_all(&dir).ok();
    dir
}

/// Default session cache directory: `<temp>/wdpilot-sessions`.
pub fn default_session_dir() -> PathBuf {
    std::env::temp_dir().join("wdpilot-sessions")
}

/// Persistent wdpilot configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct WdpilotConfig {
    /// Remote automation server URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,

    /// Directory holding cached session records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_dir: Option<PathBuf>,

    /// Element lookup timeout for actions that do not set their own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_timeout_secs: Option<f64>,

    /// Pass `--relaxed-security` when auto-starting the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relaxed_security: Option<bool>,
}

impl WdpilotConfig {
    /// Load config from `~/.wdpilot/config.json`.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        Self::load_from(&wdpilot_dir().join(CONFIG_FILENAME))
    }

    /// Load config from an explicit path, failing open like [`load`](Self::load).
    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save config to `~/.wdpilot/config.json`.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&wdpilot_dir().join(CONFIG_FILENAME))
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn server_url(&self) -> &str {
        self.server_url.as_deref().unwrap_or(DEFAULT_SERVER_URL)
    }

    pub fn session_dir(&self) -> PathBuf {
        self.session_dir.clone().unwrap_or_else(default_session_dir)
    }

    pub fn default_timeout_secs(&self) -> f64 {
        self.default_timeout_secs
            .filter(|t| *t > 0.0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
    }

    pub fn relaxed_security(&self) -> bool {
        self.relaxed_security.unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let config = WdpilotConfig::default();
        assert_eq!(config.server_url(), DEFAULT_SERVER_URL);
        assert_eq!(config.session_dir(), default_session_dir());
        assert_eq!(config.default_timeout_secs(), 10.0);
        assert!(config.relaxed_security());
    }

    #[test]
    fn non_positive_timeout_falls_back() {
        let config = WdpilotConfig {
            default_timeout_secs: Some(0.0),
            ..Default::default()
        };
        assert_eq!(config.default_timeout_secs(), DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn deserialize_empty_json() {
        let loaded: WdpilotConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(loaded, WdpilotConfig::default());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        let config = WdpilotConfig {
            server_url: Some("http://10.0.0.5:4723".into()),
            session_dir: Some(dir.path().join("sessions")),
            default_timeout_secs: Some(15.0),
            relaxed_security: Some(false),
        };
        config.save_to(&path).unwrap();
        assert_eq!(WdpilotConfig::load_from(&path), config);
    }

    #[test]
    fn corrupt_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(WdpilotConfig::load_from(&path), WdpilotConfig::default());
    }
}
