//! Configuration for the desktop agent
//!
//! Loaded from a JSON file (missing file falls back to defaults), then
//! overridden by `DESK_AGENT_*` environment variables.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable prefix for overrides.
const ENV_PREFIX: &str = "DESK_AGENT_";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Base URL of the portfolio backend
    pub api_base_url: String,
    /// Device class this agent polls commands for
    pub target_device: String,
    /// Stable identifier of this device instance
    pub device_id: String,
    /// Seconds between poll cycles
    pub poll_interval_secs: u64,
    /// Execute sell commands without asking the operator
    pub auto_confirm_sales: bool,
    /// Verify the backend TLS certificate (dev backends are self-signed)
    pub verify_ssl: bool,
    /// Where the persisted agent state lives
    pub state_path: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000".to_string(),
            target_device: "desktop".to_string(),
            device_id: "desktop-cli".to_string(),
            poll_interval_secs: 5,
            auto_confirm_sales: false,
            verify_ssl: false,
            state_path: "device_state.json".to_string(),
        }
    }
}

impl AgentConfig {
    /// Load config from a JSON file and apply environment overrides.
    ///
    /// A missing file yields the defaults; a malformed file is a
    /// configuration error.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
            serde_json::from_str(&content)
                .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))?
        } else {
            Self::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Base URL trimmed of trailing slashes. Empty is a configuration error.
    pub fn normalized_base_url(&self) -> Result<String> {
        let base = self.api_base_url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(Error::Config("API base URL is empty".to_string()));
        }
        Ok(base.to_string())
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = env_var("API_BASE_URL") {
            self.api_base_url = value;
        }
        if let Some(value) = env_var("TARGET_DEVICE") {
            self.target_device = value;
        }
        if let Some(value) = env_var("DEVICE_ID") {
            self.device_id = value;
        }
        if let Some(value) = env_var("STATE_PATH") {
            self.state_path = value;
        }
        if let Some(value) = env_var("POLL_INTERVAL") {
            self.poll_interval_secs = value.parse().map_err(|_| {
                Error::Config(format!("{}POLL_INTERVAL is not an integer: {}", ENV_PREFIX, value))
            })?;
        }
        if let Some(value) = env_var("AUTO_CONFIRM") {
            if let Some(flag) = parse_bool(&value) {
                self.auto_confirm_sales = flag;
            }
        }
        if let Some(value) = env_var("VERIFY_SSL") {
            if let Some(flag) = parse_bool(&value) {
                self.verify_ssl = flag;
            }
        }
        Ok(())
    }
}

fn env_var(suffix: &str) -> Option<String> {
    std::env::var(format!("{}{}", ENV_PREFIX, suffix))
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Lenient boolean parsing for env overrides; unrecognized values are
/// ignored rather than treated as errors.
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Some(true),
        "0" | "false" | "no" | "n" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sane() {
        let config = AgentConfig::default();
        assert_eq!(config.target_device, "desktop");
        assert_eq!(config.poll_interval_secs, 5);
        assert!(!config.auto_confirm_sales);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = AgentConfig::load(Path::new("/nonexistent/desk-agent.json")).unwrap();
        assert_eq!(config.device_id, "desktop-cli");
    }

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"api_base_url": "https://api.example.com/", "poll_interval_secs": 30}}"#)
            .unwrap();
        let config = AgentConfig::load(file.path()).unwrap();
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.target_device, "desktop");
        assert_eq!(config.normalized_base_url().unwrap(), "https://api.example.com");
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();
        assert!(matches!(AgentConfig::load(file.path()), Err(Error::Config(_))));
    }

    #[test]
    fn empty_base_url_is_rejected() {
        let config = AgentConfig {
            api_base_url: "   ".to_string(),
            ..AgentConfig::default()
        };
        assert!(config.normalized_base_url().is_err());
    }

    #[test]
    fn bool_parsing_is_lenient() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
