//! Configuration loading

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sessionsync_discovery::SessionConfig;
use std::path::Path;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub discovery: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Bind address for web server
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:3001".to_string()
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

/// Save default configuration to file
pub fn save_default_config(path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(&Config::default())?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.daemon.bind, "0.0.0.0:3001");
        assert_eq!(config.discovery.rescan_interval_secs, 30);
    }

    #[test]
    fn test_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sessionsync.toml");
        std::fs::write(
            &path,
            "[daemon]\nbind = \"127.0.0.1:4000\"\n\n[discovery]\npassive = false\nwing_port = 2223\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.daemon.bind, "127.0.0.1:4000");
        assert!(!config.discovery.passive);
        assert_eq!(config.discovery.wing_port, 2223);
        assert_eq!(config.discovery.x32_port, 10023);
        assert_eq!(config.discovery.priority_hosts, vec![1, 2, 10, 100, 200]);
    }

    #[test]
    fn test_write_then_load_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sessionsync.toml");
        save_default_config(&path).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.daemon.bind, "0.0.0.0:3001");
        assert_eq!(config.discovery.service_type, "_osc._udp.local.");
    }

    #[test]
    fn test_invalid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[discovery]\nx32_port = \"not a port\"\n").unwrap();
        assert!(load_config(&path).is_err());
    }
}
