use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for the SecureScout tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecureScoutConfig {
    /// State directory path.
    #[serde(default = "default_state_dir")]
    pub state_dir: String,

    /// Address the API server binds to.
    #[serde(default = "default_server_addr")]
    pub server_addr: String,

    /// Platform fee on released payments, in basis points.
    #[serde(default = "default_platform_fee_bps")]
    pub platform_fee_bps: u16,

    /// Default page size for paginated listings.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_state_dir() -> String {
    "~/.securescout".to_string()
}

fn default_server_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_platform_fee_bps() -> u16 {
    250
}

fn default_page_size() -> usize {
    20
}

impl Default for SecureScoutConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            server_addr: default_server_addr(),
            platform_fee_bps: default_platform_fee_bps(),
            page_size: default_page_size(),
        }
    }
}

impl SecureScoutConfig {
    /// Config file path within the state directory.
    pub fn config_path(state_dir: &Path) -> PathBuf {
        state_dir.join("config.toml")
    }

    /// Load config from disk. Returns default if not found.
    pub fn load(state_dir: &Path) -> Result<Self> {
        let path = Self::config_path(state_dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save config to disk.
    pub fn save(&self, state_dir: &Path) -> Result<()> {
        let path = Self::config_path(state_dir);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&path, content).context("Failed to write config file")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = SecureScoutConfig::default();
        assert_eq!(config.platform_fee_bps, 250);
        assert_eq!(config.page_size, 20);
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let mut config = SecureScoutConfig::default();
        config.platform_fee_bps = 500;
        config.save(dir.path()).unwrap();
        let loaded = SecureScoutConfig::load(dir.path()).unwrap();
        assert_eq!(loaded.platform_fee_bps, 500);
        assert_eq!(loaded.server_addr, config.server_addr);
    }

    #[test]
    fn test_load_missing_returns_default() {
        let dir = tempdir().unwrap();
        let loaded = SecureScoutConfig::load(dir.path()).unwrap();
        assert_eq!(loaded.platform_fee_bps, 250);
    }

    #[test]
    fn test_config_toml_serialization() {
        let config = SecureScoutConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("platform_fee_bps"));
        assert!(toml_str.contains("server_addr"));
    }
}
