use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::DEFAULT_SERVER_URL;

/// Client settings stored in `~/.kevin/config.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub server_url: String,
    #[serde(default)]
    pub last_updated: Option<chrono::DateTime<chrono::Utc>>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            last_updated: None,
        }
    }
}

/// Configuration manager for the .kevin directory
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager rooted at `~/.kevin`
    pub fn new() -> Result<Self> {
        let home_dir = dirs::home_dir().context("Could not determine home directory")?;
        Self::with_dir(home_dir.join(".kevin"))
    }

    /// Config manager rooted at an arbitrary directory
    pub fn with_dir(config_dir: impl Into<PathBuf>) -> Result<Self> {
        let config_dir = config_dir.into();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).context("Failed to create .kevin directory")?;
        }

        Ok(Self { config_dir })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn identity_path(&self) -> PathBuf {
        self.config_dir.join("identity.json")
    }

    pub fn outbox_path(&self) -> PathBuf {
        self.config_dir.join("outbox.json")
    }

    pub fn log_path(&self) -> PathBuf {
        self.config_dir.join("kevin.log")
    }

    fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }

    /// Load the saved configuration, if any
    pub fn load_config(&self) -> Result<Option<ClientConfig>> {
        let config_file = self.config_file();

        if !config_file.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&config_file).context("Failed to read config file")?;
        let config: ClientConfig = serde_json::from_str(&json).context("Failed to parse config")?;

        Ok(Some(config))
    }

    pub fn save_config(&self, config: &ClientConfig) -> Result<()> {
        let json = serde_json::to_string_pretty(config).context("Failed to serialize config")?;
        fs::write(self.config_file(), json).context("Failed to write config file")?;
        Ok(())
    }

    /// Save the server URL so later commands use it without `--server`
    pub fn remember_server_url(&self, server_url: &str) -> Result<()> {
        self.save_config(&ClientConfig {
            server_url: server_url.to_string(),
            last_updated: Some(chrono::Utc::now()),
        })
    }

    /// Determine the server URL to use based on priority:
    /// 1. CLI argument or `KEVIN_SERVER_URL` (clap reads both)
    /// 2. Saved configuration file
    /// 3. Default
    pub fn determine_server_url(&self, cli_override: Option<String>) -> Result<String> {
        if let Some(url) = cli_override {
            return Ok(url);
        }

        Ok(self.load_config()?.unwrap_or_default().server_url)
    }
}
