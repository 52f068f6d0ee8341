use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::eyre::{Context, OptionExt, Result};
use serde::{Deserialize, Serialize};

use crate::ports::provider::{Capabilities, Capability};

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_CREDENTIALS_FILE: &str = "cookies.json";
const DEFAULT_FAN_OUT_SECS: u64 = 20;
const DEFAULT_PROBE_SECS: u64 = 5;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Source identifier to the service implementing it
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default = "default_credentials_file")]
    pub file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Deadline for each source during a fan-out
    #[serde(default = "default_fan_out_secs")]
    pub fan_out_secs: u64,
    /// Timeout of liveness and inspect probes
    #[serde(default = "default_probe_secs")]
    pub probe_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub endpoint: String,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_credentials_file() -> String {
    DEFAULT_CREDENTIALS_FILE.to_string()
}

fn default_fan_out_secs() -> u64 {
    DEFAULT_FAN_OUT_SECS
}

fn default_probe_secs() -> u64 {
    DEFAULT_PROBE_SECS
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            file: default_credentials_file(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            fan_out_secs: DEFAULT_FAN_OUT_SECS,
            probe_secs: DEFAULT_PROBE_SECS,
        }
    }
}

impl SourceConfig {
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities.iter().copied().collect()
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .wrap_err_with(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join("music-aggregator").join("config.toml"))
    }

    /// Load the config from the default location. A missing file means defaults.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path().ok_or_eyre("No config directory on this platform")?;
        if !config_path.exists() {
            log::warn!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::from_file(&config_path)
    }

    /// Write the default config to the default location unless one exists.
    pub fn create_default() -> Result<PathBuf> {
        let config_path = Self::config_path().ok_or_eyre("No config directory on this platform")?;
        Self::write_default(&config_path)?;
        Ok(config_path)
    }

    pub fn write_default(path: &Path) -> Result<()> {
        if path.exists() {
            log::info!("Config already exists at {}", path.display());
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .wrap_err_with(|| format!("Failed to create {}", parent.display()))?;
        }
        let contents =
            toml::to_string_pretty(&Self::default()).wrap_err("Failed to serialize default config")?;
        std::fs::write(path, contents)
            .wrap_err_with(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Credential file path. Relative paths resolve against the working directory.
    pub fn credentials_path(&self) -> PathBuf {
        PathBuf::from(&self.credentials.file)
    }

    pub fn fan_out_deadline(&self) -> Duration {
        Duration::from_secs(self.timeouts.fan_out_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.probe_secs)
    }
}
