//! CLI configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/peerdrop/config.toml`
//! - Windows: `%APPDATA%/peerdrop/config.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use peerdrop_protocol::constants::{
    BACKPRESSURE_RETRY_DELAY, DEFAULT_CHUNK_SIZE, HIGH_WATER_MARK, PROGRESS_INTERVAL,
};
use peerdrop_transfer::TransferConfig;

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Room joined when `--room` is not given.
    #[serde(default = "default_room")]
    pub room: String,

    /// Address `receive` listens on.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Directory completed files are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Chunk payload size in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Pending-send bytes above which the sender pauses.
    #[serde(default = "default_high_water_mark")]
    pub high_water_mark: u64,

    #[serde(default = "default_backpressure_retry_ms")]
    pub backpressure_retry_ms: u64,

    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    /// Seconds to wait for the receiver's ack (0 = forever).
    #[serde(default)]
    pub ack_timeout_secs: u64,
}

fn default_room() -> String {
    "default".into()
}

fn default_listen() -> String {
    "0.0.0.0:9470".into()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_high_water_mark() -> u64 {
    HIGH_WATER_MARK
}

fn default_backpressure_retry_ms() -> u64 {
    BACKPRESSURE_RETRY_DELAY.as_millis() as u64
}

fn default_progress_interval_ms() -> u64 {
    PROGRESS_INTERVAL.as_millis() as u64
}

impl Default for Config {
    fn default() -> Self {
        Self {
            room: default_room(),
            listen: default_listen(),
            output_dir: default_output_dir(),
            chunk_size: default_chunk_size(),
            high_water_mark: default_high_water_mark(),
            backpressure_retry_ms: default_backpressure_retry_ms(),
            progress_interval_ms: default_progress_interval_ms(),
            ack_timeout_secs: 0,
        }
    }
}

impl Config {
    /// Loads configuration from `path`, or creates a default there if not found.
    pub fn load_or_create(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save(path)?;
            Ok(config)
        }
    }

    /// Saves the configuration to `path`.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Transfer engine settings derived from this configuration.
    pub fn transfer_config(&self) -> anyhow::Result<TransferConfig> {
        let config = TransferConfig {
            chunk_size: self.chunk_size,
            high_water_mark: self.high_water_mark,
            retry_delay: Duration::from_millis(self.backpressure_retry_ms),
            progress_interval: Duration::from_millis(self.progress_interval_ms),
            ack_timeout: (self.ack_timeout_secs > 0)
                .then(|| Duration::from_secs(self.ack_timeout_secs)),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Returns the platform-specific configuration file path.
pub fn default_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("peerdrop").join("config.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("peerdrop")
            .join("config.toml")
    }
}
