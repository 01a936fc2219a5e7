//! Configuration system for the sensor.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $SENTINEL_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/sentinel/config.toml
//!   3. ~/.config/sentinel/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    pub sensor: SensorConfig,
    pub channel: ChannelConfig,
    pub capture: CaptureConfig,
}

/// Where detected alerts go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Structured log line only.
    Log,
    /// Log and post to the covert channel mailbox.
    #[default]
    Covert,
}

impl FromStr for SinkKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "log" => Ok(SinkKind::Log),
            "covert" => Ok(SinkKind::Covert),
            other => Err(ConfigError::InvalidValue("sensor.sink", other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub sink: SinkKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// How long each payload stays on air before it is replaced.
    pub dwell_secs: u64,
    /// Wrap the serialized alert in base64 before it is truncated.
    pub base64: bool,
    /// Network interface for the multicast stand-in radio. Empty = "lo".
    pub interface: String,
    /// UDP port payload datagrams are sent to.
    pub port: u16,
    /// Gap between repeated datagrams while advertising.
    pub advertise_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Text capture file to replay. Empty = no capture source.
    pub replay_path: PathBuf,
    /// Delay between replayed frames.
    pub frame_interval_ms: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

/// Dwell interval of the reference hardware.
pub const DEFAULT_DWELL_SECS: u64 = 10;

/// Default UDP port for payload datagrams.
pub const DEFAULT_CHANNEL_PORT: u16 = 9400;

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            dwell_secs: DEFAULT_DWELL_SECS,
            base64: false,
            interface: String::new(),
            port: DEFAULT_CHANNEL_PORT,
            advertise_interval_ms: 100,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            replay_path: PathBuf::new(),
            frame_interval_ms: 50,
        }
    }
}

impl ChannelConfig {
    pub fn dwell(&self) -> Duration {
        Duration::from_secs(self.dwell_secs)
    }

    pub fn advertise_interval(&self) -> Duration {
        Duration::from_millis(self.advertise_interval_ms.max(1))
    }

    pub fn interface_name(&self) -> &str {
        if self.interface.is_empty() {
            "lo"
        } else {
            &self.interface
        }
    }
}

impl CaptureConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn replay_path(&self) -> Option<&PathBuf> {
        if self.replay_path.as_os_str().is_empty() {
            None
        } else {
            Some(&self.replay_path)
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

pub fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("sentinel")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid value for {0}: {1:?}")]
    InvalidValue(&'static str, String),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl SentinelConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            SentinelConfig::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let text =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("SENTINEL_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&SentinelConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply SENTINEL_* overrides. `lookup` is `std::env::var` outside tests.
    ///
    /// Unparseable values are ignored and the file/default value kept.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("SENTINEL_SENSOR__SINK") {
            if let Ok(sink) = v.parse() {
                self.sensor.sink = sink;
            }
        }
        if let Some(v) = lookup("SENTINEL_CHANNEL__DWELL_SECS") {
            if let Ok(secs) = v.parse() {
                self.channel.dwell_secs = secs;
            }
        }
        if let Some(v) = lookup("SENTINEL_CHANNEL__BASE64") {
            self.channel.base64 = v == "true" || v == "1";
        }
        if let Some(v) = lookup("SENTINEL_CHANNEL__INTERFACE") {
            self.channel.interface = v;
        }
        if let Some(v) = lookup("SENTINEL_CHANNEL__PORT") {
            if let Ok(p) = v.parse() {
                self.channel.port = p;
            }
        }
        if let Some(v) = lookup("SENTINEL_CAPTURE__REPLAY_PATH") {
            self.capture.replay_path = PathBuf::from(v);
        }
    }
}
