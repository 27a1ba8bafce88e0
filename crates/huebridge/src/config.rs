//! Configuration file (TOML)

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::LevelFilter;

use huebridge_control::dmx::{ChannelLayout, FixtureConfig, ValidationOptions, ARTNET_PORT};
use huebridge_control::{BridgeConfig, BridgeTimings, ConfigError, HueConfig};

/// Entertainment room used when the file does not name one
const DEFAULT_GROUP_ID: &str = "200";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub hue: HueSection,
    #[serde(default)]
    pub artnet: ArtNetSection,
    #[serde(default)]
    pub validation: ValidationOptions,
    #[serde(default)]
    pub timing: TimingSection,
    #[serde(default)]
    pub logging: LogConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct HueSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_key: Option<String>,
    #[serde(default = "default_group_id")]
    pub group_id: String,
    #[serde(default)]
    pub lights: Vec<FixtureConfig>,
}

impl Default for HueSection {
    fn default() -> Self {
        Self {
            host: None,
            username: None,
            client_key: None,
            group_id: default_group_id(),
            lights: Vec::new(),
        }
    }
}

impl std::fmt::Debug for HueSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HueSection")
            .field("host", &self.host)
            .field("username", &self.username.as_ref().map(|_| "***REDACTED***"))
            .field("client_key", &self.client_key.as_ref().map(|_| "***REDACTED***"))
            .field("group_id", &self.group_id)
            .field("lights", &self.lights)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtNetSection {
    #[serde(default = "default_bind")]
    pub bind: IpAddr,
    #[serde(default = "default_universe")]
    pub universe: u16,
}

impl Default for ArtNetSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            universe: default_universe(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingSection {
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval_ms: u64,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay(),
            keepalive_interval_ms: default_keepalive_interval(),
            reconnect_delay_ms: default_reconnect_delay(),
        }
    }
}

/// Logging options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// trace, debug, info, warn, error or off
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Also write logs to this file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl LogConfig {
    /// Configured level, INFO if it does not parse
    pub fn parse_level(&self) -> LevelFilter {
        self.level.parse().unwrap_or(LevelFilter::INFO)
    }
}

fn default_group_id() -> String {
    DEFAULT_GROUP_ID.to_string()
}
fn default_bind() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}
fn default_universe() -> u16 {
    11
}
fn default_settle_delay() -> u64 {
    1000
}
fn default_keepalive_interval() -> u64 {
    1000
}
fn default_reconnect_delay() -> u64 {
    1000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Read the config file, creating it with defaults if it does not exist.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Config::default();
            config.save(path)?;
            return Ok(config);
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        toml::from_str(&text).with_context(|| format!("Failed to parse config file {:?}", path))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write config file {:?}", path))
    }

    /// Credentials of the paired bridge
    pub fn hue_config(&self) -> Result<HueConfig, ConfigError> {
        let host = self
            .hue
            .host
            .clone()
            .ok_or(ConfigError::MissingCredentials("hue.host"))?;
        let username = self
            .hue
            .username
            .clone()
            .ok_or(ConfigError::MissingCredentials("hue.username"))?;
        let client_key = self
            .hue
            .client_key
            .clone()
            .ok_or(ConfigError::MissingCredentials("hue.client_key"))?;
        Ok(HueConfig {
            bridge_ip: host,
            username,
            client_key,
        })
    }

    /// Store freshly registered credentials. Example lights are added only
    /// when none are configured yet.
    pub fn apply_pairing(&mut self, credentials: HueConfig) {
        self.hue.host = Some(credentials.bridge_ip);
        self.hue.username = Some(credentials.username);
        self.hue.client_key = Some(credentials.client_key);
        if self.hue.lights.is_empty() {
            self.hue.lights = vec![
                FixtureConfig {
                    dmx_start: 1,
                    fixture_id: "1".to_string(),
                    channel_layout: ChannelLayout::EightBitDimmable,
                },
                FixtureConfig {
                    dmx_start: 5,
                    fixture_id: "2".to_string(),
                    channel_layout: ChannelLayout::EightBitDimmable,
                },
            ];
        }
    }

    pub fn bridge_config(&self) -> Result<BridgeConfig, ConfigError> {
        let mut config =
            BridgeConfig::new(self.hue_config()?, &self.hue.group_id, self.hue.lights.clone());
        config.listen_address = SocketAddr::new(self.artnet.bind, ARTNET_PORT);
        config.universe = self.artnet.universe;
        config.validation = self.validation;
        let keepalive_interval = Duration::from_millis(self.timing.keepalive_interval_ms);
        config.timings = BridgeTimings {
            settle_delay: Duration::from_millis(self.timing.settle_delay_ms),
            keepalive_interval,
            max_idle: keepalive_interval * 2,
            reconnect_delay: Duration::from_millis(self.timing.reconnect_delay_ms),
        };
        config.timings.validate()?;
        Ok(config)
    }
}
