use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::dmx::{FixtureConfig, ValidationOptions, ARTNET_PORT};
use crate::error::ConfigError;
use crate::hue::models::HueConfig;
use crate::hue::stream::PskCredentials;

/// Everything the bridge needs to run
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub hue: HueConfig,
    /// Entertainment group (room) to stream to
    pub group_id: String,
    /// Local address for the Art-Net listener
    pub listen_address: SocketAddr,
    /// Art-Net universe the fixtures are patched in
    pub universe: u16,
    pub fixtures: Vec<FixtureConfig>,
    pub validation: ValidationOptions,
    pub timings: BridgeTimings,
}

/// Delays and intervals of the bridge lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeTimings {
    /// Wait between enabling streaming mode and the DTLS handshake; the
    /// bridge needs a moment to open its DTLS port.
    pub settle_delay: Duration,
    /// How often the keepalive check runs
    pub keepalive_interval: Duration,
    /// Repeat the last frame after this much silence
    pub max_idle: Duration,
    /// Base delay before a reconnection attempt, doubled per failure (max 16x)
    pub reconnect_delay: Duration,
}

impl Default for BridgeTimings {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(1),
            keepalive_interval: Duration::from_secs(1),
            max_idle: Duration::from_secs(2),
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

impl BridgeTimings {
    /// Reject intervals the supervisor cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keepalive_interval.is_zero() {
            return Err(ConfigError::InvalidTiming("keepalive_interval"));
        }
        Ok(())
    }
}

impl BridgeConfig {
    pub fn new(hue: HueConfig, group_id: impl Into<String>, fixtures: Vec<FixtureConfig>) -> Self {
        Self {
            hue,
            group_id: group_id.into(),
            listen_address: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), ARTNET_PORT),
            universe: 0,
            fixtures,
            validation: ValidationOptions::default(),
            timings: BridgeTimings::default(),
        }
    }

    /// Check that credentials are present and build the DTLS PSK from them.
    pub fn psk_credentials(&self) -> Result<PskCredentials, ConfigError> {
        if self.hue.bridge_ip.trim().is_empty() {
            return Err(ConfigError::MissingCredentials("hue.host"));
        }
        if self.hue.username.trim().is_empty() {
            return Err(ConfigError::MissingCredentials("hue.username"));
        }
        if self.hue.client_key.trim().is_empty() {
            return Err(ConfigError::MissingCredentials("hue.client_key"));
        }
        Ok(PskCredentials {
            identity: self.hue.username.clone(),
            key: self.hue.psk()?,
        })
    }
}
