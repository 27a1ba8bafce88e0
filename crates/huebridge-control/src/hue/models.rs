use serde::{Deserialize, Serialize};

use crate::dmx::{Fixture, Rgb16};

/// Credentials and address of a paired Hue Bridge
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct HueConfig {
    pub bridge_ip: String,
    pub username: String,   // REST API user, also the PSK identity for DTLS
    pub client_key: String, // Hex encoded PSK for DTLS
}

impl HueConfig {
    /// The DTLS pre-shared key (decoded client key)
    pub fn psk(&self) -> Result<Vec<u8>, hex::FromHexError> {
        hex::decode(self.client_key.trim())
    }
}

impl std::fmt::Debug for HueConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HueConfig")
            .field("bridge_ip", &self.bridge_ip)
            .field("username", &"***REDACTED***")
            .field("client_key", &"***REDACTED***")
            .finish()
    }
}

/// An entertainment group as reported by the bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteGroup {
    pub id: String,
    pub name: String,
    pub lights: Vec<String>, // REST API light ids
}

/// A light as reported by the bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightInfo {
    pub id: String,
    pub name: String,
}

/// New colour for one light
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorUpdate {
    pub fixture_id: String,
    pub light_id: u16,
    pub color: Rgb16,
}

impl ColorUpdate {
    pub fn new(fixture: &Fixture, color: Rgb16) -> Self {
        Self {
            fixture_id: fixture.fixture_id().to_string(),
            light_id: fixture.light_id(),
            color,
        }
    }
}
