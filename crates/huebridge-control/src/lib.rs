//! ArtNet Hue Entertainment - DMX to Philips Hue streaming bridge
//!
//! This crate turns Art-Net DMX into Hue Entertainment API updates:
//! - **DMX**: Art-Net input, fixture channel layouts, frame routing
//! - **Hue**: management API (pairing, rooms, lights) and the DTLS stream
//! - **Bridge**: startup/shutdown sequencing, keepalive and reconnection
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use huebridge_control::bridge::{BridgeConfig, BridgeOrchestrator};
//! use huebridge_control::dmx::{ChannelLayout, FixtureConfig};
//! use huebridge_control::hue::HueConfig;
//!
//! # async fn run() -> huebridge_control::Result<()> {
//! let hue = HueConfig {
//!     bridge_ip: "192.168.1.20".to_string(),
//!     username: "<username>".to_string(),
//!     client_key: "<client key>".to_string(),
//! };
//! let fixtures = vec![FixtureConfig {
//!     dmx_start: 1,
//!     fixture_id: "1".to_string(),
//!     channel_layout: ChannelLayout::EightBitDimmable,
//! }];
//! let mut config = BridgeConfig::new(hue, "200", fixtures);
//! config.universe = 11;
//!
//! let (_stop, shutdown) = tokio::sync::watch::channel(false);
//! BridgeOrchestrator::new(config, shutdown)?.run().await
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`dmx`] - Art-Net input, fixture decoding and routing
//! - [`hue`] - Hue management API and entertainment stream
//! - [`bridge`] - the orchestrator tying both together
//! - [`error`] - Error types

#![allow(missing_docs)]

/// Bridge orchestration
pub mod bridge;
/// DMX input (Art-Net) and fixture decoding
pub mod dmx;
/// Error types
pub mod error;
/// Philips Hue integration
pub mod hue;

// Re-exports
pub use bridge::{BridgeConfig, BridgeOrchestrator, BridgeTimings, RunningBridge};
pub use dmx::{ChannelLayout, DmxFrame, Fixture, FixtureConfig, FixtureRegistry, FrameRouter, Rgb16};
pub use error::{BridgeError, ConfigError, DecodeError, Result, SessionError};
pub use hue::{ColorUpdate, HueConfig, RemoteGroup};
