//! Error types for the bridge
use thiserror::Error;

use crate::hue::api::error::HueError;

/// Configuration errors: fixture/room mismatch, bad fixture definitions,
/// missing credentials. Always fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Lights in the entertainment room that no fixture addresses
    #[error("Not all lights in the entertainment room '{room}' have been configured: {}", .lights.join(", "))]
    UnconfiguredLights { room: String, lights: Vec<String> },

    /// Fixtures pointing at lights that are not part of the room
    #[error("Configured lights are not part of the entertainment room '{room}': {}", .lights.join(", "))]
    UnknownLights { room: String, lights: Vec<String> },

    /// Zero or multiple entertainment rooms matched the configured id
    #[error("Entertainment room with id {id} was not found ({matches} matches)")]
    RoomNotFound { id: String, matches: usize },

    /// Two fixtures use the same light id
    #[error("Light {0} is configured more than once")]
    DuplicateFixture(String),

    /// Light ids must be numeric and fit in 16 bits for the stream frame
    #[error("Invalid light id '{0}': expected a plain number between 0 and 65535")]
    InvalidLightId(String),

    /// DMX addresses are 1-based
    #[error("Invalid DMX start address {start} for light {light}: must be between 1 and 512")]
    InvalidDmxStart { light: String, start: u16 },

    /// Unknown channel mode string
    #[error("Invalid channel mode '{0}'. Valid values are: 8bit, 8bit-dimmable, 16bit")]
    InvalidChannelLayout(String),

    /// Two fixture windows share DMX channels
    #[error("DMX channels of lights {first} and {second} overlap")]
    OverlappingWindows { first: String, second: String },

    /// Fixture window extends past channel 512
    #[error("DMX window of light {light} ends at channel {end}, past the end of the universe")]
    WindowOutOfRange { light: String, end: usize },

    /// A required credential is missing from the configuration
    #[error("No Hue bridge is paired yet ({0} is missing). Please pair a bridge first")]
    MissingCredentials(&'static str),

    /// A lifecycle interval that must be positive is zero
    #[error("Invalid timing: {0} must be greater than zero")]
    InvalidTiming(&'static str),

    /// The client key is not a hex encoded PSK
    #[error("Invalid client key: {0}")]
    InvalidClientKey(#[from] hex::FromHexError),
}

/// Streaming session errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// The DTLS handshake with the bridge failed
    #[error("DTLS handshake failed: {0}")]
    Handshake(String),

    /// The transport failed while writing a frame
    #[error("Transport dropped: {0}")]
    TransportDropped(#[source] std::io::Error),

    /// `connect()` called while a session is already active or handshaking
    #[error("Streaming session is already active")]
    AlreadyActive,
}

/// Per-fixture decoding errors on the data plane
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The DMX frame is too short for the fixture's channel window
    #[error("DMX frame of {frame_len} channels is too short for light {light} (channels {start}..{end})")]
    OutOfRangeWindow {
        light: String,
        start: usize,
        end: usize,
        frame_len: usize,
    },
}

/// Top level bridge errors
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Hue management API error
    #[error("Hue API error: {0}")]
    Hue(#[from] HueError),

    /// Streaming session error
    #[error(transparent)]
    Session(#[from] SessionError),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;
