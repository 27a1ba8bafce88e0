//! DMX input
//!
//! This module receives DMX512 over Art-Net and converts fixture channel
//! windows into 16-bit RGB colours.
//!
//! ## Fixtures
//!
//! ```rust
//! use huebridge_control::dmx::{ChannelLayout, Fixture, FixtureConfig};
//!
//! let fixture = Fixture::new(&FixtureConfig {
//!     dmx_start: 1,
//!     fixture_id: "1".to_string(),
//!     channel_layout: ChannelLayout::EightBitDimmable,
//! })
//! .unwrap();
//!
//! let color = fixture.decode_frame(&[255, 255, 128, 0]).unwrap();
//! assert_eq!((color.r, color.g, color.b), (65535, 32896, 0));
//! ```

pub mod artnet;
pub mod decoder;
pub mod fixtures;
pub mod router;

pub use artnet::{parse_art_dmx, ArtNetListener, DmxFrame, ListenerHandle, ARTNET_PORT};
pub use decoder::{ChannelLayout, Rgb16};
pub use fixtures::{
    Fixture, FixtureConfig, FixtureRegistry, ValidationLevel, ValidationOptions,
    DMX_UNIVERSE_SIZE,
};
pub use router::{ColorSink, FrameRouter};
