//! DMX channel layouts and their conversion to 16-bit RGB

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A 16-bit RGB colour as sent to the Hue bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb16 {
    pub r: u16,
    pub g: u16,
    pub b: u16,
}

impl Rgb16 {
    pub const BLACK: Rgb16 = Rgb16 { r: 0, g: 0, b: 0 };

    pub const fn new(r: u16, g: u16, b: u16) -> Self {
        Self { r, g, b }
    }
}

impl From<(u16, u16, u16)> for Rgb16 {
    fn from((r, g, b): (u16, u16, u16)) -> Self {
        Self { r, g, b }
    }
}

/// Channel layout of a fixture
///
/// | Layout            | Channels | Meaning                                   |
/// |-------------------|----------|-------------------------------------------|
/// | `8bit`            | 3        | R, G, B                                   |
/// | `8bit-dimmable`   | 4        | Dimmer, R, G, B                           |
/// | `16bit`           | 6        | R coarse, R fine, G coarse, G fine, ...   |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelLayout {
    #[serde(rename = "8bit")]
    EightBit,
    #[serde(rename = "8bit-dimmable")]
    EightBitDimmable,
    #[serde(rename = "16bit")]
    SixteenBit,
}

impl ChannelLayout {
    /// Number of DMX channels this layout takes up
    pub const fn channel_width(self) -> usize {
        match self {
            ChannelLayout::EightBit => 3,
            ChannelLayout::EightBitDimmable => 4,
            ChannelLayout::SixteenBit => 6,
        }
    }

    /// Name used in configuration files
    pub const fn as_str(self) -> &'static str {
        match self {
            ChannelLayout::EightBit => "8bit",
            ChannelLayout::EightBitDimmable => "8bit-dimmable",
            ChannelLayout::SixteenBit => "16bit",
        }
    }

    /// Convert the raw DMX values of a fixture to 16-bit RGB.
    ///
    /// `values` must hold exactly `channel_width()` bytes; the router
    /// guarantees this by slicing the universe.
    pub fn decode(self, values: &[u8]) -> Rgb16 {
        debug_assert_eq!(values.len(), self.channel_width());
        match self {
            ChannelLayout::EightBit => Rgb16 {
                r: expand(values[0]),
                g: expand(values[1]),
                b: expand(values[2]),
            },
            ChannelLayout::EightBitDimmable => {
                let dimmer = values[0];
                Rgb16 {
                    r: dim(expand(values[1]), dimmer),
                    g: dim(expand(values[2]), dimmer),
                    b: dim(expand(values[3]), dimmer),
                }
            }
            ChannelLayout::SixteenBit => Rgb16 {
                r: u16::from_be_bytes([values[0], values[1]]),
                g: u16::from_be_bytes([values[2], values[3]]),
                b: u16::from_be_bytes([values[4], values[5]]),
            },
        }
    }
}

/// 0..=255 onto 0..=65535 (255 * 257 = 65535)
#[inline]
fn expand(value: u8) -> u16 {
    value as u16 * 257
}

/// Scale by `dimmer / 255`, rounded to nearest
#[inline]
fn dim(value: u16, dimmer: u8) -> u16 {
    ((value as u32 * dimmer as u32 + 127) / 255) as u16
}

impl FromStr for ChannelLayout {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "8bit" => Ok(ChannelLayout::EightBit),
            "8bit-dimmable" => Ok(ChannelLayout::EightBitDimmable),
            "16bit" => Ok(ChannelLayout::SixteenBit),
            other => Err(ConfigError::InvalidChannelLayout(other.to_string())),
        }
    }
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
