//! Fixture definitions and validation against an entertainment room

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::decoder::{ChannelLayout, Rgb16};
use crate::error::{ConfigError, DecodeError};
use crate::hue::models::RemoteGroup;

/// Number of channels in a DMX universe
pub const DMX_UNIVERSE_SIZE: usize = 512;

/// A fixture as written in the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFixtureConfig")]
pub struct FixtureConfig {
    /// 1-based DMX start address
    pub dmx_start: u16,
    /// Hue light id
    #[serde(rename = "light_id")]
    pub fixture_id: String,
    #[serde(rename = "channel_mode")]
    pub channel_layout: ChannelLayout,
}

/// Fixture entry with the channel mode still unparsed, so a bad mode can be
/// reported together with its light
#[derive(Deserialize)]
struct RawFixtureConfig {
    dmx_start: u16,
    light_id: String,
    channel_mode: String,
}

impl TryFrom<RawFixtureConfig> for FixtureConfig {
    type Error = String;

    fn try_from(raw: RawFixtureConfig) -> Result<Self, Self::Error> {
        let channel_layout = raw
            .channel_mode
            .parse::<ChannelLayout>()
            .map_err(|e| format!("light {}: {}", raw.light_id, e))?;
        Ok(Self {
            dmx_start: raw.dmx_start,
            fixture_id: raw.light_id,
            channel_layout,
        })
    }
}

/// A configured fixture bound to its decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    dmx_start: u16,
    fixture_id: String,
    light_id: u16,
    layout: ChannelLayout,
}

impl Fixture {
    /// Bind a fixture configuration to its decoder.
    pub fn new(config: &FixtureConfig) -> Result<Self, ConfigError> {
        if config.dmx_start == 0 || config.dmx_start as usize > DMX_UNIVERSE_SIZE {
            return Err(ConfigError::InvalidDmxStart {
                light: config.fixture_id.clone(),
                start: config.dmx_start,
            });
        }
        // Canonical form only, so the id compares equal to the bridge's
        let light_id = config
            .fixture_id
            .parse::<u16>()
            .ok()
            .filter(|id| id.to_string() == config.fixture_id)
            .ok_or_else(|| ConfigError::InvalidLightId(config.fixture_id.clone()))?;

        Ok(Self {
            dmx_start: config.dmx_start,
            fixture_id: config.fixture_id.clone(),
            light_id,
            layout: config.channel_layout,
        })
    }

    pub fn dmx_start(&self) -> u16 {
        self.dmx_start
    }

    pub fn fixture_id(&self) -> &str {
        &self.fixture_id
    }

    /// Light id as carried in the stream frame
    pub fn light_id(&self) -> u16 {
        self.light_id
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn channel_width(&self) -> usize {
        self.layout.channel_width()
    }

    /// 0-based channel range of this fixture within a universe
    pub fn window(&self) -> std::ops::Range<usize> {
        let start = self.dmx_start as usize - 1;
        start..start + self.channel_width()
    }

    /// Slice this fixture's channels out of a DMX frame and decode them.
    pub fn decode_frame(&self, data: &[u8]) -> Result<Rgb16, DecodeError> {
        let window = self.window();
        match data.get(window.clone()) {
            Some(values) => Ok(self.layout.decode(values)),
            None => Err(DecodeError::OutOfRangeWindow {
                light: self.fixture_id.clone(),
                start: window.start + 1,
                end: window.end,
                frame_len: data.len(),
            }),
        }
    }
}

/// How strictly a validation check is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationLevel {
    #[default]
    Off,
    Warn,
    Deny,
}

/// Optional checks applied when building the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
    /// Fixtures whose light is not a member of the entertainment room
    pub unknown_lights: ValidationLevel,
    /// Overlapping fixture windows and windows past channel 512
    pub dmx_windows: ValidationLevel,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            unknown_lights: ValidationLevel::Warn,
            dmx_windows: ValidationLevel::Off,
        }
    }
}

/// Builds the fixture list for an entertainment room
pub struct FixtureRegistry;

impl FixtureRegistry {
    /// Create one fixture per configuration and check that every light in
    /// `group` is covered.
    pub fn build(
        configs: &[FixtureConfig],
        group: &RemoteGroup,
        options: &ValidationOptions,
    ) -> Result<Vec<Fixture>, ConfigError> {
        let mut fixtures = Vec::with_capacity(configs.len());
        let mut seen = HashSet::new();
        for config in configs {
            if !seen.insert(config.fixture_id.as_str()) {
                return Err(ConfigError::DuplicateFixture(config.fixture_id.clone()));
            }
            fixtures.push(Fixture::new(config)?);
        }

        let unconfigured: Vec<String> = group
            .lights
            .iter()
            .filter(|id| !seen.contains(id.as_str()))
            .cloned()
            .collect();
        if !unconfigured.is_empty() {
            return Err(ConfigError::UnconfiguredLights {
                room: group.id.clone(),
                lights: unconfigured,
            });
        }

        if options.unknown_lights != ValidationLevel::Off {
            check_unknown_lights(&fixtures, group, options.unknown_lights)?;
        }
        if options.dmx_windows != ValidationLevel::Off {
            check_dmx_windows(&fixtures, options.dmx_windows)?;
        }

        debug!(
            "Built {} fixtures for entertainment room '{}'",
            fixtures.len(),
            group.name
        );
        Ok(fixtures)
    }
}

fn check_unknown_lights(
    fixtures: &[Fixture],
    group: &RemoteGroup,
    level: ValidationLevel,
) -> Result<(), ConfigError> {
    let unknown: Vec<String> = fixtures
        .iter()
        .filter(|f| !group.lights.iter().any(|id| id == f.fixture_id()))
        .map(|f| f.fixture_id().to_string())
        .collect();
    if unknown.is_empty() {
        return Ok(());
    }

    let err = ConfigError::UnknownLights {
        room: group.id.clone(),
        lights: unknown,
    };
    if level == ValidationLevel::Deny {
        return Err(err);
    }
    warn!("{}", err);
    Ok(())
}

fn check_dmx_windows(fixtures: &[Fixture], level: ValidationLevel) -> Result<(), ConfigError> {
    let mut problems = Vec::new();

    for fixture in fixtures {
        let end = fixture.window().end;
        if end > DMX_UNIVERSE_SIZE {
            problems.push(ConfigError::WindowOutOfRange {
                light: fixture.fixture_id().to_string(),
                end,
            });
        }
    }

    let mut by_start: Vec<&Fixture> = fixtures.iter().collect();
    by_start.sort_by_key(|f| f.dmx_start());
    for pair in by_start.windows(2) {
        if pair[1].window().start < pair[0].window().end {
            problems.push(ConfigError::OverlappingWindows {
                first: pair[0].fixture_id().to_string(),
                second: pair[1].fixture_id().to_string(),
            });
        }
    }

    if level == ValidationLevel::Deny {
        if let Some(err) = problems.into_iter().next() {
            return Err(err);
        }
        return Ok(());
    }
    for problem in &problems {
        warn!("{}", problem);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(id: &str, start: u16, layout: ChannelLayout) -> FixtureConfig {
        FixtureConfig {
            dmx_start: start,
            fixture_id: id.to_string(),
            channel_layout: layout,
        }
    }

    fn group(lights: &[&str]) -> RemoteGroup {
        RemoteGroup {
            id: "200".to_string(),
            name: "Stage".to_string(),
            lights: lights.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_build_exact_match() {
        let configs = vec![
            config("1", 1, ChannelLayout::EightBitDimmable),
            config("2", 5, ChannelLayout::EightBit),
        ];
        let fixtures =
            FixtureRegistry::build(&configs, &group(&["2", "1"]), &ValidationOptions::default())
                .unwrap();
        assert_eq!(fixtures.len(), 2);
        assert_eq!(fixtures[0].fixture_id(), "1");
        assert_eq!(fixtures[0].channel_width(), 4);
        assert_eq!(fixtures[1].light_id(), 2);
    }

    #[test]
    fn test_build_reports_every_unconfigured_light() {
        let configs = vec![config("1", 1, ChannelLayout::EightBit)];
        let err =
            FixtureRegistry::build(&configs, &group(&["1", "2", "3"]), &ValidationOptions::default())
                .unwrap_err();
        match err {
            ConfigError::UnconfiguredLights { lights, .. } => {
                assert_eq!(lights, vec!["2".to_string(), "3".to_string()])
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_light_is_permitted_by_default() {
        let configs = vec![
            config("1", 1, ChannelLayout::EightBit),
            config("9", 4, ChannelLayout::EightBit),
        ];
        let fixtures =
            FixtureRegistry::build(&configs, &group(&["1"]), &ValidationOptions::default()).unwrap();
        assert_eq!(fixtures.len(), 2);
    }

    #[test]
    fn test_unknown_light_denied() {
        let configs = vec![
            config("1", 1, ChannelLayout::EightBit),
            config("9", 4, ChannelLayout::EightBit),
        ];
        let options = ValidationOptions {
            unknown_lights: ValidationLevel::Deny,
            ..Default::default()
        };
        let err = FixtureRegistry::build(&configs, &group(&["1"]), &options).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownLights { lights, .. } if lights == vec!["9".to_string()]));
    }

    #[test]
    fn test_duplicate_fixture_rejected() {
        let configs = vec![
            config("1", 1, ChannelLayout::EightBit),
            config("1", 4, ChannelLayout::EightBit),
        ];
        let err = FixtureRegistry::build(&configs, &group(&["1"]), &ValidationOptions::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateFixture(id) if id == "1"));
    }

    #[test]
    fn test_invalid_fixture_fields() {
        assert!(matches!(
            Fixture::new(&config("1", 0, ChannelLayout::EightBit)),
            Err(ConfigError::InvalidDmxStart { start: 0, .. })
        ));
        assert!(matches!(
            Fixture::new(&config("lamp", 1, ChannelLayout::EightBit)),
            Err(ConfigError::InvalidLightId(_))
        ));
    }

    #[test]
    fn test_non_canonical_light_ids_rejected() {
        for id in [" 1", "01", "+1", "1 "] {
            assert!(
                matches!(
                    Fixture::new(&config(id, 1, ChannelLayout::EightBit)),
                    Err(ConfigError::InvalidLightId(ref bad)) if bad == id
                ),
                "accepted {:?}",
                id
            );
        }
        let configs = vec![config("01", 1, ChannelLayout::EightBit)];
        assert!(matches!(
            FixtureRegistry::build(&configs, &group(&["1"]), &ValidationOptions::default()),
            Err(ConfigError::InvalidLightId(_))
        ));
    }

    #[test]
    fn test_overlap_is_unchecked_by_default() {
        let configs = vec![
            config("1", 1, ChannelLayout::SixteenBit),
            config("2", 3, ChannelLayout::EightBit),
        ];
        assert!(
            FixtureRegistry::build(&configs, &group(&["1", "2"]), &ValidationOptions::default())
                .is_ok()
        );
    }

    #[test]
    fn test_overlap_denied_when_enabled() {
        let configs = vec![
            config("1", 1, ChannelLayout::SixteenBit),
            config("2", 3, ChannelLayout::EightBit),
        ];
        let options = ValidationOptions {
            dmx_windows: ValidationLevel::Deny,
            ..Default::default()
        };
        let err = FixtureRegistry::build(&configs, &group(&["1", "2"]), &options).unwrap_err();
        assert!(matches!(err, ConfigError::OverlappingWindows { .. }));
    }

    #[test]
    fn test_window_past_universe_end() {
        let configs = vec![config("1", 510, ChannelLayout::SixteenBit)];
        let options = ValidationOptions {
            dmx_windows: ValidationLevel::Deny,
            ..Default::default()
        };
        let err = FixtureRegistry::build(&configs, &group(&["1"]), &options).unwrap_err();
        assert!(matches!(err, ConfigError::WindowOutOfRange { end: 515, .. }));

        let warn_only = ValidationOptions {
            dmx_windows: ValidationLevel::Warn,
            ..Default::default()
        };
        assert!(FixtureRegistry::build(&configs, &group(&["1"]), &warn_only).is_ok());
    }

    #[test]
    fn test_config_names_light_with_bad_channel_mode() {
        let ok: FixtureConfig = serde_json::from_value(serde_json::json!({
            "light_id": "4", "dmx_start": 9, "channel_mode": "16bit"
        }))
        .unwrap();
        assert_eq!(ok, config("4", 9, ChannelLayout::SixteenBit));

        let err = serde_json::from_value::<FixtureConfig>(serde_json::json!({
            "light_id": "4", "dmx_start": 9, "channel_mode": "rgbw"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("light 4: Invalid channel mode 'rgbw'"));
    }

    #[test]
    fn test_decode_frame_short_window() {
        let fixture = Fixture::new(&config("5", 5, ChannelLayout::EightBit)).unwrap();
        assert_eq!(fixture.window(), 4..7);
        assert_eq!(
            fixture.decode_frame(&[0, 0, 0, 0, 1, 2, 3]).unwrap(),
            Rgb16::new(257, 514, 771)
        );
        let err = fixture.decode_frame(&[0; 6]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::OutOfRangeWindow {
                light: "5".to_string(),
                start: 5,
                end: 7,
                frame_len: 6,
            }
        );
    }
}
