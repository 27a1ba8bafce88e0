//! Routes DMX frames of the configured universe to the light stream

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::artnet::DmxFrame;
use super::fixtures::Fixture;
use crate::hue::models::ColorUpdate;

/// Receiver of one colour snapshot per DMX frame
pub trait ColorSink {
    /// Forward a complete batch of updates. Must not block.
    fn send(&self, updates: &[ColorUpdate]);
}

impl<S: ColorSink + ?Sized> ColorSink for Arc<S> {
    fn send(&self, updates: &[ColorUpdate]) {
        (**self).send(updates)
    }
}

/// Turns DMX frames into colour updates for every fixture
pub struct FrameRouter<S> {
    universe: u16,
    fixtures: Arc<[Fixture]>,
    sink: S,
    /// Fixtures whose short window has already been reported
    warned: HashSet<u16>,
}

impl<S: ColorSink> FrameRouter<S> {
    pub fn new(universe: u16, fixtures: Arc<[Fixture]>, sink: S) -> Self {
        Self {
            universe,
            fixtures,
            sink,
            warned: HashSet::new(),
        }
    }

    pub fn universe(&self) -> u16 {
        self.universe
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Handle one DMX frame. Frames for other universes are dropped.
    pub fn on_frame(&mut self, frame: &DmxFrame) {
        if frame.universe != self.universe {
            trace!("Ignoring DMX frame for universe {}", frame.universe);
            return;
        }

        let mut updates = Vec::with_capacity(self.fixtures.len());
        for fixture in self.fixtures.iter() {
            match fixture.decode_frame(&frame.data) {
                Ok(color) => {
                    self.warned.remove(&fixture.light_id());
                    updates.push(ColorUpdate::new(fixture, color));
                }
                Err(e) => {
                    if self.warned.insert(fixture.light_id()) {
                        warn!("Skipping light: {}", e);
                    } else {
                        debug!("Skipping light: {}", e);
                    }
                }
            }
        }

        if updates.is_empty() {
            return;
        }
        self.sink.send(&updates);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dmx::decoder::{ChannelLayout, Rgb16};
    use crate::dmx::fixtures::FixtureConfig;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        batches: Mutex<Vec<Vec<ColorUpdate>>>,
    }

    impl ColorSink for Recorder {
        fn send(&self, updates: &[ColorUpdate]) {
            self.batches.lock().push(updates.to_vec());
        }
    }

    fn fixtures() -> Arc<[Fixture]> {
        let configs = [
            FixtureConfig {
                dmx_start: 1,
                fixture_id: "1".to_string(),
                channel_layout: ChannelLayout::EightBitDimmable,
            },
            FixtureConfig {
                dmx_start: 5,
                fixture_id: "2".to_string(),
                channel_layout: ChannelLayout::EightBit,
            },
        ];
        configs
            .iter()
            .map(|c| Fixture::new(c).unwrap())
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn test_other_universe_is_dropped() {
        let mut router = FrameRouter::new(11, fixtures(), Recorder::default());
        router.on_frame(&DmxFrame {
            universe: 12,
            data: vec![255; 512],
        });
        assert!(router.sink().batches.lock().is_empty());
    }

    #[test]
    fn test_one_batch_per_frame() {
        let mut router = FrameRouter::new(11, fixtures(), Recorder::default());
        let mut data = vec![0u8; 512];
        data[..7].copy_from_slice(&[255, 10, 20, 30, 100, 150, 200]);
        router.on_frame(&DmxFrame { universe: 11, data });

        let batches = router.sink().batches.lock();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[0][0].fixture_id, "1");
        assert_eq!(batches[0][0].color, Rgb16::new(2570, 5140, 7710));
        assert_eq!(batches[0][1].fixture_id, "2");
        assert_eq!(batches[0][1].color, Rgb16::new(25700, 38550, 51400));
    }

    #[test]
    fn test_short_frame_skips_only_affected_fixture() {
        let mut router = FrameRouter::new(11, fixtures(), Recorder::default());
        router.on_frame(&DmxFrame {
            universe: 11,
            data: vec![255, 255, 0, 0, 1],
        });
        router.on_frame(&DmxFrame {
            universe: 11,
            data: vec![255, 255, 0, 0, 1],
        });

        let batches = router.sink().batches.lock();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 1);
        assert_eq!(batches[0][0].fixture_id, "1");
    }

    #[test]
    fn test_empty_frame_sends_nothing() {
        let mut router = FrameRouter::new(11, fixtures(), Recorder::default());
        router.on_frame(&DmxFrame {
            universe: 11,
            data: Vec::new(),
        });
        assert!(router.sink().batches.lock().is_empty());
    }
}
