//! WAV Rendering
//!
//! Offline view of what the PSG DACs would output in mix mode. The mixer is
//! stepped once per timer tick against a [`RecordingBus`]; the waveform writes
//! of each tick are folded into per-channel DAC levels, and the held levels are
//! averaged into one sample per tick. The sample rate is therefore the timer
//! interrupt rate.

pub mod wav;

pub use wav::{export_to_wav, write_wav_file};

pub use crate::timer::{timer_rate_hz, TIMER_CLOCK_HZ};

use crate::mixer::{MixerHandle, PSG_CHANNELS};
use crate::{BusEvent, RecordingBus};

/// Map a 5-bit direct-DAC value to [-1.0, 1.0]
#[inline]
pub fn dda_to_f32(value: u8) -> f32 {
    f32::from(value & 0x1F) / 15.5 - 1.0
}

/// Render options
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportConfig {
    /// Output sample rate, one sample per timer tick
    pub sample_rate: u32,
    /// Number of output channels (1 = mono, 2 = stereo)
    pub channels: u16,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            sample_rate: timer_rate_hz(crate::timer::DEFAULT_TIMER_PERIOD),
            channels: 1,
        }
    }
}

impl ExportConfig {
    /// Config for a given timer period
    pub fn for_timer_period(period: u16) -> Self {
        Self {
            sample_rate: timer_rate_hz(period),
            ..Default::default()
        }
    }

    /// Duplicate the mono mix into two channels
    pub fn stereo(mut self) -> Self {
        self.channels = 2;
        self
    }
}

/// Per-channel DAC levels as seen through the register stream
#[derive(Debug, Clone, Default)]
pub struct DacLevels {
    selected: u8,
    levels: [Option<u8>; PSG_CHANNELS as usize],
}

impl DacLevels {
    /// Create with every channel undriven
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one bus event into the channel state
    pub fn apply(&mut self, event: &BusEvent) {
        match *event {
            BusEvent::PsgSelect(ch) => self.selected = ch,
            BusEvent::PsgWaveform(value) => {
                if let Some(level) = self.levels.get_mut(self.selected as usize) {
                    *level = Some(value);
                }
            }
            _ => {}
        }
    }

    /// Held level of a channel, `None` until first driven
    pub fn level(&self, channel: u8) -> Option<u8> {
        self.levels.get(channel as usize).copied().flatten()
    }

    /// Average of every driven channel, silence when none is
    pub fn mix(&self) -> f32 {
        let (sum, driven) = self
            .levels
            .iter()
            .flatten()
            .fold((0.0f32, 0u32), |(sum, n), &v| (sum + dda_to_f32(v), n + 1));
        if driven == 0 {
            0.0
        } else {
            sum / driven as f32
        }
    }
}

/// Step the mixer `ticks` times and return one mixed sample per tick
///
/// `bus` must be the recorder the mixer writes to; its log is drained as the
/// render goes.
pub fn render_mixer(
    mixer: &MixerHandle<RecordingBus>,
    bus: &RecordingBus,
    ticks: usize,
) -> Vec<f32> {
    let mut dac = DacLevels::new();
    for event in bus.take() {
        dac.apply(&event);
    }

    let mut samples = Vec::with_capacity(ticks);
    for _ in 0..ticks {
        mixer.irq_step();
        for event in bus.take() {
            dac.apply(&event);
        }
        samples.push(dac.mix());
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixer::HEADER_GUARD;
    use approx::assert_relative_eq;

    #[test]
    fn test_dda_range() {
        assert_relative_eq!(dda_to_f32(0), -1.0);
        assert_relative_eq!(dda_to_f32(31), 1.0);
        assert_relative_eq!(dda_to_f32(0x3F), 1.0);
        assert!(dda_to_f32(16) > 0.0 && dda_to_f32(15) < 0.0);
    }

    #[test]
    fn test_reference_timer_rate() {
        assert_eq!(timer_rate_hz(1423), 1006);
        assert_eq!(ExportConfig::default().sample_rate, 1006);
        assert_eq!(ExportConfig::for_timer_period(0).sample_rate, TIMER_CLOCK_HZ);
    }

    #[test]
    fn test_levels_hold_after_stop() {
        let bus = RecordingBus::new();
        let mixer = MixerHandle::new(bus.clone(), 1);
        let mut sample = vec![31u8; HEADER_GUARD + 3];
        sample[2] = 0;
        mixer.load(0, sample).unwrap();
        mixer.start(0, 4, false).unwrap();

        let samples = render_mixer(&mixer, &bus, 6);
        assert_eq!(samples.len(), 6);
        assert_relative_eq!(samples[0], 1.0);
        assert_relative_eq!(samples[2], -1.0);
        // slot ended after three ticks, DAC keeps the last value
        assert_relative_eq!(samples[5], -1.0);
        assert!(!mixer.slot(0).unwrap().is_active());
    }

    #[test]
    fn test_two_channels_average() {
        let mut dac = DacLevels::new();
        for e in [
            BusEvent::PsgSelect(0),
            BusEvent::PsgWaveform(31),
            BusEvent::PsgSelect(1),
            BusEvent::PsgWaveform(0),
            BusEvent::IrqAck,
        ] {
            dac.apply(&e);
        }
        assert_eq!(dac.level(0), Some(31));
        assert_eq!(dac.level(2), None);
        assert_relative_eq!(dac.mix(), 0.0);
    }

    #[test]
    fn test_silence_without_slots() {
        let bus = RecordingBus::new();
        let mixer = MixerHandle::new(bus.clone(), 2);
        assert!(render_mixer(&mixer, &bus, 4).iter().all(|&s| s == 0.0));
    }
}
