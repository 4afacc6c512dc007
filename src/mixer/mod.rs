//! PSG Playback Slot Mixer
//!
//! Plays raw 5-bit samples through PSG channels in direct-DAC mode. Every timer
//! interrupt (in mix mode) writes one byte per active slot to its channel's
//! waveform register, so the sample rate is the timer rate.
//!
//! ## Sharing with the interrupt handler
//!
//! Slot state and the PSG bus live behind one lock. The main loop holds it for
//! a whole start sequence (configure, then enable), so the handler never sees
//! a half-configured channel and never interleaves its select/write pair with
//! the main loop's. The handler only ever `try_lock`s: if the main loop holds
//! the lock the tick is skipped rather than waited for.

pub mod slot;

pub use slot::PlaybackSlot;

use crate::{AudioError, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// Trailing bytes of every mixer sample that are never played
pub const HEADER_GUARD: usize = 2048;

/// Number of PSG channels
pub const PSG_CHANNELS: u8 = 6;

const PSG_MAIN_VOLUME: u8 = 15;
const PSG_CHANNEL_VOLUME: u8 = 31;
const PSG_BALANCE: u8 = 15;

/// PSG register access
///
/// Implementations write straight to hardware; none of these calls can fail.
pub trait PsgBus: Send {
    /// Set the global left/right volume
    fn set_main_volume(&mut self, left: u8, right: u8);

    /// Select the channel the following writes address
    fn select_channel(&mut self, channel: u8);

    /// Set the selected channel's volume, enable and direct-DAC flags
    fn set_channel_volume(&mut self, volume: u8, enabled: bool, direct_dac: bool);

    /// Set the selected channel's left/right balance
    fn set_balance(&mut self, left: u8, right: u8);

    /// Set the selected channel's frequency divider
    fn set_frequency(&mut self, frequency: u16);

    /// Configure the selected channel's noise generator
    fn set_noise(&mut self, enabled: bool, frequency: u8);

    /// Write one value to the selected channel's waveform register
    fn write_waveform(&mut self, value: u8);
}

/// Slot array plus the PSG it drives
#[derive(Debug)]
pub struct SlotMixer<P: PsgBus> {
    psg: P,
    slots: Vec<PlaybackSlot>,
}

impl<P: PsgBus> SlotMixer<P> {
    /// Create a mixer with `slot_count` inactive slots
    pub fn new(psg: P, slot_count: usize) -> Self {
        SlotMixer {
            psg,
            slots: vec![PlaybackSlot::new(); slot_count],
        }
    }

    /// Number of slots
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Inspect a slot
    pub fn slot(&self, index: usize) -> Option<&PlaybackSlot> {
        self.slots.get(index)
    }

    /// Attach a sample to a slot, stopping it
    pub fn load(&mut self, index: usize, sample: impl Into<Arc<[u8]>>) -> Result<()> {
        let sample = sample.into();
        if sample.len() <= HEADER_GUARD + 1 {
            return Err(AudioError::Asset(format!(
                "mixer sample of {} bytes is too short (needs more than {})",
                sample.len(),
                HEADER_GUARD + 1
            )));
        }
        self.slot_mut(index)?.load(sample);
        Ok(())
    }

    /// Configure `channel` for direct-DAC playback and start the slot from byte 0
    pub fn start(&mut self, index: usize, channel: u8, looped: bool) -> Result<()> {
        if channel >= PSG_CHANNELS {
            return Err(AudioError::Config(format!(
                "PSG channel {channel} does not exist (0-{})",
                PSG_CHANNELS - 1
            )));
        }
        if !self.slot_mut(index)?.has_sample() {
            return Err(AudioError::Asset(format!("slot {index} has no sample loaded")));
        }

        self.psg.set_main_volume(PSG_MAIN_VOLUME, PSG_MAIN_VOLUME);
        self.psg.select_channel(channel);
        self.psg.set_channel_volume(PSG_CHANNEL_VOLUME, true, true);
        self.psg.set_balance(PSG_BALANCE, PSG_BALANCE);
        self.psg.set_frequency(0);
        self.psg.set_noise(false, 0);

        self.slots[index].start(channel, looped);
        Ok(())
    }

    /// Deactivate a slot
    ///
    /// The channel is not silenced; it holds the last value written to it.
    pub fn stop(&mut self, index: usize) -> Result<()> {
        self.slot_mut(index)?.stop();
        Ok(())
    }

    /// One mixer tick: one byte per active slot
    pub fn step(&mut self) {
        let psg = &mut self.psg;
        for slot in self.slots.iter_mut() {
            slot.step(psg);
        }
    }

    fn slot_mut(&mut self, index: usize) -> Result<&mut PlaybackSlot> {
        let available = self.slots.len();
        self.slots
            .get_mut(index)
            .ok_or(AudioError::InvalidSlot { index, available })
    }
}

/// Shared handle to a mixer, one clone for the main loop and one for the handler
#[derive(Debug)]
pub struct MixerHandle<P: PsgBus> {
    inner: Arc<Mutex<SlotMixer<P>>>,
}

impl<P: PsgBus> Clone for MixerHandle<P> {
    fn clone(&self) -> Self {
        MixerHandle {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: PsgBus> MixerHandle<P> {
    /// Wrap a new mixer
    pub fn new(psg: P, slot_count: usize) -> Self {
        MixerHandle {
            inner: Arc::new(Mutex::new(SlotMixer::new(psg, slot_count))),
        }
    }

    /// See [`SlotMixer::load`]
    pub fn load(&self, index: usize, sample: impl Into<Arc<[u8]>>) -> Result<()> {
        self.inner.lock().load(index, sample)
    }

    /// See [`SlotMixer::start`]
    pub fn start(&self, index: usize, channel: u8, looped: bool) -> Result<()> {
        self.inner.lock().start(index, channel, looped)
    }

    /// See [`SlotMixer::stop`]
    pub fn stop(&self, index: usize) -> Result<()> {
        self.inner.lock().stop(index)
    }

    /// Snapshot of a slot
    pub fn slot(&self, index: usize) -> Option<PlaybackSlot> {
        self.inner.lock().slot(index).cloned()
    }

    /// Number of slots
    pub fn slot_count(&self) -> usize {
        self.inner.lock().slot_count()
    }

    /// Interrupt-side tick. Never blocks; returns false when the tick was skipped.
    #[inline]
    pub fn irq_step(&self) -> bool {
        match self.inner.try_lock() {
            Some(mut mixer) => {
                mixer.step();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BusEvent, RecordingBus};

    const LEN: usize = HEADER_GUARD + 16;

    fn ramp(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 32) as u8).collect()
    }

    fn loaded_mixer(bus: &RecordingBus) -> SlotMixer<RecordingBus> {
        let mut mixer = SlotMixer::new(bus.clone(), 1);
        mixer.load(0, ramp(LEN)).unwrap();
        mixer
    }

    #[test]
    fn test_start_configures_channel_before_enabling() {
        let bus = RecordingBus::new();
        let mut mixer = loaded_mixer(&bus);
        mixer.start(0, 3, false).unwrap();

        assert_eq!(
            bus.events(),
            vec![
                BusEvent::PsgMainVolume { left: 15, right: 15 },
                BusEvent::PsgSelect(3),
                BusEvent::PsgChannelVolume { volume: 31, enabled: true, direct_dac: true },
                BusEvent::PsgBalance { left: 15, right: 15 },
                BusEvent::PsgFrequency(0),
                BusEvent::PsgNoise { enabled: false, frequency: 0 },
            ]
        );
        let slot = mixer.slot(0).unwrap();
        assert!(slot.is_active());
        assert_eq!(slot.position(), 0);
        assert_eq!(slot.channel(), 3);
    }

    #[test]
    fn test_one_shot_runs_exactly_end_ticks() {
        let bus = RecordingBus::new();
        let mut mixer = loaded_mixer(&bus);
        mixer.start(0, 0, false).unwrap();
        bus.clear();

        let end = LEN - HEADER_GUARD;
        for tick in 0..end {
            assert!(mixer.slot(0).unwrap().is_active(), "inactive early at tick {tick}");
            mixer.step();
        }
        assert!(!mixer.slot(0).unwrap().is_active());
        assert_eq!(bus.waveform(), ramp(end));

        for _ in 0..100 {
            mixer.step();
        }
        assert!(!mixer.slot(0).unwrap().is_active());
        assert_eq!(bus.waveform().len(), end);
    }

    #[test]
    fn test_loop_wraps_to_index_one() {
        let bus = RecordingBus::new();
        let mut mixer = loaded_mixer(&bus);
        mixer.start(0, 0, true).unwrap();
        bus.clear();

        let end = LEN - HEADER_GUARD;
        for _ in 0..end * 10 {
            mixer.step();
            assert!(mixer.slot(0).unwrap().is_active());
            assert_ne!(mixer.slot(0).unwrap().position(), 0);
        }

        let written = bus.waveform();
        // first pass plays byte 0, later passes start at byte 1
        assert_eq!(written[0], 0);
        assert_eq!(&written[end..end + 3], &[1, 2, 3]);
        assert!(!written[1..].contains(&0));
    }

    #[test]
    fn test_stop_issues_no_register_writes() {
        let bus = RecordingBus::new();
        let mut mixer = loaded_mixer(&bus);
        mixer.start(0, 0, true).unwrap();
        mixer.step();
        bus.clear();

        mixer.stop(0).unwrap();
        mixer.step();

        assert!(bus.events().is_empty());
        assert!(!mixer.slot(0).unwrap().is_active());
    }

    #[test]
    fn test_restart_after_completion() {
        let bus = RecordingBus::new();
        let mut mixer = loaded_mixer(&bus);
        mixer.start(0, 0, false).unwrap();
        for _ in 0..LEN {
            mixer.step();
        }
        mixer.start(0, 0, false).unwrap();
        assert!(mixer.slot(0).unwrap().is_active());
        assert_eq!(mixer.slot(0).unwrap().position(), 0);
    }

    #[test]
    fn test_every_slot_mixes_each_tick() {
        let bus = RecordingBus::new();
        let mut mixer = SlotMixer::new(bus.clone(), 2);
        mixer.load(0, vec![7u8; LEN]).unwrap();
        mixer.load(1, vec![9u8; LEN]).unwrap();
        mixer.start(0, 0, false).unwrap();
        mixer.start(1, 1, false).unwrap();
        bus.clear();

        mixer.step();
        assert_eq!(
            bus.events(),
            vec![
                BusEvent::PsgSelect(0),
                BusEvent::PsgWaveform(7),
                BusEvent::PsgSelect(1),
                BusEvent::PsgWaveform(9),
            ]
        );
    }

    #[test]
    fn test_invalid_requests_rejected() {
        let bus = RecordingBus::new();
        let mut mixer = SlotMixer::new(bus.clone(), 1);

        assert!(matches!(
            mixer.start(3, 0, false),
            Err(AudioError::InvalidSlot { index: 3, available: 1 })
        ));
        assert!(mixer.start(0, 0, false).is_err(), "no sample loaded");
        assert!(mixer.load(0, vec![0u8; HEADER_GUARD]).is_err());

        mixer.load(0, ramp(LEN)).unwrap();
        assert!(mixer.start(0, PSG_CHANNELS, false).is_err());
        assert!(bus.events().is_empty());
    }

    #[test]
    fn test_irq_step_skips_when_locked() {
        let bus = RecordingBus::new();
        let handle = MixerHandle::new(bus.clone(), 1);
        handle.load(0, ramp(LEN)).unwrap();
        handle.start(0, 0, false).unwrap();
        bus.clear();

        let guard = handle.inner.lock();
        assert!(!handle.irq_step());
        drop(guard);

        assert!(handle.irq_step());
        assert_eq!(bus.waveform(), vec![0]);
        assert_eq!(handle.slot(0).unwrap().position(), 1);
    }
}
