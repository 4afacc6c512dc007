//! Playback slot cursor

use super::{PsgBus, HEADER_GUARD};
use std::sync::Arc;

/// Software sample cursor driven one byte per mixer tick
#[derive(Debug, Clone, Default)]
pub struct PlaybackSlot {
    sample: Option<Arc<[u8]>>,
    position: usize,
    active: bool,
    looped: bool,
    channel: u8,
}

impl PlaybackSlot {
    /// Create an inactive, empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Is the slot being played?
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Next byte index to be written
    pub fn position(&self) -> usize {
        self.position
    }

    /// Does the slot wrap at the end?
    pub fn is_looped(&self) -> bool {
        self.looped
    }

    /// PSG channel the slot drives
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Loaded sample length in bytes (0 when empty)
    pub fn sample_len(&self) -> usize {
        self.sample.as_ref().map_or(0, |s| s.len())
    }

    /// Index at which playback wraps or ends
    pub fn end(&self) -> usize {
        self.sample_len().saturating_sub(HEADER_GUARD)
    }

    pub(super) fn has_sample(&self) -> bool {
        self.sample.is_some()
    }

    pub(super) fn load(&mut self, sample: Arc<[u8]>) {
        self.sample = Some(sample);
        self.active = false;
        self.position = 0;
    }

    pub(super) fn start(&mut self, channel: u8, looped: bool) {
        self.channel = channel;
        self.looped = looped;
        self.position = 0;
        self.active = true;
    }

    pub(super) fn stop(&mut self) {
        self.active = false;
    }

    /// Write one byte and advance
    ///
    /// On wrap the cursor resumes at 1: byte 0 only ever plays on a fresh start.
    #[inline]
    pub(super) fn step<P: PsgBus>(&mut self, psg: &mut P) {
        if !self.active {
            return;
        }
        let Some(sample) = self.sample.as_ref() else {
            self.active = false;
            return;
        };

        psg.select_channel(self.channel);
        psg.write_waveform(sample[self.position]);
        self.position += 1;

        if self.position >= self.end() {
            if self.looped {
                self.position = 1;
            } else {
                self.active = false;
            }
        }
    }
}
