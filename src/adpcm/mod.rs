//! KING ADPCM Hardware Driver
//!
//! Programs the two hardware ADPCM decoder channels for one-shot effects.
//! Playback is fire-and-forget: there is no per-channel stop, no completion
//! callback and no progress read-back. A new `play` simply overwrites the
//! channel registers, truncating whatever was playing.

pub mod registers;

pub use registers::{ChannelControl, KingRegister, PlayCommand};

use crate::assets::{ADPCM_HEADER_BYTES, KRAM_BLOCK_WORDS};
use crate::AudioError;
use serde::{Deserialize, Serialize};

/// Volume written to both sides of both channels at init
const ADPCM_INIT_VOLUME: u8 = 63;

/// KING chip access used by the ADPCM driver and the asset uploader
///
/// Implementations write straight to hardware; none of these calls can fail.
pub trait KingBus: Send {
    /// Select the register the next data write goes to
    fn select_register(&mut self, reg: KingRegister);

    /// Write a 16-bit value to the selected register
    fn write16(&mut self, value: u16);

    /// Write a 32-bit value to the selected register
    fn write32(&mut self, value: u32);

    /// Set the KRAM read pointer and auto-increment
    fn set_kram_read(&mut self, addr: u32, increment: u16);

    /// Set the KRAM write pointer and auto-increment
    fn set_kram_write(&mut self, addr: u32, increment: u16);

    /// Stream bytes into KRAM at the write pointer
    fn kram_write(&mut self, data: &[u8]);

    /// Program the sound box ADPCM control (decode rate, channel enables)
    fn set_adpcm_control(&mut self, rate: AdpcmRate, ch0_enabled: bool, ch1_enabled: bool);

    /// Set one ADPCM channel's left/right volume
    fn set_adpcm_volume(&mut self, channel: AdpcmChannel, left: u8, right: u8);
}

/// ADPCM decode rate
///
/// Only these four rates are representable in the command word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum AdpcmRate {
    /// 4 kHz
    Hz4000,
    /// 8 kHz
    Hz8000,
    /// 16 kHz
    Hz16000,
    /// 32 kHz
    Hz32000,
}

impl AdpcmRate {
    /// Look up a rate by its frequency in Hz
    pub fn from_hz(hz: u32) -> Option<Self> {
        match hz {
            4000 => Some(AdpcmRate::Hz4000),
            8000 => Some(AdpcmRate::Hz8000),
            16000 => Some(AdpcmRate::Hz16000),
            32000 => Some(AdpcmRate::Hz32000),
            _ => None,
        }
    }

    /// Frequency in Hz
    pub fn hz(&self) -> u32 {
        match self {
            AdpcmRate::Hz4000 => 4000,
            AdpcmRate::Hz8000 => 8000,
            AdpcmRate::Hz16000 => 16000,
            AdpcmRate::Hz32000 => 32000,
        }
    }

    /// Rate bits of the play command word (32 kHz is the all-clear default)
    pub fn command_bits(&self) -> PlayCommand {
        match self {
            AdpcmRate::Hz4000 => PlayCommand::RATE_4K,
            AdpcmRate::Hz8000 => PlayCommand::RATE_8K,
            AdpcmRate::Hz16000 => PlayCommand::RATE_16K,
            AdpcmRate::Hz32000 => PlayCommand::empty(),
        }
    }
}

impl TryFrom<u32> for AdpcmRate {
    type Error = AudioError;

    fn try_from(hz: u32) -> Result<Self, Self::Error> {
        Self::from_hz(hz).ok_or_else(|| {
            AudioError::Config(format!(
                "unsupported ADPCM rate {hz} Hz (expected 4000, 8000, 16000 or 32000)"
            ))
        })
    }
}

impl From<AdpcmRate> for u32 {
    fn from(rate: AdpcmRate) -> Self {
        rate.hz()
    }
}

/// Hardware ADPCM channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum AdpcmChannel {
    /// Channel 0
    Ch0,
    /// Channel 1
    Ch1,
}

impl AdpcmChannel {
    /// Map a raw channel id, anything other than 1 lands on channel 0
    pub fn from_raw(id: u32) -> Self {
        if id == 1 {
            AdpcmChannel::Ch1
        } else {
            AdpcmChannel::Ch0
        }
    }

    /// Channel index
    pub fn index(&self) -> u8 {
        match self {
            AdpcmChannel::Ch0 => 0,
            AdpcmChannel::Ch1 => 1,
        }
    }

    fn control_register(&self) -> KingRegister {
        match self {
            AdpcmChannel::Ch0 => KingRegister::Ch0Control,
            AdpcmChannel::Ch1 => KingRegister::Ch1Control,
        }
    }

    fn start_register(&self) -> KingRegister {
        match self {
            AdpcmChannel::Ch0 => KingRegister::Ch0Start,
            AdpcmChannel::Ch1 => KingRegister::Ch1Start,
        }
    }

    fn end_register(&self) -> KingRegister {
        match self {
            AdpcmChannel::Ch0 => KingRegister::Ch0End,
            AdpcmChannel::Ch1 => KingRegister::Ch1End,
        }
    }
}

impl TryFrom<u8> for AdpcmChannel {
    type Error = AudioError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        match id {
            0 => Ok(AdpcmChannel::Ch0),
            1 => Ok(AdpcmChannel::Ch1),
            _ => Err(AudioError::Config(format!(
                "ADPCM channel {id} does not exist (expected 0 or 1)"
            ))),
        }
    }
}

impl From<AdpcmChannel> for u8 {
    fn from(channel: AdpcmChannel) -> Self {
        channel.index()
    }
}

/// Start register value: KRAM word address in blocks
///
/// The register is 16 bits wide, so the page tag falls off.
pub fn start_pointer(start_address: u32) -> u16 {
    (start_address / KRAM_BLOCK_WORDS) as u16
}

/// End register value: absolute word address of the last audio word
///
/// The encoded header is not audio; what remains is two bytes per word.
pub fn end_pointer(start_address: u32, byte_length: usize) -> u32 {
    let audio_words = (byte_length.saturating_sub(ADPCM_HEADER_BYTES) >> 1) as u32;
    start_address.wrapping_add(audio_words)
}

/// Two-channel ADPCM driver
#[derive(Debug)]
pub struct AdpcmDriver<K: KingBus> {
    king: K,
}

impl<K: KingBus> AdpcmDriver<K> {
    /// Wrap a KING bus
    pub fn new(king: K) -> Self {
        AdpcmDriver { king }
    }

    /// Power-on setup: decode rate, both channels enabled at full volume,
    /// both channels in sequential mode with interrupts off
    pub fn init(&mut self, rate: AdpcmRate) {
        self.king.set_adpcm_control(rate, true, true);
        self.king
            .set_adpcm_volume(AdpcmChannel::Ch0, ADPCM_INIT_VOLUME, ADPCM_INIT_VOLUME);
        self.king
            .set_adpcm_volume(AdpcmChannel::Ch1, ADPCM_INIT_VOLUME, ADPCM_INIT_VOLUME);

        self.king.select_register(KingRegister::Ch0Control);
        self.king.write16(ChannelControl::empty().bits());
        self.king.select_register(KingRegister::Ch1Control);
        self.king.write16(ChannelControl::empty().bits());
    }

    /// Play a clip on one channel
    ///
    /// The command word always enables BOTH channels, whichever one was
    /// programmed. The other channel restarts from its last programmed range.
    pub fn play(
        &mut self,
        channel: AdpcmChannel,
        start_address: u32,
        byte_length: usize,
        looped: bool,
        rate: AdpcmRate,
    ) {
        self.king.set_kram_read(start_address, 1);

        let control = if looped {
            ChannelControl::RING_BUFFER
        } else {
            ChannelControl::empty()
        };
        self.king.select_register(channel.control_register());
        self.king.write16(control.bits());

        self.king.select_register(channel.start_register());
        self.king.write16(start_pointer(start_address));

        self.king.select_register(channel.end_register());
        self.king.write32(end_pointer(start_address, byte_length));

        let command = PlayCommand::CH0_ENABLE | PlayCommand::CH1_ENABLE | rate.command_bits();
        self.king.select_register(KingRegister::AdpcmPlay);
        self.king.write16(command.bits());
    }

    /// Clear loop flags and address registers of both channels and the play command
    pub fn reset(&mut self) {
        self.king.select_register(KingRegister::Ch1Control);
        self.king.write16(0);
        self.king.select_register(KingRegister::Ch1Start);
        self.king.write16(0);

        self.king.select_register(KingRegister::Ch0Control);
        self.king.write16(0);
        self.king.select_register(KingRegister::Ch0Start);
        self.king.write16(0);

        self.king.select_register(KingRegister::Ch1End);
        self.king.write32(0);
        self.king.select_register(KingRegister::Ch0End);
        self.king.write32(0);

        self.king.select_register(KingRegister::AdpcmPlay);
        self.king.write16(0);
    }

    /// Access the underlying bus (asset upload shares it)
    pub fn bus_mut(&mut self) -> &mut K {
        &mut self.king
    }
}
