//! Recording Bus
//!
//! In-memory stand-in for every hardware bus. Each register-level operation is
//! appended to a shared log in call order; clones share the log, so one
//! recorder handed to all four backends captures their global interleaving.

use crate::adpcm::{AdpcmChannel, AdpcmRate, KingBus, KingRegister};
use crate::cdda::CdBus;
use crate::mixer::PsgBus;
use crate::timer::TimerBus;
use parking_lot::Mutex;
use std::sync::Arc;

/// Bytes per disc sector
pub const SECTOR_SIZE: usize = 2048;

/// One recorded hardware operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    // PSG
    /// Global PSG volume
    PsgMainVolume {
        /// Left
        left: u8,
        /// Right
        right: u8,
    },
    /// PSG channel select
    PsgSelect(u8),
    /// PSG channel volume
    PsgChannelVolume {
        /// Volume
        volume: u8,
        /// Channel enable
        enabled: bool,
        /// Direct-DAC mode
        direct_dac: bool,
    },
    /// PSG channel balance
    PsgBalance {
        /// Left
        left: u8,
        /// Right
        right: u8,
    },
    /// PSG channel frequency
    PsgFrequency(u16),
    /// PSG channel noise
    PsgNoise {
        /// Noise enable
        enabled: bool,
        /// Noise frequency
        frequency: u8,
    },
    /// PSG waveform register write
    PsgWaveform(u8),

    // KING
    /// KING register select
    SelectRegister(KingRegister),
    /// 16-bit KING data write
    Write16(u16),
    /// 32-bit KING data write
    Write32(u32),
    /// KRAM read pointer
    KramReadAddress {
        /// Address
        addr: u32,
        /// Auto-increment
        increment: u16,
    },
    /// KRAM write pointer
    KramWriteAddress {
        /// Address
        addr: u32,
        /// Auto-increment
        increment: u16,
    },
    /// Bulk KRAM write
    KramWrite {
        /// Byte count
        len: usize,
    },
    /// Sound box ADPCM control
    AdpcmControl {
        /// Decode rate
        rate: AdpcmRate,
        /// Channel 0 enable
        ch0: bool,
        /// Channel 1 enable
        ch1: bool,
    },
    /// Sound box ADPCM channel volume
    AdpcmVolume {
        /// Channel
        channel: AdpcmChannel,
        /// Left
        left: u8,
        /// Right
        right: u8,
    },

    // CD
    /// SCSI command block
    ScsiCommand(Vec<u8>),
    /// SCSI status read
    ScsiStatus,
    /// CD-DA volume
    CddaVolume {
        /// Left
        left: u8,
        /// Right
        right: u8,
    },
    /// Disc sector read
    DiscRead {
        /// Logical block
        lba: u32,
        /// Byte count
        len: usize,
    },

    // Timer
    /// Interrupt mask write
    IrqMask(u8),
    /// Timer reset
    TimerInit,
    /// Timer period
    TimerPeriod(u16),
    /// Timer start
    TimerStart {
        /// Interrupt generation
        irq_enabled: bool,
    },
    /// CPU interrupt level
    IrqLevel(u8),
    /// CPU interrupts enabled
    IrqEnable,
    /// Timer interrupt acknowledged
    IrqAck,
}

impl BusEvent {
    /// True for operations that write hardware state (everything but status polls and reads)
    pub fn is_write(&self) -> bool {
        !matches!(self, BusEvent::ScsiStatus | BusEvent::DiscRead { .. })
    }
}

/// Shared-log recorder implementing every bus trait
#[derive(Debug, Clone, Default)]
pub struct RecordingBus {
    log: Arc<Mutex<Vec<BusEvent>>>,
    disc: Arc<[u8]>,
}

impl RecordingBus {
    /// Create an empty recorder with a blank disc
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a recorder whose disc reads come from `image`
    ///
    /// Reads past the end of the image return zeros.
    pub fn with_disc_image(image: impl Into<Arc<[u8]>>) -> Self {
        RecordingBus {
            log: Arc::default(),
            disc: image.into(),
        }
    }

    /// Snapshot of the log
    pub fn events(&self) -> Vec<BusEvent> {
        self.log.lock().clone()
    }

    /// Drain the log
    pub fn take(&self) -> Vec<BusEvent> {
        std::mem::take(&mut *self.log.lock())
    }

    /// Empty the log
    pub fn clear(&self) {
        self.log.lock().clear();
    }

    /// Number of recorded events matching `pred`
    pub fn count(&self, pred: impl Fn(&BusEvent) -> bool) -> usize {
        self.log.lock().iter().filter(|e| pred(e)).count()
    }

    /// Number of recorded hardware writes
    pub fn write_count(&self) -> usize {
        self.count(BusEvent::is_write)
    }

    /// All SCSI command blocks issued, in order
    pub fn scsi_commands(&self) -> Vec<Vec<u8>> {
        self.log
            .lock()
            .iter()
            .filter_map(|e| match e {
                BusEvent::ScsiCommand(cdb) => Some(cdb.clone()),
                _ => None,
            })
            .collect()
    }

    /// All values written to PSG waveform registers, in order
    pub fn waveform(&self) -> Vec<u8> {
        self.log
            .lock()
            .iter()
            .filter_map(|e| match e {
                BusEvent::PsgWaveform(v) => Some(*v),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: BusEvent) {
        self.log.lock().push(event);
    }
}

impl PsgBus for RecordingBus {
    fn set_main_volume(&mut self, left: u8, right: u8) {
        self.push(BusEvent::PsgMainVolume { left, right });
    }

    fn select_channel(&mut self, channel: u8) {
        self.push(BusEvent::PsgSelect(channel));
    }

    fn set_channel_volume(&mut self, volume: u8, enabled: bool, direct_dac: bool) {
        self.push(BusEvent::PsgChannelVolume {
            volume,
            enabled,
            direct_dac,
        });
    }

    fn set_balance(&mut self, left: u8, right: u8) {
        self.push(BusEvent::PsgBalance { left, right });
    }

    fn set_frequency(&mut self, frequency: u16) {
        self.push(BusEvent::PsgFrequency(frequency));
    }

    fn set_noise(&mut self, enabled: bool, frequency: u8) {
        self.push(BusEvent::PsgNoise { enabled, frequency });
    }

    fn write_waveform(&mut self, value: u8) {
        self.push(BusEvent::PsgWaveform(value));
    }
}

impl KingBus for RecordingBus {
    fn select_register(&mut self, reg: KingRegister) {
        self.push(BusEvent::SelectRegister(reg));
    }

    fn write16(&mut self, value: u16) {
        self.push(BusEvent::Write16(value));
    }

    fn write32(&mut self, value: u32) {
        self.push(BusEvent::Write32(value));
    }

    fn set_kram_read(&mut self, addr: u32, increment: u16) {
        self.push(BusEvent::KramReadAddress { addr, increment });
    }

    fn set_kram_write(&mut self, addr: u32, increment: u16) {
        self.push(BusEvent::KramWriteAddress { addr, increment });
    }

    fn kram_write(&mut self, data: &[u8]) {
        self.push(BusEvent::KramWrite { len: data.len() });
    }

    fn set_adpcm_control(&mut self, rate: AdpcmRate, ch0_enabled: bool, ch1_enabled: bool) {
        self.push(BusEvent::AdpcmControl {
            rate,
            ch0: ch0_enabled,
            ch1: ch1_enabled,
        });
    }

    fn set_adpcm_volume(&mut self, channel: AdpcmChannel, left: u8, right: u8) {
        self.push(BusEvent::AdpcmVolume {
            channel,
            left,
            right,
        });
    }
}

impl CdBus for RecordingBus {
    fn command(&mut self, cdb: &[u8]) {
        self.push(BusEvent::ScsiCommand(cdb.to_vec()));
    }

    fn status(&mut self) -> u8 {
        self.push(BusEvent::ScsiStatus);
        0
    }

    fn set_cdda_volume(&mut self, left: u8, right: u8) {
        self.push(BusEvent::CddaVolume { left, right });
    }

    fn read(&mut self, lba: u32, buf: &mut [u8]) {
        self.push(BusEvent::DiscRead {
            lba,
            len: buf.len(),
        });
        let start = (lba as usize).saturating_mul(SECTOR_SIZE);
        let available = self.disc.get(start..).unwrap_or(&[]);
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        buf[n..].fill(0);
    }
}

impl TimerBus for RecordingBus {
    fn set_irq_mask(&mut self, mask: u8) {
        self.push(BusEvent::IrqMask(mask));
    }

    fn init(&mut self) {
        self.push(BusEvent::TimerInit);
    }

    fn set_period(&mut self, period: u16) {
        self.push(BusEvent::TimerPeriod(period));
    }

    fn start(&mut self, irq_enabled: bool) {
        self.push(BusEvent::TimerStart { irq_enabled });
    }

    fn set_irq_level(&mut self, level: u8) {
        self.push(BusEvent::IrqLevel(level));
    }

    fn enable_irqs(&mut self) {
        self.push(BusEvent::IrqEnable);
    }

    fn ack_irq(&mut self) {
        self.push(BusEvent::IrqAck);
    }
}
