//! KING ADPCM Register Definitions
//!
//! KING registers are written in two steps: the register number goes to the
//! select port, then the value goes to the data port. A write is only complete
//! once both halves have landed, so two writers must never interleave.

use bitflags::bitflags;
use std::fmt;

/// KING register address used by the ADPCM driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KingRegister {
    /// ADPCM play command word - 0x50
    AdpcmPlay = 0x50,
    /// Channel 0 control (buffer mode, interrupts) - 0x51
    Ch0Control = 0x51,
    /// Channel 1 control (buffer mode, interrupts) - 0x52
    Ch1Control = 0x52,
    /// Channel 0 start address, in KRAM blocks - 0x58
    Ch0Start = 0x58,
    /// Channel 0 end address, absolute - 0x59
    Ch0End = 0x59,
    /// Channel 1 start address, in KRAM blocks - 0x5C
    Ch1Start = 0x5C,
    /// Channel 1 end address, absolute - 0x5D
    Ch1End = 0x5D,
}

impl KingRegister {
    /// Convert a raw register number to KingRegister
    pub fn from_addr(addr: u16) -> Option<Self> {
        match addr {
            0x50 => Some(KingRegister::AdpcmPlay),
            0x51 => Some(KingRegister::Ch0Control),
            0x52 => Some(KingRegister::Ch1Control),
            0x58 => Some(KingRegister::Ch0Start),
            0x59 => Some(KingRegister::Ch0End),
            0x5C => Some(KingRegister::Ch1Start),
            0x5D => Some(KingRegister::Ch1End),
            _ => None,
        }
    }

    /// Get the register address value
    pub fn addr(&self) -> u16 {
        *self as u16
    }
}

impl fmt::Display for KingRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KingRegister::AdpcmPlay => write!(f, "0x50 (ADPCM Play)"),
            KingRegister::Ch0Control => write!(f, "0x51 (Channel 0 Control)"),
            KingRegister::Ch1Control => write!(f, "0x52 (Channel 1 Control)"),
            KingRegister::Ch0Start => write!(f, "0x58 (Channel 0 Start)"),
            KingRegister::Ch0End => write!(f, "0x59 (Channel 0 End)"),
            KingRegister::Ch1Start => write!(f, "0x5C (Channel 1 Start)"),
            KingRegister::Ch1End => write!(f, "0x5D (Channel 1 End)"),
        }
    }
}

bitflags! {
    /// ADPCM play command word (register 0x50)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PlayCommand: u16 {
        /// Channel 0 playback enable
        const CH0_ENABLE = 0x01;
        /// Channel 1 playback enable
        const CH1_ENABLE = 0x02;
        /// 16 kHz decode rate
        const RATE_16K = 0x04;
        /// 8 kHz decode rate
        const RATE_8K = 0x08;
        /// 4 kHz decode rate
        const RATE_4K = 0x10;
    }
}

bitflags! {
    /// Per-channel control register (0x51 / 0x52)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChannelControl: u16 {
        /// Ring buffer mode: the clip loops. Cleared = sequential, plays once
        const RING_BUFFER = 0x01;
        /// Raise an interrupt at the end address
        const END_IRQ = 0x02;
        /// Raise an interrupt at the intermediate address
        const INTERMEDIATE_IRQ = 0x04;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_conversion() {
        assert_eq!(KingRegister::from_addr(0x50), Some(KingRegister::AdpcmPlay));
        assert_eq!(KingRegister::from_addr(0x5D), Some(KingRegister::Ch1End));
        assert_eq!(KingRegister::from_addr(0x5A), None);
        assert_eq!(KingRegister::Ch1Start.addr(), 0x5C);
    }

    #[test]
    fn test_register_display() {
        assert_eq!(KingRegister::Ch0End.to_string(), "0x59 (Channel 0 End)");
    }
}
