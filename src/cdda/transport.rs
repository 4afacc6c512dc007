//! SCSI track commands with settle delay

use super::{CdBus, EndMode};

/// Idle iterations after each transport command
///
/// Empirical settle time of the drive. This is a latency budget, not a
/// handshake: the main loop is blocked for the whole spin, so every music
/// change costs two of these against the frame budget.
pub const CD_SETTLE_SPINS: u32 = 0x800;

/// Vendor command: play from start track
const CMD_PLAY_START_TRACK: u8 = 0xD8;
/// Vendor command: set end track and end behavior
const CMD_PLAY_END_TRACK: u8 = 0xD9;
/// Addressing byte: operands are track numbers
const ADDR_TRACK: u8 = 0x80;

const CDB_LEN: usize = 10;

/// CD drive transport
#[derive(Debug)]
pub struct CdTransport<C: CdBus> {
    bus: C,
    settle_spins: u32,
}

impl<C: CdBus> CdTransport<C> {
    /// Create a transport with the standard settle delay
    pub fn new(bus: C) -> Self {
        Self::with_settle_spins(bus, CD_SETTLE_SPINS)
    }

    /// Create a transport with a custom settle delay
    pub fn with_settle_spins(bus: C, settle_spins: u32) -> Self {
        CdTransport { bus, settle_spins }
    }

    /// Start playback at `track`
    pub fn start_track(&mut self, track: u8) {
        let cdb = Self::track_cdb(CMD_PLAY_START_TRACK, 0x00, track);
        self.issue(&cdb);
    }

    /// Set the end track and what happens when playback reaches it
    pub fn end_track(&mut self, track: u8, mode: EndMode) {
        let cdb = Self::track_cdb(CMD_PLAY_END_TRACK, mode.code(), track);
        self.issue(&cdb);
    }

    /// Set the CD-DA output volume
    pub fn set_volume(&mut self, left: u8, right: u8) {
        self.bus.set_cdda_volume(left, right);
    }

    /// Settle delay in idle iterations
    pub fn settle_spins(&self) -> u32 {
        self.settle_spins
    }

    /// Access the underlying bus
    pub fn bus_mut(&mut self) -> &mut C {
        &mut self.bus
    }

    fn track_cdb(opcode: u8, mode: u8, track: u8) -> [u8; CDB_LEN] {
        let mut cdb = [0u8; CDB_LEN];
        cdb[0] = opcode;
        cdb[1] = mode;
        cdb[2] = track;
        cdb[9] = ADDR_TRACK;
        cdb
    }

    fn issue(&mut self, cdb: &[u8]) {
        self.bus.command(cdb);
        for _ in 0..self.settle_spins {
            std::hint::spin_loop();
        }
        let _ = self.bus.status();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BusEvent, RecordingBus};

    #[test]
    fn test_start_track_command_block() {
        let bus = RecordingBus::new();
        let mut transport = CdTransport::with_settle_spins(bus.clone(), 0);
        transport.start_track(5);

        assert_eq!(
            bus.events(),
            vec![
                BusEvent::ScsiCommand(vec![0xD8, 0, 5, 0, 0, 0, 0, 0, 0, 0x80]),
                BusEvent::ScsiStatus,
            ]
        );
    }

    #[test]
    fn test_end_track_carries_mode() {
        let bus = RecordingBus::new();
        let mut transport = CdTransport::with_settle_spins(bus.clone(), 0);
        transport.end_track(6, EndMode::Loop);
        transport.end_track(5, EndMode::NormalStop);

        assert_eq!(
            bus.scsi_commands(),
            vec![
                vec![0xD9, 0x04, 6, 0, 0, 0, 0, 0, 0, 0x80],
                vec![0xD9, 0x03, 5, 0, 0, 0, 0, 0, 0, 0x80],
            ]
        );
    }

    #[test]
    fn test_default_settle_delay() {
        let transport = CdTransport::new(RecordingBus::new());
        assert_eq!(transport.settle_spins(), 2048);
    }

    #[test]
    fn test_status_polled_after_every_command() {
        let bus = RecordingBus::new();
        let mut transport = CdTransport::new(bus.clone());
        transport.start_track(2);
        transport.end_track(3, EndMode::Loop);

        let events = bus.events();
        assert_eq!(events.len(), 4);
        assert_eq!(events[1], BusEvent::ScsiStatus);
        assert_eq!(events[3], BusEvent::ScsiStatus);
    }
}
