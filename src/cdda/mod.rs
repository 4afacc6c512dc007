//! CD-DA Transport Sequencer
//!
//! Background music streams straight off the disc as redbook audio. Playing a
//! segment takes two vendor SCSI commands: one selecting the start track and one
//! selecting the end track together with what happens when it is reached.
//!
//! The drive gives no acknowledgment the host can wait on. After every command
//! the main loop spins for a fixed, empirically sized settle delay before it
//! reads the status byte; without it the drive locks up the application.

pub mod sequencer;
pub mod transport;

pub use sequencer::{MusicCommand, MusicMode, MusicSequencer, MusicTracks, TrackRotation};
pub use transport::{CdTransport, CD_SETTLE_SPINS};

use serde::{Deserialize, Serialize};

/// CD drive and sound box access
///
/// Implementations write straight to hardware; none of these calls can fail.
pub trait CdBus: Send {
    /// Issue a raw SCSI command block
    fn command(&mut self, cdb: &[u8]);

    /// Read the SCSI status byte
    fn status(&mut self) -> u8;

    /// Set the CD-DA output volume
    fn set_cdda_volume(&mut self, left: u8, right: u8);

    /// Read `buf.len()` bytes starting at a logical block
    fn read(&mut self, lba: u32, buf: &mut [u8]);
}

/// What the drive does when the end track is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndMode {
    /// Stop and output silence
    Silent = 0x00,
    /// Stop normally
    NormalStop = 0x03,
    /// Jump back to the start track
    Loop = 0x04,
}

impl EndMode {
    /// Mode byte as sent in the end-track command
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

/// One segment of disc music
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackTriple {
    /// First track played
    pub start: u8,
    /// Track at which `end_mode` applies
    pub end: u8,
    /// Behavior at the end track
    pub end_mode: EndMode,
}

impl TrackTriple {
    /// Build a triple
    pub const fn new(start: u8, end: u8, end_mode: EndMode) -> Self {
        TrackTriple {
            start,
            end,
            end_mode,
        }
    }
}

/// Title screen music
pub const TITLE_LOOP: TrackTriple = TrackTriple::new(2, 3, EndMode::Loop);

/// Level-complete jingle
pub const WIN_JINGLE: TrackTriple = TrackTriple::new(4, 5, EndMode::NormalStop);

/// In-game music, one step per "next" request
pub const GAMEPLAY_ROTATION: [TrackTriple; 3] = [
    TrackTriple::new(5, 6, EndMode::Loop),
    TrackTriple::new(3, 4, EndMode::Loop),
    TrackTriple::new(6, 7, EndMode::Loop),
];
