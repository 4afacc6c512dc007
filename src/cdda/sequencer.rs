//! Music mode state machine and gameplay track rotation

use super::{CdBus, CdTransport, TrackTriple, GAMEPLAY_ROTATION, TITLE_LOOP, WIN_JINGLE};
use crate::{AudioError, Result};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

/// Music request from the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum MusicCommand {
    /// Mute: no new transport commands. The current track keeps playing.
    Off = 0,
    /// Unmute
    On = 1,
    /// Advance the gameplay rotation
    Next = 2,
    /// Title screen loop
    Title = 3,
    /// Level-complete jingle
    Win = 4,
}

impl MusicCommand {
    /// Decode the engine's raw command byte, unknown codes yield `None`
    pub fn from_raw(code: u8) -> Option<Self> {
        Self::from_u8(code)
    }
}

/// What the music backend was last told to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MusicMode {
    /// Muted, or nothing requested yet
    #[default]
    Off,
    /// Title loop segment
    TitleLoop,
    /// Win jingle segment
    WinJingle,
    /// One of the gameplay rotation segments
    GameplayRotation,
}

/// Track segments used by the sequencer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MusicTracks {
    /// Title screen segment
    pub title: TrackTriple,
    /// Win jingle segment
    pub win: TrackTriple,
    /// Gameplay rotation, in order
    pub rotation: Vec<TrackTriple>,
}

impl MusicTracks {
    /// Reject an empty rotation
    pub fn validate(&self) -> Result<()> {
        if self.rotation.is_empty() {
            return Err(AudioError::Config(
                "gameplay rotation needs at least one track segment".into(),
            ));
        }
        Ok(())
    }
}

impl Default for MusicTracks {
    fn default() -> Self {
        MusicTracks {
            title: TITLE_LOOP,
            win: WIN_JINGLE,
            rotation: GAMEPLAY_ROTATION.to_vec(),
        }
    }
}

/// Fixed list of segments with a wrapping cursor
#[derive(Debug, Clone)]
pub struct TrackRotation {
    triples: Vec<TrackTriple>,
    index: usize,
}

impl TrackRotation {
    /// Build a rotation starting at its first segment
    pub fn new(triples: Vec<TrackTriple>) -> Result<Self> {
        if triples.is_empty() {
            return Err(AudioError::Config("track rotation is empty".into()));
        }
        Ok(TrackRotation { triples, index: 0 })
    }

    /// Return the segment under the cursor and step the cursor, wrapping
    pub fn advance(&mut self) -> TrackTriple {
        let triple = self.triples[self.index];
        self.index = (self.index + 1) % self.triples.len();
        triple
    }

    /// Segment the next `advance` returns
    pub fn peek(&self) -> TrackTriple {
        self.triples[self.index]
    }

    /// Cursor position
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of segments (the rotation period)
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    /// Always false, a rotation holds at least one segment
    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }
}

impl Default for TrackRotation {
    fn default() -> Self {
        TrackRotation {
            triples: GAMEPLAY_ROTATION.to_vec(),
            index: 0,
        }
    }
}

/// Maps music commands to transport command pairs
#[derive(Debug)]
pub struct MusicSequencer<C: CdBus> {
    transport: CdTransport<C>,
    tracks: MusicTracks,
    rotation: TrackRotation,
    enabled: bool,
    issue_commands: bool,
    mode: MusicMode,
}

impl<C: CdBus> MusicSequencer<C> {
    /// Create a sequencer
    ///
    /// With `issue_commands` false the sequencer keeps its state but never
    /// touches the drive (builds without a music disc).
    pub fn new(
        transport: CdTransport<C>,
        tracks: MusicTracks,
        enabled: bool,
        issue_commands: bool,
    ) -> Result<Self> {
        let rotation = TrackRotation::new(tracks.rotation.clone())?;
        Ok(MusicSequencer {
            transport,
            tracks,
            rotation,
            enabled,
            issue_commands,
            mode: MusicMode::Off,
        })
    }

    /// Apply a music command
    pub fn handle(&mut self, command: MusicCommand) {
        match command {
            MusicCommand::On => {
                self.enabled = true;
                log::debug!("music on");
            }
            MusicCommand::Off => {
                self.enabled = false;
                self.mode = MusicMode::Off;
                log::debug!("music off, current track left playing");
            }
            MusicCommand::Next => {
                if !self.enabled {
                    return;
                }
                let triple = self.rotation.advance();
                self.play(triple, MusicMode::GameplayRotation);
            }
            MusicCommand::Title => {
                if !self.enabled {
                    return;
                }
                self.play(self.tracks.title, MusicMode::TitleLoop);
            }
            MusicCommand::Win => {
                if !self.enabled {
                    return;
                }
                self.play(self.tracks.win, MusicMode::WinJingle);
            }
        }
    }

    /// Current music mode
    pub fn mode(&self) -> MusicMode {
        self.mode
    }

    /// True unless muted
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Gameplay rotation state
    pub fn rotation(&self) -> &TrackRotation {
        &self.rotation
    }

    /// Access the transport (startup volume setup, asset reads)
    pub fn transport_mut(&mut self) -> &mut CdTransport<C> {
        &mut self.transport
    }

    fn play(&mut self, triple: TrackTriple, mode: MusicMode) {
        self.mode = mode;
        log::debug!(
            "music {:?}: tracks {}..{} ({:?})",
            mode,
            triple.start,
            triple.end,
            triple.end_mode
        );
        if self.issue_commands {
            self.transport.start_track(triple.start);
            self.transport.end_track(triple.end, triple.end_mode);
        }
    }
}
