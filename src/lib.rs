//! PC-FX real-time audio subsystem
//!
//! Drives the three sound backends of the PC-FX game port and exposes the small
//! request surface the game engine calls.
//!
//! # Backends
//! - Software-mixed PSG sample channel, fed one byte per fixed-rate timer interrupt
//!   (`mixer`, driven by `timer` in mix mode)
//! - KING ADPCM decoder with two autonomous channels for one-shot effects (`adpcm`)
//! - CD-DA "redbook" track transport for background music (`cdda`)
//!
//! All hardware access goes through the bus traits ([`PsgBus`], [`KingBus`],
//! [`CdBus`], [`TimerBus`]). [`RecordingBus`] implements every one of them in
//! memory and records each register-level operation, which makes the whole
//! subsystem testable on a host.
//!
//! # Quick start
//! ```
//! use pcfx_audio::{
//!     AssetTable, AudioConfig, AudioSubsystem, GameAudio, MusicCommand, RecordingBus,
//!     SampleAsset, KRAM_PAGE1,
//! };
//!
//! let bus = RecordingBus::new();
//! let mut config = AudioConfig::reference();
//! config.cd.settle_spins = 0;
//!
//! let assets = AssetTable::new(vec![
//!     SampleAsset::new("click", KRAM_PAGE1, vec![0u8; 4096]),
//!     SampleAsset::new("monster", KRAM_PAGE1 | 4096 * 3, vec![0u8; 4096]),
//!     SampleAsset::new("shot", KRAM_PAGE1 | 4096 * 6, vec![0u8; 4096]),
//! ])
//! .unwrap();
//!
//! let (mut audio, _irq) = AudioSubsystem::init(
//!     &config,
//!     assets,
//!     bus.clone(),
//!     bus.clone(),
//!     bus.clone(),
//!     bus.clone(),
//! )
//! .unwrap();
//!
//! audio.set_music(MusicCommand::Title);
//! audio.play_sound(2, 255);
//! ```

#![warn(missing_docs)]

pub mod adpcm; // KING ADPCM Driver
pub mod assets; // Sample Asset Table
pub mod bus; // Recording Bus
pub mod cdda; // CD-DA Transport Sequencer
pub mod config; // Startup Configuration
pub mod export; // WAV Rendering
pub mod facade; // Game Audio Facade
pub mod mixer; // PSG Playback Slot Mixer
pub mod timer; // Timer Tick Source

/// Error types for audio subsystem setup and tooling
///
/// Register-level operations never fail; only configuration, asset loading and
/// export paths return errors.
#[derive(thiserror::Error, Debug)]
pub enum AudioError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Asset table rejected at startup
    #[error("Asset error: {0}")]
    Asset(String),

    /// Playback slot index outside the mixer
    #[error("Invalid playback slot {index} (mixer has {available})")]
    InvalidSlot {
        /// Requested slot
        index: usize,
        /// Number of slots in the mixer
        available: usize,
    },

    /// The timer mode is a one-time choice
    #[error("Timer already armed in {0:?} mode")]
    TimerAlreadyArmed(timer::TimerMode),

    /// IO error from filesystem
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error writing audio file
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

/// Result type for audio subsystem operations
pub type Result<T> = std::result::Result<T, AudioError>;

pub use adpcm::{AdpcmChannel, AdpcmDriver, AdpcmRate, KingBus, KingRegister, PlayCommand};
pub use assets::{AssetTable, SampleAsset, SampleSource, ADPCM_HEADER_BYTES, KRAM_PAGE1};
pub use bus::{BusEvent, RecordingBus};
pub use cdda::{
    CdBus, CdTransport, EndMode, MusicMode, MusicSequencer, TrackRotation, TrackTriple,
    CD_SETTLE_SPINS,
};
pub use config::AudioConfig;
pub use facade::{AudioSubsystem, EffectBinding, EffectTable, GameAudio, MusicCommand};
pub use mixer::{MixerHandle, PlaybackSlot, PsgBus, SlotMixer, HEADER_GUARD};
pub use timer::{TickCounter, TickSource, TimerBus, TimerInterrupt, TimerMode};
