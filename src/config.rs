//! Startup Configuration
//!
//! Everything the reference build hard-codes, as one serde document. Every
//! field has a default, so a config file only needs to name what it changes.
//! Validation runs once at startup; nothing is checked again at call time.

use crate::adpcm::AdpcmRate;
use crate::assets::AssetSpec;
use crate::cdda::{MusicTracks, CD_SETTLE_SPINS};
use crate::facade::EffectTable;
use crate::timer::{TimerMode, DEFAULT_MS_PER_TICK, DEFAULT_TIMER_PERIOD};
use crate::{AudioError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Timer setup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Handler duty
    pub mode: TimerMode,
    /// Hardware timer period
    pub period: u16,
    /// Granularity of the elapsed-time clock
    pub ms_per_tick: u32,
}

impl Default for TimerConfig {
    fn default() -> Self {
        TimerConfig {
            mode: TimerMode::Tick,
            period: DEFAULT_TIMER_PERIOD,
            ms_per_tick: DEFAULT_MS_PER_TICK,
        }
    }
}

/// PSG mixer setup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Number of playback slots
    pub slots: usize,
}

impl Default for MixerConfig {
    fn default() -> Self {
        MixerConfig { slots: 1 }
    }
}

/// ADPCM setup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdpcmConfig {
    /// Decode rate programmed at init
    pub rate: AdpcmRate,
}

impl Default for AdpcmConfig {
    fn default() -> Self {
        AdpcmConfig {
            rate: AdpcmRate::Hz32000,
        }
    }
}

/// CD transport and music setup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CdConfig {
    /// Idle iterations after each transport command
    pub settle_spins: u32,
    /// Music starts unmuted
    pub music_enabled: bool,
    /// Send track commands to the drive (off for builds without a music disc)
    pub issue_commands: bool,
    /// Title, win and rotation segments
    pub tracks: MusicTracks,
}

impl Default for CdConfig {
    fn default() -> Self {
        CdConfig {
            settle_spins: CD_SETTLE_SPINS,
            music_enabled: true,
            issue_commands: true,
            tracks: MusicTracks::default(),
        }
    }
}

/// Complete subsystem configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Timer setup
    pub timer: TimerConfig,
    /// PSG mixer setup
    pub mixer: MixerConfig,
    /// ADPCM setup
    pub adpcm: AdpcmConfig,
    /// CD transport and music setup
    pub cd: CdConfig,
    /// Clips to place in KRAM (file and disc sources)
    pub assets: Vec<AssetSpec>,
    /// Effect id to ADPCM binding
    pub effects: EffectTable,
}

impl AudioConfig {
    /// The reference build: tick mode at period 1423, one mixer slot, 32 kHz
    /// ADPCM and the stock effect bindings
    pub fn reference() -> Self {
        AudioConfig {
            effects: EffectTable::reference(),
            ..Default::default()
        }
    }

    /// Parse a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Serialize as pretty JSON
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject settings the hardware cannot honor
    ///
    /// Asset layout and effect resolution are checked separately against the
    /// loaded asset table.
    pub fn validate(&self) -> Result<()> {
        let result = self.check();
        if let Err(e) = &result {
            log::error!("rejected audio configuration: {e}");
        }
        result
    }

    fn check(&self) -> Result<()> {
        if self.timer.period == 0 {
            return Err(AudioError::Config("timer period must be non-zero".into()));
        }
        if self.timer.ms_per_tick == 0 {
            return Err(AudioError::Config("ms_per_tick must be non-zero".into()));
        }
        if self.mixer.slots == 0 {
            return Err(AudioError::Config(
                "mixer needs at least one playback slot".into(),
            ));
        }
        self.cd.tracks.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adpcm::AdpcmChannel;
    use crate::assets::SampleSource;
    use crate::cdda::{EndMode, TrackTriple};
    use std::io::Write;

    #[test]
    fn test_reference_values() {
        let config = AudioConfig::reference();
        assert_eq!(config.timer.mode, TimerMode::Tick);
        assert_eq!(config.timer.period, 1423);
        assert_eq!(config.timer.ms_per_tick, 1);
        assert_eq!(config.mixer.slots, 1);
        assert_eq!(config.adpcm.rate, AdpcmRate::Hz32000);
        assert_eq!(config.cd.settle_spins, 0x800);
        assert!(config.cd.music_enabled);
        assert!(config.cd.issue_commands);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config = AudioConfig::from_json_str(
            r#"{
                "timer": { "mode": "mix" },
                "adpcm": { "rate": 16000 },
                "cd": { "music_enabled": false }
            }"#,
        )
        .unwrap();

        assert_eq!(config.timer.mode, TimerMode::Mix);
        assert_eq!(config.timer.period, 1423);
        assert_eq!(config.adpcm.rate, AdpcmRate::Hz16000);
        assert!(!config.cd.music_enabled);
        assert!(config.cd.issue_commands);
    }

    #[test]
    fn test_unsupported_rate_rejected_at_parse() {
        let err = AudioConfig::from_json_str(r#"{ "adpcm": { "rate": 22050 } }"#).unwrap_err();
        assert!(matches!(err, AudioError::Json(_)));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = AudioConfig::reference();
        config.mixer.slots = 0;
        assert!(matches!(config.validate(), Err(AudioError::Config(_))));

        let mut config = AudioConfig::reference();
        config.timer.period = 0;
        assert!(config.validate().is_err());

        let mut config = AudioConfig::reference();
        config.cd.tracks.rotation.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_assets_tracks_and_effects_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "cd": {{
                    "tracks": {{
                        "rotation": [ {{ "start": 8, "end": 9, "end_mode": "silent" }} ]
                    }}
                }},
                "assets": [
                    {{ "name": "boom", "kram_offset": 2147483648,
                       "source": {{ "type": "disc", "lba": 300, "length": 8192 }} }},
                    {{ "name": "zap", "kram_offset": 2147487744,
                       "source": {{ "type": "file", "path": "zap.adp" }} }}
                ],
                "effects": {{
                    "by_id": {{ "7": {{ "channel": 1, "asset": "boom", "rate": 8000 }} }},
                    "fallback": {{ "channel": 0, "asset": "zap", "rate": 32000 }}
                }}
            }}"#
        )
        .unwrap();

        let config = AudioConfig::from_path(file.path()).unwrap();
        assert_eq!(
            config.cd.tracks.rotation,
            vec![TrackTriple::new(8, 9, EndMode::Silent)]
        );
        assert_eq!(config.cd.tracks.title, crate::cdda::TITLE_LOOP);
        assert_eq!(
            config.assets[0].source,
            SampleSource::Disc {
                lba: 300,
                length: 8192
            }
        );

        let boom = config.effects.binding(7);
        assert_eq!(boom.channel, AdpcmChannel::Ch1);
        assert_eq!(boom.asset, "boom");
        assert_eq!(boom.rate, AdpcmRate::Hz8000);
        assert!(!boom.looped);
        assert_eq!(config.effects.binding(99).asset, "zap");
    }

    #[test]
    fn test_json_round_trip_of_reference() {
        let config = AudioConfig::reference();
        let text = config.to_json_string().unwrap();
        assert_eq!(AudioConfig::from_json_str(&text).unwrap(), config);
    }
}
