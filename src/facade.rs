//! Game Audio Facade
//!
//! The only surface the game engine calls: request an effect, request a music
//! change, ask for elapsed time. [`AudioSubsystem`] owns every backend and all
//! state that used to be file-scope globals (rotation cursor, slot array, tick
//! counter), and is handed to the engine as a [`GameAudio`].

use crate::adpcm::{AdpcmChannel, AdpcmDriver, AdpcmRate, KingBus};
use crate::assets::AssetTable;
use crate::cdda::{CdBus, CdTransport, MusicMode, MusicSequencer};
use crate::config::AudioConfig;
use crate::mixer::{MixerHandle, PsgBus};
use crate::timer::{TickCounter, TickSource, TimerBus, TimerInterrupt, TimerMode};
use crate::{AudioError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

pub use crate::cdda::MusicCommand;

/// CD-DA output volume set at startup
const CDDA_VOLUME: u8 = 63;

/// Engine callback contract
pub trait GameAudio {
    /// Play a one-shot effect. Volume 0 does nothing; any other volume plays
    /// at the fixed hardware level.
    fn play_sound(&mut self, effect_id: u8, volume: u8);

    /// Change the background music
    fn set_music(&mut self, command: MusicCommand);

    /// Coarse elapsed time since the clock was last reset
    fn elapsed_ms(&self) -> u32;
}

fn default_effect_rate() -> AdpcmRate {
    AdpcmRate::Hz32000
}

/// ADPCM playback parameters for one effect id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectBinding {
    /// Decoder channel
    pub channel: AdpcmChannel,
    /// Asset name in the asset table
    pub asset: String,
    /// Decode rate
    #[serde(default = "default_effect_rate")]
    pub rate: AdpcmRate,
    /// Ring-buffer playback
    #[serde(default)]
    pub looped: bool,
}

impl EffectBinding {
    /// One-shot 32 kHz binding
    pub fn new(channel: AdpcmChannel, asset: impl Into<String>) -> Self {
        EffectBinding {
            channel,
            asset: asset.into(),
            rate: default_effect_rate(),
            looped: false,
        }
    }
}

/// Effect id to binding map with a fallback for every unlisted id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectTable {
    /// Explicit bindings
    #[serde(default)]
    pub by_id: BTreeMap<u8, EffectBinding>,
    /// Binding for every other id
    pub fallback: EffectBinding,
}

impl EffectTable {
    /// The stock mapping: 2 is the shot on channel 1, 5 the monster on channel
    /// 0, everything else the click on channel 0
    pub fn reference() -> Self {
        let mut by_id = BTreeMap::new();
        by_id.insert(2, EffectBinding::new(AdpcmChannel::Ch1, "shot"));
        by_id.insert(5, EffectBinding::new(AdpcmChannel::Ch0, "monster"));
        EffectTable {
            by_id,
            fallback: EffectBinding::new(AdpcmChannel::Ch0, "click"),
        }
    }

    /// Binding for an effect id
    pub fn binding(&self, effect_id: u8) -> &EffectBinding {
        self.by_id.get(&effect_id).unwrap_or(&self.fallback)
    }

    /// Bake every binding against the asset table
    pub fn resolve(&self, assets: &AssetTable) -> Result<ResolvedEffects> {
        let by_id = self
            .by_id
            .iter()
            .map(|(id, binding)| Ok((*id, ResolvedEffect::new(binding, assets)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(ResolvedEffects {
            by_id,
            fallback: ResolvedEffect::new(&self.fallback, assets)?,
        })
    }
}

impl Default for EffectTable {
    fn default() -> Self {
        Self::reference()
    }
}

/// Fixed ADPCM play request for one effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedEffect {
    /// Decoder channel
    pub channel: AdpcmChannel,
    /// KRAM start address
    pub address: u32,
    /// Clip length in bytes
    pub len: usize,
    /// Decode rate
    pub rate: AdpcmRate,
    /// Ring-buffer playback
    pub looped: bool,
}

impl ResolvedEffect {
    fn new(binding: &EffectBinding, assets: &AssetTable) -> Result<Self> {
        let asset = assets.get(&binding.asset).ok_or_else(|| {
            AudioError::Asset(format!(
                "effect bound to unknown asset '{}'",
                binding.asset
            ))
        })?;
        Ok(ResolvedEffect {
            channel: binding.channel,
            address: asset.kram_offset(),
            len: asset.len(),
            rate: binding.rate,
            looped: binding.looped,
        })
    }
}

/// Effect table baked at startup
#[derive(Debug, Clone)]
pub struct ResolvedEffects {
    by_id: BTreeMap<u8, ResolvedEffect>,
    fallback: ResolvedEffect,
}

impl ResolvedEffects {
    /// Play request for an effect id
    #[inline]
    pub fn get(&self, effect_id: u8) -> &ResolvedEffect {
        self.by_id.get(&effect_id).unwrap_or(&self.fallback)
    }
}

/// The audio context object
#[derive(Debug)]
pub struct AudioSubsystem<P: PsgBus, K: KingBus, C: CdBus> {
    adpcm: AdpcmDriver<K>,
    music: MusicSequencer<C>,
    mixer: MixerHandle<P>,
    timer_mode: TimerMode,
    ticks: Arc<TickCounter>,
    ms_per_tick: u32,
    effects: ResolvedEffects,
    assets: AssetTable,
}

impl<P: PsgBus, K: KingBus, C: CdBus> AudioSubsystem<P, K, C> {
    /// Bring up all backends in the startup order
    ///
    /// 1. validate configuration and bake effect bindings
    /// 2. ADPCM init
    /// 3. CD-DA volume
    /// 4. asset upload to KRAM
    /// 5. arm the timer
    ///
    /// Nothing touches hardware until every check has passed. The returned
    /// interrupt handler is for the platform to bind to the timer vector.
    pub fn init<T: TimerBus>(
        config: &AudioConfig,
        assets: AssetTable,
        psg: P,
        king: K,
        cd: C,
        timer: T,
    ) -> Result<(Self, TimerInterrupt<T, P>)> {
        config.validate()?;
        let effects = config.effects.resolve(&assets)?;
        let transport = CdTransport::with_settle_spins(cd, config.cd.settle_spins);
        let mut music = MusicSequencer::new(
            transport,
            config.cd.tracks.clone(),
            config.cd.music_enabled,
            config.cd.issue_commands,
        )?;

        let mut adpcm = AdpcmDriver::new(king);
        adpcm.init(config.adpcm.rate);
        music.transport_mut().set_volume(CDDA_VOLUME, CDDA_VOLUME);
        assets.upload(adpcm.bus_mut());

        let mixer = MixerHandle::new(psg, config.mixer.slots);
        let mut source = TickSource::new();
        let irq = source.arm(config.timer.mode, config.timer.period, timer, &mixer)?;
        let ticks = Arc::clone(source.ticks());

        log::info!(
            "audio up: {} assets in KRAM, ADPCM {} Hz, {} mixer slot(s), timer {:?}",
            assets.len(),
            config.adpcm.rate.hz(),
            config.mixer.slots,
            config.timer.mode
        );

        let audio = AudioSubsystem {
            adpcm,
            music,
            mixer,
            timer_mode: irq.mode(),
            ticks,
            ms_per_tick: config.timer.ms_per_tick,
            effects,
            assets,
        };
        Ok((audio, irq))
    }

    /// Load the configured assets (host files relative to `base_dir`, disc
    /// sectors through `cd`), then [`init`](Self::init)
    pub fn from_config<T: TimerBus>(
        config: &AudioConfig,
        base_dir: &Path,
        psg: P,
        king: K,
        mut cd: C,
        timer: T,
    ) -> Result<(Self, TimerInterrupt<T, P>)> {
        let assets = AssetTable::load(&config.assets, base_dir, &mut cd)?;
        Self::init(config, assets, psg, king, cd, timer)
    }

    /// Music command from the engine's raw byte; unknown codes are ignored
    pub fn set_music_code(&mut self, code: u8) {
        if let Some(command) = MusicCommand::from_raw(code) {
            self.set_music(command);
        }
    }

    /// Elapsed whole seconds, one per thousand ticks at the reference period
    pub fn elapsed_seconds(&self) -> u32 {
        self.elapsed_ms() / 1000
    }

    /// Restart the elapsed-time clock
    pub fn reset_clock(&self) {
        self.ticks.reset();
    }

    /// Raw tick count
    pub fn ticks(&self) -> u32 {
        self.ticks.get()
    }

    /// Mode the timer was armed in
    pub fn timer_mode(&self) -> TimerMode {
        self.timer_mode
    }

    /// Attach a PSG sample to a mixer slot
    pub fn load_slot(&self, index: usize, sample: impl Into<Arc<[u8]>>) -> Result<()> {
        self.mixer.load(index, sample)
    }

    /// Read `length` bytes of PSG sample from disc at `lba` into a mixer slot
    ///
    /// The read goes through the CD bus before the slot is touched, so a
    /// rejected load leaves the slot as it was.
    pub fn load_slot_from_disc(&mut self, index: usize, lba: u32, length: usize) -> Result<()> {
        let mut sample = vec![0u8; length];
        self.music.transport_mut().bus_mut().read(lba, &mut sample);
        log::debug!("slot {index}: {length} bytes from disc lba {lba}");
        self.mixer.load(index, sample)
    }

    /// Start a mixer slot on a PSG channel
    pub fn start_slot(&self, index: usize, channel: u8, looped: bool) -> Result<()> {
        self.mixer.start(index, channel, looped)
    }

    /// Stop a mixer slot, leaving the channel at its last value
    pub fn stop_slot(&self, index: usize) -> Result<()> {
        self.mixer.stop(index)
    }

    /// Shared mixer handle
    pub fn mixer(&self) -> &MixerHandle<P> {
        &self.mixer
    }

    /// Clear both ADPCM channels
    pub fn reset_adpcm(&mut self) {
        self.adpcm.reset();
    }

    /// Current music mode
    pub fn music_mode(&self) -> MusicMode {
        self.music.mode()
    }

    /// True unless music is muted
    pub fn is_music_enabled(&self) -> bool {
        self.music.is_enabled()
    }

    /// Assets resident in KRAM
    pub fn assets(&self) -> &AssetTable {
        &self.assets
    }

    /// Baked effect table
    pub fn effects(&self) -> &ResolvedEffects {
        &self.effects
    }
}

impl<P: PsgBus, K: KingBus, C: CdBus> GameAudio for AudioSubsystem<P, K, C> {
    #[inline]
    fn play_sound(&mut self, effect_id: u8, volume: u8) {
        if volume == 0 {
            return;
        }
        let effect = *self.effects.get(effect_id);
        self.adpcm.play(
            effect.channel,
            effect.address,
            effect.len,
            effect.looped,
            effect.rate,
        );
    }

    fn set_music(&mut self, command: MusicCommand) {
        self.music.handle(command);
    }

    fn elapsed_ms(&self) -> u32 {
        self.ticks.elapsed_ms(self.ms_per_tick)
    }
}
