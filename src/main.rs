//! Offline trace and render tool
//!
//! Brings the audio subsystem up against a recording bus, plays a scripted
//! sequence of engine requests and prints every register-level operation.
//! Optionally renders the PSG mixer output to a WAV file.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use pcfx_audio::export::{export_to_wav, ExportConfig};
use pcfx_audio::{
    AssetTable, AudioConfig, AudioSubsystem, BusEvent, GameAudio, MusicCommand, RecordingBus,
    SampleAsset, TimerInterrupt, TimerMode, KRAM_PAGE1,
};

type Audio = AudioSubsystem<RecordingBus, RecordingBus, RecordingBus>;
type Irq = TimerInterrupt<RecordingBus, RecordingBus>;

const USAGE: &str = "Usage:
  pcfx-audio [--config <file.json>] [--sample <file.raw>] [--wav <out.wav> --ticks <n>] [steps...]

Steps:
  sound:<id>[:<volume>]   play an effect (volume defaults to 255)
  music:<command>         on | off | next | title | win | <raw code>
  tick:<n>                fire the timer interrupt n times
  reset                   clear both ADPCM channels
  clock                   print elapsed time

Flags:
  --config <file>   JSON configuration (defaults to the reference build)
  --sample <file>   raw 5-bit PSG sample, started looped on slot 0 channel 0
  --wav <file>      render the PSG mixer to a WAV file
  --ticks <n>       number of timer ticks to render (default 1006)
  -q, --quiet       do not print the register trace
  -h, --help        show this help

Examples:
  pcfx-audio music:title sound:2 music:next
  pcfx-audio --sample voice.raw --wav voice.wav --ticks 5000";

#[derive(Debug, Default)]
struct Options {
    config: Option<PathBuf>,
    sample: Option<PathBuf>,
    wav: Option<PathBuf>,
    ticks: Option<usize>,
    quiet: bool,
    steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
enum Step {
    Sound { id: u8, volume: u8 },
    Music(u8),
    Tick(u32),
    Reset,
    Clock,
}

fn parse_music(value: &str) -> Result<u8> {
    let command = match value {
        "off" => MusicCommand::Off,
        "on" => MusicCommand::On,
        "next" => MusicCommand::Next,
        "title" => MusicCommand::Title,
        "win" => MusicCommand::Win,
        raw => return raw.parse().with_context(|| format!("unknown music command '{raw}'")),
    };
    Ok(command as u8)
}

fn parse_step(arg: &str) -> Result<Step> {
    let mut parts = arg.split(':');
    let step = match (parts.next(), parts.next(), parts.next()) {
        (Some("sound"), Some(id), volume) => Step::Sound {
            id: id.parse().with_context(|| format!("bad effect id in '{arg}'"))?,
            volume: volume
                .map(|v| v.parse::<u8>())
                .transpose()
                .with_context(|| format!("bad volume in '{arg}'"))?
                .unwrap_or(u8::MAX),
        },
        (Some("music"), Some(command), None) => Step::Music(parse_music(command)?),
        (Some("tick"), Some(n), None) => {
            Step::Tick(n.parse().with_context(|| format!("bad tick count in '{arg}'"))?)
        }
        (Some("reset"), None, None) => Step::Reset,
        (Some("clock"), None, None) => Step::Clock,
        _ => bail!("unknown step '{arg}'"),
    };
    Ok(step)
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Option<Options>> {
    let mut options = Options::default();
    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .with_context(|| format!("{flag} requires an argument"))
        };
        match arg.as_str() {
            "--help" | "-h" => return Ok(None),
            "--quiet" | "-q" => options.quiet = true,
            "--config" => options.config = Some(value("--config")?.into()),
            "--sample" => options.sample = Some(value("--sample")?.into()),
            "--wav" => options.wav = Some(value("--wav")?.into()),
            "--ticks" => {
                let n = value("--ticks")?;
                options.ticks = Some(n.parse().with_context(|| format!("bad tick count '{n}'"))?);
            }
            _ if arg.starts_with('-') => bail!("unknown flag: {arg}"),
            _ => options.steps.push(parse_step(&arg)?),
        }
    }
    Ok(Some(options))
}

/// Silent stand-ins for the stock clips when the config lists no assets
fn placeholder_assets() -> pcfx_audio::Result<AssetTable> {
    AssetTable::new(vec![
        SampleAsset::new("click", KRAM_PAGE1, vec![0u8; 4096]),
        SampleAsset::new("monster", KRAM_PAGE1 | 4096 * 3, vec![0u8; 4096]),
        SampleAsset::new("shot", KRAM_PAGE1 | 4096 * 6, vec![0u8; 4096]),
    ])
}

fn bring_up(config: &AudioConfig, base_dir: &Path, bus: &RecordingBus) -> Result<(Audio, Irq)> {
    let (psg, king, cd, timer) = (bus.clone(), bus.clone(), bus.clone(), bus.clone());
    let result = if config.assets.is_empty() {
        AudioSubsystem::init(config, placeholder_assets()?, psg, king, cd, timer)
    } else {
        AudioSubsystem::from_config(config, base_dir, psg, king, cd, timer)
    };
    result.context("audio subsystem failed to start")
}

fn print_trace(label: &str, events: &[BusEvent], quiet: bool) {
    if quiet {
        return;
    }
    println!("== {label} ({} ops)", events.len());
    for event in events {
        println!("   {event:?}");
    }
}

fn run(options: Options) -> Result<()> {
    let (mut config, base_dir) = match &options.config {
        Some(path) => {
            let config = AudioConfig::from_path(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
            (config, dir)
        }
        None => (AudioConfig::reference(), PathBuf::new()),
    };
    if options.sample.is_some() && config.timer.mode != TimerMode::Mix {
        log::info!("--sample given, arming the timer in mix mode");
        config.timer.mode = TimerMode::Mix;
    }

    let bus = RecordingBus::new();
    let (mut audio, mut irq) = bring_up(&config, &base_dir, &bus)?;
    print_trace("init", &bus.take(), options.quiet);

    if let Some(path) = &options.sample {
        let sample =
            std::fs::read(path).with_context(|| format!("reading sample {}", path.display()))?;
        audio.load_slot(0, sample)?;
        audio.start_slot(0, 0, true)?;
        print_trace("sample start", &bus.take(), options.quiet);
    }

    for step in &options.steps {
        match *step {
            Step::Sound { id, volume } => audio.play_sound(id, volume),
            Step::Music(code) => audio.set_music_code(code),
            Step::Tick(n) => (0..n).for_each(|_| irq.fire()),
            Step::Reset => audio.reset_adpcm(),
            Step::Clock => println!(
                "== clock: {} ticks, {} ms, {} s",
                audio.ticks(),
                audio.elapsed_ms(),
                audio.elapsed_seconds()
            ),
        }
        if !matches!(step, Step::Clock) {
            print_trace(&format!("{step:?}"), &bus.take(), options.quiet);
        }
    }

    if let Some(path) = &options.wav {
        let ticks = options.ticks.unwrap_or(1006);
        let export = ExportConfig::for_timer_period(config.timer.period);
        bus.clear();
        let frames = export_to_wav(audio.mixer(), &bus, ticks, path, export)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("wrote {frames} frames to {}", path.display());
    }

    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match parse_args(env::args().skip(1))? {
        Some(options) => run(options),
        None => {
            eprintln!("{USAGE}");
            Ok(())
        }
    }
}
