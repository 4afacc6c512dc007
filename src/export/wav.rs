//! WAV file export

use super::{render_mixer, ExportConfig};
use crate::mixer::MixerHandle;
use crate::{RecordingBus, Result};
use std::path::Path;

/// Render the mixer for `ticks` timer ticks into a 16-bit WAV file
///
/// Returns the number of frames written.
///
/// # Examples
///
/// ```no_run
/// use pcfx_audio::export::{export_to_wav, ExportConfig};
/// use pcfx_audio::{MixerHandle, RecordingBus};
///
/// # fn main() -> pcfx_audio::Result<()> {
/// let bus = RecordingBus::new();
/// let mixer = MixerHandle::new(bus.clone(), 1);
/// mixer.load(0, std::fs::read("voice.raw")?)?;
/// mixer.start(0, 0, false)?;
///
/// export_to_wav(&mixer, &bus, 5000, "voice.wav", ExportConfig::default())?;
/// # Ok(())
/// # }
/// ```
pub fn export_to_wav<P: AsRef<Path>>(
    mixer: &MixerHandle<RecordingBus>,
    bus: &RecordingBus,
    ticks: usize,
    output_path: P,
    config: ExportConfig,
) -> Result<usize> {
    let samples = render_mixer(mixer, bus, ticks);
    log::info!(
        "writing {} ticks ({:.2}s at {} Hz) to {}",
        samples.len(),
        samples.len() as f32 / config.sample_rate.max(1) as f32,
        config.sample_rate,
        output_path.as_ref().display()
    );
    write_wav_file(output_path.as_ref(), &samples, config.sample_rate, config.channels)?;
    Ok(samples.len())
}

/// Write mono samples, duplicated across `channels`
pub fn write_wav_file(path: &Path, samples: &[f32], sample_rate: u32, channels: u16) -> Result<()> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        let sample_i16 = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        for _ in 0..channels {
            writer.write_sample(sample_i16)?;
        }
    }
    writer.finalize()?;

    Ok(())
}
