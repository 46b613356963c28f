//! WAV replay sources and window dumps (via `hound`).

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::info;

use super::resample::{f32_to_i16, resample_mono};
use crate::error::Result;

/// Load a WAV file as mono `i16` at `target_rate`.
///
/// Multi-channel files are averaged to mono; integer and float encodings of
/// any bit depth hound supports are accepted.
pub fn load_wav_mono(path: &Path, target_rate: u32) -> Result<Vec<i16>> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<std::result::Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    let mono: Vec<f32> = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();

    let resampled = resample_mono(&mono, spec.sample_rate, target_rate)?;
    info!(
        path = %path.display(),
        source_rate = spec.sample_rate,
        channels,
        samples = resampled.len(),
        "replay audio loaded"
    );
    Ok(f32_to_i16(&resampled))
}

/// Write mono 16-bit PCM.
pub fn write_wav_mono(path: &Path, samples: &[i16], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}
