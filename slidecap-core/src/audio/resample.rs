//! Offline sample-rate conversion for WAV replay, using rubato `FastFixedIn`.
//!
//! Replay files are recorded at whatever rate the recorder used; the ring
//! holds audio at the capture rate. Conversion happens once, before the
//! samples are framed into test chunks, so allocation is fine here.
//!
//! When both rates match, no rubato session is created at all.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};

use crate::error::{CaptureError, Result};

/// Input frames handed to rubato per call.
const RESAMPLE_CHUNK: usize = 1_024;

/// Convert mono f32 audio from `from_rate` to `to_rate`.
///
/// # Errors
/// `CaptureError::AudioStream` if rubato rejects the ratio or fails mid-stream.
pub fn resample_mono(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let mut resampler = FastFixedIn::<f32>::new(
        ratio,
        1.0, // fixed ratio
        PolynomialDegree::Cubic,
        RESAMPLE_CHUNK,
        1, // mono
    )
    .map_err(|e| CaptureError::AudioStream(format!("resampler init: {e}")))?;

    let mut output_buf = vec![vec![0f32; resampler.output_frames_max()]; 1];
    let mut result = Vec::with_capacity((samples.len() as f64 * ratio) as usize + RESAMPLE_CHUNK);

    let mut blocks = samples.chunks_exact(RESAMPLE_CHUNK);
    for block in &mut blocks {
        let (_consumed, produced) = resampler
            .process_into_buffer(&[block], &mut output_buf, None)
            .map_err(|e| CaptureError::AudioStream(format!("resampler process: {e}")))?;
        result.extend_from_slice(&output_buf[0][..produced]);
    }

    let tail = blocks.remainder();
    if !tail.is_empty() {
        let tail_in = [tail];
        let (_consumed, produced) = resampler
            .process_partial_into_buffer(Some(&tail_in[..]), &mut output_buf, None)
            .map_err(|e| CaptureError::AudioStream(format!("resampler flush: {e}")))?;
        result.extend_from_slice(&output_buf[0][..produced]);
    }

    tracing::debug!(
        from_rate,
        to_rate,
        input = samples.len(),
        output = result.len(),
        "resampled replay audio"
    );
    Ok(result)
}

/// Scale `[-1.0, 1.0]` floats to `i16`, clamping out-of-range values.
pub fn f32_to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_rate_is_identity() {
        let samples: Vec<f32> = (0..480).map(|i| i as f32 * 0.001).collect();
        let out = resample_mono(&samples, 16_000, 16_000).unwrap();
        assert_eq!(out, samples);
    }

    #[test]
    fn ratio_48k_to_16k_is_about_a_third() {
        let samples = vec![0.0f32; 48_000];
        let out = resample_mono(&samples, 48_000, 16_000).unwrap();
        let expected = 16_000usize;
        assert!(
            (out.len() as isize - expected as isize).unsigned_abs() <= 400,
            "output len={} expected≈{}",
            out.len(),
            expected
        );
    }

    #[test]
    fn short_input_still_produces_output() {
        let samples = vec![0.1f32; 300];
        let out = resample_mono(&samples, 8_000, 16_000).unwrap();
        assert!(!out.is_empty(), "tail should be flushed");
    }

    #[test]
    fn float_conversion_clamps_and_scales() {
        assert_eq!(f32_to_i16(&[0.0, 1.0, -1.0, 2.0]), vec![0, 32767, -32767, 32767]);
    }
}
