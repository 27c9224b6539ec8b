//! Whole-buffer sample rate conversion using rubato.
//!
//! Quality levels follow the libsamplerate numbering used by Essentia's
//! `MonoLoader`: 0 is the best sinc converter, 4 is linear interpolation.

use rubato::{
    FastFixedIn, PolynomialDegree, Resampler, SincFixedIn, SincInterpolationParameters,
    SincInterpolationType, WindowFunction,
};

use crate::error::AudioError;

/// Number of input frames fed to rubato per call.
const CHUNK_SIZE: usize = 1024;

/// Resampling quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResampleQuality {
    /// Long band-limited sinc (libsamplerate `SRC_SINC_BEST_QUALITY`).
    SincBest = 0,
    /// Medium sinc (libsamplerate `SRC_SINC_MEDIUM_QUALITY`).
    SincMedium = 1,
    /// Short sinc (libsamplerate `SRC_SINC_FASTEST`).
    SincFastest = 2,
    /// Nearest-sample hold.
    ZeroOrderHold = 3,
    /// Linear interpolation.
    #[default]
    Linear = 4,
}

impl ResampleQuality {
    /// Maps a libsamplerate converter index to a quality level.
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::SincBest),
            1 => Some(Self::SincMedium),
            2 => Some(Self::SincFastest),
            3 => Some(Self::ZeroOrderHold),
            4 => Some(Self::Linear),
            _ => None,
        }
    }

    /// Returns the libsamplerate converter index.
    pub fn index(self) -> u8 {
        self as u8
    }
}

/// Resamples mono `input` from `src_rate` to `dst_rate`.
///
/// The output length is `ceil(input.len() * dst_rate / src_rate)` and the
/// resampler's group delay is removed, so the output is time-aligned with
/// the input.
pub fn resample(
    input: &[f32],
    src_rate: u32,
    dst_rate: u32,
    quality: ResampleQuality,
) -> Result<Vec<f32>, AudioError> {
    if src_rate == 0 || dst_rate == 0 {
        return Err(AudioError::InvalidSampleRate(format!(
            "{src_rate} Hz -> {dst_rate} Hz"
        )));
    }
    if src_rate == dst_rate || input.is_empty() {
        return Ok(input.to_vec());
    }

    let ratio = dst_rate as f64 / src_rate as f64;
    match quality {
        ResampleQuality::SincBest => run(
            SincFixedIn::<f32>::new(ratio, 1.0, sinc_params(256, 256), CHUNK_SIZE, 1)?,
            input,
            ratio,
        ),
        ResampleQuality::SincMedium => run(
            SincFixedIn::<f32>::new(ratio, 1.0, sinc_params(128, 128), CHUNK_SIZE, 1)?,
            input,
            ratio,
        ),
        ResampleQuality::SincFastest => run(
            SincFixedIn::<f32>::new(ratio, 1.0, sinc_params(64, 64), CHUNK_SIZE, 1)?,
            input,
            ratio,
        ),
        ResampleQuality::ZeroOrderHold => run(
            FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Nearest, CHUNK_SIZE, 1)?,
            input,
            ratio,
        ),
        ResampleQuality::Linear => run(
            FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Linear, CHUNK_SIZE, 1)?,
            input,
            ratio,
        ),
    }
}

fn sinc_params(sinc_len: usize, oversampling_factor: usize) -> SincInterpolationParameters {
    SincInterpolationParameters {
        sinc_len,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor,
        window: WindowFunction::BlackmanHarris2,
    }
}

fn run<R: Resampler<f32>>(
    mut resampler: R,
    input: &[f32],
    ratio: f64,
) -> Result<Vec<f32>, AudioError> {
    let expected = (input.len() as f64 * ratio).ceil() as usize;
    let delay = resampler.output_delay();
    let mut out = Vec::with_capacity(expected + delay + CHUNK_SIZE);

    let mut pos = 0;
    while input.len() - pos >= resampler.input_frames_next() {
        let n = resampler.input_frames_next();
        let wave: &[&[f32]] = &[&input[pos..pos + n]];
        let chunk = resampler.process(wave, None)?;
        out.extend_from_slice(&chunk[0]);
        pos += n;
    }
    if pos < input.len() {
        let tail: &[&[f32]] = &[&input[pos..]];
        let chunk = resampler.process_partial(Some(tail), None)?;
        out.extend_from_slice(&chunk[0]);
    }

    // Flush the samples still held back by the filter delay.
    while out.len() < expected + delay {
        let chunk = resampler.process_partial::<&[f32]>(None, None)?;
        if chunk[0].is_empty() {
            break;
        }
        out.extend_from_slice(&chunk[0]);
    }

    let end = (delay + expected).min(out.len());
    let start = delay.min(end);
    Ok(out[start..end].to_vec())
}
