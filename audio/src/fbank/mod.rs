//! Log mel spectrogram front-end for the MusiCNN/EffNet model family.
//!
//! Default parameters match Essentia's `TensorflowInputMusiCNN`:
//! - SampleRate: 16000
//! - FrameSize: 512, HopSize: 256 (frames centered on `i * hop`)
//! - Hann window, magnitude spectrum squared to power
//! - 96 Slaney mel bands between 0 and 8000 Hz, unit-area triangles
//! - Compression: `log10(1 + 10000 * x)`
//!
//! Output is a `[T, num_bands]` f32 matrix.

mod mel;

use std::sync::Arc;

use realfft::{RealFftPlanner, RealToComplex};

use crate::error::AudioError;

pub use mel::{hann_window, mel_filter_bank};

/// Configuration for log mel spectrogram extraction.
#[derive(Debug, Clone)]
pub struct Config {
    pub sample_rate: usize,
    pub frame_size: usize,
    pub hop_size: usize,
    pub num_bands: usize,
    pub low_freq: f64,
    pub high_freq: f64,
    /// Multiplier applied before the logarithm.
    pub log_scale: f32,
    /// Offset added before the logarithm, keeps silence at zero.
    pub log_shift: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            frame_size: 512,
            hop_size: 256,
            num_bands: 96,
            low_freq: 0.0,
            high_freq: 8000.0,
            log_scale: 10000.0,
            log_shift: 1.0,
        }
    }
}

/// Log mel spectrogram extractor.
///
/// Holds the window, filterbank and FFT plan. `extract` only allocates
/// per-call scratch buffers, so one extractor can serve many threads.
pub struct Extractor {
    cfg: Config,
    window: Vec<f32>,
    mel_bank: Vec<Vec<f32>>,
    fft: Arc<dyn RealToComplex<f32>>,
}

impl Extractor {
    /// Creates a new extractor with the given config.
    pub fn new(cfg: Config) -> Self {
        let window = mel::hann_window(cfg.frame_size);
        let mel_bank = mel::mel_filter_bank(
            cfg.num_bands,
            cfg.frame_size,
            cfg.sample_rate,
            cfg.low_freq,
            cfg.high_freq,
        );
        let fft = RealFftPlanner::<f32>::new().plan_fft_forward(cfg.frame_size);
        Self {
            cfg,
            window,
            mel_bank,
            fft,
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Returns the number of frames `extract` yields for `num_samples` input samples.
    ///
    /// Frame `i` is centered on sample `i * hop_size`; frames are emitted while
    /// their first sample lies before the end of the signal.
    pub fn frame_count(&self, num_samples: usize) -> usize {
        if num_samples == 0 {
            return 0;
        }
        let half = self.cfg.frame_size / 2;
        (num_samples + half).div_ceil(self.cfg.hop_size)
    }

    /// Extracts log mel bands from mono f32 samples (range [-1, 1]).
    pub fn extract(&self, pcm: &[f32]) -> Result<Vec<Vec<f32>>, AudioError> {
        let cfg = &self.cfg;
        let num_frames = self.frame_count(pcm.len());
        let half = (cfg.frame_size / 2) as isize;

        let mut frame = self.fft.make_input_vec();
        let mut spectrum = self.fft.make_output_vec();
        let mut power = vec![0.0f32; spectrum.len()];
        let mut features = Vec::with_capacity(num_frames);

        for t in 0..num_frames {
            let start = (t * cfg.hop_size) as isize - half;

            // Window, zero outside the signal.
            for (i, v) in frame.iter_mut().enumerate() {
                let idx = start + i as isize;
                *v = if idx >= 0 && (idx as usize) < pcm.len() {
                    pcm[idx as usize] * self.window[i]
                } else {
                    0.0
                };
            }

            self.fft.process(&mut frame, &mut spectrum)?;
            for (p, c) in power.iter_mut().zip(spectrum.iter()) {
                *p = c.norm_sqr();
            }

            let bands = self
                .mel_bank
                .iter()
                .map(|filter| {
                    let energy: f32 = filter.iter().zip(&power).map(|(w, p)| w * p).sum();
                    (cfg.log_shift + cfg.log_scale * energy).log10()
                })
                .collect();
            features.push(bands);
        }

        Ok(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(freq: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / 16000.0).sin())
            .collect()
    }

    #[test]
    fn test_frame_count() {
        let extractor = Extractor::new(Config::default());
        assert_eq!(extractor.frame_count(0), 0);
        assert_eq!(extractor.frame_count(1), 2);
        // (16000 + 256) / 256 rounded up
        assert_eq!(extractor.frame_count(16000), 64);
    }

    #[test]
    fn test_extract_sine_wave() {
        let extractor = Extractor::new(Config::default());
        let features = extractor.extract(&sine(440.0, 16000)).unwrap();

        assert_eq!(features.len(), 64);
        assert_eq!(features[0].len(), 96);
        for frame in &features {
            for &v in frame {
                assert!(v.is_finite() && v >= 0.0, "feature value {v}");
            }
        }

        // Energy concentrates in the band covering 440 Hz.
        let mid = &features[32];
        let (peak_band, _) = mid
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best });
        assert!((10..20).contains(&peak_band), "peak band {peak_band}");
    }

    #[test]
    fn test_silence_is_zero() {
        let extractor = Extractor::new(Config::default());
        let features = extractor.extract(&vec![0.0; 4096]).unwrap();
        assert!(!features.is_empty());
        assert!(features.iter().flatten().all(|&v| v == 0.0));
    }

    #[test]
    fn test_empty_input() {
        let extractor = Extractor::new(Config::default());
        assert!(extractor.extract(&[]).unwrap().is_empty());
    }
}
