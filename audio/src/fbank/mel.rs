//! Slaney mel scale, Hann window and triangular filterbank.

use std::f64::consts::PI;

/// Linear region slope of the Slaney scale, in Hz per mel.
const F_SP: f64 = 200.0 / 3.0;
/// Frequency where the Slaney scale switches from linear to logarithmic.
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

/// Generates a symmetric Hann window of the given length.
pub fn hann_window(n: usize) -> Vec<f32> {
    if n <= 1 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| (0.5 - 0.5 * (2.0 * PI * i as f64 / (n - 1) as f64).cos()) as f32)
        .collect()
}

/// Converts frequency in Hz to the Slaney mel scale.
pub(crate) fn hz_to_mel(hz: f64) -> f64 {
    if hz < MIN_LOG_HZ {
        hz / F_SP
    } else {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    }
}

/// Converts a Slaney mel value back to Hz.
pub(crate) fn mel_to_hz(mel: f64) -> f64 {
    if mel < MIN_LOG_MEL {
        mel * F_SP
    } else {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    }
}

/// Creates the mel filterbank matrix.
///
/// Returns `[num_bands][fft_size / 2 + 1]`. Filters are triangles in Hz
/// between consecutive mel-spaced edges, scaled to unit area
/// (`2 / (right - left)`).
pub fn mel_filter_bank(
    num_bands: usize,
    fft_size: usize,
    sample_rate: usize,
    low_freq: f64,
    high_freq: f64,
) -> Vec<Vec<f32>> {
    let half_fft = fft_size / 2 + 1;
    let low_mel = hz_to_mel(low_freq);
    let high_mel = hz_to_mel(high_freq);

    let step = (high_mel - low_mel) / (num_bands + 1) as f64;
    let edges: Vec<f64> = (0..num_bands + 2)
        .map(|i| mel_to_hz(low_mel + i as f64 * step))
        .collect();
    let bin_hz = sample_rate as f64 / fft_size as f64;

    let mut bank = Vec::with_capacity(num_bands);
    for m in 0..num_bands {
        let (left, center, right) = (edges[m], edges[m + 1], edges[m + 2]);
        let norm = 2.0 / (right - left);
        let filter = (0..half_fft)
            .map(|k| {
                let f = k as f64 * bin_hz;
                let rise = (f - left) / (center - left);
                let fall = (right - f) / (right - center);
                (rise.min(fall).max(0.0) * norm) as f32
            })
            .collect();
        bank.push(filter);
    }
    bank
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hann_window() {
        let w = hann_window(512);
        assert_eq!(w.len(), 512);
        for i in 0..256 {
            assert!((w[i] - w[511 - i]).abs() < 1e-6);
        }
        assert!(w[0].abs() < 1e-6);
        assert!((w[255] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_slaney_roundtrip() {
        for &hz in &[0.0, 100.0, 440.0, 1000.0, 4000.0, 8000.0] {
            let mel = hz_to_mel(hz);
            let back = mel_to_hz(mel);
            assert!((hz - back).abs() < 1e-6, "roundtrip failed for {} Hz", hz);
        }
        assert!((hz_to_mel(1000.0) - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_mel_filter_bank_shape() {
        let bank = mel_filter_bank(96, 512, 16000, 0.0, 8000.0);
        assert_eq!(bank.len(), 96);
        assert_eq!(bank[0].len(), 257);

        for filter in &bank {
            assert!(filter.iter().all(|&v| v >= 0.0));
            assert!(filter.iter().any(|&v| v > 0.0), "empty filter");
        }
    }
}
