//! Audio front-end for track embedding extraction.
//!
//! This crate provides:
//!
//! - `decode`: file -> mono f32 waveform at a fixed sample rate ([`MonoLoader`])
//! - `resampler`: whole-buffer sample rate conversion with selectable quality
//! - `fbank`: log mel spectrogram matching the MusiCNN/EffNet model inputs
//!
//! # Example
//!
//! ```no_run
//! use coral_audio::{fbank, MonoLoader, ResampleQuality};
//!
//! let loader = MonoLoader::new(16000, ResampleQuality::Linear);
//! let samples = loader.load("track.flac").unwrap();
//!
//! let mel = fbank::Extractor::new(fbank::Config::default());
//! let frames = mel.extract(&samples).unwrap();
//! ```

pub mod decode;
mod error;
pub mod fbank;
pub mod resampler;

pub use decode::{DEFAULT_SAMPLE_RATE, DecodedAudio, MonoLoader, decode_mono};
pub use error::AudioError;
pub use resampler::{ResampleQuality, resample};
