use std::io;

use thiserror::Error;

/// Errors returned while loading or analysing audio.
///
/// The messages of the first three variants are part of the service contract:
/// callers classify failures by the phrases they contain.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("No such file or directory: {0}")]
    FileNotFound(String),

    #[error("Could not find stream information: {0}")]
    NoStreamInfo(String),

    #[error("Unsupported codec! {0}")]
    UnsupportedCodec(String),

    #[error("could not open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(String),

    #[error("resample: {0}")]
    Resample(String),

    #[error("fft: {0}")]
    Fft(String),
}

impl From<rubato::ResamplerConstructionError> for AudioError {
    fn from(e: rubato::ResamplerConstructionError) -> Self {
        AudioError::Resample(e.to_string())
    }
}

impl From<rubato::ResampleError> for AudioError {
    fn from(e: rubato::ResampleError) -> Self {
        AudioError::Resample(e.to_string())
    }
}

impl From<realfft::FftError> for AudioError {
    fn from(e: realfft::FftError) -> Self {
        AudioError::Fft(e.to_string())
    }
}
