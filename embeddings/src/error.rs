use coral_audio::AudioError;
use coral_onnx::OnnxError;
use thiserror::Error;

/// Errors raised while turning a file into an embedding.
///
/// Callers outside this crate see these only through [`crate::ErrorCode`];
/// the full message is logged where the failure is classified.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Onnx(#[from] OnnxError),

    #[error("audio too short: need at least {min_frames} mel frames, got {got_frames}")]
    AudioTooShort { min_frames: usize, got_frames: usize },

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("unexpected model output shape {0:?}")]
    OutputShape(Vec<usize>),

    #[error("model produced no embeddings")]
    EmptyOutput,
}
