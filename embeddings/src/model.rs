use crate::error::EmbeddingError;

/// Turns a mono waveform into per-patch embedding vectors.
///
/// The input is f32 samples in [-1, 1] at the model's sample rate
/// (16 kHz for the Discogs-EffNet family). The output has one row per
/// analysed patch, each of length [`EmbeddingModel::dimension`].
///
/// Implementations must be safe for concurrent use.
pub trait EmbeddingModel: Send + Sync {
    /// Computes patch-level embeddings for a whole track.
    fn embed(&self, waveform: &[f32]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Returns the dimensionality of the embedding vectors (e.g., 1280).
    fn dimension(&self) -> usize;
}
