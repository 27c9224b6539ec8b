//! Track embedding extraction: decode, infer, pool, classify.

use std::path::Path;
use std::sync::Arc;

use coral_audio::{DEFAULT_SAMPLE_RATE, MonoLoader, ResampleQuality};
use serde::{Deserialize, Serialize};

use crate::code::ErrorCode;
use crate::error::EmbeddingError;
use crate::model::EmbeddingModel;

/// Outcome of one extraction: a track embedding or the reason there is none.
pub type Extraction = Result<Vec<f32>, ErrorCode>;

/// Tunables for [`Extractor`], as read from the service config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Resampling quality, 0 (best sinc) to 4 (linear).
    pub resample_quality: u8,
    /// Patches per inference call.
    pub batch_size: usize,
    /// L2-normalise the pooled vector.
    pub normalize: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            resample_quality: ResampleQuality::Linear.index(),
            batch_size: 64,
            normalize: false,
        }
    }
}

/// Computes one fixed-size embedding per audio file.
///
/// Holds no per-request state; one extractor serves all requests.
pub struct Extractor {
    loader: MonoLoader,
    model: Arc<dyn EmbeddingModel>,
    normalize: bool,
}

impl Extractor {
    /// Creates an extractor that loads audio at 16 kHz with linear resampling.
    pub fn new(model: Arc<dyn EmbeddingModel>) -> Self {
        Self {
            loader: MonoLoader::default(),
            model,
            normalize: false,
        }
    }

    /// Applies the resampling and normalisation settings of `cfg`.
    ///
    /// An out-of-range quality falls back to linear.
    pub fn with_config(mut self, cfg: &ExtractorConfig) -> Self {
        let quality = ResampleQuality::from_index(cfg.resample_quality).unwrap_or_else(|| {
            tracing::warn!(
                quality = cfg.resample_quality,
                "unknown resample quality, using linear"
            );
            ResampleQuality::Linear
        });
        self.loader = MonoLoader::new(DEFAULT_SAMPLE_RATE, quality);
        self.normalize = cfg.normalize;
        self
    }

    pub fn with_loader(mut self, loader: MonoLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn dimension(&self) -> usize {
        self.model.dimension()
    }

    /// Extracts the track embedding of the file at `path`.
    ///
    /// Never propagates a failure: every error is logged and reduced to an
    /// [`ErrorCode`].
    pub fn extract(&self, path: impl AsRef<Path>) -> Extraction {
        let path = path.as_ref();
        match self.try_extract(path) {
            Ok(embedding) => {
                tracing::debug!(
                    path = %path.display(),
                    dim = embedding.len(),
                    "embedding extracted"
                );
                Ok(embedding)
            }
            Err(e) => {
                let message = e.to_string();
                let code = ErrorCode::classify(&without_path(&message, path));
                tracing::error!(
                    path = %path.display(),
                    code = %code,
                    error = %message,
                    "extraction failed"
                );
                Err(code)
            }
        }
    }

    fn try_extract(&self, path: &Path) -> Result<Vec<f32>, EmbeddingError> {
        let waveform = self.loader.load(path)?;
        let rows = self.model.embed(&waveform)?;
        let mut pooled = mean_pool(&rows, self.model.dimension())?;
        if self.normalize {
            l2_normalize(&mut pooled);
        }
        Ok(pooled)
    }
}

/// Removes `path` from an error message so file names cannot match a
/// classification phrase.
fn without_path(message: &str, path: &Path) -> String {
    let name = path.display().to_string();
    if name.is_empty() {
        return message.to_string();
    }
    message.replace(&name, "")
}

/// Averages patch embeddings column-wise into one vector of length `dim`.
pub fn mean_pool(rows: &[Vec<f32>], dim: usize) -> Result<Vec<f32>, EmbeddingError> {
    if rows.is_empty() {
        return Err(EmbeddingError::EmptyOutput);
    }
    let mut sum = vec![0.0f64; dim];
    for row in rows {
        if row.len() != dim {
            return Err(EmbeddingError::DimensionMismatch {
                expected: dim,
                got: row.len(),
            });
        }
        for (acc, &v) in sum.iter_mut().zip(row) {
            *acc += v as f64;
        }
    }
    let n = rows.len() as f64;
    Ok(sum.into_iter().map(|v| (v / n) as f32).collect())
}

/// Scales `v` to unit Euclidean length. Zero vectors are left as is.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x = (*x as f64 / norm) as f32;
        }
    }
}
