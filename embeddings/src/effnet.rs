//! [`EmbeddingModel`] implementation for the Discogs-EffNet ONNX graph.

use std::sync::Arc;

use coral_audio::fbank;
use coral_onnx::Session;
use ndarray::{Array3, ArrayD, ArrayViewD, Axis, Ix2};

use crate::error::EmbeddingError;
use crate::model::EmbeddingModel;

/// Configuration for [`EffnetModel`].
#[derive(Debug, Clone)]
pub struct EffnetConfig {
    /// Mel frames per patch (default: 128).
    pub patch_size: usize,
    /// Frames between patch starts (default: 62).
    pub patch_hop: usize,
    /// Patches per inference call; the last batch is zero-padded (default: 64).
    pub batch_size: usize,
    /// Spectrogram front-end.
    pub mel: fbank::Config,
}

impl Default for EffnetConfig {
    fn default() -> Self {
        Self {
            patch_size: 128,
            patch_hop: 62,
            batch_size: 64,
            mel: fbank::Config::default(),
        }
    }
}

impl EffnetConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

/// Discogs-EffNet track model.
///
/// # Pipeline
///
/// 1. waveform -> [`fbank::Extractor`] -> `[T, 96]` log mel bands
/// 2. `[T, 96]` -> overlapping `[128, 96]` patches, hop 62, incomplete tail dropped
/// 3. patches -> batches of `batch_size` -> session -> `[batch, D]`
///
/// Rows produced for padding are discarded, so the output has exactly one
/// row per patch.
pub struct EffnetModel {
    session: Arc<Session>,
    mel: fbank::Extractor,
    cfg: EffnetConfig,
    dim: usize,
}

impl EffnetModel {
    /// Wraps a loaded session. Runs one zero patch to learn the output dimension.
    pub fn new(session: Arc<Session>, cfg: EffnetConfig) -> Result<Self, EmbeddingError> {
        let mel = fbank::Extractor::new(cfg.mel.clone());
        let warmup = Array3::<f32>::zeros((1, cfg.patch_size, cfg.mel.num_bands));
        let output = session.run(warmup.view().into_dyn())?;
        let dim = match output.shape() {
            [1, d] if *d > 0 => *d,
            shape => return Err(EmbeddingError::OutputShape(shape.to_vec())),
        };
        tracing::debug!(
            dim,
            patch_size = cfg.patch_size,
            batch_size = cfg.batch_size,
            "effnet model ready"
        );

        Ok(Self {
            session,
            mel,
            cfg,
            dim,
        })
    }

    fn batcher(&self) -> Batcher {
        Batcher {
            batch_size: self.cfg.batch_size,
            patch_size: self.cfg.patch_size,
            bands: self.cfg.mel.num_bands,
            dim: self.dim,
        }
    }
}

/// Packs patches into fixed-size, zero-padded batches.
#[derive(Debug, Clone, Copy)]
pub struct Batcher {
    pub batch_size: usize,
    pub patch_size: usize,
    pub bands: usize,
    /// Expected embedding width of every output row.
    pub dim: usize,
}

impl Batcher {
    /// Feeds `patches` to `infer` as `[batch_size, patch_size, bands]` tensors.
    ///
    /// The last batch is zero-padded; rows produced for padding are dropped,
    /// so the result holds exactly one row per patch, in patch order.
    pub fn run<F>(
        &self,
        patches: &[&[Vec<f32>]],
        mut infer: F,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError>
    where
        F: FnMut(ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, EmbeddingError>,
    {
        let mut embeddings = Vec::with_capacity(patches.len());
        for chunk in patches.chunks(self.batch_size.max(1)) {
            let batch = self.pack(chunk);
            let output = infer(batch.view().into_dyn())?;
            embeddings.extend(self.unpack(output, chunk.len())?);
        }
        Ok(embeddings)
    }

    fn pack(&self, chunk: &[&[Vec<f32>]]) -> Array3<f32> {
        let shape = (self.batch_size.max(1), self.patch_size, self.bands);
        let mut batch = Array3::<f32>::zeros(shape);
        for (mut slot, patch) in batch.axis_iter_mut(Axis(0)).zip(chunk) {
            for (mut row, frame) in slot.axis_iter_mut(Axis(0)).zip(patch.iter()) {
                for (dst, &src) in row.iter_mut().zip(frame) {
                    *dst = src;
                }
            }
        }
        batch
    }

    fn unpack(&self, output: ArrayD<f32>, used: usize) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let shape = output.shape().to_vec();
        let output = output
            .into_dimensionality::<Ix2>()
            .map_err(|_| EmbeddingError::OutputShape(shape.clone()))?;
        if output.ncols() != self.dim {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dim,
                got: output.ncols(),
            });
        }
        if output.nrows() < used {
            return Err(EmbeddingError::OutputShape(shape));
        }

        Ok(output
            .outer_iter()
            .take(used)
            .map(|row| row.to_vec())
            .collect())
    }
}

impl EmbeddingModel for EffnetModel {
    fn embed(&self, waveform: &[f32]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let features = self.mel.extract(waveform)?;
        let starts = patch_starts(features.len(), self.cfg.patch_size, self.cfg.patch_hop);
        if starts.is_empty() {
            return Err(EmbeddingError::AudioTooShort {
                min_frames: self.cfg.patch_size,
                got_frames: features.len(),
            });
        }

        let patches: Vec<&[Vec<f32>]> = starts
            .iter()
            .map(|&s| &features[s..s + self.cfg.patch_size])
            .collect();

        let embeddings = self
            .batcher()
            .run(&patches, |batch| Ok(self.session.run(batch)?))?;
        tracing::debug!(
            frames = features.len(),
            patches = embeddings.len(),
            "effnet inference done"
        );
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

/// Returns the start frame of every complete patch.
pub fn patch_starts(num_frames: usize, patch_size: usize, hop: usize) -> Vec<usize> {
    if patch_size == 0 || hop == 0 || num_frames < patch_size {
        return Vec::new();
    }
    (0..=num_frames - patch_size).step_by(hop).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patches_drop_incomplete_tail() {
        assert_eq!(patch_starts(128, 128, 62), vec![0]);
        assert_eq!(patch_starts(189, 128, 62), vec![0]);
        assert_eq!(patch_starts(190, 128, 62), vec![0, 62]);
        assert_eq!(patch_starts(315, 128, 62), vec![0, 62, 124, 186]);
    }

    #[test]
    fn patches_too_short() {
        assert!(patch_starts(0, 128, 62).is_empty());
        assert!(patch_starts(127, 128, 62).is_empty());
        assert!(patch_starts(500, 0, 62).is_empty());
        assert!(patch_starts(500, 128, 0).is_empty());
    }

    #[test]
    fn one_minute_patch_count() {
        let mel = fbank::Extractor::new(fbank::Config::default());
        let frames = mel.frame_count(60 * 16000);
        // 3751 frames -> (3751 - 128) / 62 + 1
        assert_eq!(frames, 3751);
        assert_eq!(patch_starts(frames, 128, 62).len(), 59);
    }

    fn patches(n: usize, patch_size: usize, bands: usize) -> Vec<Vec<Vec<f32>>> {
        (0..n)
            .map(|i| vec![vec![(i + 1) as f32; bands]; patch_size])
            .collect()
    }

    /// Echoes each slot's first value into a `[batch, dim]` output.
    fn echo(dim: usize, batch: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, EmbeddingError> {
        let rows = batch.shape()[0];
        let out = ndarray::Array2::from_shape_fn((rows, dim), |(r, _)| batch[&[r, 0, 0][..]]);
        Ok(out.into_dyn())
    }

    #[test]
    fn batches_pad_and_drop() {
        let owned = patches(3, 4, 3);
        let refs: Vec<&[Vec<f32>]> = owned.iter().map(|p| p.as_slice()).collect();
        let batcher = Batcher {
            batch_size: 2,
            patch_size: 4,
            bands: 3,
            dim: 2,
        };

        let mut seen = Vec::new();
        let rows = batcher
            .run(&refs, |batch| {
                seen.push((batch.shape().to_vec(), batch[&[1, 3, 2][..]]));
                echo(2, batch)
            })
            .unwrap();

        assert_eq!(rows, vec![vec![1.0, 1.0], vec![2.0, 2.0], vec![3.0, 3.0]]);
        // Two full-size calls; the second batch's spare slot is zeros.
        assert_eq!(seen, vec![(vec![2, 4, 3], 2.0), (vec![2, 4, 3], 0.0)]);
    }

    #[test]
    fn batches_reject_bad_output() {
        let owned = patches(2, 4, 3);
        let refs: Vec<&[Vec<f32>]> = owned.iter().map(|p| p.as_slice()).collect();
        let batcher = Batcher {
            batch_size: 4,
            patch_size: 4,
            bands: 3,
            dim: 5,
        };

        let err = batcher.run(&refs, |batch| echo(2, batch)).unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::DimensionMismatch { expected: 5, got: 2 }
        ));

        let err = batcher
            .run(&refs, |_| Ok(ndarray::Array2::<f32>::zeros((1, 5)).into_dyn()))
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::OutputShape(_)));

        let err = batcher
            .run(&refs, |_| Ok(ndarray::Array1::<f32>::zeros(5).into_dyn()))
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::OutputShape(_)));
    }

    #[test]
    fn batch_size_floor() {
        assert_eq!(EffnetConfig::default().with_batch_size(0).batch_size, 1);
        assert_eq!(EffnetConfig::default().with_batch_size(16).batch_size, 16);
    }
}
