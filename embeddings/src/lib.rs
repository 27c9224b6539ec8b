//! Track embeddings for audio files.
//!
//! An [`Extractor`] decodes a file to 16 kHz mono, runs an [`EmbeddingModel`]
//! over it and mean-pools the patch embeddings into one vector. Failures
//! come back as an [`ErrorCode`], never as a panic or a propagated error.
//!
//! [`EffnetModel`] is the ONNX-backed model used by the service.

pub mod code;
pub mod effnet;
mod error;
pub mod extractor;
pub mod model;

pub use code::ErrorCode;
pub use effnet::{Batcher, EffnetConfig, EffnetModel};
pub use error::EmbeddingError;
pub use extractor::{Extraction, Extractor, ExtractorConfig, l2_normalize, mean_pool};
pub use model::EmbeddingModel;
