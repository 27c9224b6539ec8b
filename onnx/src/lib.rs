//! ONNX model plumbing for the embedding service.
//!
//! - [`Session`]: an ONNX Runtime session bound to one input and one output
//! - [`ModelRegistry`]: declared models and their loaded instances
//! - [`Provisioner`]: downloads model artifacts into a local directory
//!
//! # Usage
//!
//! ```no_run
//! use coral_onnx::{ModelDescriptor, ModelRegistry, Provisioner};
//!
//! # async fn run() -> Result<(), coral_onnx::ProvisionError> {
//! let provisioner = Provisioner::new("/var/lib/coral/models");
//! let mut registry = ModelRegistry::new();
//! let session = provisioner
//!     .provision(&mut registry, &ModelDescriptor::discogs_effnet_track())
//!     .await?;
//! println!("bound to {}", session.output_name());
//! # Ok(())
//! # }
//! ```

mod error;
pub mod model;
mod onnx;
pub mod provision;

pub use error::{OnnxError, ProvisionError};
pub use model::{ModelDescriptor, ModelId, ModelRegistry, ModelState};
pub use onnx::Session;
pub use provision::{DOWNLOAD_CHUNK_SIZE, Provisioner};
