//! Safe wrapper around an ONNX Runtime session bound to one input and one output.

use std::path::Path;

use ndarray::{ArrayD, ArrayViewD};
use ort::session::Session as OrtSession;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::TensorRef;
use parking_lot::Mutex;

use crate::error::OnnxError;
use crate::model::ModelDescriptor;

/// Holds a loaded ONNX model.
///
/// The input and output tensor names are resolved once at load time. ONNX
/// Runtime needs exclusive access for `run`, so the session sits behind a
/// mutex and `run` takes `&self`; the session itself is never replaced.
pub struct Session {
    inner: Mutex<OrtSession>,
    input_name: String,
    output_name: String,
}

impl Session {
    /// Loads the model file for `descriptor`.
    ///
    /// The input defaults to the first graph input when the descriptor does
    /// not name one. The output must exist in the graph.
    pub fn from_descriptor(path: &Path, descriptor: &ModelDescriptor) -> Result<Self, OnnxError> {
        Self::from_file(path, descriptor.input.as_deref(), &descriptor.output)
    }

    /// Loads an ONNX model file.
    pub fn from_file(path: &Path, input: Option<&str>, output: &str) -> Result<Self, OnnxError> {
        let session = OrtSession::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(path)?;

        let inputs: Vec<String> = session.inputs.iter().map(|i| i.name.clone()).collect();
        let outputs: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        tracing::debug!(?inputs, ?outputs, path = %path.display(), "onnx session created");

        let input_name = match input {
            Some(name) if inputs.iter().any(|i| i == name) => name.to_string(),
            Some(name) => {
                return Err(OnnxError::InputNotFound {
                    name: name.to_string(),
                    available: inputs,
                });
            }
            None => inputs.first().cloned().ok_or(OnnxError::NoInputs)?,
        };
        if !outputs.iter().any(|o| o == output) {
            return Err(OnnxError::OutputNotFound {
                name: output.to_string(),
                available: outputs,
            });
        }

        Ok(Self {
            inner: Mutex::new(session),
            input_name,
            output_name: output.to_string(),
        })
    }

    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    /// Runs inference on a single f32 input and returns the bound output.
    pub fn run(&self, input: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, OnnxError> {
        let tensor = TensorRef::from_array_view(input)?;

        let mut session = self.inner.lock();
        let outputs = session.run(ort::inputs![self.input_name.as_str() => tensor])?;
        let value = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| OnnxError::OutputNotFound {
                name: self.output_name.clone(),
                available: Vec::new(),
            })?;
        let array = value.try_extract_array::<f32>()?.to_owned();
        Ok(array)
    }
}
