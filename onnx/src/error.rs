use std::io;

use thiserror::Error;

/// Errors returned by ONNX Runtime sessions and the model registry.
#[derive(Debug, Error)]
pub enum OnnxError {
    #[error("onnx: {0}")]
    Runtime(#[from] ort::Error),

    #[error("onnx: model {0:?} not registered")]
    ModelNotRegistered(String),

    #[error("onnx: model {0:?} is already loaded")]
    AlreadyLoaded(String),

    #[error("onnx: model {name:?} is {state}, expected {expected}")]
    InvalidState {
        name: String,
        state: crate::ModelState,
        expected: crate::ModelState,
    },

    #[error("onnx: input {name:?} not found, graph has {available:?}")]
    InputNotFound { name: String, available: Vec<String> },

    #[error("onnx: output {name:?} not found, graph has {available:?}")]
    OutputNotFound { name: String, available: Vec<String> },

    #[error("onnx: model has no inputs")]
    NoInputs,
}

/// Errors that abort model provisioning at startup.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("provision: download {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("provision: {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Onnx(#[from] OnnxError),
}
