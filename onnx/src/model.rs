//! Model registry: declare models by ID and track them from download to release.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::OnnxError;
use crate::onnx::Session;

/// Identifies a built-in model.
pub struct ModelId;

impl ModelId {
    /// Discogs-EffNet track embedding model.
    /// Input: [B, 128, 96] float32 (log mel patches)
    /// Output: [B, 1280] float32 (per-patch embedding)
    pub const DISCOGS_EFFNET_TRACK: &str = "discogs-effnet-track";
}

/// Where a model comes from and how its graph is bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
    /// File name inside the model directory.
    pub filename: String,
    pub url: String,
    /// Graph input to feed. The first graph input when unset.
    #[serde(default)]
    pub input: Option<String>,
    /// Graph output holding the embeddings.
    pub output: String,
}

impl ModelDescriptor {
    pub fn discogs_effnet_track() -> Self {
        Self {
            name: ModelId::DISCOGS_EFFNET_TRACK.to_string(),
            filename: "discogs-effnet-bsdynamic-1.onnx".to_string(),
            url: concat!(
                "https://essentia.upf.edu/models/feature-extractors/",
                "discogs-effnet/discogs-effnet-bsdynamic-1.onnx",
            )
            .to_string(),
            input: None,
            output: "embeddings".to_string(),
        }
    }

    /// Returns the built-in descriptor for `name`, if any.
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            ModelId::DISCOGS_EFFNET_TRACK => Some(Self::discogs_effnet_track()),
            _ => None,
        }
    }
}

impl Default for ModelDescriptor {
    fn default() -> Self {
        Self::discogs_effnet_track()
    }
}

/// Lifecycle of a declared model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    Unloaded,
    PresentOnDisk,
    Loaded,
}

impl fmt::Display for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModelState::Unloaded => "unloaded",
            ModelState::PresentOnDisk => "present on disk",
            ModelState::Loaded => "loaded",
        })
    }
}

struct Slot<T> {
    descriptor: ModelDescriptor,
    path: Option<PathBuf>,
    instance: Option<Arc<T>>,
}

impl<T> Slot<T> {
    fn state(&self) -> ModelState {
        match (&self.instance, &self.path) {
            (Some(_), _) => ModelState::Loaded,
            (None, Some(_)) => ModelState::PresentOnDisk,
            (None, None) => ModelState::Unloaded,
        }
    }
}

/// Tracks declared models and at most one loaded instance per model.
///
/// The registry is an explicit value owned by the service; there is no
/// process-wide table. Loading a model that is already loaded is rejected,
/// so an instance is only replaced after `release`.
pub struct ModelRegistry<T = Session> {
    slots: HashMap<String, Slot<T>>,
}

impl<T> Default for ModelRegistry<T> {
    fn default() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }
}

impl<T> ModelRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a model. Redeclaring keeps a loaded instance untouched.
    pub fn declare(&mut self, descriptor: ModelDescriptor) {
        match self.slots.get_mut(&descriptor.name) {
            Some(slot) if slot.instance.is_some() => {}
            Some(slot) => slot.descriptor = descriptor,
            None => {
                self.slots.insert(
                    descriptor.name.clone(),
                    Slot {
                        descriptor,
                        path: None,
                        instance: None,
                    },
                );
            }
        }
    }

    pub fn descriptor(&self, name: &str) -> Option<&ModelDescriptor> {
        self.slots.get(name).map(|s| &s.descriptor)
    }

    pub fn state(&self, name: &str) -> Option<ModelState> {
        self.slots.get(name).map(Slot::state)
    }

    /// Returns the IDs of all declared models.
    pub fn names(&self) -> Vec<String> {
        self.slots.keys().cloned().collect()
    }

    /// Records that the model artifact exists at `path`.
    pub fn mark_present(&mut self, name: &str, path: &Path) -> Result<(), OnnxError> {
        let slot = self.slot_mut(name)?;
        if slot.instance.is_some() {
            return Err(OnnxError::AlreadyLoaded(name.to_string()));
        }
        slot.path = Some(path.to_path_buf());
        Ok(())
    }

    /// Builds the in-memory instance with `load` and stores it.
    ///
    /// The model must be present on disk and not loaded yet. A failed load
    /// leaves the model present on disk.
    pub fn load_with<F>(&mut self, name: &str, load: F) -> Result<Arc<T>, OnnxError>
    where
        F: FnOnce(&Path, &ModelDescriptor) -> Result<T, OnnxError>,
    {
        let slot = self.slot_mut(name)?;
        let state = slot.state();
        if state == ModelState::Loaded {
            return Err(OnnxError::AlreadyLoaded(name.to_string()));
        }
        let Some(path) = slot.path.as_deref() else {
            return Err(OnnxError::InvalidState {
                name: name.to_string(),
                state,
                expected: ModelState::PresentOnDisk,
            });
        };

        let instance = Arc::new(load(path, &slot.descriptor)?);
        slot.instance = Some(instance.clone());
        tracing::info!(model = name, path = %path.display(), "model loaded");
        Ok(instance)
    }

    /// Returns the loaded instance, if any.
    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        self.slots.get(name).and_then(|s| s.instance.clone())
    }

    /// Drops the registry's reference to a loaded model.
    ///
    /// Returns false if the model was not loaded. The model goes back to
    /// unloaded; clones of the instance held elsewhere stay valid until dropped.
    pub fn release(&mut self, name: &str) -> bool {
        let Some(slot) = self.slots.get_mut(name) else {
            return false;
        };
        let released = slot.instance.take().is_some();
        slot.path = None;
        if released {
            tracing::info!(model = name, "model released");
        }
        released
    }

    /// Releases every loaded model.
    pub fn release_all(&mut self) {
        let names = self.names();
        for name in names {
            self.release(&name);
        }
    }

    fn slot_mut(&mut self, name: &str) -> Result<&mut Slot<T>, OnnxError> {
        self.slots
            .get_mut(name)
            .ok_or_else(|| OnnxError::ModelNotRegistered(name.to_string()))
    }
}

impl ModelRegistry<Session> {
    /// Loads the ONNX session for a model present on disk.
    pub fn load(&mut self, name: &str) -> Result<Arc<Session>, OnnxError> {
        self.load_with(name, Session::from_descriptor)
    }
}
