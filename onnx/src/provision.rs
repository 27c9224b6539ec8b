//! Model artifact provisioning: fetch once, load, hand out the session.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::error::ProvisionError;
use crate::model::{ModelDescriptor, ModelRegistry};
use crate::onnx::Session;

/// Write buffer size for model downloads.
pub const DOWNLOAD_CHUNK_SIZE: usize = 4096;

/// Downloads model artifacts into a local directory.
#[derive(Debug, Clone)]
pub struct Provisioner {
    client: reqwest::Client,
    model_dir: PathBuf,
}

impl Provisioner {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self::with_client(model_dir, reqwest::Client::new())
    }

    pub fn with_client(model_dir: impl Into<PathBuf>, client: reqwest::Client) -> Self {
        Self {
            client,
            model_dir: model_dir.into(),
        }
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Returns the local path of a model artifact.
    pub fn model_path(&self, descriptor: &ModelDescriptor) -> PathBuf {
        self.model_dir.join(&descriptor.filename)
    }

    /// Makes sure the artifact exists locally, downloading it if absent.
    ///
    /// The body is streamed to `<filename>.part` and renamed into place once
    /// complete, so an interrupted download never leaves a file that looks
    /// finished. An existing file is trusted as is.
    pub async fn ensure_present(
        &self,
        descriptor: &ModelDescriptor,
    ) -> Result<PathBuf, ProvisionError> {
        let path = self.model_path(descriptor);
        if tokio::fs::try_exists(&path).await.map_err(io_err(&path))? {
            tracing::debug!(
                model = %descriptor.name,
                path = %path.display(),
                "model already present"
            );
            return Ok(path);
        }

        tokio::fs::create_dir_all(&self.model_dir)
            .await
            .map_err(io_err(&self.model_dir))?;

        tracing::info!(model = %descriptor.name, url = %descriptor.url, "downloading model");
        let download_err = |source| ProvisionError::Download {
            url: descriptor.url.clone(),
            source,
        };
        let response = self
            .client
            .get(&descriptor.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(download_err)?;

        let part = self.model_dir.join(format!("{}.part", descriptor.filename));
        let written = match self.stream_to(response, &part).await {
            Ok(n) => n,
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                return Err(e);
            }
        };
        tokio::fs::rename(&part, &path).await.map_err(io_err(&path))?;

        tracing::info!(
            model = %descriptor.name,
            bytes = written,
            path = %path.display(),
            "model downloaded"
        );
        Ok(path)
    }

    async fn stream_to(
        &self,
        response: reqwest::Response,
        part: &Path,
    ) -> Result<u64, ProvisionError> {
        let url = response.url().to_string();
        let file = tokio::fs::File::create(part).await.map_err(io_err(part))?;
        let mut writer = BufWriter::with_capacity(DOWNLOAD_CHUNK_SIZE, file);

        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| ProvisionError::Download {
                url: url.clone(),
                source,
            })?;
            writer.write_all(&chunk).await.map_err(io_err(part))?;
            written += chunk.len() as u64;
        }

        writer.flush().await.map_err(io_err(part))?;
        writer.into_inner().sync_all().await.map_err(io_err(part))?;
        Ok(written)
    }

    /// Declares, fetches and loads a model into `registry`.
    ///
    /// Returns the registry's existing session when the model is already loaded.
    pub async fn provision(
        &self,
        registry: &mut ModelRegistry<Session>,
        descriptor: &ModelDescriptor,
    ) -> Result<Arc<Session>, ProvisionError> {
        if let Some(session) = registry.get(&descriptor.name) {
            return Ok(session);
        }
        registry.declare(descriptor.clone());

        let path = self.ensure_present(descriptor).await?;
        registry.mark_present(&descriptor.name, &path)?;

        let session = registry.load(&descriptor.name)?;
        tracing::info!(
            model = %descriptor.name,
            input = session.input_name(),
            output = session.output_name(),
            "model ready"
        );
        Ok(session)
    }
}

fn io_err(path: &Path) -> impl Fn(std::io::Error) -> ProvisionError + '_ {
    move |source| ProvisionError::Io {
        path: path.display().to_string(),
        source,
    }
}
