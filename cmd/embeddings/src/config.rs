//! Service configuration.
//!
//! Stored as YAML in ~/.coral/embeddings/config.yaml unless `--config` points
//! elsewhere. Every key is optional.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use coral_embeddings::ExtractorConfig;
use coral_onnx::ModelDescriptor;
use serde::{Deserialize, Serialize};

/// Default base configuration directory name.
pub const DEFAULT_BASE_DIR: &str = ".coral";
/// Application directory under the base directory.
pub const APP_NAME: &str = "embeddings";
/// Default configuration filename.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Default listen address.
pub const DEFAULT_LISTEN: &str = ":8000";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listen address, `host:port` or `:port`.
    pub listen: String,
    /// Directory holding downloaded model artifacts.
    pub model_dir: PathBuf,
    pub model: ModelConfig,
    pub extractor: ExtractorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            model_dir: default_model_dir(),
            model: ModelConfig::default(),
            extractor: ExtractorConfig::default(),
        }
    }
}

/// Overrides applied on top of the built-in model descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl ModelConfig {
    /// Resolves the descriptor: the built-in entry for `name` (Discogs-EffNet
    /// when unset or unknown) with every configured field replacing its default.
    pub fn descriptor(&self) -> ModelDescriptor {
        let mut d = self
            .name
            .as_deref()
            .and_then(ModelDescriptor::builtin)
            .unwrap_or_default();
        if let Some(name) = &self.name {
            d.name = name.clone();
        }
        if let Some(filename) = &self.filename {
            d.filename = filename.clone();
        }
        if let Some(url) = &self.url {
            d.url = url.clone();
        }
        if self.input.is_some() {
            d.input = self.input.clone();
        }
        if let Some(output) = &self.output {
            d.output = output.clone();
        }
        d
    }
}

impl Config {
    /// Gets the default config directory.
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFAULT_BASE_DIR).join(APP_NAME))
    }

    /// Gets the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        Self::default_config_dir().map(|dir| dir.join(DEFAULT_CONFIG_FILE))
    }

    /// Loads the configuration.
    ///
    /// An explicit path must exist. The default path is optional; when it is
    /// missing the defaults are used and nothing is written.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_file(path),
            None => match Self::default_config_path() {
                Some(path) if path.exists() => Self::load_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// Parses YAML config content. Empty content yields the defaults.
    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }
}

fn default_model_dir() -> PathBuf {
    Config::default_config_dir()
        .map(|dir| dir.join("models"))
        .unwrap_or_else(|| PathBuf::from("models"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use coral_onnx::ModelId;

    #[test]
    fn defaults() {
        let cfg = Config::parse("").unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.listen, ":8000");
        assert!(cfg.model_dir.ends_with("models"));
        assert_eq!(cfg.model.descriptor(), ModelDescriptor::discogs_effnet_track());
        assert_eq!(cfg.extractor, ExtractorConfig::default());
    }

    #[test]
    fn partial_yaml() {
        let cfg = Config::parse(
            r#"
listen: "127.0.0.1:9000"
model_dir: /srv/models
model:
  url: http://mirror.local/effnet.onnx
  output: PartitionedCall:1
extractor:
  normalize: true
"#,
        )
        .unwrap();
        assert_eq!(cfg.listen, "127.0.0.1:9000");
        assert_eq!(cfg.model_dir, PathBuf::from("/srv/models"));
        assert!(cfg.extractor.normalize);
        assert_eq!(cfg.extractor.batch_size, 64);

        let d = cfg.model.descriptor();
        assert_eq!(d.name, ModelId::DISCOGS_EFFNET_TRACK);
        assert_eq!(d.filename, "discogs-effnet-bsdynamic-1.onnx");
        assert_eq!(d.url, "http://mirror.local/effnet.onnx");
        assert_eq!(d.output, "PartitionedCall:1");
        assert_eq!(d.input, None);
    }

    #[test]
    fn custom_model_name() {
        let cfg = Config::parse("model:\n  name: my-model\n  filename: my.onnx\n").unwrap();
        let d = cfg.model.descriptor();
        assert_eq!(d.name, "my-model");
        assert_eq!(d.filename, "my.onnx");
        assert_eq!(d.output, "embeddings");
    }

    #[test]
    fn invalid_yaml() {
        assert!(Config::parse("extractor: [1, 2]").is_err());
    }

    #[test]
    fn load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "listen: ':7000'\n").unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap().listen, ":7000");

        assert!(Config::load(Some(&dir.path().join("missing.yaml"))).is_err());
    }
}
