//! Loading and saving `model.toml`.

use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::definitions::ModelConfig;
use super::error::{ModelError, ModelResult};

#[derive(Debug, Clone)]
pub struct ModelConfigStore {
    path: PathBuf,
}

impl ModelConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the model configuration. A missing file is an empty model.
    pub fn load(&self) -> ModelResult<ModelConfig> {
        if !self.path.exists() {
            return Ok(ModelConfig::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read model config: {}", self.path.display()))?;
        let config: ModelConfig = toml::from_str(&content).map_err(|e| {
            ModelError::InvalidConfig(format!("{}: {}", self.path.display(), e))
        })?;
        config
            .validate()
            .map_err(|e| ModelError::InvalidConfig(format!("{}: {:#}", self.path.display(), e)))?;
        Ok(config)
    }

    pub fn save(&self, config: &ModelConfig) -> ModelResult<()> {
        let content =
            toml::to_string_pretty(config).context("Failed to serialize model config to TOML")?;
        crate::fs::write_atomic(&self.path, content.as_bytes())?;
        debug!(path = %self.path.display(), "saved model config");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::sample_config;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty_model() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let store = ModelConfigStore::new(tmp.path().join("model.toml"));
        assert_eq!(store.load().unwrap(), ModelConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let store = ModelConfigStore::new(tmp.path().join("conf").join("model.toml"));
        store.save(&sample_config()).unwrap();
        assert_eq!(store.load().unwrap(), sample_config());
    }

    #[test]
    fn test_invalid_toml_is_user_error() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let path = tmp.path().join("model.toml");
        std::fs::write(&path, "[root\n").unwrap();
        let err = ModelConfigStore::new(path).load().unwrap_err();
        assert_eq!(err.class(), crate::error::ErrorClass::User);
    }
}
