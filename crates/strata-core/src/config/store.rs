//! Config store for loading and saving strata.toml.

use std::path::{Path, PathBuf};

use anyhow::Context;

use super::{ConfigScope, StrataConfig, parser, paths::config_path_for_scope};

#[derive(Debug, Clone)]
pub struct ConfigStore {
    scope: ConfigScope,
    config_path: PathBuf,
    project_root: PathBuf,
}

impl ConfigStore {
    pub fn from_scope(scope: ConfigScope) -> anyhow::Result<Self> {
        let global_dir = super::paths::global_config_dir()?;
        let project_root = std::env::current_dir()?;

        Ok(Self::from_paths(scope, global_dir, project_root))
    }

    pub fn from_paths(scope: ConfigScope, global_dir: PathBuf, project_root: PathBuf) -> Self {
        let config_path = config_path_for_scope(scope, &global_dir, &project_root);
        Self {
            scope,
            config_path,
            project_root,
        }
    }

    pub fn scope(&self) -> ConfigScope {
        self.scope
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Load the file, or an empty configuration when it does not exist.
    pub fn load(&self) -> anyhow::Result<StrataConfig> {
        Ok(self.load_if_exists()?.unwrap_or_default())
    }

    pub fn load_if_exists(&self) -> anyhow::Result<Option<StrataConfig>> {
        if !self.config_path.exists() {
            return Ok(None);
        }
        let mut config = parser::parse_strata_toml(&self.config_path)?;
        if let Some(base) = self.config_path.parent() {
            config.resolve_relative_paths(base);
        }
        Ok(Some(config))
    }

    pub fn save(&self, config: &StrataConfig) -> anyhow::Result<()> {
        let content = parser::to_toml(config).context("Failed to serialize config to TOML")?;
        crate::fs::write_atomic(&self.config_path, content.as_bytes()).with_context(|| {
            format!("Failed to write config file: {}", self.config_path.display())
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::PolicyKind;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_project_scope() {
        let global = TempDir::new().expect("tempdir should succeed");
        let project = TempDir::new().expect("tempdir should succeed");
        let store = ConfigStore::from_paths(
            ConfigScope::Project,
            global.path().to_path_buf(),
            project.path().to_path_buf(),
        );
        assert_eq!(store.config_path(), project.path().join("strata.toml"));
        assert!(store.load_if_exists().unwrap().is_none());

        let mut config = StrataConfig::new();
        config.workspace.policy = Some(PolicyKind::SingleModule);
        store.save(&config).unwrap();
        assert_eq!(store.load().unwrap(), config);
    }
}
