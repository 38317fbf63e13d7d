//! Application context shared by frontends.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{self, ConfigScope, ConfigStore, StrataConfig};
use crate::model::{ConfiguredConditionPolicy, Model, ModelConfigStore, ModelResult, PluginRegistry};
use crate::workspace::{Workspace, WorkspaceResult, policy_from_config};

/// Default model file, relative to the workspace root.
pub const DEFAULT_MODEL_FILE: &str = "model.toml";

/// Paths and merged configuration for one invocation.
///
/// Frontends create this once and build the model and workspace from it.
#[derive(Debug, Clone)]
pub struct AppContext {
    workspace_root: PathBuf,
    global_config_dir: PathBuf,
    config: StrataConfig,
}

impl AppContext {
    /// Load the global and project configuration for `workspace_root`.
    pub fn load(workspace_root: PathBuf) -> anyhow::Result<Self> {
        let global_config_dir = config::global_config_dir()?;
        Self::with_global_config_dir(workspace_root, global_config_dir)
    }

    /// Same as [`AppContext::load`] with a custom global config directory.
    pub fn with_global_config_dir(
        workspace_root: PathBuf,
        global_config_dir: PathBuf,
    ) -> anyhow::Result<Self> {
        let config = config::load_merged(&global_config_dir, &workspace_root)?;
        Ok(Self {
            workspace_root,
            global_config_dir,
            config,
        })
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn global_config_dir(&self) -> &Path {
        &self.global_config_dir
    }

    pub fn config(&self) -> &StrataConfig {
        &self.config
    }

    pub fn config_store(&self, scope: ConfigScope) -> ConfigStore {
        ConfigStore::from_paths(
            scope,
            self.global_config_dir.clone(),
            self.workspace_root.clone(),
        )
    }

    pub fn model_config_path(&self) -> PathBuf {
        self.config
            .model
            .config
            .clone()
            .unwrap_or_else(|| self.workspace_root.join(DEFAULT_MODEL_FILE))
    }

    pub fn condition_policy(&self) -> ConfiguredConditionPolicy {
        ConfiguredConditionPolicy::new(
            self.config
                .conditions
                .iter()
                .map(|(name, decision)| (name.clone(), *decision))
                .collect(),
        )
    }

    /// Load the model with the built-in plugin classes.
    pub fn model(&self) -> ModelResult<Model> {
        let store = ModelConfigStore::new(self.model_config_path());
        let plugins = Arc::new(PluginRegistry::with_builtin_classes());
        Ok(Model::load(store, plugins)?.with_condition_policy(self.condition_policy()))
    }

    /// Open the workspace with the configured policy.
    pub fn workspace(&self) -> WorkspaceResult<Workspace> {
        let policy = policy_from_config(&self.config.workspace)?;
        Workspace::open(
            self.workspace_root.clone(),
            policy,
            self.config.workspace.metadata_dir(),
        )
    }
}
