//! Configuration schema for strata.toml

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use super::ConfigError;
use crate::model::{ConditionDecision, NodePath};
use crate::workspace::PolicyKind;

pub const DEFAULT_METADATA_DIR: &str = ".strata";

/// Root configuration structure for strata.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrataConfig {
    #[serde(default)]
    pub model: ModelSection,

    #[serde(default)]
    pub workspace: WorkspaceSection,

    /// Decision per exceptional condition name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub conditions: BTreeMap<String, ConditionDecision>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSection {
    /// Path to model.toml, relative to the file declaring it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<PolicyKind>,

    /// Module occupying the workspace root under the main-module policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_module: Option<NodePath>,

    /// Directory under the workspace root holding strata's own state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_dir: Option<String>,
}

impl WorkspaceSection {
    pub fn policy(&self) -> PolicyKind {
        self.policy.unwrap_or_default()
    }

    pub fn metadata_dir(&self) -> &str {
        self.metadata_dir.as_deref().unwrap_or(DEFAULT_METADATA_DIR)
    }
}

impl StrataConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(dir) = &self.workspace.metadata_dir {
            let path = Path::new(dir);
            let single_normal = path.components().count() == 1
                && matches!(path.components().next(), Some(Component::Normal(_)));
            if !single_normal {
                return Err(ConfigError::Invalid(format!(
                    "workspace.metadata_dir must be a plain directory name, got '{}'",
                    dir
                )));
            }
        }
        if let Some(main) = &self.workspace.main_module
            && main.is_root()
        {
            return Err(ConfigError::Invalid(
                "workspace.main_module must name a module, not the root".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve relative paths against the directory of the declaring file.
    pub fn resolve_relative_paths(&mut self, base: &Path) {
        if let Some(config) = &self.model.config
            && config.is_relative()
        {
            self.model.config = Some(base.join(config));
        }
    }
}
