//! Tool configuration (`strata.toml`) for the global and project scopes.
//!
//! The project file overrides the global one key by key.

pub mod merge;
pub mod parser;
pub mod paths;
pub mod schema;
pub mod store;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ErrorClass;

pub use merge::merge_configs;
pub use parser::{parse_strata_toml, parse_strata_toml_str, to_toml};
pub use paths::{CONFIG_FILE_NAME, config_path_for_scope, global_config_dir};
pub use schema::{DEFAULT_METADATA_DIR, ModelSection, StrataConfig, WorkspaceSection};
pub use store::ConfigStore;

/// Configuration scope levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigScope {
    /// `<config dir>/strata/strata.toml`
    Global,
    /// `<workspace>/strata.toml`
    Project,
}

/// Problems in a configuration file the user has to fix.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn class(&self) -> ErrorClass {
        ErrorClass::User
    }
}

/// Load both scopes and merge them.
pub fn load_merged(global_dir: &Path, project_root: &Path) -> anyhow::Result<StrataConfig> {
    let global = ConfigStore::from_paths(
        ConfigScope::Global,
        global_dir.to_path_buf(),
        project_root.to_path_buf(),
    );
    let project = ConfigStore::from_paths(
        ConfigScope::Project,
        global_dir.to_path_buf(),
        project_root.to_path_buf(),
    );
    Ok(merge_configs(global.load_if_exists()?, project.load_if_exists()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConditionDecision;
    use crate::workspace::PolicyKind;
    use tempfile::TempDir;

    #[test]
    fn test_load_merged_project_overrides_global() {
        let global = TempDir::new().expect("tempdir should succeed");
        let project = TempDir::new().expect("tempdir should succeed");
        std::fs::write(
            global.path().join(CONFIG_FILE_NAME),
            r#"
[workspace]
policy = "single-module"

[conditions]
module-not-found = "abort"
"#,
        )
        .unwrap();
        std::fs::write(
            project.path().join(CONFIG_FILE_NAME),
            r#"
[model]
config = "model.toml"

[workspace]
policy = "multi-module"
"#,
        )
        .unwrap();

        let merged = load_merged(global.path(), project.path()).unwrap();
        assert_eq!(merged.workspace.policy(), PolicyKind::MultiModule);
        assert_eq!(
            merged.model.config,
            Some(project.path().join("model.toml"))
        );
        assert_eq!(
            merged.conditions.get("module-not-found"),
            Some(&ConditionDecision::Abort)
        );
    }

    #[test]
    fn test_load_merged_without_files() {
        let global = TempDir::new().expect("tempdir should succeed");
        let project = TempDir::new().expect("tempdir should succeed");
        let merged = load_merged(global.path(), project.path()).unwrap();
        assert_eq!(merged, StrataConfig::default());
    }

    #[test]
    fn test_config_errors_are_user_errors() {
        let err = anyhow::Error::new(ConfigError::Invalid("bad".to_string()))
            .context("Failed to parse config file");
        assert_eq!(crate::error::classify(&err), ErrorClass::User);
    }
}
