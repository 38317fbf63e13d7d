//! Config path resolution helpers.

use std::path::{Path, PathBuf};

use super::ConfigScope;

pub const CONFIG_FILE_NAME: &str = "strata.toml";

pub fn config_path_for_scope(scope: ConfigScope, global_dir: &Path, project_root: &Path) -> PathBuf {
    match scope {
        ConfigScope::Global => global_dir.join(CONFIG_FILE_NAME),
        ConfigScope::Project => project_root.join(CONFIG_FILE_NAME),
    }
}

/// `<config dir>/strata`, falling back to `~/.config/strata`.
pub fn global_config_dir() -> anyhow::Result<PathBuf> {
    if let Some(dir) = dirs::config_dir() {
        return Ok(dir.join("strata"));
    }
    dirs::home_dir()
        .map(|home| home.join(".config").join("strata"))
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
}
