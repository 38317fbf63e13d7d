//! Configuration layer merging: Global -> Project.

use super::schema::StrataConfig;

/// Merge the global and project layers; project values win key by key.
pub fn merge_configs(global: Option<StrataConfig>, project: Option<StrataConfig>) -> StrataConfig {
    let mut merged = global.unwrap_or_default();
    let Some(layer) = project else {
        return merged;
    };

    if layer.model.config.is_some() {
        merged.model.config = layer.model.config;
    }

    let workspace = layer.workspace;
    if workspace.policy.is_some() {
        merged.workspace.policy = workspace.policy;
    }
    if workspace.main_module.is_some() {
        merged.workspace.main_module = workspace.main_module;
    }
    if workspace.metadata_dir.is_some() {
        merged.workspace.metadata_dir = workspace.metadata_dir;
    }

    merged.conditions.extend(layer.conditions);
    merged
}
