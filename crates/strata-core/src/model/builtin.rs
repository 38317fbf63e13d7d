//! Plugin classes shipped with strata, configured through node properties.

use regex::Regex;
use std::sync::Arc;

use super::artifact::{ArtifactGroupId, ArtifactInfo, ArtifactProduction, FindModuleByArtifact};
use super::dynamic::{DynamicNodeSpec, UndefinedDescendantNodeManager};
use super::plugin::{PluginClass, PluginContext, PluginRegistry};

pub const PROPERTY_ARTIFACT_INFO: &str = "property-artifact-info";
pub const ARTIFACT_ID_MODULE_FINDER: &str = "artifact-id-module-finder";
pub const PERMISSIVE_MODULE_MANAGER: &str = "permissive-module-manager";

/// Comma-separated `group:artifact` list produced by a module.
pub const ARTIFACT_GROUP_ID_PRODUCED_LIST: &str = "ARTIFACT_GROUP_ID_PRODUCED_LIST";
/// When `true`, the produced list is a guess rather than definitive.
pub const ARTIFACT_INFO_POSSIBLE: &str = "ARTIFACT_INFO_POSSIBLE";
/// Prefix stripped from artifact ids to obtain module names.
pub const MODULE_NAME_PREFIX: &str = "MODULE_NAME_PREFIX";
pub const FIND_MODULE_OPTIMISTIC: &str = "FIND_MODULE_OPTIMISTIC";
/// Pattern a requested name must fully match to be materialised.
pub const DYNAMIC_MODULE_NAME_REGEX: &str = "DYNAMIC_MODULE_NAME_REGEX";
/// Group id given to dynamically materialised modules, which then produce
/// `<group>:<module name>`.
pub const DYNAMIC_MODULE_GROUP_ID: &str = "DYNAMIC_MODULE_GROUP_ID";

pub(crate) fn register_builtin_classes(registry: &mut PluginRegistry) {
    registry.register(
        PluginClass::direct(PROPERTY_ARTIFACT_INFO, PropertyArtifactInfo::from_context)
            .implements::<dyn ArtifactInfo, _>(|plugin| plugin as Arc<dyn ArtifactInfo>)
            .build(),
    );
    registry.register(
        PluginClass::direct(ARTIFACT_ID_MODULE_FINDER, ArtifactIdModuleFinder::from_context)
            .implements::<dyn FindModuleByArtifact, _>(|plugin| {
                plugin as Arc<dyn FindModuleByArtifact>
            })
            .build(),
    );
    registry.register(
        PluginClass::direct(PERMISSIVE_MODULE_MANAGER, PermissiveModuleManager::from_context)
            .implements::<dyn UndefinedDescendantNodeManager, _>(|plugin| {
                plugin as Arc<dyn UndefinedDescendantNodeManager>
            })
            .build(),
    );
}

/// Produced artifacts read from module properties.
#[derive(Debug, Clone)]
pub struct PropertyArtifactInfo {
    produced: Vec<ArtifactGroupId>,
    possible: bool,
}

impl PropertyArtifactInfo {
    pub fn from_context(context: &PluginContext<'_>) -> anyhow::Result<Self> {
        let produced = context
            .property(ARTIFACT_GROUP_ID_PRODUCED_LIST)?
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::parse)
            .collect::<anyhow::Result<Vec<ArtifactGroupId>>>()?;
        let possible = context
            .model()
            .is_property_true(context.node(), ARTIFACT_INFO_POSSIBLE)?;
        Ok(Self { produced, possible })
    }
}

impl ArtifactInfo for PropertyArtifactInfo {
    fn production(&self, artifact: &ArtifactGroupId) -> ArtifactProduction {
        if !self.produced.contains(artifact) {
            ArtifactProduction::No
        } else if self.possible {
            ArtifactProduction::Possibly
        } else {
            ArtifactProduction::Definitely
        }
    }
}

/// Candidate module name derived from the artifact id.
#[derive(Debug, Clone)]
pub struct ArtifactIdModuleFinder {
    prefix: Option<String>,
    optimistic: bool,
}

impl ArtifactIdModuleFinder {
    pub fn from_context(context: &PluginContext<'_>) -> anyhow::Result<Self> {
        Ok(Self {
            prefix: context.property(MODULE_NAME_PREFIX)?,
            optimistic: context
                .model()
                .is_property_true(context.node(), FIND_MODULE_OPTIMISTIC)?,
        })
    }
}

impl FindModuleByArtifact for ArtifactIdModuleFinder {
    fn candidate_module_names(
        &self,
        _context: &PluginContext<'_>,
        artifact: &ArtifactGroupId,
    ) -> anyhow::Result<Vec<String>> {
        let artifact_id = artifact.artifact_id();
        let name = match &self.prefix {
            Some(prefix) => match artifact_id.strip_prefix(prefix.as_str()) {
                Some(rest) if !rest.is_empty() => rest,
                _ => return Ok(Vec::new()),
            },
            None => artifact_id,
        };
        Ok(vec![name.to_string()])
    }

    fn is_optimistic(&self) -> bool {
        self.optimistic
    }
}

/// Materialises any module whose name matches a pattern.
#[derive(Debug, Clone)]
pub struct PermissiveModuleManager {
    pattern: Option<Regex>,
}

impl PermissiveModuleManager {
    pub fn from_context(context: &PluginContext<'_>) -> anyhow::Result<Self> {
        let pattern = context
            .property(DYNAMIC_MODULE_NAME_REGEX)?
            .map(|p| Regex::new(&format!("^(?:{})$", p)))
            .transpose()?;
        Ok(Self { pattern })
    }
}

impl UndefinedDescendantNodeManager for PermissiveModuleManager {
    fn request_node(
        &self,
        context: &PluginContext<'_>,
        name: &str,
    ) -> anyhow::Result<Option<DynamicNodeSpec>> {
        if self.pattern.as_ref().is_some_and(|re| !re.is_match(name)) {
            return Ok(None);
        }
        let mut spec = DynamicNodeSpec::module();
        if let Some(group) = context.property(DYNAMIC_MODULE_GROUP_ID)? {
            spec = spec.with_property(
                ARTIFACT_GROUP_ID_PRODUCED_LIST,
                Some(format!("{}:{}", group, name)),
            );
        }
        Ok(Some(spec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_classes_registered() {
        let registry = PluginRegistry::with_builtin_classes();
        assert_eq!(
            registry.class_names(),
            vec![
                ARTIFACT_ID_MODULE_FINDER,
                PERMISSIVE_MODULE_MANAGER,
                PROPERTY_ARTIFACT_INFO
            ]
        );
        let info = registry.get(PROPERTY_ARTIFACT_INFO).unwrap();
        assert!(info.declares("ArtifactInfo"));
        assert!(!info.declares("FindModuleByArtifact"));
    }

    #[test]
    fn test_finder_strips_prefix() {
        let finder = ArtifactIdModuleFinder {
            prefix: Some("acme-".to_string()),
            optimistic: false,
        };
        let model = crate::model::test_support::sample_model();
        let context = PluginContext::new(&model, model.get_classification_node_root());
        assert_eq!(
            finder
                .candidate_module_names(&context, &ArtifactGroupId::new("com.acme", "acme-core"))
                .unwrap(),
            vec!["core".to_string()]
        );
        assert!(
            finder
                .candidate_module_names(&context, &ArtifactGroupId::new("com.acme", "other"))
                .unwrap()
                .is_empty()
        );
    }
}
