//! Artifact coordinates and discovery of the module producing an artifact.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use super::condition::{ConditionDecision, ExceptionalCondition, MODULE_NOT_FOUND};
use super::definitions::NodeType;
use super::error::{ModelError, ModelResult};
use super::plugin::{PluginContext, PluginInterface};
use super::{Model, NodeId, ROOT};

/// Root property: artifacts matching this pattern stay in scope even when
/// the exclude pattern matches.
pub const INCLUDE_ARTIFACT_GROUP_ID_REGEX: &str = "INCLUDE_ARTIFACT_GROUP_ID_REGEX";

/// Root property: artifacts matching this pattern are outside the model.
pub const EXCLUDE_ARTIFACT_GROUP_ID_REGEX: &str = "EXCLUDE_ARTIFACT_GROUP_ID_REGEX";

/// `groupId:artifactId` coordinate of a build artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactGroupId {
    group_id: String,
    artifact_id: String,
}

impl ArtifactGroupId {
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
        }
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn artifact_id(&self) -> &str {
        &self.artifact_id
    }
}

impl fmt::Display for ArtifactGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group_id, self.artifact_id)
    }
}

impl FromStr for ArtifactGroupId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once(':') {
            Some((group, artifact))
                if !group.is_empty() && !artifact.is_empty() && !artifact.contains(':') =>
            {
                Ok(Self::new(group, artifact))
            }
            _ => anyhow::bail!("Invalid artifact '{}': expected <groupId>:<artifactId>", s),
        }
    }
}

impl Serialize for ArtifactGroupId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ArtifactGroupId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactProduction {
    Definitely,
    Possibly,
    No,
}

/// Module plugin describing the artifacts the module produces.
pub trait ArtifactInfo: Send + Sync {
    fn production(&self, artifact: &ArtifactGroupId) -> ArtifactProduction;
}

impl PluginInterface for dyn ArtifactInfo {
    const NAME: &'static str = "ArtifactInfo";
}

/// Classification-node plugin naming child modules, possibly not yet
/// materialised, that may produce an artifact.
pub trait FindModuleByArtifact: Send + Sync {
    fn candidate_module_names(
        &self,
        context: &PluginContext<'_>,
        artifact: &ArtifactGroupId,
    ) -> anyhow::Result<Vec<String>>;

    /// Accept the first existing candidate without asking its
    /// [`ArtifactInfo`].
    fn is_optimistic(&self) -> bool {
        false
    }
}

impl PluginInterface for dyn FindModuleByArtifact {
    const NAME: &'static str = "FindModuleByArtifact";
}

struct ArtifactScope {
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl ArtifactScope {
    fn from_root(model: &Model) -> ModelResult<Self> {
        Ok(Self {
            include: compile(model, INCLUDE_ARTIFACT_GROUP_ID_REGEX)?,
            exclude: compile(model, EXCLUDE_ARTIFACT_GROUP_ID_REGEX)?,
        })
    }

    fn contains(&self, artifact: &ArtifactGroupId) -> bool {
        let text = artifact.to_string();
        let excluded = self.exclude.as_ref().is_some_and(|re| re.is_match(&text));
        let included = self.include.as_ref().is_some_and(|re| re.is_match(&text));
        !excluded || included
    }
}

fn compile(model: &Model, property: &str) -> ModelResult<Option<Regex>> {
    let Some(pattern) = model.get_property(ROOT, property)? else {
        return Ok(None);
    };
    Regex::new(&format!("^(?:{})$", pattern))
        .map(Some)
        .map_err(|e| ModelError::InvalidConfig(format!("{} is not a valid regex: {}", property, e)))
}

/// Accepted candidate from one classification node.
struct Candidate {
    module: NodeId,
    definite: bool,
}

impl Model {
    /// Module producing `artifact`, if any.
    ///
    /// Artifacts outside the root's include/exclude scope resolve to `None`
    /// without consulting the condition policy. Results, including `None`,
    /// are cached until the producing module is deleted or the configuration
    /// changes.
    pub fn find_module_by_artifact_group_id(
        &mut self,
        artifact: &ArtifactGroupId,
    ) -> ModelResult<Option<NodeId>> {
        if let Some(cached) = self.artifact_cache.borrow().get(artifact) {
            debug!(%artifact, "artifact lookup served from cache");
            return Ok(*cached);
        }

        if !ArtifactScope::from_root(self)?.contains(artifact) {
            debug!(%artifact, "artifact outside model scope");
            return Ok(self.cache_artifact(artifact, None));
        }

        if let Some(module) = self.find_materialized_producer(artifact)? {
            return Ok(self.cache_artifact(artifact, Some(module)));
        }
        if let Some(module) = self.find_candidate_producer(artifact)? {
            return Ok(self.cache_artifact(artifact, Some(module)));
        }

        let condition = ExceptionalCondition::new(
            MODULE_NOT_FOUND,
            format!("no module produces artifact {}", artifact),
        );
        match self.condition_policy.decide(&condition) {
            ConditionDecision::Abort => Err(ModelError::Aborted {
                condition: condition.name,
                message: condition.message,
            }),
            ConditionDecision::Continue => {
                warn!(%artifact, "no module produces artifact, continuing");
                Ok(self.cache_artifact(artifact, None))
            }
        }
    }

    fn cache_artifact(&self, artifact: &ArtifactGroupId, module: Option<NodeId>) -> Option<NodeId> {
        self.artifact_cache
            .borrow_mut()
            .insert(artifact.clone(), module);
        module
    }

    fn module_production(
        &self,
        module: NodeId,
        artifact: &ArtifactGroupId,
    ) -> ModelResult<ArtifactProduction> {
        if !self.has_node_plugin::<dyn ArtifactInfo>(module, None)? {
            return Ok(ArtifactProduction::No);
        }
        Ok(self
            .get_node_plugin::<dyn ArtifactInfo>(module, None)?
            .production(artifact))
    }

    fn find_materialized_producer(&self, artifact: &ArtifactGroupId) -> ModelResult<Option<NodeId>> {
        let mut producers = Vec::new();
        for module in self.traverse_modules() {
            if self.module_production(module, artifact)? == ArtifactProduction::Definitely {
                producers.push(module);
            }
        }
        self.single_producer(artifact, producers)
    }

    fn find_candidate_producer(&mut self, artifact: &ArtifactGroupId) -> ModelResult<Option<NodeId>> {
        let mut candidates = Vec::new();
        for node in self.traverse_classification_nodes() {
            if let Some(candidate) = self.classification_node_candidate(node, artifact)? {
                candidates.push(candidate);
            }
        }

        let (definite, possible): (Vec<Candidate>, Vec<Candidate>) =
            candidates.into_iter().partition(|c| c.definite);
        if !definite.is_empty() {
            return self.single_producer(artifact, definite.into_iter().map(|c| c.module).collect());
        }
        self.single_producer(artifact, possible.into_iter().map(|c| c.module).collect())
    }

    /// First candidate module of `node` that produces `artifact`.
    fn classification_node_candidate(
        &mut self,
        node: NodeId,
        artifact: &ArtifactGroupId,
    ) -> ModelResult<Option<Candidate>> {
        if !self.has_node_plugin::<dyn FindModuleByArtifact>(node, None)? {
            return Ok(None);
        }
        let finder = self.get_node_plugin::<dyn FindModuleByArtifact>(node, None)?;
        let names = finder
            .candidate_module_names(&PluginContext::new(self, node), artifact)
            .map_err(|source| ModelError::PluginFailed {
                node: self.describe(node),
                class: <dyn FindModuleByArtifact as PluginInterface>::NAME.to_string(),
                source,
            })?;

        for name in names {
            let Some(module) = self.get_child(node, &name)? else {
                continue;
            };
            if self.node_type(module)? != NodeType::Module {
                continue;
            }
            if finder.is_optimistic() {
                return Ok(Some(Candidate {
                    module,
                    definite: false,
                }));
            }
            match self.module_production(module, artifact)? {
                ArtifactProduction::Definitely => {
                    return Ok(Some(Candidate {
                        module,
                        definite: true,
                    }));
                }
                ArtifactProduction::Possibly => {
                    return Ok(Some(Candidate {
                        module,
                        definite: false,
                    }));
                }
                ArtifactProduction::No => {}
            }
        }
        Ok(None)
    }

    fn single_producer(
        &self,
        artifact: &ArtifactGroupId,
        producers: Vec<NodeId>,
    ) -> ModelResult<Option<NodeId>> {
        match producers.as_slice() {
            [] => Ok(None),
            [module] => Ok(Some(*module)),
            _ => Err(ModelError::MultipleArtifactProducers {
                artifact: artifact.to_string(),
                modules: producers.iter().map(|m| self.describe(*m)).collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_artifact_group_id() {
        let artifact: ArtifactGroupId = "com.acme:core".parse().unwrap();
        assert_eq!(artifact.group_id(), "com.acme");
        assert_eq!(artifact.artifact_id(), "core");
        assert_eq!(artifact.to_string(), "com.acme:core");
        assert!("com.acme".parse::<ArtifactGroupId>().is_err());
        assert!("a:b:c".parse::<ArtifactGroupId>().is_err());
    }

    #[test]
    fn test_scope_exclude_with_include_exception() {
        let scope = ArtifactScope {
            include: Some(Regex::new("^(?:com\\.acme:keep-.*)$").unwrap()),
            exclude: Some(Regex::new("^(?:com\\.acme:.*)$").unwrap()),
        };
        assert!(!scope.contains(&ArtifactGroupId::new("com.acme", "drop")));
        assert!(scope.contains(&ArtifactGroupId::new("com.acme", "keep-me")));
        assert!(scope.contains(&ArtifactGroupId::new("org.other", "lib")));
    }
}
