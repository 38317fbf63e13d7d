//! Property and plugin definitions attached to nodes, and the persisted
//! model configuration they come from.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeType {
    ClassificationNode,
    Module,
}

impl NodeType {
    pub fn label(self) -> &'static str {
        match self {
            NodeType::ClassificationNode => "classification node",
            NodeType::Module => "module",
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A property defined on one node.
///
/// `value: None` explicitly defines the property as absent, which stops
/// inheritance from farther ancestors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub only_this_node: bool,
}

impl PropertyDefinition {
    pub fn new(name: impl Into<String>, value: Option<String>, only_this_node: bool) -> Self {
        Self {
            name: name.into(),
            value,
            only_this_node,
        }
    }
}

/// A plugin binding on one node, keyed by `(interface, id)`.
///
/// `class: None` explicitly disables the plugin for this subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDefinition {
    pub interface: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub only_this_node: bool,
}

impl PluginDefinition {
    pub fn new(
        interface: impl Into<String>,
        id: Option<String>,
        class: Option<String>,
        only_this_node: bool,
    ) -> Self {
        Self {
            interface: interface.into(),
            id,
            class,
            only_this_node,
        }
    }

    pub fn matches(&self, interface: &str, id: Option<&str>) -> bool {
        self.interface == interface && self.id.as_deref() == id
    }
}

/// Ordered property and plugin definitions of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefinitionSet {
    pub properties: Vec<PropertyDefinition>,
    pub plugins: Vec<PluginDefinition>,
}

impl DefinitionSet {
    pub fn property(&self, name: &str) -> Option<&PropertyDefinition> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn plugin(&self, interface: &str, id: Option<&str>) -> Option<&PluginDefinition> {
        self.plugins.iter().find(|p| p.matches(interface, id))
    }

    pub fn plugins_for<'a>(
        &'a self,
        interface: &'a str,
    ) -> impl Iterator<Item = &'a PluginDefinition> + 'a {
        self.plugins.iter().filter(move |p| p.interface == interface)
    }

    pub fn set_property(&mut self, definition: PropertyDefinition) {
        match self
            .properties
            .iter_mut()
            .find(|p| p.name == definition.name)
        {
            Some(existing) => *existing = definition,
            None => self.properties.push(definition),
        }
    }

    pub fn remove_property(&mut self, name: &str) -> Option<PropertyDefinition> {
        let index = self.properties.iter().position(|p| p.name == name)?;
        Some(self.properties.remove(index))
    }

    pub fn set_plugin(&mut self, definition: PluginDefinition) {
        match self
            .plugins
            .iter_mut()
            .find(|p| p.matches(&definition.interface, definition.id.as_deref()))
        {
            Some(existing) => *existing = definition,
            None => self.plugins.push(definition),
        }
    }

    pub fn remove_plugin(&mut self, interface: &str, id: Option<&str>) -> Option<PluginDefinition> {
        let index = self.plugins.iter().position(|p| p.matches(interface, id))?;
        Some(self.plugins.remove(index))
    }
}

/// Where a node's definitions come from.
///
/// Resolution only reads through [`PropertySource::definitions`]; the
/// variant decides how the set may be changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertySource {
    /// Persisted configuration, replaced wholesale through a transfer object.
    Config(DefinitionSet),
    /// Set field by field while a node is dynamically completed.
    Dynamic(DefinitionSet),
}

impl PropertySource {
    pub fn definitions(&self) -> &DefinitionSet {
        match self {
            PropertySource::Config(set) | PropertySource::Dynamic(set) => set,
        }
    }

    /// Mutable access, only for dynamically set definitions.
    pub fn dynamic_mut(&mut self) -> Option<&mut DefinitionSet> {
        match self {
            PropertySource::Config(_) => None,
            PropertySource::Dynamic(set) => Some(set),
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, PropertySource::Config(_))
    }
}

impl Default for PropertySource {
    fn default() -> Self {
        PropertySource::Config(DefinitionSet::default())
    }
}

/// Persisted configuration of one node and its configured children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_node_type")]
    pub kind: NodeType,

    /// Absent only for the root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<PropertyDefinition>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<PluginDefinition>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeConfig>,
}

fn default_node_type() -> NodeType {
    NodeType::ClassificationNode
}

impl NodeConfig {
    pub fn new(kind: NodeType, name: Option<String>) -> Self {
        Self {
            kind,
            name,
            properties: Vec::new(),
            plugins: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn definitions(&self) -> DefinitionSet {
        DefinitionSet {
            properties: self.properties.clone(),
            plugins: self.plugins.clone(),
        }
    }
}

/// Root of `model.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub root: NodeConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            root: NodeConfig::new(NodeType::ClassificationNode, None),
        }
    }
}

impl ModelConfig {
    /// Structural validation performed before a model is built.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.root.kind != NodeType::ClassificationNode {
            anyhow::bail!("The root node must be a classification node");
        }
        if self.root.name.is_some() {
            anyhow::bail!("The root node cannot have a name");
        }
        validate_children(&self.root, "")
    }
}

fn validate_children(node: &NodeConfig, path: &str) -> anyhow::Result<()> {
    if node.kind == NodeType::Module && !node.children.is_empty() {
        anyhow::bail!("Module '{}' cannot have children", path);
    }
    let mut seen = std::collections::HashSet::new();
    for child in &node.children {
        let name = child
            .name
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("A child of '{}' has no name", path))?;
        super::path::validate_node_name(name)?;
        if !seen.insert(name) {
            anyhow::bail!("Duplicate node '{}' under '{}'", name, path);
        }
        let child_path = if path.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", path, name)
        };
        validate_children(child, &child_path)?;
    }
    Ok(())
}
