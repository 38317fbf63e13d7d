//! Dynamic materialisation of nodes that the configuration does not
//! define.

use tracing::debug;

use super::definitions::{DefinitionSet, NodeType, PluginDefinition, PropertyDefinition, PropertySource};
use super::error::{ModelError, ModelResult};
use super::event::NodeEventKind;
use super::path::validate_node_name;
use super::plugin::{PluginContext, PluginInterface};
use super::state::{NodeOperation, NodeState};
use super::{Model, NodeId, NodeSlot};

/// What a manager wants materialised for a requested child name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicNodeSpec {
    pub node_type: NodeType,
    pub properties: Vec<PropertyDefinition>,
    pub plugins: Vec<PluginDefinition>,
}

impl DynamicNodeSpec {
    pub fn module() -> Self {
        Self {
            node_type: NodeType::Module,
            properties: Vec::new(),
            plugins: Vec::new(),
        }
    }

    pub fn with_property(mut self, name: &str, value: Option<String>) -> Self {
        self.properties.push(PropertyDefinition::new(name, value, false));
        self
    }
}

/// Plugin of a classification node describing children that exist outside
/// the configuration (e.g. discovered from an SCM).
pub trait UndefinedDescendantNodeManager: Send + Sync {
    /// Describe the child `name` of the plugin's node, or `None` if it does
    /// not exist.
    fn request_node(
        &self,
        context: &PluginContext<'_>,
        name: &str,
    ) -> anyhow::Result<Option<DynamicNodeSpec>>;
}

impl PluginInterface for dyn UndefinedDescendantNodeManager {
    const NAME: &'static str = "UndefinedDescendantNodeManager";
}

impl Model {
    pub(super) fn request_dynamic_child(
        &mut self,
        parent: NodeId,
        name: &str,
    ) -> ModelResult<Option<NodeId>> {
        if !self.has_node_plugin::<dyn UndefinedDescendantNodeManager>(parent, None)? {
            return Ok(None);
        }
        let manager = self.get_node_plugin::<dyn UndefinedDescendantNodeManager>(parent, None)?;
        let spec = manager
            .request_node(&PluginContext::new(self, parent), name)
            .map_err(|source| ModelError::PluginFailed {
                node: self.describe(parent),
                class: <dyn UndefinedDescendantNodeManager as PluginInterface>::NAME.to_string(),
                source,
            })?;
        let Some(spec) = spec else {
            return Ok(None);
        };

        let node = self.begin_dynamic_node(parent, spec.node_type, name)?;
        if let Err(err) = self.complete_dynamic_node(node, spec) {
            self.abandon_dynamic_node(node);
            return Err(err);
        }
        Ok(Some(node))
    }

    fn complete_dynamic_node(&mut self, node: NodeId, spec: DynamicNodeSpec) -> ModelResult<()> {
        for property in spec.properties {
            self.set_dynamic_property(node, &property.name, property.value, property.only_this_node)?;
        }
        for plugin in spec.plugins {
            self.set_dynamic_plugin(node, plugin)?;
        }
        self.finalize_dynamic_node(node)
    }

    /// Start building a module that is not in the configuration.
    pub fn begin_dynamic_module(&mut self, parent: NodeId, name: &str) -> ModelResult<NodeId> {
        self.begin_dynamic_node(parent, NodeType::Module, name)
    }

    /// Start building a classification node that is not in the configuration.
    pub fn begin_dynamic_classification_node(
        &mut self,
        parent: NodeId,
        name: &str,
    ) -> ModelResult<NodeId> {
        self.begin_dynamic_node(parent, NodeType::ClassificationNode, name)
    }

    fn begin_dynamic_node(
        &mut self,
        parent: NodeId,
        node_type: NodeType,
        name: &str,
    ) -> ModelResult<NodeId> {
        let parent_slot = self.check_operation(parent, NodeOperation::Navigate)?;
        if parent_slot.node_type == NodeType::Module {
            return Err(ModelError::InvalidUsage {
                node: self.describe(parent),
                message: "a module cannot have children".to_string(),
            });
        }
        if parent_slot.children.contains_key(name) {
            return Err(ModelError::DuplicateNode {
                parent: self.describe(parent),
                name: name.to_string(),
            });
        }
        validate_node_name(name).map_err(|e| ModelError::InvalidUsage {
            node: self.describe(parent),
            message: e.to_string(),
        })?;

        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeSlot::new(
            node_type,
            NodeState::DynamicallyBeingCompleted,
            Some(name.to_string()),
            Some(parent),
            PropertySource::Dynamic(DefinitionSet::default()),
        ));
        Ok(id)
    }

    pub fn set_dynamic_property(
        &mut self,
        node: NodeId,
        name: &str,
        value: Option<String>,
        only_this_node: bool,
    ) -> ModelResult<()> {
        self.dynamic_definitions(node)?
            .set_property(PropertyDefinition::new(name, value, only_this_node));
        Ok(())
    }

    pub fn set_dynamic_plugin(&mut self, node: NodeId, plugin: PluginDefinition) -> ModelResult<()> {
        self.dynamic_definitions(node)?.set_plugin(plugin);
        Ok(())
    }

    fn dynamic_definitions(&mut self, node: NodeId) -> ModelResult<&mut DefinitionSet> {
        self.check_operation(node, NodeOperation::SetDynamicField)?;
        let described = self.describe(node);
        self.slot_mut(node)?
            .source
            .dynamic_mut()
            .ok_or(ModelError::InvalidUsage {
                node: described,
                message: "node definitions are not dynamic".to_string(),
            })
    }

    /// Attach a dynamically built node to its parent.
    pub fn finalize_dynamic_node(&mut self, node: NodeId) -> ModelResult<()> {
        let slot = self.check_operation(node, NodeOperation::FinalizeDynamic)?;
        let (Some(parent), Some(name)) = (slot.parent, slot.name.clone()) else {
            return Err(ModelError::InvalidUsage {
                node: self.describe(node),
                message: "dynamic node has no parent or name".to_string(),
            });
        };

        let parent_slot = self.check_operation(parent, NodeOperation::Navigate)?;
        if parent_slot.children.contains_key(&name) {
            return Err(ModelError::DuplicateNode {
                parent: self.describe(parent),
                name,
            });
        }
        self.slot_mut(parent)?.children.insert(name, node);
        self.slot_mut(node)?.state = NodeState::DynamicallyCreated;

        debug!(node = %self.describe(node), "dynamically created node");
        self.raise_event(node, NodeEventKind::DynamicallyCreated);
        Ok(())
    }

    fn abandon_dynamic_node(&mut self, node: NodeId) {
        if let Some(slot) = self.nodes.get_mut(node.0)
            && slot.state == NodeState::DynamicallyBeingCompleted
        {
            slot.state = NodeState::Deleted;
            slot.source = PropertySource::default();
        }
    }
}
