//! Transfer objects and optimistic lock handles for node configuration
//! mutation.

use super::NodeId;
use super::definitions::{DefinitionSet, PluginDefinition, PropertyDefinition};

/// Mutable snapshot of a node's persisted fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeConfigTransferObject {
    name: Option<String>,
    definitions: DefinitionSet,
}

impl NodeConfigTransferObject {
    pub(crate) fn new(name: Option<String>, definitions: DefinitionSet) -> Self {
        Self { name, definitions }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDefinition> {
        self.definitions.property(name)
    }

    pub fn properties(&self) -> &[PropertyDefinition] {
        &self.definitions.properties
    }

    /// Define a property. `None` defines it as explicitly absent.
    pub fn set_property(&mut self, name: impl Into<String>, value: Option<String>, only_this_node: bool) {
        self.definitions
            .set_property(PropertyDefinition::new(name, value, only_this_node));
    }

    pub fn remove_property(&mut self, name: &str) -> bool {
        self.definitions.remove_property(name).is_some()
    }

    pub fn plugin(&self, interface: &str, id: Option<&str>) -> Option<&PluginDefinition> {
        self.definitions.plugin(interface, id)
    }

    pub fn plugins(&self) -> &[PluginDefinition] {
        &self.definitions.plugins
    }

    pub fn set_plugin(&mut self, definition: PluginDefinition) {
        self.definitions.set_plugin(definition);
    }

    pub fn remove_plugin(&mut self, interface: &str, id: Option<&str>) -> bool {
        self.definitions.remove_plugin(interface, id).is_some()
    }

    pub(crate) fn into_parts(self) -> (Option<String>, DefinitionSet) {
        (self.name, self.definitions)
    }
}

/// Records the revision of a node's configuration at the time it was read.
///
/// A locked handle passed back to `set_node_config_transfer_object` must
/// still match the node's revision, otherwise the update is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimisticLockHandle {
    node: NodeId,
    revision: Option<u64>,
}

impl OptimisticLockHandle {
    pub(crate) fn new(node: NodeId, revision: Option<u64>) -> Self {
        Self { node, revision }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn is_locked(&self) -> bool {
        self.revision.is_some()
    }

    pub fn revision(&self) -> Option<u64> {
        self.revision
    }

    pub fn clear_lock(&mut self) {
        self.revision = None;
    }

    pub(crate) fn lock(&mut self, revision: u64) {
        self.revision = Some(revision);
    }
}
