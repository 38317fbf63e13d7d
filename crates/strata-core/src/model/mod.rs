//! Node/model hierarchy.
//!
//! The model owns a tree of classification nodes (interior grouping) and
//! modules (leaves, releasable units). Nodes live in an arena and are
//! addressed by [`NodeId`]; parent links are navigational only, ownership
//! flows from the root down through each classification node's children.
//!
//! Properties and plugins are resolved by walking from a node up to the
//! root; see [`Model::get_property`] and [`Model::get_node_plugin`].

pub mod artifact;
pub mod builtin;
pub mod condition;
pub mod definitions;
pub mod dynamic;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod path;
pub mod plugin;
pub mod property;
pub mod state;
pub mod store;
pub mod transfer;

use std::any::Any;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

pub use artifact::{ArtifactGroupId, ArtifactInfo, ArtifactProduction, FindModuleByArtifact};
pub use condition::{
    ConditionDecision, ConfiguredConditionPolicy, ExceptionalCondition, ExceptionalConditionPolicy,
};
pub use definitions::{
    DefinitionSet, ModelConfig, NodeConfig, NodeType, PluginDefinition, PropertyDefinition,
    PropertySource,
};
pub use dynamic::{DynamicNodeSpec, UndefinedDescendantNodeManager};
pub use error::{ModelError, ModelResult};
pub use event::{ListenerId, NodeEvent, NodeEventKind, NodeEventListener};
pub use path::NodePath;
pub use plugin::{PluginClass, PluginContext, PluginFactory, PluginInterface, PluginRegistry};
pub use state::{NodeOperation, NodeState};
pub use store::ModelConfigStore;
pub use transfer::{NodeConfigTransferObject, OptimisticLockHandle};

use event::NodeEventBus;

/// Handle to a node in a [`Model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

const ROOT: NodeId = NodeId(0);

struct NodeSlot {
    node_type: NodeType,
    state: NodeState,
    name: Option<String>,
    parent: Option<NodeId>,
    children: BTreeMap<String, NodeId>,
    source: PropertySource,
    revision: u64,
    path: RefCell<Option<NodePath>>,
    /// One instance per direct plugin class.
    plugin_instances: RefCell<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl NodeSlot {
    fn new(
        node_type: NodeType,
        state: NodeState,
        name: Option<String>,
        parent: Option<NodeId>,
        source: PropertySource,
    ) -> Self {
        Self {
            node_type,
            state,
            name,
            parent,
            children: BTreeMap::new(),
            source,
            revision: 0,
            path: RefCell::new(None),
            plugin_instances: RefCell::new(HashMap::new()),
        }
    }
}

/// The classification tree of one run.
pub struct Model {
    /// Append-only. Deleted and abandoned slots stay so that a stale
    /// `NodeId` keeps failing with `Deleted` instead of aliasing a new node.
    /// Materialised dynamic children are kept under their parent, so
    /// repeated lookups of the same name do not add slots.
    nodes: Vec<NodeSlot>,
    plugins: Arc<PluginRegistry>,
    events: NodeEventBus,
    artifact_cache: RefCell<HashMap<ArtifactGroupId, Option<NodeId>>>,
    condition_policy: Box<dyn ExceptionalConditionPolicy>,
    store: Option<ModelConfigStore>,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("nodes", &self.nodes.len())
            .field("events", &self.events)
            .field("store", &self.store)
            .finish()
    }
}

impl Model {
    /// Build a model from configuration.
    pub fn new(config: ModelConfig, plugins: Arc<PluginRegistry>) -> ModelResult<Self> {
        config
            .validate()
            .map_err(|e| ModelError::InvalidConfig(format!("{:#}", e)))?;

        let mut model = Self {
            nodes: Vec::new(),
            plugins,
            events: NodeEventBus::default(),
            artifact_cache: RefCell::new(HashMap::new()),
            condition_policy: Box::new(ConfiguredConditionPolicy::default()),
            store: None,
        };
        model.insert_config_node(None, &config.root);
        Ok(model)
    }

    /// Load the model from a store; later config mutations are saved back
    /// to it.
    pub fn load(store: ModelConfigStore, plugins: Arc<PluginRegistry>) -> ModelResult<Self> {
        let config = store.load()?;
        let mut model = Self::new(config, plugins)?;
        model.store = Some(store);
        Ok(model)
    }

    pub fn with_condition_policy(mut self, policy: impl ExceptionalConditionPolicy + 'static) -> Self {
        self.condition_policy = Box::new(policy);
        self
    }

    pub fn plugin_registry(&self) -> &PluginRegistry {
        &self.plugins
    }

    fn insert_config_node(&mut self, parent: Option<NodeId>, config: &NodeConfig) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeSlot::new(
            config.kind,
            NodeState::Config,
            config.name.clone(),
            parent,
            PropertySource::Config(config.definitions()),
        ));
        for child in &config.children {
            let child_id = self.insert_config_node(Some(id), child);
            if let Some(name) = &child.name {
                self.nodes[id.0].children.insert(name.clone(), child_id);
            }
        }
        id
    }

    // --- slot access -----------------------------------------------------

    fn slot(&self, node: NodeId) -> ModelResult<&NodeSlot> {
        self.nodes.get(node.0).ok_or_else(|| ModelError::InvalidUsage {
            node: format!("#{}", node.0),
            message: "unknown node handle".to_string(),
        })
    }

    fn slot_mut(&mut self, node: NodeId) -> ModelResult<&mut NodeSlot> {
        self.nodes.get_mut(node.0).ok_or_else(|| ModelError::InvalidUsage {
            node: format!("#{}", node.0),
            message: "unknown node handle".to_string(),
        })
    }

    /// Fail unless the node's state allows `operation`.
    fn check_operation(&self, node: NodeId, operation: NodeOperation) -> ModelResult<&NodeSlot> {
        let slot = self.slot(node)?;
        if !slot.state.allows(operation) {
            return Err(ModelError::InvalidState {
                node: self.describe(node),
                state: slot.state,
                operation,
            });
        }
        Ok(slot)
    }

    fn definitions(&self, node: NodeId) -> &DefinitionSet {
        self.nodes[node.0].source.definitions()
    }

    /// `node` first, then each parent up to the root.
    fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(node), move |current| {
            self.nodes.get(current.0).and_then(|slot| slot.parent)
        })
    }

    /// Human-readable identity for messages.
    fn describe(&self, node: NodeId) -> String {
        let Some(slot) = self.nodes.get(node.0) else {
            return format!("#{}", node.0);
        };
        match slot.state {
            NodeState::New => format!("<new {} #{}>", slot.node_type.label(), node.0),
            NodeState::Deleted => format!("<deleted {} #{}>", slot.node_type.label(), node.0),
            _ => {
                let path = self.compute_path(node);
                if path.is_root() {
                    "<root>".to_string()
                } else {
                    path.to_string()
                }
            }
        }
    }

    // --- identity & navigation -------------------------------------------

    pub fn get_classification_node_root(&self) -> NodeId {
        ROOT
    }

    pub fn state(&self, node: NodeId) -> ModelResult<NodeState> {
        Ok(self.slot(node)?.state)
    }

    pub fn node_type(&self, node: NodeId) -> ModelResult<NodeType> {
        Ok(self.slot(node)?.node_type)
    }

    pub fn name(&self, node: NodeId) -> ModelResult<Option<String>> {
        Ok(self.slot(node)?.name.clone())
    }

    /// Configuration revision, bumped by every accepted transfer object.
    pub fn revision(&self, node: NodeId) -> ModelResult<u64> {
        Ok(self.slot(node)?.revision)
    }

    pub fn parent(&self, node: NodeId) -> ModelResult<Option<NodeId>> {
        Ok(self.check_operation(node, NodeOperation::Navigate)?.parent)
    }

    /// Materialised children sorted by name.
    pub fn children(&self, node: NodeId) -> ModelResult<Vec<NodeId>> {
        Ok(self
            .check_operation(node, NodeOperation::Navigate)?
            .children
            .values()
            .copied()
            .collect())
    }

    /// Memoised path of a node.
    pub fn node_path(&self, node: NodeId) -> ModelResult<NodePath> {
        let slot = self.slot(node)?;
        if matches!(slot.state, NodeState::New | NodeState::Deleted) {
            return Err(ModelError::InvalidState {
                node: self.describe(node),
                state: slot.state,
                operation: NodeOperation::Navigate,
            });
        }
        Ok(self.compute_path(node))
    }

    fn compute_path(&self, node: NodeId) -> NodePath {
        let slot = &self.nodes[node.0];
        if let Some(path) = slot.path.borrow().as_ref() {
            return path.clone();
        }
        let path = match (slot.parent, &slot.name) {
            (Some(parent), Some(name)) => {
                let mut names = self.compute_path(parent).names().to_vec();
                names.push(name.clone());
                NodePath::from_names(names).unwrap_or_default()
            }
            _ => NodePath::root(),
        };
        *slot.path.borrow_mut() = Some(path.clone());
        path
    }

    /// Drop memoised paths of `node` and its descendants.
    fn invalidate_paths(&self, node: NodeId) {
        let slot = &self.nodes[node.0];
        slot.path.borrow_mut().take();
        for child in slot.children.values() {
            self.invalidate_paths(*child);
        }
    }

    /// Look up an already materialised node without creating anything.
    pub fn find_node(&self, path: &NodePath) -> Option<NodeId> {
        let mut current = ROOT;
        for name in path.names() {
            current = *self.nodes[current.0].children.get(name)?;
        }
        Some(current)
    }

    /// Child of `parent` named `name`, dynamically materialising it when the
    /// parent's undefined-descendant manager knows about it.
    pub fn get_child(&mut self, parent: NodeId, name: &str) -> ModelResult<Option<NodeId>> {
        let slot = self.check_operation(parent, NodeOperation::Navigate)?;
        if slot.node_type == NodeType::Module {
            return Ok(None);
        }
        if let Some(child) = slot.children.get(name) {
            return Ok(Some(*child));
        }
        self.request_dynamic_child(parent, name)
    }

    /// Node at `path`, materialising dynamic nodes along the way.
    pub fn get_node(&mut self, path: &NodePath) -> ModelResult<Option<NodeId>> {
        let mut current = ROOT;
        for name in path.names() {
            match self.get_child(current, name)? {
                Some(child) => current = child,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    pub fn get_classification_node(&mut self, path: &NodePath) -> ModelResult<Option<NodeId>> {
        self.get_node_of_type(path, NodeType::ClassificationNode)
    }

    pub fn get_module(&mut self, path: &NodePath) -> ModelResult<Option<NodeId>> {
        if path.is_root() {
            return Err(ModelError::UnexpectedNodeType {
                path: "<root>".to_string(),
                expected: NodeType::Module.label(),
                actual: NodeType::ClassificationNode.label(),
            });
        }
        self.get_node_of_type(path, NodeType::Module)
    }

    fn get_node_of_type(&mut self, path: &NodePath, expected: NodeType) -> ModelResult<Option<NodeId>> {
        let Some(node) = self.get_node(path)? else {
            return Ok(None);
        };
        let actual = self.slot(node)?.node_type;
        if actual != expected {
            return Err(ModelError::UnexpectedNodeType {
                path: path.to_string(),
                expected: expected.label(),
                actual: actual.label(),
            });
        }
        Ok(Some(node))
    }

    /// Materialised modules, pre-order with children sorted by name.
    pub fn traverse_modules(&self) -> Vec<NodeId> {
        self.traverse(NodeType::Module)
    }

    /// Materialised classification nodes (root included), pre-order.
    pub fn traverse_classification_nodes(&self) -> Vec<NodeId> {
        self.traverse(NodeType::ClassificationNode)
    }

    fn traverse(&self, node_type: NodeType) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack = vec![ROOT];
        while let Some(node) = stack.pop() {
            let slot = &self.nodes[node.0];
            if !slot.state.is_materialized() {
                continue;
            }
            if slot.node_type == node_type {
                found.push(node);
            }
            stack.extend(slot.children.values().rev().copied());
        }
        found
    }

    // --- events ----------------------------------------------------------

    /// Register an event listener on `node`, or globally for `None`.
    pub fn register_listener(
        &mut self,
        node: Option<NodeId>,
        kind: Option<NodeEventKind>,
        children_also: bool,
        listener: NodeEventListener,
    ) -> ModelResult<ListenerId> {
        if let Some(node) = node {
            self.check_operation(node, NodeOperation::Navigate)?;
        }
        Ok(self.events.register(node, kind, children_also, listener))
    }

    pub fn unregister_listener(&mut self, id: ListenerId) -> bool {
        self.events.unregister(id)
    }

    fn raise_event(&self, node: NodeId, kind: NodeEventKind) {
        let slot = &self.nodes[node.0];
        let event = NodeEvent {
            kind,
            node,
            node_type: slot.node_type,
            node_path: self.compute_path(node),
        };
        let ancestors: Vec<NodeId> = self.ancestors(node).collect();
        self.events.dispatch(&event, &ancestors);
    }

    // --- persistence -----------------------------------------------------

    /// Persisted configuration of every config-backed node.
    pub fn to_config(&self) -> ModelConfig {
        ModelConfig {
            root: self.node_config(ROOT),
        }
    }

    fn node_config(&self, node: NodeId) -> NodeConfig {
        let slot = &self.nodes[node.0];
        let definitions = slot.source.definitions();
        NodeConfig {
            kind: slot.node_type,
            name: slot.name.clone(),
            properties: definitions.properties.clone(),
            plugins: definitions.plugins.clone(),
            children: slot
                .children
                .values()
                .filter(|child| self.nodes[child.0].state == NodeState::Config)
                .map(|child| self.node_config(*child))
                .collect(),
        }
    }

    fn persist(&self) -> ModelResult<()> {
        if let Some(store) = &self.store {
            store.save(&self.to_config())?;
        }
        Ok(())
    }

    fn clear_plugin_instances(&self, node: NodeId) {
        let slot = &self.nodes[node.0];
        slot.plugin_instances.borrow_mut().clear();
        for child in slot.children.values() {
            self.clear_plugin_instances(*child);
        }
    }
}
