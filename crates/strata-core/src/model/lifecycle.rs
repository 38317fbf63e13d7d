//! Creation, configuration mutation and deletion of nodes.

use tracing::{debug, info};

use super::definitions::{NodeType, PropertySource};
use super::error::{ModelError, ModelResult};
use super::event::NodeEventKind;
use super::path::validate_node_name;
use super::state::{NodeOperation, NodeState};
use super::transfer::{NodeConfigTransferObject, OptimisticLockHandle};
use super::{Model, NodeId, NodeSlot, ROOT};

impl Model {
    /// New classification node under `parent`. It stays detached and
    /// nameless until its first transfer object is applied.
    pub fn create_classification_node(&mut self, parent: NodeId) -> ModelResult<NodeId> {
        self.create_node(parent, NodeType::ClassificationNode)
    }

    /// New module under `parent`, detached until configured.
    pub fn create_module(&mut self, parent: NodeId) -> ModelResult<NodeId> {
        self.create_node(parent, NodeType::Module)
    }

    fn create_node(&mut self, parent: NodeId, node_type: NodeType) -> ModelResult<NodeId> {
        let parent_slot = self.check_operation(parent, NodeOperation::Navigate)?;
        if parent_slot.state != NodeState::Config {
            return Err(ModelError::InvalidUsage {
                node: self.describe(parent),
                message: "configured children can only be added to configured nodes".to_string(),
            });
        }
        if parent_slot.node_type == NodeType::Module {
            return Err(ModelError::InvalidUsage {
                node: self.describe(parent),
                message: "a module cannot have children".to_string(),
            });
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeSlot::new(
            node_type,
            NodeState::New,
            None,
            Some(parent),
            PropertySource::default(),
        ));
        Ok(id)
    }

    /// A lock handle for `node`, locked at the current revision if `lock`.
    pub fn create_optimistic_lock_handle(
        &self,
        node: NodeId,
        lock: bool,
    ) -> ModelResult<OptimisticLockHandle> {
        let slot = self.check_operation(node, NodeOperation::GetConfig)?;
        Ok(OptimisticLockHandle::new(node, lock.then_some(slot.revision)))
    }

    /// Whether `handle` is locked and still matches the node's revision.
    pub fn is_optimistic_lock_valid(
        &self,
        node: NodeId,
        handle: &OptimisticLockHandle,
    ) -> ModelResult<bool> {
        let slot = self.check_operation(node, NodeOperation::GetConfig)?;
        Ok(handle.node() == node && handle.revision() == Some(slot.revision))
    }

    /// Snapshot the node's persisted fields.
    ///
    /// A supplied handle must be unlocked; it is locked at the current
    /// revision.
    pub fn get_node_config_transfer_object(
        &self,
        node: NodeId,
        lock_handle: Option<&mut OptimisticLockHandle>,
    ) -> ModelResult<NodeConfigTransferObject> {
        let slot = self.check_operation(node, NodeOperation::GetConfig)?;
        if let Some(handle) = lock_handle {
            self.check_handle_node(node, handle)?;
            if handle.is_locked() {
                return Err(ModelError::InvalidUsage {
                    node: self.describe(node),
                    message: "optimistic lock handle is already locked".to_string(),
                });
            }
            handle.lock(slot.revision);
        }
        Ok(NodeConfigTransferObject::new(
            slot.name.clone(),
            slot.source.definitions().clone(),
        ))
    }

    /// Apply a transfer object to the node's persisted configuration.
    ///
    /// Fails with [`ModelError::OptimisticLockConflict`] when a locked handle
    /// no longer matches, and with [`ModelError::DuplicateNode`] when the name
    /// collides with a configured sibling. A dynamically created sibling with
    /// that name is deleted instead. On success the handle (if any) is
    /// locked at the new revision.
    pub fn set_node_config_transfer_object(
        &mut self,
        node: NodeId,
        transfer: NodeConfigTransferObject,
        lock_handle: Option<&mut OptimisticLockHandle>,
    ) -> ModelResult<()> {
        let slot = self.check_operation(node, NodeOperation::SetConfig)?;
        let state = slot.state;
        let current_revision = slot.revision;
        let old_name = slot.name.clone();
        let parent = slot.parent;
        if let Some(parent) = parent {
            self.check_operation(parent, NodeOperation::Navigate)?;
        }

        if let Some(handle) = lock_handle.as_deref() {
            self.check_handle_node(node, handle)?;
            if let Some(locked) = handle.revision()
                && locked != current_revision
            {
                return Err(ModelError::OptimisticLockConflict {
                    node: self.describe(node),
                    locked,
                    current: current_revision,
                });
            }
        }

        let (name, definitions) = transfer.into_parts();
        if node == ROOT {
            if name.is_some() {
                return Err(ModelError::InvalidUsage {
                    node: self.describe(node),
                    message: "the root node cannot be named".to_string(),
                });
            }
        } else {
            let name = name.as_deref().ok_or_else(|| ModelError::InvalidUsage {
                node: self.describe(node),
                message: "a node name is required".to_string(),
            })?;
            validate_node_name(name).map_err(|e| ModelError::InvalidUsage {
                node: self.describe(node),
                message: e.to_string(),
            })?;
            if let Some(parent) = parent {
                self.claim_sibling_name(parent, node, name)?;
            }
        }

        let renamed = old_name != name;
        if let Some(parent) = parent
            && renamed
        {
            let parent_slot = self.slot_mut(parent)?;
            if let Some(old) = &old_name {
                parent_slot.children.remove(old);
            }
            if let Some(new) = &name {
                parent_slot.children.insert(new.clone(), node);
            }
        }

        let slot = self.slot_mut(node)?;
        slot.name = name;
        slot.source = PropertySource::Config(definitions);
        slot.revision += 1;
        slot.state = NodeState::Config;
        let new_revision = slot.revision;

        if renamed {
            self.invalidate_paths(node);
        }
        self.clear_plugin_instances(node);
        self.artifact_cache.borrow_mut().clear();

        if let Some(handle) = lock_handle {
            handle.lock(new_revision);
        }

        let kind = if state == NodeState::New {
            NodeEventKind::Created
        } else {
            NodeEventKind::Updated
        };
        info!(node = %self.describe(node), revision = new_revision, ?kind, "node configuration saved");
        self.raise_event(node, kind);
        self.persist()
    }

    /// Make `name` available under `parent` for `node`.
    fn claim_sibling_name(&mut self, parent: NodeId, node: NodeId, name: &str) -> ModelResult<()> {
        let Some(&existing) = self.slot(parent)?.children.get(name) else {
            return Ok(());
        };
        if existing == node {
            return Ok(());
        }
        if self.slot(existing)?.state == NodeState::DynamicallyCreated {
            debug!(node = %self.describe(existing), "configured node supersedes dynamic node");
            return self.delete_node(existing);
        }
        Err(ModelError::DuplicateNode {
            parent: self.describe(parent),
            name: name.to_string(),
        })
    }

    fn check_handle_node(&self, node: NodeId, handle: &OptimisticLockHandle) -> ModelResult<()> {
        if handle.node() != node {
            return Err(ModelError::InvalidUsage {
                node: self.describe(node),
                message: format!("lock handle belongs to {}", self.describe(handle.node())),
            });
        }
        Ok(())
    }

    /// Delete a node and its descendants.
    pub fn delete_node(&mut self, node: NodeId) -> ModelResult<()> {
        let slot = self.check_operation(node, NodeOperation::Delete)?;
        if node == ROOT {
            return Err(ModelError::InvalidUsage {
                node: self.describe(node),
                message: "the root node cannot be deleted".to_string(),
            });
        }
        let was_config = slot.state == NodeState::Config;
        let parent = slot.parent;
        let name = slot.name.clone();

        info!(node = %self.describe(node), "deleting node");
        self.clear_subtree(node);

        if let (Some(parent), Some(name)) = (parent, name) {
            let parent_slot = self.slot_mut(parent)?;
            if parent_slot.children.get(&name) == Some(&node) {
                parent_slot.children.remove(&name);
            }
        }

        if was_config {
            self.persist()?;
        }
        Ok(())
    }

    /// Raise delete events, drop caches and clear the slots of a subtree.
    fn clear_subtree(&mut self, node: NodeId) {
        let children: Vec<NodeId> = self.nodes[node.0].children.values().copied().collect();
        for child in children {
            self.clear_subtree(child);
        }

        if self.nodes[node.0].state != NodeState::New {
            self.raise_event(node, NodeEventKind::Deleted);
        }
        self.artifact_cache
            .borrow_mut()
            .retain(|_, module| *module != Some(node));
        self.events.remove_node(node);

        let slot = &mut self.nodes[node.0];
        slot.state = NodeState::Deleted;
        slot.children.clear();
        slot.source = PropertySource::default();
        slot.path.get_mut().take();
        slot.plugin_instances.get_mut().clear();
    }
}
