//! Node event listener registries and dispatch.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::NodeId;
use super::definitions::NodeType;
use super::path::NodePath;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeEventKind {
    Created,
    Updated,
    Deleted,
    DynamicallyCreated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEvent {
    pub kind: NodeEventKind,
    pub node: NodeId,
    pub node_type: NodeType,
    pub node_path: NodePath,
}

pub type NodeEventListener = Arc<dyn Fn(&NodeEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration {
    id: ListenerId,
    /// `None` receives every kind.
    kind: Option<NodeEventKind>,
    children_also: bool,
    listener: NodeEventListener,
}

impl Registration {
    fn accepts(&self, event: &NodeEvent) -> bool {
        self.kind.is_none_or(|kind| kind == event.kind)
    }
}

/// Per-node and global listener registries.
#[derive(Default)]
pub struct NodeEventBus {
    next_id: u64,
    per_node: HashMap<NodeId, Vec<Registration>>,
    global: Vec<Registration>,
}

impl fmt::Debug for NodeEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeEventBus")
            .field("nodes", &self.per_node.len())
            .field("global", &self.global.len())
            .finish()
    }
}

impl NodeEventBus {
    /// Register a listener on `node`, or globally when `node` is `None`.
    ///
    /// A node listener with `children_also` also receives events raised on
    /// any descendant. Global listeners receive every event.
    pub fn register(
        &mut self,
        node: Option<NodeId>,
        kind: Option<NodeEventKind>,
        children_also: bool,
        listener: NodeEventListener,
    ) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        let registration = Registration {
            id,
            kind,
            children_also,
            listener,
        };
        match node {
            Some(node) => self.per_node.entry(node).or_default().push(registration),
            None => self.global.push(registration),
        }
        id
    }

    pub fn unregister(&mut self, id: ListenerId) -> bool {
        let before = self.len();
        self.global.retain(|r| r.id != id);
        for registrations in self.per_node.values_mut() {
            registrations.retain(|r| r.id != id);
        }
        self.per_node.retain(|_, registrations| !registrations.is_empty());
        self.len() != before
    }

    pub(crate) fn remove_node(&mut self, node: NodeId) {
        self.per_node.remove(&node);
    }

    fn len(&self) -> usize {
        self.global.len() + self.per_node.values().map(Vec::len).sum::<usize>()
    }

    /// Dispatch along `ancestors` (the event's node first, then up to the
    /// root), then to global listeners.
    pub(crate) fn dispatch(&self, event: &NodeEvent, ancestors: &[NodeId]) {
        for (depth, node) in ancestors.iter().enumerate() {
            let Some(registrations) = self.per_node.get(node) else {
                continue;
            };
            for registration in registrations {
                if (depth == 0 || registration.children_also) && registration.accepts(event) {
                    (registration.listener)(event);
                }
            }
        }
        for registration in &self.global {
            if registration.accepts(event) {
                (registration.listener)(event);
            }
        }
    }
}
