//! Property resolution along the ancestor chain.

use super::error::ModelResult;
use super::state::NodeOperation;
use super::{Model, NodeId};

/// Replaced by the same property resolved from the parent of the node that
/// defines the value.
pub const PARENT_REFERENCE: &str = "$parent$";

impl Model {
    /// Resolve property `name` for `node`.
    ///
    /// The closest node (starting with `node` itself) defining the property
    /// wins, even when it defines it as absent. A definition restricted to
    /// its own node is invisible from descendants.
    pub fn get_property(&self, node: NodeId, name: &str) -> ModelResult<Option<String>> {
        self.check_operation(node, NodeOperation::ResolveProperty)?;
        Ok(self.resolve_property(node, name))
    }

    /// `true` when the property resolves to `true` (case-insensitive).
    pub fn is_property_true(&self, node: NodeId, name: &str) -> ModelResult<bool> {
        Ok(self
            .get_property(node, name)?
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("true")))
    }

    // Substitution always restarts strictly above the defining node, so the
    // recursion depth is bounded by the depth of the tree.
    fn resolve_property(&self, start: NodeId, name: &str) -> Option<String> {
        for ancestor in self.ancestors(start) {
            let Some(definition) = self.definitions(ancestor).property(name) else {
                continue;
            };
            if definition.only_this_node && ancestor != start {
                return None;
            }
            let value = definition.value.as_ref()?;
            if !value.contains(PARENT_REFERENCE) {
                return Some(value.clone());
            }
            let inherited = self.nodes[ancestor.0]
                .parent
                .and_then(|parent| self.resolve_property(parent, name))
                .unwrap_or_default();
            return Some(value.replace(PARENT_REFERENCE, &inherited));
        }
        None
    }
}
