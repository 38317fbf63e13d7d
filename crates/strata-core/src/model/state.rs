//! Node lifecycle states and the operations each state allows.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeState {
    /// Created through the mutation API, no name or identity yet.
    New,
    /// Backed by persisted configuration.
    Config,
    /// Dynamically created, fields still being set.
    DynamicallyBeingCompleted,
    /// Dynamically created and complete.
    DynamicallyCreated,
    /// Terminal.
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeOperation {
    Navigate,
    ResolveProperty,
    ResolvePlugin,
    GetConfig,
    SetConfig,
    SetDynamicField,
    FinalizeDynamic,
    Delete,
}

use NodeOperation as Op;
use NodeState as St;

/// States in which each operation is legal.
const ALLOWED: &[(NodeOperation, &[NodeState])] = &[
    (Op::Navigate, &[St::Config, St::DynamicallyCreated]),
    (Op::ResolveProperty, &[St::Config, St::DynamicallyCreated, St::DynamicallyBeingCompleted]),
    (Op::ResolvePlugin, &[St::Config, St::DynamicallyCreated, St::DynamicallyBeingCompleted]),
    (Op::GetConfig, &[St::New, St::Config]),
    (Op::SetConfig, &[St::New, St::Config]),
    (Op::SetDynamicField, &[St::DynamicallyBeingCompleted]),
    (Op::FinalizeDynamic, &[St::DynamicallyBeingCompleted]),
    (Op::Delete, &[St::New, St::Config, St::DynamicallyCreated]),
];

impl NodeState {
    pub fn allows(self, operation: NodeOperation) -> bool {
        ALLOWED
            .iter()
            .find(|(op, _)| *op == operation)
            .is_some_and(|(_, states)| states.contains(&self))
    }

    /// Visible in the tree: reachable through navigation and traversal.
    pub fn is_materialized(self) -> bool {
        matches!(self, NodeState::Config | NodeState::DynamicallyCreated)
    }
}
