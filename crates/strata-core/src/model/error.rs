//! Model error types.

use thiserror::Error;

use super::state::{NodeOperation, NodeState};
use crate::error::ErrorClass;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
    /// The persisted revision moved since the lock handle was taken.
    #[error("Node '{node}' was modified concurrently (locked revision {locked}, current {current})")]
    OptimisticLockConflict {
        node: String,
        locked: u64,
        current: u64,
    },

    /// A sibling with the same name already exists.
    #[error("A node named '{name}' already exists under '{parent}'")]
    DuplicateNode { parent: String, name: String },

    #[error("Operation {operation:?} is not allowed on node '{node}' in state {state:?}")]
    InvalidState {
        node: String,
        state: NodeState,
        operation: NodeOperation,
    },

    #[error("Invalid use of node '{node}': {message}")]
    InvalidUsage { node: String, message: String },

    #[error("No node at path '{path}'")]
    NodeNotFound { path: String },

    #[error("Node '{path}' is a {actual}, expected a {expected}")]
    UnexpectedNodeType {
        path: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("No plugin {interface}{} is defined for node '{node}'", display_id(.plugin_id))]
    PluginNotFound {
        node: String,
        interface: String,
        plugin_id: Option<String>,
    },

    #[error("Plugin class '{class}' is not registered (required by node '{node}')")]
    UnknownPluginClass { node: String, class: String },

    #[error("Plugin class '{class}' does not implement {interface}")]
    PluginInterfaceMismatch { class: String, interface: String },

    #[error("Plugin class '{class}' failed for node '{node}'")]
    PluginFailed {
        node: String,
        class: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Artifact {artifact} is produced by more than one module: {}", .modules.join(", "))]
    MultipleArtifactProducers {
        artifact: String,
        modules: Vec<String>,
    },

    #[error("Run aborted on condition '{condition}': {message}")]
    Aborted { condition: String, message: String },

    #[error("Invalid model configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn display_id(plugin_id: &Option<String>) -> String {
    plugin_id
        .as_deref()
        .map(|id| format!("/{}", id))
        .unwrap_or_default()
}

impl ModelError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ModelError::OptimisticLockConflict { .. } | ModelError::DuplicateNode { .. } => {
                ErrorClass::Conflict
            }
            ModelError::InvalidConfig(_) | ModelError::NodeNotFound { .. } => ErrorClass::User,
            ModelError::Aborted { .. } => ErrorClass::Policy,
            _ => ErrorClass::Fault,
        }
    }
}
