//! Strata Core Library
//!
//! Provides the module model (classification nodes and modules with
//! inherited properties and plugins) and the workspace directory registry
//! used by the strata release tool.

pub mod config;
pub mod context;
pub mod error;
pub mod fs;
pub mod model;
pub mod version;
pub mod workspace;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{ConfigScope, ConfigStore, StrataConfig};
    pub use crate::context::AppContext;
    pub use crate::error::{ErrorClass, classify};

    // Model
    pub use crate::model::{
        ArtifactGroupId, ConditionDecision, Model, ModelConfig, ModelConfigStore, ModelError,
        NodeConfigTransferObject, NodeEventKind, NodeId, NodePath, NodeState, NodeType,
        OptimisticLockHandle, PluginRegistry,
    };

    // Version
    pub use crate::version::{ModuleVersion, Version, VersionType};

    // Workspace
    pub use crate::workspace::{
        AllocateOptions, PolicyKind, Workspace, WorkspaceAccessMode, WorkspaceDir,
        WorkspaceDirKind, WorkspaceDirTemplate, WorkspaceError,
    };
}
