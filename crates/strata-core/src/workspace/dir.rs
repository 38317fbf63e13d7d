//! Logical workspace directory identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::NodePath;
use crate::version::{ModuleVersion, Version};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkspaceDirKind {
    /// A module version checked out for the user.
    User,
    /// A module materialised privately under the metadata directory.
    System,
}

impl fmt::Display for WorkspaceDirKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkspaceDirKind::User => write!(f, "user"),
            WorkspaceDirKind::System => write!(f, "system"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WorkspaceDir {
    UserModuleVersion(ModuleVersion),
    SystemModule(NodePath),
}

impl WorkspaceDir {
    pub fn kind(&self) -> WorkspaceDirKind {
        match self {
            WorkspaceDir::UserModuleVersion(_) => WorkspaceDirKind::User,
            WorkspaceDir::SystemModule(_) => WorkspaceDirKind::System,
        }
    }

    pub fn module_path(&self) -> &NodePath {
        match self {
            WorkspaceDir::UserModuleVersion(module_version) => module_version.node_path(),
            WorkspaceDir::SystemModule(path) => path,
        }
    }

    pub fn version(&self) -> Option<&Version> {
        match self {
            WorkspaceDir::UserModuleVersion(module_version) => Some(module_version.version()),
            WorkspaceDir::SystemModule(_) => None,
        }
    }

    /// Textual identity stored in the snapshot.
    pub(crate) fn logical(&self) -> String {
        match self {
            WorkspaceDir::UserModuleVersion(module_version) => module_version.to_string(),
            WorkspaceDir::SystemModule(path) => path.to_string(),
        }
    }

    pub(crate) fn from_logical(kind: WorkspaceDirKind, logical: &str) -> anyhow::Result<Self> {
        Ok(match kind {
            WorkspaceDirKind::User => WorkspaceDir::UserModuleVersion(logical.parse()?),
            WorkspaceDirKind::System => {
                let path: NodePath = logical.parse()?;
                if path.is_root() {
                    anyhow::bail!("System directory requires a module path");
                }
                WorkspaceDir::SystemModule(path)
            }
        })
    }
}

impl fmt::Display for WorkspaceDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} directory for {}", self.kind(), self.logical())
    }
}

/// Filter for [`super::Workspace::list_directories`]. Unset fields match
/// anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceDirTemplate {
    pub kind: Option<WorkspaceDirKind>,
    pub module: Option<NodePath>,
    pub version: Option<Version>,
}

impl WorkspaceDirTemplate {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn of_kind(kind: WorkspaceDirKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn matches(&self, dir: &WorkspaceDir) -> bool {
        self.kind.is_none_or(|kind| kind == dir.kind())
            && self.module.as_ref().is_none_or(|module| module == dir.module_path())
            && self
                .version
                .as_ref()
                .is_none_or(|version| dir.version() == Some(version))
    }
}

/// Check that `relative` is a place a directory of `kind` may occupy. User
/// directories stay out of the metadata directory; system directories are
/// its direct children and never shadow the registry's own files.
pub(crate) fn check_dir_path(
    kind: WorkspaceDirKind,
    relative: &str,
    metadata_dir: &str,
) -> Result<(), String> {
    if relative.is_empty() {
        return match kind {
            WorkspaceDirKind::User => Ok(()),
            WorkspaceDirKind::System => Err("system directories cannot use the root".to_string()),
        };
    }
    let segments: Vec<&str> = relative.split('/').collect();
    if let Some(bad) = segments
        .iter()
        .find(|segment| matches!(**segment, "" | "." | "..") || segment.contains('\\'))
    {
        return Err(format!("segment '{}' is not allowed", bad));
    }
    match kind {
        WorkspaceDirKind::User if segments[0] == metadata_dir => {
            Err(format!("'{}' is reserved for workspace metadata", metadata_dir))
        }
        WorkspaceDirKind::User => Ok(()),
        WorkspaceDirKind::System => match segments.as_slice() {
            [parent, name]
                if *parent == metadata_dir
                    && *name != super::LOCK_FILE_NAME
                    && *name != super::snapshot::SNAPSHOT_FILE_NAME =>
            {
                Ok(())
            }
            _ => Err(format!(
                "system directories must be direct children of '{}'",
                metadata_dir
            )),
        },
    }
}
