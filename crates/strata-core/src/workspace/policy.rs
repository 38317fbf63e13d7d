//! Directory allocation strategies.
//!
//! All policies share the arbitration in [`super::Workspace`]; they differ in
//! which directories they accept and where those directories live. Paths
//! are relative to the workspace root, `/`-separated, and empty for the root
//! itself.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::dir::WorkspaceDir;
use super::error::{WorkspaceError, WorkspaceResult};
use crate::config::WorkspaceSection;
use crate::model::NodePath;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    /// Every module version gets its own directory under the root.
    #[default]
    MultiModule,
    /// One configured module occupies the root.
    MainModule,
    /// The first module version checked out occupies the root.
    SingleModule,
}

impl PolicyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PolicyKind::MultiModule => "multi-module",
            PolicyKind::MainModule => "main-module",
            PolicyKind::SingleModule => "single-module",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `(format, version)` tag written into the directory snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatTag {
    pub format: &'static str,
    pub version: &'static str,
}

pub trait WorkspacePolicy: fmt::Debug {
    fn kind(&self) -> PolicyKind;

    fn format_tag(&self) -> FormatTag {
        FormatTag {
            format: self.kind().as_str(),
            version: "1.0",
        }
    }

    /// Reject directories this policy cannot hold.
    fn check_dir(&self, dir: &WorkspaceDir) -> WorkspaceResult<()> {
        let _ = dir;
        Ok(())
    }

    /// Deterministic path a new directory is allocated at.
    fn candidate_path(&self, dir: &WorkspaceDir, metadata_dir: &str) -> String;
}

/// Build the policy named by the workspace configuration.
pub fn policy_from_config(section: &WorkspaceSection) -> WorkspaceResult<Box<dyn WorkspacePolicy>> {
    Ok(match section.policy() {
        PolicyKind::MultiModule => Box::new(MultiModulePolicy),
        PolicyKind::SingleModule => Box::new(SingleModulePolicy),
        PolicyKind::MainModule => {
            let main_module = section
                .main_module
                .clone()
                .ok_or(WorkspaceError::MissingMainModule)?;
            Box::new(MainModulePolicy::new(main_module))
        }
    })
}

fn leaf_name(path: &NodePath) -> &str {
    path.leaf().unwrap_or_default()
}

fn system_path(path: &NodePath, metadata_dir: &str) -> String {
    format!("{}/{}", metadata_dir, leaf_name(path))
}

#[derive(Debug, Clone, Default)]
pub struct MultiModulePolicy;

impl WorkspacePolicy for MultiModulePolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::MultiModule
    }

    fn candidate_path(&self, dir: &WorkspaceDir, metadata_dir: &str) -> String {
        match dir {
            WorkspaceDir::UserModuleVersion(module_version) => {
                leaf_name(module_version.node_path()).to_string()
            }
            WorkspaceDir::SystemModule(path) => system_path(path, metadata_dir),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MainModulePolicy {
    main_module: NodePath,
}

impl MainModulePolicy {
    pub fn new(main_module: NodePath) -> Self {
        Self { main_module }
    }

    pub fn main_module(&self) -> &NodePath {
        &self.main_module
    }
}

impl WorkspacePolicy for MainModulePolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::MainModule
    }

    fn check_dir(&self, dir: &WorkspaceDir) -> WorkspaceResult<()> {
        match dir {
            WorkspaceDir::UserModuleVersion(module_version)
                if module_version.node_path() != &self.main_module =>
            {
                Err(WorkspaceError::UnsupportedDir {
                    dir: dir.to_string(),
                    policy: format!("{} ({})", self.kind(), self.main_module),
                })
            }
            _ => Ok(()),
        }
    }

    fn candidate_path(&self, dir: &WorkspaceDir, metadata_dir: &str) -> String {
        match dir {
            WorkspaceDir::UserModuleVersion(_) => String::new(),
            WorkspaceDir::SystemModule(path) => system_path(path, metadata_dir),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SingleModulePolicy;

impl WorkspacePolicy for SingleModulePolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::SingleModule
    }

    fn candidate_path(&self, dir: &WorkspaceDir, metadata_dir: &str) -> String {
        match dir {
            WorkspaceDir::UserModuleVersion(_) => String::new(),
            WorkspaceDir::SystemModule(path) => system_path(path, metadata_dir),
        }
    }
}
