//! Workspace errors.

use std::path::PathBuf;

use super::access::WorkspaceAccessMode;
use crate::error::ErrorClass;

pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error(
        "Workspace is locked by another session ({}). Remove the file if no other session is running.",
        .lock_file.display()
    )]
    Locked { lock_file: PathBuf },

    #[error("No workspace session is active")]
    SessionNotStarted,

    #[error(
        "Unsupported workspace format in {}: found {found_format} {found_version}, expected {expected_format} {expected_version}",
        .path.display()
    )]
    UnsupportedFormat {
        path: PathBuf,
        found_format: String,
        found_version: String,
        expected_format: String,
        expected_version: String,
    },

    #[error("Corrupt workspace snapshot {}: {message}", .path.display())]
    CorruptSnapshot { path: PathBuf, message: String },

    #[error("The main-module workspace policy requires workspace.main_module to be set")]
    MissingMainModule,

    #[error("The {policy} workspace policy does not support the {dir}")]
    UnsupportedDir { dir: String, policy: String },

    #[error("Cannot acquire {requested:?} access to the {dir}: {held:?} access is held")]
    AccessConflict {
        dir: String,
        requested: WorkspaceAccessMode,
        held: WorkspaceAccessMode,
    },

    #[error("No access is held on the {dir}")]
    AccessNotHeld { dir: String },

    #[error("{operation} requires write access to the {dir}")]
    WriteAccessRequired { dir: String, operation: String },

    #[error("Path '{path}' for the {dir} is already used by the {owner}")]
    PathCollision {
        dir: String,
        path: String,
        owner: String,
    },

    #[error("Path '{path}' cannot hold the {dir}: {reason}")]
    InvalidPath {
        dir: String,
        path: String,
        reason: String,
    },

    #[error("The {dir} does not exist")]
    DirNotFound { dir: String },

    #[error("The {dir} already exists")]
    DirAlreadyExists { dir: String },

    #[error("Path {} is not a workspace directory", .path.display())]
    UnknownPath { path: PathBuf },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WorkspaceError {
    pub fn class(&self) -> ErrorClass {
        match self {
            WorkspaceError::Locked { .. }
            | WorkspaceError::UnsupportedFormat { .. }
            | WorkspaceError::CorruptSnapshot { .. }
            | WorkspaceError::MissingMainModule
            | WorkspaceError::UnsupportedDir { .. }
            | WorkspaceError::PathCollision { .. }
            | WorkspaceError::InvalidPath { .. } => ErrorClass::User,
            WorkspaceError::SessionNotStarted
            | WorkspaceError::AccessConflict { .. }
            | WorkspaceError::AccessNotHeld { .. }
            | WorkspaceError::WriteAccessRequired { .. }
            | WorkspaceError::DirNotFound { .. }
            | WorkspaceError::DirAlreadyExists { .. }
            | WorkspaceError::UnknownPath { .. }
            | WorkspaceError::Other(_) => ErrorClass::Fault,
        }
    }
}
