//! On-disk snapshot of the directory map (`workspace.json`).

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use super::dir::{WorkspaceDir, WorkspaceDirKind, check_dir_path};
use super::error::{WorkspaceError, WorkspaceResult};
use super::policy::FormatTag;

pub const SNAPSHOT_FILE_NAME: &str = "workspace.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceSnapshot {
    pub format: String,
    pub version: String,
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub directories: Vec<DirectoryRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryRecord {
    pub kind: WorkspaceDirKind,
    pub logical: String,
    /// Relative to the workspace root, `/`-separated.
    pub path: String,
}

impl WorkspaceSnapshot {
    pub fn from_map(tag: FormatTag, dirs: &BTreeMap<WorkspaceDir, String>) -> Self {
        Self {
            format: tag.format.to_string(),
            version: tag.version.to_string(),
            saved_at: Utc::now(),
            directories: dirs
                .iter()
                .map(|(dir, path)| DirectoryRecord {
                    kind: dir.kind(),
                    logical: dir.logical(),
                    path: path.clone(),
                })
                .collect(),
        }
    }

    /// Load the snapshot at `path`, `None` when there is none yet.
    pub fn load(path: &Path, expected: FormatTag) -> WorkspaceResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read workspace snapshot: {}", path.display()))?;
        let snapshot: Self =
            serde_json::from_slice(&bytes).map_err(|e| WorkspaceError::CorruptSnapshot {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        if snapshot.format != expected.format || snapshot.version != expected.version {
            return Err(WorkspaceError::UnsupportedFormat {
                path: path.to_path_buf(),
                found_format: snapshot.format,
                found_version: snapshot.version,
                expected_format: expected.format.to_string(),
                expected_version: expected.version.to_string(),
            });
        }
        Ok(Some(snapshot))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(self).context("Failed to serialize workspace snapshot")?;
        crate::fs::write_atomic(path, &json)
            .with_context(|| format!("Failed to save workspace snapshot: {}", path.display()))
    }

    /// Rebuild the directory map, rejecting duplicate identifiers or paths
    /// and paths a directory of that kind may not occupy.
    pub fn into_map(
        self,
        path: &Path,
        metadata_dir: &str,
    ) -> WorkspaceResult<BTreeMap<WorkspaceDir, String>> {
        let corrupt = |message: String| WorkspaceError::CorruptSnapshot {
            path: path.to_path_buf(),
            message,
        };
        let mut dirs = BTreeMap::new();
        let mut seen = HashSet::new();
        for record in self.directories {
            let dir = WorkspaceDir::from_logical(record.kind, &record.logical)
                .map_err(|e| corrupt(format!("{:#}", e)))?;
            check_dir_path(record.kind, &record.path, metadata_dir)
                .map_err(|reason| corrupt(format!("path '{}': {}", record.path, reason)))?;
            if !seen.insert(record.path.clone()) {
                return Err(corrupt(format!("path '{}' is mapped twice", record.path)));
            }
            if dirs.insert(dir.clone(), record.path).is_some() {
                return Err(corrupt(format!("{} is mapped twice", dir)));
            }
        }
        Ok(dirs)
    }
}
