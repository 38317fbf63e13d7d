//! Single-writer/multi-reader arbitration per workspace directory.

use std::collections::HashMap;
use tracing::debug;

use super::dir::WorkspaceDir;
use super::error::{WorkspaceError, WorkspaceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceAccessMode {
    Read,
    ReadWrite,
    /// Inspection only; nothing is recorded.
    Peek,
}

/// Access held per directory. An absent entry means no access, `0` an
/// exclusive writer, `n` that many readers.
#[derive(Debug, Default)]
pub(crate) struct AccessTable {
    holders: HashMap<WorkspaceDir, usize>,
}

impl AccessTable {
    pub(crate) fn mode(&self, dir: &WorkspaceDir) -> Option<WorkspaceAccessMode> {
        self.holders.get(dir).map(|count| match count {
            0 => WorkspaceAccessMode::ReadWrite,
            _ => WorkspaceAccessMode::Read,
        })
    }

    pub(crate) fn acquire(
        &mut self,
        dir: &WorkspaceDir,
        mode: WorkspaceAccessMode,
    ) -> WorkspaceResult<()> {
        let conflict = |held| WorkspaceError::AccessConflict {
            dir: dir.to_string(),
            requested: mode,
            held,
        };
        match (mode, self.holders.get_mut(dir)) {
            (WorkspaceAccessMode::Peek, _) => return Ok(()),
            (WorkspaceAccessMode::Read, None) => {
                self.holders.insert(dir.clone(), 1);
            }
            (WorkspaceAccessMode::Read, Some(0)) => {
                return Err(conflict(WorkspaceAccessMode::ReadWrite));
            }
            (WorkspaceAccessMode::Read, Some(readers)) => *readers += 1,
            (WorkspaceAccessMode::ReadWrite, None) => {
                self.holders.insert(dir.clone(), 0);
            }
            (WorkspaceAccessMode::ReadWrite, Some(0)) => {
                return Err(conflict(WorkspaceAccessMode::ReadWrite));
            }
            (WorkspaceAccessMode::ReadWrite, Some(_)) => {
                return Err(conflict(WorkspaceAccessMode::Read));
            }
        }
        debug!(dir = %dir, ?mode, "acquired workspace access");
        Ok(())
    }

    pub(crate) fn release(&mut self, dir: &WorkspaceDir) -> WorkspaceResult<()> {
        match self.holders.get_mut(dir) {
            None => {
                return Err(WorkspaceError::AccessNotHeld {
                    dir: dir.to_string(),
                });
            }
            Some(readers) if *readers > 1 => *readers -= 1,
            Some(_) => {
                self.holders.remove(dir);
            }
        }
        debug!(dir = %dir, "released workspace access");
        Ok(())
    }

    /// Move the access held on `from` to `to`.
    pub(crate) fn transfer(&mut self, from: &WorkspaceDir, to: &WorkspaceDir) {
        if let Some(count) = self.holders.remove(from) {
            self.holders.insert(to.clone(), count);
        }
    }

    pub(crate) fn forget(&mut self, dir: &WorkspaceDir) {
        self.holders.remove(dir);
    }
}
