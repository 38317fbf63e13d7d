//! Workspace directory registry.
//!
//! Maps logical directories (a module version checked out for the user, or a
//! system-managed module) to paths under the workspace root, arbitrates
//! read/write access to them, and persists the map after every change.

pub mod access;
pub mod dir;
pub mod error;
pub mod policy;
pub mod snapshot;

use std::collections::{BTreeMap, HashMap};
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, info};

use access::AccessTable;
use dir::check_dir_path;
use snapshot::{SNAPSHOT_FILE_NAME, WorkspaceSnapshot};

pub use access::WorkspaceAccessMode;
pub use dir::{WorkspaceDir, WorkspaceDirKind, WorkspaceDirTemplate};
pub use error::{WorkspaceError, WorkspaceResult};
pub use policy::{
    FormatTag, MainModulePolicy, MultiModulePolicy, PolicyKind, SingleModulePolicy,
    WorkspacePolicy, policy_from_config,
};

pub const LOCK_FILE_NAME: &str = "workspace.lock";

/// Options for [`Workspace::allocate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocateOptions {
    /// Register a path when the directory is not known yet.
    pub create_if_absent: bool,
    /// Empty the directory if it already exists on disk.
    pub reset_if_exist: bool,
    /// Fail unless the directory is already registered.
    pub must_exist: bool,
    /// Fail if the directory is already registered.
    pub must_not_exist: bool,
    /// Create the directory on disk when missing.
    pub create_path: bool,
}

impl Default for AllocateOptions {
    fn default() -> Self {
        Self {
            create_if_absent: false,
            reset_if_exist: false,
            must_exist: false,
            must_not_exist: false,
            create_path: true,
        }
    }
}

impl AllocateOptions {
    pub fn create_if_absent() -> Self {
        Self {
            create_if_absent: true,
            ..Self::default()
        }
    }
}

#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    metadata_dir: String,
    policy: Box<dyn WorkspacePolicy>,
    dirs: BTreeMap<WorkspaceDir, String>,
    paths: HashMap<String, WorkspaceDir>,
    access: AccessTable,
    session_active: bool,
}

impl Workspace {
    /// Open the workspace at `root`, loading its directory map if one was
    /// saved. A map saved under another policy is rejected.
    pub fn open(
        root: impl Into<PathBuf>,
        policy: Box<dyn WorkspacePolicy>,
        metadata_dir: &str,
    ) -> WorkspaceResult<Self> {
        let root = root.into();
        let snapshot_path = root.join(metadata_dir).join(SNAPSHOT_FILE_NAME);
        let dirs = match WorkspaceSnapshot::load(&snapshot_path, policy.format_tag())? {
            Some(snapshot) => snapshot.into_map(&snapshot_path, metadata_dir)?,
            None => BTreeMap::new(),
        };
        let paths = dirs
            .iter()
            .map(|(dir, path)| (path.clone(), dir.clone()))
            .collect();
        debug!(root = %root.display(), policy = %policy.kind(), dirs = dirs.len(), "opened workspace");

        Ok(Self {
            root,
            metadata_dir: metadata_dir.to_string(),
            policy,
            dirs,
            paths,
            access: AccessTable::default(),
            session_active: false,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(&self.metadata_dir)
    }

    pub fn policy(&self) -> &dyn WorkspacePolicy {
        self.policy.as_ref()
    }

    fn lock_path(&self) -> PathBuf {
        self.metadata_path().join(LOCK_FILE_NAME)
    }

    fn snapshot_path(&self) -> PathBuf {
        self.metadata_path().join(SNAPSHOT_FILE_NAME)
    }

    /// Start a tool session by creating the lock file. Fails when another
    /// session holds it. A crashed session leaves the file behind; it must
    /// then be removed by hand.
    pub fn start(&mut self) -> WorkspaceResult<()> {
        let lock_path = self.lock_path();
        crate::fs::create_dir(&self.metadata_path())?;
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(WorkspaceError::Locked {
                    lock_file: lock_path,
                });
            }
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("Failed to create lock file: {}", lock_path.display()))
                    .into());
            }
        }
        self.session_active = true;
        info!(root = %self.root.display(), "workspace session started");
        Ok(())
    }

    /// End the session and remove the lock file.
    pub fn end(&mut self) -> WorkspaceResult<()> {
        if !self.session_active {
            return Err(WorkspaceError::SessionNotStarted);
        }
        let lock_path = self.lock_path();
        std::fs::remove_file(&lock_path)
            .with_context(|| format!("Failed to remove lock file: {}", lock_path.display()))?;
        self.session_active = false;
        info!(root = %self.root.display(), "workspace session ended");
        Ok(())
    }

    pub fn is_session_active(&self) -> bool {
        self.session_active
    }

    /// Acquire `mode` access to `dir` and return its path.
    ///
    /// Returns `None` when `dir` is not registered and
    /// `options.create_if_absent` is unset. Access acquired here is released
    /// with [`Workspace::release`], except for [`WorkspaceAccessMode::Peek`]
    /// which is never recorded.
    pub fn allocate(
        &mut self,
        dir: &WorkspaceDir,
        mode: WorkspaceAccessMode,
        options: AllocateOptions,
    ) -> WorkspaceResult<Option<PathBuf>> {
        self.policy.check_dir(dir)?;

        let registered = self.dirs.contains_key(dir);
        if options.must_exist && !registered {
            return Err(WorkspaceError::DirNotFound {
                dir: dir.to_string(),
            });
        }
        if options.must_not_exist && registered {
            return Err(WorkspaceError::DirAlreadyExists {
                dir: dir.to_string(),
            });
        }
        if options.reset_if_exist && mode != WorkspaceAccessMode::ReadWrite {
            return Err(WorkspaceError::WriteAccessRequired {
                dir: dir.to_string(),
                operation: "Resetting".to_string(),
            });
        }
        if !registered && !options.create_if_absent {
            return Ok(None);
        }

        self.access.acquire(dir, mode)?;
        match self.allocate_acquired(dir, registered, options) {
            Ok(path) => Ok(Some(path)),
            Err(e) => {
                if mode != WorkspaceAccessMode::Peek {
                    let _ = self.access.release(dir);
                }
                Err(e)
            }
        }
    }

    fn allocate_acquired(
        &mut self,
        dir: &WorkspaceDir,
        registered: bool,
        options: AllocateOptions,
    ) -> WorkspaceResult<PathBuf> {
        if !registered {
            let candidate = self.policy.candidate_path(dir, &self.metadata_dir);
            check_dir_path(dir.kind(), &candidate, &self.metadata_dir).map_err(|reason| {
                WorkspaceError::InvalidPath {
                    dir: dir.to_string(),
                    path: candidate.clone(),
                    reason,
                }
            })?;
            if let Some(owner) = self.paths.get(&candidate) {
                return Err(WorkspaceError::PathCollision {
                    dir: dir.to_string(),
                    path: candidate,
                    owner: owner.to_string(),
                });
            }
            self.dirs.insert(dir.clone(), candidate.clone());
            self.paths.insert(candidate.clone(), dir.clone());
            if let Err(e) = self.persist() {
                self.dirs.remove(dir);
                self.paths.remove(&candidate);
                return Err(e);
            }
            info!(dir = %dir, path = %candidate, "allocated workspace directory");
        }

        let relative = self.relative_path(dir)?;
        let path = self.absolute(&relative);
        if options.reset_if_exist && path.is_dir() {
            crate::fs::reset_dir(&path, &[self.metadata_dir.as_str()])?;
            debug!(dir = %dir, "reset workspace directory");
        }
        if options.create_path && !path.is_dir() {
            crate::fs::create_dir(&path)?;
        }
        Ok(path)
    }

    /// Release access acquired by [`Workspace::allocate`] on the directory at
    /// `path`.
    pub fn release(&mut self, path: &Path) -> WorkspaceResult<()> {
        let dir = self.dir_at(path)?;
        self.access.release(&dir)
    }

    /// Access currently held on the directory at `path`; `None` when nobody
    /// holds any.
    pub fn get_access_mode(&self, path: &Path) -> WorkspaceResult<Option<WorkspaceAccessMode>> {
        let dir = self.dir_at(path)?;
        Ok(self.access.mode(&dir))
    }

    /// Re-key the directory of `old` to `new`, keeping its path. The caller
    /// must hold write access to `old`; it then holds write access to `new`.
    pub fn update(&mut self, old: &WorkspaceDir, new: &WorkspaceDir) -> WorkspaceResult<()> {
        self.require_write(old, "Updating")?;
        self.policy.check_dir(new)?;
        if self.dirs.contains_key(new) {
            return Err(WorkspaceError::DirAlreadyExists {
                dir: new.to_string(),
            });
        }
        let path = self.relative_path(old)?;

        self.dirs.remove(old);
        self.dirs.insert(new.clone(), path.clone());
        self.paths.insert(path.clone(), new.clone());
        if let Err(e) = self.persist() {
            self.dirs.remove(new);
            self.dirs.insert(old.clone(), path.clone());
            self.paths.insert(path, old.clone());
            return Err(e);
        }
        self.access.transfer(old, new);
        info!(old = %old, new = %new, "updated workspace directory");
        Ok(())
    }

    /// Unregister `dir` and delete it from disk. The caller must hold write
    /// access; it is dropped along with the directory.
    pub fn delete(&mut self, dir: &WorkspaceDir) -> WorkspaceResult<()> {
        self.require_write(dir, "Deleting")?;
        let relative = self.relative_path(dir)?;

        self.dirs.remove(dir);
        self.paths.remove(&relative);
        if let Err(e) = self.persist() {
            self.dirs.insert(dir.clone(), relative.clone());
            self.paths.insert(relative, dir.clone());
            return Err(e);
        }
        self.access.forget(dir);

        let path = self.absolute(&relative);
        if relative.is_empty() {
            crate::fs::reset_dir(&path, &[self.metadata_dir.as_str()])?;
        } else {
            crate::fs::remove_dir(&path)?;
        }
        info!(dir = %dir, path = %path.display(), "deleted workspace directory");
        Ok(())
    }

    /// Registered directories matching `template`, in identifier order.
    pub fn list_directories(&self, template: &WorkspaceDirTemplate) -> Vec<WorkspaceDir> {
        self.dirs
            .keys()
            .filter(|dir| template.matches(dir))
            .cloned()
            .collect()
    }

    pub fn get_workspace_dir_path(&self, dir: &WorkspaceDir) -> Option<PathBuf> {
        self.dirs.get(dir).map(|relative| self.absolute(relative))
    }

    /// Directory registered at `path`, absolute or relative to the root.
    pub fn get_workspace_dir_from_path(&self, path: &Path) -> Option<WorkspaceDir> {
        let relative = self.relativize(path)?;
        self.paths.get(&relative).cloned()
    }

    pub fn is_workspace_dir_exist(&self, dir: &WorkspaceDir) -> bool {
        self.dirs.contains_key(dir)
    }

    fn require_write(&self, dir: &WorkspaceDir, operation: &str) -> WorkspaceResult<()> {
        if self.access.mode(dir) == Some(WorkspaceAccessMode::ReadWrite) {
            Ok(())
        } else {
            Err(WorkspaceError::WriteAccessRequired {
                dir: dir.to_string(),
                operation: operation.to_string(),
            })
        }
    }

    fn relative_path(&self, dir: &WorkspaceDir) -> WorkspaceResult<String> {
        self.dirs
            .get(dir)
            .cloned()
            .ok_or_else(|| WorkspaceError::DirNotFound {
                dir: dir.to_string(),
            })
    }

    fn dir_at(&self, path: &Path) -> WorkspaceResult<WorkspaceDir> {
        self.get_workspace_dir_from_path(path)
            .ok_or_else(|| WorkspaceError::UnknownPath {
                path: path.to_path_buf(),
            })
    }

    fn absolute(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |path, part| path.join(part))
    }

    fn relativize(&self, path: &Path) -> Option<String> {
        let relative = if path.is_absolute() {
            path.strip_prefix(&self.root).ok()?
        } else {
            path
        };
        let parts = relative
            .components()
            .map(|component| component.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()?;
        Some(parts.join("/"))
    }

    fn persist(&self) -> WorkspaceResult<()> {
        WorkspaceSnapshot::from_map(self.policy.format_tag(), &self.dirs).save(&self.snapshot_path())?;
        debug!(dirs = self.dirs.len(), "saved workspace snapshot");
        Ok(())
    }
}
