use std::path::Path;

use tempfile::TempDir;

use strata_core::error::ErrorClass;
use strata_core::workspace::{
    AllocateOptions, LOCK_FILE_NAME, MainModulePolicy, MultiModulePolicy, SingleModulePolicy,
    Workspace, WorkspaceAccessMode, WorkspaceDir, WorkspaceDirKind, WorkspaceDirTemplate,
    WorkspaceError, WorkspacePolicy,
};

fn user(s: &str) -> WorkspaceDir {
    WorkspaceDir::UserModuleVersion(s.parse().unwrap())
}

fn system(s: &str) -> WorkspaceDir {
    WorkspaceDir::SystemModule(s.parse().unwrap())
}

fn open(root: &Path, policy: Box<dyn WorkspacePolicy>) -> Workspace {
    Workspace::open(root, policy, ".strata").unwrap()
}

fn create() -> AllocateOptions {
    AllocateOptions::create_if_absent()
}

#[test]
fn writer_blocks_readers_and_writers_until_released() {
    let tmp = TempDir::new().unwrap();
    let mut workspace = open(tmp.path(), Box::new(MultiModulePolicy));
    let app = user("Domain/app:D/main");

    let path = workspace
        .allocate(&app, WorkspaceAccessMode::ReadWrite, create())
        .unwrap()
        .unwrap();
    for mode in [WorkspaceAccessMode::ReadWrite, WorkspaceAccessMode::Read] {
        let err = workspace
            .allocate(&app, mode, AllocateOptions::default())
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::AccessConflict { .. }));
        assert_eq!(err.class(), ErrorClass::Fault);
    }

    // Peeking never conflicts.
    assert_eq!(
        workspace
            .allocate(&app, WorkspaceAccessMode::Peek, AllocateOptions::default())
            .unwrap(),
        Some(path.clone())
    );

    workspace.release(&path).unwrap();
    assert_eq!(workspace.get_access_mode(&path).unwrap(), None);

    workspace
        .allocate(&app, WorkspaceAccessMode::Read, AllocateOptions::default())
        .unwrap();
    workspace
        .allocate(&app, WorkspaceAccessMode::Read, AllocateOptions::default())
        .unwrap();
    assert_eq!(
        workspace.get_access_mode(&path).unwrap(),
        Some(WorkspaceAccessMode::Read)
    );
    assert!(
        workspace
            .allocate(&app, WorkspaceAccessMode::ReadWrite, AllocateOptions::default())
            .is_err()
    );
    workspace.release(&path).unwrap();
    workspace.release(&path).unwrap();
    workspace
        .allocate(&app, WorkspaceAccessMode::ReadWrite, AllocateOptions::default())
        .unwrap();
}

#[test]
fn colliding_path_names_owner() {
    let tmp = TempDir::new().unwrap();
    let mut workspace = open(tmp.path(), Box::new(MultiModulePolicy));
    workspace
        .allocate(&user("Domain/app:D/main"), WorkspaceAccessMode::Peek, create())
        .unwrap();

    let err = workspace
        .allocate(&user("Legacy/app:S/1.0"), WorkspaceAccessMode::ReadWrite, create())
        .unwrap_err();
    match &err {
        WorkspaceError::PathCollision { path, owner, .. } => {
            assert_eq!(path, "app");
            assert_eq!(owner, "user directory for Domain/app:D/main");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("Domain/app:D/main"));
    assert!(!workspace.is_workspace_dir_exist(&user("Legacy/app:S/1.0")));
}

#[test]
fn directory_map_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let dirs = [
        user("Domain/app:D/main"),
        user("Domain/lib:S/2.0"),
        user("Tools/cli:D/develop"),
        system("Tools/build"),
    ];
    let mut paths = Vec::new();
    {
        let mut workspace = open(tmp.path(), Box::new(MultiModulePolicy));
        for dir in &dirs {
            paths.push(
                workspace
                    .allocate(dir, WorkspaceAccessMode::Peek, create())
                    .unwrap()
                    .unwrap(),
            );
        }
    }

    let workspace = open(tmp.path(), Box::new(MultiModulePolicy));
    let mut expected = dirs.to_vec();
    expected.sort();
    assert_eq!(workspace.list_directories(&WorkspaceDirTemplate::all()), expected);
    for (dir, path) in dirs.iter().zip(&paths) {
        assert_eq!(workspace.get_workspace_dir_path(dir).as_ref(), Some(path));
        assert_eq!(workspace.get_workspace_dir_from_path(path).as_ref(), Some(dir));
    }
    assert_eq!(paths[3], tmp.path().join(".strata").join("build"));
    assert_eq!(
        workspace.list_directories(&WorkspaceDirTemplate::of_kind(WorkspaceDirKind::System)),
        vec![system("Tools/build")]
    );
}

#[test]
fn snapshot_from_other_policy_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let mut workspace = open(tmp.path(), Box::new(MultiModulePolicy));
    workspace
        .allocate(&user("Domain/app:D/main"), WorkspaceAccessMode::Peek, create())
        .unwrap();

    let err = Workspace::open(tmp.path(), Box::new(SingleModulePolicy), ".strata").unwrap_err();
    assert!(matches!(err, WorkspaceError::UnsupportedFormat { .. }));
    assert_eq!(err.class(), ErrorClass::User);
}

#[test]
fn main_module_occupies_root() {
    let tmp = TempDir::new().unwrap();
    let policy = MainModulePolicy::new("Domain/app".parse().unwrap());
    let mut workspace = open(tmp.path(), Box::new(policy));
    let main = user("Domain/app:D/main");

    let path = workspace
        .allocate(&main, WorkspaceAccessMode::ReadWrite, create())
        .unwrap()
        .unwrap();
    assert_eq!(path, tmp.path());

    let err = workspace
        .allocate(&user("Domain/lib:D/main"), WorkspaceAccessMode::Read, create())
        .unwrap_err();
    assert!(matches!(err, WorkspaceError::UnsupportedDir { .. }));

    let err = workspace
        .allocate(&user("Domain/app:S/1.0"), WorkspaceAccessMode::Read, create())
        .unwrap_err();
    assert!(matches!(err, WorkspaceError::PathCollision { .. }));

    let build = workspace
        .allocate(&system("Tools/build"), WorkspaceAccessMode::Read, create())
        .unwrap()
        .unwrap();
    assert_eq!(build, tmp.path().join(".strata").join("build"));
}

#[test]
fn deleting_root_directory_keeps_metadata() {
    let tmp = TempDir::new().unwrap();
    let mut workspace = open(tmp.path(), Box::new(SingleModulePolicy));
    let app = user("Domain/app:D/main");
    let path = workspace
        .allocate(&app, WorkspaceAccessMode::ReadWrite, create())
        .unwrap()
        .unwrap();
    std::fs::write(path.join("pom.xml"), "<project/>").unwrap();

    workspace.delete(&app).unwrap();
    assert!(!path.join("pom.xml").exists());
    assert!(tmp.path().join(".strata").join("workspace.json").is_file());

    // The root is free again for another module.
    let lib = user("Domain/lib:D/main");
    assert_eq!(
        workspace
            .allocate(&lib, WorkspaceAccessMode::Peek, create())
            .unwrap(),
        Some(tmp.path().to_path_buf())
    );
}

#[test]
fn single_module_accepts_one_user_directory() {
    let tmp = TempDir::new().unwrap();
    let mut workspace = open(tmp.path(), Box::new(SingleModulePolicy));
    workspace
        .allocate(&user("Domain/app:D/main"), WorkspaceAccessMode::Peek, create())
        .unwrap();
    let err = workspace
        .allocate(&user("Domain/lib:D/main"), WorkspaceAccessMode::Peek, create())
        .unwrap_err();
    assert!(matches!(err, WorkspaceError::PathCollision { .. }));
}

#[test]
fn leftover_lock_file_blocks_session() {
    let tmp = TempDir::new().unwrap();
    let lock = tmp.path().join(".strata").join(LOCK_FILE_NAME);
    std::fs::create_dir_all(lock.parent().unwrap()).unwrap();
    std::fs::write(&lock, "").unwrap();

    let mut workspace = open(tmp.path(), Box::new(MultiModulePolicy));
    let err = workspace.start().unwrap_err();
    assert!(matches!(err, WorkspaceError::Locked { .. }));
    assert!(!workspace.is_session_active());

    std::fs::remove_file(&lock).unwrap();
    workspace.start().unwrap();
    workspace.end().unwrap();
}

#[test]
fn module_named_like_metadata_dir_is_refused() {
    let tmp = TempDir::new().unwrap();
    let mut workspace = open(tmp.path(), Box::new(MultiModulePolicy));
    workspace.start().unwrap();
    let shadow = user("Domain/.strata:D/main");

    let err = workspace
        .allocate(&shadow, WorkspaceAccessMode::ReadWrite, create())
        .unwrap_err();
    assert!(matches!(err, WorkspaceError::InvalidPath { .. }));
    assert_eq!(err.class(), ErrorClass::User);
    assert!(!workspace.is_workspace_dir_exist(&shadow));
    assert_eq!(workspace.get_workspace_dir_from_path(Path::new(".strata")), None);
    assert!(tmp.path().join(".strata").join(LOCK_FILE_NAME).is_file());

    // Parent segments never reach the registry.
    assert!("Domain/..:D/main".parse::<strata_core::version::ModuleVersion>().is_err());

    workspace.end().unwrap();
}
