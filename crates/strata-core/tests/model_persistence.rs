mod support;

use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use strata_core::error::ErrorClass;
use strata_core::model::{
    Model, ModelConfigStore, ModelError, NodeEvent, NodeEventKind, NodeState, PluginRegistry,
};

const MODEL_TOML: &str = r#"
[root]
properties = [{ name = "OWNER", value = "platform" }]

[[root.children]]
name = "Domain"

[[root.children.children]]
kind = "module"
name = "app"
properties = [{ name = "OWNER", value = "team-$parent$" }]
"#;

fn load(tmp: &TempDir) -> Model {
    let store = ModelConfigStore::new(tmp.path().join("model.toml"));
    Model::load(store, Arc::new(PluginRegistry::with_builtin_classes())).unwrap()
}

fn write_model(tmp: &TempDir) {
    std::fs::write(tmp.path().join("model.toml"), MODEL_TOML).unwrap();
}

#[test]
fn loads_model_file() {
    let tmp = TempDir::new().unwrap();
    write_model(&tmp);
    let mut model = load(&tmp);

    let app = model.get_module(&"Domain/app".parse().unwrap()).unwrap().unwrap();
    assert_eq!(model.state(app).unwrap(), NodeState::Config);
    assert_eq!(
        model.get_property(app, "OWNER").unwrap().as_deref(),
        Some("team-platform")
    );
}

#[test]
fn created_module_is_persisted() {
    let tmp = TempDir::new().unwrap();
    write_model(&tmp);
    let mut model = load(&tmp);

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    model
        .register_listener(
            None,
            Some(NodeEventKind::Created),
            true,
            Arc::new(move |event: &NodeEvent| {
                sink.lock().unwrap().push(event.node_path.to_string());
            }),
        )
        .unwrap();

    let domain = model
        .get_classification_node(&"Domain".parse().unwrap())
        .unwrap()
        .unwrap();
    let lib = model.create_module(domain).unwrap();
    assert_eq!(model.state(lib).unwrap(), NodeState::New);

    let mut transfer = model.get_node_config_transfer_object(lib, None).unwrap();
    transfer.set_name("lib");
    transfer.set_property("OWNER", Some("team-lib".to_string()), false);
    model.set_node_config_transfer_object(lib, transfer, None).unwrap();

    assert_eq!(model.state(lib).unwrap(), NodeState::Config);
    assert_eq!(*events.lock().unwrap(), vec!["Domain/lib".to_string()]);

    let mut reloaded = load(&tmp);
    let lib = reloaded
        .get_module(&"Domain/lib".parse().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(
        reloaded.get_property(lib, "OWNER").unwrap().as_deref(),
        Some("team-lib")
    );
}

#[test]
fn stale_lock_handle_conflicts() {
    let tmp = TempDir::new().unwrap();
    write_model(&tmp);
    let mut model = load(&tmp);
    let app = model.get_module(&"Domain/app".parse().unwrap()).unwrap().unwrap();

    let mut first = model.create_optimistic_lock_handle(app, false).unwrap();
    let mut second = model.create_optimistic_lock_handle(app, false).unwrap();
    let mut edit_first = model
        .get_node_config_transfer_object(app, Some(&mut first))
        .unwrap();
    let mut edit_second = model
        .get_node_config_transfer_object(app, Some(&mut second))
        .unwrap();

    edit_first.set_property("TIER", Some("gold".to_string()), false);
    model
        .set_node_config_transfer_object(app, edit_first, Some(&mut first))
        .unwrap();
    assert!(model.is_optimistic_lock_valid(app, &first).unwrap());
    assert!(!model.is_optimistic_lock_valid(app, &second).unwrap());

    edit_second.set_property("TIER", Some("silver".to_string()), false);
    let err = model
        .set_node_config_transfer_object(app, edit_second, Some(&mut second))
        .unwrap_err();
    assert!(matches!(err, ModelError::OptimisticLockConflict { .. }));
    assert_eq!(err.class(), ErrorClass::Conflict);
    assert_eq!(
        model.get_property(app, "TIER").unwrap().as_deref(),
        Some("gold")
    );
}

#[test]
fn rename_to_existing_sibling_is_rejected() {
    let tmp = TempDir::new().unwrap();
    write_model(&tmp);
    let mut model = load(&tmp);
    let domain = model
        .get_classification_node(&"Domain".parse().unwrap())
        .unwrap()
        .unwrap();

    let other = model.create_module(domain).unwrap();
    let mut transfer = model.get_node_config_transfer_object(other, None).unwrap();
    transfer.set_name("app");
    let err = model
        .set_node_config_transfer_object(other, transfer, None)
        .unwrap_err();
    assert!(matches!(err, ModelError::DuplicateNode { .. }));
    assert_eq!(model.state(other).unwrap(), NodeState::New);
}

#[test]
fn deleting_config_node_is_persisted() {
    let tmp = TempDir::new().unwrap();
    write_model(&tmp);
    let mut model = load(&tmp);
    let app = model.get_module(&"Domain/app".parse().unwrap()).unwrap().unwrap();

    model.delete_node(app).unwrap();
    assert_eq!(model.state(app).unwrap(), NodeState::Deleted);
    assert!(model.get_property(app, "OWNER").is_err());

    let mut reloaded = load(&tmp);
    assert!(
        reloaded
            .get_node(&"Domain/app".parse().unwrap())
            .unwrap()
            .is_none()
    );
}
