mod support;

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use strata_core::error::ErrorClass;
use strata_core::model::plugin::erase;
use strata_core::model::{
    ArtifactGroupId, ArtifactInfo, ArtifactProduction, FindModuleByArtifact, ModelError,
    PluginClass, PluginContext, PluginDefinition, PluginFactory, PluginRegistry,
};

use support::*;

/// Implements two plugin interfaces.
struct Catalog;

impl ArtifactInfo for Catalog {
    fn production(&self, _artifact: &ArtifactGroupId) -> ArtifactProduction {
        ArtifactProduction::No
    }
}

impl FindModuleByArtifact for Catalog {
    fn candidate_module_names(
        &self,
        _context: &PluginContext<'_>,
        _artifact: &ArtifactGroupId,
    ) -> anyhow::Result<Vec<String>> {
        Ok(Vec::new())
    }
}

struct Fixed;

impl ArtifactInfo for Fixed {
    fn production(&self, _artifact: &ArtifactGroupId) -> ArtifactProduction {
        ArtifactProduction::Possibly
    }
}

struct FixedFactory;

impl PluginFactory for FixedFactory {
    fn create(
        &self,
        _context: &PluginContext<'_>,
        interface: &str,
        _plugin_id: Option<&str>,
    ) -> anyhow::Result<Box<dyn Any>> {
        anyhow::ensure!(interface == "ArtifactInfo", "unsupported interface {}", interface);
        Ok(erase::<dyn ArtifactInfo>(Arc::new(Fixed)))
    }
}

fn registry() -> PluginRegistry {
    registry_counting(Arc::new(AtomicUsize::new(0)))
}

fn registry_counting(constructed: Arc<AtomicUsize>) -> PluginRegistry {
    let mut registry = PluginRegistry::with_builtin_classes();
    registry.register(
        PluginClass::direct("catalog", move |_context: &PluginContext<'_>| {
            constructed.fetch_add(1, Ordering::SeqCst);
            Ok::<_, anyhow::Error>(Catalog)
        })
            .implements::<dyn ArtifactInfo, _>(|plugin| plugin as Arc<dyn ArtifactInfo>)
            .implements::<dyn FindModuleByArtifact, _>(|plugin| {
                plugin as Arc<dyn FindModuleByArtifact>
            })
            .build(),
    );
    registry.register(PluginClass::factory("fixed-factory", FixedFactory));
    registry
}

fn thin<T: ?Sized>(plugin: &Arc<T>) -> *const () {
    Arc::as_ptr(plugin) as *const ()
}

#[test]
fn one_instance_per_class_per_node() {
    let mut root = root(vec![module("app", vec![]), module("lib", vec![])]);
    root.plugins.push(plugin("ArtifactInfo", "catalog"));
    root.plugins.push(plugin("FindModuleByArtifact", "catalog"));
    let constructed = Arc::new(AtomicUsize::new(0));
    let mut model = build_model_with(root, registry_counting(constructed.clone()));
    let app = model.get_module(&"app".parse().unwrap()).unwrap().unwrap();
    let lib = model.get_module(&"lib".parse().unwrap()).unwrap().unwrap();

    let info = model.get_node_plugin::<dyn ArtifactInfo>(app, None).unwrap();
    let finder = model
        .get_node_plugin::<dyn FindModuleByArtifact>(app, None)
        .unwrap();
    assert_eq!(thin(&info), thin(&finder));
    assert_eq!(constructed.load(Ordering::SeqCst), 1);

    let other = model.get_node_plugin::<dyn ArtifactInfo>(lib, None).unwrap();
    assert_ne!(thin(&info), thin(&other));
    assert_eq!(constructed.load(Ordering::SeqCst), 2);
}

#[test]
fn repeated_requests_share_instance() {
    let mut root = root(vec![module("app", vec![])]);
    root.plugins.push(plugin("ArtifactInfo", "catalog"));
    let mut model = build_model_with(root, registry());
    let app = model.get_module(&"app".parse().unwrap()).unwrap().unwrap();

    let info = model.get_node_plugin::<dyn ArtifactInfo>(app, None).unwrap();
    let again = model.get_node_plugin::<dyn ArtifactInfo>(app, None).unwrap();
    assert!(Arc::ptr_eq(&info, &again));
    assert!(model.has_node_plugin::<dyn ArtifactInfo>(app, None).unwrap());
}

#[test]
fn factory_results_are_not_cached() {
    let mut root = root(vec![module("app", vec![])]);
    root.plugins.push(plugin("ArtifactInfo", "fixed-factory"));
    let mut model = build_model_with(root, registry());
    let app = model.get_module(&"app".parse().unwrap()).unwrap().unwrap();

    let first = model.get_node_plugin::<dyn ArtifactInfo>(app, None).unwrap();
    let second = model.get_node_plugin::<dyn ArtifactInfo>(app, None).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(
        first.production(&"a:b".parse().unwrap()),
        ArtifactProduction::Possibly
    );
}

#[test]
fn class_must_declare_interface() {
    let mut root = root(vec![module("app", vec![])]);
    root.plugins.push(plugin("ArtifactInfo", "artifact-id-module-finder"));
    let mut model = build_model_with(root, registry());
    let app = model.get_module(&"app".parse().unwrap()).unwrap().unwrap();

    let err = model
        .get_node_plugin::<dyn ArtifactInfo>(app, None)
        .err()
        .unwrap();
    assert!(matches!(err, ModelError::PluginInterfaceMismatch { .. }));
    assert_eq!(err.class(), ErrorClass::Fault);
}

#[test]
fn missing_and_unknown_plugins() {
    let mut root = root(vec![module("app", vec![])]);
    root.plugins.push(PluginDefinition::new(
        "ArtifactInfo",
        Some("legacy".to_string()),
        Some("no-such-class".to_string()),
        false,
    ));
    let mut model = build_model_with(root, registry());
    let app = model.get_module(&"app".parse().unwrap()).unwrap().unwrap();

    assert!(matches!(
        model.get_node_plugin::<dyn ArtifactInfo>(app, None).err(),
        Some(ModelError::PluginNotFound { .. })
    ));
    assert!(!model.has_node_plugin::<dyn ArtifactInfo>(app, None).unwrap());
    assert!(matches!(
        model
            .get_node_plugin::<dyn ArtifactInfo>(app, Some("legacy"))
            .err(),
        Some(ModelError::UnknownPluginClass { .. })
    ));
    assert_eq!(
        model.list_plugin_ids(app, "ArtifactInfo").unwrap(),
        vec!["legacy".to_string()]
    );
}

#[test]
fn disabled_definition_hides_inherited_plugin() {
    let mut app = module("app", vec![]);
    app.plugins
        .push(PluginDefinition::new("ArtifactInfo", None, None, false));
    let mut root = root(vec![app, module("lib", vec![])]);
    root.plugins.push(plugin("ArtifactInfo", "property-artifact-info"));
    let mut model = build_model_with(root, registry());

    let app = model.get_module(&"app".parse().unwrap()).unwrap().unwrap();
    let lib = model.get_module(&"lib".parse().unwrap()).unwrap().unwrap();
    assert!(!model.has_node_plugin::<dyn ArtifactInfo>(app, None).unwrap());
    assert!(model.has_node_plugin::<dyn ArtifactInfo>(lib, None).unwrap());
}

fn with_id(id: &str, class: Option<&str>, only_this_node: bool) -> PluginDefinition {
    PluginDefinition::new(
        "ArtifactInfo",
        Some(id.to_string()),
        class.map(str::to_string),
        only_this_node,
    )
}

#[test]
fn listed_ids_follow_nearest_definition() {
    let mut app = module("app", vec![]);
    app.plugins.push(with_id("beta", None, false));
    app.plugins.push(with_id("epsilon", Some("catalog"), false));
    let mut domain = classification("Domain", vec![app]);
    domain.plugins.push(with_id("gamma", Some("catalog"), true));
    domain.plugins.push(with_id("delta", Some("catalog"), false));
    let mut root = root(vec![domain]);
    root.plugins.push(with_id("alpha", Some("catalog"), false));
    root.plugins.push(with_id("beta", Some("catalog"), false));
    root.plugins.push(with_id("gamma", Some("catalog"), false));
    let mut model = build_model_with(root, registry());

    let app = model.get_module(&"Domain/app".parse().unwrap()).unwrap().unwrap();
    let domain = model
        .get_classification_node(&"Domain".parse().unwrap())
        .unwrap()
        .unwrap();

    // beta is disabled on app; gamma is restricted to Domain.
    assert_eq!(
        model.list_plugin_ids(app, "ArtifactInfo").unwrap(),
        vec!["epsilon", "delta", "alpha"]
    );
    assert!(!model.has_node_plugin::<dyn ArtifactInfo>(app, Some("beta")).unwrap());
    assert!(!model.has_node_plugin::<dyn ArtifactInfo>(app, Some("gamma")).unwrap());

    assert_eq!(
        model.list_plugin_ids(domain, "ArtifactInfo").unwrap(),
        vec!["gamma", "delta", "alpha", "beta"]
    );
}
