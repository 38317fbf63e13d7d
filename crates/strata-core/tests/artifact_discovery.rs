mod support;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use strata_core::error::ErrorClass;
use strata_core::model::builtin::{
    ARTIFACT_GROUP_ID_PRODUCED_LIST, DYNAMIC_MODULE_GROUP_ID, DYNAMIC_MODULE_NAME_REGEX,
    FIND_MODULE_OPTIMISTIC,
};
use strata_core::model::{
    ArtifactGroupId, ConditionDecision, ExceptionalCondition, ExceptionalConditionPolicy, Model,
    ModelError, NodeConfig, NodeState,
};

use support::*;

#[derive(Clone, Default)]
struct RecordingPolicy {
    calls: Arc<AtomicUsize>,
    decision: ConditionDecision,
}

impl ExceptionalConditionPolicy for RecordingPolicy {
    fn decide(&self, condition: &ExceptionalCondition) -> ConditionDecision {
        assert_eq!(condition.name, "module-not-found");
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.decision
    }
}

fn artifact(s: &str) -> ArtifactGroupId {
    s.parse().unwrap()
}

fn producing(name: &str, artifacts: &str) -> NodeConfig {
    module(name, vec![property(ARTIFACT_GROUP_ID_PRODUCED_LIST, artifacts)])
}

/// Root defines the artifact info plugin for every module.
fn model_with(children: Vec<NodeConfig>, root_properties: Vec<(&str, &str)>) -> Model {
    let mut root = root(children);
    root.plugins.push(plugin("ArtifactInfo", "property-artifact-info"));
    root.properties = root_properties
        .into_iter()
        .map(|(name, value)| property(name, value))
        .collect();
    build_model(root)
}

/// `Domain` knows how to find and materialise modules it has no
/// configuration for.
fn dynamic_domain(extra: Vec<(&str, &str)>) -> NodeConfig {
    let mut domain = classification("Domain", vec![producing("app", "com.acme:app")]);
    domain
        .plugins
        .push(local_plugin("FindModuleByArtifact", "artifact-id-module-finder"));
    domain.plugins.push(local_plugin(
        "UndefinedDescendantNodeManager",
        "permissive-module-manager",
    ));
    domain.properties.push(property(DYNAMIC_MODULE_GROUP_ID, "com.acme"));
    for (name, value) in extra {
        domain.properties.push(property(name, value));
    }
    domain
}

#[test]
fn finds_materialized_producer() {
    let mut model = model_with(
        vec![classification(
            "Domain",
            vec![producing("app", "com.acme:app, com.acme:app-api"), producing("lib", "com.acme:lib")],
        )],
        vec![],
    );

    let module = model
        .find_module_by_artifact_group_id(&artifact("com.acme:app-api"))
        .unwrap()
        .unwrap();
    assert_eq!(model.node_path(module).unwrap().to_string(), "Domain/app");
}

#[test]
fn two_definite_producers_is_a_fault() {
    let policy = RecordingPolicy::default();
    let mut model = model_with(
        vec![classification(
            "Domain",
            vec![producing("app", "com.acme:core"), producing("lib", "com.acme:core")],
        )],
        vec![],
    )
    .with_condition_policy(policy.clone());

    let err = model
        .find_module_by_artifact_group_id(&artifact("com.acme:core"))
        .unwrap_err();
    match &err {
        ModelError::MultipleArtifactProducers { modules, .. } => assert_eq!(modules.len(), 2),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.class(), ErrorClass::Fault);
    assert_eq!(policy.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn excluded_artifact_skips_policy() {
    let policy = RecordingPolicy {
        decision: ConditionDecision::Abort,
        ..RecordingPolicy::default()
    };
    let mut model = model_with(
        vec![classification("Domain", vec![producing("app", "com.acme:app")])],
        vec![
            ("EXCLUDE_ARTIFACT_GROUP_ID_REGEX", "com\\.thirdparty:.*"),
            ("INCLUDE_ARTIFACT_GROUP_ID_REGEX", "com\\.thirdparty:patched-.*"),
        ],
    )
    .with_condition_policy(policy.clone());

    assert_eq!(
        model
            .find_module_by_artifact_group_id(&artifact("com.thirdparty:json"))
            .unwrap(),
        None
    );
    assert_eq!(policy.calls.load(Ordering::SeqCst), 0);

    // Included back into scope, so the missing producer reaches the policy.
    let err = model
        .find_module_by_artifact_group_id(&artifact("com.thirdparty:patched-json"))
        .unwrap_err();
    assert!(matches!(err, ModelError::Aborted { .. }));
    assert_eq!(err.class(), ErrorClass::Policy);
    assert_eq!(policy.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn continue_policy_caches_absent_module() {
    let policy = RecordingPolicy::default();
    let mut model = model_with(
        vec![classification("Domain", vec![producing("app", "com.acme:app")])],
        vec![],
    )
    .with_condition_policy(policy.clone());

    let missing = artifact("org.other:lib");
    assert_eq!(model.find_module_by_artifact_group_id(&missing).unwrap(), None);
    assert_eq!(model.find_module_by_artifact_group_id(&missing).unwrap(), None);
    assert_eq!(policy.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn abort_policy_is_not_cached() {
    let policy = RecordingPolicy {
        decision: ConditionDecision::Abort,
        ..RecordingPolicy::default()
    };
    let mut model = model_with(vec![], vec![]).with_condition_policy(policy.clone());

    let missing = artifact("org.other:lib");
    assert!(model.find_module_by_artifact_group_id(&missing).is_err());
    assert!(model.find_module_by_artifact_group_id(&missing).is_err());
    assert_eq!(policy.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn candidate_module_is_materialized_dynamically() {
    let mut model = model_with(
        vec![dynamic_domain(vec![]), classification("Tools", vec![])],
        vec![],
    );

    let module = model
        .find_module_by_artifact_group_id(&artifact("com.acme:svc"))
        .unwrap()
        .unwrap();
    assert_eq!(model.node_path(module).unwrap().to_string(), "Domain/svc");
    assert_eq!(model.state(module).unwrap(), NodeState::DynamicallyCreated);
    assert_eq!(
        model
            .get_property(module, ARTIFACT_GROUP_ID_PRODUCED_LIST)
            .unwrap()
            .as_deref(),
        Some("com.acme:svc")
    );

    // Now materialised, the module is found among the traversed modules.
    let again = model
        .find_module_by_artifact_group_id(&artifact("com.acme:svc"))
        .unwrap();
    assert_eq!(again, Some(module));
}

#[test]
fn manager_pattern_limits_candidates() {
    let policy = RecordingPolicy::default();
    let mut model = model_with(
        vec![dynamic_domain(vec![(DYNAMIC_MODULE_NAME_REGEX, "svc|api")])],
        vec![],
    )
    .with_condition_policy(policy.clone());

    assert!(
        model
            .find_module_by_artifact_group_id(&artifact("com.acme:api"))
            .unwrap()
            .is_some()
    );
    assert_eq!(
        model
            .find_module_by_artifact_group_id(&artifact("com.acme:other"))
            .unwrap(),
        None
    );
    assert_eq!(policy.calls.load(Ordering::SeqCst), 1);
    let domain = model.get_node(&"Domain".parse().unwrap()).unwrap().unwrap();
    assert_eq!(model.children(domain).unwrap().len(), 2);
}

#[test]
fn optimistic_finder_accepts_candidate_without_confirmation() {
    let mut domain = classification("Domain", vec![module("app", vec![])]);
    domain
        .plugins
        .push(local_plugin("FindModuleByArtifact", "artifact-id-module-finder"));

    let mut pessimistic = model_with(vec![domain.clone()], vec![]);
    assert_eq!(
        pessimistic
            .find_module_by_artifact_group_id(&artifact("com.acme:app"))
            .unwrap(),
        None
    );

    domain.properties.push(property(FIND_MODULE_OPTIMISTIC, "true"));
    let mut optimistic = model_with(vec![domain], vec![]);
    let module = optimistic
        .find_module_by_artifact_group_id(&artifact("com.acme:app"))
        .unwrap()
        .unwrap();
    assert_eq!(optimistic.node_path(module).unwrap().to_string(), "Domain/app");
}

#[test]
fn deleting_producer_invalidates_cache() {
    let mut model = model_with(vec![dynamic_domain(vec![])], vec![]);
    let svc = artifact("com.acme:svc");

    let first = model.find_module_by_artifact_group_id(&svc).unwrap().unwrap();
    model.delete_node(first).unwrap();
    assert_eq!(model.state(first).unwrap(), NodeState::Deleted);

    let second = model.find_module_by_artifact_group_id(&svc).unwrap().unwrap();
    assert_ne!(first, second);
    assert_eq!(model.node_path(second).unwrap().to_string(), "Domain/svc");
}
