#![allow(dead_code)]

use std::sync::Arc;

use strata_core::model::{
    Model, ModelConfig, NodeConfig, NodeType, PluginDefinition, PluginRegistry, PropertyDefinition,
};

pub fn property(name: &str, value: &str) -> PropertyDefinition {
    PropertyDefinition::new(name, Some(value.to_string()), false)
}

pub fn plugin(interface: &str, class: &str) -> PluginDefinition {
    PluginDefinition::new(interface, None, Some(class.to_string()), false)
}

pub fn local_plugin(interface: &str, class: &str) -> PluginDefinition {
    PluginDefinition::new(interface, None, Some(class.to_string()), true)
}

pub fn module(name: &str, properties: Vec<PropertyDefinition>) -> NodeConfig {
    let mut node = NodeConfig::new(NodeType::Module, Some(name.to_string()));
    node.properties = properties;
    node
}

pub fn classification(name: &str, children: Vec<NodeConfig>) -> NodeConfig {
    let mut node = NodeConfig::new(NodeType::ClassificationNode, Some(name.to_string()));
    node.children = children;
    node
}

pub fn root(children: Vec<NodeConfig>) -> NodeConfig {
    let mut node = NodeConfig::new(NodeType::ClassificationNode, None);
    node.children = children;
    node
}

pub fn build_model(root: NodeConfig) -> Model {
    Model::new(
        ModelConfig { root },
        Arc::new(PluginRegistry::with_builtin_classes()),
    )
    .expect("model should build")
}

pub fn build_model_with(root: NodeConfig, registry: PluginRegistry) -> Model {
    Model::new(ModelConfig { root }, Arc::new(registry)).expect("model should build")
}
