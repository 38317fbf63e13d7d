//! Plugin classes, the registry that names them, and typed resolution of
//! plugins along the node ancestor chain.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::debug;

use super::error::{ModelError, ModelResult};
use super::path::NodePath;
use super::state::NodeOperation;
use super::{Model, NodeId};

/// Names a plugin interface. Implemented for the trait object type of each
/// plugin trait, e.g. `impl PluginInterface for dyn ArtifactInfo`.
pub trait PluginInterface: Send + Sync + 'static {
    /// Name used by plugin definitions in the model configuration.
    const NAME: &'static str;
}

/// A type-erased plugin object as instantiated from a direct class.
pub type PluginObject = Arc<dyn Any + Send + Sync>;

/// Wrap a typed plugin so a [`PluginFactory`] can return it.
pub fn erase<I: PluginInterface + ?Sized>(plugin: Arc<I>) -> Box<dyn Any> {
    Box::new(plugin)
}

/// Builds plugins on demand. Instances returned by a factory are never
/// cached by the model.
pub trait PluginFactory {
    /// Return the plugin wrapped with [`erase`].
    fn create(
        &self,
        context: &PluginContext<'_>,
        interface: &str,
        plugin_id: Option<&str>,
    ) -> anyhow::Result<Box<dyn Any>>;
}

/// Read access to the model from inside a plugin constructor or method.
#[derive(Clone, Copy)]
pub struct PluginContext<'a> {
    model: &'a Model,
    node: NodeId,
}

impl<'a> PluginContext<'a> {
    pub(crate) fn new(model: &'a Model, node: NodeId) -> Self {
        Self { model, node }
    }

    pub fn model(&self) -> &'a Model {
        self.model
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn node_path(&self) -> ModelResult<NodePath> {
        self.model.node_path(self.node)
    }

    /// Resolve a property from the plugin's node.
    pub fn property(&self, name: &str) -> ModelResult<Option<String>> {
        self.model.get_property(self.node, name)
    }
}

type Constructor = Box<dyn Fn(&PluginContext<'_>) -> anyhow::Result<PluginObject>>;
type Caster = Box<dyn Fn(PluginObject) -> Option<Box<dyn Any>>>;

enum PluginClassKind {
    Direct {
        constructor: Constructor,
        casts: HashMap<&'static str, Caster>,
    },
    Factory(Box<dyn PluginFactory>),
}

/// A named plugin implementation.
pub struct PluginClass {
    name: String,
    kind: PluginClassKind,
}

impl fmt::Debug for PluginClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            PluginClassKind::Direct { casts, .. } => {
                let mut interfaces: Vec<_> = casts.keys().copied().collect();
                interfaces.sort_unstable();
                format!("direct {:?}", interfaces)
            }
            PluginClassKind::Factory(_) => "factory".to_string(),
        };
        f.debug_struct("PluginClass")
            .field("name", &self.name)
            .field("kind", &kind)
            .finish()
    }
}

impl PluginClass {
    /// A class instantiated with its node. The model keeps one instance per
    /// class per node, shared by every interface the class implements.
    pub fn direct<C, F>(name: impl Into<String>, constructor: F) -> DirectPluginClassBuilder<C>
    where
        C: Any + Send + Sync,
        F: Fn(&PluginContext<'_>) -> anyhow::Result<C> + 'static,
    {
        DirectPluginClassBuilder {
            name: name.into(),
            constructor: Box::new(move |context| {
                let plugin = constructor(context)?;
                Ok(Arc::new(plugin) as PluginObject)
            }),
            casts: HashMap::new(),
            _marker: PhantomData,
        }
    }

    /// A class that delegates construction to a factory on every request.
    pub fn factory(name: impl Into<String>, factory: impl PluginFactory + 'static) -> Self {
        Self {
            name: name.into(),
            kind: PluginClassKind::Factory(Box::new(factory)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a direct class declares `interface`. Factories are checked
    /// when they return.
    pub fn declares(&self, interface: &str) -> bool {
        match &self.kind {
            PluginClassKind::Direct { casts, .. } => casts.contains_key(interface),
            PluginClassKind::Factory(_) => true,
        }
    }
}

pub struct DirectPluginClassBuilder<C> {
    name: String,
    constructor: Constructor,
    casts: HashMap<&'static str, Caster>,
    _marker: PhantomData<fn() -> C>,
}

impl<C: Any + Send + Sync> DirectPluginClassBuilder<C> {
    /// Declare that the class implements `I`; `cast` performs the unsizing.
    pub fn implements<I, F>(mut self, cast: F) -> Self
    where
        I: PluginInterface + ?Sized,
        F: Fn(Arc<C>) -> Arc<I> + 'static,
    {
        self.casts.insert(
            I::NAME,
            Box::new(move |object: PluginObject| {
                let concrete = object.downcast::<C>().ok()?;
                Some(erase::<I>(cast(concrete)))
            }),
        );
        self
    }

    pub fn build(self) -> PluginClass {
        PluginClass {
            name: self.name,
            kind: PluginClassKind::Direct {
                constructor: self.constructor,
                casts: self.casts,
            },
        }
    }
}

/// Registry of plugin classes by name.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    classes: HashMap<String, PluginClass>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the classes shipped in [`super::builtin`].
    pub fn with_builtin_classes() -> Self {
        let mut registry = Self::new();
        super::builtin::register_builtin_classes(&mut registry);
        registry
    }

    /// Register a class, replacing any class with the same name.
    pub fn register(&mut self, class: PluginClass) {
        self.classes.insert(class.name.clone(), class);
    }

    pub fn get(&self, name: &str) -> Option<&PluginClass> {
        self.classes.get(name)
    }

    pub fn class_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.classes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Nearest usable definition of a plugin for a node.
struct ResolvedPlugin {
    defining: NodeId,
    class: String,
}

impl Model {
    /// Resolve plugin `I` with `plugin_id` for `node`.
    pub fn get_node_plugin<I: PluginInterface + ?Sized>(
        &self,
        node: NodeId,
        plugin_id: Option<&str>,
    ) -> ModelResult<Arc<I>> {
        self.check_operation(node, NodeOperation::ResolvePlugin)?;

        let resolved = self.find_plugin(node, I::NAME, plugin_id)?.ok_or_else(|| {
            ModelError::PluginNotFound {
                node: self.describe(node),
                interface: I::NAME.to_string(),
                plugin_id: plugin_id.map(str::to_string),
            }
        })?;
        let class = self.plugin_registry().get(&resolved.class).ok_or_else(|| {
            ModelError::UnknownPluginClass {
                node: self.describe(resolved.defining),
                class: resolved.class.clone(),
            }
        })?;
        let context = PluginContext::new(self, node);
        let mismatch = || ModelError::PluginInterfaceMismatch {
            class: resolved.class.clone(),
            interface: I::NAME.to_string(),
        };

        let erased = match &class.kind {
            PluginClassKind::Factory(factory) => factory
                .create(&context, I::NAME, plugin_id)
                .map_err(|source| ModelError::PluginFailed {
                    node: self.describe(node),
                    class: resolved.class.clone(),
                    source,
                })?,
            PluginClassKind::Direct { constructor, casts } => {
                let cast = casts.get(I::NAME).ok_or_else(mismatch)?;
                let object = self.direct_instance(node, &resolved.class, constructor, &context)?;
                cast(object).ok_or_else(mismatch)?
            }
        };

        erased
            .downcast::<Arc<I>>()
            .map(|plugin| *plugin)
            .map_err(|_| mismatch())
    }

    /// Whether a plugin `I` with `plugin_id` resolves to an enabled class.
    pub fn has_node_plugin<I: PluginInterface + ?Sized>(
        &self,
        node: NodeId,
        plugin_id: Option<&str>,
    ) -> ModelResult<bool> {
        self.check_operation(node, NodeOperation::ResolvePlugin)?;
        Ok(self.find_plugin(node, I::NAME, plugin_id)?.is_some())
    }

    /// Plugin ids defined for `interface`, in the order first encountered
    /// from `node` up to the root. Disabled ids and ids whose nearest
    /// definition is restricted to another node are left out.
    pub fn list_plugin_ids(&self, node: NodeId, interface: &str) -> ModelResult<Vec<String>> {
        self.check_operation(node, NodeOperation::ResolvePlugin)?;

        let mut seen: Vec<Option<&str>> = Vec::new();
        let mut ids = Vec::new();
        for ancestor in self.ancestors(node) {
            for definition in self.definitions(ancestor).plugins_for(interface) {
                let id = definition.id.as_deref();
                if seen.contains(&id) {
                    continue;
                }
                seen.push(id);
                let visible = !definition.only_this_node || ancestor == node;
                if let (Some(id), Some(_), true) = (id, &definition.class, visible) {
                    ids.push(id.to_string());
                }
            }
        }
        Ok(ids)
    }

    fn find_plugin(
        &self,
        node: NodeId,
        interface: &str,
        plugin_id: Option<&str>,
    ) -> ModelResult<Option<ResolvedPlugin>> {
        for ancestor in self.ancestors(node) {
            let Some(definition) = self.definitions(ancestor).plugin(interface, plugin_id) else {
                continue;
            };
            if definition.only_this_node && ancestor != node {
                return Ok(None);
            }
            return Ok(definition.class.clone().map(|class| ResolvedPlugin {
                defining: ancestor,
                class,
            }));
        }
        Ok(None)
    }

    fn direct_instance(
        &self,
        node: NodeId,
        class: &str,
        constructor: &Constructor,
        context: &PluginContext<'_>,
    ) -> ModelResult<PluginObject> {
        if let Some(existing) = self.slot(node)?.plugin_instances.borrow().get(class) {
            return Ok(existing.clone());
        }

        // Constructors may resolve other plugins on the same node, so no
        // borrow of the cache is held while one runs.
        let object = constructor(context).map_err(|source| ModelError::PluginFailed {
            node: self.describe(node),
            class: class.to_string(),
            source,
        })?;
        debug!(node = %self.describe(node), class, "instantiated plugin");

        let mut instances = self.slot(node)?.plugin_instances.borrow_mut();
        Ok(instances
            .entry(class.to_string())
            .or_insert(object)
            .clone())
    }
}
