use ember_common::{EntityId, Transform};
use ember_ecs::Registry;

/// Behaviour attached to one entity, driven by the scene lifecycle.
///
/// `on_create` runs when the scene starts (or when the script is attached to
/// a running scene), `on_update` once per [`Scene::update`](crate::Scene::update),
/// and `on_destroy` when the scene stops or the entity is destroyed.
pub trait NativeScript {
    fn on_create(&mut self, _ctx: &mut ScriptContext<'_>) {}
    fn on_update(&mut self, _ctx: &mut ScriptContext<'_>, _dt: f32) {}
    fn on_destroy(&mut self, _ctx: &mut ScriptContext<'_>) {}
}

/// A script's view of its entity's components.
pub struct ScriptContext<'a> {
    entity: EntityId,
    registry: &'a mut Registry,
}

impl<'a> ScriptContext<'a> {
    pub(crate) fn new(entity: EntityId, registry: &'a mut Registry) -> Self {
        Self { entity, registry }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn transform(&self) -> Transform {
        self.registry
            .transform(self.entity)
            .copied()
            .unwrap_or_default()
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.registry.set_transform(self.entity, transform);
    }

    pub fn name(&self) -> Option<&str> {
        self.registry.name(self.entity).map(|n| n.0.as_str())
    }

    pub fn registry(&self) -> &Registry {
        self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        self.registry
    }
}

type ScriptFactory = Box<dyn Fn() -> Box<dyn NativeScript>>;

/// Binding of a script type to an entity: the factory always, the live
/// instance only while the scene runs.
pub(crate) struct ScriptSlot {
    factory: ScriptFactory,
    instance: Option<Box<dyn NativeScript>>,
}

impl ScriptSlot {
    pub fn new(factory: ScriptFactory) -> Self {
        Self {
            factory,
            instance: None,
        }
    }

    pub fn is_instantiated(&self) -> bool {
        self.instance.is_some()
    }

    pub fn instantiate(&mut self, entity: EntityId, registry: &mut Registry) {
        if self.instance.is_some() {
            return;
        }
        let mut script = (self.factory)();
        script.on_create(&mut ScriptContext::new(entity, registry));
        self.instance = Some(script);
    }

    pub fn update(&mut self, entity: EntityId, registry: &mut Registry, dt: f32) {
        if let Some(script) = self.instance.as_mut() {
            script.on_update(&mut ScriptContext::new(entity, registry), dt);
        }
    }

    pub fn destroy(&mut self, entity: EntityId, registry: &mut Registry) {
        if let Some(mut script) = self.instance.take() {
            script.on_destroy(&mut ScriptContext::new(entity, registry));
        }
    }
}
