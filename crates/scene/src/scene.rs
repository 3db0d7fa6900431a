use std::collections::BTreeMap;
use std::fmt;

use ember_assets::{
    MaterialId, MaterialRegistry, MeshHandle, MeshStore, ResourceLocator, ResourceType,
};
use ember_common::{EntityId, Transform};
use ember_ecs::{MaterialComponent, MeshComponent, Registry};
use ember_gpu::{GraphicsDevice, ShaderLibrary};
use ember_render::{RenderStats, Renderer};
use glam::Mat4;
use serde::{Deserialize, Serialize};

use crate::camera::CameraController;
use crate::config::EngineConfig;
use crate::error::SceneError;
use crate::script::{NativeScript, ScriptSlot};

/// Scene counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneStats {
    pub entities: usize,
    pub reloads: u64,
    pub frames: u64,
    pub render: RenderStats,
}

impl fmt::Display for SceneStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "entities={} reloads={} frames={} {}",
            self.entities, self.reloads, self.frames, self.render
        )
    }
}

/// Entities, their resources and the renderer that draws them.
///
/// The renderer has no incremental path: after any change to which meshes
/// or materials entities use, or where they are placed, the scene is stale
/// until the next [`Scene::reload`].
pub struct Scene {
    config: EngineConfig,
    locator: ResourceLocator,
    registry: Registry,
    meshes: MeshStore,
    materials: MaterialRegistry,
    shaders: ShaderLibrary,
    renderer: Renderer,
    scripts: BTreeMap<EntityId, ScriptSlot>,
    camera: Option<Box<dyn CameraController>>,
    running: bool,
    stale: bool,
    reloads: u64,
    frames: u64,
}

impl Scene {
    pub fn new(config: EngineConfig) -> Self {
        let locator = ResourceLocator::new(&config.resource_root);
        let shaders = ShaderLibrary::new(
            locator.directory(ResourceType::Shader),
            config.shader_extension.clone(),
        );
        let renderer = Renderer::new(config.renderer.clone());
        Self {
            config,
            locator,
            registry: Registry::new(),
            meshes: MeshStore::new(),
            materials: MaterialRegistry::new(),
            shaders,
            renderer,
            scripts: BTreeMap::new(),
            camera: None,
            running: false,
            stale: false,
            reloads: 0,
            frames: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn locator(&self) -> &ResourceLocator {
        &self.locator
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Direct component access. Changes made here are picked up as component
    /// events on the next update, reload or render.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn meshes(&self) -> &MeshStore {
        &self.meshes
    }

    /// Mesh edits are not tracked; call [`Scene::mark_stale`] after changing
    /// geometry or instances of a mesh in use.
    pub fn meshes_mut(&mut self) -> &mut MeshStore {
        &mut self.meshes
    }

    pub fn materials(&self) -> &MaterialRegistry {
        &self.materials
    }

    pub fn materials_mut(&mut self) -> &mut MaterialRegistry {
        &mut self.materials
    }

    pub fn shaders_mut(&mut self) -> &mut ShaderLibrary {
        &mut self.shaders
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn camera(&self) -> Option<&dyn CameraController> {
        self.camera.as_deref()
    }

    pub fn camera_mut(&mut self) -> Option<&mut (dyn CameraController + 'static)> {
        self.camera.as_deref_mut()
    }

    pub fn set_camera(&mut self, camera: impl CameraController + 'static) {
        self.camera = Some(Box::new(camera));
    }

    pub fn clear_camera(&mut self) -> Option<Box<dyn CameraController>> {
        self.camera.take()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_stale(&self) -> bool {
        self.stale || self.registry.events().iter().any(invalidates_render_data)
    }

    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    pub fn entity_count(&self) -> usize {
        self.registry.len()
    }

    pub fn stats(&self) -> SceneStats {
        SceneStats {
            entities: self.registry.len(),
            reloads: self.reloads,
            frames: self.frames,
            render: self.renderer.stats(),
        }
    }

    // --- entities ---

    /// Create an entity with a transform and a name.
    pub fn create_entity(&mut self, name: &str) -> EntityId {
        let entity = self.registry.create_entity(name);
        tracing::debug!(%entity, name, "entity created");
        entity
    }

    /// Destroy an entity, its components and its script.
    pub fn destroy_entity(&mut self, entity: EntityId) -> bool {
        if let Some(mut slot) = self.scripts.remove(&entity) {
            slot.destroy(entity, &mut self.registry);
        }
        self.registry.destroy_entity(entity)
    }

    pub fn set_transform(&mut self, entity: EntityId, transform: Transform) -> Result<(), SceneError> {
        self.registry
            .set_transform(entity, transform)
            .then_some(())
            .ok_or(SceneError::UnknownEntity(entity))
    }

    pub fn set_mesh(&mut self, entity: EntityId, mesh: MeshHandle) -> Result<(), SceneError> {
        self.registry
            .set_mesh(entity, MeshComponent { mesh })
            .then_some(())
            .ok_or(SceneError::UnknownEntity(entity))
    }

    pub fn set_material(&mut self, entity: EntityId, material: MaterialId) -> Result<(), SceneError> {
        self.registry
            .set_material(entity, MaterialComponent { material })
            .then_some(())
            .ok_or(SceneError::UnknownEntity(entity))
    }

    /// Load a mesh file from the resource root's `meshes/` directory.
    pub fn load_mesh(&mut self, filename: &str) -> Result<MeshHandle, SceneError> {
        Ok(self.meshes.load(&self.locator, filename)?)
    }

    /// Attach a script to `entity`. Attaching to a running scene creates the
    /// script right away; a previously attached script is destroyed.
    pub fn add_script<F, S>(&mut self, entity: EntityId, factory: F) -> Result<(), SceneError>
    where
        F: Fn() -> S + 'static,
        S: NativeScript + 'static,
    {
        if !self.registry.contains(entity) {
            return Err(SceneError::UnknownEntity(entity));
        }
        let mut slot = ScriptSlot::new(Box::new(move || -> Box<dyn NativeScript> {
            Box::new(factory())
        }));
        if self.running {
            slot.instantiate(entity, &mut self.registry);
        }
        if let Some(mut old) = self.scripts.insert(entity, slot) {
            old.destroy(entity, &mut self.registry);
        }
        Ok(())
    }

    /// Attach a script built with `Default`.
    pub fn bind_script<S: NativeScript + Default + 'static>(
        &mut self,
        entity: EntityId,
    ) -> Result<(), SceneError> {
        self.add_script(entity, S::default)
    }

    pub fn has_script(&self, entity: EntityId) -> bool {
        self.scripts.contains_key(&entity)
    }

    // --- lifecycle ---

    /// Create every script, then build the render data.
    pub fn start(&mut self, device: &mut dyn GraphicsDevice) -> Result<(), SceneError> {
        if self.running {
            tracing::warn!("scene already running");
            return Ok(());
        }
        let _span = tracing::info_span!("scene_start", entities = self.registry.len()).entered();
        for (entity, slot) in &mut self.scripts {
            slot.instantiate(*entity, &mut self.registry);
        }
        self.running = true;
        self.reload(device)
    }

    /// Destroy every script and release the renderer's buffers and shaders.
    pub fn stop(&mut self, device: &mut dyn GraphicsDevice) {
        if !self.running {
            return;
        }
        for (entity, slot) in &mut self.scripts {
            slot.destroy(*entity, &mut self.registry);
        }
        self.renderer.clear(device);
        self.shaders.release(device);
        self.running = false;
        tracing::info!(frames = self.frames, "scene stopped");
    }

    /// Advance scripts and the camera by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        for (entity, slot) in &mut self.scripts {
            if slot.is_instantiated() {
                slot.update(*entity, &mut self.registry, dt);
            }
        }
        if let Some(camera) = self.camera.as_mut() {
            camera.on_update(dt);
        }
        self.absorb_events();
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if let Some(camera) = self.camera.as_mut() {
            camera.on_resize(width, height);
        }
    }

    /// Rebuild every drawing context from the entities' components.
    ///
    /// Entities whose mesh is missing, or that have neither a material
    /// component nor a material on the mesh's first instance, are skipped.
    pub fn reload(&mut self, device: &mut dyn GraphicsDevice) -> Result<(), SceneError> {
        let _span = tracing::info_span!("reload", meshes = self.registry.meshes().len()).entered();
        self.registry.drain_events();
        self.renderer.clear(device);

        for (&entity, component) in self.registry.meshes() {
            let Some(mesh) = self.meshes.get(component.mesh) else {
                tracing::warn!(%entity, "mesh component refers to a missing mesh");
                continue;
            };
            let material_id = self
                .registry
                .material(entity)
                .map(|m| m.material)
                .or_else(|| mesh.primary_instance().and_then(|i| i.material));
            let Some(material_id) = material_id else {
                tracing::warn!(%entity, mesh = mesh.name(), "entity has no material");
                continue;
            };
            let Some(material) = self.materials.get(material_id) else {
                tracing::warn!(%entity, material = %material_id, "unknown material");
                continue;
            };
            let placement = self
                .registry
                .transform(entity)
                .map(Transform::matrix)
                .unwrap_or(Mat4::IDENTITY);
            self.renderer
                .add_mesh(component.mesh, mesh, material, placement)?;
        }

        self.renderer.allocate_buffers_and_setup_layouts(device)?;
        self.renderer.load_data(device, &self.meshes)?;
        self.stale = false;
        self.reloads += 1;
        Ok(())
    }

    /// Reload only when something changed since the last reload.
    pub fn reload_if_stale(&mut self, device: &mut dyn GraphicsDevice) -> Result<bool, SceneError> {
        self.absorb_events();
        if !self.stale {
            return Ok(false);
        }
        self.reload(device)?;
        Ok(true)
    }

    /// Draw one frame with the camera's matrices, or identity without one.
    pub fn render(&mut self, device: &mut dyn GraphicsDevice) -> Result<(), SceneError> {
        self.absorb_events();
        if self.stale {
            tracing::warn!("rendering a stale scene; reload to pick up changes");
        }
        let view_projection = self
            .camera
            .as_ref()
            .map(|camera| camera.view_projection())
            .unwrap_or(Mat4::IDENTITY);
        self.renderer
            .render(device, &mut self.shaders, &self.materials, view_projection)?;
        self.frames += 1;
        Ok(())
    }

    fn absorb_events(&mut self) {
        if self
            .registry
            .drain_events()
            .iter()
            .any(invalidates_render_data)
        {
            self.stale = true;
        }
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

fn invalidates_render_data(event: &ember_ecs::ComponentEvent) -> bool {
    event.is_structural() || event.moves_instances()
}
