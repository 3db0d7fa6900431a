use std::fmt;

use ember_assets::MaterialId;
use ember_common::EntityId;
use ember_render::{RenderStats, RendererState};
use ember_scene::Scene;
use serde::Serialize;

/// Scene inspector for developer tooling.
///
/// Provides read-only queries against a scene for debugging and the CLI.
pub struct SceneInspector;

impl SceneInspector {
    pub fn summary(scene: &Scene) -> SceneSummary {
        let stats = scene.stats();
        SceneSummary {
            entity_count: stats.entities,
            mesh_count: scene.meshes().len(),
            material_count: scene.materials().len(),
            renderer_state: scene.renderer().state(),
            stale: scene.is_stale(),
            reloads: stats.reloads,
            frames: stats.frames,
            render: stats.render,
        }
    }

    pub fn inspect_entity(scene: &Scene, id: EntityId) -> Option<EntityInfo> {
        let registry = scene.registry();
        let transform = registry.transform(id)?;
        let p = transform.position;
        let s = transform.scale;
        let mesh = registry
            .mesh(id)
            .and_then(|m| scene.meshes().get(m.mesh))
            .map(|m| m.name().to_string());
        Some(EntityInfo {
            id,
            name: registry.name(id).map(|n| n.0.clone()).unwrap_or_default(),
            tag: registry.tag(id).map(|t| t.0.clone()),
            position: [p.x, p.y, p.z],
            scale: [s.x, s.y, s.z],
            mesh,
            material: registry.material(id).map(|m| m.material),
        })
    }

    pub fn list_entities(scene: &Scene) -> Vec<EntityId> {
        scene.registry().entities().collect()
    }

    /// Drawing contexts in draw order.
    pub fn contexts(scene: &Scene) -> Vec<ContextInfo> {
        scene
            .renderer()
            .contexts()
            .map(|ctx| ContextInfo {
                material: ctx.material(),
                shader: ctx.shader().to_string(),
                meshes: ctx.meshes().len(),
                instances: ctx.instance_count(),
                bytes: ctx.sizes().total(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SceneSummary {
    pub entity_count: usize,
    pub mesh_count: usize,
    pub material_count: usize,
    pub renderer_state: RendererState,
    pub stale: bool,
    pub reloads: u64,
    pub frames: u64,
    pub render: RenderStats,
}

impl fmt::Display for SceneSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Scene: entities={} meshes={} materials={} state={:?}{} reloads={} frames={} | {}",
            self.entity_count,
            self.mesh_count,
            self.material_count,
            self.renderer_state,
            if self.stale { " (stale)" } else { "" },
            self.reloads,
            self.frames,
            self.render
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityInfo {
    pub id: EntityId,
    pub name: String,
    pub tag: Option<String>,
    pub position: [f32; 3],
    pub scale: [f32; 3],
    pub mesh: Option<String>,
    pub material: Option<MaterialId>,
}

impl fmt::Display for EntityInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Entity {} \"{}\" pos=({:.2}, {:.2}, {:.2}) scale=({:.2}, {:.2}, {:.2})",
            self.id,
            self.name,
            self.position[0],
            self.position[1],
            self.position[2],
            self.scale[0],
            self.scale[1],
            self.scale[2],
        )?;
        if let Some(tag) = &self.tag {
            write!(f, " tag={tag}")?;
        }
        if let Some(mesh) = &self.mesh {
            write!(f, " mesh={mesh}")?;
        }
        if let Some(material) = self.material {
            write!(f, " material={material}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextInfo {
    pub material: MaterialId,
    pub shader: String,
    pub meshes: usize,
    pub instances: usize,
    pub bytes: usize,
}

impl fmt::Display for ContextInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] meshes={} instances={} bytes={}",
            self.material, self.shader, self.meshes, self.instances, self.bytes
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_assets::{MaterialProperties, PhongProperties, primitives};
    use ember_common::Transform;
    use ember_gpu::HeadlessDevice;

    fn scene_with_cube() -> (Scene, EntityId) {
        let mut scene = Scene::default();
        scene.shaders_mut().register_combined("phong", "// phong");
        let cube = scene.meshes_mut().insert(primitives::cube());
        let red = scene
            .materials_mut()
            .create_material("red", MaterialProperties::Phong(PhongProperties::default()));
        let e = scene.create_entity("crate");
        scene.set_mesh(e, cube).unwrap();
        scene.set_material(e, red).unwrap();
        (scene, e)
    }

    #[test]
    fn summary_empty_scene() {
        let scene = Scene::default();
        let summary = SceneInspector::summary(&scene);
        assert_eq!(summary.entity_count, 0);
        assert_eq!(summary.renderer_state, RendererState::Empty);
        assert!(!summary.stale);
    }

    #[test]
    fn summary_after_start() {
        let (mut scene, _) = scene_with_cube();
        let mut device = HeadlessDevice::new();
        assert!(SceneInspector::summary(&scene).stale);

        scene.start(&mut device).unwrap();
        let summary = SceneInspector::summary(&scene);
        assert_eq!(summary.entity_count, 1);
        assert_eq!(summary.mesh_count, 1);
        assert_eq!(summary.material_count, 1);
        assert_eq!(summary.renderer_state, RendererState::Loaded);
        assert_eq!(summary.render.contexts, 1);
        assert!(!summary.stale);
    }

    #[test]
    fn inspect_entity_found() {
        let (mut scene, e) = scene_with_cube();
        scene
            .set_transform(e, Transform::from_position(glam::Vec3::new(1.0, 2.0, 3.0)))
            .unwrap();

        let info = SceneInspector::inspect_entity(&scene, e).unwrap();
        assert_eq!(info.position, [1.0, 2.0, 3.0]);
        assert_eq!(info.name, "crate");
        assert_eq!(info.mesh.as_deref(), Some("cube"));
        let s = info.to_string();
        assert!(s.contains("\"crate\""));
        assert!(s.contains("material=phong#0"));
    }

    #[test]
    fn inspect_entity_not_found() {
        let scene = Scene::default();
        assert!(SceneInspector::inspect_entity(&scene, EntityId(42)).is_none());
    }

    #[test]
    fn list_entities_and_contexts() {
        let (mut scene, e) = scene_with_cube();
        let mut device = HeadlessDevice::new();
        scene.start(&mut device).unwrap();

        assert_eq!(SceneInspector::list_entities(&scene), vec![e]);
        let contexts = SceneInspector::contexts(&scene);
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].shader, "phong");
        assert_eq!(contexts[0].meshes, 1);
        assert_eq!(contexts[0].instances, 1);
    }

    #[test]
    fn summary_serializes() {
        let summary = SceneInspector::summary(&Scene::default());
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["entity_count"], 0);
        assert!(summary.to_string().starts_with("Scene: entities=0"));
    }
}
