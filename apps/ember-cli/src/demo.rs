use std::path::Path;

use ember_assets::{
    MaterialId, MaterialProperties, PhongProperties, UnlitProperties, primitives,
};
use ember_common::Transform;
use ember_scene::{FlyCamera, Scene, SceneError};
use glam::{Quat, Vec3, Vec4};

/// Populate `scene` with a grid of cubes alternating between two lit
/// materials, an unlit floor quad and one triangle drawn without indices.
pub fn build(scene: &mut Scene, grid: u32, materials: Option<&Path>) -> Result<(), SceneError> {
    let cube = scene.meshes_mut().insert(primitives::cube());
    let quad = scene.meshes_mut().insert(primitives::quad());
    let triangle = scene.meshes_mut().insert(primitives::triangle());

    let palette = match materials {
        Some(path) => scene.materials_mut().load_library(path)?,
        None => Vec::new(),
    };
    let palette = if palette.is_empty() {
        default_palette(scene)
    } else {
        palette
    };
    let floor_material = scene.materials_mut().create_material(
        "floor",
        MaterialProperties::Unlit(UnlitProperties {
            color: Vec4::new(0.25, 0.25, 0.28, 1.0),
            ..UnlitProperties::default()
        }),
    );

    let half = grid as f32 / 2.0;
    for x in 0..grid {
        for z in 0..grid {
            let e = scene.create_entity(&format!("cube_{x}_{z}"));
            let position = Vec3::new((x as f32 - half) * 2.0, 0.5, (z as f32 - half) * 2.0);
            scene.set_transform(e, Transform::from_position(position))?;
            scene.set_mesh(e, cube)?;
            scene.set_material(e, palette[((x + z) as usize) % palette.len()])?;
        }
    }

    let floor = scene.create_entity("floor");
    scene.set_transform(
        floor,
        Transform {
            rotation: Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2),
            scale: Vec3::splat(grid.max(1) as f32 * 2.5),
            ..Transform::default()
        },
    )?;
    scene.set_mesh(floor, quad)?;
    scene.set_material(floor, floor_material)?;

    let marker = scene.create_entity("marker");
    scene.set_transform(marker, Transform::from_position(Vec3::new(0.0, 3.0, 0.0)))?;
    scene.set_mesh(marker, triangle)?;
    scene.set_material(marker, palette[0])?;

    let distance = grid.max(1) as f32 * 2.0 + 6.0;
    scene.set_camera(FlyCamera::looking_at(
        Vec3::new(0.0, distance * 0.6, distance),
        Vec3::ZERO,
    ));
    Ok(())
}

fn default_palette(scene: &mut Scene) -> Vec<MaterialId> {
    [
        ("copper", Vec3::new(0.72, 0.45, 0.2)),
        ("jade", Vec3::new(0.3, 0.7, 0.45)),
    ]
    .into_iter()
    .map(|(name, diffuse)| {
        scene.materials_mut().create_material(
            name,
            MaterialProperties::Phong(PhongProperties {
                diffuse,
                ..PhongProperties::default()
            }),
        )
    })
    .collect()
}
