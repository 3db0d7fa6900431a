use ember_common::Vertex;
use glam::Mat4;
use slotmap::SlotMap;

use crate::locator::{ResourceLocator, ResourceType};
use crate::material::MaterialId;
use crate::{AssetError, loader};

slotmap::new_key_type! {
    /// Stable reference to a mesh owned by a [`MeshStore`].
    pub struct MeshHandle;
    /// Stable reference to one placement of a mesh.
    pub struct MeshInstanceId;
}

/// One placement of a mesh: a model transform and an optional material.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshInstance {
    pub material: Option<MaterialId>,
    pub transform: Mat4,
}

impl MeshInstance {
    pub fn new(material: Option<MaterialId>) -> Self {
        Self {
            material,
            transform: Mat4::IDENTITY,
        }
    }
}

/// CPU-side geometry plus the instances that place it in the world.
///
/// Instances are kept in slot storage so ids stay valid as more are added;
/// iteration follows creation order.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    name: String,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    instances: SlotMap<MeshInstanceId, MeshInstance>,
    order: Vec<MeshInstanceId>,
}

impl Mesh {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_geometry(name: impl Into<String>, vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        let mut mesh = Self::new(name);
        mesh.set_vertices(vertices);
        mesh.set_indices(indices);
        mesh
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the vertex data wholesale.
    pub fn set_vertices(&mut self, vertices: Vec<Vertex>) {
        self.vertices = vertices;
    }

    /// Replace the index data wholesale. An empty list means a non-indexed draw.
    pub fn set_indices(&mut self, indices: Vec<u32>) {
        self.indices = indices;
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn is_indexed(&self) -> bool {
        !self.indices.is_empty()
    }

    pub fn vertex_byte_size(&self) -> usize {
        std::mem::size_of_val(self.vertices.as_slice())
    }

    pub fn index_byte_size(&self) -> usize {
        std::mem::size_of_val(self.indices.as_slice())
    }

    pub fn create_mesh_instance(&mut self, material: Option<MaterialId>) -> MeshInstanceId {
        let id = self.instances.insert(MeshInstance::new(material));
        self.order.push(id);
        id
    }

    pub fn remove_mesh_instance(&mut self, id: MeshInstanceId) -> Option<MeshInstance> {
        let removed = self.instances.remove(id)?;
        self.order.retain(|i| *i != id);
        Some(removed)
    }

    pub fn mesh_instance(&self, id: MeshInstanceId) -> Option<&MeshInstance> {
        self.instances.get(id)
    }

    pub fn mesh_instance_mut(&mut self, id: MeshInstanceId) -> Option<&mut MeshInstance> {
        self.instances.get_mut(id)
    }

    /// The first instance still alive; its material decides batching.
    pub fn primary_instance(&self) -> Option<&MeshInstance> {
        self.order.first().and_then(|id| self.instances.get(*id))
    }

    /// Instances in creation order.
    pub fn instances(&self) -> impl Iterator<Item = (MeshInstanceId, &MeshInstance)> {
        self.order.iter().map(|id| (*id, &self.instances[*id]))
    }

    pub fn instance_count(&self) -> usize {
        self.order.len()
    }
}

/// Owner of every loaded or generated mesh.
#[derive(Debug, Default)]
pub struct MeshStore {
    meshes: SlotMap<MeshHandle, Mesh>,
}

impl MeshStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mesh: Mesh) -> MeshHandle {
        self.meshes.insert(mesh)
    }

    pub fn get(&self, handle: MeshHandle) -> Option<&Mesh> {
        self.meshes.get(handle)
    }

    pub fn get_mut(&mut self, handle: MeshHandle) -> Option<&mut Mesh> {
        self.meshes.get_mut(handle)
    }

    pub fn remove(&mut self, handle: MeshHandle) -> Option<Mesh> {
        self.meshes.remove(handle)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MeshHandle, &Mesh)> {
        self.meshes.iter()
    }

    /// Load `<root>/meshes/<filename>` and store it.
    pub fn load(&mut self, locator: &ResourceLocator, filename: &str) -> Result<MeshHandle, AssetError> {
        let source = locator.read_to_string(ResourceType::Mesh, filename)?;
        let mesh = loader::parse_obj(filename, &source);
        tracing::info!(
            mesh = filename,
            vertices = mesh.vertex_count(),
            indices = mesh.index_count(),
            "loaded mesh"
        );
        Ok(self.insert(mesh))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives;

    #[test]
    fn set_geometry_recomputes_counts() {
        let mut mesh = primitives::quad();
        assert_eq!((mesh.vertex_count(), mesh.index_count()), (4, 6));
        mesh.set_indices(Vec::new());
        assert!(!mesh.is_indexed());
        assert_eq!(mesh.index_byte_size(), 0);
        assert_eq!(mesh.vertex_byte_size(), 4 * std::mem::size_of::<Vertex>());
    }

    #[test]
    fn instance_ids_survive_later_creation() {
        let mut mesh = primitives::cube();
        let first = mesh.create_mesh_instance(None);
        mesh.mesh_instance_mut(first).unwrap().transform = Mat4::from_scale(glam::Vec3::splat(2.0));
        for _ in 0..100 {
            mesh.create_mesh_instance(None);
        }
        assert_eq!(
            mesh.mesh_instance(first).unwrap().transform,
            Mat4::from_scale(glam::Vec3::splat(2.0))
        );
        assert_eq!(mesh.instance_count(), 101);
    }

    #[test]
    fn instances_iterate_in_creation_order() {
        let mut mesh = primitives::triangle();
        let a = mesh.create_mesh_instance(None);
        let b = mesh.create_mesh_instance(None);
        let c = mesh.create_mesh_instance(None);
        mesh.remove_mesh_instance(b);
        let order: Vec<MeshInstanceId> = mesh.instances().map(|(id, _)| id).collect();
        assert_eq!(order, vec![a, c]);
        assert!(mesh.mesh_instance(b).is_none());
    }

    #[test]
    fn primary_instance_is_first_alive() {
        let mut mesh = primitives::triangle();
        assert!(mesh.primary_instance().is_none());
        let a = mesh.create_mesh_instance(None);
        let b = mesh.create_mesh_instance(None);
        mesh.mesh_instance_mut(b).unwrap().transform = Mat4::from_translation(glam::Vec3::X);
        mesh.remove_mesh_instance(a);
        assert_eq!(
            mesh.primary_instance().unwrap().transform,
            Mat4::from_translation(glam::Vec3::X)
        );
    }

    #[test]
    fn store_load_from_locator() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("meshes")).unwrap();
        std::fs::write(
            root.path().join("meshes/tri.obj"),
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n",
        )
        .unwrap();

        let mut store = MeshStore::new();
        let handle = store
            .load(&ResourceLocator::new(root.path()), "tri.obj")
            .unwrap();
        let mesh = store.get(handle).unwrap();
        assert_eq!(mesh.name(), "tri.obj");
        assert_eq!(mesh.index_count(), 3);
        assert!(store.load(&ResourceLocator::new(root.path()), "nope.obj").is_err());
    }
}
