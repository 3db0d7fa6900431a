use ember_assets::{MaterialId, Mesh, MeshHandle, MeshStore};
use ember_gpu::{
    BufferTarget, DrawArraysIndirectCommand, DrawElementsIndirectCommand, GpuBuffer, GpuError,
    GraphicsDevice, IndirectCommand, MapAccess, VertexArrayHandle, VertexLayout,
};
use glam::Mat4;

use crate::error::RenderError;

/// First shader location of the per-instance model matrix.
pub const INSTANCE_LOCATION: u32 = 3;

pub(crate) const MAT4_SIZE: usize = std::mem::size_of::<Mat4>();

/// Byte sizes of the four buffers of a drawing context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferSizes {
    pub vertex: usize,
    pub index: usize,
    pub instance: usize,
    pub command: usize,
}

impl BufferSizes {
    /// What one mesh adds to its context. A mesh without instances still
    /// reserves one transform, since it is drawn once at its placement.
    pub fn of_mesh(mesh: &Mesh) -> Self {
        let instances = mesh.instance_count().max(1);
        if mesh.is_indexed() {
            Self {
                vertex: mesh.vertex_byte_size(),
                index: mesh.index_byte_size(),
                instance: instances * MAT4_SIZE,
                command: IndirectCommand::ELEMENTS_SIZE,
            }
        } else {
            Self {
                vertex: mesh.vertex_byte_size(),
                index: 0,
                instance: instances * MAT4_SIZE,
                command: IndirectCommand::ARRAYS_SIZE,
            }
        }
    }

    pub fn grow(&mut self, other: BufferSizes) {
        self.vertex += other.vertex;
        self.index += other.index;
        self.instance += other.instance;
        self.command += other.command;
    }

    pub fn total(&self) -> usize {
        self.vertex + self.index + self.instance + self.command
    }
}

/// Model matrices written for one mesh: the placement composed with each
/// instance transform. A mesh without instances is drawn once at the placement.
pub fn instance_transforms(mesh: &Mesh, placement: Mat4) -> Vec<Mat4> {
    if mesh.instance_count() == 0 {
        return vec![placement];
    }
    mesh.instances()
        .map(|(_, instance)| placement * instance.transform)
        .collect()
}

/// One mesh batched into a context.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshEntry {
    pub mesh: MeshHandle,
    /// Placement of the owning entity, applied to every instance.
    pub placement: Mat4,
    pub indexed: bool,
    /// Byte offset of this mesh's indirect command.
    pub command_offset: usize,
    pub contribution: BufferSizes,
}

/// The device objects of an allocated context.
#[derive(Debug)]
pub(crate) struct ContextBuffers {
    pub vertex_array: VertexArrayHandle,
    pub vertex: GpuBuffer,
    pub index: GpuBuffer,
    pub instance: GpuBuffer,
    pub command: GpuBuffer,
}

impl ContextBuffers {
    fn new(device: &mut dyn GraphicsDevice, label: &str) -> Self {
        Self {
            vertex_array: device.create_vertex_array(),
            vertex: GpuBuffer::new(device, BufferTarget::Vertex, &format!("{label} vertices")),
            index: GpuBuffer::new(device, BufferTarget::Index, &format!("{label} indices")),
            instance: GpuBuffer::new(device, BufferTarget::Instance, &format!("{label} instances")),
            command: GpuBuffer::new(
                device,
                BufferTarget::IndirectCommand,
                &format!("{label} commands"),
            ),
        }
    }

    fn all_mut(&mut self) -> [&mut GpuBuffer; 4] {
        [
            &mut self.vertex,
            &mut self.index,
            &mut self.instance,
            &mut self.command,
        ]
    }

    fn destroy(self, device: &mut dyn GraphicsDevice) {
        self.command.destroy(device);
        self.instance.destroy(device);
        self.index.destroy(device);
        self.vertex.destroy(device);
        device.destroy_vertex_array(self.vertex_array);
    }
}

/// Everything drawn with one material: a vertex array, vertex / index /
/// instance / command buffers and the meshes packed into them.
///
/// Sizes only grow while meshes are added. Once allocated, each buffer's
/// size is exactly the sum of the contributions of its meshes.
#[derive(Debug)]
pub struct DrawingContext {
    material: MaterialId,
    shader: String,
    sizes: BufferSizes,
    meshes: Vec<MeshEntry>,
    pub(crate) buffers: Option<ContextBuffers>,
}

impl DrawingContext {
    pub fn new(material: MaterialId, shader: impl Into<String>) -> Self {
        Self {
            material,
            shader: shader.into(),
            sizes: BufferSizes::default(),
            meshes: Vec::new(),
            buffers: None,
        }
    }

    pub fn material(&self) -> MaterialId {
        self.material
    }

    pub fn shader(&self) -> &str {
        &self.shader
    }

    /// Accumulated buffer sizes.
    pub fn sizes(&self) -> BufferSizes {
        self.sizes
    }

    /// Meshes in insertion order, which is also command and draw order.
    pub fn meshes(&self) -> &[MeshEntry] {
        &self.meshes
    }

    pub fn instance_count(&self) -> usize {
        self.sizes.instance / MAT4_SIZE
    }

    pub fn is_allocated(&self) -> bool {
        self.buffers.is_some()
    }

    pub fn vertex_array(&self) -> Option<VertexArrayHandle> {
        self.buffers.as_ref().map(|b| b.vertex_array)
    }

    pub fn vertex_buffer(&self) -> Option<&GpuBuffer> {
        self.buffers.as_ref().map(|b| &b.vertex)
    }

    pub fn index_buffer(&self) -> Option<&GpuBuffer> {
        self.buffers.as_ref().map(|b| &b.index)
    }

    pub fn instance_buffer(&self) -> Option<&GpuBuffer> {
        self.buffers.as_ref().map(|b| &b.instance)
    }

    pub fn command_buffer(&self) -> Option<&GpuBuffer> {
        self.buffers.as_ref().map(|b| &b.command)
    }

    pub(crate) fn push_mesh(&mut self, handle: MeshHandle, mesh: &Mesh, placement: Mat4) {
        let contribution = BufferSizes::of_mesh(mesh);
        self.meshes.push(MeshEntry {
            mesh: handle,
            placement,
            indexed: mesh.is_indexed(),
            command_offset: self.sizes.command,
            contribution,
        });
        self.sizes.grow(contribution);
    }

    /// Allocate every buffer to its accumulated size and describe the
    /// attribute layout on the vertex array.
    pub(crate) fn allocate(&mut self, device: &mut dyn GraphicsDevice) -> Result<(), GpuError> {
        if let Some(old) = self.buffers.take() {
            old.destroy(device);
        }
        let label = self.material.to_string();
        let mut buffers = ContextBuffers::new(device, &label);
        let allocated = Self::allocate_into(&mut buffers, self.sizes, device);
        if let Err(e) = allocated {
            buffers.destroy(device);
            return Err(e);
        }
        self.buffers = Some(buffers);
        Ok(())
    }

    fn allocate_into(
        buffers: &mut ContextBuffers,
        sizes: BufferSizes,
        device: &mut dyn GraphicsDevice,
    ) -> Result<(), GpuError> {
        buffers.vertex.allocate(device, sizes.vertex)?;
        buffers.index.allocate(device, sizes.index)?;
        buffers.instance.allocate(device, sizes.instance)?;
        buffers.command.allocate(device, sizes.command)?;

        device.attach_vertex_buffer(
            buffers.vertex_array,
            buffers.vertex.handle(),
            &VertexLayout::mesh_vertex(),
        )?;
        device.attach_vertex_buffer(
            buffers.vertex_array,
            buffers.instance.handle(),
            &VertexLayout::instance_transform(INSTANCE_LOCATION),
        )?;
        if sizes.index > 0 {
            device.attach_index_buffer(buffers.vertex_array, buffers.index.handle());
        }
        Ok(())
    }

    /// Write every mesh into the mapped buffers, in list order, and return
    /// the number of bytes uploaded.
    pub(crate) fn pack(
        &mut self,
        device: &mut dyn GraphicsDevice,
        store: &MeshStore,
    ) -> Result<usize, RenderError> {
        let Some(buffers) = self.buffers.as_mut() else {
            tracing::error!(material = %self.material, "packing a context that was never allocated");
            return Ok(0);
        };
        let mut resolved = Vec::with_capacity(self.meshes.len());
        for entry in &self.meshes {
            let mesh = store
                .get(entry.mesh)
                .ok_or(RenderError::MissingMesh(entry.mesh))?;
            resolved.push((entry, mesh));
        }

        for buffer in buffers.all_mut() {
            buffer.map_memory(device, MapAccess::WriteOnly)?;
        }
        for (entry, mesh) in resolved {
            let first_vertex = buffers.vertex.count() as u32;
            let first_index = buffers.index.count() as u32;
            let base_instance = buffers.instance.count() as u32;

            buffers.vertex.load(mesh.vertices(), None);
            if entry.indexed {
                // Indices are rebased onto the shared vertex buffer; base_vertex stays 0.
                let rebased: Vec<u32> = mesh.indices().iter().map(|i| i + first_vertex).collect();
                buffers.index.load(&rebased, None);
            }
            let transforms = instance_transforms(mesh, entry.placement);
            buffers.instance.load(&transforms, None);

            let instance_count = transforms.len() as u32;
            let command = if entry.indexed {
                IndirectCommand::Elements(DrawElementsIndirectCommand {
                    count: mesh.index_count() as u32,
                    instance_count,
                    first_index,
                    base_vertex: 0,
                    base_instance,
                })
            } else {
                IndirectCommand::Arrays(DrawArraysIndirectCommand {
                    count: mesh.vertex_count() as u32,
                    instance_count,
                    first: first_vertex,
                    base_instance,
                })
            };
            buffers
                .command
                .load_data_in_mapped_memory(command.as_bytes(), 1, None);
        }
        for buffer in buffers.all_mut() {
            buffer.unmap_memory(device)?;
        }

        let written = BufferSizes {
            vertex: buffers.vertex.cursor(),
            index: buffers.index.cursor(),
            instance: buffers.instance.cursor(),
            command: buffers.command.cursor(),
        };
        assert_eq!(
            written, self.sizes,
            "packed data of {} does not match the accumulated sizes",
            self.material
        );
        Ok(written.total())
    }

    pub(crate) fn release(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(buffers) = self.buffers.take() {
            buffers.destroy(device);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_assets::{MaterialKind, MeshStore, primitives};
    use ember_common::Vertex;
    use ember_gpu::HeadlessDevice;

    fn material() -> MaterialId {
        MaterialId {
            kind: MaterialKind::Phong,
            index: 0,
        }
    }

    #[test]
    fn contributions_depend_on_indexing() {
        let cube = primitives::cube();
        let sizes = BufferSizes::of_mesh(&cube);
        assert_eq!(sizes.index, 36 * 4);
        assert_eq!(sizes.command, IndirectCommand::ELEMENTS_SIZE);

        let tri = primitives::triangle();
        let sizes = BufferSizes::of_mesh(&tri);
        assert_eq!(sizes.index, 0);
        assert_eq!(sizes.command, IndirectCommand::ARRAYS_SIZE);
        assert_eq!(sizes.instance, MAT4_SIZE);
    }

    #[test]
    fn sizes_only_grow_and_offsets_follow() {
        let mut store = MeshStore::new();
        let cube = store.insert(primitives::cube());
        let tri = store.insert(primitives::triangle());

        let mut ctx = DrawingContext::new(material(), "phong");
        ctx.push_mesh(cube, store.get(cube).unwrap(), Mat4::IDENTITY);
        let after_cube = ctx.sizes();
        ctx.push_mesh(tri, store.get(tri).unwrap(), Mat4::IDENTITY);
        let after_tri = ctx.sizes();

        assert!(after_tri.vertex > after_cube.vertex);
        assert_eq!(after_tri.index, after_cube.index);
        assert_eq!(ctx.meshes()[0].command_offset, 0);
        assert_eq!(ctx.meshes()[1].command_offset, IndirectCommand::ELEMENTS_SIZE);
        assert_eq!(ctx.instance_count(), 2);
    }

    #[test]
    fn packed_indices_address_the_shared_vertex_buffer() {
        let normal = [0.0, 0.0, 1.0];
        let strip = Mesh::with_geometry(
            "strip",
            vec![
                Vertex::new([0.0, 0.0, 0.0], normal, [0.0, 0.0]),
                Vertex::new([1.0, 0.0, 0.0], normal, [1.0, 0.0]),
                Vertex::new([0.0, 1.0, 0.0], normal, [0.0, 1.0]),
            ],
            vec![2, 1, 0],
        );
        let mut store = MeshStore::new();
        let cube = store.insert(primitives::cube());
        let strip = store.insert(strip);
        let mut device = HeadlessDevice::new();

        let mut ctx = DrawingContext::new(material(), "phong");
        ctx.push_mesh(cube, store.get(cube).unwrap(), Mat4::IDENTITY);
        ctx.push_mesh(strip, store.get(strip).unwrap(), Mat4::IDENTITY);
        ctx.allocate(&mut device).unwrap();
        ctx.pack(&mut device, &store).unwrap();

        let bytes = device.buffer_data(ctx.index_buffer().unwrap().handle()).unwrap();
        let tail: Vec<u32> = bytes[36 * 4..]
            .chunks_exact(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        assert_eq!(tail, vec![26, 25, 24]);

        let commands = device.buffer_data(ctx.command_buffer().unwrap().handle()).unwrap();
        let second = IndirectCommand::read_elements(commands, IndirectCommand::ELEMENTS_SIZE).unwrap();
        assert_eq!(second.first_index, 36);
        assert_eq!(second.base_vertex, 0);
    }

    #[test]
    fn allocation_attaches_index_buffer_only_when_needed() {
        let mut store = MeshStore::new();
        let tri = store.insert(primitives::triangle());
        let mut device = HeadlessDevice::new();

        let mut ctx = DrawingContext::new(material(), "phong");
        ctx.push_mesh(tri, store.get(tri).unwrap(), Mat4::IDENTITY);
        ctx.allocate(&mut device).unwrap();

        let vao = device.vertex_array(ctx.vertex_array().unwrap()).unwrap();
        assert_eq!(vao.vertex_buffers.len(), 2);
        assert!(vao.index_buffer.is_none());
        assert!(vao.vertex_buffers[1].1.is_instanced());
        assert_eq!(ctx.command_buffer().unwrap().size(), IndirectCommand::ARRAYS_SIZE);

        ctx.release(&mut device);
        assert_eq!(device.live_buffer_count(), 0);
        assert_eq!(device.live_vertex_array_count(), 0);
    }

    #[test]
    fn failed_allocation_releases_partial_buffers() {
        let mut store = MeshStore::new();
        let cube = store.insert(primitives::cube());
        let mut device = HeadlessDevice::with_memory_budget(64);

        let mut ctx = DrawingContext::new(material(), "phong");
        ctx.push_mesh(cube, store.get(cube).unwrap(), Mat4::IDENTITY);
        assert!(ctx.allocate(&mut device).is_err());
        assert!(!ctx.is_allocated());
        assert_eq!(device.live_buffer_count(), 0);
    }
}
