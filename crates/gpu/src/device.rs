use crate::error::GpuError;
use crate::layout::VertexLayout;
use crate::uniform::UniformValue;

/// Opaque device buffer handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u32);

/// Opaque vertex array handle (attribute bindings + optional index buffer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexArrayHandle(pub u32);

/// Opaque compiled shader program handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderHandle(pub u32);

/// What a buffer is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BufferTarget {
    Vertex,
    Index,
    Instance,
    IndirectCommand,
}

/// CPU access requested when mapping a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapAccess {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl MapAccess {
    pub fn can_read(self) -> bool {
        matches!(self, Self::ReadOnly | Self::ReadWrite)
    }

    pub fn can_write(self) -> bool {
        matches!(self, Self::WriteOnly | Self::ReadWrite)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 2] = [ShaderStage::Vertex, ShaderStage::Fragment];

    /// File-name suffix used by the `<name>.<suffix>.<ext>` convention.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Vertex => "vert",
            Self::Fragment => "frag",
        }
    }
}

/// Source code for one shader stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    pub stage: ShaderStage,
    pub code: String,
}

impl ShaderSource {
    pub fn new(stage: ShaderStage, code: impl Into<String>) -> Self {
        Self {
            stage,
            code: code.into(),
        }
    }
}

/// The graphics API as seen by the renderer.
///
/// The interface is modelled on a bind-then-draw API: draws use whatever
/// shader, vertex array and indirect buffer are currently bound. All calls
/// happen on the thread that owns the device.
pub trait GraphicsDevice {
    fn create_buffer(&mut self, target: BufferTarget, label: &str) -> BufferHandle;
    /// Reserve `size` bytes of storage, discarding previous contents.
    fn allocate_buffer(&mut self, buffer: BufferHandle, size: usize) -> Result<(), GpuError>;
    fn write_buffer(
        &mut self,
        buffer: BufferHandle,
        offset: usize,
        data: &[u8],
    ) -> Result<(), GpuError>;
    /// Copy the whole buffer back to the CPU.
    fn read_buffer(&mut self, buffer: BufferHandle) -> Result<Vec<u8>, GpuError>;
    fn bind_buffer(&mut self, buffer: BufferHandle);
    fn unbind_buffer(&mut self, target: BufferTarget);
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    fn create_vertex_array(&mut self) -> VertexArrayHandle;
    fn attach_vertex_buffer(
        &mut self,
        vertex_array: VertexArrayHandle,
        buffer: BufferHandle,
        layout: &VertexLayout,
    ) -> Result<(), GpuError>;
    fn attach_index_buffer(&mut self, vertex_array: VertexArrayHandle, buffer: BufferHandle);
    fn bind_vertex_array(&mut self, vertex_array: VertexArrayHandle);
    fn destroy_vertex_array(&mut self, vertex_array: VertexArrayHandle);

    fn create_shader(
        &mut self,
        name: &str,
        sources: &[ShaderSource],
    ) -> Result<ShaderHandle, GpuError>;
    fn bind_shader(&mut self, shader: ShaderHandle);
    fn set_uniform(&mut self, shader: ShaderHandle, name: &str, value: &UniformValue);
    fn destroy_shader(&mut self, shader: ShaderHandle);

    fn bind_indirect_buffer(&mut self, buffer: BufferHandle);
    /// Issue `draw_count` indexed draws read from the bound indirect buffer.
    fn multi_draw_elements_indirect(&mut self, offset: usize, draw_count: u32, stride: u32);
    /// Issue `draw_count` non-indexed draws read from the bound indirect buffer.
    fn multi_draw_arrays_indirect(&mut self, offset: usize, draw_count: u32, stride: u32);

    fn begin_frame(&mut self, _clear_color: [f32; 4]) {}

    fn end_frame(&mut self) -> Result<(), GpuError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_access_capabilities() {
        assert!(MapAccess::ReadOnly.can_read());
        assert!(!MapAccess::ReadOnly.can_write());
        assert!(MapAccess::WriteOnly.can_write());
        assert!(!MapAccess::WriteOnly.can_read());
        assert!(MapAccess::ReadWrite.can_read() && MapAccess::ReadWrite.can_write());
    }

    #[test]
    fn stage_suffixes() {
        assert_eq!(ShaderStage::Vertex.suffix(), "vert");
        assert_eq!(ShaderStage::Fragment.suffix(), "frag");
    }
}
