use std::collections::{BTreeMap, HashMap};

use crate::device::{
    BufferHandle, BufferTarget, GraphicsDevice, ShaderHandle, ShaderSource, ShaderStage,
    VertexArrayHandle,
};
use crate::error::GpuError;
use crate::indirect::{DrawArraysIndirectCommand, DrawElementsIndirectCommand, IndirectCommand};
use crate::layout::VertexLayout;
use crate::uniform::UniformValue;

/// A state change or draw recorded by [`HeadlessDevice`].
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    BeginFrame,
    EndFrame,
    BindShader(ShaderHandle),
    SetUniform {
        shader: ShaderHandle,
        name: String,
        value: UniformValue,
    },
    BindVertexArray(VertexArrayHandle),
    BindIndirectBuffer(BufferHandle),
    DrawElementsIndirect {
        offset: usize,
        draw_count: u32,
        stride: u32,
    },
    DrawArraysIndirect {
        offset: usize,
        draw_count: u32,
        stride: u32,
    },
}

impl DeviceCommand {
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            Self::DrawElementsIndirect { .. } | Self::DrawArraysIndirect { .. }
        )
    }
}

#[derive(Debug, Clone)]
pub struct HeadlessBuffer {
    pub target: BufferTarget,
    pub label: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct HeadlessVertexArray {
    pub vertex_buffers: Vec<(BufferHandle, VertexLayout)>,
    pub index_buffer: Option<BufferHandle>,
}

#[derive(Debug, Clone)]
pub struct HeadlessShader {
    pub name: String,
    pub stages: Vec<ShaderStage>,
    pub uniforms: BTreeMap<String, UniformValue>,
}

/// Graphics device that keeps everything on the CPU.
///
/// Buffer contents live in plain byte vectors; binds, uniform uploads and
/// draws are appended to a command log that tests can inspect.
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    next_id: u32,
    buffers: HashMap<BufferHandle, HeadlessBuffer>,
    vertex_arrays: HashMap<VertexArrayHandle, HeadlessVertexArray>,
    shaders: HashMap<ShaderHandle, HeadlessShader>,
    bound_buffers: HashMap<BufferTarget, BufferHandle>,
    bound_vertex_array: Option<VertexArrayHandle>,
    bound_shader: Option<ShaderHandle>,
    bound_indirect: Option<BufferHandle>,
    commands: Vec<DeviceCommand>,
    memory_budget: Option<usize>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// A device whose allocations fail once `budget` bytes are in use.
    pub fn with_memory_budget(budget: usize) -> Self {
        Self {
            memory_budget: Some(budget),
            ..Self::default()
        }
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    pub fn draw_calls(&self) -> Vec<&DeviceCommand> {
        self.commands.iter().filter(|c| c.is_draw()).collect()
    }

    pub fn shader_binds(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DeviceCommand::BindShader(_)))
            .count()
    }

    pub fn buffer(&self, buffer: BufferHandle) -> Option<&HeadlessBuffer> {
        self.buffers.get(&buffer)
    }

    pub fn buffer_data(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|b| b.data.as_slice())
    }

    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn allocated_bytes(&self) -> usize {
        self.buffers.values().map(|b| b.data.len()).sum()
    }

    pub fn vertex_array(&self, vertex_array: VertexArrayHandle) -> Option<&HeadlessVertexArray> {
        self.vertex_arrays.get(&vertex_array)
    }

    pub fn live_vertex_array_count(&self) -> usize {
        self.vertex_arrays.len()
    }

    pub fn shader(&self, shader: ShaderHandle) -> Option<&HeadlessShader> {
        self.shaders.get(&shader)
    }

    /// Last value uploaded to `name` on `shader`.
    pub fn uniform(&self, shader: ShaderHandle, name: &str) -> Option<&UniformValue> {
        self.shaders.get(&shader)?.uniforms.get(name)
    }

    pub fn read_elements_command(
        &self,
        buffer: BufferHandle,
        offset: usize,
    ) -> Option<DrawElementsIndirectCommand> {
        IndirectCommand::read_elements(self.buffer_data(buffer)?, offset)
    }

    pub fn read_arrays_command(
        &self,
        buffer: BufferHandle,
        offset: usize,
    ) -> Option<DrawArraysIndirectCommand> {
        IndirectCommand::read_arrays(self.buffer_data(buffer)?, offset)
    }

    fn record_draw(&mut self, command: DeviceCommand) {
        if self.bound_shader.is_none() || self.bound_vertex_array.is_none() {
            tracing::error!(?command, "draw without a bound shader and vertex array");
            return;
        }
        if self.bound_indirect.is_none() {
            tracing::error!(?command, "indirect draw without a bound indirect buffer");
            return;
        }
        self.commands.push(command);
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn create_buffer(&mut self, target: BufferTarget, label: &str) -> BufferHandle {
        let handle = BufferHandle(self.next_id());
        self.buffers.insert(
            handle,
            HeadlessBuffer {
                target,
                label: label.to_string(),
                data: Vec::new(),
            },
        );
        handle
    }

    fn allocate_buffer(&mut self, buffer: BufferHandle, size: usize) -> Result<(), GpuError> {
        let in_use = self.allocated_bytes();
        let budget = self.memory_budget;
        let entry = self
            .buffers
            .get_mut(&buffer)
            .ok_or(GpuError::UnknownBuffer(buffer))?;
        if let Some(budget) = budget {
            let available = budget.saturating_sub(in_use - entry.data.len());
            if size > available {
                return Err(GpuError::OutOfMemory {
                    requested: size,
                    available,
                });
            }
        }
        entry.data = vec![0; size];
        Ok(())
    }

    fn write_buffer(
        &mut self,
        buffer: BufferHandle,
        offset: usize,
        data: &[u8],
    ) -> Result<(), GpuError> {
        let entry = self
            .buffers
            .get_mut(&buffer)
            .ok_or(GpuError::UnknownBuffer(buffer))?;
        let end = offset + data.len();
        if end > entry.data.len() {
            return Err(GpuError::OutOfBounds {
                offset,
                len: data.len(),
                size: entry.data.len(),
            });
        }
        entry.data[offset..end].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&mut self, buffer: BufferHandle) -> Result<Vec<u8>, GpuError> {
        self.buffers
            .get(&buffer)
            .map(|b| b.data.clone())
            .ok_or(GpuError::UnknownBuffer(buffer))
    }

    fn bind_buffer(&mut self, buffer: BufferHandle) {
        match self.buffers.get(&buffer) {
            Some(entry) => {
                self.bound_buffers.insert(entry.target, buffer);
            }
            None => tracing::error!(?buffer, "bind of unknown buffer"),
        }
    }

    fn unbind_buffer(&mut self, target: BufferTarget) {
        self.bound_buffers.remove(&target);
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer);
        self.bound_buffers.retain(|_, b| *b != buffer);
        if self.bound_indirect == Some(buffer) {
            self.bound_indirect = None;
        }
    }

    fn create_vertex_array(&mut self) -> VertexArrayHandle {
        let handle = VertexArrayHandle(self.next_id());
        self.vertex_arrays
            .insert(handle, HeadlessVertexArray::default());
        handle
    }

    fn attach_vertex_buffer(
        &mut self,
        vertex_array: VertexArrayHandle,
        buffer: BufferHandle,
        layout: &VertexLayout,
    ) -> Result<(), GpuError> {
        if !self.buffers.contains_key(&buffer) {
            return Err(GpuError::UnknownBuffer(buffer));
        }
        match self.vertex_arrays.get_mut(&vertex_array) {
            Some(vao) => {
                vao.vertex_buffers.push((buffer, layout.clone()));
                Ok(())
            }
            None => Err(GpuError::Unsupported("attach to unknown vertex array")),
        }
    }

    fn attach_index_buffer(&mut self, vertex_array: VertexArrayHandle, buffer: BufferHandle) {
        match self.vertex_arrays.get_mut(&vertex_array) {
            Some(vao) => vao.index_buffer = Some(buffer),
            None => tracing::error!(?vertex_array, "index buffer attached to unknown vertex array"),
        }
    }

    fn bind_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        self.bound_vertex_array = Some(vertex_array);
        self.commands
            .push(DeviceCommand::BindVertexArray(vertex_array));
    }

    fn destroy_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        if self.bound_vertex_array == Some(vertex_array) {
            self.bound_vertex_array = None;
        }
        self.vertex_arrays.remove(&vertex_array);
    }

    fn create_shader(
        &mut self,
        name: &str,
        sources: &[ShaderSource],
    ) -> Result<ShaderHandle, GpuError> {
        if !sources.iter().any(|s| s.stage == ShaderStage::Vertex) {
            return Err(GpuError::MissingShaderStage {
                shader: name.to_string(),
                stage: ShaderStage::Vertex,
            });
        }
        if let Some(empty) = sources.iter().find(|s| s.code.trim().is_empty()) {
            return Err(GpuError::ShaderCompile {
                shader: name.to_string(),
                message: format!("empty {:?} source", empty.stage),
            });
        }
        let handle = ShaderHandle(self.next_id());
        self.shaders.insert(
            handle,
            HeadlessShader {
                name: name.to_string(),
                stages: sources.iter().map(|s| s.stage).collect(),
                uniforms: BTreeMap::new(),
            },
        );
        Ok(handle)
    }

    fn bind_shader(&mut self, shader: ShaderHandle) {
        self.bound_shader = Some(shader);
        self.commands.push(DeviceCommand::BindShader(shader));
    }

    fn set_uniform(&mut self, shader: ShaderHandle, name: &str, value: &UniformValue) {
        let Some(entry) = self.shaders.get_mut(&shader) else {
            tracing::warn!(?shader, name, "uniform set on unknown shader");
            return;
        };
        entry.uniforms.insert(name.to_string(), value.clone());
        self.commands.push(DeviceCommand::SetUniform {
            shader,
            name: name.to_string(),
            value: value.clone(),
        });
    }

    fn destroy_shader(&mut self, shader: ShaderHandle) {
        if self.bound_shader == Some(shader) {
            self.bound_shader = None;
        }
        self.shaders.remove(&shader);
    }

    fn bind_indirect_buffer(&mut self, buffer: BufferHandle) {
        self.bound_indirect = Some(buffer);
        self.commands.push(DeviceCommand::BindIndirectBuffer(buffer));
    }

    fn multi_draw_elements_indirect(&mut self, offset: usize, draw_count: u32, stride: u32) {
        self.record_draw(DeviceCommand::DrawElementsIndirect {
            offset,
            draw_count,
            stride,
        });
    }

    fn multi_draw_arrays_indirect(&mut self, offset: usize, draw_count: u32, stride: u32) {
        self.record_draw(DeviceCommand::DrawArraysIndirect {
            offset,
            draw_count,
            stride,
        });
    }

    fn begin_frame(&mut self, _clear_color: [f32; 4]) {
        self.commands.push(DeviceCommand::BeginFrame);
    }

    fn end_frame(&mut self) -> Result<(), GpuError> {
        self.commands.push(DeviceCommand::EndFrame);
        Ok(())
    }
}
