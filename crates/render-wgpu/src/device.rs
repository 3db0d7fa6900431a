use std::collections::HashMap;
use std::num::NonZeroU64;

use ember_gpu::{
    BufferHandle, BufferTarget, GpuError, GraphicsDevice, IndirectCommand, ShaderHandle,
    ShaderSource, ShaderStage, UniformValue, VertexArrayHandle, VertexLayout,
};
use wgpu::util::DeviceExt;

use crate::layout::{BufferLayout, convert_layout};
use crate::uniforms::{UNIFORM_OFFSET_ALIGNMENT, align_up, pack_uniform_block};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

struct Buffer {
    target: BufferTarget,
    label: String,
    raw: Option<wgpu::Buffer>,
    size: usize,
    /// CPU copy of indirect commands, for adapters that cannot start indirect
    /// draws at a non-zero instance.
    shadow: Option<Vec<u8>>,
}

#[derive(Default)]
struct VertexArray {
    vertex_buffers: Vec<(BufferHandle, BufferLayout)>,
    index_buffer: Option<BufferHandle>,
}

struct Shader {
    name: String,
    vertex: wgpu::ShaderModule,
    /// `None` when both stages live in the vertex module.
    fragment: Option<wgpu::ShaderModule>,
    uniforms: Vec<(String, UniformValue)>,
    /// Arena offset of the block packed since the last `set_uniform`.
    packed_offset: Option<u32>,
}

struct RecordedDraw {
    shader: ShaderHandle,
    vertex_array: VertexArrayHandle,
    indirect: BufferHandle,
    offset: usize,
    draw_count: u32,
    stride: u32,
    indexed: bool,
    uniform_offset: u32,
}

struct Frame {
    clear_color: [f32; 4],
    draws: Vec<RecordedDraw>,
    uniform_arena: Vec<u8>,
    max_block: usize,
}

enum ColorTarget {
    Offscreen {
        _texture: wgpu::Texture,
        view: wgpu::TextureView,
    },
    Surface {
        view: Option<wgpu::TextureView>,
    },
}

/// [`GraphicsDevice`] over wgpu.
///
/// wgpu has no bind-then-draw state, so draws are recorded during the frame
/// together with a snapshot of the bound shader's uniforms, and replayed into
/// a single render pass on [`GraphicsDevice::end_frame`]. Uniform blocks are
/// packed into one buffer per frame and selected with dynamic offsets.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    color_format: wgpu::TextureFormat,
    color_target: ColorTarget,
    depth: wgpu::TextureView,
    width: u32,
    height: u32,
    indirect_first_instance: bool,

    uniform_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: HashMap<(ShaderHandle, VertexArrayHandle), wgpu::RenderPipeline>,

    next_id: u32,
    buffers: HashMap<BufferHandle, Buffer>,
    vertex_arrays: HashMap<VertexArrayHandle, VertexArray>,
    shaders: HashMap<ShaderHandle, Shader>,

    bound_shader: Option<ShaderHandle>,
    bound_vertex_array: Option<VertexArrayHandle>,
    bound_indirect: Option<BufferHandle>,
    frame: Option<Frame>,
}

impl WgpuDevice {
    /// Create a device rendering into its own texture, for tools and tests
    /// without a window.
    pub fn offscreen(width: u32, height: u32) -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or(GpuError::Unsupported("no compatible graphics adapter"))?;
        let (device, queue) = request_device(&adapter)?;
        tracing::info!(
            adapter = %adapter.get_info().name,
            backend = ?adapter.get_info().backend,
            "offscreen device created"
        );

        let texture = create_color_texture(&device, width, height);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(Self::build(
            device,
            queue,
            OFFSCREEN_FORMAT,
            ColorTarget::Offscreen {
                _texture: texture,
                view,
            },
            width,
            height,
        ))
    }

    /// Wrap a device created for a window surface. The caller provides the
    /// surface view for each frame through [`WgpuDevice::set_frame_view`].
    pub fn for_surface(
        device: wgpu::Device,
        queue: wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        Self::build(
            device,
            queue,
            surface_format,
            ColorTarget::Surface { view: None },
            width,
            height,
        )
    }

    /// Features and limits to request from an adapter for this device.
    pub fn device_descriptor(adapter: &wgpu::Adapter) -> wgpu::DeviceDescriptor<'static> {
        wgpu::DeviceDescriptor {
            label: Some("ember_device"),
            required_features: adapter.features() & wgpu::Features::INDIRECT_FIRST_INSTANCE,
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
        }
    }

    fn build(
        device: wgpu::Device,
        queue: wgpu::Queue,
        color_format: wgpu::TextureFormat,
        color_target: ColorTarget,
        width: u32,
        height: u32,
    ) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pipeline_layout"),
            bind_group_layouts: &[&uniform_layout],
            push_constant_ranges: &[],
        });
        let depth = create_depth_texture(&device, width, height);
        let indirect_first_instance = device
            .features()
            .contains(wgpu::Features::INDIRECT_FIRST_INSTANCE);
        if !indirect_first_instance {
            tracing::info!("indirect first-instance unsupported, replaying draws directly");
        }

        Self {
            device,
            queue,
            color_format,
            color_target,
            depth,
            width,
            height,
            indirect_first_instance,
            uniform_layout,
            pipeline_layout,
            pipelines: HashMap::new(),
            next_id: 0,
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            shaders: HashMap::new(),
            bound_shader: None,
            bound_vertex_array: None,
            bound_indirect: None,
            frame: None,
        }
    }

    /// The underlying device, for surface configuration.
    pub fn raw(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn color_format(&self) -> wgpu::TextureFormat {
        self.color_format
    }

    /// Recreate size-dependent attachments.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.depth = create_depth_texture(&self.device, self.width, self.height);
        if let ColorTarget::Offscreen { .. } = self.color_target {
            let texture = create_color_texture(&self.device, self.width, self.height);
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            self.color_target = ColorTarget::Offscreen {
                _texture: texture,
                view,
            };
        }
    }

    /// Set the surface view the next `end_frame` renders into.
    pub fn set_frame_view(&mut self, view: wgpu::TextureView) {
        match &mut self.color_target {
            ColorTarget::Surface { view: slot } => *slot = Some(view),
            ColorTarget::Offscreen { .. } => {
                tracing::warn!("frame view ignored by an offscreen device");
            }
        }
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// Pack the bound shader's uniforms into the frame arena, reusing the
    /// previous block when nothing changed since.
    fn snapshot_uniforms(&mut self, shader: ShaderHandle) -> u32 {
        let (Some(frame), Some(entry)) = (self.frame.as_mut(), self.shaders.get_mut(&shader))
        else {
            return 0;
        };
        if let Some(offset) = entry.packed_offset {
            return offset;
        }
        let block = pack_uniform_block(&entry.uniforms);
        let offset = align_up(frame.uniform_arena.len(), UNIFORM_OFFSET_ALIGNMENT);
        frame.uniform_arena.resize(offset, 0);
        frame.uniform_arena.extend_from_slice(&block);
        frame.max_block = frame.max_block.max(block.len());
        entry.packed_offset = Some(offset as u32);
        offset as u32
    }

    fn record_draw(&mut self, offset: usize, draw_count: u32, stride: u32, indexed: bool) {
        if self.frame.is_none() {
            tracing::error!("draw outside begin_frame / end_frame");
            return;
        }
        let (Some(shader), Some(vertex_array), Some(indirect)) =
            (self.bound_shader, self.bound_vertex_array, self.bound_indirect)
        else {
            tracing::error!("draw without a bound shader, vertex array and indirect buffer");
            return;
        };
        let uniform_offset = self.snapshot_uniforms(shader);
        if let Some(frame) = self.frame.as_mut() {
            frame.draws.push(RecordedDraw {
                shader,
                vertex_array,
                indirect,
                offset,
                draw_count,
                stride,
                indexed,
                uniform_offset,
            });
        }
    }

    fn ensure_pipeline(
        &mut self,
        shader: ShaderHandle,
        vertex_array: VertexArrayHandle,
    ) -> Result<(), GpuError> {
        if self.pipelines.contains_key(&(shader, vertex_array)) {
            return Ok(());
        }
        let program = self
            .shaders
            .get(&shader)
            .ok_or(GpuError::Unsupported("draw with a destroyed shader"))?;
        let vao = self
            .vertex_arrays
            .get(&vertex_array)
            .ok_or(GpuError::Unsupported("draw with a destroyed vertex array"))?;
        let buffers: Vec<wgpu::VertexBufferLayout<'_>> =
            vao.vertex_buffers.iter().map(|(_, l)| l.as_wgpu()).collect();

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&program.name),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &program.vertex,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &buffers,
                },
                fragment: Some(wgpu::FragmentState {
                    module: program.fragment.as_ref().unwrap_or(&program.vertex),
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.color_format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: Some(wgpu::Face::Back),
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: Default::default(),
                multiview: None,
                cache: None,
            });
        tracing::debug!(shader = %program.name, ?vertex_array, "created render pipeline");
        self.pipelines.insert((shader, vertex_array), pipeline);
        Ok(())
    }

    fn replay(&mut self, frame: Frame) -> Result<(), GpuError> {
        for draw in &frame.draws {
            self.ensure_pipeline(draw.shader, draw.vertex_array)?;
        }

        let view = match &self.color_target {
            ColorTarget::Offscreen { view, .. } => view,
            ColorTarget::Surface { view: Some(view) } => view,
            ColorTarget::Surface { view: None } => {
                return Err(GpuError::Unsupported("end_frame without a surface view"));
            }
        };

        let mut arena = frame.uniform_arena;
        let binding_size = frame.max_block.max(16);
        let last_offset = frame
            .draws
            .iter()
            .map(|d| d.uniform_offset as usize)
            .max()
            .unwrap_or(0);
        arena.resize(arena.len().max(last_offset + binding_size), 0);
        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("frame_uniforms"),
                contents: &arena,
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame_uniform_bind_group"),
            layout: &self.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &uniform_buffer,
                    offset: 0,
                    size: NonZeroU64::new(binding_size as u64),
                }),
            }],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });
        {
            let [r, g, b, a] = frame.clear_color.map(f64::from);
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            for draw in &frame.draws {
                let (Some(pipeline), Some(vao), Some(indirect)) = (
                    self.pipelines.get(&(draw.shader, draw.vertex_array)),
                    self.vertex_arrays.get(&draw.vertex_array),
                    self.buffers.get(&draw.indirect),
                ) else {
                    continue;
                };
                let Some(indirect_raw) = indirect.raw.as_ref() else {
                    tracing::warn!(buffer = %indirect.label, "indirect buffer never allocated");
                    continue;
                };
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &bind_group, &[draw.uniform_offset]);
                for (slot, (handle, _)) in vao.vertex_buffers.iter().enumerate() {
                    if let Some(raw) = self.buffers.get(handle).and_then(|b| b.raw.as_ref()) {
                        pass.set_vertex_buffer(slot as u32, raw.slice(..));
                    }
                }
                if draw.indexed {
                    let Some(index) = vao
                        .index_buffer
                        .and_then(|h| self.buffers.get(&h))
                        .and_then(|b| b.raw.as_ref())
                    else {
                        tracing::warn!("indexed draw on a vertex array without an index buffer");
                        continue;
                    };
                    pass.set_index_buffer(index.slice(..), wgpu::IndexFormat::Uint32);
                }

                for i in 0..draw.draw_count as usize {
                    let offset = draw.offset + i * draw.stride as usize;
                    if self.indirect_first_instance {
                        if draw.indexed {
                            pass.draw_indexed_indirect(indirect_raw, offset as u64);
                        } else {
                            pass.draw_indirect(indirect_raw, offset as u64);
                        }
                        continue;
                    }
                    let shadow = indirect.shadow.as_deref().unwrap_or(&[]);
                    if draw.indexed {
                        if let Some(cmd) = IndirectCommand::read_elements(shadow, offset) {
                            pass.draw_indexed(
                                cmd.first_index..cmd.first_index + cmd.count,
                                cmd.base_vertex,
                                cmd.base_instance..cmd.base_instance + cmd.instance_count,
                            );
                        }
                    } else if let Some(cmd) = IndirectCommand::read_arrays(shadow, offset) {
                        pass.draw(
                            cmd.first..cmd.first + cmd.count,
                            cmd.base_instance..cmd.base_instance + cmd.instance_count,
                        );
                    }
                }
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        tracing::trace!(draws = frame.draws.len(), uniform_bytes = arena.len(), "frame submitted");
        Ok(())
    }
}

impl GraphicsDevice for WgpuDevice {
    fn create_buffer(&mut self, target: BufferTarget, label: &str) -> BufferHandle {
        let handle = BufferHandle(self.next_id());
        self.buffers.insert(
            handle,
            Buffer {
                target,
                label: label.to_string(),
                raw: None,
                size: 0,
                shadow: None,
            },
        );
        handle
    }

    fn allocate_buffer(&mut self, buffer: BufferHandle, size: usize) -> Result<(), GpuError> {
        let entry = self
            .buffers
            .get_mut(&buffer)
            .ok_or(GpuError::UnknownBuffer(buffer))?;
        let padded = align_up(size.max(4), wgpu::COPY_BUFFER_ALIGNMENT as usize);

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let raw = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&entry.label),
            size: padded as u64,
            usage: wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::INDEX
                | wgpu::BufferUsages::INDIRECT
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            tracing::error!(buffer = %entry.label, size, %error, "buffer allocation failed");
            return Err(GpuError::OutOfMemory {
                requested: size,
                available: 0,
            });
        }

        if let Some(old) = entry.raw.replace(raw) {
            old.destroy();
        }
        entry.size = size;
        if entry.target == BufferTarget::IndirectCommand {
            entry.shadow = Some(vec![0; size]);
        }
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
        if offset + data.len() > entry.size {
            return Err(GpuError::OutOfBounds {
                offset,
                len: data.len(),
                size: entry.size,
            });
        }
        let Some(raw) = entry.raw.as_ref() else {
            return Err(GpuError::OutOfBounds {
                offset,
                len: data.len(),
                size: 0,
            });
        };
        if let Some(shadow) = entry.shadow.as_mut() {
            shadow[offset..offset + data.len()].copy_from_slice(data);
        }

        let align = wgpu::COPY_BUFFER_ALIGNMENT as usize;
        if offset % align == 0 && data.len() % align == 0 {
            self.queue.write_buffer(raw, offset as u64, data);
        } else {
            // widen to 4-byte boundaries inside the padded allocation
            let start = offset - offset % align;
            let mut padded = vec![0; offset - start];
            padded.extend_from_slice(data);
            padded.resize(align_up(padded.len(), align), 0);
            if let Some(shadow) = entry.shadow.as_ref() {
                let end = (start + padded.len()).min(shadow.len());
                padded[..offset - start].copy_from_slice(&shadow[start..offset]);
                padded[offset - start + data.len()..end - start]
                    .copy_from_slice(&shadow[offset + data.len()..end]);
            }
            self.queue.write_buffer(raw, start as u64, &padded);
        }
        Ok(())
    }

    fn read_buffer(&mut self, _buffer: BufferHandle) -> Result<Vec<u8>, GpuError> {
        Err(GpuError::Unsupported("buffer read-back"))
    }

    fn bind_buffer(&mut self, buffer: BufferHandle) {
        if let Some(entry) = self.buffers.get(&buffer) {
            if entry.target == BufferTarget::IndirectCommand {
                self.bound_indirect = Some(buffer);
            }
        }
    }

    fn unbind_buffer(&mut self, target: BufferTarget) {
        if target == BufferTarget::IndirectCommand {
            self.bound_indirect = None;
        }
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if let Some(entry) = self.buffers.remove(&buffer) {
            if let Some(raw) = entry.raw {
                raw.destroy();
            }
        }
        if self.bound_indirect == Some(buffer) {
            self.bound_indirect = None;
        }
    }

    fn create_vertex_array(&mut self) -> VertexArrayHandle {
        let handle = VertexArrayHandle(self.next_id());
        self.vertex_arrays.insert(handle, VertexArray::default());
        handle
    }

    fn attach_vertex_buffer(
        &mut self,
        vertex_array: VertexArrayHandle,
        buffer: BufferHandle,
        layout: &VertexLayout,
    ) -> Result<(), GpuError> {
        let converted = convert_layout(layout)?;
        let Some(vao) = self.vertex_arrays.get_mut(&vertex_array) else {
            tracing::warn!(?vertex_array, "attach to unknown vertex array");
            return Ok(());
        };
        vao.vertex_buffers.push((buffer, converted));
        Ok(())
    }

    fn attach_index_buffer(&mut self, vertex_array: VertexArrayHandle, buffer: BufferHandle) {
        match self.vertex_arrays.get_mut(&vertex_array) {
            Some(vao) => vao.index_buffer = Some(buffer),
            None => tracing::warn!(?vertex_array, "attach to unknown vertex array"),
        }
    }

    fn bind_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        self.bound_vertex_array = Some(vertex_array);
    }

    fn destroy_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        self.vertex_arrays.remove(&vertex_array);
        self.pipelines.retain(|(_, vao), _| *vao != vertex_array);
        if self.bound_vertex_array == Some(vertex_array) {
            self.bound_vertex_array = None;
        }
    }

    fn create_shader(
        &mut self,
        name: &str,
        sources: &[ShaderSource],
    ) -> Result<ShaderHandle, GpuError> {
        let stage = |stage: ShaderStage| {
            sources
                .iter()
                .find(|s| s.stage == stage)
                .ok_or_else(|| GpuError::MissingShaderStage {
                    shader: name.to_string(),
                    stage,
                })
        };
        let vertex_source = stage(ShaderStage::Vertex)?;
        let fragment_source = stage(ShaderStage::Fragment)?;

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let vertex = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(name),
                source: wgpu::ShaderSource::Wgsl(vertex_source.code.as_str().into()),
            });
        let fragment = (fragment_source.code != vertex_source.code).then(|| {
            self.device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(name),
                    source: wgpu::ShaderSource::Wgsl(fragment_source.code.as_str().into()),
                })
        });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(GpuError::ShaderCompile {
                shader: name.to_string(),
                message: error.to_string(),
            });
        }

        let handle = ShaderHandle(self.next_id());
        self.shaders.insert(
            handle,
            Shader {
                name: name.to_string(),
                vertex,
                fragment,
                uniforms: Vec::new(),
                packed_offset: None,
            },
        );
        Ok(handle)
    }

    fn bind_shader(&mut self, shader: ShaderHandle) {
        self.bound_shader = Some(shader);
    }

    fn set_uniform(&mut self, shader: ShaderHandle, name: &str, value: &UniformValue) {
        let Some(entry) = self.shaders.get_mut(&shader) else {
            tracing::warn!(?shader, name, "uniform set on unknown shader");
            return;
        };
        match entry.uniforms.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = value.clone(),
            None => entry.uniforms.push((name.to_string(), value.clone())),
        }
        entry.packed_offset = None;
    }

    fn destroy_shader(&mut self, shader: ShaderHandle) {
        self.shaders.remove(&shader);
        self.pipelines.retain(|(s, _), _| *s != shader);
        if self.bound_shader == Some(shader) {
            self.bound_shader = None;
        }
    }

    fn bind_indirect_buffer(&mut self, buffer: BufferHandle) {
        self.bound_indirect = Some(buffer);
    }

    fn multi_draw_elements_indirect(&mut self, offset: usize, draw_count: u32, stride: u32) {
        self.record_draw(offset, draw_count, stride, true);
    }

    fn multi_draw_arrays_indirect(&mut self, offset: usize, draw_count: u32, stride: u32) {
        self.record_draw(offset, draw_count, stride, false);
    }

    fn begin_frame(&mut self, clear_color: [f32; 4]) {
        if self.frame.is_some() {
            tracing::warn!("begin_frame while a frame is open, discarding it");
        }
        for shader in self.shaders.values_mut() {
            shader.packed_offset = None;
        }
        self.frame = Some(Frame {
            clear_color,
            draws: Vec::new(),
            uniform_arena: Vec::new(),
            max_block: 0,
        });
    }

    fn end_frame(&mut self) -> Result<(), GpuError> {
        let Some(frame) = self.frame.take() else {
            tracing::error!("end_frame without begin_frame");
            return Ok(());
        };
        let result = self.replay(frame);
        if let ColorTarget::Surface { view } = &mut self.color_target {
            *view = None;
        }
        result
    }
}

fn request_device(adapter: &wgpu::Adapter) -> Result<(wgpu::Device, wgpu::Queue), GpuError> {
    pollster::block_on(adapter.request_device(&WgpuDevice::device_descriptor(adapter), None))
        .map_err(|e| GpuError::Backend(e.to_string()))
}

fn create_color_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("offscreen_color"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OFFSCREEN_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&Default::default())
}
