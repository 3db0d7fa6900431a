use std::collections::BTreeMap;

use ember_assets::{
    Material, MaterialId, MaterialKind, MaterialRegistry, Mesh, MeshHandle, MeshStore,
    UniformBatch,
};
use ember_gpu::{GraphicsDevice, IndirectCommand, ShaderLibrary, UniformValue};
use glam::Mat4;
use serde::{Deserialize, Serialize};

use crate::config::RendererConfig;
use crate::context::DrawingContext;
use crate::error::RenderError;
use crate::stats::RenderStats;

/// Where the renderer is in its rebuild protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RendererState {
    Empty,
    Accumulating,
    Allocated,
    Loaded,
    Rendering,
}

/// Batched indirect renderer.
///
/// Meshes are grouped into one [`DrawingContext`] per material. A rebuild
/// runs in three phases:
///
/// 1. [`Renderer::add_mesh`] accumulates buffer sizes per context;
/// 2. [`Renderer::allocate_buffers_and_setup_layouts`] allocates them;
/// 3. [`Renderer::load_data`] packs geometry, instance matrices and one
///    indirect command per mesh.
///
/// [`Renderer::render`] then issues one indirect draw per mesh. Contexts are
/// visited in material order and meshes in insertion order.
#[derive(Debug)]
pub struct Renderer {
    config: RendererConfig,
    state: RendererState,
    contexts: BTreeMap<MaterialId, DrawingContext>,
    stats: RenderStats,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self {
            config,
            state: RendererState::Empty,
            contexts: BTreeMap::new(),
            stats: RenderStats::default(),
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn state(&self) -> RendererState {
        self.state
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    pub fn context(&self, material: MaterialId) -> Option<&DrawingContext> {
        self.contexts.get(&material)
    }

    /// Contexts in draw order.
    pub fn contexts(&self) -> impl Iterator<Item = &DrawingContext> {
        self.contexts.values()
    }

    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    /// Queue `mesh` for the context of `material`, placed by `placement`.
    pub fn add_mesh(
        &mut self,
        handle: MeshHandle,
        mesh: &Mesh,
        material: &Material,
        placement: Mat4,
    ) -> Result<(), RenderError> {
        match self.state {
            RendererState::Empty | RendererState::Accumulating => {}
            state => {
                return Err(RenderError::InvalidState {
                    operation: "add_mesh",
                    state,
                });
            }
        }
        self.state = RendererState::Accumulating;
        let context = self
            .contexts
            .entry(material.id())
            .or_insert_with(|| DrawingContext::new(material.id(), material.shader.clone()));
        context.push_mesh(handle, mesh, placement);
        tracing::trace!(mesh = mesh.name(), material = %material.id(), "accumulated mesh");
        Ok(())
    }

    pub fn allocate_buffers_and_setup_layouts(
        &mut self,
        device: &mut dyn GraphicsDevice,
    ) -> Result<(), RenderError> {
        match self.state {
            RendererState::Empty | RendererState::Accumulating => {}
            state => {
                return Err(RenderError::InvalidState {
                    operation: "allocate_buffers_and_setup_layouts",
                    state,
                });
            }
        }
        let _span = tracing::info_span!("allocate", contexts = self.contexts.len()).entered();
        for context in self.contexts.values_mut() {
            context.allocate(device)?;
            tracing::debug!(
                material = %context.material(),
                shader = context.shader(),
                sizes = ?context.sizes(),
                "allocated drawing context"
            );
        }
        self.state = RendererState::Allocated;
        Ok(())
    }

    pub fn load_data(
        &mut self,
        device: &mut dyn GraphicsDevice,
        meshes: &MeshStore,
    ) -> Result<(), RenderError> {
        if self.state != RendererState::Allocated {
            return Err(RenderError::InvalidState {
                operation: "load_data",
                state: self.state,
            });
        }
        let _span = tracing::info_span!("load_data", contexts = self.contexts.len()).entered();
        let mut stats = RenderStats::default();
        for context in self.contexts.values_mut() {
            stats.bytes_uploaded += context.pack(device, meshes)?;
            stats.meshes += context.meshes().len();
            stats.instances += context.instance_count();
        }
        stats.contexts = self.contexts.len();
        tracing::info!(%stats, "render data loaded");
        self.stats = stats;
        self.state = RendererState::Loaded;
        Ok(())
    }

    /// Draw one frame.
    ///
    /// A context's shader is bound only when it differs from the previous
    /// context's. On every bind the view-projection matrix is uploaded, and
    /// the material kind's uniform arrays are uploaded whenever the shader or
    /// kind changes. Each context uploads its material instance ID.
    pub fn render(
        &mut self,
        device: &mut dyn GraphicsDevice,
        shaders: &mut ShaderLibrary,
        materials: &MaterialRegistry,
        view_projection: Mat4,
    ) -> Result<(), RenderError> {
        let previous_state = match self.state {
            state @ (RendererState::Empty | RendererState::Loaded) => state,
            state => {
                return Err(RenderError::InvalidState {
                    operation: "render",
                    state,
                });
            }
        };
        self.state = RendererState::Rendering;
        let result = self.draw_contexts(device, shaders, materials, view_projection);
        self.state = previous_state;
        result
    }

    fn draw_contexts(
        &mut self,
        device: &mut dyn GraphicsDevice,
        shaders: &mut ShaderLibrary,
        materials: &MaterialRegistry,
        view_projection: Mat4,
    ) -> Result<(), RenderError> {
        let _span = tracing::info_span!("render", contexts = self.contexts.len()).entered();
        self.stats.reset_frame();
        device.begin_frame(self.config.clear_color);

        let mut batches: BTreeMap<MaterialKind, UniformBatch> = BTreeMap::new();
        let mut previous: Option<(&str, MaterialKind)> = None;

        for context in self.contexts.values() {
            let (Some(vertex_array), Some(commands)) =
                (context.vertex_array(), context.command_buffer())
            else {
                continue;
            };
            let shader = shaders.load(device, context.shader())?;
            let kind = context.material().kind;

            let shader_changed = previous.is_none_or(|(name, _)| name != context.shader());
            if shader_changed {
                device.bind_shader(shader);
                self.stats.shader_binds += 1;
                device.set_uniform(
                    shader,
                    &self.config.view_projection_uniform,
                    &UniformValue::Mat4(view_projection),
                );
            }
            if shader_changed || previous.is_none_or(|(_, k)| k != kind) {
                let batch = batches.entry(kind).or_insert_with(|| kind.upload(materials));
                for (name, value) in batch.iter() {
                    device.set_uniform(shader, name, value);
                }
            }
            device.set_uniform(
                shader,
                &self.config.material_index_uniform,
                &UniformValue::Int(context.material().index as i32),
            );
            previous = Some((context.shader(), kind));

            device.bind_vertex_array(vertex_array);
            device.bind_indirect_buffer(commands.handle());
            for entry in context.meshes() {
                if entry.indexed {
                    device.multi_draw_elements_indirect(
                        entry.command_offset,
                        1,
                        IndirectCommand::ELEMENTS_SIZE as u32,
                    );
                } else {
                    device.multi_draw_arrays_indirect(
                        entry.command_offset,
                        1,
                        IndirectCommand::ARRAYS_SIZE as u32,
                    );
                }
                self.stats.draw_calls += 1;
                tracing::trace!(mesh = ?entry.mesh, offset = entry.command_offset, "draw");
            }
        }

        device.end_frame()?;
        Ok(())
    }

    /// Release every context's device objects and return to `Empty`.
    pub fn clear(&mut self, device: &mut dyn GraphicsDevice) {
        for context in self.contexts.values_mut() {
            context.release(device);
        }
        self.contexts.clear();
        self.stats = RenderStats::default();
        self.state = RendererState::Empty;
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(RendererConfig::default())
    }
}
