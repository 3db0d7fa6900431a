use ember_assets::MeshHandle;
use ember_gpu::GpuError;

use crate::renderer::RendererState;

/// Errors from renderer operations.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("graphics device error: {0}")]
    Gpu(#[from] GpuError),
    #[error("mesh {0:?} is no longer in the mesh store")]
    MissingMesh(MeshHandle),
    #[error("{operation} is not valid while the renderer is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: RendererState,
    },
}
