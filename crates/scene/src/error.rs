use ember_assets::AssetError;
use ember_common::EntityId;
use ember_gpu::GpuError;
use ember_render::RenderError;

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Gpu(#[from] GpuError),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error("entity {0} does not exist")]
    UnknownEntity(EntityId),
}
