//! Batched renderer: groups mesh instances by material, packs them into
//! per-material GPU buffers and draws them with indirect commands.
//!
//! # Invariants
//! - Each drawing context holds exactly one indirect command per mesh, in
//!   the order the meshes were added; draws are submitted in that order.
//! - After packing, every buffer holds exactly the bytes accumulated for it.
//! - Meshes with indices produce indexed commands, meshes without produce
//!   array commands.
//! - The renderer never owns meshes or materials. A reload always rebuilds
//!   every context from scratch.

mod config;
mod context;
mod error;
mod renderer;
mod stats;

pub use config::RendererConfig;
pub use context::{BufferSizes, DrawingContext, INSTANCE_LOCATION, MeshEntry, instance_transforms};
pub use error::RenderError;
pub use renderer::{Renderer, RendererState};
pub use stats::RenderStats;
