//! Asset layer: CPU-side meshes, their placement instances, materials and
//! file-system resource lookup.
//!
//! The renderer consumes meshes by [`MeshHandle`] and materials by
//! [`MaterialId`]; it never owns either.
//!
//! # Invariants
//! - Material instance IDs are dense per material kind, assigned in creation
//!   order and never reused. They index the per-kind uniform arrays.
//! - Mesh instance IDs stay valid until the instance is removed, no matter
//!   how many instances are created afterwards.

mod loader;
mod locator;
mod material;
mod mesh;
pub mod primitives;

pub use loader::{load_obj, parse_obj};
pub use locator::{ResourceLocator, ResourceType};
pub use material::{
    Material, MaterialId, MaterialKind, MaterialProperties, MaterialRegistry, PhongProperties,
    TypeHash, UniformBatch, UnlitProperties, NO_TEXTURE,
};
pub use mesh::{Mesh, MeshHandle, MeshInstance, MeshInstanceId, MeshStore};

use std::path::PathBuf;

/// Errors from asset operations.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("resource not found: {0}")]
    NotFound(PathBuf),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
