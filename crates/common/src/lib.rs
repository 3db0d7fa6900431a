//! Shared value types used across the ember crates.

mod types;
mod vertex;

pub use types::{EntityId, EntityUuid, Transform};
pub use vertex::Vertex;
