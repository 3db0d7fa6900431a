//! Developer tooling: read-only inspection of scenes and their render data.
//!
//! # Invariants
//! - Tools never mutate the scene they inspect.

mod inspector;

pub use inspector::{ContextInfo, EntityInfo, SceneInspector, SceneSummary};
