//! Scene orchestration: entities and their components, the meshes and
//! materials they reference, and the renderer that draws them.
//!
//! # Invariants
//! - Every entity has a transform and a name from creation.
//! - Render data is rebuilt from scratch on reload. Until then, structural
//!   or transform changes leave the scene stale and frames show the last
//!   loaded state.
//! - Without a camera the scene renders with identity matrices.

mod camera;
mod config;
mod error;
mod scene;
mod script;

pub use camera::{CameraController, CameraInput, FlyCamera};
pub use config::{ConfigError, EngineConfig};
pub use error::SceneError;
pub use scene::{Scene, SceneStats};
pub use script::{NativeScript, ScriptContext};
