use std::fmt;

use serde::{Deserialize, Serialize};

/// Counters describing the last reload and the last rendered frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderStats {
    pub contexts: usize,
    pub meshes: usize,
    pub instances: usize,
    pub draw_calls: usize,
    pub shader_binds: usize,
    pub bytes_uploaded: usize,
}

impl RenderStats {
    pub(crate) fn reset_frame(&mut self) {
        self.draw_calls = 0;
        self.shader_binds = 0;
    }
}

impl fmt::Display for RenderStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "contexts={} meshes={} instances={} draws={} shader_binds={} uploaded={}B",
            self.contexts,
            self.meshes,
            self.instances,
            self.draw_calls,
            self.shader_binds,
            self.bytes_uploaded
        )
    }
}
