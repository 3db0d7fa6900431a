use serde::{Deserialize, Serialize};

/// Renderer settings. Missing fields fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub clear_color: [f32; 4],
    /// Uniform receiving the camera view-projection matrix.
    pub view_projection_uniform: String,
    /// Uniform receiving the material instance ID of the current context.
    pub material_index_uniform: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.1, 0.1, 0.12, 1.0],
            view_projection_uniform: "u_ViewProjection".into(),
            material_index_uniform: "u_MaterialIndex".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: RendererConfig =
            serde_json::from_str(r#"{"clear_color": [0, 0, 0, 1]}"#).unwrap();
        assert_eq!(config.clear_color, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(config.view_projection_uniform, "u_ViewProjection");
    }
}
