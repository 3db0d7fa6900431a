use std::path::{Path, PathBuf};

use ember_render::RendererConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Engine settings, read from JSON. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding `shaders/`, `meshes/`, `textures/` and `audio/`.
    pub resource_root: PathBuf,
    /// File extension of shader sources under the resource root.
    pub shader_extension: String,
    pub renderer: RendererConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            resource_root: PathBuf::from("resources"),
            shader_extension: "wgsl".into(),
            renderer: RendererConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), ?config, "loaded engine config");
        Ok(config)
    }

    /// Resolve relative paths in this config against `base`.
    pub fn rooted_at(mut self, base: impl AsRef<Path>) -> Self {
        if self.resource_root.is_relative() {
            self.resource_root = base.as_ref().join(&self.resource_root);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_fields_use_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"renderer": {{"clear_color": [1, 0, 0, 1]}}}}"#).unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.shader_extension, "wgsl");
        assert_eq!(config.resource_root, PathBuf::from("resources"));
        assert_eq!(config.renderer.clear_color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(config.renderer.material_index_uniform, "u_MaterialIndex");
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = EngineConfig::load(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = EngineConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("invalid config"));
    }

    #[test]
    fn relative_root_is_resolved() {
        let config = EngineConfig::default().rooted_at("/opt/game");
        assert_eq!(config.resource_root, PathBuf::from("/opt/game/resources"));

        let absolute = EngineConfig {
            resource_root: PathBuf::from("/data"),
            ..EngineConfig::default()
        };
        assert_eq!(absolute.rooted_at("/opt").resource_root, PathBuf::from("/data"));
    }
}
