use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::device::{GraphicsDevice, ShaderHandle, ShaderSource, ShaderStage};
use crate::error::GpuError;

/// Finds, compiles and caches shader programs by name.
///
/// Sources are looked up in this order:
/// 1. sources registered in memory with [`ShaderLibrary::register`];
/// 2. per-stage files `<dir>/<name>.<stage>.<ext>` (`vert`, `frag`);
/// 3. a combined module `<dir>/<name>.<ext>` providing every stage.
#[derive(Debug)]
pub struct ShaderLibrary {
    directory: Option<PathBuf>,
    extension: String,
    embedded: HashMap<String, Vec<ShaderSource>>,
    compiled: HashMap<String, ShaderHandle>,
}

impl ShaderLibrary {
    pub fn new(directory: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            directory: Some(directory.into()),
            extension: extension.into(),
            embedded: HashMap::new(),
            compiled: HashMap::new(),
        }
    }

    /// A library that only serves registered sources.
    pub fn in_memory() -> Self {
        Self {
            directory: None,
            extension: String::new(),
            embedded: HashMap::new(),
            compiled: HashMap::new(),
        }
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    pub fn register(&mut self, name: impl Into<String>, sources: Vec<ShaderSource>) {
        self.embedded.insert(name.into(), sources);
    }

    /// Register one module that provides every stage.
    pub fn register_combined(&mut self, name: impl Into<String>, code: &str) {
        let sources = ShaderStage::ALL
            .iter()
            .map(|stage| ShaderSource::new(*stage, code))
            .collect();
        self.register(name, sources);
    }

    pub fn handle(&self, name: &str) -> Option<ShaderHandle> {
        self.compiled.get(name).copied()
    }

    /// Compile `name` on first use and return the cached handle afterwards.
    pub fn load(
        &mut self,
        device: &mut dyn GraphicsDevice,
        name: &str,
    ) -> Result<ShaderHandle, GpuError> {
        if let Some(handle) = self.compiled.get(name) {
            return Ok(*handle);
        }
        let sources = match self.embedded.get(name) {
            Some(sources) => sources.clone(),
            None => self.discover(name)?,
        };
        if !sources.iter().any(|s| s.stage == ShaderStage::Vertex) {
            return Err(GpuError::MissingShaderStage {
                shader: name.to_string(),
                stage: ShaderStage::Vertex,
            });
        }
        let handle = device.create_shader(name, &sources)?;
        tracing::debug!(shader = name, stages = sources.len(), "compiled shader");
        self.compiled.insert(name.to_string(), handle);
        Ok(handle)
    }

    fn discover(&self, name: &str) -> Result<Vec<ShaderSource>, GpuError> {
        let Some(dir) = &self.directory else {
            return Ok(Vec::new());
        };
        let mut sources = Vec::new();
        for stage in ShaderStage::ALL {
            let path = dir.join(format!("{name}.{}.{}", stage.suffix(), self.extension));
            if path.is_file() {
                sources.push(ShaderSource::new(stage, std::fs::read_to_string(&path)?));
            }
        }
        if sources.is_empty() {
            let combined = dir.join(format!("{name}.{}", self.extension));
            if combined.is_file() {
                let code = std::fs::read_to_string(&combined)?;
                sources = ShaderStage::ALL
                    .iter()
                    .map(|stage| ShaderSource::new(*stage, code.clone()))
                    .collect();
            }
        }
        Ok(sources)
    }

    /// Destroy every compiled program and forget the handles.
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        for (_, handle) in self.compiled.drain() {
            device.destroy_shader(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessDevice;

    #[test]
    fn discovers_per_stage_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("phong.vert.glsl"), "void main() {}").unwrap();
        std::fs::write(dir.path().join("phong.frag.glsl"), "void main() {}").unwrap();

        let mut device = HeadlessDevice::new();
        let mut library = ShaderLibrary::new(dir.path(), "glsl");
        let handle = library.load(&mut device, "phong").unwrap();
        let shader = device.shader(handle).unwrap();
        assert_eq!(shader.stages, vec![ShaderStage::Vertex, ShaderStage::Fragment]);
    }

    #[test]
    fn discovers_combined_module() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("unlit.wgsl"), "@vertex fn vs_main() {}").unwrap();

        let mut device = HeadlessDevice::new();
        let mut library = ShaderLibrary::new(dir.path(), "wgsl");
        let handle = library.load(&mut device, "unlit").unwrap();
        assert_eq!(device.shader(handle).unwrap().stages.len(), 2);
    }

    #[test]
    fn missing_vertex_stage_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("half.frag.glsl"), "void main() {}").unwrap();

        let mut device = HeadlessDevice::new();
        let mut library = ShaderLibrary::new(dir.path(), "glsl");
        assert!(matches!(
            library.load(&mut device, "half"),
            Err(GpuError::MissingShaderStage { .. })
        ));
        assert!(matches!(
            library.load(&mut device, "absent"),
            Err(GpuError::MissingShaderStage { .. })
        ));
    }

    #[test]
    fn compiled_handles_are_cached() {
        let mut device = HeadlessDevice::new();
        let mut library = ShaderLibrary::in_memory();
        library.register_combined("flat", "main");
        let a = library.load(&mut device, "flat").unwrap();
        let b = library.load(&mut device, "flat").unwrap();
        assert_eq!(a, b);
        assert_eq!(library.handle("flat"), Some(a));

        library.release(&mut device);
        assert!(device.shader(a).is_none());
        assert!(library.handle("flat").is_none());
    }
}
