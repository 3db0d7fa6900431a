use std::path::{Path, PathBuf};

use crate::AssetError;

/// Category of a file under the resource root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Shader,
    Texture,
    Mesh,
    Audio,
}

impl ResourceType {
    pub fn directory_name(self) -> &'static str {
        match self {
            Self::Shader => "shaders",
            Self::Texture => "textures",
            Self::Mesh => "meshes",
            Self::Audio => "audio",
        }
    }
}

/// Resolves resource files relative to one root directory.
///
/// ```text
/// <root>/shaders/   <root>/textures/   <root>/meshes/   <root>/audio/
/// ```
#[derive(Debug, Clone)]
pub struct ResourceLocator {
    root: PathBuf,
}

impl ResourceLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn directory(&self, ty: ResourceType) -> PathBuf {
        self.root.join(ty.directory_name())
    }

    pub fn path(&self, ty: ResourceType, filename: &str) -> PathBuf {
        self.directory(ty).join(filename)
    }

    pub fn exists(&self, ty: ResourceType, filename: &str) -> bool {
        self.path(ty, filename).is_file()
    }

    pub fn read_to_string(&self, ty: ResourceType, filename: &str) -> Result<String, AssetError> {
        let path = self.path(ty, filename);
        if !path.is_file() {
            return Err(AssetError::NotFound(path));
        }
        Ok(std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_follow_type_directories() {
        let locator = ResourceLocator::new("/res");
        assert_eq!(
            locator.path(ResourceType::Shader, "phong.vert.glsl"),
            PathBuf::from("/res/shaders/phong.vert.glsl")
        );
        assert_eq!(
            locator.directory(ResourceType::Audio),
            PathBuf::from("/res/audio")
        );
    }

    #[test]
    fn read_existing_and_missing() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("meshes")).unwrap();
        std::fs::write(root.path().join("meshes/tri.obj"), "v 0 0 0\n").unwrap();

        let locator = ResourceLocator::new(root.path());
        assert!(locator.exists(ResourceType::Mesh, "tri.obj"));
        assert_eq!(
            locator.read_to_string(ResourceType::Mesh, "tri.obj").unwrap(),
            "v 0 0 0\n"
        );
        assert!(matches!(
            locator.read_to_string(ResourceType::Texture, "missing.png"),
            Err(AssetError::NotFound(_))
        ));
    }
}
