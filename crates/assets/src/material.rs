use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use ember_gpu::UniformValue;
use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::AssetError;

/// Texture index meaning "no texture bound".
pub const NO_TEXTURE: i32 = -1;

/// Identity of a material kind, derived from its type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// First eight bytes of the SHA-256 of `type_name`, little endian.
    pub fn of(type_name: &str) -> Self {
        let digest = Sha256::digest(type_name.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        Self(u64::from_le_bytes(bytes))
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// The closed set of material kinds the renderer knows how to upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MaterialKind {
    Phong,
    Unlit,
}

impl MaterialKind {
    pub const ALL: [MaterialKind; 2] = [MaterialKind::Phong, MaterialKind::Unlit];

    pub fn type_name(self) -> &'static str {
        match self {
            Self::Phong => "PhongMaterial",
            Self::Unlit => "UnlitMaterial",
        }
    }

    pub fn type_hash(self) -> TypeHash {
        TypeHash::of(self.type_name())
    }

    pub fn from_type_hash(hash: TypeHash) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.type_hash() == hash)
    }

    /// Shader used when a material does not name one.
    pub fn default_shader(self) -> &'static str {
        match self {
            Self::Phong => "phong",
            Self::Unlit => "unlit",
        }
    }

    /// Gather every instance of this kind into one uniform array per
    /// property. Element `i` of each array belongs to instance ID `i`.
    pub fn upload(self, registry: &MaterialRegistry) -> UniformBatch {
        let instances = registry.instances(self);
        let mut batch = UniformBatch::default();
        match self {
            Self::Phong => {
                let props: Vec<PhongProperties> = instances
                    .iter()
                    .map(|m| match &m.properties {
                        MaterialProperties::Phong(p) => p.clone(),
                        MaterialProperties::Unlit(_) => PhongProperties::default(),
                    })
                    .collect();
                batch.push(
                    "u_Diffuse",
                    UniformValue::Vec3Array(props.iter().map(|p| p.diffuse).collect()),
                );
                batch.push(
                    "u_Specular",
                    UniformValue::Vec3Array(props.iter().map(|p| p.specular).collect()),
                );
                batch.push(
                    "u_Shininess",
                    UniformValue::FloatArray(props.iter().map(|p| p.shininess).collect()),
                );
                batch.push(
                    "u_AlbedoTexture",
                    UniformValue::IntArray(props.iter().map(|p| p.albedo_texture).collect()),
                );
            }
            Self::Unlit => {
                let props: Vec<UnlitProperties> = instances
                    .iter()
                    .map(|m| match &m.properties {
                        MaterialProperties::Unlit(p) => p.clone(),
                        MaterialProperties::Phong(_) => UnlitProperties::default(),
                    })
                    .collect();
                batch.push(
                    "u_Color",
                    UniformValue::Vec4Array(props.iter().map(|p| p.color).collect()),
                );
                batch.push(
                    "u_AlbedoTexture",
                    UniformValue::IntArray(props.iter().map(|p| p.albedo_texture).collect()),
                );
            }
        }
        batch
    }
}

impl fmt::Display for MaterialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhongProperties {
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
    pub albedo_texture: i32,
}

impl Default for PhongProperties {
    fn default() -> Self {
        Self {
            diffuse: Vec3::splat(0.8),
            specular: Vec3::splat(0.5),
            shininess: 32.0,
            albedo_texture: NO_TEXTURE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnlitProperties {
    pub color: Vec4,
    pub albedo_texture: i32,
}

impl Default for UnlitProperties {
    fn default() -> Self {
        Self {
            color: Vec4::ONE,
            albedo_texture: NO_TEXTURE,
        }
    }
}

/// Surface parameters, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MaterialProperties {
    Phong(PhongProperties),
    Unlit(UnlitProperties),
}

impl MaterialProperties {
    pub fn kind(&self) -> MaterialKind {
        match self {
            Self::Phong(_) => MaterialKind::Phong,
            Self::Unlit(_) => MaterialKind::Unlit,
        }
    }
}

/// Kind plus per-kind instance ID. Doubles as the drawing-context key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MaterialId {
    pub kind: MaterialKind,
    pub index: u32,
}

impl fmt::Display for MaterialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind.default_shader(), self.index)
    }
}

/// A named, shader-bound parameter set owned by the [`MaterialRegistry`].
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub shader: String,
    pub properties: MaterialProperties,
    id: MaterialId,
}

impl Material {
    pub fn id(&self) -> MaterialId {
        self.id
    }

    pub fn kind(&self) -> MaterialKind {
        self.id.kind
    }
}

/// Named uniform values ready for upload, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformBatch {
    uniforms: Vec<(String, UniformValue)>,
}

impl UniformBatch {
    pub fn push(&mut self, name: impl Into<String>, value: UniformValue) {
        self.uniforms.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&UniformValue> {
        self.uniforms.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &UniformValue)> {
        self.uniforms.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.uniforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uniforms.is_empty()
    }
}

/// One entry of a material library file.
#[derive(Debug, Deserialize)]
struct MaterialEntry {
    name: String,
    #[serde(default)]
    shader: Option<String>,
    properties: MaterialProperties,
}

/// Owner of every material, grouped by kind.
///
/// Instance IDs are the position of the material in its kind's list. There is
/// no removal, so IDs are never reused.
#[derive(Debug, Default)]
pub struct MaterialRegistry {
    kinds: BTreeMap<TypeHash, Vec<Material>>,
}

impl MaterialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a material bound to its kind's default shader.
    pub fn create_material(
        &mut self,
        name: impl Into<String>,
        properties: MaterialProperties,
    ) -> MaterialId {
        let shader = properties.kind().default_shader();
        self.create_material_with_shader(name, shader, properties)
    }

    pub fn create_material_with_shader(
        &mut self,
        name: impl Into<String>,
        shader: impl Into<String>,
        properties: MaterialProperties,
    ) -> MaterialId {
        let kind = properties.kind();
        let instances = self.kinds.entry(kind.type_hash()).or_default();
        let id = MaterialId {
            kind,
            index: instances.len() as u32,
        };
        let material = Material {
            name: name.into(),
            shader: shader.into(),
            properties,
            id,
        };
        tracing::debug!(material = %material.name, id = %id, shader = %material.shader, "created material");
        instances.push(material);
        id
    }

    /// `None` when the kind is unknown or `index` is past the last instance.
    pub fn get_material(&self, hash: TypeHash, index: u32) -> Option<&Material> {
        self.kinds.get(&hash)?.get(index as usize)
    }

    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        self.get_material(id.kind.type_hash(), id.index)
    }

    /// Properties can be edited in place; kind and ID cannot.
    pub fn get_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.kinds
            .get_mut(&id.kind.type_hash())?
            .get_mut(id.index as usize)
    }

    pub fn instances(&self, kind: MaterialKind) -> &[Material] {
        self.kinds
            .get(&kind.type_hash())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn find(&self, name: &str) -> Option<MaterialId> {
        self.kinds
            .values()
            .flatten()
            .find(|m| m.name == name)
            .map(Material::id)
    }

    pub fn len(&self) -> usize {
        self.kinds.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create every material listed in a JSON library file, in file order.
    ///
    /// ```json
    /// [{ "name": "red", "properties": { "Unlit": { "color": [1, 0, 0, 1] } } }]
    /// ```
    pub fn load_library(&mut self, path: impl AsRef<Path>) -> Result<Vec<MaterialId>, AssetError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(AssetError::NotFound(path.to_path_buf()));
        }
        let file = std::fs::File::open(path)?;
        let entries: Vec<MaterialEntry> = serde_json::from_reader(file)?;
        let ids: Vec<MaterialId> = entries
            .into_iter()
            .map(|entry| match entry.shader {
                Some(shader) => {
                    self.create_material_with_shader(entry.name, shader, entry.properties)
                }
                None => self.create_material(entry.name, entry.properties),
            })
            .collect();
        tracing::info!(path = %path.display(), count = ids.len(), "loaded material library");
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phong(diffuse: Vec3) -> MaterialProperties {
        MaterialProperties::Phong(PhongProperties {
            diffuse,
            ..PhongProperties::default()
        })
    }

    #[test]
    fn type_hash_is_stable_per_name() {
        assert_eq!(TypeHash::of("PhongMaterial"), MaterialKind::Phong.type_hash());
        assert_ne!(MaterialKind::Phong.type_hash(), MaterialKind::Unlit.type_hash());
        assert_eq!(
            MaterialKind::from_type_hash(MaterialKind::Unlit.type_hash()),
            Some(MaterialKind::Unlit)
        );
        assert_eq!(MaterialKind::from_type_hash(TypeHash(7)), None);
    }

    #[test]
    fn instance_ids_are_dense_per_kind() {
        let mut registry = MaterialRegistry::new();
        let a = registry.create_material("a", phong(Vec3::X));
        let u = registry.create_material("u", MaterialProperties::Unlit(UnlitProperties::default()));
        let b = registry.create_material("b", phong(Vec3::Y));
        let c = registry.create_material("c", phong(Vec3::Z));

        assert_eq!((a.index, b.index, c.index), (0, 1, 2));
        assert_eq!(u.index, 0);
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.instances(MaterialKind::Phong).len(), 3);
    }

    #[test]
    fn get_material_out_of_range_is_none() {
        let mut registry = MaterialRegistry::new();
        registry.create_material("a", phong(Vec3::X));
        let hash = MaterialKind::Phong.type_hash();
        assert!(registry.get_material(hash, 0).is_some());
        assert!(registry.get_material(hash, 1).is_none());
        assert!(registry.get_material(MaterialKind::Unlit.type_hash(), 0).is_none());
        assert!(registry.get_material(TypeHash(0), 0).is_none());
    }

    #[test]
    fn upload_arrays_follow_instance_ids() {
        let mut registry = MaterialRegistry::new();
        registry.create_material("a", phong(Vec3::X));
        registry.create_material("b", phong(Vec3::Y));

        let batch = MaterialKind::Phong.upload(&registry);
        assert_eq!(batch.len(), 4);
        assert_eq!(
            batch.get("u_Diffuse"),
            Some(&UniformValue::Vec3Array(vec![Vec3::X, Vec3::Y]))
        );
        assert_eq!(
            batch.get("u_AlbedoTexture"),
            Some(&UniformValue::IntArray(vec![NO_TEXTURE, NO_TEXTURE]))
        );
    }

    #[test]
    fn upload_reflects_edits() {
        let mut registry = MaterialRegistry::new();
        let id = registry.create_material("glow", MaterialProperties::Unlit(UnlitProperties::default()));
        if let Some(MaterialProperties::Unlit(p)) =
            registry.get_mut(id).map(|m| &mut m.properties)
        {
            p.color = Vec4::new(1.0, 0.0, 0.0, 1.0);
        }
        let batch = MaterialKind::Unlit.upload(&registry);
        assert_eq!(
            batch.get("u_Color"),
            Some(&UniformValue::Vec4Array(vec![Vec4::new(1.0, 0.0, 0.0, 1.0)]))
        );
        assert!(MaterialKind::Phong.upload(&registry).get("u_Diffuse").is_some());
    }

    #[test]
    fn shader_defaults_to_kind() {
        let mut registry = MaterialRegistry::new();
        let a = registry.create_material("a", phong(Vec3::ONE));
        let b = registry.create_material_with_shader("b", "toon", phong(Vec3::ONE));
        assert_eq!(registry.get(a).unwrap().shader, "phong");
        assert_eq!(registry.get(b).unwrap().shader, "toon");
        assert_eq!(registry.find("b"), Some(b));
    }

    #[test]
    fn load_library_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("materials.json");
        std::fs::write(
            &path,
            r#"[
                {"name": "red", "properties": {"Unlit": {"color": [1, 0, 0, 1]}}},
                {"name": "gold", "shader": "phong", "properties": {"Phong": {"diffuse": [1, 0.8, 0.2], "shininess": 64}}}
            ]"#,
        )
        .unwrap();

        let mut registry = MaterialRegistry::new();
        let ids = registry.load_library(&path).unwrap();
        assert_eq!(ids.len(), 2);
        let gold = registry.get(ids[1]).unwrap();
        match &gold.properties {
            MaterialProperties::Phong(p) => {
                assert_eq!(p.shininess, 64.0);
                assert_eq!(p.albedo_texture, NO_TEXTURE);
            }
            other => panic!("unexpected properties {other:?}"),
        }
        assert!(registry.load_library(dir.path().join("none.json")).is_err());
    }
}
