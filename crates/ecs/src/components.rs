use ember_assets::{MaterialId, MeshHandle};
use ember_common::{EntityId, EntityUuid};
use serde::{Deserialize, Serialize};

/// Human-readable name component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name(pub String);

/// Free-form grouping label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag(pub String);

/// Persistent identity used by serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdComponent(pub EntityUuid);

/// Geometry drawn for an entity. The mesh itself lives in the mesh store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshComponent {
    pub mesh: MeshHandle,
}

/// Material override for an entity's mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialComponent {
    pub material: MaterialId,
}

/// Component kinds tracked by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComponentKind {
    Transform,
    Name,
    Tag,
    Id,
    Mesh,
    Material,
}

impl ComponentKind {
    /// Kinds whose changes alter which meshes are batched with which material.
    pub fn is_structural(self) -> bool {
        matches!(self, Self::Mesh | Self::Material)
    }
}

/// Events produced by entity and component mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComponentEvent {
    EntityCreated { entity: EntityId },
    EntityDestroyed { entity: EntityId },
    Added { entity: EntityId, kind: ComponentKind },
    Updated { entity: EntityId, kind: ComponentKind },
    Removed { entity: EntityId, kind: ComponentKind },
}

impl ComponentEvent {
    pub fn entity(&self) -> EntityId {
        match *self {
            Self::EntityCreated { entity }
            | Self::EntityDestroyed { entity }
            | Self::Added { entity, .. }
            | Self::Updated { entity, .. }
            | Self::Removed { entity, .. } => entity,
        }
    }

    pub fn kind(&self) -> Option<ComponentKind> {
        match *self {
            Self::Added { kind, .. } | Self::Updated { kind, .. } | Self::Removed { kind, .. } => {
                Some(kind)
            }
            _ => None,
        }
    }

    /// Entity lifecycle and mesh/material changes. Packed render data is
    /// invalid after any of these.
    pub fn is_structural(&self) -> bool {
        match self {
            Self::EntityCreated { .. } | Self::EntityDestroyed { .. } => true,
            _ => self.kind().is_some_and(ComponentKind::is_structural),
        }
    }

    /// Transform changes move instances without changing the batching.
    pub fn moves_instances(&self) -> bool {
        self.kind() == Some(ComponentKind::Transform)
    }
}
