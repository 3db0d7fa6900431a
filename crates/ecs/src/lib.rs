//! Entity registry and component storage.
//!
//! Components are stored in BTreeMap for deterministic iteration order.
//! Each component type has its own storage keyed by [`EntityId`].
//!
//! # Invariants
//! - Every live entity has a [`Transform`], a [`Name`] and an [`IdComponent`].
//! - Entity identifiers are sequential and never reused.
//! - All entity and component mutations produce events.

mod components;

pub use components::{
    ComponentEvent, ComponentKind, IdComponent, MaterialComponent, MeshComponent, Name, Tag,
};

use std::collections::{BTreeMap, BTreeSet};

use ember_common::{EntityId, EntityUuid, Transform};
use serde::{Deserialize, Serialize};

/// Deterministic entity and component storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    next_id: u32,
    entities: BTreeSet<EntityId>,
    transforms: BTreeMap<EntityId, Transform>,
    names: BTreeMap<EntityId, Name>,
    tags: BTreeMap<EntityId, Tag>,
    ids: BTreeMap<EntityId, IdComponent>,
    meshes: BTreeMap<EntityId, MeshComponent>,
    materials: BTreeMap<EntityId, MaterialComponent>,
    #[serde(skip)]
    events: Vec<ComponentEvent>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an entity with a default transform, `name` and a fresh UUID.
    pub fn create_entity(&mut self, name: &str) -> EntityId {
        self.create_entity_with_uuid(name, EntityUuid::new())
    }

    /// Same as [`Registry::create_entity`] with a known persistent identity.
    pub fn create_entity_with_uuid(&mut self, name: &str, uuid: EntityUuid) -> EntityId {
        let entity = EntityId(self.next_id);
        self.next_id += 1;
        self.entities.insert(entity);
        self.events.push(ComponentEvent::EntityCreated { entity });

        self.insert(entity, ComponentKind::Transform, |r| {
            r.transforms.insert(entity, Transform::default()).is_some()
        });
        self.insert(entity, ComponentKind::Name, |r| {
            r.names.insert(entity, Name(name.to_string())).is_some()
        });
        self.insert(entity, ComponentKind::Id, |r| {
            r.ids.insert(entity, IdComponent(uuid)).is_some()
        });
        tracing::debug!(%entity, name, "created entity");
        entity
    }

    /// Remove an entity and every component it carries.
    pub fn destroy_entity(&mut self, entity: EntityId) -> bool {
        if !self.entities.remove(&entity) {
            tracing::warn!(%entity, "destroy of unknown entity");
            return false;
        }
        self.remove(entity, ComponentKind::Material, |r| r.materials.remove(&entity).is_some());
        self.remove(entity, ComponentKind::Mesh, |r| r.meshes.remove(&entity).is_some());
        self.remove(entity, ComponentKind::Tag, |r| r.tags.remove(&entity).is_some());
        self.remove(entity, ComponentKind::Id, |r| r.ids.remove(&entity).is_some());
        self.remove(entity, ComponentKind::Name, |r| r.names.remove(&entity).is_some());
        self.remove(entity, ComponentKind::Transform, |r| {
            r.transforms.remove(&entity).is_some()
        });
        self.events.push(ComponentEvent::EntityDestroyed { entity });
        tracing::debug!(%entity, "destroyed entity");
        true
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.entities.contains(&entity)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Live entities in identifier order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.iter().copied()
    }

    /// Drain and return all pending events.
    pub fn drain_events(&mut self) -> Vec<ComponentEvent> {
        std::mem::take(&mut self.events)
    }

    /// Read-only access to pending events.
    pub fn events(&self) -> &[ComponentEvent] {
        &self.events
    }

    // --- Transform ---
    pub fn transform(&self, entity: EntityId) -> Option<&Transform> {
        self.transforms.get(&entity)
    }

    pub fn set_transform(&mut self, entity: EntityId, transform: Transform) -> bool {
        self.insert_live(entity, ComponentKind::Transform, |r| {
            r.transforms.insert(entity, transform).is_some()
        })
    }

    // --- Name ---
    pub fn name(&self, entity: EntityId) -> Option<&Name> {
        self.names.get(&entity)
    }

    pub fn set_name(&mut self, entity: EntityId, name: impl Into<String>) -> bool {
        let name = Name(name.into());
        self.insert_live(entity, ComponentKind::Name, |r| {
            r.names.insert(entity, name).is_some()
        })
    }

    /// First entity carrying `name`, in identifier order.
    pub fn find_by_name(&self, name: &str) -> Option<EntityId> {
        self.names
            .iter()
            .find(|(_, n)| n.0 == name)
            .map(|(entity, _)| *entity)
    }

    // --- Tag ---
    pub fn tag(&self, entity: EntityId) -> Option<&Tag> {
        self.tags.get(&entity)
    }

    pub fn set_tag(&mut self, entity: EntityId, tag: impl Into<String>) -> bool {
        let tag = Tag(tag.into());
        self.insert_live(entity, ComponentKind::Tag, |r| {
            r.tags.insert(entity, tag).is_some()
        })
    }

    pub fn remove_tag(&mut self, entity: EntityId) -> Option<Tag> {
        let mut removed = None;
        self.remove(entity, ComponentKind::Tag, |r| {
            removed = r.tags.remove(&entity);
            removed.is_some()
        });
        removed
    }

    // --- Id ---
    pub fn uuid(&self, entity: EntityId) -> Option<EntityUuid> {
        self.ids.get(&entity).map(|id| id.0)
    }

    pub fn find_by_uuid(&self, uuid: EntityUuid) -> Option<EntityId> {
        self.ids
            .iter()
            .find(|(_, id)| id.0 == uuid)
            .map(|(entity, _)| *entity)
    }

    // --- Mesh ---
    pub fn mesh(&self, entity: EntityId) -> Option<&MeshComponent> {
        self.meshes.get(&entity)
    }

    pub fn set_mesh(&mut self, entity: EntityId, mesh: MeshComponent) -> bool {
        self.insert_live(entity, ComponentKind::Mesh, |r| {
            r.meshes.insert(entity, mesh).is_some()
        })
    }

    pub fn remove_mesh(&mut self, entity: EntityId) -> Option<MeshComponent> {
        let mut removed = None;
        self.remove(entity, ComponentKind::Mesh, |r| {
            removed = r.meshes.remove(&entity);
            removed.is_some()
        });
        removed
    }

    /// Entities with a mesh, in identifier order.
    pub fn meshes(&self) -> &BTreeMap<EntityId, MeshComponent> {
        &self.meshes
    }

    // --- Material ---
    pub fn material(&self, entity: EntityId) -> Option<&MaterialComponent> {
        self.materials.get(&entity)
    }

    pub fn set_material(&mut self, entity: EntityId, material: MaterialComponent) -> bool {
        self.insert_live(entity, ComponentKind::Material, |r| {
            r.materials.insert(entity, material).is_some()
        })
    }

    pub fn remove_material(&mut self, entity: EntityId) -> Option<MaterialComponent> {
        let mut removed = None;
        self.remove(entity, ComponentKind::Material, |r| {
            removed = r.materials.remove(&entity);
            removed.is_some()
        });
        removed
    }

    /// Set a component on a live entity. Unknown entities are logged and
    /// left untouched.
    fn insert_live(
        &mut self,
        entity: EntityId,
        kind: ComponentKind,
        insert: impl FnOnce(&mut Self) -> bool,
    ) -> bool {
        if !self.contains(entity) {
            tracing::warn!(%entity, ?kind, "component set on unknown entity");
            return false;
        }
        self.insert(entity, kind, insert);
        true
    }

    fn insert(&mut self, entity: EntityId, kind: ComponentKind, insert: impl FnOnce(&mut Self) -> bool) {
        let replaced = insert(self);
        self.events.push(if replaced {
            ComponentEvent::Updated { entity, kind }
        } else {
            ComponentEvent::Added { entity, kind }
        });
    }

    fn remove(&mut self, entity: EntityId, kind: ComponentKind, remove: impl FnOnce(&mut Self) -> bool) {
        if remove(self) {
            self.events.push(ComponentEvent::Removed { entity, kind });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_assets::{MaterialKind, MeshStore, primitives};
    use ember_assets::MaterialId;

    fn mesh_component() -> MeshComponent {
        let mut store = MeshStore::new();
        MeshComponent {
            mesh: store.insert(primitives::cube()),
        }
    }

    #[test]
    fn entities_start_with_transform_name_and_id() {
        let mut registry = Registry::new();
        let e = registry.create_entity("Player");
        assert_eq!(registry.transform(e), Some(&Transform::default()));
        assert_eq!(registry.name(e).unwrap().0, "Player");
        assert!(registry.uuid(e).is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn ids_are_sequential_and_not_reused() {
        let mut registry = Registry::new();
        let a = registry.create_entity("a");
        let b = registry.create_entity("b");
        registry.destroy_entity(a);
        let c = registry.create_entity("c");
        assert_eq!((a, b, c), (EntityId(0), EntityId(1), EntityId(2)));
        assert!(!registry.contains(a));
    }

    #[test]
    fn name_update_produces_event() {
        let mut registry = Registry::new();
        let e = registry.create_entity("First");
        registry.drain_events();
        registry.set_name(e, "Second");
        assert_eq!(registry.name(e).unwrap().0, "Second");
        assert_eq!(
            registry.events(),
            &[ComponentEvent::Updated {
                entity: e,
                kind: ComponentKind::Name
            }]
        );
        assert!(!registry.events()[0].is_structural());
    }

    #[test]
    fn mesh_and_material_events_are_structural() {
        let mut registry = Registry::new();
        let e = registry.create_entity("e");
        registry.drain_events();

        registry.set_mesh(e, mesh_component());
        registry.set_material(
            e,
            MaterialComponent {
                material: MaterialId {
                    kind: MaterialKind::Unlit,
                    index: 0,
                },
            },
        );
        registry.remove_material(e);
        let events = registry.drain_events();
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(ComponentEvent::is_structural));
    }

    #[test]
    fn transform_events_move_instances() {
        let mut registry = Registry::new();
        let e = registry.create_entity("e");
        registry.drain_events();
        registry.set_transform(e, Transform::from_position(glam::Vec3::X));
        let events = registry.drain_events();
        assert!(events[0].moves_instances());
        assert!(!events[0].is_structural());
    }

    #[test]
    fn destroy_entity_clears_all() {
        let mut registry = Registry::new();
        let e = registry.create_entity("e");
        registry.set_tag(e, "enemy");
        registry.set_mesh(e, mesh_component());
        registry.drain_events();

        assert!(registry.destroy_entity(e));
        assert!(registry.transform(e).is_none());
        assert!(registry.name(e).is_none());
        assert!(registry.tag(e).is_none());
        assert!(registry.mesh(e).is_none());
        let events = registry.drain_events();
        assert_eq!(events.last(), Some(&ComponentEvent::EntityDestroyed { entity: e }));
        assert!(!registry.destroy_entity(e));
    }

    #[test]
    fn setters_ignore_unknown_entities() {
        let mut registry = Registry::new();
        assert!(!registry.set_name(EntityId(9), "ghost"));
        assert!(registry.events().is_empty());
    }

    #[test]
    fn lookups_by_name_and_uuid() {
        let mut registry = Registry::new();
        let uuid = EntityUuid::new();
        registry.create_entity("a");
        let b = registry.create_entity_with_uuid("b", uuid);
        assert_eq!(registry.find_by_name("b"), Some(b));
        assert_eq!(registry.find_by_uuid(uuid), Some(b));
        assert_eq!(registry.find_by_name("zzz"), None);
    }

    #[test]
    fn components_serialize_for_persistence() {
        let mut registry = Registry::new();
        let e = registry.create_entity("saved");
        registry.set_tag(e, "props");
        let json = serde_json::to_string(&registry).unwrap();
        let restored: Registry = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.name(e).unwrap().0, "saved");
        assert_eq!(restored.uuid(e), registry.uuid(e));
        assert!(restored.events().is_empty());
    }
}
