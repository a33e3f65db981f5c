use std::any::{Any, TypeId};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// Unique identifier for an entity in the world.
///
/// Ids are handed out in increasing order, so sorting by id is sorting by creation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u32);

impl EntityId {
    /// Get the underlying integer ID (useful for debugging or logging).
    pub fn to_u32(self) -> u32 {
        self.0
    }

    pub(crate) fn from_u32(id: u32) -> Self {
        Self(id)
    }
}

/// Type-erased column so `despawn` can clear an entity from every storage.
trait ComponentColumn: Any {
    fn remove_entity(&mut self, entity: EntityId);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> ComponentColumn for BTreeMap<EntityId, T> {
    fn remove_entity(&mut self, entity: EntityId) {
        self.remove(&entity);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Entity container with typed component storage.
///
/// - Entities are identified by `EntityId`
/// - Components are stored per Rust type, keyed by `EntityId`
/// - Iteration visits entities in creation order
pub struct World {
    next_id: u32,
    alive: BTreeSet<EntityId>,
    columns: HashMap<TypeId, Box<dyn ComponentColumn>>,
}

impl World {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            alive: BTreeSet::new(),
            columns: HashMap::new(),
        }
    }

    /// Spawn a new entity and return its `EntityId`.
    pub fn spawn(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1).max(1);
        self.alive.insert(id);
        id
    }

    /// Despawn an entity, removing it and all of its components.
    pub fn despawn(&mut self, entity: EntityId) -> bool {
        if !self.alive.remove(&entity) {
            return false;
        }
        for column in self.columns.values_mut() {
            column.remove_entity(entity);
        }
        true
    }

    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.alive.contains(&entity)
    }

    pub fn len(&self) -> usize {
        self.alive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alive.is_empty()
    }

    /// Drop every entity and component. Ids keep increasing so stale handles never alias.
    pub fn clear(&mut self) {
        self.alive.clear();
        self.columns.clear();
    }

    /// Insert a component for a live entity, replacing any previous value of that type.
    /// Returns false (and drops the component) if the entity is not alive.
    pub fn insert<T: Any>(&mut self, entity: EntityId, component: T) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let column = self
            .columns
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(BTreeMap::<EntityId, T>::new()));
        match column.as_any_mut().downcast_mut::<BTreeMap<EntityId, T>>() {
            Some(map) => {
                map.insert(entity, component);
                true
            }
            None => false,
        }
    }

    pub fn remove<T: Any>(&mut self, entity: EntityId) -> Option<T> {
        self.column_mut::<T>()?.remove(&entity)
    }

    pub fn get<T: Any>(&self, entity: EntityId) -> Option<&T> {
        self.column::<T>()?.get(&entity)
    }

    pub fn get_mut<T: Any>(&mut self, entity: EntityId) -> Option<&mut T> {
        self.column_mut::<T>()?.get_mut(&entity)
    }

    /// Iterate over all entities that have a component of type `T`, in creation order.
    pub fn query<T: Any>(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.column::<T>()
            .into_iter()
            .flat_map(|map| map.iter().map(|(&entity, comp)| (entity, comp)))
    }

    /// Mutable variant of [`World::query`].
    pub fn query_mut<T: Any>(&mut self) -> impl Iterator<Item = (EntityId, &mut T)> {
        self.column_mut::<T>()
            .into_iter()
            .flat_map(|map| map.iter_mut().map(|(&entity, comp)| (entity, comp)))
    }

    fn column<T: Any>(&self) -> Option<&BTreeMap<EntityId, T>> {
        self.columns
            .get(&TypeId::of::<T>())?
            .as_any()
            .downcast_ref::<BTreeMap<EntityId, T>>()
    }

    fn column_mut<T: Any>(&mut self) -> Option<&mut BTreeMap<EntityId, T>> {
        self.columns
            .get_mut(&TypeId::of::<T>())?
            .as_any_mut()
            .downcast_mut::<BTreeMap<EntityId, T>>()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Health(u32);

    #[test]
    fn despawn_removes_components_of_every_type() {
        let mut world = World::new();
        let a = world.spawn();
        let b = world.spawn();
        world.insert(a, Health(3));
        world.insert(a, "tag");
        world.insert(b, Health(5));

        assert!(world.despawn(a));
        assert!(!world.despawn(a));
        assert!(world.get::<Health>(a).is_none());
        assert!(world.get::<&str>(a).is_none());
        assert_eq!(world.get::<Health>(b), Some(&Health(5)));
    }

    #[test]
    fn query_visits_in_creation_order() {
        let mut world = World::new();
        let ids: Vec<EntityId> = (0..4).map(|_| world.spawn()).collect();
        for (n, id) in ids.iter().rev().enumerate() {
            world.insert(*id, Health(n as u32));
        }
        let seen: Vec<EntityId> = world.query::<Health>().map(|(id, _)| id).collect();
        assert_eq!(seen, ids);
    }

    #[test]
    fn components_cannot_be_attached_to_dead_entities() {
        let mut world = World::new();
        let e = world.spawn();
        world.despawn(e);
        assert!(!world.insert(e, Health(1)));
        assert_eq!(world.query::<Health>().count(), 0);
    }

    #[test]
    fn ids_are_not_reused_after_clear() {
        let mut world = World::new();
        let first = world.spawn();
        world.clear();
        let second = world.spawn();
        assert_ne!(first, second);
        assert!(!world.is_alive(first));
    }
}
