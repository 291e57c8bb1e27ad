//! Entity identity and component storage.
//!
//! Component tables live in a `bevy_ecs::World`. On top of that this module
//! adds stable, never-reused [`EntityId`]s so that cross references (a task's
//! assigned gnome, a tile grid cell) survive save/load, plus the
//! [`EntityStore`] operations the systems use to touch components by id.
//!
//! ## Missing-entity tolerance
//!
//! Every operation that targets an id tolerates the id being absent. In
//! particular [`EntityStore::update_component`] returns `false` instead of
//! panicking when the entity or its component is gone: systems routinely
//! fire updates at entities that were destroyed earlier in the same tick.

use crate::components::{Gnome, Task};
use crate::tasks::{clear_gnome_task, release_task, TaskQueue};
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable entity identifier, issued monotonically and never reused.
#[derive(
    Component, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Maps stable ids to live ECS entities.
///
/// Ids are dense and monotonic, so the lookup table is a plain vector
/// indexed by id: O(1) resolve without hashing.
#[derive(Resource, Debug, Default)]
pub struct EntityRegistry {
    next_id: u64,
    slots: Vec<Option<Entity>>,
    live: usize,
}

impl EntityRegistry {
    /// Registry that will hand out ids starting at `next_id`.
    pub fn starting_at(next_id: u64) -> Self {
        Self {
            next_id,
            ..Self::default()
        }
    }

    /// The id the next allocation will return.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Bind an id to an ECS entity.
    ///
    /// Binding an id that is already live is an invariant violation: it
    /// asserts in debug builds and keeps the newer binding otherwise.
    pub fn bind(&mut self, id: EntityId, entity: Entity) {
        let index = id.0 as usize;
        if self.slots.len() <= index {
            self.slots.resize(index + 1, None);
        }
        let previous = self.slots[index].replace(entity);
        debug_assert!(previous.is_none(), "entity id {id} bound twice");
        if previous.is_none() {
            self.live += 1;
        } else {
            log::warn!("entity id {id} was already bound; keeping the newer entity");
        }
        if id.0 >= self.next_id {
            self.next_id = id.0.saturating_add(1);
        }
    }

    fn unbind(&mut self, id: EntityId) -> Option<Entity> {
        let entity = self.slots.get_mut(id.0 as usize)?.take()?;
        self.live -= 1;
        Some(entity)
    }

    /// Resolve an id to its live ECS entity.
    #[inline]
    pub fn resolve(&self, id: EntityId) -> Option<Entity> {
        self.slots.get(id.0 as usize).copied().flatten()
    }

    /// All live ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(index, _)| EntityId(index as u64))
    }
}

/// Id-addressed entity and component operations.
///
/// Implemented for [`World`]; the world must hold an [`EntityRegistry`]
/// (it is created on first allocation if missing).
pub trait EntityStore {
    /// Allocate a fresh id and spawn an entity carrying it.
    fn create_entity(&mut self) -> EntityId;

    /// Allocate a fresh id and spawn an entity carrying `bundle`.
    fn spawn_bundle<B: Bundle>(&mut self, bundle: B) -> EntityId;

    /// Remove the entity and every component it has. Destroying an absent
    /// id is a no-op.
    fn destroy_entity(&mut self, id: EntityId);

    /// Whether the id refers to a live entity.
    fn contains_entity(&self, id: EntityId) -> bool;

    /// Attach (or replace) a component. Returns `false` if the entity is gone.
    fn add_component<C: Component>(&mut self, id: EntityId, component: C) -> bool;

    /// Borrow a component.
    fn component<C: Component>(&self, id: EntityId) -> Option<&C>;

    fn has_component<C: Component>(&self, id: EntityId) -> bool {
        self.component::<C>(id).is_some()
    }

    /// Replace a component with `f(current)`.
    ///
    /// Silently does nothing and returns `false` when the entity or the
    /// component is missing.
    fn update_component<C, F>(&mut self, id: EntityId, f: F) -> bool
    where
        C: Component,
        F: FnOnce(&C) -> C;

    /// Detach a component, returning it if it was present.
    fn remove_component<C: Component>(&mut self, id: EntityId) -> Option<C>;
}

impl EntityStore for World {
    fn create_entity(&mut self) -> EntityId {
        let id = self
            .get_resource_or_insert_with(EntityRegistry::default)
            .allocate();
        let entity = self.spawn(id).id();
        self.resource_mut::<EntityRegistry>().bind(id, entity);
        id
    }

    fn spawn_bundle<B: Bundle>(&mut self, bundle: B) -> EntityId {
        let id = self.create_entity();
        if let Some(entity) = resolve(self, id) {
            self.entity_mut(entity).insert(bundle);
        }
        id
    }

    fn destroy_entity(&mut self, id: EntityId) {
        let Some(entity) = self
            .get_resource_mut::<EntityRegistry>()
            .and_then(|mut registry| registry.unbind(id))
        else {
            return;
        };
        let held = self.get::<Gnome>(entity).and_then(|gnome| gnome.current_task);
        let holder = self.get::<Task>(entity).map(|task| task.assigned_gnome);
        self.despawn(entity);

        // Drop the other half of a gnome <-> task claim.
        if let Some(task_id) = held {
            if self
                .component::<Task>(task_id)
                .is_some_and(|task| task.assigned_gnome == Some(id))
            {
                release_task(self, task_id);
            }
        }
        if let Some(holder) = holder {
            if let Some(mut queue) = self.get_resource_mut::<TaskQueue>() {
                queue.invalidate();
            }
            if let Some(gnome_id) = holder {
                clear_gnome_task(self, gnome_id, id);
            }
        }
    }

    fn contains_entity(&self, id: EntityId) -> bool {
        resolve(self, id).is_some()
    }

    fn add_component<C: Component>(&mut self, id: EntityId, component: C) -> bool {
        match resolve(self, id) {
            Some(entity) => {
                self.entity_mut(entity).insert(component);
                true
            }
            None => false,
        }
    }

    fn component<C: Component>(&self, id: EntityId) -> Option<&C> {
        self.get::<C>(resolve(self, id)?)
    }

    fn update_component<C, F>(&mut self, id: EntityId, f: F) -> bool
    where
        C: Component,
        F: FnOnce(&C) -> C,
    {
        let Some(entity) = resolve(self, id) else {
            return false;
        };
        match self.get_mut::<C>(entity) {
            Some(mut current) => {
                let next = f(&current);
                *current = next;
                true
            }
            None => false,
        }
    }

    fn remove_component<C: Component>(&mut self, id: EntityId) -> Option<C> {
        let entity = resolve(self, id)?;
        self.entity_mut(entity).take::<C>()
    }
}

#[inline]
fn resolve(world: &World, id: EntityId) -> Option<Entity> {
    let entity = world.get_resource::<EntityRegistry>()?.resolve(id)?;
    world.entities().contains(entity).then_some(entity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{GnomeBundle, Position, TaskPriority, Velocity};
    use crate::tasks::spawn_task;
    use crate::terrain::TileCoord;

    /// A gnome holding a dig task, both sides of the claim set.
    fn claimed(world: &mut World) -> (EntityId, EntityId) {
        let gnome = world.spawn_bundle(GnomeBundle::at(TileCoord::new(1, 1)));
        let task = spawn_task(world, Task::dig(TileCoord::new(2, 2), TaskPriority::Normal, 0));
        world.update_component::<Task, _>(task, |t| Task {
            assigned_gnome: Some(gnome),
            ..t.clone()
        });
        world.update_component::<Gnome, _>(gnome, |g| {
            let mut next = g.clone();
            next.assign(task, vec![TileCoord::new(1, 1)]);
            next
        });
        (gnome, task)
    }

    #[test]
    fn test_destroying_gnome_releases_its_task() {
        let mut world = World::new();
        let (gnome, task) = claimed(&mut world);

        world.destroy_entity(gnome);

        let task = world.component::<Task>(task).unwrap();
        assert_eq!(task.assigned_gnome, None);
        assert!(task.is_pending());
    }

    #[test]
    fn test_destroying_task_clears_its_gnome() {
        let mut world = World::new();
        let (gnome, task) = claimed(&mut world);

        world.destroy_entity(task);

        assert!(world.component::<Gnome>(gnome).unwrap().is_idle());
        assert!(world.resource::<TaskQueue>().is_dirty());
    }

    #[test]
    fn test_ids_are_monotonic_and_never_reused() {
        let mut world = World::new();
        let a = world.create_entity();
        let b = world.create_entity();
        world.destroy_entity(a);
        let c = world.create_entity();

        assert_eq!(a, EntityId(0));
        assert_eq!(b, EntityId(1));
        assert_eq!(c, EntityId(2));
        assert!(!world.contains_entity(a));
        assert_eq!(world.resource::<EntityRegistry>().len(), 2);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut world = World::new();
        let id = world.create_entity();
        world.add_component(id, Position::new(1.0, 2.0));

        world.destroy_entity(id);
        world.destroy_entity(id);
        world.destroy_entity(EntityId(999));

        assert!(!world.has_component::<Position>(id));
        assert!(world.resource::<EntityRegistry>().is_empty());
    }

    #[test]
    fn test_update_applies_transform() {
        let mut world = World::new();
        let id = world.create_entity();
        world.add_component(id, Position::new(1.0, 2.0));

        let applied = world.update_component::<Position, _>(id, |p| Position::new(p.x + 1.0, p.y));

        assert!(applied);
        assert_eq!(world.component::<Position>(id), Some(&Position::new(2.0, 2.0)));
    }

    #[test]
    fn test_update_on_missing_is_noop() {
        let mut world = World::new();
        let id = world.create_entity();

        // Entity exists but lacks the component.
        assert!(!world.update_component::<Velocity, _>(id, |v| *v));
        assert!(!world.has_component::<Velocity>(id));

        // Entity does not exist at all.
        world.destroy_entity(id);
        assert!(!world.update_component::<Velocity, _>(id, |v| *v));
        assert!(!world.add_component(id, Velocity::default()));
    }

    #[test]
    fn test_remove_component_returns_value() {
        let mut world = World::new();
        let id = world.create_entity();
        world.add_component(id, Velocity::new(0.5, 0.0));

        assert_eq!(world.remove_component::<Velocity>(id), Some(Velocity::new(0.5, 0.0)));
        assert_eq!(world.remove_component::<Velocity>(id), None);
        assert!(world.contains_entity(id));
    }

    #[test]
    fn test_spawn_bundle_attaches_components() {
        let mut world = World::new();
        let id = world.spawn_bundle((Position::new(3.0, 4.0), Velocity::new(0.0, 0.1)));

        assert_eq!(world.component::<Position>(id), Some(&Position::new(3.0, 4.0)));
        assert!(world.has_component::<Velocity>(id));
        assert_eq!(world.component::<EntityId>(id), Some(&id));
    }

    #[test]
    fn test_registry_ids_listed_in_order() {
        let mut registry = EntityRegistry::starting_at(5);
        registry.bind(EntityId(7), Entity::from_raw(1));
        registry.bind(EntityId(5), Entity::from_raw(2));

        let ids: Vec<_> = registry.ids().collect();
        assert_eq!(ids, vec![EntityId(5), EntityId(7)]);
        assert_eq!(registry.next_id(), 8);
    }
}
