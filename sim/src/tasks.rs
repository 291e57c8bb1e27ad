//! Task bookkeeping: the sorted candidate cache and the helpers that keep it
//! and the gnome/task back-references consistent.
//!
//! The assignment pass needs every task in `(priority desc, created_at asc,
//! id asc)` order. Sorting thousands of tasks each pass is wasted work when
//! nothing changed, so [`TaskQueue`] caches the order and rebuilds only after
//! an invalidation. Every path that creates or destroys a task invalidates:
//! [`spawn_task`], [`remove_task`], `EntityStore::destroy_entity`, and
//! `task_queue_sync_system` as a backstop for raw ECS edits.

use crate::components::{Gnome, GnomeState, Task, TaskKind, Velocity};
use crate::store::{EntityId, EntityStore};
use crate::terrain::TileCoord;
use bevy_ecs::prelude::*;
use rustc_hash::FxHashMap;
use std::cmp::Reverse;

/// Identity of the work a task describes, used to reject duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKey {
    Dig(TileCoord),
    Collect(EntityId),
}

impl TaskKey {
    pub fn of(task: &Task) -> Option<Self> {
        match task.kind {
            TaskKind::Dig => Some(TaskKey::Dig(task.target())),
            TaskKind::Collect => task.target_entity.map(TaskKey::Collect),
        }
    }
}

/// Cached task ordering plus a duplicate index.
#[derive(Resource, Debug)]
pub struct TaskQueue {
    ordered: Vec<EntityId>,
    by_key: FxHashMap<TaskKey, EntityId>,
    dirty: bool,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self {
            ordered: Vec::new(),
            by_key: FxHashMap::default(),
            dirty: true,
        }
    }
}

impl TaskQueue {
    /// Force a rebuild on the next [`TaskQueue::refresh`].
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Every task id in assignment order, claimed ones included.
    pub fn ordered(&self) -> &[EntityId] {
        &self.ordered
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Task already covering `key`, if any.
    pub fn lookup(&self, key: &TaskKey) -> Option<EntityId> {
        self.by_key.get(key).copied()
    }

    /// Rebuild the cache from the world if it was invalidated.
    pub fn refresh(world: &mut World) {
        let dirty = world
            .get_resource::<TaskQueue>()
            .map_or(true, |queue| queue.dirty);
        if !dirty {
            return;
        }

        let mut entries: Vec<(Reverse<_>, u64, EntityId, Option<TaskKey>)> = world
            .query::<(&EntityId, &Task)>()
            .iter(world)
            .map(|(id, task)| (Reverse(task.priority), task.created_at, *id, TaskKey::of(task)))
            .collect();
        entries.sort_unstable_by(|a, b| (a.0, a.1, a.2).cmp(&(b.0, b.1, b.2)));

        let mut queue = world.get_resource_or_insert_with(TaskQueue::default);
        queue.ordered.clear();
        queue.by_key.clear();
        for (_, _, id, key) in entries {
            queue.ordered.push(id);
            if let Some(key) = key {
                queue.by_key.entry(key).or_insert(id);
            }
        }
        queue.dirty = false;
        log::trace!("task queue rebuilt with {} tasks", queue.ordered.len());
    }
}

/// Create a task entity.
pub fn spawn_task(world: &mut World, task: Task) -> EntityId {
    let key = TaskKey::of(&task);
    let id = world.create_entity();
    world.add_component(id, task);

    let mut queue = world.get_resource_or_insert_with(TaskQueue::default);
    if let Some(key) = key {
        queue.by_key.insert(key, id);
    }
    queue.invalidate();
    id
}

/// Destroy a task, clearing the holding gnome if it still points at it.
///
/// Returns `false` if the task did not exist.
pub fn remove_task(world: &mut World, task_id: EntityId) -> bool {
    let Some(task) = world.component::<Task>(task_id).cloned() else {
        return false;
    };
    if let Some(gnome_id) = task.assigned_gnome {
        clear_gnome_task(world, gnome_id, task_id);
    }
    world.destroy_entity(task_id);

    let mut queue = world.get_resource_or_insert_with(TaskQueue::default);
    if let Some(key) = TaskKey::of(&task) {
        if queue.by_key.get(&key) == Some(&task_id) {
            queue.by_key.remove(&key);
        }
    }
    queue.invalidate();
    true
}

/// Put a claimed task back up for assignment, keeping its priority and
/// timestamp. The gnome side is left to the caller.
pub fn release_task(world: &mut World, task_id: EntityId) -> bool {
    world.update_component::<Task, _>(task_id, |task| Task {
        assigned_gnome: None,
        ..task.clone()
    })
}

/// Clear `gnome_id`'s task if it is `task_id`.
pub fn clear_gnome_task(world: &mut World, gnome_id: EntityId, task_id: EntityId) {
    let mut cleared = false;
    world.update_component::<Gnome, _>(gnome_id, |gnome| {
        let mut next = gnome.clone();
        if next.current_task == Some(task_id) {
            next.clear_task();
            cleared = true;
        }
        next
    });
    if cleared {
        halt_gnome(world, gnome_id);
    }
}

/// Zero the velocity of a gnome that has nowhere left to walk. Falling
/// gnomes keep theirs.
pub(crate) fn halt_gnome(world: &mut World, gnome_id: EntityId) {
    let falling = world
        .component::<Gnome>(gnome_id)
        .map_or(true, |gnome| gnome.state == GnomeState::Falling);
    if !falling {
        world.update_component::<Velocity, _>(gnome_id, |_| Velocity::default());
    }
}
