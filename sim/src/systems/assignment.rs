//! Task assignment - matches idle gnomes with pending work.
//!
//! Runs once every `assignment_interval` ticks. Idle gnomes are visited in
//! id order; each walks the cached task order and claims the first pending
//! task it can path to. A gnome spends at most `max_path_attempts`
//! pathfinding calls per pass, which bounds the cost of a pass at
//! `gnomes * max_path_attempts` searches. The flip side is that a reachable
//! task queued behind that many unreachable ones is never tried by that
//! gnome until the blockers are claimed, cancelled or become reachable.

use crate::components::{Gnome, GnomeState, Position, Task, TaskKind};
use crate::config::{SimConfig, SimTick};
use crate::pathfinding::{find_path, find_work_path};
use crate::store::{EntityId, EntityStore};
use crate::tasks::{release_task, TaskQueue};
use crate::terrain::{TileCoord, TileGrid};
use bevy_ecs::prelude::*;

use super::gnomes_in_state;

/// Invalidate the task cache when tasks appear or vanish behind its back.
pub fn task_queue_sync_system(
    added: Query<(), Added<Task>>,
    mut removed: RemovedComponents<Task>,
    mut queue: ResMut<TaskQueue>,
) {
    let removed_any = removed.read().count() > 0;
    if removed_any || !added.is_empty() {
        queue.invalidate();
    }
}

/// Where a gnome has to go to work on `task`.
fn destination(world: &World, task: &Task) -> TileCoord {
    match task.kind {
        TaskKind::Dig => task.target(),
        TaskKind::Collect => task
            .target_entity
            .and_then(|item| world.component::<Position>(item))
            .map_or(task.target(), Position::cell),
    }
}

/// Put back tasks whose claimed gnome no longer holds them.
fn release_orphaned_tasks(world: &mut World) {
    let mut orphaned: Vec<(EntityId, EntityId)> = world
        .query::<(&EntityId, &Task)>()
        .iter(world)
        .filter_map(|(id, task)| {
            let gnome = task.assigned_gnome?;
            let holds = world
                .component::<Gnome>(gnome)
                .is_some_and(|g| g.current_task == Some(*id));
            (!holds).then_some((*id, gnome))
        })
        .collect();
    orphaned.sort_unstable();
    for (task_id, gnome_id) in orphaned {
        log::warn!("task {task_id} was claimed by {gnome_id}, which does not hold it");
        release_task(world, task_id);
    }
}

/// Assign pending tasks to idle gnomes.
pub fn task_assignment_system(world: &mut World) {
    release_orphaned_tasks(world);

    let config = world.resource::<SimConfig>().clone();
    if !world.resource::<SimTick>().every(config.assignment_interval) {
        return;
    }

    let idle: Vec<EntityId> = gnomes_in_state(world, GnomeState::Idle)
        .into_iter()
        .filter(|&id| world.component::<Gnome>(id).is_some_and(Gnome::is_idle))
        .collect();
    if idle.is_empty() {
        return;
    }

    TaskQueue::refresh(world);
    let ordered = world.resource::<TaskQueue>().ordered().to_vec();
    if ordered.is_empty() {
        return;
    }

    world.resource_scope(|world, grid: Mut<TileGrid>| {
        for gnome_id in idle {
            let Some(start) = world.component::<Position>(gnome_id).map(Position::cell) else {
                continue;
            };

            let mut attempts = 0;
            for &task_id in &ordered {
                let Some(task) = world.component::<Task>(task_id) else {
                    continue;
                };
                if !task.is_pending() {
                    continue;
                }
                if attempts >= config.max_path_attempts {
                    log::trace!("gnome {gnome_id} used its {attempts} path attempts");
                    break;
                }
                attempts += 1;

                let goal = destination(world, task);
                let limit = config.max_path_iterations;
                let path = match task.kind {
                    TaskKind::Dig => find_work_path(&*grid, start, goal, limit),
                    TaskKind::Collect => find_path(&*grid, start, goal, limit),
                };
                let Some(path) = path else {
                    continue;
                };

                world.update_component::<Task, _>(task_id, |task| Task {
                    assigned_gnome: Some(gnome_id),
                    ..task.clone()
                });
                world.update_component::<Gnome, _>(gnome_id, |gnome| {
                    let mut next = gnome.clone();
                    next.assign(task_id, path);
                    next
                });
                log::debug!("gnome {gnome_id} claimed task {task_id} at {goal:?}");
                break;
            }
        }
    });
}
