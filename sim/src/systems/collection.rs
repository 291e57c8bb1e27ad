//! Collection system - gnomes pick up dropped items.

use crate::components::{Gnome, GnomeState, Item, Position, Task, TaskKind};
use crate::config::SimConfig;
use crate::store::{EntityId, EntityStore};
use crate::tasks::{clear_gnome_task, release_task, remove_task};
use bevy_ecs::prelude::*;

use super::{gnomes_in_state, reset_gnome};

pub fn collection_system(world: &mut World) {
    let reach = world.resource::<SimConfig>().reach_distance;
    for gnome_id in gnomes_in_state(world, GnomeState::Collecting) {
        collect(world, gnome_id, reach);
    }
}

fn collect(world: &mut World, gnome_id: EntityId, reach: f32) {
    let Some((task_id, here)) = world
        .component::<Gnome>(gnome_id)
        .and_then(|g| g.current_task)
        .zip(world.component::<Position>(gnome_id).copied())
    else {
        log::warn!("gnome {gnome_id} is collecting without a task");
        reset_gnome(world, gnome_id);
        return;
    };
    let Some(task) = world.component::<Task>(task_id).cloned() else {
        log::warn!("gnome {gnome_id} is collecting dangling task {task_id}");
        reset_gnome(world, gnome_id);
        return;
    };
    if task.kind != TaskKind::Collect {
        log::warn!("gnome {gnome_id} is collecting non-pickup task {task_id}");
        reset_gnome(world, gnome_id);
        return;
    }

    let target = task.target_entity.and_then(|item_id| {
        let item = world.component::<Item>(item_id)?;
        let pos = world.component::<Position>(item_id)?;
        Some((item_id, item.kind, *pos))
    });
    let Some((item_id, kind, there)) = target else {
        log::trace!("item for task {task_id} is gone");
        remove_task(world, task_id);
        return;
    };

    if here.distance_to(&there) > reach {
        log::debug!("item {item_id} moved out of reach of gnome {gnome_id}");
        release_task(world, task_id);
        clear_gnome_task(world, gnome_id, task_id);
        return;
    }

    world.update_component::<Gnome, _>(gnome_id, |gnome| {
        let mut next = gnome.clone();
        next.inventory.push(kind);
        next
    });
    world.destroy_entity(item_id);
    remove_task(world, task_id);
    log::debug!("gnome {gnome_id} picked up {kind:?}");
}
