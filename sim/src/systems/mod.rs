//! ECS Systems for the Burrow simulation.
//!
//! Systems contain the game logic that operates on components.
//!
//! ## Stage Order
//!
//! Each tick runs the stages below in order, every system in a stage
//! chained on a single-threaded executor:
//!
//! **Physics** - bodies and paths:
//! - `terrain_sync_system` - Refreshes the solidity mask from changed tiles
//! - `gnome_physics_system` - Fall detection and gravity for gnomes
//! - `movement_system` - Path following for walking gnomes
//!
//! **Assignment** - matching idle gnomes to work (throttled):
//! - `task_queue_sync_system` - Invalidates the task cache on raw ECS edits
//! - `task_assignment_system` - Pathfinds idle gnomes onto pending tasks
//!
//! **Work** - task execution:
//! - `mining_system` - Wears down dig targets
//! - `collection_system` - Picks up items
//!
//! **Ancillary** - everything that reacts to work:
//! - `item_physics_system` - Gravity for dropped items
//! - `terrain_sync_system`
//!
//! Exclusive systems that touch several entities walk them in `EntityId`
//! order so a tick is reproducible.

pub mod assignment;
pub mod collection;
pub mod mining;
pub mod movement;
pub mod physics;
pub mod terrain_sync;

pub use assignment::*;
pub use collection::*;
pub use mining::*;
pub use movement::*;
pub use physics::*;
pub use terrain_sync::*;

use crate::components::{Gnome, GnomeState};
use crate::store::{EntityId, EntityStore};
use crate::tasks::halt_gnome;
use bevy_ecs::prelude::*;

/// Ids of every gnome currently in `state`, ascending.
pub(crate) fn gnomes_in_state(world: &mut World, state: GnomeState) -> Vec<EntityId> {
    let mut ids: Vec<EntityId> = world
        .query::<(&EntityId, &Gnome)>()
        .iter(world)
        .filter(|(_, gnome)| gnome.state == state)
        .map(|(id, _)| *id)
        .collect();
    ids.sort_unstable();
    ids
}

/// Drop whatever a gnome was doing after an inconsistency was found.
pub(crate) fn reset_gnome(world: &mut World, gnome_id: EntityId) {
    world.update_component::<Gnome, _>(gnome_id, |gnome| {
        let mut next = gnome.clone();
        next.clear_task();
        next
    });
    halt_gnome(world, gnome_id);
}
