//! Mining system - gnomes wear down their dig targets.
//!
//! The foreground tile at the target is dug first; once it is air the
//! background tile (if any) becomes the target. A depleted foreground tile
//! turns into air and drops its item, a depleted background tile is removed
//! outright. Either way the task is finished and the gnome goes Idle.

use crate::components::{Gnome, GnomeState, ItemBundle, Task, TaskKind, Tile, TileKind};
use crate::config::SimConfig;
use crate::store::{EntityId, EntityStore};
use crate::tasks::remove_task;
use crate::terrain::{background_tile, foreground_tile, TerrainChanges, TileCoord, TileGrid};
use bevy_ecs::prelude::*;

use super::{gnomes_in_state, reset_gnome};

/// Outcome of one tick of digging.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Dig {
    /// Still working; carries the new progress percentage.
    Progress(u8),
    /// The tile is gone.
    Destroyed,
    /// Nothing (left) to dig here.
    Nothing,
}

pub fn mining_system(world: &mut World) {
    let rate = world.resource::<SimConfig>().mine_rate;
    for gnome_id in gnomes_in_state(world, GnomeState::Mining) {
        mine(world, gnome_id, rate);
    }
}

fn mine(world: &mut World, gnome_id: EntityId, rate: f32) {
    let Some(task_id) = world.component::<Gnome>(gnome_id).and_then(|g| g.current_task) else {
        log::warn!("gnome {gnome_id} is mining without a task");
        reset_gnome(world, gnome_id);
        return;
    };
    let Some((kind, at)) = world
        .component::<Task>(task_id)
        .map(|task| (task.kind, task.target()))
    else {
        log::warn!("gnome {gnome_id} is mining dangling task {task_id}");
        reset_gnome(world, gnome_id);
        return;
    };
    if kind != TaskKind::Dig {
        log::warn!("gnome {gnome_id} is mining non-dig task {task_id}");
        reset_gnome(world, gnome_id);
        return;
    }

    match dig_at(world, at, rate) {
        Dig::Progress(progress) => {
            world.update_component::<Task, _>(task_id, |task| Task {
                progress,
                ..task.clone()
            });
        }
        Dig::Destroyed => {
            log::debug!("gnome {gnome_id} finished digging {at:?}");
            remove_task(world, task_id);
        }
        Dig::Nothing => {
            log::trace!("dig target {at:?} already clear");
            remove_task(world, task_id);
        }
    }
}

/// Apply one tick of wear to whatever is diggable at `at`.
fn dig_at(world: &mut World, at: TileCoord, rate: f32) -> Dig {
    let boundary = world.resource::<TileGrid>().is_boundary(at);

    if let Some((id, tile)) = foreground_tile(world, at) {
        if tile.kind != TileKind::Air {
            if boundary || !tile.kind.is_mineable() {
                return Dig::Nothing;
            }
            let worn = tile.worn(rate);
            if !worn.is_depleted() {
                world.add_component(id, worn);
                return Dig::Progress(worn.mined_percent());
            }
            destroy_foreground(world, id, tile, at);
            return Dig::Destroyed;
        }
    }

    match background_tile(world, at) {
        Some((id, tile)) if !boundary && tile.kind.is_mineable() => {
            let worn = tile.worn(rate);
            if !worn.is_depleted() {
                world.add_component(id, worn);
                return Dig::Progress(worn.mined_percent());
            }
            world.resource_mut::<TileGrid>().set_background(at, None);
            world.destroy_entity(id);
            world.resource_mut::<TerrainChanges>().mark(at);
            Dig::Destroyed
        }
        _ => Dig::Nothing,
    }
}

fn destroy_foreground(world: &mut World, id: EntityId, tile: Tile, at: TileCoord) {
    world.add_component(id, Tile::air());
    world.resource_mut::<TileGrid>().set_solid(at, false);
    world.resource_mut::<TerrainChanges>().mark(at);
    if let Some(kind) = tile.kind.drop_item() {
        let item = world.spawn_bundle(ItemBundle::new(kind, at));
        log::trace!("dropped {kind:?} item {item} at {at:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{GnomeBundle, Item, ItemKind, TaskPriority, TileBundle, TileLayer, TilePos};
    use crate::tasks::{spawn_task, TaskQueue};
    use crate::terrain::{rebuild_grid, Solidity};

    /// 5x4 world: air on top, `kind` at (2, 2), stone everywhere else below.
    fn world_with(kind: TileKind, background: Option<TileKind>) -> World {
        let mut world = World::new();
        for y in 0..4 {
            for x in 0..5 {
                let tile_kind = match (x, y) {
                    (2, 2) => kind,
                    (_, 0) | (_, 1) => TileKind::Air,
                    _ => TileKind::Stone,
                };
                world.spawn_bundle(TileBundle {
                    tile: Tile::new(tile_kind),
                    pos: TilePos { x, y },
                    layer: TileLayer::Foreground,
                });
            }
        }
        if let Some(kind) = background {
            world.spawn_bundle(TileBundle {
                tile: Tile::new(kind),
                pos: TilePos { x: 2, y: 2 },
                layer: TileLayer::Background,
            });
        }
        let grid = rebuild_grid(&mut world, 5, 4).unwrap();
        world.insert_resource(grid);
        world.insert_resource(SimConfig::default());
        world.init_resource::<TerrainChanges>();
        world.init_resource::<TaskQueue>();
        world
    }

    fn miner(world: &mut World, target: TileCoord) -> (EntityId, EntityId) {
        let task = spawn_task(world, Task::dig(target, TaskPriority::Normal, 0));
        let gnome = world.spawn_bundle(GnomeBundle::at(TileCoord::new(2, 1)));
        world.update_component::<Gnome, _>(gnome, |g| {
            let mut g = g.clone();
            g.assign(task, Vec::new());
            g.state = GnomeState::Mining;
            g
        });
        world.update_component::<Task, _>(task, |t| Task {
            assigned_gnome: Some(gnome),
            ..t.clone()
        });
        (gnome, task)
    }

    fn items(world: &mut World) -> Vec<Item> {
        world.query::<&Item>().iter(world).copied().collect()
    }

    #[test]
    fn test_dirt_mined_in_ten_ticks() {
        let mut world = world_with(TileKind::Dirt, None);
        let target = TileCoord::new(2, 2);
        let (gnome, task) = miner(&mut world, target);

        for tick in 1..10 {
            mining_system(&mut world);
            assert_eq!(world.component::<Task>(task).unwrap().progress, (tick * 10) as u8);
        }
        assert!(world.resource::<TileGrid>().is_solid(target));

        mining_system(&mut world);

        assert!(!world.contains_entity(task));
        assert!(world.resource::<TileGrid>().is_walkable(target));
        assert_eq!(foreground_tile(&world, target).unwrap().1.kind, TileKind::Air);
        assert_eq!(items(&mut world), vec![Item::new(ItemKind::Dirt)]);
        let g = world.component::<Gnome>(gnome).unwrap();
        assert_eq!(g.state, GnomeState::Idle);
        assert_eq!(g.current_task, None);
    }

    #[test]
    fn test_completion_happens_once() {
        let mut world = world_with(TileKind::Grass, None);
        miner(&mut world, TileCoord::new(2, 2));

        for _ in 0..30 {
            mining_system(&mut world);
        }

        assert_eq!(items(&mut world).len(), 1);
        assert_eq!(world.resource_mut::<TerrainChanges>().drain(), vec![TileCoord::new(2, 2)]);
    }

    #[test]
    fn test_progress_caps_below_complete() {
        let mut world = world_with(TileKind::Dirt, None);
        world.resource_mut::<SimConfig>().mine_rate = 99.5;
        let (_, task) = miner(&mut world, TileCoord::new(2, 2));

        mining_system(&mut world);

        assert_eq!(world.component::<Task>(task).unwrap().progress, 99);
    }

    #[test]
    fn test_air_target_completes_without_drop() {
        let mut world = world_with(TileKind::Air, None);
        let (gnome, task) = miner(&mut world, TileCoord::new(2, 2));

        mining_system(&mut world);

        assert!(!world.contains_entity(task));
        assert!(items(&mut world).is_empty());
        assert!(world.component::<Gnome>(gnome).unwrap().is_idle());
        assert!(world.resource::<TerrainChanges>().is_empty());
    }

    #[test]
    fn test_bedrock_is_left_alone() {
        let mut world = world_with(TileKind::Bedrock, None);
        let (_, task) = miner(&mut world, TileCoord::new(2, 2));

        mining_system(&mut world);

        assert!(!world.contains_entity(task));
        let (_, tile) = foreground_tile(&world, TileCoord::new(2, 2)).unwrap();
        assert_eq!(tile, Tile::new(TileKind::Bedrock));
    }

    #[test]
    fn test_boundary_is_left_alone() {
        let mut world = world_with(TileKind::Dirt, None);
        let (_, task) = miner(&mut world, TileCoord::new(2, 3));

        mining_system(&mut world);

        assert!(!world.contains_entity(task));
        assert!(world.resource::<TileGrid>().is_solid(TileCoord::new(2, 3)));
    }

    #[test]
    fn test_background_dug_after_foreground_without_drop() {
        let mut world = world_with(TileKind::Air, Some(TileKind::Grass));
        let target = TileCoord::new(2, 2);
        let (gnome, task) = miner(&mut world, target);
        let background = world.resource::<TileGrid>().background(target).unwrap();

        for _ in 0..6 {
            mining_system(&mut world);
        }

        assert!(!world.contains_entity(task));
        assert!(!world.contains_entity(background));
        assert_eq!(world.resource::<TileGrid>().background(target), None);
        assert!(items(&mut world).is_empty());
        assert!(world.component::<Gnome>(gnome).unwrap().is_idle());
    }

    #[test]
    fn test_foreground_takes_priority_over_background() {
        let mut world = world_with(TileKind::Dirt, Some(TileKind::Grass));
        let target = TileCoord::new(2, 2);
        miner(&mut world, target);

        mining_system(&mut world);

        let (_, background) = background_tile(&world, target).unwrap();
        assert_eq!(background, Tile::new(TileKind::Grass));
        let (_, foreground) = foreground_tile(&world, target).unwrap();
        assert_eq!(foreground.durability, 90.0);
    }

    #[test]
    fn test_dangling_task_resets_gnome() {
        let mut world = world_with(TileKind::Dirt, None);
        let (gnome, task) = miner(&mut world, TileCoord::new(2, 2));
        world.destroy_entity(task);

        mining_system(&mut world);

        assert!(world.component::<Gnome>(gnome).unwrap().is_idle());
    }
}
