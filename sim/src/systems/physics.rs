//! Gravity for gnomes and items.
//!
//! Bodies fall straight down their column. Vertical speed grows by
//! `gravity` each tick up to `terminal_velocity`, which stays below one tile
//! per tick, so checking the row under the body every tick is enough to
//! never tunnel through a solid tile.

use crate::components::{Gnome, GnomeState, Item, Position, Task, Velocity};
use crate::config::SimConfig;
use crate::store::{EntityId, EntityRegistry};
use crate::terrain::{Solidity, TileCoord, TileGrid};
use bevy_ecs::prelude::*;

/// Integrate one tick of free fall. Returns `true` on landing.
fn integrate_fall(grid: &TileGrid, config: &SimConfig, pos: &mut Position, vel: &mut Velocity) -> bool {
    vel.dx = 0.0;
    vel.dy = (vel.dy + config.gravity).min(config.terminal_velocity);
    pos.y += vel.dy;

    let row = pos.y.floor();
    let column = pos.x.round() as i32;
    if grid.is_solid(TileCoord::new(column, row as i32 + 1)) {
        pos.y = row;
        vel.dy = 0.0;
        return true;
    }
    false
}

/// The grid cell `pos` sits on, if it is aligned with one.
fn resting_cell(pos: &Position, epsilon: f32) -> Option<TileCoord> {
    let cell = pos.cell();
    ((pos.x - cell.x as f32).abs() <= epsilon && (pos.y - cell.y as f32).abs() <= epsilon)
        .then_some(cell)
}

/// Whether the walking gnome's next distinct waypoint is a planned drop.
fn descending(gnome: &Gnome, cell: TileCoord) -> bool {
    gnome
        .path
        .iter()
        .skip(gnome.path_index)
        .find(|&&waypoint| waypoint != cell)
        .is_some_and(|&next| next == cell.below())
}

/// Start and integrate gnome falls.
///
/// A gnome losing its support drops its task (the task stays queued with
/// its priority and timestamp) and falls until it lands, then goes Idle.
/// Walking gnomes are only checked while resting on a waypoint, and not when
/// the path itself drops from that waypoint.
pub fn gnome_physics_system(
    grid: Res<TileGrid>,
    config: Res<SimConfig>,
    registry: Res<EntityRegistry>,
    mut gnomes: Query<(&EntityId, &mut Gnome, &mut Position, &mut Velocity)>,
    mut tasks: Query<&mut Task>,
) {
    for (id, mut gnome, mut pos, mut vel) in gnomes.iter_mut() {
        if gnome.state != GnomeState::Falling {
            let cell = if gnome.state == GnomeState::Walking {
                match resting_cell(&pos, config.waypoint_epsilon) {
                    Some(cell) if !descending(&gnome, cell) => cell,
                    _ => continue,
                }
            } else {
                pos.cell()
            };
            if grid.is_supported(cell) {
                continue;
            }

            if let Some(task_id) = gnome.current_task {
                let task = registry.resolve(task_id).and_then(|e| tasks.get_mut(e).ok());
                if let Some(mut task) = task {
                    if task.assigned_gnome == Some(*id) {
                        task.assigned_gnome = None;
                    }
                }
                log::debug!("gnome {id} lost its footing, releasing task {task_id}");
            }
            gnome.clear_task();
            gnome.state = GnomeState::Falling;
            pos.x = cell.x as f32;
            vel.dy = 0.0;
        }

        if integrate_fall(&grid, &config, &mut pos, &mut vel) {
            gnome.state = GnomeState::Idle;
            log::trace!("gnome {id} landed at {:?}", pos.cell());
        }
    }
}

/// Gravity for dropped items. A grounded item whose support disappears
/// starts falling again.
pub fn item_physics_system(
    grid: Res<TileGrid>,
    config: Res<SimConfig>,
    mut items: Query<(&mut Item, &mut Position, &mut Velocity)>,
) {
    for (mut item, mut pos, mut vel) in items.iter_mut() {
        if item.is_grounded {
            if grid.is_supported(pos.cell()) {
                continue;
            }
            item.is_grounded = false;
        }
        if integrate_fall(&grid, &config, &mut pos, &mut vel) {
            item.is_grounded = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{GnomeBundle, ItemBundle, ItemKind, TaskPriority};
    use crate::store::EntityStore;
    use crate::tasks::spawn_task;

    /// Open column over a floor at row 9.
    fn shaft_world() -> World {
        let width = 3;
        let height = 10;
        let cells = (width * height) as usize;
        let solid = (0..cells).map(|i| i as i32 / width == height - 1).collect();
        let ids = (0..cells as u64).map(EntityId).collect();
        let mut world = World::new();
        world.insert_resource(TileGrid::new(width, height, ids, solid).unwrap());
        world.insert_resource(SimConfig::default());
        world.insert_resource(EntityRegistry::starting_at(cells as u64));
        world
    }

    fn run<M>(world: &mut World, system: impl IntoSystemConfigs<M>, ticks: usize) {
        let mut schedule = Schedule::default();
        schedule.add_systems(system);
        for _ in 0..ticks {
            schedule.run(world);
        }
    }

    #[test]
    fn test_fall_accelerates_to_terminal_and_lands() {
        let mut world = shaft_world();
        let gnome = world.spawn_bundle(GnomeBundle::at(TileCoord::new(1, 0)));
        let config = SimConfig::default();

        let mut schedule = Schedule::default();
        schedule.add_systems(gnome_physics_system);
        let mut last_dy = 0.0;
        let mut landed = false;
        for _ in 0..60 {
            schedule.run(&mut world);
            let vel = *world.component::<Velocity>(gnome).unwrap();
            assert!(vel.dy <= config.terminal_velocity);
            let state = world.component::<Gnome>(gnome).unwrap().state;
            if state == GnomeState::Idle {
                landed = true;
                break;
            }
            assert!(vel.dy >= last_dy);
            last_dy = vel.dy;
        }

        assert!(landed);
        let pos = world.component::<Position>(gnome).unwrap();
        assert_eq!(pos.y, 8.0);
        assert_eq!(pos.x, 1.0);
        assert_eq!(world.component::<Velocity>(gnome).unwrap().dy, 0.0);
    }

    #[test]
    fn test_supported_gnome_stays_put() {
        let mut world = shaft_world();
        let gnome = world.spawn_bundle(GnomeBundle::at(TileCoord::new(1, 8)));

        run(&mut world, gnome_physics_system, 5);

        let g = world.component::<Gnome>(gnome).unwrap();
        assert_eq!(g.state, GnomeState::Idle);
        assert_eq!(world.component::<Position>(gnome).unwrap().y, 8.0);
    }

    #[test]
    fn test_fall_releases_task() {
        let mut world = shaft_world();
        let task = spawn_task(&mut world, Task::dig(TileCoord::new(2, 9), TaskPriority::Normal, 0));
        let gnome = world.spawn_bundle(GnomeBundle::at(TileCoord::new(1, 3)));
        world.update_component::<Gnome, _>(gnome, |g| {
            let mut g = g.clone();
            g.assign(task, vec![TileCoord::new(1, 3)]);
            g.state = GnomeState::Mining;
            g
        });
        world.update_component::<Task, _>(task, |t| Task {
            assigned_gnome: Some(gnome),
            ..t.clone()
        });

        run(&mut world, gnome_physics_system, 1);

        let g = world.component::<Gnome>(gnome).unwrap();
        assert_eq!(g.state, GnomeState::Falling);
        assert_eq!(g.current_task, None);
        assert!(world.component::<Task>(task).unwrap().is_pending());
    }

    #[test]
    fn test_walking_gnome_follows_planned_drop() {
        let mut world = shaft_world();
        let gnome = world.spawn_bundle(GnomeBundle::at(TileCoord::new(1, 3)));
        world.update_component::<Gnome, _>(gnome, |g| {
            let mut g = g.clone();
            g.assign(EntityId(500), vec![TileCoord::new(1, 3), TileCoord::new(1, 4)]);
            g.path_index = 1;
            g
        });

        run(&mut world, gnome_physics_system, 1);

        assert_eq!(world.component::<Gnome>(gnome).unwrap().state, GnomeState::Walking);
    }

    #[test]
    fn test_item_lands_and_regrounds() {
        let mut world = shaft_world();
        let item = world.spawn_bundle(ItemBundle::new(ItemKind::Dirt, TileCoord::new(0, 2)));

        run(&mut world, item_physics_system, 40);

        assert!(world.component::<Item>(item).unwrap().is_grounded);
        assert_eq!(world.component::<Position>(item).unwrap().y, 8.0);

        // Pull the floor away under it.
        world.resource_mut::<TileGrid>().set_solid(TileCoord::new(0, 9), false);
        run(&mut world, item_physics_system, 1);
        assert!(!world.component::<Item>(item).unwrap().is_grounded);
    }
}
