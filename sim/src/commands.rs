//! Player commands and the control state they drive.
//!
//! Commands are plain serializable values so a host can queue them, send
//! them over the wire or replay them. Applying one never fails: invalid
//! targets (out of bounds, on the world boundary, not diggable, already
//! designated) are skipped and the return value counts what actually
//! changed.

use crate::components::{Item, Position, Task, TaskPriority, TileKind};
use crate::config::SimTick;
use crate::store::{EntityId, EntityStore};
use crate::tasks::{remove_task, spawn_task, TaskKey, TaskQueue};
use crate::terrain::{background_tile, foreground_tile, Solidity, TileCoord, TileGrid};
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Slowest allowed speed multiplier.
pub const MIN_SPEED: f32 = 0.0625;
/// Fastest allowed speed multiplier.
pub const MAX_SPEED: f32 = 16.0;
pub const MIN_ZOOM: f32 = 0.25;
pub const MAX_ZOOM: f32 = 8.0;

/// A player instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    /// Select tiles, replacing the selection unless `additive`.
    SelectTiles {
        tiles: Vec<TileCoord>,
        #[serde(default)]
        additive: bool,
    },
    ClearSelection,
    /// Designate tiles for digging.
    Dig {
        tiles: Vec<TileCoord>,
        #[serde(default)]
        priority: TaskPriority,
    },
    /// Designate the current selection for digging and clear it.
    DigSelected {
        #[serde(default)]
        priority: TaskPriority,
    },
    /// Cancel every task aimed at these tiles.
    Cancel { tiles: Vec<TileCoord> },
    CancelSelected,
    /// Order pickup of the items lying on these tiles.
    Collect {
        tiles: Vec<TileCoord>,
        #[serde(default)]
        priority: TaskPriority,
    },
    CollectSelected {
        #[serde(default)]
        priority: TaskPriority,
    },
    PanCamera { dx: f32, dy: f32 },
    /// Multiply the zoom level.
    Zoom { factor: f32 },
    SetSpeed { multiplier: f32 },
    TogglePause,
}

/// Render camera, in tile units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub x: f32,
    pub y: f32,
    pub zoom: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

/// Player-side state: selection, camera, speed and pause.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlState {
    pub selection: BTreeSet<TileCoord>,
    pub camera: Camera,
    /// Simulation speed multiplier, within `[MIN_SPEED, MAX_SPEED]`.
    pub speed: f32,
    pub paused: bool,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            selection: BTreeSet::new(),
            camera: Camera::default(),
            speed: 1.0,
            paused: false,
        }
    }
}

/// Apply a command to the world. Returns how many tiles, tasks or settings
/// it affected.
pub fn apply_command(world: &mut World, command: Command) -> usize {
    match command {
        Command::SelectTiles { tiles, additive } => select(world, tiles, additive),
        Command::ClearSelection => {
            let mut control = world.get_resource_or_insert_with(ControlState::default);
            let cleared = control.selection.len();
            control.selection.clear();
            cleared
        }
        Command::Dig { tiles, priority } => designate_digs(world, &tiles, priority),
        Command::DigSelected { priority } => {
            let tiles = take_selection(world);
            designate_digs(world, &tiles, priority)
        }
        Command::Cancel { tiles } => cancel(world, &tiles),
        Command::CancelSelected => {
            let tiles = take_selection(world);
            cancel(world, &tiles)
        }
        Command::Collect { tiles, priority } => designate_pickups(world, &tiles, priority),
        Command::CollectSelected { priority } => {
            let tiles = take_selection(world);
            designate_pickups(world, &tiles, priority)
        }
        Command::PanCamera { dx, dy } => {
            if !(dx.is_finite() && dy.is_finite()) {
                return 0;
            }
            let mut control = world.get_resource_or_insert_with(ControlState::default);
            control.camera.x += dx;
            control.camera.y += dy;
            1
        }
        Command::Zoom { factor } => {
            if !(factor.is_finite() && factor > 0.0) {
                return 0;
            }
            let mut control = world.get_resource_or_insert_with(ControlState::default);
            control.camera.zoom = (control.camera.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
            1
        }
        Command::SetSpeed { multiplier } => {
            if !(multiplier.is_finite() && multiplier > 0.0) {
                return 0;
            }
            let mut control = world.get_resource_or_insert_with(ControlState::default);
            control.speed = multiplier.clamp(MIN_SPEED, MAX_SPEED);
            1
        }
        Command::TogglePause => {
            let mut control = world.get_resource_or_insert_with(ControlState::default);
            control.paused = !control.paused;
            1
        }
    }
}

fn in_bounds(world: &World, at: TileCoord) -> bool {
    world
        .get_resource::<TileGrid>()
        .is_some_and(|grid| grid.in_bounds(at))
}

fn select(world: &mut World, tiles: Vec<TileCoord>, additive: bool) -> usize {
    let tiles: Vec<TileCoord> = tiles.into_iter().filter(|&at| in_bounds(world, at)).collect();
    let mut control = world.get_resource_or_insert_with(ControlState::default);
    if !additive {
        control.selection.clear();
    }
    tiles
        .into_iter()
        .filter(|&at| control.selection.insert(at))
        .count()
}

fn take_selection(world: &mut World) -> Vec<TileCoord> {
    let mut control = world.get_resource_or_insert_with(ControlState::default);
    std::mem::take(&mut control.selection).into_iter().collect()
}

/// Whether a dig order at `at` would have anything to do.
fn diggable(world: &World, at: TileCoord) -> bool {
    let Some(grid) = world.get_resource::<TileGrid>() else {
        return false;
    };
    if !grid.in_bounds(at) || grid.is_boundary(at) {
        return false;
    }
    match foreground_tile(world, at) {
        Some((_, tile)) if tile.kind != TileKind::Air => tile.kind.is_mineable(),
        _ => background_tile(world, at).is_some_and(|(_, tile)| tile.kind.is_mineable()),
    }
}

fn designate_digs(world: &mut World, tiles: &[TileCoord], priority: TaskPriority) -> usize {
    TaskQueue::refresh(world);
    let now = world.get_resource::<SimTick>().map_or(0, |tick| tick.0);
    let mut created = 0;
    for &at in tiles {
        if !diggable(world, at) {
            continue;
        }
        if world.resource::<TaskQueue>().lookup(&TaskKey::Dig(at)).is_some() {
            continue;
        }
        spawn_task(world, Task::dig(at, priority, now));
        created += 1;
    }
    if created > 0 {
        log::debug!("designated {created} tiles for digging");
    }
    created
}

fn designate_pickups(world: &mut World, tiles: &[TileCoord], priority: TaskPriority) -> usize {
    let wanted: BTreeSet<TileCoord> = tiles.iter().copied().collect();
    let mut items: Vec<(EntityId, TileCoord)> = world
        .query_filtered::<(&EntityId, &Position), With<Item>>()
        .iter(world)
        .map(|(id, pos)| (*id, pos.cell()))
        .filter(|(_, cell)| wanted.contains(cell))
        .collect();
    items.sort_unstable();

    TaskQueue::refresh(world);
    let now = world.get_resource::<SimTick>().map_or(0, |tick| tick.0);
    let mut created = 0;
    for (item, at) in items {
        if world.resource::<TaskQueue>().lookup(&TaskKey::Collect(item)).is_some() {
            continue;
        }
        spawn_task(world, Task::collect(item, at, priority, now));
        created += 1;
    }
    created
}

fn cancel(world: &mut World, tiles: &[TileCoord]) -> usize {
    let wanted: BTreeSet<TileCoord> = tiles.iter().copied().collect();
    if wanted.is_empty() {
        return 0;
    }
    let mut doomed: Vec<EntityId> = world
        .query::<(&EntityId, &Task)>()
        .iter(world)
        .filter(|(_, task)| {
            let item_cell = task
                .target_entity
                .and_then(|item| world.component::<Position>(item))
                .map(Position::cell);
            wanted.contains(&task.target()) || item_cell.is_some_and(|c| wanted.contains(&c))
        })
        .map(|(id, _)| *id)
        .collect();
    doomed.sort_unstable();

    doomed
        .into_iter()
        .filter(|&task| remove_task(world, task))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::WorldBuilder;
    use crate::components::{Gnome, GnomeBundle, GnomeState, ItemBundle, ItemKind};

    const LAYOUT: [&str; 6] = [
        "BBBBBBBB",
        "B......B",
        "B......B",
        "BddsBddB",
        "BddddddB",
        "BBBBBBBB",
    ];

    fn world() -> World {
        WorldBuilder::new(&LAYOUT).build_world().unwrap()
    }

    fn task_count(world: &mut World) -> usize {
        world.query::<&Task>().iter(world).count()
    }

    #[test]
    fn test_dig_filters_invalid_targets() {
        let mut world = world();
        let tiles = vec![
            TileCoord::new(1, 3),  // dirt
            TileCoord::new(3, 3),  // stone
            TileCoord::new(4, 3),  // bedrock
            TileCoord::new(2, 1),  // air
            TileCoord::new(0, 4),  // boundary
            TileCoord::new(40, 4), // out of bounds
            TileCoord::new(1, 3),  // duplicate
        ];

        let created = apply_command(&mut world, Command::Dig { tiles, priority: TaskPriority::High });

        assert_eq!(created, 2);
        assert_eq!(task_count(&mut world), 2);
    }

    #[test]
    fn test_dig_twice_is_deduplicated() {
        let mut world = world();
        let dig = Command::Dig {
            tiles: vec![TileCoord::new(2, 4)],
            priority: TaskPriority::Normal,
        };
        assert_eq!(apply_command(&mut world, dig.clone()), 1);
        assert_eq!(apply_command(&mut world, dig), 0);
    }

    #[test]
    fn test_selection_flow() {
        let mut world = world();
        let select = Command::SelectTiles {
            tiles: vec![TileCoord::new(1, 3), TileCoord::new(2, 3), TileCoord::new(99, 0)],
            additive: false,
        };
        assert_eq!(apply_command(&mut world, select), 2);
        let more = Command::SelectTiles {
            tiles: vec![TileCoord::new(2, 3), TileCoord::new(5, 4)],
            additive: true,
        };
        assert_eq!(apply_command(&mut world, more), 1);

        let created = apply_command(&mut world, Command::DigSelected { priority: TaskPriority::Low });

        assert_eq!(created, 3);
        assert!(world.resource::<ControlState>().selection.is_empty());
    }

    #[test]
    fn test_cancel_clears_owning_gnome() {
        let mut world = world();
        let at = TileCoord::new(2, 3);
        apply_command(&mut world, Command::Dig { tiles: vec![at], priority: TaskPriority::Normal });
        let task = world.resource::<TaskQueue>().lookup(&TaskKey::Dig(at)).unwrap();
        let gnome = world.spawn_bundle(GnomeBundle::at(TileCoord::new(2, 2)));
        world.update_component::<Gnome, _>(gnome, |g| {
            let mut g = g.clone();
            g.assign(task, vec![TileCoord::new(2, 2)]);
            g
        });
        world.update_component::<Task, _>(task, |t| Task {
            assigned_gnome: Some(gnome),
            ..t.clone()
        });

        assert_eq!(apply_command(&mut world, Command::Cancel { tiles: vec![at] }), 1);

        assert_eq!(task_count(&mut world), 0);
        let g = world.component::<Gnome>(gnome).unwrap();
        assert_eq!(g.state, GnomeState::Idle);
        assert_eq!(g.current_task, None);
    }

    #[test]
    fn test_collect_targets_items_on_tiles() {
        let mut world = world();
        let item = world.spawn_bundle(ItemBundle::new(ItemKind::Dirt, TileCoord::new(3, 2)));
        let tiles = vec![TileCoord::new(3, 2), TileCoord::new(5, 2)];

        let collect = Command::Collect {
            tiles,
            priority: TaskPriority::Normal,
        };

        assert_eq!(apply_command(&mut world, collect.clone()), 1);
        assert_eq!(apply_command(&mut world, collect), 0);
        assert!(world.resource::<TaskQueue>().lookup(&TaskKey::Collect(item)).is_some());
    }

    #[test]
    fn test_speed_zoom_and_pause() {
        let mut world = world();
        assert_eq!(apply_command(&mut world, Command::SetSpeed { multiplier: 100.0 }), 1);
        assert_eq!(world.resource::<ControlState>().speed, MAX_SPEED);
        assert_eq!(apply_command(&mut world, Command::SetSpeed { multiplier: -1.0 }), 0);
        assert_eq!(apply_command(&mut world, Command::Zoom { factor: 0.01 }), 1);
        assert_eq!(world.resource::<ControlState>().camera.zoom, MIN_ZOOM);
        apply_command(&mut world, Command::PanCamera { dx: 2.0, dy: -1.0 });
        assert_eq!(world.resource::<ControlState>().camera.x, 2.0);
        apply_command(&mut world, Command::TogglePause);
        assert!(world.resource::<ControlState>().paused);
    }

    #[test]
    fn test_command_json_shape() {
        let json = r#"{"type":"Dig","tiles":[{"x":3,"y":4}]}"#;
        let command: Command = serde_json::from_str(json).unwrap();
        assert_eq!(
            command,
            Command::Dig {
                tiles: vec![TileCoord::new(3, 4)],
                priority: TaskPriority::Normal,
            }
        );
    }
}
