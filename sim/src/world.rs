//! Snapshot types.
//!
//! The `Snapshot` struct provides a serializable view of the simulation state
//! that a renderer can consume once per frame.

use crate::commands::{Camera, ControlState};
use crate::components::*;
use crate::store::EntityId;
use crate::terrain::{background_tile, foreground_tile, TerrainChanges, TileCoord};
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Snapshot of a single gnome's state for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GnomeSnapshot {
    pub id: EntityId,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub state: String,
    pub task: Option<EntityId>,
    pub carrying: usize,
}

/// Snapshot of a task, with progress for the dig overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: EntityId,
    pub kind: TaskKind,
    pub x: i32,
    pub y: i32,
    pub priority: TaskPriority,
    pub assigned: Option<EntityId>,
    pub progress: u8,
}

/// Snapshot of a dropped item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub id: EntityId,
    pub kind: ItemKind,
    pub x: f32,
    pub y: f32,
    pub grounded: bool,
}

/// A tile whose contents changed since the previous snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileChange {
    pub x: i32,
    pub y: i32,
    /// Foreground glyph after the change.
    pub foreground: char,
    /// Background glyph, if a background tile remains.
    pub background: Option<char>,
}

/// Complete simulation state snapshot for a renderer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Current simulation tick.
    pub tick: u64,
    /// All gnomes, by id.
    pub gnomes: Vec<GnomeSnapshot>,
    /// All tasks, in id order.
    pub tasks: Vec<TaskSnapshot>,
    /// All items, by id.
    pub items: Vec<ItemSnapshot>,
    /// Tiles changed since the last snapshot.
    pub changed_tiles: Vec<TileChange>,
    pub camera: Camera,
    pub paused: bool,
    pub speed: f32,
}

impl Snapshot {
    /// Create a snapshot from the ECS world, draining pending tile changes.
    pub fn from_world(world: &mut World, tick: u64) -> Self {
        let mut gnomes: Vec<GnomeSnapshot> = world
            .query::<(&EntityId, &Gnome, &Position, &Velocity)>()
            .iter(world)
            .map(|(id, gnome, pos, vel)| GnomeSnapshot {
                id: *id,
                x: pos.x,
                y: pos.y,
                vx: vel.dx,
                vy: vel.dy,
                state: gnome.state.as_str().to_string(),
                task: gnome.current_task,
                carrying: gnome.inventory.len(),
            })
            .collect();
        gnomes.sort_unstable_by_key(|g| g.id);

        let mut tasks: Vec<TaskSnapshot> = world
            .query::<(&EntityId, &Task)>()
            .iter(world)
            .map(|(id, task)| TaskSnapshot {
                id: *id,
                kind: task.kind,
                x: task.target_x,
                y: task.target_y,
                priority: task.priority,
                assigned: task.assigned_gnome,
                progress: task.progress,
            })
            .collect();
        tasks.sort_unstable_by_key(|t| t.id);

        let mut items: Vec<ItemSnapshot> = world
            .query::<(&EntityId, &Item, &Position)>()
            .iter(world)
            .map(|(id, item, pos)| ItemSnapshot {
                id: *id,
                kind: item.kind,
                x: pos.x,
                y: pos.y,
                grounded: item.is_grounded,
            })
            .collect();
        items.sort_unstable_by_key(|i| i.id);

        let changed: Vec<TileCoord> = world
            .get_resource_mut::<TerrainChanges>()
            .map(|mut changes| changes.drain())
            .unwrap_or_default();
        let changed_tiles = changed
            .into_iter()
            .map(|at| TileChange {
                x: at.x,
                y: at.y,
                foreground: foreground_tile(world, at)
                    .map_or(' ', |(_, tile)| tile.kind.glyph()),
                background: background_tile(world, at)
                    .map(|(_, tile)| tile.kind.glyph()),
            })
            .collect();

        let control = world.get_resource::<ControlState>().cloned().unwrap_or_default();

        Self {
            tick,
            gnomes,
            tasks,
            items,
            changed_tiles,
            camera: control.camera,
            paused: control.paused,
            speed: control.speed,
        }
    }

    /// Serialize snapshot to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize snapshot to pretty JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
