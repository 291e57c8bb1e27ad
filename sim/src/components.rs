//! ECS Components for the Burrow simulation.
//!
//! Components are pure data containers attached to entities.
//! All game logic lives in systems that query these components.
//!
//! Coordinates are in tile units with `y` growing downward, so "below" a
//! cell `(x, y)` is `(x, y + 1)`.

use crate::store::EntityId;
use crate::terrain::TileCoord;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

// ============================================================================
// SPATIAL COMPONENTS
// ============================================================================

/// Fractional world position in tile units.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Position resting exactly on a tile cell.
    pub fn at(cell: TileCoord) -> Self {
        Self::new(cell.x as f32, cell.y as f32)
    }

    /// The tile cell this position is closest to.
    pub fn cell(&self) -> TileCoord {
        TileCoord::new(self.x.round() as i32, self.y.round() as i32)
    }

    pub fn distance_to(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Velocity in tiles per tick.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub dx: f32,
    pub dy: f32,
}

impl Velocity {
    pub fn new(dx: f32, dy: f32) -> Self {
        Self { dx, dy }
    }
}

// ============================================================================
// TERRAIN COMPONENTS
// ============================================================================

/// Terrain classification of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TileKind {
    #[default]
    Air,
    Dirt,
    Grass,
    Stone,
    Bedrock,
}

impl TileKind {
    /// Solid tiles block movement and give support; only air is passable.
    #[inline]
    pub fn is_solid(self) -> bool {
        !matches!(self, TileKind::Air)
    }

    /// Whether gnomes can dig this kind at all (bedrock is permanent).
    pub fn is_mineable(self) -> bool {
        matches!(self, TileKind::Dirt | TileKind::Grass | TileKind::Stone)
    }

    /// Hit points of a fresh tile of this kind.
    pub fn base_durability(self) -> f32 {
        match self {
            TileKind::Air => 0.0,
            TileKind::Dirt => 100.0,
            TileKind::Grass => 60.0,
            TileKind::Stone => 250.0,
            TileKind::Bedrock => 10_000.0,
        }
    }

    /// Item dropped when a foreground tile of this kind is destroyed.
    pub fn drop_item(self) -> Option<ItemKind> {
        match self {
            TileKind::Dirt | TileKind::Grass => Some(ItemKind::Dirt),
            TileKind::Stone => Some(ItemKind::Stone),
            TileKind::Air | TileKind::Bedrock => None,
        }
    }

    /// Layout glyph used by [`crate::builder::WorldBuilder`].
    pub fn from_glyph(glyph: char) -> Option<Self> {
        match glyph {
            '.' => Some(TileKind::Air),
            'd' => Some(TileKind::Dirt),
            'g' => Some(TileKind::Grass),
            's' => Some(TileKind::Stone),
            'B' => Some(TileKind::Bedrock),
            _ => None,
        }
    }

    pub fn glyph(self) -> char {
        match self {
            TileKind::Air => '.',
            TileKind::Dirt => 'd',
            TileKind::Grass => 'g',
            TileKind::Stone => 's',
            TileKind::Bedrock => 'B',
        }
    }
}

/// A terrain tile: kind plus remaining hit points.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub kind: TileKind,
    pub durability: f32,
}

impl Tile {
    /// A fresh tile at full durability.
    pub fn new(kind: TileKind) -> Self {
        Self {
            kind,
            durability: kind.base_durability(),
        }
    }

    pub fn air() -> Self {
        Self::new(TileKind::Air)
    }

    /// The same tile after `amount` of wear; durability bottoms out at zero.
    pub fn worn(&self, amount: f32) -> Self {
        Self {
            kind: self.kind,
            durability: (self.durability - amount).max(0.0),
        }
    }

    pub fn is_depleted(&self) -> bool {
        self.durability <= 0.0
    }

    /// Percentage mined so far, capped at 99 so "complete" is only ever
    /// reported once the tile is actually gone.
    pub fn mined_percent(&self) -> u8 {
        let max = self.kind.base_durability();
        if max <= 0.0 {
            return 99;
        }
        let done = (max - self.durability) * 100.0 / max;
        done.clamp(0.0, 99.0) as u8
    }
}

impl Default for Tile {
    fn default() -> Self {
        Self::air()
    }
}

/// Grid cell a tile entity occupies. Tiles never move.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub fn coord(&self) -> TileCoord {
        TileCoord::new(self.x, self.y)
    }
}

impl From<TileCoord> for TilePos {
    fn from(c: TileCoord) -> Self {
        Self { x: c.x, y: c.y }
    }
}

/// Which grid layer a tile belongs to.
///
/// Background tiles never block movement; they are decorative terrain that
/// can still be dug out (except permanent kinds) but never drop items.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TileLayer {
    #[default]
    Foreground,
    Background,
}

// ============================================================================
// GNOME COMPONENTS
// ============================================================================

/// Behavioral state of a gnome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GnomeState {
    /// No task, standing still.
    #[default]
    Idle,
    /// Following a path toward its task.
    Walking,
    /// Wearing down a tile.
    Mining,
    /// Picking up an item.
    Collecting,
    /// No support below; under gravity.
    Falling,
}

impl GnomeState {
    pub fn as_str(self) -> &'static str {
        match self {
            GnomeState::Idle => "Idle",
            GnomeState::Walking => "Walking",
            GnomeState::Mining => "Mining",
            GnomeState::Collecting => "Collecting",
            GnomeState::Falling => "Falling",
        }
    }
}

/// An autonomous worker.
#[derive(Component, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Gnome {
    pub state: GnomeState,
    #[serde(default)]
    pub current_task: Option<EntityId>,
    #[serde(default)]
    pub path: Vec<TileCoord>,
    #[serde(default)]
    pub path_index: usize,
    #[serde(default)]
    pub inventory: Vec<ItemKind>,
}

impl Gnome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        self.state == GnomeState::Idle && self.current_task.is_none()
    }

    /// Next waypoint still to be reached, if any.
    pub fn next_waypoint(&self) -> Option<TileCoord> {
        self.path.get(self.path_index).copied()
    }

    /// Start walking `path` for `task`.
    pub fn assign(&mut self, task: EntityId, path: Vec<TileCoord>) {
        self.current_task = Some(task);
        self.path = path;
        self.path_index = 0;
        self.state = GnomeState::Walking;
    }

    /// Drop task and path. A falling gnome keeps falling.
    pub fn clear_task(&mut self) {
        self.current_task = None;
        self.path.clear();
        self.path_index = 0;
        if self.state != GnomeState::Falling {
            self.state = GnomeState::Idle;
        }
    }
}

// ============================================================================
// TASK COMPONENTS
// ============================================================================

/// What a task asks a gnome to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    /// Dig out the tile at the target (foreground first, then background).
    Dig,
    /// Pick up the item referenced by `target_entity`.
    Collect,
}

/// Task urgency. Ordering is `Low < Normal < High < Urgent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum TaskPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

/// A unit of work waiting for, or held by, a gnome.
#[derive(Component, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub kind: TaskKind,
    pub target_x: i32,
    pub target_y: i32,
    #[serde(default)]
    pub target_entity: Option<EntityId>,
    #[serde(default)]
    pub priority: TaskPriority,
    /// Tick the task was issued on; FIFO tie-break within a priority.
    pub created_at: u64,
    #[serde(default)]
    pub assigned_gnome: Option<EntityId>,
    /// 0-100 completion percentage.
    #[serde(default)]
    pub progress: u8,
}

impl Task {
    pub fn dig(target: TileCoord, priority: TaskPriority, created_at: u64) -> Self {
        Self {
            kind: TaskKind::Dig,
            target_x: target.x,
            target_y: target.y,
            target_entity: None,
            priority,
            created_at,
            assigned_gnome: None,
            progress: 0,
        }
    }

    pub fn collect(item: EntityId, at: TileCoord, priority: TaskPriority, created_at: u64) -> Self {
        Self {
            kind: TaskKind::Collect,
            target_entity: Some(item),
            ..Self::dig(at, priority, created_at)
        }
    }

    pub fn target(&self) -> TileCoord {
        TileCoord::new(self.target_x, self.target_y)
    }

    pub fn is_pending(&self) -> bool {
        self.assigned_gnome.is_none()
    }
}

// ============================================================================
// ITEM COMPONENTS
// ============================================================================

/// Kind of a dropped item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Dirt,
    Stone,
}

/// A droppable item produced by mining. Falls until it lands.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub kind: ItemKind,
    #[serde(default)]
    pub is_grounded: bool,
}

impl Item {
    pub fn new(kind: ItemKind) -> Self {
        Self {
            kind,
            is_grounded: false,
        }
    }
}

// ============================================================================
// BUNDLE HELPERS
// ============================================================================

/// Bundle for spawning a gnome.
#[derive(Bundle, Default)]
pub struct GnomeBundle {
    pub position: Position,
    pub velocity: Velocity,
    pub gnome: Gnome,
}

impl GnomeBundle {
    pub fn at(cell: TileCoord) -> Self {
        Self {
            position: Position::at(cell),
            ..Self::default()
        }
    }
}

/// Bundle for spawning a tile.
#[derive(Bundle)]
pub struct TileBundle {
    pub tile: Tile,
    pub pos: TilePos,
    pub layer: TileLayer,
}

/// Bundle for spawning an item.
#[derive(Bundle)]
pub struct ItemBundle {
    pub position: Position,
    pub velocity: Velocity,
    pub item: Item,
}

impl ItemBundle {
    pub fn new(kind: ItemKind, cell: TileCoord) -> Self {
        Self {
            position: Position::at(cell),
            velocity: Velocity::default(),
            item: Item::new(kind),
        }
    }
}
