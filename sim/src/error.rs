//! Error type for the fallible edges of the simulation: world construction,
//! spawning and persistence. Per-tick work never fails; see the systems.

use crate::store::EntityId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("layout row {row} is {found} tiles wide, expected {expected}")]
    RaggedLayout {
        row: usize,
        found: usize,
        expected: usize,
    },

    #[error("unknown glyph {glyph:?} at ({x}, {y})")]
    UnknownGlyph { glyph: char, x: i32, y: i32 },

    #[error("background layer is {found_width}x{found_height}, world is {width}x{height}")]
    LayerMismatch {
        width: i32,
        height: i32,
        found_width: i32,
        found_height: i32,
    },

    #[error("world must be at least 3x3, got {width}x{height}")]
    WorldTooSmall { width: i32, height: i32 },

    #[error("({x}, {y}) is outside the world")]
    OutOfBounds { x: i32, y: i32 },

    #[error("({x}, {y}) is solid")]
    Blocked { x: i32, y: i32 },

    #[error("no foreground tile at ({x}, {y})")]
    MissingTile { x: i32, y: i32 },

    #[error("entity {0} appears twice in the {1} table")]
    DuplicateEntity(EntityId, &'static str),

    #[error("entity id {id} is out of range (next id {next})")]
    EntityIdOutOfRange { id: u64, next: u64 },

    #[error("unsupported save version {0}")]
    UnsupportedVersion(u32),
}

pub type SimResult<T> = Result<T, SimError>;
