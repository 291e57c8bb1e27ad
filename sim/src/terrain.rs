//! Tile grid - dense spatial index over the tile entities.
//!
//! Every in-bounds cell maps to exactly one foreground tile entity, and
//! optionally one background tile entity. Lookups are O(1) row-major
//! indexing. The grid also keeps a solidity mask mirroring the foreground
//! `Tile` components so pathfinding never has to touch the ECS; the mask is
//! refreshed by whoever mutates a tile (see `systems::terrain_sync`).

use crate::components::{Tile, TileLayer, TilePos};
use crate::store::{EntityId, EntityStore};
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Integer tile coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
}

impl TileCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// The cell directly below.
    #[inline]
    pub fn below(self) -> Self {
        self.offset(0, 1)
    }
}

/// Read-only solidity view used by pathfinding and physics.
pub trait Solidity {
    fn in_bounds(&self, at: TileCoord) -> bool;

    /// Whether the cell blocks movement. Out-of-bounds cells are solid so
    /// nothing can leave the grid.
    fn is_solid(&self, at: TileCoord) -> bool;

    #[inline]
    fn is_walkable(&self, at: TileCoord) -> bool {
        self.in_bounds(at) && !self.is_solid(at)
    }

    /// Whether something standing in `at` has solid ground directly below.
    #[inline]
    fn is_supported(&self, at: TileCoord) -> bool {
        self.is_solid(at.below())
    }

    /// Walkable and supported: somewhere a gnome can stand still.
    #[inline]
    fn is_standable(&self, at: TileCoord) -> bool {
        self.is_walkable(at) && self.is_supported(at)
    }
}

/// Dense tile lookup table plus solidity mask.
#[derive(Resource, Debug, Clone)]
pub struct TileGrid {
    width: i32,
    height: i32,
    foreground: Vec<EntityId>,
    background: Vec<Option<EntityId>>,
    solid: Vec<bool>,
}

impl TileGrid {
    /// Create a grid from row-major foreground ids and solidity.
    ///
    /// Returns `None` if the vectors do not match `width * height`.
    pub fn new(
        width: i32,
        height: i32,
        foreground: Vec<EntityId>,
        solid: Vec<bool>,
    ) -> Option<Self> {
        let cells = (width.max(0) as usize) * (height.max(0) as usize);
        if foreground.len() != cells || solid.len() != cells {
            return None;
        }
        Some(Self {
            width,
            height,
            foreground,
            background: vec![None; cells],
            solid,
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    #[inline]
    fn index(&self, at: TileCoord) -> Option<usize> {
        if self.in_bounds(at) {
            Some((at.y * self.width + at.x) as usize)
        } else {
            None
        }
    }

    /// Cells on the outer ring of the world. Never mineable.
    pub fn is_boundary(&self, at: TileCoord) -> bool {
        at.x == 0 || at.y == 0 || at.x == self.width - 1 || at.y == self.height - 1
    }

    /// Foreground tile entity at a cell.
    #[inline]
    pub fn foreground(&self, at: TileCoord) -> Option<EntityId> {
        self.index(at).map(|i| self.foreground[i])
    }

    /// Background tile entity at a cell, if any.
    #[inline]
    pub fn background(&self, at: TileCoord) -> Option<EntityId> {
        self.index(at).and_then(|i| self.background[i])
    }

    pub fn set_background(&mut self, at: TileCoord, id: Option<EntityId>) {
        if let Some(i) = self.index(at) {
            self.background[i] = id;
        }
    }

    /// Update the solidity mask for a foreground cell.
    pub fn set_solid(&mut self, at: TileCoord, solid: bool) {
        if let Some(i) = self.index(at) {
            self.solid[i] = solid;
        }
    }

    /// Iterate over every in-bounds cell, row by row.
    pub fn cells(&self) -> impl Iterator<Item = TileCoord> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| TileCoord::new(x, y)))
    }
}

impl Solidity for TileGrid {
    #[inline]
    fn in_bounds(&self, at: TileCoord) -> bool {
        at.x >= 0 && at.y >= 0 && at.x < self.width && at.y < self.height
    }

    #[inline]
    fn is_solid(&self, at: TileCoord) -> bool {
        self.index(at).map_or(true, |i| self.solid[i])
    }
}

/// Foreground tile at a cell, read through the grid.
pub fn foreground_tile(world: &World, at: TileCoord) -> Option<(EntityId, Tile)> {
    let id = world.get_resource::<TileGrid>()?.foreground(at)?;
    world.component::<Tile>(id).map(|tile| (id, *tile))
}

/// Background tile at a cell, read through the grid.
pub fn background_tile(world: &World, at: TileCoord) -> Option<(EntityId, Tile)> {
    let id = world.get_resource::<TileGrid>()?.background(at)?;
    world.component::<Tile>(id).map(|tile| (id, *tile))
}

/// Cells whose contents changed since the last render snapshot.
#[derive(Resource, Debug, Default, Clone)]
pub struct TerrainChanges {
    cells: BTreeSet<TileCoord>,
}

impl TerrainChanges {
    pub fn mark(&mut self, at: TileCoord) {
        self.cells.insert(at);
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Take every pending change, sorted by coordinate.
    pub fn drain(&mut self) -> Vec<TileCoord> {
        std::mem::take(&mut self.cells).into_iter().collect()
    }
}

/// Full terrain dump for renderers (initial load or after a reload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainSnapshot {
    pub width: i32,
    pub height: i32,
    /// Foreground kinds, row-major, as glyph bytes.
    pub foreground: Vec<u8>,
    /// Background kinds, row-major; `b' '` where there is none.
    pub background: Vec<u8>,
}

impl TerrainSnapshot {
    pub fn from_world(world: &World) -> Option<Self> {
        let grid = world.get_resource::<TileGrid>()?;
        let glyph = |id: Option<EntityId>| {
            id.and_then(|id| world.component::<Tile>(id))
                .map_or(b' ', |t| t.kind.glyph() as u8)
        };
        let foreground = grid.cells().map(|c| glyph(grid.foreground(c))).collect();
        let background = grid.cells().map(|c| glyph(grid.background(c))).collect();
        Some(Self {
            width: grid.width(),
            height: grid.height(),
            foreground,
            background,
        })
    }

    /// Foreground layer as text rows (debugging aid).
    pub fn rows(&self) -> Vec<String> {
        self.foreground
            .chunks(self.width.max(1) as usize)
            .map(|row| row.iter().map(|&b| b as char).collect())
            .collect()
    }
}

/// Rebuild a grid from the tile entities in a world.
///
/// Returns the first cell lacking a foreground tile on failure.
pub fn rebuild_grid(world: &mut World, width: i32, height: i32) -> Result<TileGrid, TileCoord> {
    let cells = (width.max(0) as usize) * (height.max(0) as usize);
    let mut foreground: Vec<Option<EntityId>> = vec![None; cells];
    let mut background: Vec<Option<EntityId>> = vec![None; cells];
    let mut solid = vec![true; cells];

    let mut query = world.query::<(&EntityId, &TilePos, &Tile, &TileLayer)>();
    for (id, pos, tile, layer) in query.iter(world) {
        let at = pos.coord();
        if at.x < 0 || at.y < 0 || at.x >= width || at.y >= height {
            continue;
        }
        let i = (at.y * width + at.x) as usize;
        match layer {
            TileLayer::Foreground => {
                foreground[i] = Some(*id);
                solid[i] = tile.kind.is_solid();
            }
            TileLayer::Background => background[i] = Some(*id),
        }
    }

    let mut ids = Vec::with_capacity(cells);
    for (i, id) in foreground.into_iter().enumerate() {
        match id {
            Some(id) => ids.push(id),
            None => {
                let x = i as i32 % width;
                let y = i as i32 / width;
                return Err(TileCoord::new(x, y));
            }
        }
    }

    let mut grid = TileGrid::new(width, height, ids, solid).ok_or(TileCoord::new(0, 0))?;
    grid.background = background;
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_from(rows: &[&str]) -> TileGrid {
        let height = rows.len() as i32;
        let width = rows[0].len() as i32;
        let solid: Vec<bool> = rows.iter().flat_map(|r| r.chars().map(|c| c == '#')).collect();
        let ids = (0..solid.len() as u64).map(EntityId).collect();
        TileGrid::new(width, height, ids, solid).unwrap()
    }

    #[test]
    fn test_grid_lookup() {
        let grid = grid_from(&["###", "#.#", "###"]);
        assert_eq!(grid.foreground(TileCoord::new(1, 1)), Some(EntityId(4)));
        assert_eq!(grid.foreground(TileCoord::new(3, 1)), None);
        assert!(grid.is_walkable(TileCoord::new(1, 1)));
        assert!(grid.is_supported(TileCoord::new(1, 1)));
    }

    #[test]
    fn test_out_of_bounds_is_solid() {
        let grid = grid_from(&["..", ".."]);
        assert!(grid.is_solid(TileCoord::new(-1, 0)));
        assert!(grid.is_solid(TileCoord::new(0, 2)));
        assert!(!grid.is_walkable(TileCoord::new(5, 5)));
        // Bottom row stands on the world floor.
        assert!(grid.is_supported(TileCoord::new(0, 1)));
    }

    #[test]
    fn test_boundary_ring() {
        let grid = grid_from(&["....", "....", "...."]);
        assert!(grid.is_boundary(TileCoord::new(0, 1)));
        assert!(grid.is_boundary(TileCoord::new(3, 1)));
        assert!(grid.is_boundary(TileCoord::new(1, 2)));
        assert!(!grid.is_boundary(TileCoord::new(1, 1)));
    }

    #[test]
    fn test_set_solid_updates_mask() {
        let mut grid = grid_from(&["###", "###", "###"]);
        grid.set_solid(TileCoord::new(1, 1), false);
        assert!(grid.is_walkable(TileCoord::new(1, 1)));
        // Out-of-bounds writes are ignored.
        grid.set_solid(TileCoord::new(9, 9), false);
    }

    #[test]
    fn test_mismatched_dimensions_rejected() {
        assert!(TileGrid::new(2, 2, vec![EntityId(0)], vec![true]).is_none());
    }

    #[test]
    fn test_changes_drain_sorted_and_deduped() {
        let mut changes = TerrainChanges::default();
        changes.mark(TileCoord::new(2, 1));
        changes.mark(TileCoord::new(1, 1));
        changes.mark(TileCoord::new(2, 1));
        assert_eq!(changes.drain(), vec![TileCoord::new(1, 1), TileCoord::new(2, 1)]);
        assert!(changes.is_empty());
    }
}
