//! Keeps the grid's solidity mask in step with `Tile` components.

use crate::components::{Tile, TileLayer, TilePos};
use crate::store::EntityId;
use crate::terrain::{TerrainChanges, TileGrid};
use bevy_ecs::prelude::*;

/// Refresh the solidity mask for tiles changed since the last run.
///
/// Freshly spawned tiles are skipped: whoever spawned them indexed them.
pub fn terrain_sync_system(
    mut grid: ResMut<TileGrid>,
    mut changes: ResMut<TerrainChanges>,
    tiles: Query<(&EntityId, Ref<Tile>, &TilePos, &TileLayer), Changed<Tile>>,
) {
    for (id, tile, pos, layer) in tiles.iter() {
        if tile.is_added() {
            continue;
        }
        let at = pos.coord();
        if *layer == TileLayer::Foreground && grid.foreground(at) == Some(*id) {
            grid.set_solid(at, tile.kind.is_solid());
        }
        changes.mark(at);
    }
}
