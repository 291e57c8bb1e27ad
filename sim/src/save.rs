//! Save and load of the full simulation state.
//!
//! A save is one ordered `(EntityId, component)` list per component table,
//! plus the scalars needed to resume: tick, next id, grid size, config and
//! control state. Ids are stored verbatim so cross references (task to
//! gnome, gnome to task, task to item) survive the trip. The tile grid and
//! task cache are derived data and are rebuilt on load.

use crate::builder::{install_resources, MIN_WORLD_SIZE};
use crate::commands::ControlState;
use crate::components::{Gnome, Item, Position, Task, Tile, TileLayer, TilePos, Velocity};
use crate::config::{SimConfig, SimTick};
use crate::error::{SimError, SimResult};
use crate::store::{EntityId, EntityRegistry, EntityStore};
use crate::terrain::{rebuild_grid, TileGrid};
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Current save format version.
pub const SAVE_VERSION: u32 = 1;

/// Highest entity id a save may hand out. Ids index a dense slot table.
pub const MAX_SAVED_ENTITY_ID: u64 = 1 << 24;

/// Serializable simulation state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveState {
    pub version: u32,
    pub tick: u64,
    pub next_entity_id: u64,
    pub width: i32,
    pub height: i32,
    #[serde(default)]
    pub config: SimConfig,
    #[serde(default)]
    pub control: ControlState,
    pub tiles: Vec<(EntityId, Tile)>,
    pub tile_positions: Vec<(EntityId, TilePos)>,
    pub tile_layers: Vec<(EntityId, TileLayer)>,
    pub positions: Vec<(EntityId, Position)>,
    pub velocities: Vec<(EntityId, Velocity)>,
    pub gnomes: Vec<(EntityId, Gnome)>,
    #[serde(default)]
    pub tasks: Vec<(EntityId, Task)>,
    #[serde(default)]
    pub items: Vec<(EntityId, Item)>,
}

/// One component table, sorted by id.
fn table<C: Component + Clone>(world: &mut World) -> Vec<(EntityId, C)> {
    let mut rows: Vec<(EntityId, C)> = world
        .query::<(&EntityId, &C)>()
        .iter(world)
        .map(|(id, c)| (*id, c.clone()))
        .collect();
    rows.sort_unstable_by_key(|(id, _)| *id);
    rows
}

/// Attach a table's components, rejecting ids listed twice.
fn attach<C: Component + Clone>(
    world: &mut World,
    rows: &[(EntityId, C)],
    name: &'static str,
) -> SimResult<()> {
    let mut seen = BTreeSet::new();
    for (id, component) in rows {
        if !seen.insert(*id) {
            return Err(SimError::DuplicateEntity(*id, name));
        }
        world.add_component(*id, component.clone());
    }
    Ok(())
}

impl SaveState {
    /// Capture a world. A world without a tile grid saves as 0x0, which
    /// `restore` rejects.
    pub fn capture(world: &mut World) -> Self {
        let (width, height) = world
            .get_resource::<TileGrid>()
            .map_or((0, 0), |grid| (grid.width(), grid.height()));
        Self {
            version: SAVE_VERSION,
            tick: world.get_resource::<SimTick>().map_or(0, |t| t.0),
            next_entity_id: world.get_resource::<EntityRegistry>().map_or(0, |r| r.next_id()),
            width,
            height,
            config: world.get_resource::<SimConfig>().cloned().unwrap_or_default(),
            control: world.get_resource::<ControlState>().cloned().unwrap_or_default(),
            tiles: table(world),
            tile_positions: table(world),
            tile_layers: table(world),
            positions: table(world),
            velocities: table(world),
            gnomes: table(world),
            tasks: table(world),
            items: table(world),
        }
    }

    /// Rebuild a world from this save.
    pub fn restore(&self) -> SimResult<World> {
        if self.version != SAVE_VERSION {
            return Err(SimError::UnsupportedVersion(self.version));
        }
        if self.width < MIN_WORLD_SIZE || self.height < MIN_WORLD_SIZE {
            return Err(SimError::WorldTooSmall {
                width: self.width,
                height: self.height,
            });
        }

        let ids: BTreeSet<EntityId> = self
            .tiles
            .iter()
            .map(|(id, _)| *id)
            .chain(self.tile_positions.iter().map(|(id, _)| *id))
            .chain(self.tile_layers.iter().map(|(id, _)| *id))
            .chain(self.positions.iter().map(|(id, _)| *id))
            .chain(self.velocities.iter().map(|(id, _)| *id))
            .chain(self.gnomes.iter().map(|(id, _)| *id))
            .chain(self.tasks.iter().map(|(id, _)| *id))
            .chain(self.items.iter().map(|(id, _)| *id))
            .collect();
        if self.next_entity_id > MAX_SAVED_ENTITY_ID {
            return Err(SimError::EntityIdOutOfRange {
                id: self.next_entity_id,
                next: self.next_entity_id,
            });
        }
        if let Some(&EntityId(max)) = ids.last() {
            if max >= self.next_entity_id {
                return Err(SimError::EntityIdOutOfRange {
                    id: max,
                    next: self.next_entity_id,
                });
            }
        }

        let mut world = World::new();
        let mut registry = EntityRegistry::starting_at(self.next_entity_id);
        for &id in &ids {
            let entity = world.spawn(id).id();
            registry.bind(id, entity);
        }
        world.insert_resource(registry);

        attach(&mut world, &self.tiles, "tiles")?;
        attach(&mut world, &self.tile_positions, "tile_positions")?;
        attach(&mut world, &self.tile_layers, "tile_layers")?;
        attach(&mut world, &self.positions, "positions")?;
        attach(&mut world, &self.velocities, "velocities")?;
        attach(&mut world, &self.gnomes, "gnomes")?;
        attach(&mut world, &self.tasks, "tasks")?;
        attach(&mut world, &self.items, "items")?;

        let grid = rebuild_grid(&mut world, self.width, self.height)
            .map_err(|at| SimError::MissingTile { x: at.x, y: at.y })?;
        install_resources(
            &mut world,
            grid,
            self.config.clone(),
            SimTick(self.tick),
            self.control.clone(),
        );
        log::info!(
            "restored {}x{} world at tick {} with {} entities",
            self.width,
            self.height,
            self.tick,
            ids.len()
        );
        Ok(world)
    }

    pub fn to_json(&self) -> SimResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> SimResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
