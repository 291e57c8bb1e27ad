//! Builds a populated world from text layouts.
//!
//! Layouts are rows of glyphs, top row first:
//!
//! | glyph | foreground        | background |
//! |-------|-------------------|------------|
//! | `.`   | air               | none       |
//! | `d`   | dirt              | dirt       |
//! | `g`   | grass             | grass      |
//! | `s`   | stone             | stone      |
//! | `B`   | bedrock           | bedrock    |
//! | `G`   | air + gnome spawn | -          |
//!
//! Entities are created in a fixed order (foreground row-major, then
//! background, then gnomes) so the same layout always yields the same ids.

use crate::api::SimWorld;
use crate::commands::ControlState;
use crate::components::{GnomeBundle, Tile, TileBundle, TileKind, TileLayer, TilePos};
use crate::config::{SimConfig, SimTick};
use crate::error::{SimError, SimResult};
use crate::store::{EntityId, EntityRegistry, EntityStore};
use crate::tasks::TaskQueue;
use crate::terrain::{Solidity, TerrainChanges, TileCoord, TileGrid};
use bevy_ecs::prelude::*;

/// Smallest allowed world edge. The outer ring is boundary, so anything
/// smaller has no interior.
pub const MIN_WORLD_SIZE: i32 = 3;

/// Builder for a simulation world.
#[derive(Debug, Clone, Default)]
pub struct WorldBuilder {
    foreground: Vec<String>,
    background: Option<Vec<String>>,
    gnomes: Vec<TileCoord>,
    config: SimConfig,
}

impl WorldBuilder {
    pub fn new<S: AsRef<str>>(rows: &[S]) -> Self {
        Self {
            foreground: rows.iter().map(|r| r.as_ref().to_string()).collect(),
            ..Self::default()
        }
    }

    /// Bedrock-walled box: air above row `height / 2`, a grass surface on
    /// it and dirt below.
    pub fn flat(width: usize, height: usize) -> Self {
        let surface = height / 2;
        let rows: Vec<String> = (0..height)
            .map(|y| {
                (0..width)
                    .map(|x| {
                        if x == 0 || y == 0 || x + 1 == width || y + 1 == height {
                            'B'
                        } else if y < surface {
                            '.'
                        } else if y == surface {
                            'g'
                        } else {
                            'd'
                        }
                    })
                    .collect()
            })
            .collect();
        Self::new(&rows)
    }

    /// Background layer; must match the foreground dimensions.
    pub fn background<S: AsRef<str>>(mut self, rows: &[S]) -> Self {
        self.background = Some(rows.iter().map(|r| r.as_ref().to_string()).collect());
        self
    }

    /// Extra gnome spawn point on top of the `G` glyphs.
    pub fn gnome(mut self, at: TileCoord) -> Self {
        self.gnomes.push(at);
        self
    }

    pub fn config(mut self, config: SimConfig) -> Self {
        self.config = config;
        self
    }

    /// Build a ready-to-run simulation.
    pub fn build(self) -> SimResult<SimWorld> {
        let world = self.build_world()?;
        log::info!(
            "built {}x{} world",
            world.resource::<TileGrid>().width(),
            world.resource::<TileGrid>().height()
        );
        Ok(SimWorld::from_world(world))
    }

    /// Build just the ECS world with all simulation resources installed.
    pub fn build_world(self) -> SimResult<World> {
        let (width, height, kinds, mut spawns) = parse_foreground(&self.foreground)?;
        let background = match &self.background {
            Some(rows) => Some(parse_background(rows, width, height)?),
            None => None,
        };
        spawns.extend(self.gnomes.iter().copied());

        let mut world = World::new();
        world.insert_resource(EntityRegistry::default());

        let mut ids = Vec::with_capacity(kinds.len());
        let mut solid = Vec::with_capacity(kinds.len());
        for (i, kind) in kinds.iter().enumerate() {
            let at = TileCoord::new(i as i32 % width, i as i32 / width);
            ids.push(spawn_tile(&mut world, *kind, at, TileLayer::Foreground));
            solid.push(kind.is_solid());
        }
        let mut grid = TileGrid::new(width, height, ids, solid).ok_or(SimError::WorldTooSmall {
            width,
            height,
        })?;

        if let Some(background) = background {
            for (i, kind) in background.into_iter().enumerate() {
                let Some(kind) = kind else { continue };
                let at = TileCoord::new(i as i32 % width, i as i32 / width);
                let id = spawn_tile(&mut world, kind, at, TileLayer::Background);
                grid.set_background(at, Some(id));
            }
        }

        for &at in &spawns {
            if !grid.in_bounds(at) {
                return Err(SimError::OutOfBounds { x: at.x, y: at.y });
            }
            if grid.is_solid(at) {
                return Err(SimError::Blocked { x: at.x, y: at.y });
            }
        }
        for at in spawns {
            world.spawn_bundle(GnomeBundle::at(at));
        }

        install_resources(&mut world, grid, self.config, SimTick(0), ControlState::default());
        Ok(world)
    }
}

fn spawn_tile(world: &mut World, kind: TileKind, at: TileCoord, layer: TileLayer) -> EntityId {
    world.spawn_bundle(TileBundle {
        tile: Tile::new(kind),
        pos: TilePos::from(at),
        layer,
    })
}

/// Insert every resource the stages expect.
pub(crate) fn install_resources(
    world: &mut World,
    grid: TileGrid,
    config: SimConfig,
    tick: SimTick,
    control: ControlState,
) {
    world.insert_resource(grid);
    world.insert_resource(config.sanitized());
    world.insert_resource(tick);
    world.insert_resource(control);
    world.insert_resource(TaskQueue::default());
    world.insert_resource(TerrainChanges::default());
    world.init_resource::<EntityRegistry>();
}

/// Check a layout's shape and return `(width, height)`.
fn dimensions(rows: &[String]) -> SimResult<(i32, i32)> {
    let expected = rows.first().map_or(0, |r| r.chars().count());
    for (row, text) in rows.iter().enumerate() {
        let found = text.chars().count();
        if found != expected {
            return Err(SimError::RaggedLayout {
                row,
                found,
                expected,
            });
        }
    }
    let (width, height) = (expected as i32, rows.len() as i32);
    if width < MIN_WORLD_SIZE || height < MIN_WORLD_SIZE {
        return Err(SimError::WorldTooSmall { width, height });
    }
    Ok((width, height))
}

type Foreground = (i32, i32, Vec<TileKind>, Vec<TileCoord>);

fn parse_foreground(rows: &[String]) -> SimResult<Foreground> {
    let (width, height) = dimensions(rows)?;
    let mut kinds = Vec::with_capacity((width * height) as usize);
    let mut spawns = Vec::new();
    for (y, row) in rows.iter().enumerate() {
        for (x, glyph) in row.chars().enumerate() {
            let (x, y) = (x as i32, y as i32);
            if glyph == 'G' {
                spawns.push(TileCoord::new(x, y));
                kinds.push(TileKind::Air);
                continue;
            }
            let kind = TileKind::from_glyph(glyph).ok_or(SimError::UnknownGlyph { glyph, x, y })?;
            kinds.push(kind);
        }
    }
    Ok((width, height, kinds, spawns))
}

fn parse_background(rows: &[String], width: i32, height: i32) -> SimResult<Vec<Option<TileKind>>> {
    let (found_width, found_height) = dimensions(rows)?;
    if (found_width, found_height) != (width, height) {
        return Err(SimError::LayerMismatch {
            width,
            height,
            found_width,
            found_height,
        });
    }
    let mut kinds = Vec::with_capacity((width * height) as usize);
    for (y, row) in rows.iter().enumerate() {
        for (x, glyph) in row.chars().enumerate() {
            let kind = match TileKind::from_glyph(glyph) {
                Some(TileKind::Air) => None,
                Some(kind) => Some(kind),
                None => {
                    return Err(SimError::UnknownGlyph {
                        glyph,
                        x: x as i32,
                        y: y as i32,
                    })
                }
            };
            kinds.push(kind);
        }
    }
    Ok(kinds)
}
