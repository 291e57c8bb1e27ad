//! Public API for the simulation.
//!
//! `SimWorld` owns the ECS world and the stage schedules and is the one
//! handle a host needs: build it with [`WorldBuilder`], feed it frame time
//! and commands, and pull snapshots back out.
//!
//! ## Fixed Timestep
//!
//! The simulation uses a fixed timestep internally (default 30 Hz). When
//! `step(dt)` is called, the simulation accumulates `dt` scaled by the speed
//! multiplier and runs whole ticks as needed. Pausing stops the accumulator.
//! Commands apply between ticks.
//!
//! ## Stages
//!
//! A tick runs four schedules in order, each on a single-threaded executor
//! with its systems chained: physics, assignment, work and ancillary. See
//! [`crate::systems`] for the systems in each.

use crate::builder::WorldBuilder;
use crate::commands::{apply_command, Command, ControlState};
use crate::components::GnomeBundle;
use crate::config::{SimConfig, SimTick, MAX_TICKS_PER_STEP};
use crate::error::{SimError, SimResult};
use crate::pathfinding::find_path;
use crate::save::SaveState;
use crate::store::{EntityId, EntityStore};
use crate::systems::*;
use crate::terrain::{Solidity, TerrainSnapshot, TileCoord, TileGrid};
use crate::world::Snapshot;
use bevy_ecs::prelude::*;
use bevy_ecs::schedule::ExecutorKind;

#[cfg(feature = "profile")]
use crate::profiler::Profiler;

/// One named schedule in the tick pipeline.
struct Stage {
    name: &'static str,
    schedule: Schedule,
}

impl Stage {
    fn new<M>(name: &'static str, systems: impl IntoSystemConfigs<M>) -> Self {
        let mut schedule = Schedule::default();
        schedule.set_executor_kind(ExecutorKind::SingleThreaded);
        schedule.add_systems(systems);
        Self { name, schedule }
    }
}

fn build_stages() -> Vec<Stage> {
    vec![
        Stage::new(
            "physics",
            (terrain_sync_system, gnome_physics_system, movement_system).chain(),
        ),
        Stage::new(
            "assignment",
            (task_queue_sync_system, task_assignment_system).chain(),
        ),
        Stage::new("work", (mining_system, collection_system).chain()),
        Stage::new(
            "ancillary",
            (item_physics_system, terrain_sync_system).chain(),
        ),
    ]
}

/// The main simulation world container.
///
/// Holds the ECS world and stage schedules, providing a clean API for:
/// - Stepping the simulation forward
/// - Issuing commands
/// - Extracting snapshots
/// - Saving and loading
pub struct SimWorld {
    world: World,
    stages: Vec<Stage>,
    /// Accumulated scaled time for the fixed timestep.
    time_accumulator: f32,
    #[cfg(feature = "profile")]
    profiler: Profiler,
}

impl SimWorld {
    /// Wrap a world that already holds every simulation resource.
    pub(crate) fn from_world(world: World) -> Self {
        Self {
            world,
            stages: build_stages(),
            time_accumulator: 0.0,
            #[cfg(feature = "profile")]
            profiler: Profiler::new(),
        }
    }

    /// Flat test world (see [`WorldBuilder::flat`]) with custom tuning.
    pub fn with_config(width: usize, height: usize, config: SimConfig) -> SimResult<Self> {
        WorldBuilder::flat(width, height).config(config).build()
    }

    /// Rebuild a simulation from a save.
    pub fn load(save: &SaveState) -> SimResult<Self> {
        Ok(Self::from_world(save.restore()?))
    }

    pub fn load_json(json: &str) -> SimResult<Self> {
        Self::load(&SaveState::from_json(json)?)
    }

    /// Step the simulation forward by `dt` seconds of frame time.
    ///
    /// Returns the number of ticks run, at most `max_ticks_per_step`.
    /// Frame time that would need more ticks than that is dropped, as is
    /// any non-finite `dt`.
    pub fn step(&mut self, dt: f32) -> usize {
        let (fixed_dt, max_ticks) = self
            .world
            .get_resource::<SimConfig>()
            .map_or((1.0 / 30.0, MAX_TICKS_PER_STEP), |c| {
                (c.fixed_timestep, c.max_ticks_per_step)
            });
        let (speed, paused) = self
            .world
            .get_resource::<ControlState>()
            .map_or((1.0, false), |c| (c.speed, c.paused));
        let scaled = dt * speed;
        if paused || !(scaled.is_finite() && scaled > 0.0) {
            return 0;
        }

        self.time_accumulator += scaled;

        let mut ran = 0;
        while self.time_accumulator >= fixed_dt {
            if ran == max_ticks {
                log::debug!("step hit {max_ticks} ticks; dropping {:.3}s", self.time_accumulator);
                self.time_accumulator = 0.0;
                break;
            }
            self.tick();
            self.time_accumulator -= fixed_dt;
            ran += 1;
        }
        ran
    }

    /// Run exactly one tick, paused or not.
    pub fn tick(&mut self) {
        for stage in &mut self.stages {
            #[cfg(feature = "profile")]
            self.profiler
                .time_section(stage.name, || stage.schedule.run(&mut self.world));
            #[cfg(not(feature = "profile"))]
            stage.schedule.run(&mut self.world);
        }

        if let Some(mut tick) = self.world.get_resource_mut::<SimTick>() {
            tick.increment();
        }
        self.world.clear_trackers();

        #[cfg(feature = "profile")]
        self.profiler.tick();
    }

    /// Apply a player command. Returns how many things it affected.
    pub fn apply(&mut self, command: Command) -> usize {
        log::trace!("applying {command:?}");
        apply_command(&mut self.world, command)
    }

    /// Spawn a gnome standing at `at`.
    pub fn spawn_gnome(&mut self, at: TileCoord) -> SimResult<EntityId> {
        let grid = self
            .world
            .get_resource::<TileGrid>()
            .ok_or(SimError::OutOfBounds { x: at.x, y: at.y })?;
        if !grid.in_bounds(at) {
            return Err(SimError::OutOfBounds { x: at.x, y: at.y });
        }
        if grid.is_solid(at) {
            return Err(SimError::Blocked { x: at.x, y: at.y });
        }
        let id = self.world.spawn_bundle(GnomeBundle::at(at));
        log::debug!("spawned gnome {id} at {at:?}");
        Ok(id)
    }

    /// Route a gnome could take between two cells right now.
    pub fn find_path(&self, start: TileCoord, end: TileCoord) -> Option<Vec<TileCoord>> {
        let grid = self.world.get_resource::<TileGrid>()?;
        let max_iterations = self
            .world
            .get_resource::<SimConfig>()
            .map_or(crate::config::MAX_PATH_ITERATIONS, |c| c.max_path_iterations);
        find_path(grid, start, end, max_iterations)
    }

    /// Snapshot for rendering. Drains the pending tile changes.
    pub fn snapshot(&mut self) -> Snapshot {
        let tick = self.current_tick();
        Snapshot::from_world(&mut self.world, tick)
    }

    /// Get the snapshot as a JSON string.
    pub fn snapshot_json(&mut self) -> String {
        self.snapshot().to_json().unwrap_or_else(|_| "{}".to_string())
    }

    /// Full terrain dump, for an initial load or after `load`.
    pub fn terrain_snapshot(&self) -> Option<TerrainSnapshot> {
        TerrainSnapshot::from_world(&self.world)
    }

    pub fn save(&mut self) -> SaveState {
        SaveState::capture(&mut self.world)
    }

    pub fn save_json(&mut self) -> SimResult<String> {
        self.save().to_json()
    }

    /// Stage names in run order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name).collect()
    }

    /// Number of completed ticks.
    pub fn current_tick(&self) -> u64 {
        self.world.get_resource::<SimTick>().map_or(0, |t| t.0)
    }

    #[cfg(feature = "profile")]
    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}
