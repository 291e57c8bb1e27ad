//! Burrow - Simulation Core
//!
//! A deterministic, fixed-timestep ECS simulation of a 2D side-view colony:
//! gnomes dig designated tiles, carry off what drops and fall when the
//! ground goes. Uses `bevy_ecs` for the entity-component-system
//! architecture.

pub mod api;
pub mod builder;
pub mod commands;
pub mod components;
pub mod config;
pub mod error;
pub mod logging;
pub mod pathfinding;
pub mod profiler;
pub mod render_bridge;
pub mod save;
pub mod store;
pub mod systems;
pub mod tasks;
pub mod terrain;
pub mod world;

pub use api::SimWorld;
pub use builder::WorldBuilder;
pub use commands::{Camera, Command, ControlState};
pub use components::*;
pub use config::{SimConfig, SimTick};
pub use error::{SimError, SimResult};
pub use save::SaveState;
pub use store::{EntityId, EntityRegistry, EntityStore};
pub use tasks::TaskQueue;
pub use terrain::{Solidity, TerrainChanges, TerrainSnapshot, TileCoord, TileGrid};
pub use world::Snapshot;
