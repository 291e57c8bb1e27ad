//! Simulation tuning and the tick counter.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Durability removed from a tile per mining tick.
pub const GNOME_MINE_RATE: f32 = 10.0;
/// Walking speed in tiles per tick.
pub const GNOME_SPEED: f32 = 0.1;
/// Distance under which a walking gnome snaps onto its waypoint.
pub const WAYPOINT_EPSILON: f32 = 0.01;
/// Downward acceleration in tiles per tick squared.
pub const GRAVITY: f32 = 0.05;
/// Fall speed cap in tiles per tick. Must stay below one tile per tick so a
/// falling body can never skip over a solid row.
pub const TERMINAL_VELOCITY: f32 = 0.5;
/// Task assignment runs once every this many ticks.
pub const ASSIGNMENT_INTERVAL: u64 = 5;
/// Pathfinding calls one idle gnome may spend per assignment pass.
pub const MAX_PATH_ATTEMPTS: usize = 8;
/// A* expansion ceiling. A resource bound, not part of the path contract.
pub const MAX_PATH_ITERATIONS: usize = 20_000;
/// Most ticks one `step` call may run. Frame time past this is dropped.
pub const MAX_TICKS_PER_STEP: usize = 32;

/// Configuration for simulation tuning.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed timestep in seconds (e.g., 1/30 = 0.0333 for 30 Hz).
    pub fixed_timestep: f32,
    /// Walking speed (tiles per tick).
    pub gnome_speed: f32,
    /// Snap distance for waypoints.
    pub waypoint_epsilon: f32,
    /// Gravity (tiles per tick squared).
    pub gravity: f32,
    /// Fall speed cap (tiles per tick).
    pub terminal_velocity: f32,
    /// Durability removed per mining tick.
    pub mine_rate: f32,
    /// Ticks between task assignment passes.
    pub assignment_interval: u64,
    /// Path attempts per idle gnome per assignment pass.
    pub max_path_attempts: usize,
    /// A* expansion ceiling.
    pub max_path_iterations: usize,
    /// How close a collecting gnome must be to its item (tiles).
    pub reach_distance: f32,
    /// Tick ceiling for a single frame step.
    pub max_ticks_per_step: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: 1.0 / 30.0, // 30 Hz
            gnome_speed: GNOME_SPEED,
            waypoint_epsilon: WAYPOINT_EPSILON,
            gravity: GRAVITY,
            terminal_velocity: TERMINAL_VELOCITY,
            mine_rate: GNOME_MINE_RATE,
            assignment_interval: ASSIGNMENT_INTERVAL,
            max_path_attempts: MAX_PATH_ATTEMPTS,
            max_path_iterations: MAX_PATH_ITERATIONS,
            reach_distance: 1.5,
            max_ticks_per_step: MAX_TICKS_PER_STEP,
        }
    }
}

impl SimConfig {
    /// Clamp values that would break simulation invariants.
    pub fn sanitized(mut self) -> Self {
        if !(self.fixed_timestep > 0.0) {
            self.fixed_timestep = 1.0 / 30.0;
        }
        self.terminal_velocity = self.terminal_velocity.clamp(0.01, 0.95);
        self.gravity = self.gravity.clamp(0.0, self.terminal_velocity);
        self.gnome_speed = self.gnome_speed.clamp(0.01, 1.0);
        self.waypoint_epsilon = self.waypoint_epsilon.clamp(0.0001, self.gnome_speed);
        self.mine_rate = self.mine_rate.max(0.0);
        self.assignment_interval = self.assignment_interval.max(1);
        self.max_path_attempts = self.max_path_attempts.max(1);
        self.max_path_iterations = self.max_path_iterations.max(1);
        self.max_ticks_per_step = self.max_ticks_per_step.max(1);
        self
    }
}

/// Global simulation tick counter: the number of completed ticks.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimTick(pub u64);

impl SimTick {
    pub fn increment(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }

    /// Whether a system throttled to every `interval` ticks runs now.
    #[inline]
    pub fn every(&self, interval: u64) -> bool {
        self.0 % interval.max(1) == 0
    }
}
