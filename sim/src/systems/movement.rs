//! Movement system - walks gnomes along their paths.

use crate::components::{Gnome, GnomeState, Position, Task, TaskKind, Velocity};
use crate::config::SimConfig;
use crate::store::{EntityId, EntityRegistry};
use bevy_ecs::prelude::*;

/// System that moves walking gnomes toward their next waypoint.
///
/// A gnome covers at most `gnome_speed` tiles per tick and never overshoots;
/// once within `waypoint_epsilon` it snaps onto the waypoint and moves on to
/// the next one. When the path runs out the gnome starts on its task: Mining
/// for a dig, Collecting for a pickup, Idle if the task is gone.
pub fn movement_system(
    config: Res<SimConfig>,
    registry: Res<EntityRegistry>,
    tasks: Query<&Task>,
    mut gnomes: Query<(&EntityId, &mut Gnome, &mut Position, &mut Velocity)>,
) {
    for (id, mut gnome, mut pos, mut vel) in gnomes.iter_mut() {
        if gnome.state != GnomeState::Walking {
            continue;
        }

        if let Some(waypoint) = gnome.next_waypoint() {
            let tx = waypoint.x as f32;
            let ty = waypoint.y as f32;
            let dx = tx - pos.x;
            let dy = ty - pos.y;
            let dist = (dx * dx + dy * dy).sqrt();

            let step = config.gnome_speed.min(dist);
            if dist - step <= config.waypoint_epsilon {
                vel.dx = tx - pos.x;
                vel.dy = ty - pos.y;
                pos.x = tx;
                pos.y = ty;
                gnome.path_index += 1;
            } else {
                vel.dx = dx / dist * step;
                vel.dy = dy / dist * step;
                pos.x += vel.dx;
                pos.y += vel.dy;
                continue;
            }
        }

        if gnome.next_waypoint().is_some() {
            continue;
        }

        vel.dx = 0.0;
        vel.dy = 0.0;
        let kind = gnome
            .current_task
            .and_then(|task_id| registry.resolve(task_id))
            .and_then(|entity| tasks.get(entity).ok())
            .map(|task| task.kind);
        match kind {
            Some(TaskKind::Dig) => gnome.state = GnomeState::Mining,
            Some(TaskKind::Collect) => gnome.state = GnomeState::Collecting,
            None => {
                log::trace!("gnome {id} arrived but its task is gone");
                gnome.clear_task();
            }
        }
        gnome.path.clear();
        gnome.path_index = 0;
    }
}
