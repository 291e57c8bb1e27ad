//! Flat buffer export of gnome state for renderers.
//!
//! Converts `Snapshot.gnomes` into a flat `Vec<f32>` that a host engine can
//! upload or iterate without parsing JSON every frame.
//!
//! ## Buffer Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ HEADER (1 float)                                            │
//! │   [0] gnome_count                                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │ GNOME 0 (GNOME_STRIDE floats)                               │
//! │   [+0]  id            (entity id, exact up to 2^24)         │
//! │   [+1]  x             (tile units, fractional)              │
//! │   [+2]  y             (tile units, y down)                  │
//! │   [+3]  vx            (tiles per tick)                      │
//! │   [+4]  vy                                                  │
//! │   [+5]  state         (STATE_* id)                          │
//! │   [+6]  has_task      (0 or 1)                              │
//! │   [+7]  carrying      (inventory length)                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │ GNOME 1 ...                                                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Total size: `HEADER_SIZE + gnome_count * GNOME_STRIDE`.

use crate::world::{GnomeSnapshot, Snapshot};

/// Floats per gnome.
pub const GNOME_STRIDE: usize = 8;

/// Header floats before the first gnome.
pub const HEADER_SIZE: usize = 1;

// State id mapping
pub const STATE_IDLE: f32 = 0.0;
pub const STATE_WALKING: f32 = 1.0;
pub const STATE_MINING: f32 = 2.0;
pub const STATE_COLLECTING: f32 = 3.0;
pub const STATE_FALLING: f32 = 4.0;

/// Map a snapshot state name to its numeric id. Unknown names map to idle.
pub fn state_to_id(state: &str) -> f32 {
    match state {
        "Walking" => STATE_WALKING,
        "Mining" => STATE_MINING,
        "Collecting" => STATE_COLLECTING,
        "Falling" => STATE_FALLING,
        _ => STATE_IDLE,
    }
}

/// Serialize the gnomes of a snapshot into a flat buffer.
pub fn snapshot_to_flatbuffer(snapshot: &Snapshot) -> Vec<f32> {
    let gnome_count = snapshot.gnomes.len();
    let mut buffer = Vec::with_capacity(calculate_buffer_size(gnome_count));

    // Header
    buffer.push(gnome_count as f32);

    for gnome in &snapshot.gnomes {
        push_gnome(&mut buffer, gnome);
    }

    debug_assert_eq!(buffer.len(), calculate_buffer_size(gnome_count));
    buffer
}

fn push_gnome(buffer: &mut Vec<f32>, gnome: &GnomeSnapshot) {
    buffer.push(gnome.id.0 as f32); // [+0] id
    buffer.push(gnome.x); // [+1] x
    buffer.push(gnome.y); // [+2] y
    buffer.push(gnome.vx); // [+3] vx
    buffer.push(gnome.vy); // [+4] vy
    buffer.push(state_to_id(&gnome.state)); // [+5] state
    buffer.push(if gnome.task.is_some() { 1.0 } else { 0.0 }); // [+6] has_task
    buffer.push(gnome.carrying as f32); // [+7] carrying
}

#[inline]
pub fn calculate_buffer_size(gnome_count: usize) -> usize {
    HEADER_SIZE + gnome_count * GNOME_STRIDE
}

/// Gnome count from a buffer header. `None` if the buffer is shorter than
/// the header claims.
pub fn parse_gnome_count(buffer: &[f32]) -> Option<usize> {
    let count = *buffer.first()?;
    if !(count >= 0.0) {
        return None;
    }
    let count = count as usize;
    (buffer.len() >= calculate_buffer_size(count)).then_some(count)
}

/// Offset of the gnome at `index`.
#[inline]
pub const fn gnome_offset(index: usize) -> usize {
    HEADER_SIZE + index * GNOME_STRIDE
}

// Field offsets within a gnome record
pub const FIELD_ID: usize = 0;
pub const FIELD_X: usize = 1;
pub const FIELD_Y: usize = 2;
pub const FIELD_VX: usize = 3;
pub const FIELD_VY: usize = 4;
pub const FIELD_STATE: usize = 5;
pub const FIELD_HAS_TASK: usize = 6;
pub const FIELD_CARRYING: usize = 7;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EntityId;

    fn gnome(id: u64, state: &str, task: bool) -> GnomeSnapshot {
        GnomeSnapshot {
            id: EntityId(id),
            x: 3.5,
            y: 7.0,
            vx: 0.1,
            vy: 0.0,
            state: state.to_string(),
            task: task.then_some(EntityId(99)),
            carrying: 2,
        }
    }

    #[test]
    fn test_empty_snapshot() {
        let buffer = snapshot_to_flatbuffer(&Snapshot::default());
        assert_eq!(buffer, vec![0.0]);
        assert_eq!(parse_gnome_count(&buffer), Some(0));
    }

    #[test]
    fn test_gnome_fields() {
        let snapshot = Snapshot {
            gnomes: vec![gnome(4, "Idle", false), gnome(9, "Mining", true)],
            ..Snapshot::default()
        };

        let buffer = snapshot_to_flatbuffer(&snapshot);

        assert_eq!(buffer.len(), calculate_buffer_size(2));
        assert_eq!(parse_gnome_count(&buffer), Some(2));
        let second = gnome_offset(1);
        assert_eq!(buffer[second + FIELD_ID], 9.0);
        assert_eq!(buffer[second + FIELD_X], 3.5);
        assert_eq!(buffer[second + FIELD_Y], 7.0);
        assert_eq!(buffer[second + FIELD_VX], 0.1);
        assert_eq!(buffer[second + FIELD_VY], 0.0);
        assert_eq!(buffer[second + FIELD_STATE], STATE_MINING);
        assert_eq!(buffer[second + FIELD_HAS_TASK], 1.0);
        assert_eq!(buffer[second + FIELD_CARRYING], 2.0);
        assert_eq!(buffer[gnome_offset(0) + FIELD_HAS_TASK], 0.0);
    }

    #[test]
    fn test_state_ids() {
        assert_eq!(state_to_id("Idle"), STATE_IDLE);
        assert_eq!(state_to_id("Walking"), STATE_WALKING);
        assert_eq!(state_to_id("Collecting"), STATE_COLLECTING);
        assert_eq!(state_to_id("Falling"), STATE_FALLING);
        assert_eq!(state_to_id("Sleeping"), STATE_IDLE);
    }

    #[test]
    fn test_parse_rejects_truncated_buffer() {
        assert_eq!(parse_gnome_count(&[]), None);
        assert_eq!(parse_gnome_count(&[2.0, 0.0, 0.0]), None);
        assert_eq!(parse_gnome_count(&[-1.0]), None);
    }

    #[test]
    fn test_offsets() {
        assert_eq!(gnome_offset(0), 1);
        assert_eq!(gnome_offset(3), 1 + 3 * GNOME_STRIDE);
        assert_eq!(FIELD_CARRYING, GNOME_STRIDE - 1);
    }
}
