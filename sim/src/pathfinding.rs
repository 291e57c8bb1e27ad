//! A* pathfinding over the tile grid.
//!
//! ## Movement rules
//!
//! From a cell `(x, y)` (y grows downward):
//! - **Fall**: if the cell below is not solid, the only move is straight down.
//! - Otherwise, with support underfoot:
//!   - **Walk** to `(x±1, y)` if walkable with solid ground under it.
//!   - **Step up** to `(x±1, y-1)` if walkable.
//!   - **Step down** to `(x±1, y+1)` if walkable with solid ground at
//!     `(x±1, y+2)`.
//!
//! Every move costs 1. The heuristic is Chebyshev distance: step moves are
//! diagonal, so it is the tightest admissible estimate and A* stays optimal.
//!
//! ## Data structures
//!
//! The open set is a binary heap ordered by `(f, insertion sequence)`, so
//! ties resolve in insertion order and results are deterministic. Best-known
//! costs live in a hash map keyed by packed coordinates; re-queued nodes are
//! pushed again and stale heap entries skipped on pop. The closed set is a
//! hash set of the same packed keys.

use crate::terrain::{Solidity, TileCoord};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Stride used to pack `(x, y)` into a single integer key.
pub const WIDE_STRIDE: i64 = 1 << 20;

/// Pack a coordinate into a closed-set key.
#[inline]
pub fn pack(at: TileCoord) -> i64 {
    at.x as i64 * WIDE_STRIDE + at.y as i64
}

/// Up to seven moves out of one cell, in a fixed order.
#[derive(Debug, Clone)]
pub struct Moves {
    buf: [TileCoord; 7],
    len: usize,
    next: usize,
}

impl Moves {
    fn empty() -> Self {
        Self {
            buf: [TileCoord::new(0, 0); 7],
            len: 0,
            next: 0,
        }
    }

    fn push(&mut self, at: TileCoord) {
        if self.len < self.buf.len() {
            self.buf[self.len] = at;
            self.len += 1;
        }
    }
}

impl Iterator for Moves {
    type Item = TileCoord;

    fn next(&mut self) -> Option<TileCoord> {
        if self.next < self.len {
            self.next += 1;
            Some(self.buf[self.next - 1])
        } else {
            None
        }
    }
}

/// Every legal move out of `from`.
pub fn legal_moves(grid: &impl Solidity, from: TileCoord) -> Moves {
    let mut moves = Moves::empty();

    if !grid.is_supported(from) {
        let down = from.below();
        if grid.is_walkable(down) {
            moves.push(down);
        }
        return moves;
    }

    for dx in [-1, 1] {
        let walk = from.offset(dx, 0);
        if grid.is_walkable(walk) && grid.is_solid(walk.below()) {
            moves.push(walk);
        }
    }
    for dx in [-1, 1] {
        let up = from.offset(dx, -1);
        if grid.is_walkable(up) {
            moves.push(up);
        }
    }
    for dx in [-1, 1] {
        let down = from.offset(dx, 1);
        if grid.is_walkable(down) && grid.is_solid(down.below()) {
            moves.push(down);
        }
    }
    moves
}

/// Whether `from -> to` is a single legal move.
pub fn is_legal_move(grid: &impl Solidity, from: TileCoord, to: TileCoord) -> bool {
    legal_moves(grid, from).any(|m| m == to)
}

#[inline]
fn heuristic(a: TileCoord, b: TileCoord) -> u32 {
    (a.x - b.x).unsigned_abs().max((a.y - b.y).unsigned_abs())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenNode {
    f: u32,
    g: u32,
    seq: u64,
    at: TileCoord,
}

impl Ord for OpenNode {
    // Reversed so the max-heap pops the smallest f, then the oldest entry.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Copy)]
struct NodeRecord {
    g: u32,
    parent: Option<TileCoord>,
}

/// Plain A* from `start` to `goal`.
///
/// Returns the waypoints from `start` to `goal` inclusive, or `None` when
/// the goal is unreachable or `max_iterations` expansions were spent.
pub fn search(
    grid: &impl Solidity,
    start: TileCoord,
    goal: TileCoord,
    max_iterations: usize,
) -> Option<Vec<TileCoord>> {
    if !grid.is_walkable(start) || !grid.is_walkable(goal) {
        return None;
    }
    if start == goal {
        return Some(vec![start]);
    }

    let mut open = BinaryHeap::new();
    let mut records: FxHashMap<i64, NodeRecord> = FxHashMap::default();
    let mut closed: FxHashSet<i64> = FxHashSet::default();
    let mut seq = 0u64;

    records.insert(pack(start), NodeRecord { g: 0, parent: None });
    open.push(OpenNode {
        f: heuristic(start, goal),
        g: 0,
        seq,
        at: start,
    });

    let mut iterations = 0usize;
    while let Some(node) = open.pop() {
        let key = pack(node.at);
        if closed.contains(&key) {
            continue;
        }
        if records.get(&key).is_some_and(|r| r.g < node.g) {
            continue;
        }
        if node.at == goal {
            return Some(reconstruct(&records, goal));
        }

        iterations += 1;
        if iterations > max_iterations {
            log::trace!("path search {start:?} -> {goal:?} hit the iteration ceiling");
            return None;
        }
        closed.insert(key);

        let g = node.g + 1;
        for next in legal_moves(grid, node.at) {
            let next_key = pack(next);
            if closed.contains(&next_key) {
                continue;
            }
            if records.get(&next_key).is_some_and(|r| r.g <= g) {
                continue;
            }
            records.insert(
                next_key,
                NodeRecord {
                    g,
                    parent: Some(node.at),
                },
            );
            seq += 1;
            open.push(OpenNode {
                f: g + heuristic(next, goal),
                g,
                seq,
                at: next,
            });
        }
    }
    None
}

fn reconstruct(records: &FxHashMap<i64, NodeRecord>, goal: TileCoord) -> Vec<TileCoord> {
    let mut path = vec![goal];
    let mut current = goal;
    while let Some(parent) = records.get(&pack(current)).and_then(|r| r.parent) {
        path.push(parent);
        current = parent;
    }
    path.reverse();
    path
}

/// Cells a gnome may stand in to work on a solid target, in preference
/// order: left, right, above.
pub fn work_sites(grid: &impl Solidity, target: TileCoord) -> impl Iterator<Item = TileCoord> + '_ {
    [target.offset(-1, 0), target.offset(1, 0), target.offset(0, -1)]
        .into_iter()
        .filter(move |&c| grid.is_standable(c))
}

/// Route from `start` to `end`.
///
/// When `end` is solid (a mining target) the route instead ends on the
/// first adjacent work site (left, right, above) that can be reached, so the
/// gnome stands next to the target rather than inside it.
pub fn find_path(
    grid: &impl Solidity,
    start: TileCoord,
    end: TileCoord,
    max_iterations: usize,
) -> Option<Vec<TileCoord>> {
    if !grid.in_bounds(end) {
        return None;
    }
    if !grid.is_solid(end) {
        return search(grid, start, end, max_iterations);
    }
    work_sites(grid, end).find_map(|site| search(grid, start, site, max_iterations))
}

/// Route to somewhere a gnome can stand and work on `target`: the target
/// cell itself when it can be stood in, otherwise the first reachable work
/// site. Open targets over a drop go to a work site too, so the worker
/// does not arrive and fall straight through.
pub fn find_work_path(
    grid: &impl Solidity,
    start: TileCoord,
    target: TileCoord,
    max_iterations: usize,
) -> Option<Vec<TileCoord>> {
    if !grid.in_bounds(target) {
        return None;
    }
    if grid.is_standable(target) {
        return search(grid, start, target, max_iterations);
    }
    work_sites(grid, target).find_map(|site| search(grid, start, site, max_iterations))
}
