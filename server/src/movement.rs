//! Server-side waypoint movement.
//!
//! A [`MovementTarget`] records where an entity wants to go and the tile path
//! it is currently following. Every tick [`advance`] walks the entity along
//! that path, then steers straight at the destination once the waypoints are
//! used up.

use crate::map::GameMap;

/// Distance at which a destination or waypoint counts as reached.
pub const ARRIVE_THRESHOLD: f32 = 5.0;

/// Seconds between path recomputations while following a live target.
pub const PATH_REFRESH_INTERVAL: f32 = 2.0;

/// Player walk speed in world units per second.
pub const PLAYER_SPEED: f32 = 200.0;

#[derive(Debug, Clone)]
pub struct MovementTarget {
    /// Chased player id; empty when the destination is a fixed point.
    pub target_id: String,
    pub target_x: f32,
    pub target_y: f32,
    /// Stop early once within this range of the destination (attack
    /// approaches). Zero disables it.
    pub stop_range: f32,
    pub moving: bool,
    pub path: Vec<(i32, i32)>,
    pub path_index: usize,
    pub path_timer: f32,
}

impl MovementTarget {
    pub fn new(target_x: f32, target_y: f32, stop_range: f32) -> Self {
        Self {
            target_id: String::new(),
            target_x,
            target_y,
            stop_range,
            moving: true,
            path: Vec::new(),
            path_index: 0,
            path_timer: 0.0,
        }
    }

    pub fn set_path(&mut self, path: Vec<(i32, i32)>) {
        self.path = path;
        self.path_index = 0;
        self.moving = !self.path.is_empty();
    }

    /// Make the next timer check recompute the path immediately.
    pub fn force_path_refresh(&mut self) {
        self.path_timer = PATH_REFRESH_INTERVAL;
    }
}

/// What a single movement step did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// Not moving, or nothing to do this tick.
    Idle,
    /// Position changed.
    Moved { x: f32, y: f32 },
    /// Reached the current waypoint; index advanced, position unchanged.
    WaypointReached,
    /// Destination (or stop range) reached; `moving` cleared.
    Arrived,
    /// Direct step past the end of the path hit a wall. The caller decides
    /// whether to recompute now or on the next refresh.
    Blocked,
}

pub fn distance(x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
    let dx = x1 - x2;
    let dy = y1 - y2;
    (dx * dx + dy * dy).sqrt()
}

/// Advance one entity along its movement target by `delta` seconds.
pub fn advance(
    x: f32,
    y: f32,
    target: &mut MovementTarget,
    map: &GameMap,
    delta: f32,
    speed: f32,
) -> Step {
    if !target.moving || target.path.is_empty() {
        return Step::Idle;
    }

    if target.path_index >= target.path.len() {
        advance_past_path(x, y, target, map, delta, speed)
    } else {
        advance_along_path(x, y, target, delta, speed)
    }
}

/// The waypoints are used up; close the remaining distance in a straight
/// line, stopping at the arrive threshold or the caller's stop range.
fn advance_past_path(
    x: f32,
    y: f32,
    target: &mut MovementTarget,
    map: &GameMap,
    delta: f32,
    speed: f32,
) -> Step {
    let dist = distance(x, y, target.target_x, target.target_y);

    if target.stop_range > 0.0 && dist <= target.stop_range {
        target.moving = false;
        return Step::Arrived;
    }
    if dist < ARRIVE_THRESHOLD {
        target.moving = false;
        return Step::Arrived;
    }

    // Never step past the destination
    let step = (speed * delta).min(dist);
    let new_x = x + (target.target_x - x) / dist * step;
    let new_y = y + (target.target_y - y) / dist * step;

    if map.is_position_walkable(new_x, new_y) {
        Step::Moved { x: new_x, y: new_y }
    } else {
        Step::Blocked
    }
}

fn advance_along_path(
    x: f32,
    y: f32,
    target: &mut MovementTarget,
    delta: f32,
    speed: f32,
) -> Step {
    let (tile_x, tile_y) = target.path[target.path_index];
    let (next_x, next_y) = GameMap::tile_center(tile_x, tile_y);

    let dist = distance(x, y, next_x, next_y);
    if dist < ARRIVE_THRESHOLD {
        target.path_index += 1;
        return Step::WaypointReached;
    }

    let step = (speed * delta).min(dist);
    Step::Moved {
        x: x + (next_x - x) / dist * step,
        y: y + (next_y - y) / dist * step,
    }
}
