//! Enemy behavior state machine.
//!
//! Each enemy is driven by one function per tick that mutates its record,
//! its movement target, and its AI state in place. States:
//!
//! * Idle: patrol randomly around home, watch for players
//! * Chase: follow a specific player while it stays in detection range
//! * Return: walk (or teleport) home after roaming too far

use rand::Rng;

use crate::map::GameMap;
use crate::movement::{distance, MovementTarget, PATH_REFRESH_INTERVAL};
use crate::pathfinding::find_path;

use super::{
    Enemy, DETECTION_RANGE, HOME_ARRIVE_THRESHOLD, IDLE_TARGET_CHANGE_TIME, MAX_ROAM_DISTANCE,
    PATROL_MAX_DISTANCE, PATROL_MIN_DISTANCE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorState {
    Idle,
    Chase,
    Return,
}

impl BehaviorState {
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Chase => "CHASE",
            Self::Return => "RETURN",
        }
    }

    /// Walk speed in world units per second while in this state.
    pub fn speed(&self) -> f32 {
        match self {
            Self::Idle => 30.0,
            Self::Chase => 70.0,
            Self::Return => 60.0,
        }
    }
}

/// Per-enemy AI bookkeeping. The chased player id lives on the movement
/// target, not here.
#[derive(Debug, Clone)]
pub struct AiState {
    pub state: BehaviorState,
    /// Seconds since the last patrol destination change.
    pub idle_timer: f32,
}

impl AiState {
    pub fn new() -> Self {
        Self {
            state: BehaviorState::Idle,
            idle_timer: 0.0,
        }
    }
}

/// A player's position as the AI sees it.
#[derive(Debug, Clone)]
pub struct PlayerRef {
    pub id: String,
    pub x: f32,
    pub y: f32,
}

/// Advance one enemy's behavior by `delta` seconds.
pub fn update_enemy(
    enemy: &mut Enemy,
    ai: &mut AiState,
    target: &mut MovementTarget,
    players: &[PlayerRef],
    map: &GameMap,
    delta: f32,
) {
    ai.idle_timer += delta;

    match ai.state {
        BehaviorState::Idle => update_idle(enemy, ai, target, players, map, delta),
        BehaviorState::Chase => update_chase(enemy, ai, target, players, map, delta),
        BehaviorState::Return => update_return(enemy, ai, target, players, map, delta),
    }
}

fn update_idle(
    enemy: &mut Enemy,
    ai: &mut AiState,
    target: &mut MovementTarget,
    players: &[PlayerRef],
    map: &GameMap,
    delta: f32,
) {
    if let Some(player) = nearest_player_in_range(enemy, players) {
        start_chasing(ai, target, player);
        return;
    }

    // No one in sight, keep patrolling
    if ai.idle_timer >= IDLE_TARGET_CHANGE_TIME || !target.moving {
        ai.idle_timer = 0.0;
        set_random_patrol_target(enemy, target, map);
    } else if target.path.is_empty() && target.path_timer >= PATH_REFRESH_INTERVAL {
        target.path_timer = 0.0;
        let path = find_path(
            map,
            map.world_to_tile(enemy.x),
            map.world_to_tile(enemy.y),
            map.world_to_tile(target.target_x),
            map.world_to_tile(target.target_y),
        );
        if !path.is_empty() {
            target.set_path(path);
        }
    } else {
        target.path_timer += delta;
    }
}

fn update_chase(
    enemy: &mut Enemy,
    ai: &mut AiState,
    target: &mut MovementTarget,
    players: &[PlayerRef],
    map: &GameMap,
    delta: f32,
) {
    let player = players.iter().find(|p| p.id == target.target_id);

    let player = match player {
        Some(player) => player,
        None => {
            // Target vanished (disconnect); fall back to patrolling and pick
            // a fresh destination right away
            ai.state = BehaviorState::Idle;
            ai.idle_timer = IDLE_TARGET_CHANGE_TIME;
            return;
        }
    };

    let dist = distance(enemy.x, enemy.y, player.x, player.y);
    if dist <= DETECTION_RANGE {
        // Keep the destination glued to the player, repath periodically
        target.target_x = player.x;
        target.target_y = player.y;

        target.path_timer += delta;
        if target.path_timer >= PATH_REFRESH_INTERVAL {
            target.path_timer = 0.0;
            let path = find_path(
                map,
                map.world_to_tile(enemy.x),
                map.world_to_tile(enemy.y),
                map.world_to_tile(player.x),
                map.world_to_tile(player.y),
            );
            let has_path = !path.is_empty();
            target.path = path;
            target.path_index = 0;
            target.moving = has_path;
        }
        return;
    }

    // Player escaped
    let home_dist = distance(enemy.x, enemy.y, enemy.home_x, enemy.home_y);
    if home_dist > MAX_ROAM_DISTANCE {
        ai.state = BehaviorState::Return;
        target.target_id.clear();
        target.target_x = enemy.home_x;
        target.target_y = enemy.home_y;
        target.force_path_refresh();
    } else {
        ai.state = BehaviorState::Idle;
        ai.idle_timer = IDLE_TARGET_CHANGE_TIME;
    }
}

fn update_return(
    enemy: &mut Enemy,
    ai: &mut AiState,
    target: &mut MovementTarget,
    players: &[PlayerRef],
    map: &GameMap,
    delta: f32,
) {
    target.path_timer += delta;
    if target.path_timer >= PATH_REFRESH_INTERVAL {
        target.path_timer = 0.0;
        let path = find_path(
            map,
            map.world_to_tile(enemy.x),
            map.world_to_tile(enemy.y),
            map.world_to_tile(enemy.home_x),
            map.world_to_tile(enemy.home_y),
        );
        if path.is_empty() {
            // No way back on foot
            enemy.x = enemy.home_x;
            enemy.y = enemy.home_y;
            ai.state = BehaviorState::Idle;
            ai.idle_timer = 0.0;
        } else {
            target.set_path(path);
        }
    }

    if distance(enemy.x, enemy.y, enemy.home_x, enemy.home_y) < HOME_ARRIVE_THRESHOLD {
        ai.state = BehaviorState::Idle;
        ai.idle_timer = 0.0;
    }

    // A player wandering close interrupts the walk home
    if let Some(player) = nearest_player_in_range(enemy, players) {
        start_chasing(ai, target, player);
    }
}

fn nearest_player_in_range<'a>(enemy: &Enemy, players: &'a [PlayerRef]) -> Option<&'a PlayerRef> {
    let mut closest: Option<(&PlayerRef, f32)> = None;
    for player in players {
        let dist = distance(enemy.x, enemy.y, player.x, player.y);
        if dist < DETECTION_RANGE && closest.map_or(true, |(_, best)| dist < best) {
            closest = Some((player, dist));
        }
    }
    closest.map(|(player, _)| player)
}

fn start_chasing(ai: &mut AiState, target: &mut MovementTarget, player: &PlayerRef) {
    ai.state = BehaviorState::Chase;
    target.target_id = player.id.clone();
    target.target_x = player.x;
    target.target_y = player.y;
    target.moving = true;
    target.force_path_refresh();
}

/// Pick a patrol destination 30-100 units from home in a random direction,
/// snapped to the center of a valid tile.
pub fn set_random_patrol_target(enemy: &Enemy, target: &mut MovementTarget, map: &GameMap) {
    let mut rng = rand::thread_rng();
    let angle = rng.gen_range(0.0..std::f32::consts::TAU);
    let dist = rng.gen_range(PATROL_MIN_DISTANCE..PATROL_MAX_DISTANCE);

    let raw_x = enemy.home_x + dist * angle.cos();
    let raw_y = enemy.home_y + dist * angle.sin();

    let tile_x = map.world_to_tile(raw_x).clamp(0, map.width() as i32 - 1);
    let tile_y = map.world_to_tile(raw_y).clamp(0, map.height() as i32 - 1);
    let (x, y) = GameMap::tile_center(tile_x, tile_y);

    target.target_id.clear();
    target.target_x = x;
    target.target_y = y;
    target.moving = true;
    target.path.clear();
    target.path_index = 0;
    target.force_path_refresh();
}
