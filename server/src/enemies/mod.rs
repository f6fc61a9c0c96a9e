//! Enemy entities: spawning, registry, per-tick movement and respawns.

pub mod ai;

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use log::{debug, info};

use valewood_shared::{species, EnemySnapshot, EnemySpecies, TILE_SIZE};

use crate::map::GameMap;
use crate::movement::{self, MovementTarget, Step};

use ai::{AiState, BehaviorState, PlayerRef};

/// Radius within which an enemy notices a player.
pub const DETECTION_RANGE: f32 = 200.0;

/// Distance from home beyond which a frustrated chaser walks back.
pub const MAX_ROAM_DISTANCE: f32 = 200.0;

/// Seconds between patrol destination changes while idle.
pub const IDLE_TARGET_CHANGE_TIME: f32 = 5.0;

/// Seconds a dead enemy stays gone.
pub const RESPAWN_TIME: f32 = 15.0;

/// Patrol destinations land this far from home.
pub const PATROL_MIN_DISTANCE: f32 = 30.0;
pub const PATROL_MAX_DISTANCE: f32 = 100.0;

/// An enemy within this distance of home counts as having arrived.
pub const HOME_ARRIVE_THRESHOLD: f32 = 20.0;

/// Enemy ids are numeric strings starting here, so they never collide with
/// account-issued player ids.
const FIRST_ENEMY_ID: u64 = 10000;

#[derive(Debug, Clone)]
pub struct Enemy {
    pub id: String,
    pub species: EnemySpecies,
    pub x: f32,
    pub y: f32,
    pub level: i32,
    pub current_health: i32,
    pub max_health: i32,
    pub home_x: f32,
    pub home_y: f32,
    pub alive: bool,
}

/// All live enemy state, keyed by enemy id. The per-key maps are mutated
/// concurrently by the tick task and connection tasks.
pub struct EnemyRegistry {
    enemies: DashMap<String, Enemy>,
    targets: DashMap<String, MovementTarget>,
    ai: DashMap<String, AiState>,
    respawns: DashMap<String, f32>,
    next_id: AtomicU64,
}

impl EnemyRegistry {
    pub fn new() -> Self {
        Self {
            enemies: DashMap::new(),
            targets: DashMap::new(),
            ai: DashMap::new(),
            respawns: DashMap::new(),
            next_id: AtomicU64::new(FIRST_ENEMY_ID),
        }
    }

    /// Spawn one enemy. Without an explicit level the map area decides it.
    pub fn spawn(
        &self,
        species: EnemySpecies,
        x: f32,
        y: f32,
        level: Option<i32>,
        map: &GameMap,
    ) -> String {
        let id = self
            .next_id
            .fetch_add(1, Ordering::Relaxed)
            .to_string();

        let level = level.unwrap_or_else(|| {
            species::level_for_area(x, y, map.width(), map.height(), TILE_SIZE)
        });
        let health = species.health_for_level(level);

        let enemy = Enemy {
            id: id.clone(),
            species,
            x,
            y,
            level,
            current_health: health,
            max_health: health,
            home_x: x,
            home_y: y,
            alive: true,
        };

        let mut target = MovementTarget::new(x, y, 0.0);
        ai::set_random_patrol_target(&enemy, &mut target, map);

        info!(
            "Spawned {} level {} with {} HP at ({}, {})",
            species.wire_name(),
            level,
            health,
            x,
            y
        );

        self.enemies.insert(id.clone(), enemy);
        self.targets.insert(id.clone(), target);
        self.ai.insert(id.clone(), AiState::new());
        id
    }

    /// Populate the world with the fixed starting roster: sheep near the
    /// center, wolves further out, bears at the fringes.
    pub fn seed(&self, map: &GameMap) {
        let roster: &[(EnemySpecies, f32, f32)] = &[
            (EnemySpecies::Sheep, 900.0, 900.0),
            (EnemySpecies::Sheep, 1020.0, 880.0),
            (EnemySpecies::Sheep, 860.0, 1040.0),
            (EnemySpecies::Wolf, 600.0, 1320.0),
            (EnemySpecies::Wolf, 1350.0, 620.0),
            (EnemySpecies::Wolf, 1400.0, 1400.0),
            (EnemySpecies::Bear, 220.0, 220.0),
            (EnemySpecies::Bear, 1700.0, 1720.0),
            (EnemySpecies::Bear, 180.0, 1700.0),
        ];
        for &(species, x, y) in roster {
            self.spawn(species, x, y, None, map);
        }
    }

    pub fn get(&self, id: &str) -> Option<Enemy> {
        self.enemies.get(id).map(|e| e.clone())
    }

    pub fn alive_count(&self) -> usize {
        self.enemies.iter().filter(|e| e.alive).count()
    }

    /// Apply damage; on death the enemy leaves the live set and its respawn
    /// countdown starts. Returns (remaining health, died). `None` for an
    /// unknown or already dead enemy.
    pub fn damage(&self, id: &str, amount: i32) -> Option<(i32, bool)> {
        let mut enemy = self.enemies.get_mut(id)?;
        if !enemy.alive {
            return None;
        }

        enemy.current_health -= amount;
        if enemy.current_health <= 0 {
            enemy.current_health = 0;
            enemy.alive = false;
            self.respawns.insert(id.to_string(), RESPAWN_TIME);
            debug!("Enemy {} died, respawn in {}s", id, RESPAWN_TIME);
            return Some((0, true));
        }
        Some((enemy.current_health, false))
    }

    /// Tick respawn countdowns; expired enemies come back at home with full
    /// health for their level, same id, same species, same level.
    pub fn update_respawns(&self, delta: f32, map: &GameMap) -> Vec<EnemySnapshot> {
        let mut expired: Vec<String> = Vec::new();
        for mut entry in self.respawns.iter_mut() {
            *entry.value_mut() -= delta;
            if *entry.value() <= 0.0 {
                expired.push(entry.key().clone());
            }
        }

        let mut respawned = Vec::new();
        for id in expired {
            self.respawns.remove(&id);
            if let Some(snapshot) = self.respawn(&id, map) {
                respawned.push(snapshot);
            }
        }
        respawned
    }

    fn respawn(&self, id: &str, map: &GameMap) -> Option<EnemySnapshot> {
        let mut enemy = self.enemies.get_mut(id)?;
        let health = enemy.species.health_for_level(enemy.level);
        enemy.x = enemy.home_x;
        enemy.y = enemy.home_y;
        enemy.current_health = health;
        enemy.max_health = health;
        enemy.alive = true;

        let mut target = MovementTarget::new(enemy.home_x, enemy.home_y, 0.0);
        ai::set_random_patrol_target(&enemy, &mut target, map);
        let snapshot = snapshot_of(&enemy, BehaviorState::Idle.wire_name());
        drop(enemy);

        self.targets.insert(id.to_string(), target);
        self.ai.insert(id.to_string(), AiState::new());

        info!("Enemy {} respawned at home", id);
        Some(snapshot)
    }

    /// Run the behavior state machine for every live enemy.
    pub fn update_behavior(&self, players: &[PlayerRef], map: &GameMap, delta: f32) {
        let ids: Vec<String> = self
            .enemies
            .iter()
            .filter(|e| e.alive)
            .map(|e| e.key().clone())
            .collect();

        for id in ids {
            let Some(mut enemy) = self.enemies.get_mut(&id) else { continue };
            let Some(mut ai_state) = self.ai.get_mut(&id) else { continue };
            let Some(mut target) = self.targets.get_mut(&id) else { continue };
            ai::update_enemy(&mut enemy, &mut ai_state, &mut target, players, map, delta);
        }
    }

    /// Move every live enemy along its path at the speed its state allows.
    /// Returns ids of enemies whose position changed this tick.
    pub fn update_positions(&self, map: &GameMap, delta: f32) -> Vec<String> {
        let ids: Vec<String> = self.targets.iter().map(|t| t.key().clone()).collect();
        let mut moved = Vec::new();

        for id in ids {
            let Some(mut enemy) = self.enemies.get_mut(&id) else { continue };
            if !enemy.alive {
                continue;
            }
            let Some(mut target) = self.targets.get_mut(&id) else { continue };
            let state = self
                .ai
                .get(&id)
                .map(|a| a.state)
                .unwrap_or(BehaviorState::Idle);

            match movement::advance(enemy.x, enemy.y, &mut target, map, delta, state.speed()) {
                Step::Moved { x, y } => {
                    enemy.x = x;
                    enemy.y = y;
                    moved.push(id.clone());
                }
                Step::Arrived => {
                    if state == BehaviorState::Idle {
                        // Pick a new patrol point on the next behavior tick
                        if let Some(mut ai_state) = self.ai.get_mut(&id) {
                            ai_state.idle_timer = IDLE_TARGET_CHANGE_TIME;
                        }
                    }
                }
                Step::Blocked => {
                    // Re-path on the next refresh rather than walking into
                    // the wall again
                    target.force_path_refresh();
                }
                Step::Idle | Step::WaypointReached => {}
            }
        }

        moved
    }

    pub fn state_name(&self, id: &str) -> &'static str {
        self.ai
            .get(id)
            .map(|a| a.state.wire_name())
            .unwrap_or("IDLE")
    }

    /// Snapshots of all live enemies.
    pub fn snapshots(&self) -> Vec<EnemySnapshot> {
        let mut out: Vec<EnemySnapshot> = self
            .enemies
            .iter()
            .filter(|e| e.alive)
            .map(|e| snapshot_of(&e, self.state_name(e.key())))
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    /// Snapshots for a specific set of enemy ids, skipping dead ones.
    pub fn snapshots_for(&self, ids: &[String]) -> Vec<EnemySnapshot> {
        ids.iter()
            .filter_map(|id| {
                let enemy = self.enemies.get(id)?;
                if !enemy.alive {
                    return None;
                }
                Some(snapshot_of(&enemy, self.state_name(id)))
            })
            .collect()
    }
}

fn snapshot_of(enemy: &Enemy, state: &'static str) -> EnemySnapshot {
    EnemySnapshot {
        id: enemy.id.clone(),
        x: enemy.x,
        y: enemy.y,
        species: enemy.species,
        current_health: enemy.current_health,
        max_health: enemy.max_health,
        state,
        level: enemy.level,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_map() -> GameMap {
        let row = vec!["0"; 120].join(",");
        let csv = vec![row; 120].join("\n");
        GameMap::from_csv(&csv).unwrap()
    }

    #[test]
    fn ids_count_up_from_ten_thousand() {
        let map = open_map();
        let registry = EnemyRegistry::new();
        let first = registry.spawn(EnemySpecies::Sheep, 900.0, 900.0, None, &map);
        let second = registry.spawn(EnemySpecies::Wolf, 600.0, 600.0, None, &map);
        assert_eq!(first, "10000");
        assert_eq!(second, "10001");
    }

    #[test]
    fn area_levels_apply_to_spawned_enemies() {
        let map = open_map();
        let registry = EnemyRegistry::new();
        let center = registry.spawn(EnemySpecies::Sheep, 960.0, 960.0, None, &map);
        let corner = registry.spawn(EnemySpecies::Bear, 16.0, 16.0, None, &map);
        assert_eq!(registry.get(&center).unwrap().level, 1);
        assert!(registry.get(&corner).unwrap().level >= 9);
    }

    #[test]
    fn lethal_damage_starts_the_respawn_clock() {
        let map = open_map();
        let registry = EnemyRegistry::new();
        let id = registry.spawn(EnemySpecies::Sheep, 900.0, 900.0, Some(1), &map);

        assert_eq!(registry.damage(&id, 5), Some((15, false)));
        assert_eq!(registry.damage(&id, 999), Some((0, true)));
        assert!(!registry.get(&id).unwrap().alive);

        // Hitting a corpse does nothing
        assert_eq!(registry.damage(&id, 5), None);
    }

    #[test]
    fn respawn_restores_the_same_enemy_at_home() {
        let map = open_map();
        let registry = EnemyRegistry::new();
        let id = registry.spawn(EnemySpecies::Wolf, 640.0, 640.0, Some(3), &map);

        // Drag it somewhere else, then kill it
        registry.enemies.get_mut(&id).unwrap().x = 800.0;
        registry.damage(&id, 999);

        // One second short of the timer: still dead
        assert!(registry.update_respawns(RESPAWN_TIME - 1.0, &map).is_empty());
        let back = registry.update_respawns(1.5, &map);
        assert_eq!(back.len(), 1);

        let enemy = registry.get(&id).unwrap();
        assert!(enemy.alive);
        assert_eq!(enemy.x, 640.0);
        assert_eq!(enemy.level, 3);
        assert_eq!(enemy.current_health, EnemySpecies::Wolf.health_for_level(3));
        assert!(registry.respawns.is_empty());
    }

    #[test]
    fn snapshots_exclude_the_dead() {
        let map = open_map();
        let registry = EnemyRegistry::new();
        let a = registry.spawn(EnemySpecies::Sheep, 900.0, 900.0, Some(1), &map);
        let b = registry.spawn(EnemySpecies::Sheep, 920.0, 900.0, Some(1), &map);
        registry.damage(&a, 999);

        let snaps = registry.snapshots();
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].id, b);
    }

    #[test]
    fn returning_enemy_walks_home_and_settles_idle() {
        let map = open_map();
        let registry = EnemyRegistry::new();
        let id = registry.spawn(EnemySpecies::Wolf, 320.0, 320.0, Some(1), &map);

        // Drag it far from home mid-chase, then leave it to walk back
        registry.enemies.get_mut(&id).unwrap().x = 480.0;
        registry.ai.get_mut(&id).unwrap().state = BehaviorState::Return;
        {
            let mut target = registry.targets.get_mut(&id).unwrap();
            target.target_x = 320.0;
            target.target_y = 320.0;
            target.force_path_refresh();
        }

        let mut settled = false;
        for _ in 0..400 {
            registry.update_behavior(&[], &map, 0.05);
            if registry.state_name(&id) == "IDLE" {
                settled = true;
                break;
            }
            registry.update_positions(&map, 0.05);
        }

        assert!(settled, "enemy never settled back to idle");
        let enemy = registry.get(&id).unwrap();
        assert!(movement::distance(enemy.x, enemy.y, 320.0, 320.0) < HOME_ARRIVE_THRESHOLD);
    }

    #[test]
    fn chase_speed_beats_patrol_speed() {
        let map = open_map();
        let registry = EnemyRegistry::new();
        let id = registry.spawn(EnemySpecies::Wolf, 640.0, 640.0, Some(1), &map);

        // Plant a straight path and measure one idle-speed step
        {
            let mut target = registry.targets.get_mut(&id).unwrap();
            target.target_x = 740.0;
            target.target_y = 640.0;
            target.set_path(vec![(46, 40)]);
        }
        let before = registry.get(&id).unwrap().x;
        registry.update_positions(&map, 0.1);
        let idle_step = registry.get(&id).unwrap().x - before;

        // Same setup at chase speed
        registry.ai.get_mut(&id).unwrap().state = BehaviorState::Chase;
        let before = registry.get(&id).unwrap().x;
        registry.update_positions(&map, 0.1);
        let chase_step = registry.get(&id).unwrap().x - before;

        assert!(idle_step > 0.0);
        assert!(chase_step > idle_step * 2.0);
    }
}
