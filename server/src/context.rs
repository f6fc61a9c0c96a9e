//! Shared simulation state.
//!
//! One [`SimContext`] is built at startup and handed to the tick task and
//! every connection task. All maps inside are keyed by entity id and safe
//! for concurrent per-key access; nothing here takes a global lock.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;

use valewood_shared::CharacterClass;

use crate::accounts::AccountStore;
use crate::chat::ChatLog;
use crate::enemies::ai::PlayerRef;
use crate::enemies::EnemyRegistry;
use crate::map::GameMap;
use crate::movement::MovementTarget;
use crate::net::registry::ConnectionRegistry;

/// Seconds a dead player must stay down before a RESPAWN is honored.
pub const MIN_DEATH_TIME: f32 = 2.0;

#[derive(Debug, Clone)]
pub struct PlayerData {
    pub id: String,
    pub username: String,
    pub class: CharacterClass,
    pub x: f32,
    pub y: f32,
    pub current_health: i32,
    pub max_health: i32,
    pub level: i32,
    pub experience: i32,
}

impl PlayerData {
    pub fn new(id: String, username: String, class: CharacterClass, x: f32, y: f32) -> Self {
        let max_health = class.base_max_health();
        Self {
            id,
            username,
            class,
            x,
            y,
            current_health: max_health,
            max_health,
            level: 1,
            experience: 0,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.current_health > 0
    }

    pub fn take_damage(&mut self, amount: i32) {
        self.current_health = (self.current_health - amount).max(0);
    }

    pub fn heal(&mut self, amount: i32) {
        self.current_health = (self.current_health + amount).min(self.max_health);
    }

    pub fn set_health(&mut self, health: i32) {
        self.current_health = health.clamp(0, self.max_health);
    }
}

pub struct SimContext {
    pub map: GameMap,
    pub players: DashMap<String, PlayerData>,
    pub movement_targets: DashMap<String, MovementTarget>,
    pub enemies: EnemyRegistry,
    pub connections: ConnectionRegistry,
    pub accounts: AccountStore,
    pub chat: ChatLog,
    /// When each dead player died, for the respawn gate.
    pub death_times: DashMap<String, Instant>,
}

impl SimContext {
    pub fn new(map: GameMap, accounts: AccountStore) -> Arc<Self> {
        let enemies = EnemyRegistry::new();
        enemies.seed(&map);

        Arc::new(Self {
            map,
            players: DashMap::new(),
            movement_targets: DashMap::new(),
            enemies,
            connections: ConnectionRegistry::new(),
            accounts,
            chat: ChatLog::new(),
            death_times: DashMap::new(),
        })
    }

    /// Context without seeded enemies, for tests that want an empty world.
    #[cfg(test)]
    pub fn new_empty(map: GameMap) -> Arc<Self> {
        Arc::new(Self {
            map,
            players: DashMap::new(),
            movement_targets: DashMap::new(),
            enemies: EnemyRegistry::new(),
            connections: ConnectionRegistry::new(),
            accounts: AccountStore::load(std::path::PathBuf::from("/nonexistent/users.json")),
            chat: ChatLog::new(),
            death_times: DashMap::new(),
        })
    }

    /// Player positions as the enemy AI sees them.
    pub fn player_refs(&self) -> Vec<PlayerRef> {
        self.players
            .iter()
            .map(|p| PlayerRef {
                id: p.id.clone(),
                x: p.x,
                y: p.y,
            })
            .collect()
    }

    /// Write every live player's progress into the account table.
    pub fn record_all_progress(&self) {
        for player in self.players.iter() {
            self.accounts.record_progress(&player);
        }
    }
}
