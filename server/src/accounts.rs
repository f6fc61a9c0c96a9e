//! Account persistence.
//!
//! Accounts live in a flat JSON file. Registration and character management
//! happen in an external service; this store only looks up the record a JOIN
//! refers to and writes back combat progress (health, level, experience).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use valewood_shared::CharacterClass;

use crate::context::PlayerData;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub nickname: String,
    pub character_class: u8,
    pub level: i32,
    pub experience: i32,
    pub max_health: i32,
    pub current_health: i32,
}

impl UserRecord {
    pub fn class(&self) -> CharacterClass {
        CharacterClass::from_u8(self.character_class).unwrap_or(CharacterClass::Warrior)
    }
}

/// File-backed user table. A missing or unreadable file is not fatal; the
/// server then treats every JOIN as an unregistered guest.
pub struct AccountStore {
    path: PathBuf,
    users: Mutex<HashMap<String, UserRecord>>,
}

impl AccountStore {
    pub fn load(path: PathBuf) -> Self {
        let users = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Vec<UserRecord>>(&raw) {
                Ok(records) => {
                    info!("Loaded {} user accounts from {}", records.len(), path.display());
                    records.into_iter().map(|r| (r.id.clone(), r)).collect()
                }
                Err(e) => {
                    warn!("Failed to parse {}: {}; starting without accounts", path.display(), e);
                    HashMap::new()
                }
            },
            Err(e) => {
                warn!("No account file at {}: {}; starting without accounts", path.display(), e);
                HashMap::new()
            }
        };

        Self {
            path,
            users: Mutex::new(users),
        }
    }

    pub fn get(&self, user_id: &str) -> Option<UserRecord> {
        self.users
            .lock()
            .ok()
            .and_then(|users| users.get(user_id).cloned())
    }

    /// Write a player's live combat progress back into their record. Players
    /// without a record (guests) are skipped.
    pub fn record_progress(&self, player: &PlayerData) {
        if let Ok(mut users) = self.users.lock() {
            if let Some(record) = users.get_mut(&player.id) {
                record.level = player.level;
                record.experience = player.experience;
                record.max_health = player.max_health;
                record.current_health = player.current_health;
            }
        }
    }

    /// Persist the table to disk. Errors are logged, not propagated; losing
    /// one save leaves the previous file intact.
    pub fn save(&self) {
        let snapshot: Vec<UserRecord> = match self.users.lock() {
            Ok(users) => users.values().cloned().collect(),
            Err(_) => return,
        };

        match serde_json::to_string_pretty(&snapshot) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.path, json) {
                    warn!("Failed to save accounts to {}: {}", self.path.display(), e);
                }
            }
            Err(e) => warn!("Failed to serialize accounts: {}", e),
        }
    }
}
