//! Enemy species and level scaling shared between client and server.

use serde::{Deserialize, Serialize};

/// Enemy species
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EnemySpecies {
    Sheep = 0,
    Wolf = 1,
    Bear = 2,
}

impl EnemySpecies {
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "Sheep" => Some(Self::Sheep),
            "Wolf" => Some(Self::Wolf),
            "Bear" => Some(Self::Bear),
            _ => None,
        }
    }

    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Sheep => "Sheep",
            Self::Wolf => "Wolf",
            Self::Bear => "Bear",
        }
    }

    /// Level-1 health.
    pub fn base_health(&self) -> i32 {
        match self {
            Self::Sheep => 20,
            Self::Wolf => 40,
            Self::Bear => 80,
        }
    }

    /// Level-1 experience reward for the killing player.
    pub fn base_xp_reward(&self) -> i32 {
        match self {
            Self::Sheep => 10,
            Self::Wolf => 25,
            Self::Bear => 100,
        }
    }

    /// Maximum health at a given level: +20% of base per level past the first,
    /// truncated to whole points.
    pub fn health_for_level(&self, level: i32) -> i32 {
        let base = self.base_health();
        base + (level - 1) * (base as f32 * 0.2) as i32
    }

    /// Experience granted for a kill at a given level: +25% of base per level
    /// past the first, truncated to whole points.
    pub fn xp_reward(&self, level: i32) -> i32 {
        let base = self.base_xp_reward();
        base + (level - 1) * (base as f32 * 0.25) as i32
    }
}

/// Level assignment by map area: level 1 at the map center rising linearly to
/// 10 at the corners.
pub fn level_for_area(x: f32, y: f32, map_width: usize, map_height: usize, tile_size: f32) -> i32 {
    let center_x = map_width as f32 / 2.0 * tile_size;
    let center_y = map_height as f32 / 2.0 * tile_size;

    let dx = x - center_x;
    let dy = y - center_y;
    let distance = (dx * dx + dy * dy).sqrt();

    let max_distance = (center_x * center_x + center_y * center_y).sqrt();
    let normalized = (distance / max_distance).clamp(0.0, 1.0);

    ((1.0 + normalized * 9.0) as i32).clamp(1, 10)
}
