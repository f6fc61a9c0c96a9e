//! Combat class definitions shared between client and server.

use serde::{Deserialize, Serialize};

/// Character class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum CharacterClass {
    Archer = 0,
    Mage = 1,
    Warrior = 2,
}

impl CharacterClass {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Archer),
            1 => Some(Self::Mage),
            2 => Some(Self::Warrior),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Archer => "Archer",
            Self::Mage => "Mage",
            Self::Warrior => "Warrior",
        }
    }

    /// Starting maximum health for a fresh level-1 character.
    pub fn base_max_health(&self) -> i32 {
        match self {
            Self::Warrior => 150,
            Self::Archer => 100,
            Self::Mage => 80,
        }
    }

    /// Attack tuning for this class.
    pub fn profile(&self) -> ClassProfile {
        match self {
            Self::Archer => ClassProfile {
                attack_cooldown: 3.0,
                attack_range: 300.0,
                projectile_speed: 400.0,
            },
            Self::Mage => ClassProfile {
                attack_cooldown: 4.0,
                attack_range: 250.0,
                projectile_speed: 350.0,
            },
            Self::Warrior => ClassProfile {
                attack_cooldown: 3.0,
                attack_range: 45.0,
                projectile_speed: 0.0,
            },
        }
    }

    pub fn attack_kind(&self) -> AttackKind {
        match self {
            Self::Archer => AttackKind::Arrow,
            Self::Mage => AttackKind::Fireball,
            Self::Warrior => AttackKind::Melee,
        }
    }
}

/// Per-class attack parameters. Warriors have no projectile, so their
/// projectile speed is zero and their range is the melee reach.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassProfile {
    /// Seconds between attacks
    pub attack_cooldown: f32,
    /// Maximum engagement distance in world units
    pub attack_range: f32,
    /// World units per second, zero for melee
    pub projectile_speed: f32,
}

/// Damage applied when an attack of unlisted kind lands.
pub const FALLBACK_DAMAGE: i32 = 5;

/// The three attack kinds carried on the wire in HIT frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackKind {
    Arrow,
    Fireball,
    Melee,
}

impl AttackKind {
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "ARROW" => Some(Self::Arrow),
            "FIREBALL" => Some(Self::Fireball),
            "MELEE" => Some(Self::Melee),
            _ => None,
        }
    }

    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Arrow => "ARROW",
            Self::Fireball => "FIREBALL",
            Self::Melee => "MELEE",
        }
    }

    /// Flat damage per hit, not randomized and not scaled by level.
    pub fn damage(&self) -> i32 {
        match self {
            Self::Arrow => 12,
            Self::Fireball => 8,
            Self::Melee => 15,
        }
    }

    /// Damage for a wire attack-type string, falling back for unknown kinds.
    pub fn damage_for(value: &str) -> i32 {
        Self::from_wire(value).map_or(FALLBACK_DAMAGE, |kind| kind.damage())
    }

    /// How far the projectile travels from its start point when the server
    /// sweeps for hits. Melee strikes in place.
    pub fn travel_distance(&self) -> f32 {
        match self {
            Self::Arrow => 200.0,
            Self::Fireball => 100.0,
            Self::Melee => 0.0,
        }
    }

    /// Hit radius around the projectile line (or attacker for melee).
    pub fn hit_radius(&self) -> f32 {
        match self {
            Self::Arrow => 15.0,
            Self::Fireball => 30.0,
            Self::Melee => 40.0,
        }
    }
}
