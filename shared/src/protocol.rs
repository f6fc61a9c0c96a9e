//! Wire protocol shared between client and server.
//!
//! Frames are UTF-8 text, pipe-delimited: `TYPE|field1|field2|...`.
//! Enemy list payloads pack one record per enemy, comma-separated fields,
//! semicolon-separated records.

use crate::classes::CharacterClass;
use crate::species::EnemySpecies;

/// Server tick rate in Hz
pub const SERVER_TICK_RATE: u32 = 20;

/// Default server port
pub const DEFAULT_PORT: u16 = 8080;

/// Tile edge length in world units
pub const TILE_SIZE: f32 = 16.0;

/// Prefix clients put in front of enemy ids in HIT frames
pub const ENEMY_ID_PREFIX: &str = "enemy_";

/// A frame received from a client, already split and validated.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    Join {
        x: f32,
        y: f32,
        player_id: String,
        username: String,
        class: CharacterClass,
    },
    MoveTo {
        target_x: f32,
        target_y: f32,
        stop_range: f32,
        player_id: String,
    },
    RangedAttack(AttackIntent),
    SpellAttack(AttackIntent),
    MeleeAttack(AttackIntent),
    Hit {
        target_id: String,
        attacker_id: String,
        attack_type: String,
    },
    Damage {
        target_id: String,
        amount: i32,
    },
    Heal {
        target_id: String,
        amount: i32,
    },
    HealthUpdate {
        target_id: String,
        health: i32,
    },
    Respawn {
        player_id: String,
    },
    Chat {
        sender_id: String,
        sender_name: String,
        content: String,
    },
    Pathfind {
        start_x: f32,
        start_y: f32,
        end_x: f32,
        end_y: f32,
    },
    GetEnemies,
    DamageEnemy {
        enemy_id: String,
        amount: i32,
    },
}

/// Origin and direction of an attack swing or projectile.
#[derive(Debug, Clone, PartialEq)]
pub struct AttackIntent {
    pub start_x: f32,
    pub start_y: f32,
    pub dir_x: f32,
    pub dir_y: f32,
    pub caster_id: String,
}

/// Why a frame could not be turned into a [`ClientCommand`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Command type not recognized. The server echoes these back verbatim.
    UnknownType,
    /// Recognized type but missing or unparsable fields. Logged and dropped.
    Malformed(&'static str),
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownType => write!(f, "unknown command type"),
            Self::Malformed(what) => write!(f, "malformed frame: {}", what),
        }
    }
}

impl ClientCommand {
    pub fn parse(frame: &str) -> Result<Self, FrameError> {
        let parts: Vec<&str> = frame.split('|').collect();

        match parts[0] {
            "JOIN" => {
                if parts.len() < 4 {
                    return Err(FrameError::Malformed("JOIN needs x|y|playerId"));
                }
                let x = float_field(&parts, 1, "JOIN x")?;
                let y = float_field(&parts, 2, "JOIN y")?;
                let username = parts.get(4).unwrap_or(&"Unknown").to_string();
                // Missing class defaults to ordinal 0, out-of-range to Warrior
                let ordinal = parts.get(5).and_then(|v| v.parse::<u8>().ok()).unwrap_or(0);
                let class = CharacterClass::from_u8(ordinal).unwrap_or(CharacterClass::Warrior);
                Ok(Self::Join {
                    x,
                    y,
                    player_id: parts[3].to_string(),
                    username,
                    class,
                })
            }
            "MOVE_TO" => {
                if parts.len() < 5 {
                    return Err(FrameError::Malformed("MOVE_TO needs x|y|range|playerId"));
                }
                Ok(Self::MoveTo {
                    target_x: float_field(&parts, 1, "MOVE_TO x")?,
                    target_y: float_field(&parts, 2, "MOVE_TO y")?,
                    stop_range: float_field(&parts, 3, "MOVE_TO range")?,
                    player_id: parts[4].to_string(),
                })
            }
            "RANGED_ATTACK" | "SPELL_ATTACK" | "MELEE_ATTACK" => {
                if parts.len() < 6 {
                    return Err(FrameError::Malformed("attack needs x|y|dx|dy|casterId"));
                }
                let intent = AttackIntent {
                    start_x: float_field(&parts, 1, "attack x")?,
                    start_y: float_field(&parts, 2, "attack y")?,
                    dir_x: float_field(&parts, 3, "attack dx")?,
                    dir_y: float_field(&parts, 4, "attack dy")?,
                    caster_id: parts[5].to_string(),
                };
                match parts[0] {
                    "RANGED_ATTACK" => Ok(Self::RangedAttack(intent)),
                    "SPELL_ATTACK" => Ok(Self::SpellAttack(intent)),
                    _ => Ok(Self::MeleeAttack(intent)),
                }
            }
            "HIT" => {
                if parts.len() < 3 {
                    return Err(FrameError::Malformed("HIT needs targetId|attackerId"));
                }
                Ok(Self::Hit {
                    target_id: parts[1].to_string(),
                    attacker_id: parts[2].to_string(),
                    attack_type: parts.get(3).unwrap_or(&"UNKNOWN").to_string(),
                })
            }
            "DAMAGE" => {
                if parts.len() < 3 {
                    return Err(FrameError::Malformed("DAMAGE needs targetId|amount"));
                }
                Ok(Self::Damage {
                    target_id: parts[1].to_string(),
                    amount: parts[2].parse().unwrap_or(0),
                })
            }
            "HEAL" => {
                if parts.len() < 3 {
                    return Err(FrameError::Malformed("HEAL needs targetId|amount"));
                }
                Ok(Self::Heal {
                    target_id: parts[1].to_string(),
                    amount: parts[2].parse().unwrap_or(0),
                })
            }
            "HEALTH_UPDATE" => {
                if parts.len() < 3 {
                    return Err(FrameError::Malformed("HEALTH_UPDATE needs targetId|hp"));
                }
                Ok(Self::HealthUpdate {
                    target_id: parts[1].to_string(),
                    health: parts[2].parse().unwrap_or(0),
                })
            }
            "RESPAWN" => {
                if parts.len() < 2 {
                    return Err(FrameError::Malformed("RESPAWN needs playerId"));
                }
                Ok(Self::Respawn {
                    player_id: parts[1].to_string(),
                })
            }
            "CHAT" => {
                if parts.len() < 4 {
                    return Err(FrameError::Malformed("CHAT needs senderId|senderName|content"));
                }
                // Content may itself contain pipes, so rejoin the tail
                Ok(Self::Chat {
                    sender_id: parts[1].to_string(),
                    sender_name: parts[2].to_string(),
                    content: parts[3..].join("|"),
                })
            }
            "PATHFIND" => {
                if parts.len() < 5 {
                    return Err(FrameError::Malformed("PATHFIND needs sx|sy|ex|ey"));
                }
                Ok(Self::Pathfind {
                    start_x: float_field(&parts, 1, "PATHFIND sx")?,
                    start_y: float_field(&parts, 2, "PATHFIND sy")?,
                    end_x: float_field(&parts, 3, "PATHFIND ex")?,
                    end_y: float_field(&parts, 4, "PATHFIND ey")?,
                })
            }
            "GET_ENEMIES" => Ok(Self::GetEnemies),
            "DAMAGE_ENEMY" => {
                if parts.len() < 3 {
                    return Err(FrameError::Malformed("DAMAGE_ENEMY needs enemyId|amount"));
                }
                Ok(Self::DamageEnemy {
                    enemy_id: parts[1].to_string(),
                    amount: parts[2].parse().unwrap_or(0),
                })
            }
            _ => Err(FrameError::UnknownType),
        }
    }
}

fn float_field(parts: &[&str], index: usize, what: &'static str) -> Result<f32, FrameError> {
    parts
        .get(index)
        .and_then(|v| v.parse::<f32>().ok())
        .ok_or(FrameError::Malformed(what))
}

/// One enemy as it appears in list-style frames.
#[derive(Debug, Clone, PartialEq)]
pub struct EnemySnapshot {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub species: EnemySpecies,
    pub current_health: i32,
    pub max_health: i32,
    pub state: &'static str,
    pub level: i32,
}

impl EnemySnapshot {
    /// `id,x,y,type,hp,maxHp,level` as used by ENEMY_LIST.
    fn record_without_state(&self) -> String {
        format!(
            "{},{},{},{},{},{},{}",
            self.id,
            self.x,
            self.y,
            self.species.wire_name(),
            self.current_health,
            self.max_health,
            self.level
        )
    }

    /// `id,x,y,type,hp,maxHp,state,level` as used by ENEMY_POSITIONS and
    /// ENEMY_RESPAWN.
    fn record_with_state(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{}",
            self.id,
            self.x,
            self.y,
            self.species.wire_name(),
            self.current_health,
            self.max_health,
            self.state,
            self.level
        )
    }
}

/// A frame the server sends to clients.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Move {
        x: f32,
        y: f32,
        player_id: String,
    },
    Join {
        x: f32,
        y: f32,
        player_id: String,
        username: String,
        class: CharacterClass,
        current_health: i32,
        max_health: i32,
    },
    Leave {
        player_id: String,
    },
    Path {
        waypoints: Vec<(i32, i32)>,
    },
    MoveFailed {
        player_id: String,
    },
    EnemyList(Vec<EnemySnapshot>),
    EnemyPositions(Vec<EnemySnapshot>),
    EnemyRespawn(Vec<EnemySnapshot>),
    EnemyDied {
        enemy_id: String,
    },
    EnemyHit {
        enemy_id: String,
        damage: i32,
    },
    Hit {
        target_id: String,
        attacker_id: String,
        attack_type: String,
        current_health: i32,
        max_health: i32,
    },
    HitDetailed {
        target_id: String,
        attacker_id: String,
        attack_type: String,
        current_health: i32,
        max_health: i32,
        damage: i32,
    },
    HealthUpdate {
        player_id: String,
        current_health: i32,
        max_health: i32,
    },
    PlayerDied {
        player_id: String,
    },
    Respawn {
        player_id: String,
        current_health: i32,
        max_health: i32,
    },
    XpGained {
        player_id: String,
        amount: i32,
        total_xp: i32,
        level: i32,
    },
    Chat {
        sender_id: String,
        sender_name: String,
        content: String,
    },
    Echo(String),
    /// Re-broadcast a client frame verbatim (attack animations).
    Relay(String),
}

impl ServerEvent {
    pub fn encode(&self) -> String {
        match self {
            Self::Move { x, y, player_id } => format!("MOVE|{}|{}|{}", x, y, player_id),
            Self::Join {
                x,
                y,
                player_id,
                username,
                class,
                current_health,
                max_health,
            } => format!(
                "JOIN|{}|{}|{}|{}|{}|{}|{}",
                x,
                y,
                player_id,
                username,
                class.as_u8(),
                current_health,
                max_health
            ),
            Self::Leave { player_id } => format!("LEAVE|{}", player_id),
            Self::Path { waypoints } => {
                let joined: Vec<String> = waypoints
                    .iter()
                    .map(|(x, y)| format!("{}:{}", x, y))
                    .collect();
                format!("PATH|{}", joined.join(","))
            }
            Self::MoveFailed { player_id } => format!("MOVE_FAILED|{}|no_path", player_id),
            Self::EnemyList(snapshots) => {
                let records: Vec<String> =
                    snapshots.iter().map(|s| s.record_without_state()).collect();
                format!("ENEMY_LIST|{}", records.join(";"))
            }
            Self::EnemyPositions(snapshots) => {
                let records: Vec<String> =
                    snapshots.iter().map(|s| s.record_with_state()).collect();
                format!("ENEMY_POSITIONS|{}", records.join(";"))
            }
            Self::EnemyRespawn(snapshots) => {
                let records: Vec<String> =
                    snapshots.iter().map(|s| s.record_with_state()).collect();
                format!("ENEMY_RESPAWN|{}", records.join(";"))
            }
            Self::EnemyDied { enemy_id } => format!("ENEMY_DIED|{}", enemy_id),
            Self::EnemyHit { enemy_id, damage } => format!("ENEMY_HIT|{}|{}", enemy_id, damage),
            Self::Hit {
                target_id,
                attacker_id,
                attack_type,
                current_health,
                max_health,
            } => format!(
                "HIT|{}|{}|{}|{}|{}",
                target_id, attacker_id, attack_type, current_health, max_health
            ),
            Self::HitDetailed {
                target_id,
                attacker_id,
                attack_type,
                current_health,
                max_health,
                damage,
            } => format!(
                "HIT_DETAILED|{}|{}|{}|{}|{}|{}",
                target_id, attacker_id, attack_type, current_health, max_health, damage
            ),
            Self::HealthUpdate {
                player_id,
                current_health,
                max_health,
            } => format!(
                "HEALTH_UPDATE|{}|{}|{}",
                player_id, current_health, max_health
            ),
            Self::PlayerDied { player_id } => format!("PLAYER_DIED|{}", player_id),
            Self::Respawn {
                player_id,
                current_health,
                max_health,
            } => format!("RESPAWN|{}|{}|{}", player_id, current_health, max_health),
            Self::XpGained {
                player_id,
                amount,
                total_xp,
                level,
            } => format!(
                "XP_GAINED|{}|{}|{}|{}",
                player_id, amount, total_xp, level
            ),
            Self::Chat {
                sender_id,
                sender_name,
                content,
            } => format!("CHAT|{}|{}|{}", sender_id, sender_name, content),
            Self::Echo(frame) => format!("Echo: {}", frame),
            Self::Relay(frame) => frame.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_join_with_defaults() {
        let cmd = ClientCommand::parse("JOIN|10.5|20|p1").unwrap();
        assert_eq!(
            cmd,
            ClientCommand::Join {
                x: 10.5,
                y: 20.0,
                player_id: "p1".into(),
                username: "Unknown".into(),
                class: CharacterClass::Archer,
            }
        );
    }

    #[test]
    fn join_with_bad_ordinal_falls_back_to_warrior() {
        let cmd = ClientCommand::parse("JOIN|0|0|p1|bob|9").unwrap();
        match cmd {
            ClientCommand::Join { class, .. } => assert_eq!(class, CharacterClass::Warrior),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn chat_content_keeps_pipes() {
        let cmd = ClientCommand::parse("CHAT|p1|bob|hello|world").unwrap();
        assert_eq!(
            cmd,
            ClientCommand::Chat {
                sender_id: "p1".into(),
                sender_name: "bob".into(),
                content: "hello|world".into(),
            }
        );
    }

    #[test]
    fn short_frames_are_malformed() {
        assert!(matches!(
            ClientCommand::parse("MOVE_TO|1|2"),
            Err(FrameError::Malformed(_))
        ));
    }

    #[test]
    fn unknown_type_is_reported_for_echo() {
        assert_eq!(
            ClientCommand::parse("DANCE|p1"),
            Err(FrameError::UnknownType)
        );
    }

    #[test]
    fn encodes_path_waypoints() {
        let event = ServerEvent::Path {
            waypoints: vec![(1, 2), (3, 4)],
        };
        assert_eq!(event.encode(), "PATH|1:2,3:4");
    }

    #[test]
    fn enemy_positions_record_carries_state_before_level() {
        let event = ServerEvent::EnemyPositions(vec![EnemySnapshot {
            id: "10000".into(),
            x: 100.0,
            y: 200.0,
            species: EnemySpecies::Wolf,
            current_health: 40,
            max_health: 40,
            state: "CHASE",
            level: 3,
        }]);
        assert_eq!(
            event.encode(),
            "ENEMY_POSITIONS|10000,100,200,Wolf,40,40,CHASE,3"
        );
    }

    #[test]
    fn enemy_list_record_has_no_state() {
        let event = ServerEvent::EnemyList(vec![EnemySnapshot {
            id: "10001".into(),
            x: 50.0,
            y: 60.0,
            species: EnemySpecies::Sheep,
            current_health: 20,
            max_health: 20,
            state: "IDLE",
            level: 1,
        }]);
        assert_eq!(event.encode(), "ENEMY_LIST|10001,50,60,Sheep,20,20,1");
    }
}
