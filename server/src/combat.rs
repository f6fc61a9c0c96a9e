//! Authoritative combat resolution.
//!
//! Attack frames sweep for victims server-side; the HIT path applies the
//! damage table and fans out notifications. Every function here returns an
//! outbox batch instead of touching sockets, so the whole pipeline is
//! testable without a network.

use std::time::Instant;

use log::{debug, info};

use valewood_shared::{AttackIntent, AttackKind, ServerEvent, ENEMY_ID_PREFIX};

use crate::context::{SimContext, MIN_DEATH_TIME};
use crate::events::{Outgoing, Recipients};
use crate::levels;
use crate::movement::distance;

/// Resolve one hit candidate. Self-targeting and unknown or dead targets
/// are no-ops.
pub fn resolve_hit(
    ctx: &SimContext,
    target_id: &str,
    attacker_id: &str,
    attack_type: &str,
) -> Vec<Outgoing> {
    if target_id == attacker_id {
        return Vec::new();
    }

    let damage = AttackKind::damage_for(attack_type);

    if let Some(enemy_id) = target_id.strip_prefix(ENEMY_ID_PREFIX) {
        resolve_enemy_hit(ctx, target_id, enemy_id, attacker_id, attack_type, damage)
    } else {
        resolve_player_hit(ctx, target_id, attacker_id, attack_type, damage)
    }
}

fn resolve_enemy_hit(
    ctx: &SimContext,
    wire_target_id: &str,
    enemy_id: &str,
    attacker_id: &str,
    attack_type: &str,
    damage: i32,
) -> Vec<Outgoing> {
    // Dead or unknown enemies absorb nothing; death side effects fire once
    let Some((remaining, died)) = ctx.enemies.damage(enemy_id, damage) else {
        return Vec::new();
    };
    let Some(enemy) = ctx.enemies.get(enemy_id) else {
        return Vec::new();
    };

    let mut outbox = vec![
        Outgoing::broadcast(ServerEvent::Hit {
            target_id: wire_target_id.to_string(),
            attacker_id: attacker_id.to_string(),
            attack_type: attack_type.to_string(),
            current_health: remaining,
            max_health: enemy.max_health,
        }),
        // Literal damage stays between the attacker and the victim
        Outgoing::to_player(
            attacker_id,
            ServerEvent::HitDetailed {
                target_id: wire_target_id.to_string(),
                attacker_id: attacker_id.to_string(),
                attack_type: attack_type.to_string(),
                current_health: remaining,
                max_health: enemy.max_health,
                damage,
            },
        ),
    ];

    if died {
        outbox.push(Outgoing::broadcast(ServerEvent::EnemyDied {
            enemy_id: enemy_id.to_string(),
        }));
        outbox.extend(grant_kill_experience(ctx, attacker_id, &enemy));
    }

    outbox
}

fn grant_kill_experience(
    ctx: &SimContext,
    attacker_id: &str,
    enemy: &crate::enemies::Enemy,
) -> Vec<Outgoing> {
    // Attacker may have disconnected between the hit and the kill
    let Some(mut attacker) = ctx.players.get_mut(attacker_id) else {
        return Vec::new();
    };

    let xp = enemy.species.xp_reward(enemy.level);
    let leveled_up = levels::add_experience(&mut attacker, xp);
    ctx.accounts.record_progress(&attacker);

    if leveled_up {
        info!(
            "Player {} reached level {} ({} max HP)",
            attacker_id, attacker.level, attacker.max_health
        );
    }

    vec![Outgoing::broadcast(ServerEvent::XpGained {
        player_id: attacker_id.to_string(),
        amount: xp,
        total_xp: attacker.experience,
        level: attacker.level,
    })]
}

fn resolve_player_hit(
    ctx: &SimContext,
    target_id: &str,
    attacker_id: &str,
    attack_type: &str,
    damage: i32,
) -> Vec<Outgoing> {
    let Some(mut target) = ctx.players.get_mut(target_id) else {
        return Vec::new();
    };
    if !target.is_alive() {
        return Vec::new();
    }

    target.take_damage(damage);
    let current = target.current_health;
    let max = target.max_health;
    let died = !target.is_alive();
    ctx.accounts.record_progress(&target);
    drop(target);

    let mut outbox = vec![
        Outgoing::broadcast(ServerEvent::Hit {
            target_id: target_id.to_string(),
            attacker_id: attacker_id.to_string(),
            attack_type: attack_type.to_string(),
            current_health: current,
            max_health: max,
        }),
        Outgoing::to_players(
            vec![target_id.to_string(), attacker_id.to_string()],
            ServerEvent::HitDetailed {
                target_id: target_id.to_string(),
                attacker_id: attacker_id.to_string(),
                attack_type: attack_type.to_string(),
                current_health: current,
                max_health: max,
                damage,
            },
        ),
    ];

    if died {
        ctx.death_times.insert(target_id.to_string(), Instant::now());
        info!("Player {} was slain by {}", target_id, attacker_id);
        outbox.push(Outgoing::broadcast(ServerEvent::PlayerDied {
            player_id: target_id.to_string(),
        }));
    }

    outbox
}

/// An arrow or fireball: relay the animation frame to everyone else, then
/// sweep a line from the start point along the direction for victims.
pub fn handle_projectile_attack(
    ctx: &SimContext,
    session_id: &str,
    kind: AttackKind,
    intent: &AttackIntent,
    raw_frame: &str,
) -> Vec<Outgoing> {
    let mut outbox = vec![Outgoing {
        to: Recipients::AllExceptSession(session_id.to_string()),
        event: ServerEvent::Relay(raw_frame.to_string()),
    }];

    let end_x = intent.start_x + intent.dir_x * kind.travel_distance();
    let end_y = intent.start_y + intent.dir_y * kind.travel_distance();

    for victim in victims_on_segment(ctx, intent, kind.hit_radius(), end_x, end_y) {
        outbox.extend(resolve_hit(ctx, &victim, &intent.caster_id, kind.wire_name()));
    }

    outbox
}

/// A melee swing: relay the animation, then hit everything within reach of
/// the attacker's position.
pub fn handle_melee_attack(
    ctx: &SimContext,
    session_id: &str,
    intent: &AttackIntent,
    raw_frame: &str,
) -> Vec<Outgoing> {
    let kind = AttackKind::Melee;
    let mut outbox = vec![Outgoing {
        to: Recipients::AllExceptSession(session_id.to_string()),
        event: ServerEvent::Relay(raw_frame.to_string()),
    }];

    let mut victims = Vec::new();
    for player in ctx.players.iter() {
        if player.id != intent.caster_id
            && distance(intent.start_x, intent.start_y, player.x, player.y) < kind.hit_radius()
        {
            victims.push(player.id.clone());
        }
    }
    for snapshot in ctx.enemies.snapshots() {
        if distance(intent.start_x, intent.start_y, snapshot.x, snapshot.y) < kind.hit_radius() {
            victims.push(format!("{}{}", ENEMY_ID_PREFIX, snapshot.id));
        }
    }

    for victim in victims {
        outbox.extend(resolve_hit(ctx, &victim, &intent.caster_id, kind.wire_name()));
    }

    outbox
}

fn victims_on_segment(
    ctx: &SimContext,
    intent: &AttackIntent,
    radius: f32,
    end_x: f32,
    end_y: f32,
) -> Vec<String> {
    let mut victims = Vec::new();
    for player in ctx.players.iter() {
        if player.id != intent.caster_id
            && point_to_segment_distance(
                player.x,
                player.y,
                intent.start_x,
                intent.start_y,
                end_x,
                end_y,
            ) < radius
        {
            victims.push(player.id.clone());
        }
    }
    for snapshot in ctx.enemies.snapshots() {
        if point_to_segment_distance(
            snapshot.x,
            snapshot.y,
            intent.start_x,
            intent.start_y,
            end_x,
            end_y,
        ) < radius
        {
            victims.push(format!("{}{}", ENEMY_ID_PREFIX, snapshot.id));
        }
    }
    victims
}

/// Distance from a point to the closest point of the segment (x1,y1)-(x2,y2).
pub fn point_to_segment_distance(px: f32, py: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
    let a = px - x1;
    let b = py - y1;
    let c = x2 - x1;
    let d = y2 - y1;

    let dot = a * c + b * d;
    let len_sq = c * c + d * d;
    let param = if len_sq != 0.0 { dot / len_sq } else { -1.0 };

    let (cx, cy) = if param < 0.0 {
        (x1, y1)
    } else if param > 1.0 {
        (x2, y2)
    } else {
        (x1 + param * c, y1 + param * d)
    };

    distance(px, py, cx, cy)
}

/// Honor a player's respawn request, gated by the minimum death time.
pub fn handle_player_respawn(ctx: &SimContext, player_id: &str) -> Vec<Outgoing> {
    if let Some(died_at) = ctx.death_times.get(player_id) {
        if died_at.elapsed().as_secs_f32() < MIN_DEATH_TIME {
            debug!("Ignoring early respawn request from {}", player_id);
            return Vec::new();
        }
    }

    let Some(mut player) = ctx.players.get_mut(player_id) else {
        return Vec::new();
    };
    player.current_health = player.max_health;
    let current = player.current_health;
    let max = player.max_health;
    ctx.accounts.record_progress(&player);
    drop(player);

    ctx.death_times.remove(player_id);

    vec![Outgoing::broadcast(ServerEvent::Respawn {
        player_id: player_id.to_string(),
        current_health: current,
        max_health: max,
    })]
}
