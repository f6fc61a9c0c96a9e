//! Turns inbound frames into state mutations and outbox events.
//!
//! Runs on the connection task that received the frame. Nothing here blocks
//! on the network; every reply goes through the returned outbox.

use log::{debug, info, warn};

use valewood_shared::{
    AttackKind, ClientCommand, FrameError, ServerEvent, ENEMY_ID_PREFIX,
};

use crate::chat::ChatMessage;
use crate::combat;
use crate::context::{PlayerData, SimContext};
use crate::events::{Outgoing, Recipients};
use crate::movement::MovementTarget;
use crate::pathfinding::find_path;

/// Handle one text frame from a session.
pub fn handle_frame(ctx: &SimContext, session_id: &str, frame: &str) -> Vec<Outgoing> {
    let command = match ClientCommand::parse(frame) {
        Ok(command) => command,
        Err(FrameError::UnknownType) => {
            // Diagnostic echo, never a dropped connection
            return vec![Outgoing::to_session(session_id, ServerEvent::Echo(frame.to_string()))];
        }
        Err(FrameError::Malformed(what)) => {
            warn!("Dropping malformed frame from {}: {}", session_id, what);
            return Vec::new();
        }
    };

    match command {
        ClientCommand::Join {
            x,
            y,
            player_id,
            username,
            class,
        } => handle_join(ctx, session_id, x, y, player_id, username, class),
        ClientCommand::MoveTo {
            target_x,
            target_y,
            stop_range,
            player_id,
        } => handle_move_to(ctx, target_x, target_y, stop_range, &player_id),
        ClientCommand::RangedAttack(intent) => {
            combat::handle_projectile_attack(ctx, session_id, AttackKind::Arrow, &intent, frame)
        }
        ClientCommand::SpellAttack(intent) => {
            combat::handle_projectile_attack(ctx, session_id, AttackKind::Fireball, &intent, frame)
        }
        ClientCommand::MeleeAttack(intent) => {
            combat::handle_melee_attack(ctx, session_id, &intent, frame)
        }
        ClientCommand::Hit {
            target_id,
            attacker_id,
            attack_type,
        } => combat::resolve_hit(ctx, &target_id, &attacker_id, &attack_type),
        ClientCommand::Damage { target_id, amount } => {
            apply_health_change(ctx, &target_id, |player| player.take_damage(amount))
        }
        ClientCommand::Heal { target_id, amount } => {
            apply_health_change(ctx, &target_id, |player| player.heal(amount))
        }
        ClientCommand::HealthUpdate { target_id, health } => {
            apply_health_change(ctx, &target_id, |player| player.set_health(health))
        }
        ClientCommand::Respawn { player_id } => combat::handle_player_respawn(ctx, &player_id),
        ClientCommand::Chat {
            sender_id,
            sender_name,
            content,
        } => {
            ctx.chat.record(ChatMessage::new(
                sender_id.clone(),
                sender_name.clone(),
                content.clone(),
            ));
            vec![Outgoing::broadcast(ServerEvent::Chat {
                sender_id,
                sender_name,
                content,
            })]
        }
        ClientCommand::Pathfind {
            start_x,
            start_y,
            end_x,
            end_y,
        } => {
            let waypoints = find_path(
                &ctx.map,
                ctx.map.world_to_tile(start_x),
                ctx.map.world_to_tile(start_y),
                ctx.map.world_to_tile(end_x),
                ctx.map.world_to_tile(end_y),
            );
            vec![Outgoing::to_session(session_id, ServerEvent::Path { waypoints })]
        }
        ClientCommand::GetEnemies => {
            vec![Outgoing::to_session(
                session_id,
                ServerEvent::EnemyList(ctx.enemies.snapshots()),
            )]
        }
        ClientCommand::DamageEnemy { enemy_id, amount } => {
            handle_damage_enemy(ctx, &enemy_id, amount)
        }
    }
}

fn handle_join(
    ctx: &SimContext,
    session_id: &str,
    x: f32,
    y: f32,
    player_id: String,
    username: String,
    class: valewood_shared::CharacterClass,
) -> Vec<Outgoing> {
    // Registered players resume their saved character; everyone else joins
    // as a fresh guest with the class the client asked for
    let player = match ctx.accounts.get(&player_id) {
        Some(record) => {
            let mut player =
                PlayerData::new(player_id.clone(), record.nickname.clone(), record.class(), x, y);
            player.level = record.level;
            player.experience = record.experience;
            player.max_health = record.max_health;
            player.current_health = record.current_health;
            player
        }
        None => PlayerData::new(player_id.clone(), username, class, x, y),
    };

    info!(
        "Player {} ({}) joined as {} at ({}, {})",
        player.username,
        player_id,
        player.class.name(),
        x,
        y
    );

    let mut outbox = vec![Outgoing {
        to: Recipients::AllExceptSession(session_id.to_string()),
        event: join_event(&player),
    }];

    // Tell the newcomer about everyone already in the world
    for other in ctx.players.iter() {
        if other.id != player_id {
            outbox.push(Outgoing::to_session(session_id, join_event(&other)));
        }
    }

    // Replay the chat backlog so the newcomer sees the ongoing conversation
    for message in ctx.chat.recent() {
        outbox.push(Outgoing::to_session(
            session_id,
            ServerEvent::Chat {
                sender_id: message.sender_id,
                sender_name: message.sender_name,
                content: message.content,
            },
        ));
    }

    ctx.players.insert(player_id.clone(), player);
    ctx.connections.bind_player(player_id, session_id.to_string());

    outbox
}

fn join_event(player: &PlayerData) -> ServerEvent {
    ServerEvent::Join {
        x: player.x,
        y: player.y,
        player_id: player.id.clone(),
        username: player.username.clone(),
        class: player.class,
        current_health: player.current_health,
        max_health: player.max_health,
    }
}

fn handle_move_to(
    ctx: &SimContext,
    target_x: f32,
    target_y: f32,
    stop_range: f32,
    player_id: &str,
) -> Vec<Outgoing> {
    let Some(player) = ctx.players.get(player_id) else {
        debug!("MOVE_TO for unknown player {}", player_id);
        return Vec::new();
    };
    let (x, y) = (player.x, player.y);
    drop(player);

    let mut target = MovementTarget::new(target_x, target_y, stop_range);
    let path = find_path(
        &ctx.map,
        ctx.map.world_to_tile(x),
        ctx.map.world_to_tile(y),
        ctx.map.world_to_tile(target_x),
        ctx.map.world_to_tile(target_y),
    );

    let outbox = if path.is_empty() {
        target.moving = false;
        vec![Outgoing::to_player(
            player_id,
            ServerEvent::MoveFailed {
                player_id: player_id.to_string(),
            },
        )]
    } else {
        target.set_path(path.clone());
        vec![Outgoing::to_player(player_id, ServerEvent::Path { waypoints: path })]
    };

    ctx.movement_targets.insert(player_id.to_string(), target);
    outbox
}

fn apply_health_change(
    ctx: &SimContext,
    target_id: &str,
    change: impl FnOnce(&mut PlayerData),
) -> Vec<Outgoing> {
    let Some(mut player) = ctx.players.get_mut(target_id) else {
        return Vec::new();
    };
    change(&mut player);
    let current = player.current_health;
    let max = player.max_health;
    ctx.accounts.record_progress(&player);
    drop(player);

    vec![Outgoing::broadcast(ServerEvent::HealthUpdate {
        player_id: target_id.to_string(),
        current_health: current,
        max_health: max,
    })]
}

fn handle_damage_enemy(ctx: &SimContext, enemy_id: &str, amount: i32) -> Vec<Outgoing> {
    // Debug command: raw damage, no attacker, no experience
    let raw_id = enemy_id.strip_prefix(ENEMY_ID_PREFIX).unwrap_or(enemy_id);
    let Some((_, died)) = ctx.enemies.damage(raw_id, amount) else {
        return Vec::new();
    };

    let mut outbox = vec![Outgoing::broadcast(ServerEvent::EnemyHit {
        enemy_id: raw_id.to_string(),
        damage: amount,
    })];
    if died {
        outbox.push(Outgoing::broadcast(ServerEvent::EnemyDied {
            enemy_id: raw_id.to_string(),
        }));
    }
    outbox
}

/// Clean up after a closed connection. Returns the outbox to dispatch (a
/// LEAVE if a player was attached to the session).
pub fn handle_disconnect(ctx: &SimContext, session_id: &str) -> Vec<Outgoing> {
    let Some(player_id) = ctx.connections.remove_session(session_id) else {
        debug!("Session {} closed before joining", session_id);
        return Vec::new();
    };

    if let Some((_, player)) = ctx.players.remove(&player_id) {
        ctx.accounts.record_progress(&player);
        info!(
            "Player {} ({}) disconnected ({} players online)",
            player.username,
            player_id,
            ctx.players.len()
        );
    }
    ctx.movement_targets.remove(&player_id);
    ctx.death_times.remove(&player_id);

    vec![Outgoing::broadcast(ServerEvent::Leave { player_id })]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::GameMap;
    use std::sync::Arc;
    use valewood_shared::EnemySpecies;

    fn test_ctx() -> Arc<SimContext> {
        let row = vec!["0"; 40].join(",");
        let csv = vec![row; 40].join("\n");
        SimContext::new_empty(GameMap::from_csv(&csv).unwrap())
    }

    #[test]
    fn join_announces_to_others_and_lists_existing_players() {
        let ctx = test_ctx();
        handle_frame(&ctx, "s1", "JOIN|100|100|p1|alice|0");
        let outbox = handle_frame(&ctx, "s2", "JOIN|200|200|p2|bob|2");

        // One announcement to everyone else, one catch-up JOIN for p1
        assert_eq!(outbox.len(), 2);
        assert_eq!(outbox[0].to, Recipients::AllExceptSession("s2".into()));
        assert_eq!(outbox[0].event.encode(), "JOIN|200|200|p2|bob|2|150|150");
        assert_eq!(outbox[1].to, Recipients::Session("s2".into()));
        assert_eq!(outbox[1].event.encode(), "JOIN|100|100|p1|alice|0|100|100");
    }

    #[test]
    fn join_prefers_the_saved_account_record() {
        let ctx = test_ctx();
        // No record: the client-supplied class and name stick
        handle_frame(&ctx, "s1", "JOIN|0|0|guest|eve|1");
        let guest = ctx.players.get("guest").unwrap();
        assert_eq!(guest.username, "eve");
        assert_eq!(guest.max_health, 80);
    }

    #[test]
    fn join_replays_the_chat_backlog() {
        let ctx = test_ctx();
        handle_frame(&ctx, "s1", "JOIN|0|0|p1|alice|0");
        handle_frame(&ctx, "s1", "CHAT|p1|alice|hello there");

        let outbox = handle_frame(&ctx, "s2", "JOIN|0|0|p2|bob|0");
        let replay: Vec<&Outgoing> = outbox
            .iter()
            .filter(|o| o.event.encode().starts_with("CHAT|"))
            .collect();
        assert_eq!(replay.len(), 1);
        assert_eq!(replay[0].to, Recipients::Session("s2".into()));
        assert_eq!(replay[0].event.encode(), "CHAT|p1|alice|hello there");
    }

    #[test]
    fn move_to_sets_a_path_and_replies_with_it() {
        let ctx = test_ctx();
        handle_frame(&ctx, "s1", "JOIN|8|8|p1|alice|0");
        let outbox = handle_frame(&ctx, "s1", "MOVE_TO|72|8|0|p1");

        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].to, Recipients::Player("p1".into()));
        assert_eq!(outbox[0].event.encode(), "PATH|0:0,1:0,2:0,3:0,4:0");

        let target = ctx.movement_targets.get("p1").unwrap();
        assert!(target.moving);
        assert_eq!(target.path.len(), 5);
    }

    #[test]
    fn move_to_an_unreachable_tile_fails_immediately() {
        // Walkable strip with a fenced-off corner
        let csv = "0,0,1,0\n0,0,1,0\n0,0,1,0\n0,0,1,0";
        let ctx = SimContext::new_empty(GameMap::from_csv(csv).unwrap());
        handle_frame(&ctx, "s1", "JOIN|8|8|p1|alice|0");
        let outbox = handle_frame(&ctx, "s1", "MOVE_TO|56|8|0|p1");

        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].event.encode(), "MOVE_FAILED|p1|no_path");
        assert!(!ctx.movement_targets.get("p1").unwrap().moving);
    }

    #[test]
    fn unknown_commands_echo_back_to_the_sender() {
        let ctx = test_ctx();
        let outbox = handle_frame(&ctx, "s1", "TELEPORT|1|2|p1");
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].to, Recipients::Session("s1".into()));
        assert_eq!(outbox[0].event.encode(), "Echo: TELEPORT|1|2|p1");
    }

    #[test]
    fn malformed_frames_are_dropped_silently() {
        let ctx = test_ctx();
        assert!(handle_frame(&ctx, "s1", "MOVE_TO|1").is_empty());
    }

    #[test]
    fn heal_is_capped_at_max_health() {
        let ctx = test_ctx();
        handle_frame(&ctx, "s1", "JOIN|0|0|p1|alice|1");
        ctx.players.get_mut("p1").unwrap().current_health = 50;

        let outbox = handle_frame(&ctx, "s1", "HEAL|p1|500");
        assert_eq!(outbox[0].event.encode(), "HEALTH_UPDATE|p1|80|80");
    }

    #[test]
    fn damage_enemy_skips_experience() {
        let ctx = test_ctx();
        handle_frame(&ctx, "s1", "JOIN|0|0|p1|alice|0");
        let id = ctx
            .enemies
            .spawn(EnemySpecies::Sheep, 100.0, 100.0, Some(1), &ctx.map);

        let outbox = handle_frame(&ctx, "s1", &format!("DAMAGE_ENEMY|{}|25", id));
        let frames: Vec<String> = outbox.iter().map(|o| o.event.encode()).collect();
        assert!(frames.contains(&format!("ENEMY_HIT|{}|25", id)));
        assert!(frames.contains(&format!("ENEMY_DIED|{}", id)));
        assert_eq!(ctx.players.get("p1").unwrap().experience, 0);
    }

    #[test]
    fn get_enemies_returns_the_full_roster() {
        let ctx = test_ctx();
        ctx.enemies
            .spawn(EnemySpecies::Wolf, 300.0, 300.0, Some(2), &ctx.map);
        let outbox = handle_frame(&ctx, "s1", "GET_ENEMIES");
        assert_eq!(outbox.len(), 1);
        assert!(outbox[0].event.encode().starts_with("ENEMY_LIST|10000,300,300,Wolf,"));
    }

    #[test]
    fn disconnect_removes_the_player_and_broadcasts_leave() {
        let ctx = test_ctx();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        ctx.connections.add_session("s1".into(), tx);
        handle_frame(&ctx, "s1", "JOIN|0|0|p1|alice|0");
        handle_frame(&ctx, "s1", "MOVE_TO|100|100|0|p1");

        let outbox = handle_disconnect(&ctx, "s1");
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].event.encode(), "LEAVE|p1");
        assert!(ctx.players.get("p1").is_none());
        assert!(ctx.movement_targets.get("p1").is_none());

        // A second close is quiet
        assert!(handle_disconnect(&ctx, "s1").is_empty());
    }
}
