//! Fixed-tick simulation driver.
//!
//! One task owns the tick. Each tick advances player movement, enemy AI,
//! enemy movement and respawns, in that order, then drains the resulting
//! outbox to the connected sessions in one batch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{info, trace};

use valewood_shared::{ServerEvent, SERVER_TICK_RATE};

use crate::context::SimContext;
use crate::events::Outgoing;
use crate::movement::{self, Step, PLAYER_SPEED};
use crate::pathfinding::find_path;

/// Seconds between account table flushes to disk.
const SAVE_INTERVAL: Duration = Duration::from_secs(60);

/// Drive the simulation forever.
pub async fn run(ctx: Arc<SimContext>) {
    let tick = Duration::from_millis(1000 / SERVER_TICK_RATE as u64);
    let mut interval = tokio::time::interval(tick);
    let mut last_update = Instant::now();
    let mut last_save = Instant::now();

    info!("Game loop running at {} Hz", SERVER_TICK_RATE);

    loop {
        interval.tick().await;

        let now = Instant::now();
        let delta = (now - last_update).as_secs_f32();
        last_update = now;

        let outbox = tick_once(&ctx, delta);
        ctx.connections.dispatch_all(&outbox);

        if last_save.elapsed() >= SAVE_INTERVAL {
            last_save = now;
            ctx.record_all_progress();
            ctx.accounts.save();
            trace!("Periodic account save complete");
        }
    }
}

/// One simulation step. Pure with respect to I/O: every network-visible
/// effect comes back in the outbox.
pub fn tick_once(ctx: &SimContext, delta: f32) -> Vec<Outgoing> {
    let mut outbox = Vec::new();

    advance_players(ctx, delta, &mut outbox);

    let players = ctx.player_refs();
    ctx.enemies.update_behavior(&players, &ctx.map, delta);

    let moved = ctx.enemies.update_positions(&ctx.map, delta);

    let respawned = ctx.enemies.update_respawns(delta, &ctx.map);
    if !respawned.is_empty() {
        outbox.push(Outgoing::broadcast(ServerEvent::EnemyRespawn(respawned)));
    }

    // Only enemies that actually moved go out, in one batched frame
    let moved_snapshots = ctx.enemies.snapshots_for(&moved);
    if !moved_snapshots.is_empty() {
        outbox.push(Outgoing::broadcast(ServerEvent::EnemyPositions(
            moved_snapshots,
        )));
    }

    outbox
}

fn advance_players(ctx: &SimContext, delta: f32, outbox: &mut Vec<Outgoing>) {
    let ids: Vec<String> = ctx.movement_targets.iter().map(|t| t.key().clone()).collect();

    for id in ids {
        let Some(player) = ctx.players.get(&id) else {
            // Player left; drop the stale target
            ctx.movement_targets.remove(&id);
            continue;
        };
        let (x, y) = (player.x, player.y);
        drop(player);

        let Some(mut target) = ctx.movement_targets.get_mut(&id) else { continue };
        match movement::advance(x, y, &mut target, &ctx.map, delta, PLAYER_SPEED) {
            Step::Moved { x, y } => {
                if let Some(mut player) = ctx.players.get_mut(&id) {
                    player.x = x;
                    player.y = y;
                }
                outbox.push(Outgoing::broadcast(ServerEvent::Move {
                    x,
                    y,
                    player_id: id.clone(),
                }));
            }
            Step::Blocked => {
                // Direct line is walled off; repath from here or give up
                let path = find_path(
                    &ctx.map,
                    ctx.map.world_to_tile(x),
                    ctx.map.world_to_tile(y),
                    ctx.map.world_to_tile(target.target_x),
                    ctx.map.world_to_tile(target.target_y),
                );
                if path.is_empty() {
                    target.moving = false;
                    outbox.push(Outgoing::to_player(
                        &id,
                        ServerEvent::MoveFailed {
                            player_id: id.clone(),
                        },
                    ));
                } else {
                    target.set_path(path.clone());
                    outbox.push(Outgoing::to_player(
                        &id,
                        ServerEvent::Path { waypoints: path },
                    ));
                }
            }
            Step::Idle | Step::WaypointReached | Step::Arrived => {}
        }
    }

    // Completed targets are gone until the next MOVE_TO
    ctx.movement_targets.retain(|_, target| target.moving);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::GameMap;
    use crate::movement::distance;
    use crate::net::dispatcher::handle_frame;
    use valewood_shared::EnemySpecies;

    const TICK: f32 = 0.05;

    fn open_ctx(size: usize) -> Arc<SimContext> {
        let row = vec!["0"; size].join(",");
        let csv = vec![row; size].join("\n");
        SimContext::new_empty(GameMap::from_csv(&csv).unwrap())
    }

    #[test]
    fn player_converges_on_a_distant_target() {
        let ctx = open_ctx(60);
        handle_frame(&ctx, "s1", "JOIN|8|8|p1|alice|0");
        let outbox = handle_frame(&ctx, "s1", "MOVE_TO|900|8|0|p1");
        assert!(outbox[0].event.encode().starts_with("PATH|"));

        let mut move_failed = 0;
        for _ in 0..1000 {
            for out in tick_once(&ctx, TICK) {
                if out.event.encode().starts_with("MOVE_FAILED") {
                    move_failed += 1;
                }
            }
            if ctx.movement_targets.get("p1").is_none() {
                break;
            }
        }

        let player = ctx.players.get("p1").unwrap();
        assert!(
            distance(player.x, player.y, 900.0, 8.0) < 5.0,
            "stopped at ({}, {})",
            player.x,
            player.y
        );
        assert_eq!(move_failed, 0);
        // Target removed once movement completes
        assert!(ctx.movement_targets.get("p1").is_none());
    }

    #[test]
    fn wall_gap_scenario_routes_the_long_way() {
        // 10x10, column 5 walled except the top CSV row, which maps to the
        // highest y. The only way across is through that gap.
        let mut rows = Vec::new();
        rows.push(vec!["0"; 10].join(","));
        for _ in 0..9 {
            let mut row: Vec<&str> = vec!["0"; 10];
            row[5] = "1";
            rows.push(row.join(","));
        }
        let map = GameMap::from_csv(&rows.join("\n")).unwrap();

        let path = find_path(&map, 0, 0, 9, 0);
        assert!(!path.is_empty());
        assert!(path.len() >= 19);
        assert!(path.iter().any(|&(_, y)| y == 9));
    }

    #[test]
    fn moving_enemies_go_out_in_one_batched_frame() {
        let ctx = open_ctx(60);
        let a = ctx
            .enemies
            .spawn(EnemySpecies::Sheep, 300.0, 300.0, Some(1), &ctx.map);
        let b = ctx
            .enemies
            .spawn(EnemySpecies::Sheep, 500.0, 500.0, Some(1), &ctx.map);

        // Let patrol paths form, then look for a single batched frame
        let mut saw_batch = false;
        for _ in 0..200 {
            let outbox = tick_once(&ctx, TICK);
            let frames: Vec<String> = outbox.iter().map(|o| o.event.encode()).collect();
            let positions: Vec<&String> = frames
                .iter()
                .filter(|f| f.starts_with("ENEMY_POSITIONS|"))
                .collect();
            assert!(positions.len() <= 1, "one batch per tick at most");
            if positions
                .iter()
                .any(|f| f.contains(&a) && f.contains(&b))
            {
                saw_batch = true;
                break;
            }
        }
        assert!(saw_batch, "both enemies should eventually move in the same tick");
    }

    #[test]
    fn dead_enemies_respawn_through_the_loop() {
        let ctx = open_ctx(60);
        let id = ctx
            .enemies
            .spawn(EnemySpecies::Wolf, 320.0, 320.0, Some(2), &ctx.map);
        ctx.enemies.damage(&id, 999);

        // 15 seconds of ticks brings it back
        let mut respawn_frames = 0;
        'ticks: for _ in 0..320 {
            for out in tick_once(&ctx, TICK) {
                if out.event.encode().starts_with("ENEMY_RESPAWN|") {
                    respawn_frames += 1;
                    break 'ticks;
                }
            }
        }
        assert_eq!(respawn_frames, 1);
        let enemy = ctx.enemies.get(&id).unwrap();
        assert!(enemy.alive);
        assert_eq!(enemy.x, 320.0);
        assert_eq!(enemy.level, 2);
    }

    #[test]
    fn idle_enemy_chases_and_abandons_a_vanishing_player() {
        let ctx = open_ctx(60);
        let id = ctx
            .enemies
            .spawn(EnemySpecies::Wolf, 320.0, 320.0, Some(1), &ctx.map);
        handle_frame(&ctx, "s1", "JOIN|400|320|p1|alice|0");

        tick_once(&ctx, TICK);
        assert_eq!(ctx.enemies.state_name(&id), "CHASE");

        ctx.players.remove("p1");
        tick_once(&ctx, TICK);
        assert_eq!(ctx.enemies.state_name(&id), "IDLE");
    }

    #[test]
    fn stale_targets_of_departed_players_are_dropped() {
        let ctx = open_ctx(60);
        handle_frame(&ctx, "s1", "JOIN|8|8|p1|alice|0");
        handle_frame(&ctx, "s1", "MOVE_TO|400|8|0|p1");
        ctx.players.remove("p1");

        tick_once(&ctx, TICK);
        assert!(ctx.movement_targets.get("p1").is_none());
    }
}
