//! Valewood Game Server
//!
//! Authoritative server for the Valewood action RPG prototype: tile map,
//! server-side movement and pathfinding, enemy AI and combat over a
//! pipe-delimited WebSocket text protocol.

mod accounts;
mod chat;
mod combat;
mod context;
mod enemies;
mod events;
mod game;
mod levels;
mod map;
mod movement;
mod net;
mod pathfinding;

use std::path::PathBuf;

use log::{error, info};
use tokio::net::TcpListener;

use valewood_shared::{DEFAULT_PORT, SERVER_TICK_RATE};

use crate::accounts::AccountStore;
use crate::context::SimContext;
use crate::map::GameMap;

/// Fall-back map path relative to the working directory.
const DEFAULT_MAP_PATH: &str = "assets/maps/map.csv";

/// Fall-back account file path.
const DEFAULT_USERS_PATH: &str = "users.json";

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting Valewood Server...");
    info!("Tick rate: {} Hz", SERVER_TICK_RATE);

    // The map is not optional; without collision data nothing can move
    let map_path = std::env::var("VALEWOOD_MAP").unwrap_or_else(|_| DEFAULT_MAP_PATH.to_string());
    let map = match GameMap::load_from_file(&PathBuf::from(&map_path)) {
        Ok(map) => {
            info!("Loaded map {} ({}x{} tiles)", map_path, map.width(), map.height());
            map
        }
        Err(e) => {
            error!("Failed to load map: {}", e);
            return;
        }
    };

    // Accounts are optional; without them everyone joins as a guest
    let users_path =
        std::env::var("VALEWOOD_USERS").unwrap_or_else(|_| DEFAULT_USERS_PATH.to_string());
    let accounts = AccountStore::load(PathBuf::from(users_path));

    let ctx = SimContext::new(map, accounts);
    info!("Seeded {} enemies", ctx.enemies.alive_count());

    // The tick task owns the simulation cadence
    tokio::spawn(game::run(ctx.clone()));

    let app = net::router(ctx);
    let addr = format!("0.0.0.0:{}", DEFAULT_PORT);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            return;
        }
    };

    info!("Listening on {}", addr);
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
    }
}
