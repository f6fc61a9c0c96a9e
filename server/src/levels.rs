//! Player experience and level progression.

use crate::context::PlayerData;

/// Experience needed to go from `level` to `level + 1`.
pub fn xp_for_next_level(level: i32) -> i32 {
    100 * level
}

/// Add experience to a player, applying as many level-ups as it pays for.
/// Each level grants +10 max health and a full heal. Returns true if at
/// least one level was gained.
pub fn add_experience(player: &mut PlayerData, amount: i32) -> bool {
    player.experience += amount;
    let mut leveled_up = false;

    while player.experience >= xp_for_next_level(player.level) {
        player.experience -= xp_for_next_level(player.level);
        player.level += 1;
        leveled_up = true;

        player.max_health += 10;
        player.current_health = player.max_health;
    }

    leveled_up
}
