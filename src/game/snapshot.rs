//! Snapshot building for network transmission

use crate::ws::protocol::{GameSnapshot, PlayerSnapshot};

use super::world::GameWorld;

/// Capture the full shared state as a wire snapshot.
///
/// Every broadcast and every initial unicast carries the same shape; the
/// state is copied wholesale so clients never observe a partial update.
pub fn build_snapshot(world: &GameWorld) -> GameSnapshot {
    let players = world
        .players
        .iter()
        .map(|(id, p)| {
            (
                *id,
                PlayerSnapshot {
                    x: p.position.x,
                    y: p.position.y,
                    role: p.role,
                    current_direction: p.current_direction,
                    pending_input: p.pending_input.clone(),
                },
            )
        })
        .collect();

    GameSnapshot {
        players,
        fruit: world.fruit,
        scores: world.scores.clone(),
        game_in_progress: world.in_progress,
    }
}
