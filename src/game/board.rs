//! Board geometry: the bounded grid and movement over it

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ws::protocol::Direction;

/// Grid width in cells
pub const GRID_WIDTH: i32 = 20;
/// Grid height in cells
pub const GRID_HEIGHT: i32 = 20;

/// A cell on the grid; invariant `0 <= x < GRID_WIDTH`, `0 <= y < GRID_HEIGHT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

/// A uniformly random in-bounds position
pub fn random_position(rng: &mut impl Rng) -> Position {
    Position {
        x: rng.gen_range(0..GRID_WIDTH),
        y: rng.gen_range(0..GRID_HEIGHT),
    }
}

/// One step in the given direction, clamped to the grid.
///
/// `up` increases `y` and `down` decreases it: the y axis grows upward,
/// inverted from raw screen coordinates. Clients depend on this convention.
pub fn step(pos: Position, direction: Direction) -> Position {
    match direction {
        Direction::Up => Position {
            y: (pos.y + 1).min(GRID_HEIGHT - 1),
            ..pos
        },
        Direction::Down => Position {
            y: (pos.y - 1).max(0),
            ..pos
        },
        Direction::Left => Position {
            x: (pos.x - 1).max(0),
            ..pos
        },
        Direction::Right => Position {
            x: (pos.x + 1).min(GRID_WIDTH - 1),
            ..pos
        },
    }
}
