//! Authoritative shared game state: player registry, scores, fruit, and the
//! lifecycle/role/collision rules over them.
//!
//! The world has exactly one writer, the session task in `session.rs`. All
//! operations here are synchronous mutations; nothing is fallible by design.

use std::collections::HashMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::warn;
use uuid::Uuid;

use crate::ws::protocol::{Direction, Role};

use super::board::{self, Position};

/// Minimum connected players for a match to be in progress
pub const MIN_PLAYERS: usize = 2;

/// A single player's authoritative state
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub position: Position,
    pub role: Role,
    pub current_direction: Option<Direction>,
    /// Most recent unconsumed key, verbatim; rapid presses coalesce to the
    /// last one before each tick's movement phase
    pub pending_input: Option<String>,
}

impl PlayerState {
    /// A freshly joined player: origin cell, ghost, no input history
    pub fn new() -> Self {
        Self {
            position: Position { x: 0, y: 0 },
            role: Role::Ghost,
            current_direction: None,
            pending_input: None,
        }
    }

    /// Consume any pending key press and advance one step.
    ///
    /// A player with no direction and no pending input stays put. A pending
    /// key is always consumed; unrecognized keys leave the direction
    /// unchanged.
    pub fn apply_movement(&mut self) {
        if self.current_direction.is_none() && self.pending_input.is_none() {
            return;
        }

        if let Some(key) = self.pending_input.take() {
            if let Some(direction) = Direction::from_key(&key) {
                self.current_direction = Some(direction);
            }
        }

        if let Some(direction) = self.current_direction {
            self.position = board::step(self.position, direction);
        }
    }
}

impl Default for PlayerState {
    fn default() -> Self {
        Self::new()
    }
}

/// A scoring event detected by the collision rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureEvent {
    /// A ghost touched pacman; the ghost scored
    Ghost { player_id: Uuid },
    /// Pacman reached the fruit; pacman scored and the fruit moved
    Fruit { player_id: Uuid },
}

/// The aggregate shared state (registry, scores, fruit, match flag)
pub struct GameWorld {
    pub players: HashMap<Uuid, PlayerState>,
    /// Registry iteration order: identities in join order. The role pick and
    /// the ghost collision scan both walk this.
    pub join_order: Vec<Uuid>,
    pub scores: HashMap<Uuid, u32>,
    pub fruit: Option<Position>,
    pub in_progress: bool,
    pub rng: ChaCha8Rng,
}

impl GameWorld {
    pub fn new(seed: u64) -> Self {
        Self {
            players: HashMap::new(),
            join_order: Vec::new(),
            scores: HashMap::new(),
            fruit: None,
            in_progress: false,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Register a newly connected player with a zeroed score entry
    pub fn add_player(&mut self, player_id: Uuid) {
        if self.players.contains_key(&player_id) {
            warn!(player_id = %player_id, "Player already registered");
            return;
        }

        self.players.insert(player_id, PlayerState::new());
        self.join_order.push(player_id);
        self.scores.entry(player_id).or_insert(0);
    }

    /// Remove a player and their score entry. Returns false for an unknown
    /// identity (e.g. a disconnect race), which is ignored.
    pub fn remove_player(&mut self, player_id: Uuid) -> bool {
        if self.players.remove(&player_id).is_none() {
            return false;
        }
        self.join_order.retain(|id| *id != player_id);
        self.scores.remove(&player_id);
        true
    }

    /// Record a key press for later consumption. The key is stored verbatim;
    /// validation happens at movement application. Returns false for an
    /// unknown identity.
    pub fn set_pending_input(&mut self, player_id: Uuid, key: String) -> bool {
        match self.players.get_mut(&player_id) {
            Some(player) => {
                player.pending_input = Some(key);
                true
            }
            None => false,
        }
    }

    /// Idle -> Active transition, attempted on every join (and once at boot).
    /// Returns true if a match actually started.
    pub fn try_start(&mut self) -> bool {
        if self.in_progress || self.players.len() < MIN_PLAYERS {
            return false;
        }
        self.in_progress = true;
        self.fruit = Some(board::random_position(&mut self.rng));
        self.assign_roles();
        true
    }

    /// Active -> Idle transition, attempted on every leave. Survivors keep
    /// their stale roles and positions until the next start overwrites them.
    /// Returns true if the match actually stopped.
    pub fn try_stop(&mut self) -> bool {
        if !self.in_progress || self.players.len() >= MIN_PLAYERS {
            return false;
        }
        self.in_progress = false;
        self.fruit = None;
        true
    }

    /// Pick one pacman uniformly among the registry (join order); everyone
    /// else becomes a ghost. Every player gets a fresh random position and
    /// cleared direction/pending input, so movement waits for a new key
    /// press. Scores and identities are untouched. No-op below two players.
    pub fn assign_roles(&mut self) {
        if self.join_order.len() < MIN_PLAYERS {
            return;
        }

        let pacman_index = self.rng.gen_range(0..self.join_order.len());
        for (index, player_id) in self.join_order.iter().enumerate() {
            if let Some(player) = self.players.get_mut(player_id) {
                player.role = if index == pacman_index {
                    Role::Pacman
                } else {
                    Role::Ghost
                };
                player.position = board::random_position(&mut self.rng);
                player.current_direction = None;
                player.pending_input = None;
            }
        }
    }

    /// Apply movement to every player. Movements are independent within a
    /// tick; interactions are only detected afterwards by the collision rule.
    pub fn advance_players(&mut self) {
        for player in self.players.values_mut() {
            player.apply_movement();
        }
    }

    /// The current pacman, if one exists
    pub fn pacman_id(&self) -> Option<Uuid> {
        self.join_order
            .iter()
            .copied()
            .find(|id| self.players.get(id).map(|p| p.role) == Some(Role::Pacman))
    }

    /// The collision and scoring rule, run once per active tick.
    ///
    /// Ghosts are scanned in join order and at most one scores per tick; a
    /// fruit capture is only checked when no ghost scored. A missing pacman
    /// yields no event.
    pub fn check_collisions(&mut self) -> Option<CaptureEvent> {
        let pacman_id = self.pacman_id()?;
        let pacman_pos = self.players[&pacman_id].position;

        for player_id in &self.join_order {
            let player = &self.players[player_id];
            if player.role == Role::Ghost && player.position == pacman_pos {
                if let Some(score) = self.scores.get_mut(player_id) {
                    *score += 1;
                }
                return Some(CaptureEvent::Ghost {
                    player_id: *player_id,
                });
            }
        }

        if self.fruit == Some(pacman_pos) {
            if let Some(score) = self.scores.get_mut(&pacman_id) {
                *score += 1;
            }
            self.fruit = Some(board::random_position(&mut self.rng));
            return Some(CaptureEvent::Fruit {
                player_id: pacman_id,
            });
        }

        None
    }

    /// Round restart after a capture: reshuffled roles, fresh fruit,
    /// unchanged scores. The match stays active throughout.
    pub fn start_new_round(&mut self) {
        self.assign_roles();
        self.fruit = Some(board::random_position(&mut self.rng));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::board::{GRID_HEIGHT, GRID_WIDTH};

    fn world_with_players(count: usize) -> (GameWorld, Vec<Uuid>) {
        let mut world = GameWorld::new(42);
        let ids: Vec<Uuid> = (0..count).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            world.add_player(*id);
            world.try_start();
        }
        (world, ids)
    }

    fn pacman_count(world: &GameWorld) -> usize {
        world
            .players
            .values()
            .filter(|p| p.role == Role::Pacman)
            .count()
    }

    fn in_bounds(pos: Position) -> bool {
        (0..GRID_WIDTH).contains(&pos.x) && (0..GRID_HEIGHT).contains(&pos.y)
    }

    #[test]
    fn single_player_stays_idle() {
        let (world, ids) = world_with_players(1);
        assert!(!world.in_progress);
        assert_eq!(world.fruit, None);
        assert_eq!(world.players[&ids[0]].role, Role::Ghost);
        assert_eq!(world.players[&ids[0]].position, Position { x: 0, y: 0 });
        assert_eq!(world.scores[&ids[0]], 0);
        assert_eq!(pacman_count(&world), 0);
    }

    #[test]
    fn second_join_starts_the_match() {
        let (world, _ids) = world_with_players(2);
        assert!(world.in_progress);
        assert!(in_bounds(world.fruit.expect("fruit set while active")));
        assert_eq!(pacman_count(&world), 1);
        for player in world.players.values() {
            assert!(in_bounds(player.position));
            assert_eq!(player.current_direction, None);
            assert_eq!(player.pending_input, None);
        }
    }

    #[test]
    fn third_join_does_not_reshuffle() {
        let (mut world, _ids) = world_with_players(2);
        let before: HashMap<Uuid, Position> = world
            .players
            .iter()
            .map(|(id, p)| (*id, p.position))
            .collect();

        let late = Uuid::new_v4();
        world.add_player(late);
        world.try_start();

        assert!(world.in_progress);
        assert_eq!(pacman_count(&world), 1);
        assert_eq!(world.players[&late].role, Role::Ghost);
        assert_eq!(world.players[&late].position, Position { x: 0, y: 0 });
        for (id, pos) in before {
            assert_eq!(world.players[&id].position, pos);
        }
    }

    #[test]
    fn pending_key_sets_direction_and_moves() {
        let mut player = PlayerState::new();
        player.position = Position { x: 5, y: 5 };
        player.pending_input = Some("d".to_string());

        player.apply_movement();

        assert_eq!(player.position, Position { x: 6, y: 5 });
        assert_eq!(player.current_direction, Some(Direction::Right));
        assert_eq!(player.pending_input, None);
    }

    #[test]
    fn movement_without_input_is_a_noop() {
        let mut player = PlayerState::new();
        player.position = Position { x: 9, y: 3 };

        player.apply_movement();

        assert_eq!(player.position, Position { x: 9, y: 3 });
        assert_eq!(player.current_direction, None);
        assert_eq!(player.pending_input, None);
    }

    #[test]
    fn unrecognized_key_is_consumed_without_turning() {
        let mut player = PlayerState::new();
        player.position = Position { x: 4, y: 4 };
        player.pending_input = Some("q".to_string());

        player.apply_movement();

        assert_eq!(player.position, Position { x: 4, y: 4 });
        assert_eq!(player.current_direction, None);
        assert_eq!(player.pending_input, None);
    }

    #[test]
    fn unrecognized_key_keeps_current_course() {
        let mut player = PlayerState::new();
        player.position = Position { x: 4, y: 4 };
        player.current_direction = Some(Direction::Left);
        player.pending_input = Some("q".to_string());

        player.apply_movement();

        assert_eq!(player.position, Position { x: 3, y: 4 });
        assert_eq!(player.current_direction, Some(Direction::Left));
    }

    #[test]
    fn movement_clamps_at_the_wall() {
        let mut player = PlayerState::new();
        player.position = Position {
            x: GRID_WIDTH - 1,
            y: 10,
        };
        player.current_direction = Some(Direction::Right);

        player.apply_movement();

        assert_eq!(
            player.position,
            Position {
                x: GRID_WIDTH - 1,
                y: 10
            }
        );
    }

    #[test]
    fn ghost_capture_scores_and_restarts_round() {
        let (mut world, _ids) = world_with_players(2);
        let pacman_id = world.pacman_id().unwrap();
        let ghost_id = *world
            .join_order
            .iter()
            .find(|id| **id != pacman_id)
            .unwrap();

        world.players.get_mut(&pacman_id).unwrap().position = Position { x: 3, y: 3 };
        world.players.get_mut(&ghost_id).unwrap().position = Position { x: 3, y: 3 };

        let event = world.check_collisions();
        assert_eq!(
            event,
            Some(CaptureEvent::Ghost {
                player_id: ghost_id
            })
        );
        assert_eq!(world.scores[&ghost_id], 1);
        assert_eq!(world.scores[&pacman_id], 0);

        world.start_new_round();
        assert!(world.in_progress);
        assert_eq!(pacman_count(&world), 1);
        assert!(world.fruit.is_some());
        assert_eq!(world.scores[&ghost_id], 1);
        for player in world.players.values() {
            assert_eq!(player.current_direction, None);
            assert_eq!(player.pending_input, None);
        }
    }

    #[test]
    fn fruit_capture_scores_pacman_and_relocates_fruit() {
        let (mut world, _ids) = world_with_players(2);
        let pacman_id = world.pacman_id().unwrap();
        let ghost_id = *world
            .join_order
            .iter()
            .find(|id| **id != pacman_id)
            .unwrap();

        world.players.get_mut(&pacman_id).unwrap().position = Position { x: 8, y: 8 };
        world.players.get_mut(&ghost_id).unwrap().position = Position { x: 0, y: 0 };
        world.fruit = Some(Position { x: 8, y: 8 });

        let event = world.check_collisions();
        assert_eq!(
            event,
            Some(CaptureEvent::Fruit {
                player_id: pacman_id
            })
        );
        assert_eq!(world.scores[&pacman_id], 1);
        assert!(in_bounds(world.fruit.expect("fruit still set")));
    }

    #[test]
    fn ghost_capture_wins_over_fruit_on_the_same_cell() {
        let (mut world, _ids) = world_with_players(2);
        let pacman_id = world.pacman_id().unwrap();
        let ghost_id = *world
            .join_order
            .iter()
            .find(|id| **id != pacman_id)
            .unwrap();

        let cell = Position { x: 6, y: 6 };
        world.players.get_mut(&pacman_id).unwrap().position = cell;
        world.players.get_mut(&ghost_id).unwrap().position = cell;
        world.fruit = Some(cell);

        let event = world.check_collisions();
        assert_eq!(
            event,
            Some(CaptureEvent::Ghost {
                player_id: ghost_id
            })
        );
        assert_eq!(world.scores[&pacman_id], 0);
        // Fruit untouched when a ghost scored first
        assert_eq!(world.fruit, Some(cell));
    }

    #[test]
    fn only_first_ghost_in_join_order_scores() {
        let (mut world, ids) = world_with_players(3);
        let pacman_id = world.pacman_id().unwrap();
        let ghosts: Vec<Uuid> = ids.iter().copied().filter(|id| *id != pacman_id).collect();

        let cell = Position { x: 2, y: 9 };
        for id in world.join_order.clone() {
            world.players.get_mut(&id).unwrap().position = cell;
        }

        let first_ghost = *world
            .join_order
            .iter()
            .find(|id| ghosts.contains(id))
            .unwrap();

        let event = world.check_collisions();
        assert_eq!(
            event,
            Some(CaptureEvent::Ghost {
                player_id: first_ghost
            })
        );
        let ghost_total: u32 = ghosts.iter().map(|id| world.scores[id]).sum();
        assert_eq!(ghost_total, 1);
        assert_eq!(world.scores[&first_ghost], 1);
    }

    #[test]
    fn missing_pacman_yields_no_event() {
        let (mut world, _ids) = world_with_players(2);
        let pacman_id = world.pacman_id().unwrap();
        world.players.get_mut(&pacman_id).unwrap().role = Role::Ghost;

        assert_eq!(world.check_collisions(), None);
    }

    #[test]
    fn dropping_below_two_players_halts_and_leaves_survivor_stale() {
        let (mut world, ids) = world_with_players(3);
        assert!(world.in_progress);

        world.remove_player(ids[0]);
        assert!(!world.try_stop());
        assert!(world.in_progress);

        let survivor = ids[2];
        let stale_role = world.players[&survivor].role;
        let stale_pos = world.players[&survivor].position;

        world.remove_player(ids[1]);
        assert!(world.try_stop());
        assert!(!world.in_progress);
        assert_eq!(world.fruit, None);
        assert_eq!(world.players[&survivor].role, stale_role);
        assert_eq!(world.players[&survivor].position, stale_pos);
        assert!(pacman_count(&world) <= 1);
    }

    #[test]
    fn scores_survive_round_restarts_but_not_leaves() {
        let (mut world, ids) = world_with_players(2);
        *world.scores.get_mut(&ids[0]).unwrap() = 5;

        world.start_new_round();
        assert_eq!(world.scores[&ids[0]], 5);

        world.remove_player(ids[0]);
        assert!(!world.scores.contains_key(&ids[0]));

        // A rejoin is a fresh identity starting at zero
        world.add_player(ids[0]);
        assert_eq!(world.scores[&ids[0]], 0);
    }

    #[test]
    fn assign_roles_is_a_noop_below_two_players() {
        let mut world = GameWorld::new(9);
        let id = Uuid::new_v4();
        world.add_player(id);
        world.assign_roles();

        assert_eq!(world.players[&id].role, Role::Ghost);
        assert_eq!(world.players[&id].position, Position { x: 0, y: 0 });
    }

    #[test]
    fn exactly_one_pacman_across_restarts() {
        let (mut world, _ids) = world_with_players(4);
        for _ in 0..20 {
            world.start_new_round();
            assert_eq!(pacman_count(&world), 1);
        }
    }

    #[test]
    fn keypress_for_unknown_player_is_ignored() {
        let mut world = GameWorld::new(3);
        assert!(!world.set_pending_input(Uuid::new_v4(), "w".to_string()));
        assert!(!world.remove_player(Uuid::new_v4()));
    }
}
