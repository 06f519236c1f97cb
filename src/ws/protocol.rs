//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::board::Position;

/// Player roles in the chase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The single hunted player; scores by reaching the fruit
    Pacman,
    /// Everyone else; scores by touching pacman
    Ghost,
}

impl Default for Role {
    fn default() -> Self {
        Self::Ghost
    }
}

/// Movement directions on the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Map a raw key press to a direction. Unrecognized keys map to `None`
    /// and leave the player's current direction untouched.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "w" => Some(Self::Up),
            "s" => Some(Self::Down),
            "a" => Some(Self::Left),
            "d" => Some(Self::Right),
            _ => None,
        }
    }
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// A key press; the raw key is kept verbatim and interpreted at the
    /// next movement application
    Keypress { key: String },
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Private full-state snapshot sent once to a newly connected client
    InitialState(GameSnapshot),

    /// Full-state snapshot broadcast to every connected client, on each
    /// active tick and on every join/leave
    GamestateUpdate(GameSnapshot),
}

impl ServerMsg {
    /// The snapshot payload, regardless of message kind
    pub fn snapshot(&self) -> &GameSnapshot {
        match self {
            Self::InitialState(s) | Self::GamestateUpdate(s) => s,
        }
    }
}

/// The full shared game state as seen on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    /// All connected players, keyed by connection identity
    pub players: HashMap<Uuid, PlayerSnapshot>,
    /// The shared fruit; `null` while no match is in progress
    pub fruit: Option<Position>,
    /// Cumulative score per connection identity
    pub scores: HashMap<Uuid, u32>,
    #[serde(rename = "gameInProgress")]
    pub game_in_progress: bool,
}

/// A single player's state in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub x: i32,
    pub y: i32,
    pub role: Role,
    /// Direction of travel; `null` until the player presses a key
    pub current_direction: Option<Direction>,
    /// Most recent unconsumed key press, kept verbatim
    pub pending_input: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_snapshot(id: Uuid) -> GameSnapshot {
        let mut players = HashMap::new();
        players.insert(
            id,
            PlayerSnapshot {
                x: 5,
                y: 7,
                role: Role::Pacman,
                current_direction: Some(Direction::Right),
                pending_input: Some("w".to_string()),
            },
        );
        let mut scores = HashMap::new();
        scores.insert(id, 3);

        GameSnapshot {
            players,
            fruit: Some(Position { x: 12, y: 4 }),
            scores,
            game_in_progress: true,
        }
    }

    #[test]
    fn keypress_deserializes_from_tagged_json() {
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"keypress","key":"w"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMsg::Keypress {
                key: "w".to_string()
            }
        );
    }

    #[test]
    fn snapshot_uses_expected_wire_keys() {
        let id = Uuid::new_v4();
        let msg = ServerMsg::GamestateUpdate(sample_snapshot(id));
        let value = serde_json::to_value(&msg).unwrap();

        assert_eq!(value["type"], "gamestate_update");
        assert_eq!(value["gameInProgress"], json!(true));
        assert_eq!(value["fruit"], json!({"x": 12, "y": 4}));

        let player = &value["players"][id.to_string()];
        assert_eq!(player["x"], json!(5));
        assert_eq!(player["y"], json!(7));
        assert_eq!(player["role"], "pacman");
        assert_eq!(player["currentDirection"], "right");
        assert_eq!(player["pendingInput"], "w");

        assert_eq!(value["scores"][id.to_string()], json!(3));
    }

    #[test]
    fn initial_state_uses_its_own_tag() {
        let id = Uuid::new_v4();
        let msg = ServerMsg::InitialState(sample_snapshot(id));
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "initial_state");
    }

    #[test]
    fn idle_snapshot_has_null_fruit_and_direction() {
        let id = Uuid::new_v4();
        let mut snapshot = sample_snapshot(id);
        snapshot.fruit = None;
        snapshot.game_in_progress = false;
        let player = snapshot.players.get_mut(&id).unwrap();
        player.current_direction = None;
        player.pending_input = None;

        let value = serde_json::to_value(ServerMsg::GamestateUpdate(snapshot)).unwrap();
        assert_eq!(value["fruit"], json!(null));
        assert_eq!(value["gameInProgress"], json!(false));
        let player = &value["players"][id.to_string()];
        assert_eq!(player["currentDirection"], json!(null));
        assert_eq!(player["pendingInput"], json!(null));
    }

    #[test]
    fn server_msg_round_trips() {
        let msg = ServerMsg::GamestateUpdate(sample_snapshot(Uuid::new_v4()));
        let json = serde_json::to_string(&msg).unwrap();
        let back: ServerMsg = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
