//! Game simulation modules

pub mod board;
pub mod session;
pub mod snapshot;
pub mod world;

pub use session::{GameHandle, GameSession};

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::ws::protocol::ServerMsg;

/// A connection event delivered to the session task. All state mutation goes
/// through this channel, so the world keeps a single writer.
#[derive(Debug)]
pub enum GameCommand {
    /// A new connection; the reply carries the private initial snapshot
    Connect {
        player_id: Uuid,
        reply_tx: oneshot::Sender<ServerMsg>,
    },
    /// A raw key press from a connected client
    Keypress { player_id: Uuid, key: String },
    /// The connection closed
    Disconnect { player_id: Uuid },
}
