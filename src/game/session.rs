//! The authoritative game session and its fixed-rate tick loop

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use crate::util::time::TICK_INTERVAL;
use crate::ws::protocol::ServerMsg;

use super::snapshot::build_snapshot;
use super::world::{CaptureEvent, GameWorld};
use super::GameCommand;

/// Handle to the running session, cloned into every connection and route
#[derive(Clone)]
pub struct GameHandle {
    pub command_tx: mpsc::Sender<GameCommand>,
    pub broadcast_tx: broadcast::Sender<ServerMsg>,
    player_count: Arc<AtomicUsize>,
    in_progress: Arc<AtomicBool>,
}

impl GameHandle {
    /// Subscribe to the snapshot broadcast stream
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.broadcast_tx.subscribe()
    }

    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    pub fn game_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Relaxed)
    }
}

/// The single authoritative session. Owns the world; all mutation happens on
/// this task, multiplexing connection commands with the tick interval.
pub struct GameSession {
    world: GameWorld,
    command_rx: mpsc::Receiver<GameCommand>,
    broadcast_tx: broadcast::Sender<ServerMsg>,
    player_count: Arc<AtomicUsize>,
    in_progress: Arc<AtomicBool>,
}

impl GameSession {
    /// Create the session and its shared handle
    pub fn new(seed: u64) -> (Self, GameHandle) {
        let (command_tx, command_rx) = mpsc::channel(256);
        let (broadcast_tx, _) = broadcast::channel(64);
        let player_count = Arc::new(AtomicUsize::new(0));
        let in_progress = Arc::new(AtomicBool::new(false));

        let handle = GameHandle {
            command_tx,
            broadcast_tx: broadcast_tx.clone(),
            player_count: player_count.clone(),
            in_progress: in_progress.clone(),
        };

        let session = Self {
            world: GameWorld::new(seed),
            command_rx,
            broadcast_tx,
            player_count,
            in_progress,
        };

        (session, handle)
    }

    /// Run forever: connection commands and ticks interleave on this one
    /// task, ticks strictly ordered as movement -> collision -> reassignment
    /// -> broadcast.
    pub async fn run(mut self) {
        info!("Game session started");

        // Boot-time start attempt; a no-op until two players have joined
        self.world.try_start();

        let mut ticker = interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick();
                }
                command = self.command_rx.recv() => {
                    match command {
                        Some(command) => self.handle_command(command),
                        None => break,
                    }
                }
            }
        }

        info!("Game session stopped");
    }

    fn handle_command(&mut self, command: GameCommand) {
        match command {
            GameCommand::Connect {
                player_id,
                reply_tx,
            } => self.handle_connect(player_id, reply_tx),
            GameCommand::Keypress { player_id, key } => {
                if !self.world.set_pending_input(player_id, key) {
                    debug!(player_id = %player_id, "Keypress for unknown player, ignoring");
                }
            }
            GameCommand::Disconnect { player_id } => self.handle_disconnect(player_id),
        }
    }

    fn handle_connect(&mut self, player_id: Uuid, reply_tx: oneshot::Sender<ServerMsg>) {
        self.world.add_player(player_id);

        if self.world.try_start() {
            info!(
                player_count = self.world.player_count(),
                "Match started"
            );
        }
        self.publish_stats();

        info!(
            player_id = %player_id,
            player_count = self.world.player_count(),
            "Player connected"
        );

        // Private initial snapshot first, then the join broadcast
        let snapshot = build_snapshot(&self.world);
        let _ = reply_tx.send(ServerMsg::InitialState(snapshot.clone()));
        let _ = self
            .broadcast_tx
            .send(ServerMsg::GamestateUpdate(snapshot));
    }

    fn handle_disconnect(&mut self, player_id: Uuid) {
        if !self.world.remove_player(player_id) {
            debug!(player_id = %player_id, "Disconnect for unknown player, ignoring");
            return;
        }

        if self.world.try_stop() {
            info!(
                player_count = self.world.player_count(),
                "Match stopped, not enough players"
            );
        }
        self.publish_stats();

        info!(
            player_id = %player_id,
            player_count = self.world.player_count(),
            "Player disconnected"
        );

        self.broadcast_state();
    }

    /// One fixed-rate tick. Idle sessions do nothing, not even broadcast.
    fn tick(&mut self) {
        if !self.world.in_progress {
            return;
        }

        self.world.advance_players();

        if let Some(capture) = self.world.check_collisions() {
            match capture {
                CaptureEvent::Ghost { player_id } => {
                    info!(player_id = %player_id, "Ghost caught pacman, new round");
                }
                CaptureEvent::Fruit { player_id } => {
                    info!(player_id = %player_id, "Pacman took the fruit, new round");
                }
            }
            self.world.start_new_round();
        }

        self.broadcast_state();
    }

    fn broadcast_state(&self) {
        let _ = self
            .broadcast_tx
            .send(ServerMsg::GamestateUpdate(build_snapshot(&self.world)));
    }

    fn publish_stats(&self) {
        self.player_count
            .store(self.world.player_count(), Ordering::Relaxed);
        self.in_progress
            .store(self.world.in_progress, Ordering::Relaxed);
    }
}
