use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, bail};
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::time::{Instant, timeout_at};
use tracing::{error, info, warn};

use truco_core::{
    Card, Command, GameLoop, HandState, LobbyView, Match, MatchHandlers, PlayInstance, PlayerId, RoomId,
    ServerMessage, TeamIdx,
};

/// One table. Lock order: `players` -> `lobby` -> `actions`.
pub struct Room {
    pub id: RoomId,
    pub players: RwLock<HashMap<PlayerId, PlayerConnection>>,
    pub lobby: Mutex<LobbyView>,
    /// Feeds the running match. `None` while in the lobby.
    pub actions: Mutex<Option<mpsc::Sender<Action>>>,
}

pub struct PlayerConnection {
    pub sender: mpsc::Sender<ServerMessage>,
}

/// A player's input, forwarded to the task that owns the match.
#[derive(Debug, Clone)]
pub enum Action {
    Play { player: PlayerId, slot: usize, card: Card, face_down: bool },
    Say { player: PlayerId, command: Command },
    Leave(PlayerId),
}

impl Room {
    pub fn new(id: RoomId) -> Self {
        Room {
            id,
            players: RwLock::new(HashMap::new()),
            lobby: Mutex::new(LobbyView::default()),
            actions: Mutex::new(None),
        }
    }

    pub async fn send_to(&self, player: &PlayerId, message: ServerMessage) {
        if let Some(conn) = self.players.read().await.get(player) {
            if conn.sender.send(message).await.is_err() {
                warn!(room_id = %self.id, player = %player, "send failed, connection is gone");
            }
        }
    }

    pub async fn broadcast(&self, message: &ServerMessage) {
        broadcast(self.players.read().await.iter(), message, None).await;
    }

    /// Sends every connection its own version of a message.
    pub async fn broadcast_with(&self, build: impl Fn(&PlayerId) -> ServerMessage) {
        for (player, conn) in self.players.read().await.iter() {
            if conn.sender.send(build(player)).await.is_err() {
                warn!(room_id = %self.id, player = %player, "send failed, connection is gone");
            }
        }
    }

    pub async fn lobby_updated(&self) {
        let lobby = self.lobby.lock().await.clone();
        self.broadcast(&ServerMessage::LobbyUpdated(lobby)).await;
    }
}

pub async fn broadcast<'a>(
    players: impl Iterator<Item = (&'a PlayerId, &'a PlayerConnection)>,
    message: &ServerMessage,
    exclude: Option<PlayerId>,
) {
    for (player_id, conn) in players {
        if Some(*player_id) == exclude {
            continue;
        }
        if conn.sender.send(message.clone()).await.is_err() {
            // its own socket task cleans up
            warn!(player = %player_id, "send failed, connection is gone");
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_millis() as u64)
}

/// Plays a match in its own task and returns the room to the lobby.
pub async fn run_match(room: Arc<Room>, game: Match, actions: mpsc::Receiver<Action>) {
    let turn_time = Duration::from_millis(game.options.turn_time_ms);
    let mut handlers = RoomHandlers { room: room.clone(), actions, turn_time };
    let mut game_loop = GameLoop::new(game);

    match game_loop.run(&mut handlers).await {
        Ok(winner) => info!(room_id = %room.id, winner, "match over"),
        Err(err) => {
            error!(room_id = %room.id, %err, "match aborted");
            room.broadcast(&ServerMessage::Error { message: format!("match aborted: {}", err) }).await;
        }
    }

    {
        let connected = room.players.read().await;
        let mut lobby = room.lobby.lock().await;
        lobby.started = false;
        lobby.players.retain(|p| connected.contains_key(&p.id));
        for player in lobby.players.iter_mut() {
            player.ready = false;
        }
        *room.actions.lock().await = None;
    }
    room.lobby_updated().await;
}

/// Bridges the match to the sockets of one room.
struct RoomHandlers {
    room: Arc<Room>,
    actions: mpsc::Receiver<Action>,
    turn_time: Duration,
}

impl RoomHandlers {
    async fn snapshot(&self, play: &PlayInstance<'_>) {
        self.room.broadcast_with(|id| ServerMessage::MatchSnapshot(play.view_for(id))).await;
    }

    /// Prompts the room and waits for the decision, forcing a default one
    /// when the turn runs out.
    async fn decide(&mut self, play: &mut PlayInstance<'_>) -> anyhow::Result<()> {
        let player = play.player.context("decision without a player")?;
        let expires_at = now_millis() + self.turn_time.as_millis() as u64;
        play.set_turn_expiry(Some(expires_at));

        self.snapshot(play).await;
        let state = play.state;
        self.room
            .broadcast_with(|id| ServerMessage::Prompt {
                state,
                player_id: player,
                commands: play.commands_for(id).into_iter().collect(),
                expires_at: Some(expires_at),
            })
            .await;

        let deadline = Instant::now() + self.turn_time;
        while play.is_waiting() {
            match timeout_at(deadline, self.actions.recv()).await {
                Ok(Some(action)) => {
                    if !self.apply(play, action).await {
                        break;
                    }
                }
                Ok(None) => bail!("room {} stopped feeding actions", self.room.id),
                Err(_) => {
                    self.force_default(play, player).await;
                    break;
                }
            }
        }
        play.set_turn_expiry(None);
        Ok(())
    }

    /// Applies one action. Returns false once the decision can't be made
    /// anymore.
    async fn apply(&mut self, play: &mut PlayInstance<'_>, action: Action) -> bool {
        match action {
            Action::Play { player, slot, card, face_down } => {
                if play.player != Some(player) {
                    self.room.send_to(&player, ServerMessage::Error { message: "not your turn".to_string() }).await;
                    return true;
                }
                let played = if face_down { play.burn_card(slot, card) } else { play.use_card(slot, card) };
                match played {
                    Some(card) => self.room.broadcast(&ServerMessage::CardPlayed { player_id: player, card }).await,
                    None => self.room.send_to(&player, ServerMessage::Error { message: "card refused".to_string() }).await,
                }
            }
            Action::Say { player, command } => match play.say(command, &player) {
                Some(command) => self.room.broadcast(&ServerMessage::CommandSaid { player_id: player, command }).await,
                None => {
                    let message = format!("{} is not available now", command);
                    self.room.send_to(&player, ServerMessage::Error { message }).await;
                }
            },
            Action::Leave(player) => {
                play.abandon(&player);
                self.room.broadcast(&ServerMessage::Info { message: format!("player {} left the match", player) }).await;
                let game = play.game();
                if game.teams.iter().any(|t| t.is_abandoned(&game.table.players)) {
                    return false;
                }
            }
        }
        true
    }

    async fn force_default(&mut self, play: &mut PlayInstance<'_>, player: PlayerId) {
        let command = match play.state {
            HandState::WaitingEnvidoPointsAnswer => {
                play.commands.iter().rev().find(|c| matches!(c, Command::Points(_))).copied()
            }
            HandState::WaitingForTrucoAnswer | HandState::WaitingEnvidoAnswer => Some(Command::NoQuiero),
            HandState::WaitingPlay => Some(Command::Mazo),
            HandState::Finished => None,
        };
        let Some(command) = command else {
            return;
        };
        info!(room_id = %self.room.id, player = %player, %command, "turn timed out");
        if let Some(command) = play.say(command, &player) {
            self.room.broadcast(&ServerMessage::CommandSaid { player_id: player, command }).await;
        }
    }
}

impl MatchHandlers for RoomHandlers {
    async fn on_turn(&mut self, play: &mut PlayInstance<'_>) -> anyhow::Result<()> {
        self.decide(play).await
    }

    async fn on_truco(&mut self, play: &mut PlayInstance<'_>) -> anyhow::Result<()> {
        self.decide(play).await
    }

    async fn on_envido(&mut self, play: &mut PlayInstance<'_>) -> anyhow::Result<()> {
        self.decide(play).await
    }

    async fn on_hand_finished(&mut self, game: &Match, hand_idx: usize, winner: Option<TeamIdx>) -> anyhow::Result<()> {
        let points = game.hands.get(hand_idx).map_or([0, 0], |h| h.points);
        self.room.broadcast(&ServerMessage::HandFinished { hand_idx, winner, points }).await;
        self.room.broadcast_with(|id| ServerMessage::MatchSnapshot(game.for_client(id))).await;
        Ok(())
    }

    async fn on_winner(&mut self, game: &Match, winner: TeamIdx) -> anyhow::Result<()> {
        self.room.broadcast_with(|id| ServerMessage::MatchSnapshot(game.for_client(id))).await;
        self.room.broadcast(&ServerMessage::MatchFinished { winner }).await;
        Ok(())
    }
}
