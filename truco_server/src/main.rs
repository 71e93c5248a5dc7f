mod room;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use clap::Parser;
use dashmap::DashMap;
use futures_util::{SinkExt, stream::StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use room::{Action, PlayerConnection, Room, broadcast, run_match};
use truco_core::{ClientMessage, LobbyPlayer, Match, MatchOptions, Player, PlayerId, RoomId, ServerMessage};

#[derive(Parser, Debug, Clone)]
#[command(about = "Truco table server")]
struct ServerArgs {
    #[arg(long, default_value = "0.0.0.0:25917")]
    listen: SocketAddr,
    /// Points of each phase; a match is won at twice this.
    #[arg(long, default_value_t = 9)]
    match_point: u32,
    #[arg(long, default_value_t = 30_000)]
    turn_time_ms: u64,
    /// Fixed dealing seed, for reproducible matches.
    #[arg(long)]
    seed: Option<u64>,
}

impl ServerArgs {
    fn match_options(&self) -> MatchOptions {
        MatchOptions {
            match_point: self.match_point,
            seed: self.seed,
            turn_time_ms: self.turn_time_ms,
            ..MatchOptions::default()
        }
    }
}

struct AppState {
    rooms: DashMap<RoomId, Arc<Room>>,
    args: ServerArgs,
}

type SharedState = Arc<AppState>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = ServerArgs::parse();
    let addr = args.listen;

    let state = SharedState::new(AppState { rooms: DashMap::new(), args });
    let app = Router::new().route("/ws", get(websocket_handler)).with_state(state);

    info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(32);

    // writer: drains the channel into the socket
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let payload = match serde_json::to_string(&msg) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(%err, "failed to encode message");
                    continue;
                }
            };
            if sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    let mut context: Option<(RoomId, PlayerId)> = None;

    while let Some(Ok(msg)) = receiver.next().await {
        if let Message::Text(text) = msg {
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => handle_client_message(client_msg, state.clone(), &tx, &mut context).await,
                Err(err) => {
                    warn!(%err, "unreadable client message");
                    let _ = tx.send(ServerMessage::Error { message: "unreadable message".to_string() }).await;
                }
            }
        }
    }

    if let Some((room_id, player_id)) = context {
        handle_disconnect(state, room_id, player_id).await;
    }
    info!("connection closed");
}

fn error(message: &str) -> ServerMessage {
    ServerMessage::Error { message: message.to_string() }
}

async fn handle_client_message(
    msg: ClientMessage,
    state: SharedState,
    tx: &mpsc::Sender<ServerMessage>,
    context: &mut Option<(RoomId, PlayerId)>,
) {
    match msg {
        ClientMessage::CreateRoom { nickname } => {
            if context.is_some() {
                let _ = tx.send(error("already in a room")).await;
                return;
            }
            let room_id = Uuid::new_v4();
            let player_id = Uuid::new_v4();

            let mut room = Room::new(room_id);
            room.players.get_mut().insert(player_id, PlayerConnection { sender: tx.clone() });
            let lobby = room.lobby.get_mut();
            lobby.host_id = Some(player_id);
            lobby.players.push(LobbyPlayer { id: player_id, nickname, team: None, ready: false, connected: true });
            let lobby = lobby.clone();

            state.rooms.insert(room_id, Arc::new(room));
            info!(room_id = %room_id, player = %player_id, "room created");
            *context = Some((room_id, player_id));
            let _ = tx.send(ServerMessage::RoomJoined { your_id: player_id, room_id, lobby }).await;
        }
        ClientMessage::JoinRoom { room_id, nickname } => {
            if context.is_some() {
                let _ = tx.send(error("already in a room")).await;
                return;
            }
            let room = state.rooms.get(&room_id).map(|r| r.clone());
            let Some(room) = room else {
                let _ = tx.send(error("no such room")).await;
                return;
            };

            let player_id = Uuid::new_v4();
            let lobby = {
                let mut players = room.players.write().await;
                let mut lobby = room.lobby.lock().await;
                if lobby.started {
                    drop(lobby);
                    drop(players);
                    let _ = tx.send(error("the match already started")).await;
                    return;
                }
                if lobby.players.len() >= MatchOptions::default().max_players {
                    drop(lobby);
                    drop(players);
                    let _ = tx.send(error("the room is full")).await;
                    return;
                }
                lobby.players.push(LobbyPlayer { id: player_id, nickname, team: None, ready: false, connected: true });
                players.insert(player_id, PlayerConnection { sender: tx.clone() });
                lobby.clone()
            };

            info!(room_id = %room_id, player = %player_id, "player joined");
            *context = Some((room_id, player_id));
            {
                let players = room.players.read().await;
                broadcast(players.iter(), &ServerMessage::LobbyUpdated(lobby.clone()), Some(player_id)).await;
            }
            let _ = tx.send(ServerMessage::RoomJoined { your_id: player_id, room_id, lobby }).await;
        }
        _ => {
            let Some((room_id, player_id)) = *context else {
                let _ = tx.send(error("create or join a room first")).await;
                return;
            };
            let room = state.rooms.get(&room_id).map(|r| r.clone());
            let Some(room) = room else {
                let _ = tx.send(error("no such room")).await;
                return;
            };
            if let Err(message) = handle_room_message(msg, &state, &room, player_id).await {
                let _ = tx.send(ServerMessage::Error { message }).await;
            }
        }
    }
}

/// Lobby and in-match messages of a seated player.
async fn handle_room_message(
    msg: ClientMessage,
    state: &SharedState,
    room: &Arc<Room>,
    player_id: PlayerId,
) -> Result<(), String> {
    match msg {
        ClientMessage::JoinTeam(team) => {
            if team > 1 {
                return Err("team must be 0 or 1".to_string());
            }
            update_lobby_player(room, player_id, |p| {
                p.team = Some(team);
                p.ready = false;
            })
            .await?;
        }
        ClientMessage::SetReady(ready) => {
            update_lobby_player(room, player_id, |p| p.ready = ready).await?;
        }
        ClientMessage::StartMatch => start_match(state, room, player_id).await?,
        ClientMessage::PlayCard { slot, card, face_down } => {
            forward(room, Action::Play { player: player_id, slot, card, face_down }).await?;
        }
        ClientMessage::Say(command) => forward(room, Action::Say { player: player_id, command }).await?,
        ClientMessage::CreateRoom { .. } | ClientMessage::JoinRoom { .. } => return Err("already in a room".to_string()),
    }
    Ok(())
}

async fn update_lobby_player(
    room: &Room,
    player_id: PlayerId,
    update: impl FnOnce(&mut LobbyPlayer),
) -> Result<(), String> {
    {
        let mut lobby = room.lobby.lock().await;
        if lobby.started {
            return Err("the match already started".to_string());
        }
        let player = lobby.players.iter_mut().find(|p| p.id == player_id).ok_or("not in this room")?;
        update(player);
    }
    room.lobby_updated().await;
    Ok(())
}

async fn start_match(state: &SharedState, room: &Arc<Room>, player_id: PlayerId) -> Result<(), String> {
    let game = {
        let mut lobby = room.lobby.lock().await;
        if lobby.host_id != Some(player_id) {
            return Err("only the host can start the match".to_string());
        }
        if lobby.started {
            return Err("the match already started".to_string());
        }
        if !lobby.can_start() {
            return Err("teams must be even and everyone ready".to_string());
        }
        let players = lobby
            .players
            .iter()
            .filter_map(|p| p.team.map(|team| Player::new(p.id, p.nickname.clone(), team)))
            .collect();
        let game = Match::new(players, state.args.match_options()).map_err(|e| e.to_string())?;
        lobby.started = true;
        game
    };

    let (tx, rx) = mpsc::channel::<Action>(32);
    *room.actions.lock().await = Some(tx);
    info!(room_id = %room.id, match_id = %game.id, "match starting");
    room.lobby_updated().await;
    tokio::spawn(run_match(room.clone(), game, rx));
    Ok(())
}

async fn forward(room: &Room, action: Action) -> Result<(), String> {
    let sender = room.actions.lock().await.clone().ok_or("no match in progress")?;
    sender.send(action).await.map_err(|_| "the match is over".to_string())
}

async fn handle_disconnect(state: SharedState, room_id: RoomId, player_id: PlayerId) {
    info!(room_id = %room_id, player = %player_id, "player disconnected");
    let room = state.rooms.get(&room_id).map(|r| r.clone());
    let Some(room) = room else {
        return;
    };

    let (in_match, empty) = {
        let mut players = room.players.write().await;
        players.remove(&player_id);
        let mut lobby = room.lobby.lock().await;
        if lobby.started {
            if let Some(p) = lobby.players.iter_mut().find(|p| p.id == player_id) {
                p.connected = false;
            }
        } else {
            lobby.players.retain(|p| p.id != player_id);
        }
        if lobby.host_id == Some(player_id) {
            lobby.host_id = players.keys().next().copied();
            info!(room_id = %room_id, host = ?lobby.host_id, "host handed over");
        }
        (lobby.started, players.is_empty())
    };

    if in_match {
        if let Err(err) = forward(&room, Action::Leave(player_id)).await {
            warn!(room_id = %room_id, %err, "could not hand the leave to the match");
        }
    }
    if empty {
        // a running match ends on its own once everyone has left
        state.rooms.remove(&room_id);
        info!(room_id = %room_id, "room closed");
    } else {
        room.lobby_updated().await;
    }
}
