use serde::{Deserialize, Serialize};

use crate::card::{Card, PlayedCard};
use crate::command::{Command, HandState};
use crate::state::MatchView;
use crate::{PlayerId, RoomId, TeamIdx};

// --- Client -> server ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    // lobby
    CreateRoom { nickname: String },
    JoinRoom { room_id: RoomId, nickname: String },
    JoinTeam(TeamIdx),
    SetReady(bool),
    /// Host only; every seat has to be ready.
    StartMatch,

    // match
    PlayCard { slot: usize, card: Card, face_down: bool },
    Say(Command),
}

// --- Server -> client ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Sent privately after creating or joining a room.
    RoomJoined { your_id: PlayerId, room_id: RoomId, lobby: LobbyView },
    LobbyUpdated(LobbyView),

    /// Full state, redacted per recipient.
    MatchSnapshot(MatchView),

    /// `player_id` has to decide. `commands` are the calls offered to the
    /// recipient, which may differ from the acting player's.
    Prompt {
        state: HandState,
        player_id: PlayerId,
        commands: Vec<Command>,
        expires_at: Option<u64>,
    },

    CardPlayed { player_id: PlayerId, card: PlayedCard },
    CommandSaid { player_id: PlayerId, command: Command },
    HandFinished { hand_idx: usize, winner: Option<TeamIdx>, points: [u32; 2] },
    MatchFinished { winner: TeamIdx },

    Info { message: String },
    Error { message: String },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LobbyPlayer {
    pub id: PlayerId,
    pub nickname: String,
    pub team: Option<TeamIdx>,
    pub ready: bool,
    pub connected: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct LobbyView {
    pub host_id: Option<PlayerId>,
    pub players: Vec<LobbyPlayer>,
    pub started: bool,
}

impl LobbyView {
    /// Team sizes the match would be created with.
    pub fn team_sizes(&self) -> [usize; 2] {
        let count = |team| self.players.iter().filter(|p| p.team == Some(team)).count();
        [count(0), count(1)]
    }

    /// Everyone picked a team, said ready, and the teams are even.
    pub fn can_start(&self) -> bool {
        let [a, b] = self.team_sizes();
        a == b
            && matches!(a + b, 2 | 4 | 6)
            && self.players.iter().all(|p| p.ready && p.team.is_some())
    }
}

impl From<Command> for ClientMessage {
    fn from(command: Command) -> Self {
        ClientMessage::Say(command)
    }
}
