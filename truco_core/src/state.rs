use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::card::PlayedCard;
use crate::command::{Command, EnvidoRaise, HandState};
use crate::game::Match;
use crate::player::PublicPlayer;
use crate::team::PublicTeam;
use crate::{MatchId, PlayerId, TeamIdx};

/// A card on the table, by player rather than by seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayView {
    pub player: PlayerId,
    pub team: TeamIdx,
    pub card: PlayedCard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundView {
    pub plays: Vec<PlayView>,
    pub winner: Option<PlayerId>,
    pub tie: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvidoView {
    pub calls: Vec<EnvidoRaise>,
    pub answer: Option<bool>,
    pub declarations: Vec<(PlayerId, u8)>,
    pub winning_team: Option<TeamIdx>,
}

/// Snapshot of a match as one client may see it.
///
/// Built from the match without touching it: hands of other players are
/// `None` placeholders, and envido candidates are only filled in for the
/// viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchView {
    pub id: MatchId,
    pub match_point: u32,
    pub players: Vec<PublicPlayer>, // in seating order
    pub teams: Vec<PublicTeam>,
    pub forehand: Option<PlayerId>,
    pub hand_idx: Option<usize>,
    pub state: Option<HandState>,
    pub current_player: Option<PlayerId>,
    pub rounds: Vec<RoundView>,
    pub truco_state: u8,
    pub truco_team: Option<TeamIdx>,
    pub envido: Option<EnvidoView>,
    pub hand_winner: Option<TeamIdx>,
    pub winner: Option<TeamIdx>,
    /// What the viewer may issue right now.
    pub commands: BTreeSet<Command>,
}

impl Match {
    /// View for `viewer`: only their own cards are visible.
    pub fn for_client(&self, viewer: &PlayerId) -> MatchView {
        self.view(Some(viewer))
    }

    /// View for spectators and logs: no hand is visible.
    pub fn public_view(&self) -> MatchView {
        self.view(None)
    }

    fn view(&self, viewer: Option<&PlayerId>) -> MatchView {
        let seat_id = |seat: usize| self.table.players[seat].id;
        let hand = self.current_hand();

        let rounds = hand
            .map(|h| {
                h.rounds
                    .iter()
                    .map(|round| RoundView {
                        plays: round
                            .plays
                            .iter()
                            .map(|p| PlayView { player: seat_id(p.seat), team: p.team, card: p.card })
                            .collect(),
                        winner: round.winner.filter(|_| !round.tie).map(|w| seat_id(w.seat)),
                        tie: round.tie,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let envido = hand.filter(|h| h.envido.started).map(|h| EnvidoView {
            calls: h.envido.calls.clone(),
            answer: h.envido.answer,
            declarations: h.envido.declarations.iter().map(|d| (seat_id(d.seat), d.points)).collect(),
            winning_team: h.envido.winning_team,
        });

        MatchView {
            id: self.id,
            match_point: self.options.match_point,
            players: self.table.players.iter().map(|p| p.public_view(viewer)).collect(),
            teams: self.teams.iter().map(PublicTeam::from).collect(),
            forehand: hand.map(|h| seat_id(h.forehand)),
            hand_idx: hand.map(|h| h.idx),
            state: hand.map(|h| h.state),
            current_player: hand.and_then(|h| h.current_player).map(seat_id),
            rounds,
            truco_state: hand.map_or(1, |h| h.truco.state),
            truco_team: hand.and_then(|h| h.truco.team),
            envido,
            hand_winner: hand.and_then(|h| h.winner),
            winner: self.winner,
            commands: viewer.map(|id| self.legal_commands(id)).unwrap_or_default(),
        }
    }
}
