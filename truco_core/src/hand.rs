use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::iter;
use tracing::{debug, info};

use crate::TeamIdx;
use crate::card::{Card, PlayedCard};
use crate::command::{Command, EnvidoRaise, HandState};
use crate::envido::{Envido, EnvidoDeclaration};
use crate::error::IllegalAction;
use crate::round::Round;
use crate::table::Table;
use crate::team::Team;
use crate::truco::Truco;

pub const MAX_ROUNDS: usize = 3;

/// Result of asking a hand for its next decision point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandStep {
    /// `seat` has to decide.
    Awaiting(usize),
    /// Internal bookkeeping happened, ask again.
    Skip,
    Finished,
}

/// One deal: up to three rounds plus the envido and truco negotiations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hand {
    pub idx: usize,
    pub state: HandState,
    pub forehand: usize,
    pub turn: usize,
    pub current_player: Option<usize>, // seat surfaced by the last step
    pub rounds: Vec<Round>,
    pub completed_rounds: usize,
    pub envido: Envido,
    pub truco: Truco,
    pub points: [u32; 2],
    pub winner: Option<TeamIdx>,
    pub(crate) settled: bool,
}

impl Hand {
    pub fn new(idx: usize, table: &Table) -> Self {
        Hand {
            idx,
            state: HandState::WaitingPlay,
            forehand: table.forehand,
            turn: table.forehand,
            current_player: None,
            rounds: vec![Round::new()],
            completed_rounds: 0,
            envido: Envido::new(),
            truco: Truco::new(),
            points: [0, 0],
            winner: None,
            settled: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state == HandState::Finished
    }

    pub fn current_round(&self) -> &Round {
        // a hand always holds at least one round
        &self.rounds[self.rounds.len() - 1]
    }

    /// Zero-based index of the round being played.
    pub fn round_idx(&self) -> usize {
        self.rounds.len() - 1
    }

    /// Winning team of every completed round, `None` for a tied one.
    pub fn round_results(&self) -> Vec<Option<TeamIdx>> {
        self.rounds[..self.completed_rounds].iter().map(Round::winning_team).collect()
    }

    /// State to go back to once an envido is settled.
    fn resume_state(&self) -> HandState {
        if self.truco.waiting_answer { HandState::WaitingForTrucoAnswer } else { HandState::WaitingPlay }
    }

    // --- Turn sequencing ---

    /// Surfaces the next decision of the hand.
    ///
    /// 1. Settles first, so a hand that just ended reports `Finished`.
    /// 2. Clears the turn flags of every seat.
    /// 3. Picks the deciding seat for the current state:
    ///    - `WaitingPlay`: the seat holding the turn. A folded seat, or one
    ///      that already played this round, passes the turn on and the step
    ///      is a `Skip`.
    ///    - truco and envido answers: the next eligible seat of the answering
    ///      team. These cycle on every call until someone answers.
    ///    - points declaration: the current declarer. A declarer who left is
    ///      passed over with a `Skip`.
    /// 4. Flags that seat (`is_turn` or `is_envido_turn`) and returns it.
    pub(crate) fn next_step(&mut self, table: &mut Table, teams: &[Team; 2]) -> HandStep {
        self.settle(table, teams);
        for player in table.players.iter_mut() {
            player.is_turn = false;
            player.is_envido_turn = false;
        }

        let seat = match self.state {
            HandState::Finished => {
                self.current_player = None;
                return HandStep::Finished;
            }
            HandState::WaitingPlay => {
                let blocked = !table.players[self.turn].is_active() || self.current_round().has_played(self.turn);
                if blocked {
                    self.advance_turn(table);
                    self.settle(table, teams);
                    return HandStep::Skip;
                }
                Some(self.turn)
            }
            HandState::WaitingForTrucoAnswer => self.truco.next_answerer(|s| table.players[s].is_active()),
            HandState::WaitingEnvidoAnswer => self.envido.next_answerer(|s| table.players[s].is_active()),
            HandState::WaitingEnvidoPointsAnswer => match self.envido.current_declarer() {
                Some(s) if table.players[s].is_active() => Some(s),
                _ => {
                    // the declarer left the table
                    self.envido.advance_declarer();
                    if self.envido.finished {
                        self.state = self.resume_state();
                    }
                    return HandStep::Skip;
                }
            },
        };

        let Some(seat) = seat else {
            self.settle(table, teams);
            return HandStep::Skip;
        };

        self.current_player = Some(seat);
        match self.state {
            HandState::WaitingEnvidoAnswer | HandState::WaitingEnvidoPointsAnswer => {
                table.players[seat].is_envido_turn = true
            }
            _ => table.players[seat].is_turn = true,
        }
        HandStep::Awaiting(seat)
    }

    /// Hands the turn to the next active seat that has not played this round,
    /// closing the round when there is none.
    fn advance_turn(&mut self, table: &Table) {
        let round = self.current_round();
        let next = table
            .seats_from(self.turn)
            .skip(1)
            .chain(iter::once(self.turn))
            .find(|&s| table.players[s].is_active() && !round.has_played(s));

        match next {
            Some(seat) => self.turn = seat,
            None => self.complete_round(table),
        }
    }

    fn complete_round(&mut self, table: &Table) {
        self.completed_rounds = self.rounds.len();
        let round = self.current_round();
        debug!(hand = self.idx, round = self.round_idx(), winner = ?round.winning_team(), tie = round.tie, "round complete");

        let forehand_team = table.players[self.forehand].team;
        if self.rounds.len() >= MAX_ROUNDS || resolve_hand_winner(&self.round_results(), forehand_team).is_some() {
            return;
        }

        let leader = match round.winner {
            Some(winner) if !round.tie => winner.seat,
            _ => self.forehand,
        };
        self.rounds.push(Round::new());
        self.turn = leader;
        if !table.players[leader].is_active() {
            self.advance_turn(table);
        }
    }

    /// Finishes the hand if any ending condition holds.
    ///
    /// Checked in this order:
    /// 1. A declined truco: the team that made the call takes the hand.
    /// 2. A team with no active player left: the other team takes the hand.
    ///    Open negotiations are closed first:
    ///    - a truco call waiting on the folding team counts as declined;
    ///    - a truco call the folding team made itself was never agreed, so
    ///      the ladder drops back one rung;
    ///    - an envido call waiting for the folding team is declined;
    ///    - an accepted envido whose points are not all declared goes to the
    ///      team still at the table.
    /// 3. The completed rounds decide a winner.
    pub(crate) fn settle(&mut self, table: &mut Table, teams: &[Team; 2]) {
        if self.is_finished() {
            return;
        }

        // 1. truco declined
        if self.truco.is_declined() {
            if let Some(team) = self.truco.team {
                self.finish(table, team);
                return;
            }
        }

        // 2. a whole team folded or left
        for team in teams {
            if team.is_disabled(&table.players) {
                let other = 1 - team.idx;
                if self.truco.waiting_answer {
                    if self.truco.team == Some(team.idx) {
                        self.truco.withdraw();
                    } else {
                        self.truco.decline();
                    }
                }
                if self.envido.waiting_answer() && self.envido.team != Some(team.idx) {
                    self.envido.decline();
                } else if self.envido.answer == Some(true) && !self.envido.finished {
                    self.envido.concede(other);
                }
                self.finish(table, other);
                return;
            }
        }

        // 3. rounds

        let forehand_team = table.players[self.forehand].team;
        if let Some(winner) = resolve_hand_winner(&self.round_results(), forehand_team) {
            self.finish(table, winner);
        }
    }

    fn finish(&mut self, table: &mut Table, winner: TeamIdx) {
        self.state = HandState::Finished;
        self.winner = Some(winner);
        self.current_player = None;
        for player in table.players.iter_mut() {
            player.is_turn = false;
            player.is_envido_turn = false;
        }
        info!(hand = self.idx, winner, truco = self.truco.state, "hand finished");
    }

    // --- Actions ---

    /// Plays the card at `slot` for `seat`.
    ///
    /// 1. Only in `WaitingPlay`, only by an active seat holding the turn.
    /// 2. Face-down cards are refused in the first round.
    /// 3. The card must sit at `slot` in the player's hand. It is removed.
    /// 4. The card (or the burnt sentinel) joins the current round.
    /// 5. The turn moves on, possibly closing the round, and the hand is
    ///    settled.
    pub(crate) fn play_card(
        &mut self,
        table: &mut Table,
        teams: &[Team; 2],
        seat: usize,
        slot: usize,
        card: Card,
        face_down: bool,
    ) -> Result<PlayedCard, IllegalAction> {
        if self.state != HandState::WaitingPlay {
            return Err(IllegalAction::NotPlaying);
        }
        let player = table.players.get_mut(seat).ok_or(IllegalAction::UnknownPlayer)?;
        if !player.is_active() {
            return Err(IllegalAction::DisabledPlayer);
        }
        if seat != self.turn {
            return Err(IllegalAction::WrongPlayer);
        }
        if face_down && self.rounds.len() == 1 {
            return Err(IllegalAction::FaceDownFirstRound);
        }

        let card = player.take_from_hand(slot, card).ok_or(IllegalAction::CardNotInHand)?;
        let team = player.team;
        let played = if face_down { PlayedCard::Burnt } else { PlayedCard::Open(card) };

        let round_idx = self.round_idx();
        self.rounds[round_idx].use_card(seat, team, played);
        debug!(hand = self.idx, round = round_idx, seat, card = %played, "card played");

        self.advance_turn(table);
        self.settle(table, teams);
        Ok(played)
    }

    /// Issues `command` for `seat`.
    ///
    /// The command must be in `legal_commands` for that seat; anything else
    /// is `NotOffered`. Accepted commands move the negotiation state and the
    /// hand is settled afterwards, so a fold or decline may end it here.
    pub(crate) fn say(
        &mut self,
        table: &mut Table,
        teams: &[Team; 2],
        seat: usize,
        command: Command,
    ) -> Result<Command, IllegalAction> {
        if self.is_finished() {
            return Err(IllegalAction::NotOffered);
        }
        let player = table.players.get(seat).ok_or(IllegalAction::UnknownPlayer)?;
        if !player.is_active() {
            return Err(IllegalAction::DisabledPlayer);
        }
        if !legal_commands(self, table, seat).contains(&command) {
            return Err(IllegalAction::NotOffered);
        }

        match command {
            Command::Truco(_) => self.say_truco(table, seat),
            Command::Envido(raise) => self.say_envido(table, seat, raise),
            Command::Quiero => self.say_quiero(table),
            Command::NoQuiero => self.say_no_quiero(table, teams, seat),
            Command::Points(points) => self.say_points(table, seat, points),
            Command::Mazo => self.say_mazo(table, seat),
        }
        debug!(hand = self.idx, seat, %command, state = ?self.state, "command accepted");

        self.settle(table, teams);
        Ok(command)
    }

    fn say_truco(&mut self, table: &Table, seat: usize) {
        let team = table.players[seat].team;
        self.truco.say(team, table.team_seats(1 - team));
        self.state = HandState::WaitingForTrucoAnswer;
    }

    fn say_envido(&mut self, table: &Table, seat: usize, raise: EnvidoRaise) {
        let team = table.players[seat].team;
        self.envido.say(raise, team, table.team_seats(1 - team));
        self.state = HandState::WaitingEnvidoAnswer;
    }

    fn say_quiero(&mut self, table: &Table) {
        match self.state {
            HandState::WaitingForTrucoAnswer => {
                self.truco.accept();
                self.state = HandState::WaitingPlay;
            }
            HandState::WaitingEnvidoAnswer => {
                self.envido.accept(table.active_seats());
                self.state = HandState::WaitingEnvidoPointsAnswer;
            }
            _ => {}
        }
    }

    fn say_no_quiero(&mut self, table: &mut Table, teams: &[Team; 2], seat: usize) {
        match self.state {
            HandState::WaitingForTrucoAnswer => {
                self.truco.decline();
                teams[table.players[seat].team].disable(&mut table.players);
            }
            HandState::WaitingEnvidoAnswer => {
                self.envido.decline();
                self.state = self.resume_state();
            }
            _ => {}
        }
    }

    fn say_points(&mut self, table: &Table, seat: usize, points: u8) {
        self.envido.declare(EnvidoDeclaration {
            seat,
            team: table.players[seat].team,
            points,
            forehand_distance: table.forehand_distance(seat),
        });
        if self.envido.finished {
            self.state = self.resume_state();
        }
    }

    fn say_mazo(&mut self, table: &mut Table, seat: usize) {
        table.players[seat].disabled = true;
        if self.state == HandState::WaitingPlay && seat == self.turn {
            self.advance_turn(table);
        }
    }
}

// --- Legality and hand resolution ---

/// Commands `seat` may issue right now. Pure: recomputed from the hand,
/// envido and truco state on every call.
///
/// Per state:
/// 1. `WaitingPlay`, for the seat holding the turn: MAZO, the next truco
///    raise its team owns, and the envido calls while the envido is open.
/// 2. `WaitingForTrucoAnswer`, for an answering seat: QUIERO, NO_QUIERO,
///    MAZO, the counter raise, and the envido calls while open.
/// 3. `WaitingEnvidoAnswer`, for an answering seat: QUIERO, NO_QUIERO, MAZO
///    and the envido raises still available.
/// 4. `WaitingEnvidoPointsAnswer`, for the current declarer: MAZO and each
///    count the player can show.
///
/// The envido is open only in the first round, before any envido call, and
/// for the team that does not own the truco, while the truco has not gone
/// past an unanswered TRUCO.
pub fn legal_commands(hand: &Hand, table: &Table, seat: usize) -> BTreeSet<Command> {
    let mut commands = BTreeSet::new();
    let Some(player) = table.players.get(seat) else {
        return commands;
    };
    if !player.is_active() {
        return commands;
    }

    let team = player.team;
    let truco = &hand.truco;
    let envido_open = hand.rounds.len() == 1
        && !hand.envido.started
        && truco.team != Some(team)
        && (truco.state < 2 || (truco.state == 2 && truco.answer.is_none()));
    let envido_raises = || hand.envido.possible_raises().into_iter().map(Command::Envido);

    match hand.state {
        HandState::WaitingPlay if seat == hand.turn => {
            commands.insert(Command::Mazo);
            commands.extend(truco.next_raise(team).map(Command::Truco));
            if envido_open {
                commands.extend(envido_raises());
            }
        }
        HandState::WaitingForTrucoAnswer if truco.can_answer(seat) => {
            commands.extend([Command::Quiero, Command::NoQuiero, Command::Mazo]);
            commands.extend(truco.next_raise(team).map(Command::Truco));
            if envido_open {
                commands.extend(envido_raises());
            }
        }
        HandState::WaitingEnvidoAnswer if hand.envido.can_answer(seat) => {
            commands.extend([Command::Quiero, Command::NoQuiero, Command::Mazo]);
            commands.extend(envido_raises());
        }
        HandState::WaitingEnvidoPointsAnswer if hand.envido.current_declarer() == Some(seat) => {
            commands.insert(Command::Mazo);
            commands.extend(player.envido.points.iter().copied().map(Command::Points));
        }
        _ => {}
    }
    commands
}

/// Decides the hand from the completed rounds. A tied round counts as a win
/// for both teams; two wins against fewer than two takes the hand, and after
/// three rounds an even count goes to the forehand's team.
pub fn resolve_hand_winner(results: &[Option<TeamIdx>], forehand_team: TeamIdx) -> Option<TeamIdx> {
    let ties = results.iter().filter(|r| r.is_none()).count();
    let wins = |team: TeamIdx| results.iter().filter(|r| **r == Some(team)).count() + ties;
    let (a, b) = (wins(0), wins(1));

    if a >= 2 && b < 2 {
        return Some(0);
    }
    if b >= 2 && a < 2 {
        return Some(1);
    }
    if results.len() >= MAX_ROUNDS {
        return Some(match a.cmp(&b) {
            Ordering::Greater => 0,
            Ordering::Less => 1,
            Ordering::Equal => forehand_team,
        });
    }
    None
}

// --- Unit tests ---
