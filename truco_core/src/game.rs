use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{info, warn};
use uuid::Uuid;

use crate::card::{Card, PlayedCard};
use crate::command::{Command, HandState};
use crate::deck::Deck;
use crate::error::{IllegalAction, TrucoError};
use crate::hand::{Hand, HandStep, legal_commands};
use crate::play::PlayInstance;
use crate::player::Player;
use crate::table::Table;
use crate::team::Team;
use crate::{MatchId, PlayerId, TeamIdx};

/// Match configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchOptions {
    /// Points of each phase (malas, then buenas).
    pub match_point: u32,
    pub max_players: usize,
    /// Deterministic dealing: hand `n` is shuffled with `seed + n`.
    pub seed: Option<u64>,
    /// Hints for the transport's timers; the core keeps no clock.
    pub turn_time_ms: u64,
    pub abandon_time_ms: u64,
}

impl Default for MatchOptions {
    fn default() -> Self {
        MatchOptions {
            match_point: 9,
            max_players: 6,
            seed: None,
            turn_time_ms: 30_000,
            abandon_time_ms: 120_000,
        }
    }
}

/// One advancement of the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Nothing to decide yet; ask again.
    Skip,
    /// `player` has to make a decision of kind `state`.
    Awaiting { state: HandState, player: PlayerId },
    HandFinished { hand_idx: usize, winner: Option<TeamIdx> },
    MatchFinished { winner: TeamIdx },
}

/// A whole game: hands are dealt until one team wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub options: MatchOptions,
    pub table: Table,
    pub deck: Deck,
    pub teams: [Team; 2],
    pub hands: Vec<Hand>,
    pub winner: Option<TeamIdx>,
}

impl Match {
    // --- Construction ---

    /// Creates a match with the given players seated.
    ///
    /// Checks, in order:
    /// 1. No more players than `options.max_players` (`TooManyPlayers`).
    /// 2. A table of 2, 4 or 6 (`PlayerCount`).
    /// 3. Every `team` is 0 or 1 (`InvalidTeam`).
    /// 4. Both teams the same size (`TeamSizeMismatch`, from `Table::new`).
    ///
    /// Seats alternate between the teams and seat 0 holds the first
    /// forehand. No hand is dealt yet; the first `next_step` does it.
    pub fn new(players: Vec<Player>, options: MatchOptions) -> Result<Self, TrucoError> {
        let count = players.len();
        if count > options.max_players {
            return Err(TrucoError::TooManyPlayers { got: count, max: options.max_players });
        }
        if !matches!(count, 2 | 4 | 6) {
            return Err(TrucoError::PlayerCount(count));
        }
        if let Some(player) = players.iter().find(|p| p.team > 1) {
            return Err(TrucoError::InvalidTeam(player.team));
        }

        let table = Table::new(players)?;
        let team_ids = |team: TeamIdx| table.players.iter().filter(|p| p.team == team).map(|p| p.id).collect();
        let teams = [Team::new(0, team_ids(0)), Team::new(1, team_ids(1))];

        Ok(Match {
            id: Uuid::new_v4(),
            options,
            table,
            deck: Deck::new(),
            teams,
            hands: Vec::new(),
            winner: None,
        })
    }

    pub fn current_hand(&self) -> Option<&Hand> {
        self.hands.last()
    }

    pub fn previous_hand(&self) -> Option<&Hand> {
        self.hands.len().checked_sub(2).and_then(|i| self.hands.get(i))
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.table.player(id)
    }

    // --- Dealing and the step driver ---

    /// Starts a new hand.
    ///
    /// 1. Reshuffles all 40 cards. With a seed, hand `n` uses `seed + n`.
    /// 2. Rotates the forehand one seat, except for the first hand.
    /// 3. Resets every player's per-hand state.
    /// 4. Deals three cards to each seat, starting at the forehand.
    pub fn deal_hand(&mut self) -> Result<&Hand, TrucoError> {
        let idx = self.hands.len();
        match self.options.seed {
            Some(seed) => self.deck.shuffle_with(&mut StdRng::seed_from_u64(seed.wrapping_add(idx as u64)))?,
            None => self.deck.shuffle()?,
        }
        if idx > 0 {
            self.table.next_forehand();
        }

        for player in self.table.players.iter_mut() {
            player.reset_for_hand();
        }
        let order: Vec<usize> = self.table.seats_from(self.table.forehand).collect();
        for seat in order {
            let cards: [Card; 3] = self.deck.take_three()?;
            self.table.players[seat].set_hand(cards.to_vec());
        }

        info!(match_id = %self.id, hand = idx, forehand = self.table.forehand, "hand dealt");
        self.hands.push(Hand::new(idx, &self.table));
        Ok(&self.hands[idx])
    }

    /// Advances the match by one step.
    ///
    /// 1. A decided match keeps returning `MatchFinished`.
    /// 2. A team whose players all abandoned forfeits to the other team.
    /// 3. A new hand is dealt when there is none or the last one is settled.
    /// 4. The hand surfaces its next decision. When it reports `Finished`,
    ///    the hand is scored here and `HandFinished` is returned; the match
    ///    winner, if any, shows up on the following step.
    pub fn next_step(&mut self) -> Result<Step, TrucoError> {
        if let Some(winner) = self.winner {
            return Ok(Step::MatchFinished { winner });
        }

        if let Some(team) = self.teams.iter().find(|t| t.is_abandoned(&self.table.players)) {
            let winner = 1 - team.idx;
            warn!(match_id = %self.id, abandoned = team.idx, "team abandoned the match");
            self.forfeit(winner);
            return Ok(Step::MatchFinished { winner });
        }

        let needs_deal = self.hands.last().is_none_or(|h| h.settled);
        if needs_deal {
            self.deal_hand()?;
        }

        let Some(hand) = self.hands.last_mut() else {
            return Ok(Step::Skip);
        };
        match hand.next_step(&mut self.table, &self.teams) {
            HandStep::Skip => Ok(Step::Skip),
            HandStep::Awaiting(seat) => Ok(Step::Awaiting { state: hand.state, player: self.table.players[seat].id }),
            HandStep::Finished => {
                let hand_idx = hand.idx;
                let winner = hand.winner;
                self.settle_hand();
                Ok(Step::HandFinished { hand_idx, winner })
            }
        }
    }

    // --- Scoring ---

    /// Awards the finished hand, at most once.
    ///
    /// 1. The envido winner, if any, gets `points_to_give`.
    /// 2. The hand winner gets the truco level reached (1 to 4).
    ///
    /// Points go on in that order, so the envido can win the match before
    /// the truco is counted. The first team to reach its target wins.
    fn settle_hand(&mut self) {
        let match_point = self.options.match_point;
        let Some(hand) = self.hands.last_mut() else {
            return;
        };
        if hand.settled {
            return;
        }
        hand.settled = true;

        let mut awards: Vec<(TeamIdx, u32)> = Vec::with_capacity(2);
        if let Some(team) = hand.envido.winning_team {
            awards.push((team, hand.envido.points_to_give(&self.teams, match_point)));
        }
        if let Some(team) = hand.winner {
            awards.push((team, u32::from(hand.truco.state)));
        }

        for (team, points) in awards {
            hand.points[team] += points;
            let score = self.teams[team].add_points(match_point, points);
            if score.won && self.winner.is_none() {
                self.winner = Some(team);
            }
        }

        info!(
            match_id = %self.id,
            hand = hand.idx,
            points = ?hand.points,
            team0 = ?self.teams[0].points,
            team1 = ?self.teams[1].points,
            "hand settled"
        );
        if let Some(winner) = self.winner {
            info!(match_id = %self.id, winner, "match won");
        }
    }

    // --- Abandonment and player actions ---

    /// Ends the match in favor of `winner`, skipping the normal hand scoring.
    pub fn forfeit(&mut self, winner: TeamIdx) {
        warn!(match_id = %self.id, winner, "match forfeited");
        self.winner = Some(winner);
        self.teams[winner].points.won = true;
        if let Some(hand) = self.hands.last_mut() {
            if !hand.is_finished() {
                hand.state = HandState::Finished;
                hand.winner = Some(winner);
                hand.current_player = None;
            }
            hand.settled = true;
        }
    }

    /// Marks a player as gone for good. A team with nobody left forfeits on
    /// the next step.
    pub fn abandon(&mut self, id: &PlayerId) -> bool {
        let Some(player) = self.table.player_mut(id) else {
            return false;
        };
        player.abandoned = true;
        player.disabled = true;
        info!(match_id = %self.id, player = %id, "player abandoned");
        true
    }

    pub fn set_turn_expiry(&mut self, id: &PlayerId, expires_at: Option<u64>) {
        if let Some(player) = self.table.player_mut(id) {
            player.turn_expires_at = expires_at;
        }
    }

    /// Commands `id` may issue at this point of the current hand.
    pub fn legal_commands(&self, id: &PlayerId) -> BTreeSet<Command> {
        match (self.current_hand(), self.table.seat_of(id)) {
            (Some(hand), Some(seat)) if self.winner.is_none() => legal_commands(hand, &self.table, seat),
            _ => BTreeSet::new(),
        }
    }

    pub fn say(&mut self, id: &PlayerId, command: Command) -> Result<Command, IllegalAction> {
        if self.winner.is_some() {
            return Err(IllegalAction::NoHand);
        }
        let seat = self.table.seat_of(id).ok_or(IllegalAction::UnknownPlayer)?;
        let hand = self.hands.last_mut().ok_or(IllegalAction::NoHand)?;
        hand.say(&mut self.table, &self.teams, seat, command)
    }

    pub fn use_card(&mut self, id: &PlayerId, slot: usize, card: Card, face_down: bool) -> Result<PlayedCard, IllegalAction> {
        if self.winner.is_some() {
            return Err(IllegalAction::NoHand);
        }
        let seat = self.table.seat_of(id).ok_or(IllegalAction::UnknownPlayer)?;
        let hand = self.hands.last_mut().ok_or(IllegalAction::NoHand)?;
        hand.play_card(&mut self.table, &self.teams, seat, slot, card, face_down)
    }

    /// Facade over the decision surfaced by the last step.
    pub fn play(&mut self) -> Option<PlayInstance<'_>> {
        self.current_hand()?;
        Some(PlayInstance::new(self))
    }
}

// --- Unit tests ---

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{EnvidoRaise, TrucoRaise};

    fn players(n: usize) -> Vec<Player> {
        (0..n).map(|i| Player::new(Uuid::new_v4(), format!("p{}", i), i % 2)).collect()
    }

    fn options() -> MatchOptions {
        MatchOptions { seed: Some(42), ..MatchOptions::default() }
    }

    fn set_hands(game: &mut Match, hands: [&[&str]; 4]) {
        for (seat, codes) in hands.iter().enumerate() {
            game.table.players[seat].set_hand(codes.iter().map(|c| c.parse().unwrap()).collect());
        }
    }

    /// Pulls steps until a decision or the end of the hand.
    fn pull(game: &mut Match) -> Step {
        loop {
            match game.next_step().unwrap() {
                Step::Skip => continue,
                step => return step,
            }
        }
    }

    fn id(game: &Match, seat: usize) -> PlayerId {
        game.table.players[seat].id
    }

    #[test]
    fn test_player_counts() {
        assert_eq!(Match::new(players(3), options()).unwrap_err(), TrucoError::PlayerCount(3));
        assert_eq!(
            Match::new(players(6), MatchOptions { max_players: 4, ..options() }).unwrap_err(),
            TrucoError::TooManyPlayers { got: 6, max: 4 }
        );
        let mut uneven = players(4);
        uneven[1].team = 0;
        assert_eq!(Match::new(uneven, options()).unwrap_err(), TrucoError::TeamSizeMismatch(3, 1));
        let mut stray = players(4);
        stray[3].team = 2;
        assert_eq!(Match::new(stray, options()).unwrap_err(), TrucoError::InvalidTeam(2));
        assert!(Match::new(players(6), options()).is_ok());
    }

    #[test]
    fn test_deal_gives_three_cards_each() {
        let mut game = Match::new(players(6), options()).unwrap();
        game.deal_hand().unwrap();
        assert!(game.table.players.iter().all(|p| p.hand.len() == 3));
        assert_eq!(game.deck.used.len(), 18);
        assert_eq!(game.deck.len(), 40);

        game.deal_hand().unwrap();
        assert_eq!(game.table.forehand, 1);
        assert_eq!(game.deck.used.len(), 18);
        assert_eq!(game.previous_hand().map(|h| h.idx), Some(0));
    }

    #[test]
    fn test_first_step_deals_and_waits_for_forehand() {
        let mut game = Match::new(players(4), options()).unwrap();
        let step = pull(&mut game);
        assert_eq!(step, Step::Awaiting { state: HandState::WaitingPlay, player: id(&game, 0) });
        assert!(game.table.players[0].is_turn);
    }

    #[test]
    fn test_envido_award_lands_in_malas() {
        let mut game = Match::new(players(4), options()).unwrap();
        pull(&mut game);
        // team 0 holds 7+6 of swords; team 1 only face cards and low singles
        set_hands(&mut game, [&["7e", "6e", "4c"], &["12o", "11b", "10c"], &["5b", "4o", "2c"], &["12c", "11o", "10b"]]);

        let (a0, b1) = (id(&game, 0), id(&game, 1));
        game.say(&a0, Command::Envido(EnvidoRaise::Envido)).unwrap();
        assert_eq!(pull(&mut game), Step::Awaiting { state: HandState::WaitingEnvidoAnswer, player: b1 });
        game.say(&b1, Command::Quiero).unwrap();

        for seat in 0..4 {
            let step = pull(&mut game);
            assert_eq!(step, Step::Awaiting { state: HandState::WaitingEnvidoPointsAnswer, player: id(&game, seat) });
            let best = game.table.players[seat].envido.best();
            game.say(&id(&game, seat), Command::Points(best)).unwrap();
        }
        let hand = game.current_hand().unwrap();
        assert_eq!(hand.envido.winner.map(|w| w.points), Some(33));
        assert_eq!(hand.envido.winning_team, Some(0));

        // team 0 folds the cards; the envido it won is still paid
        game.say(&a0, Command::Mazo).unwrap();
        pull(&mut game);
        let card = game.table.players[1].hand[0];
        game.use_card(&b1, 0, card, false).unwrap();
        pull(&mut game);
        game.say(&id(&game, 2), Command::Mazo).unwrap();

        assert_eq!(pull(&mut game), Step::HandFinished { hand_idx: 0, winner: Some(1) });
        assert_eq!(game.teams[0].points.malas, 2);
        assert_eq!(game.teams[1].points.malas, 1);
        assert_eq!(game.previous_hand().map(|h| h.idx), None);
    }

    #[test]
    fn test_declined_truco_awards_one_point() {
        let mut game = Match::new(players(4), options()).unwrap();
        pull(&mut game);
        let (a0, b1, b3) = (id(&game, 0), id(&game, 1), id(&game, 3));

        game.say(&a0, Command::Truco(TrucoRaise::Truco)).unwrap();
        assert_eq!(pull(&mut game), Step::Awaiting { state: HandState::WaitingForTrucoAnswer, player: b1 });
        game.say(&b3, Command::NoQuiero).unwrap();

        let hand = game.current_hand().unwrap();
        assert_eq!(hand.truco.state, 1);
        assert!(game.table.players.iter().filter(|p| p.team == 1).all(|p| p.disabled));

        assert_eq!(pull(&mut game), Step::HandFinished { hand_idx: 0, winner: Some(0) });
        assert_eq!(game.teams[0].points.malas, 1);
        assert_eq!(game.teams[1].points.malas, 0);

        // the next step deals a fresh hand with everybody back in
        assert!(matches!(pull(&mut game), Step::Awaiting { state: HandState::WaitingPlay, .. }));
        assert_eq!(game.hands.len(), 2);
        assert!(game.table.players.iter().all(|p| !p.disabled));
    }

    #[test]
    fn test_unanswered_truco_pays_one_when_caller_folds() {
        let mut game = Match::new(players(2), options()).unwrap();
        pull(&mut game);
        let (a0, b1) = (id(&game, 0), id(&game, 1));

        game.say(&a0, Command::Truco(TrucoRaise::Truco)).unwrap();
        assert_eq!(pull(&mut game), Step::Awaiting { state: HandState::WaitingForTrucoAnswer, player: b1 });
        game.say(&b1, Command::Envido(EnvidoRaise::Envido)).unwrap();
        assert_eq!(pull(&mut game), Step::Awaiting { state: HandState::WaitingEnvidoAnswer, player: a0 });
        game.say(&a0, Command::Mazo).unwrap();

        assert_eq!(pull(&mut game), Step::HandFinished { hand_idx: 0, winner: Some(1) });
        // one for the declined envido, one for the truco nobody accepted
        assert_eq!(game.teams[1].points.malas, 2);
        assert_eq!(game.teams[0].points.malas, 0);
        assert_eq!(game.previous_hand().map(|h| h.points), None);
        assert_eq!(game.current_hand().map(|h| h.points), Some([0, 2]));
    }

    #[test]
    fn test_match_ends_at_match_point_in_buenas() {
        let mut game = Match::new(players(2), MatchOptions { match_point: 3, ..options() }).unwrap();
        let mut hands = 0;
        let winner = loop {
            match pull(&mut game) {
                Step::Awaiting { state: HandState::WaitingPlay, player } => {
                    // team 1 always folds, team 0 calls truco
                    let team = game.player(&player).unwrap().team;
                    let command = if team == 0 { Command::Truco(TrucoRaise::Truco) } else { Command::Mazo };
                    game.say(&player, command).unwrap();
                }
                Step::Awaiting { player, .. } => {
                    game.say(&player, Command::NoQuiero).unwrap();
                }
                Step::HandFinished { .. } => hands += 1,
                Step::MatchFinished { winner } => break winner,
                Step::Skip => unreachable!(),
            }
        };
        assert_eq!(winner, 0);
        assert_eq!(hands, 6);
        assert_eq!((game.teams[0].points.malas, game.teams[0].points.buenas), (3, 3));
        assert!(game.teams[0].points.won);
        assert_eq!(game.say(&id(&game, 0), Command::Mazo), Err(IllegalAction::NoHand));
    }

    #[test]
    fn test_abandoned_team_forfeits() {
        let mut game = Match::new(players(4), options()).unwrap();
        pull(&mut game);
        let (b1, b3) = (id(&game, 1), id(&game, 3));
        assert!(game.abandon(&b1));
        assert!(matches!(pull(&mut game), Step::Awaiting { .. }));
        assert!(game.abandon(&b3));

        assert_eq!(game.next_step().unwrap(), Step::MatchFinished { winner: 0 });
        assert!(game.teams[0].points.won);
        assert!(game.current_hand().unwrap().is_finished());
        assert!(!game.abandon(&Uuid::new_v4()));
    }

    #[test]
    fn test_unknown_player_is_rejected() {
        let mut game = Match::new(players(2), options()).unwrap();
        pull(&mut game);
        assert_eq!(game.say(&Uuid::new_v4(), Command::Mazo), Err(IllegalAction::UnknownPlayer));
        assert!(game.legal_commands(&Uuid::new_v4()).is_empty());
    }
}
