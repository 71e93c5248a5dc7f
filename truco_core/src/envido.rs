use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::TeamIdx;
use crate::command::EnvidoRaise;
use crate::team::{Team, leading_team};

/// Fixed effect of one envido call on the stake pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvidoStake {
    pub accept: u32,
    pub decline: u32,
    /// Calls that may follow this one.
    pub next: &'static [EnvidoRaise],
    /// The accepted stake becomes "whatever the leader still needs".
    pub replaces_stake: bool,
}

const AFTER_FIRST_ENVIDO: &[EnvidoRaise] =
    &[EnvidoRaise::Envido, EnvidoRaise::RealEnvido, EnvidoRaise::FaltaEnvido];
const AFTER_ENVIDO: &[EnvidoRaise] = &[EnvidoRaise::RealEnvido, EnvidoRaise::FaltaEnvido];
const AFTER_REAL_ENVIDO: &[EnvidoRaise] = &[EnvidoRaise::FaltaEnvido];

impl EnvidoRaise {
    /// Stake table. `current` is the accept pool before this call.
    pub fn stake(self, current: u32) -> EnvidoStake {
        match self {
            EnvidoRaise::Envido => EnvidoStake {
                accept: 2,
                decline: 1,
                next: if current < 2 { AFTER_FIRST_ENVIDO } else { AFTER_ENVIDO },
                replaces_stake: false,
            },
            EnvidoRaise::RealEnvido => EnvidoStake {
                accept: 3,
                decline: 1,
                next: AFTER_REAL_ENVIDO,
                replaces_stake: false,
            },
            EnvidoRaise::FaltaEnvido => EnvidoStake {
                accept: 0,
                decline: 1,
                next: &[],
                replaces_stake: true,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvidoDeclaration {
    pub seat: usize,
    pub team: TeamIdx,
    pub points: u8,
    pub forehand_distance: usize,
}

impl EnvidoDeclaration {
    /// Higher count wins; equal counts go to the seat closer to the forehand.
    fn beats(&self, other: &EnvidoDeclaration) -> bool {
        self.points > other.points
            || (self.points == other.points && self.forehand_distance < other.forehand_distance)
    }
}

/// The envido negotiation of one hand.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Envido {
    pub started: bool,
    pub finished: bool,
    pub calls: Vec<EnvidoRaise>,
    pub stake: u32,   // accept pool
    pub declined: u32, // decline pool
    pub falta: bool,
    pub team: Option<TeamIdx>, // team that made the last call
    pub answer: Option<bool>,
    pub next_raises: Vec<EnvidoRaise>,
    pub answerers: Vec<usize>,
    pub cursor: usize,
    pub declarers: Vec<usize>,
    pub declarations: Vec<EnvidoDeclaration>,
    pub winner: Option<EnvidoDeclaration>,
    pub winning_team: Option<TeamIdx>,
}

impl Envido {
    pub fn new() -> Self {
        Envido::default()
    }

    pub fn waiting_answer(&self) -> bool {
        self.started && self.answer.is_none()
    }

    /// Calls available to the team that must answer (or open) the envido.
    pub fn possible_raises(&self) -> Vec<EnvidoRaise> {
        if !self.started {
            return AFTER_FIRST_ENVIDO.to_vec();
        }
        if self.answer.is_some() {
            return Vec::new();
        }
        self.next_raises.clone()
    }

    /// Records a call by `team` and arms the opposing `answerers`.
    pub fn say(&mut self, raise: EnvidoRaise, team: TeamIdx, answerers: Vec<usize>) {
        let stake = raise.stake(self.stake);
        self.started = true;
        self.calls.push(raise);
        self.stake += stake.accept;
        self.declined += stake.decline;
        self.falta |= stake.replaces_stake;
        self.next_raises = stake.next.to_vec();
        self.team = Some(team);
        self.answer = None;
        self.answerers = answerers;
        self.cursor = 0;
        debug!(?raise, team, stake = self.stake, declined = self.declined, "envido raised");
    }

    /// Accepts the current call; `declarers` will state their counts in order.
    pub fn accept(&mut self, declarers: Vec<usize>) {
        self.answer = Some(true);
        self.declarers = declarers;
        self.cursor = 0;
    }

    pub fn decline(&mut self) {
        self.answer = Some(false);
        self.finished = true;
        self.winning_team = self.team;
    }

    /// Closes an accepted envido before every count was declared: `team`
    /// is the only side left to claim it.
    pub fn concede(&mut self, team: TeamIdx) {
        self.finished = true;
        self.winning_team = Some(team);
        debug!(team, stake = self.stake, "envido conceded");
    }

    /// Offers the answer to the next eligible seat, cycling through them.
    pub fn next_answerer(&mut self, is_active: impl Fn(usize) -> bool) -> Option<usize> {
        let active: Vec<usize> = self.answerers.iter().copied().filter(|&s| is_active(s)).collect();
        if active.is_empty() {
            return None;
        }
        let seat = active[self.cursor % active.len()];
        self.cursor += 1;
        Some(seat)
    }

    pub fn can_answer(&self, seat: usize) -> bool {
        self.waiting_answer() && self.answerers.contains(&seat)
    }

    /// Seat that must declare its count next.
    pub fn current_declarer(&self) -> Option<usize> {
        if self.answer != Some(true) || self.finished {
            return None;
        }
        self.declarers.get(self.cursor).copied()
    }

    pub fn declare(&mut self, declaration: EnvidoDeclaration) {
        if self.winner.is_none_or(|best| declaration.beats(&best)) {
            self.winner = Some(declaration);
        }
        self.declarations.push(declaration);
        self.advance_declarer();
    }

    /// Moves past the current declarer, finishing once everyone has spoken.
    pub fn advance_declarer(&mut self) {
        self.cursor += 1;
        if self.cursor >= self.declarers.len() {
            self.finished = true;
            self.winning_team = self.winner.map(|w| w.team);
        }
    }

    /// Points the envido awards to `winning_team`.
    pub fn points_to_give(&self, teams: &[Team; 2], match_point: u32) -> u32 {
        if self.winning_team.is_none() {
            return 0;
        }
        match self.answer {
            Some(false) => self.declined,
            Some(true) if self.falta => teams[leading_team(teams)].points_to_win(match_point),
            Some(true) => self.stake,
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(seat: usize, team: TeamIdx, points: u8, distance: usize) -> EnvidoDeclaration {
        EnvidoDeclaration { seat, team, points, forehand_distance: distance }
    }

    fn teams() -> [Team; 2] {
        [Team::new(0, vec![]), Team::new(1, vec![])]
    }

    #[test]
    fn test_first_envido_allows_envido_again() {
        let mut envido = Envido::new();
        assert_eq!(envido.possible_raises().len(), 3);
        envido.say(EnvidoRaise::Envido, 0, vec![1, 3]);
        assert_eq!(envido.possible_raises(), AFTER_FIRST_ENVIDO.to_vec());
        envido.say(EnvidoRaise::Envido, 1, vec![0, 2]);
        assert_eq!(envido.possible_raises(), AFTER_ENVIDO.to_vec());
        assert_eq!((envido.stake, envido.declined), (4, 2));
        envido.say(EnvidoRaise::RealEnvido, 0, vec![1, 3]);
        assert_eq!(envido.possible_raises(), vec![EnvidoRaise::FaltaEnvido]);
        envido.say(EnvidoRaise::FaltaEnvido, 1, vec![0, 2]);
        assert!(envido.possible_raises().is_empty());
    }

    #[test]
    fn test_decline_awards_decline_pool_to_caller() {
        let mut envido = Envido::new();
        envido.say(EnvidoRaise::Envido, 0, vec![1]);
        envido.say(EnvidoRaise::RealEnvido, 1, vec![0]);
        envido.decline();
        assert_eq!(envido.winning_team, Some(1));
        assert_eq!(envido.points_to_give(&teams(), 9), 2);
    }

    #[test]
    fn test_declined_falta_pays_decline_pool() {
        let mut envido = Envido::new();
        envido.say(EnvidoRaise::FaltaEnvido, 0, vec![1]);
        envido.decline();
        assert_eq!(envido.points_to_give(&teams(), 9), 1);
    }

    #[test]
    fn test_accepted_falta_pays_points_leader_needs() {
        let mut teams = teams();
        teams[0].add_points(9, 5);
        teams[1].add_points(9, 12);

        let mut envido = Envido::new();
        envido.say(EnvidoRaise::Envido, 0, vec![1]);
        envido.say(EnvidoRaise::RealEnvido, 1, vec![0]);
        envido.say(EnvidoRaise::FaltaEnvido, 0, vec![1]);
        envido.accept(vec![0, 1]);
        envido.declare(decl(0, 0, 30, 0));
        envido.declare(decl(1, 1, 21, 1));

        assert!(envido.finished);
        assert_eq!(envido.winning_team, Some(0));
        // team 1 leads with 12 of 18
        assert_eq!(envido.points_to_give(&teams, 9), 6);
    }

    #[test]
    fn test_equal_counts_go_to_forehand_side() {
        let mut envido = Envido::new();
        envido.say(EnvidoRaise::Envido, 1, vec![0, 2]);
        envido.accept(vec![3, 0, 1, 2]);
        envido.declare(decl(3, 1, 27, 0));
        envido.declare(decl(0, 0, 31, 1));
        envido.declare(decl(1, 1, 31, 2));
        assert_eq!(envido.current_declarer(), Some(2));
        envido.declare(decl(2, 0, 20, 3));

        assert_eq!(envido.winner.map(|w| w.seat), Some(0));
        assert_eq!(envido.points_to_give(&teams(), 9), 2);
    }

    #[test]
    fn test_tie_is_settled_by_distance_not_order() {
        let mut envido = Envido::new();
        envido.say(EnvidoRaise::Envido, 0, vec![1]);
        envido.accept(vec![1, 0]);
        envido.declare(decl(1, 1, 25, 1));
        envido.declare(decl(0, 0, 25, 0));
        assert_eq!(envido.winning_team, Some(0));
    }

    #[test]
    fn test_conceded_envido_pays_the_stake() {
        let mut envido = Envido::new();
        envido.say(EnvidoRaise::Envido, 0, vec![1]);
        envido.say(EnvidoRaise::RealEnvido, 1, vec![0]);
        envido.accept(vec![0, 1]);
        envido.declare(decl(0, 0, 33, 0));
        envido.concede(0);
        assert!(envido.finished);
        assert_eq!(envido.winning_team, Some(0));
        assert_eq!(envido.points_to_give(&teams(), 9), 5);
    }

    #[test]
    fn test_no_winner_gives_nothing() {
        let mut envido = Envido::new();
        assert_eq!(envido.points_to_give(&teams(), 9), 0);
        envido.say(EnvidoRaise::Envido, 0, vec![1]);
        assert_eq!(envido.points_to_give(&teams(), 9), 0);
    }

    #[test]
    fn test_answerers_cycle() {
        let mut envido = Envido::new();
        envido.say(EnvidoRaise::Envido, 0, vec![1, 3]);
        assert_eq!(envido.next_answerer(|_| true), Some(1));
        assert_eq!(envido.next_answerer(|_| true), Some(3));
        assert_eq!(envido.next_answerer(|_| true), Some(1));
        assert_eq!(envido.next_answerer(|s| s != 1), Some(3));
        assert_eq!(envido.next_answerer(|_| false), None);
    }
}
