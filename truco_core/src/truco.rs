use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::TeamIdx;
use crate::command::TrucoRaise;

/// The truco ladder: 1 (no challenge), 2 TRUCO, 3 RE_TRUCO, 4 VALE_CUATRO.
/// `state` is what the hand is worth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Truco {
    pub state: u8,
    pub team: Option<TeamIdx>, // team holding the ladder (last to raise)
    pub answer: Option<bool>,
    pub waiting_answer: bool,
    pub answerers: Vec<usize>,
    pub cursor: usize,
}

impl Default for Truco {
    fn default() -> Self {
        Truco::new()
    }
}

impl Truco {
    pub fn new() -> Self {
        Truco { state: 1, team: None, answer: None, waiting_answer: false, answerers: Vec::new(), cursor: 0 }
    }

    pub fn reset(&mut self) {
        *self = Truco::new();
    }

    /// The rung `team` may call next, if it may call at all.
    pub fn next_raise(&self, team: TeamIdx) -> Option<TrucoRaise> {
        if self.team == Some(team) {
            return None;
        }
        TrucoRaise::above(self.state)
    }

    /// Climbs one rung for `team`; the opposing `answerers` must reply.
    /// Raising while an answer is pending accepts the previous call.
    pub fn say(&mut self, team: TeamIdx, answerers: Vec<usize>) -> Option<TrucoRaise> {
        let raise = self.next_raise(team)?;
        self.state = raise.level();
        self.team = Some(team);
        self.answer = None;
        self.waiting_answer = true;
        self.answerers = answerers;
        self.cursor = 0;
        debug!(?raise, team, "truco raised");
        Some(raise)
    }

    pub fn accept(&mut self) {
        self.answer = Some(true);
        self.waiting_answer = false;
    }

    /// Falls back to the last agreed level. Disabling the declining team is
    /// up to the hand, which owns the players.
    pub fn decline(&mut self) {
        self.answer = Some(false);
        self.waiting_answer = false;
        self.state = self.state.saturating_sub(1).max(1);
    }

    /// The calling team left before anyone answered. The ladder drops back
    /// to the last agreed level without counting as a decline.
    pub fn withdraw(&mut self) {
        if !self.waiting_answer {
            return;
        }
        self.waiting_answer = false;
        self.state = self.state.saturating_sub(1).max(1);
        debug!(state = self.state, "truco call withdrawn");
    }

    pub fn is_declined(&self) -> bool {
        self.answer == Some(false)
    }

    pub fn can_answer(&self, seat: usize) -> bool {
        self.waiting_answer && self.answerers.contains(&seat)
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
}
