use serde::{Deserialize, Serialize};

use crate::TeamIdx;
use crate::card::PlayedCard;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundPlay {
    pub seat: usize,
    pub team: TeamIdx,
    pub card: PlayedCard,
}

/// One trick. `winner` is the tentative winner while cards are still coming.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub plays: Vec<RoundPlay>,
    pub highest: u8,
    pub winner: Option<RoundPlay>,
    pub tie: bool,
}

impl Round {
    pub fn new() -> Self {
        Round::default()
    }

    pub fn use_card(&mut self, seat: usize, team: TeamIdx, card: PlayedCard) -> PlayedCard {
        let play = RoundPlay { seat, team, card };
        self.plays.push(play);

        if card.is_burnt() {
            return card;
        }

        let rank = card.rank();
        match self.winner {
            Some(winner) if rank == self.highest => {
                if winner.team != team {
                    self.tie = true;
                }
            }
            Some(_) if rank < self.highest => {}
            _ => {
                self.highest = rank;
                self.winner = Some(play);
                self.tie = false;
            }
        }
        card
    }

    pub fn has_played(&self, seat: usize) -> bool {
        self.plays.iter().any(|p| p.seat == seat)
    }

    /// Team that took the round, `None` while tied (or every card was burnt).
    pub fn winning_team(&self) -> Option<TeamIdx> {
        if self.tie { None } else { self.winner.map(|w| w.team) }
    }
}
