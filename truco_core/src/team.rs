use serde::{Deserialize, Serialize};

use crate::player::Player;
use crate::{PlayerId, TeamIdx};

/// Two-phase score. Points fill `malas` up to the match point, then overflow
/// into `buenas`; reaching the match point in `buenas` wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamPoints {
    pub buenas: u32,
    pub malas: u32,
    pub won: bool,
}

impl TeamPoints {
    pub fn total(&self) -> u32 {
        self.buenas + self.malas
    }

    pub fn add(&mut self, match_point: u32, points: u32) {
        let malas = self.malas + points;
        if malas > match_point {
            self.malas = match_point;
            self.buenas += malas - match_point;
        } else {
            self.malas = malas;
        }
        if self.buenas >= match_point {
            self.won = true;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub idx: TeamIdx,
    pub name: String,
    pub players: Vec<PlayerId>, // in seating order
    pub points: TeamPoints,
}

impl Team {
    pub fn new(idx: TeamIdx, players: Vec<PlayerId>) -> Self {
        Team { idx, name: format!("team {}", idx), players, points: TeamPoints::default() }
    }

    pub fn add_points(&mut self, match_point: u32, points: u32) -> TeamPoints {
        self.points.add(match_point, points);
        self.points
    }

    /// Points this team still needs to win the match.
    pub fn points_to_win(&self, match_point: u32) -> u32 {
        (match_point * 2).saturating_sub(self.points.total())
    }

    fn members<'a>(&'a self, players: &'a [Player]) -> impl Iterator<Item = &'a Player> + 'a {
        players.iter().filter(move |p| p.team == self.idx)
    }

    /// True when nobody on the team can act in the current hand.
    pub fn is_disabled(&self, players: &[Player]) -> bool {
        self.members(players).all(|p| p.disabled || p.abandoned)
    }

    pub fn is_abandoned(&self, players: &[Player]) -> bool {
        self.members(players).all(|p| p.abandoned)
    }

    /// Takes every member out of the current hand.
    pub fn disable(&self, players: &mut [Player]) {
        players.iter_mut().filter(|p| p.team == self.idx).for_each(|p| p.disabled = true);
    }
}

/// The team with the higher buenas+malas total; a tie goes to team 0.
pub fn leading_team(teams: &[Team; 2]) -> TeamIdx {
    if teams[0].points.total() >= teams[1].points.total() { 0 } else { 1 }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicTeam {
    pub idx: TeamIdx,
    pub name: String,
    pub players: Vec<PlayerId>,
    pub points: TeamPoints,
}

impl From<&Team> for PublicTeam {
    fn from(team: &Team) -> Self {
        PublicTeam {
            idx: team.idx,
            name: team.name.clone(),
            players: team.players.clone(),
            points: team.points,
        }
    }
}
