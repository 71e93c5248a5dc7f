use serde::{Deserialize, Serialize};

use crate::PlayerId;
use crate::error::TrucoError;
use crate::player::Player;

/// Seating order and forehand rotation. Seats alternate teams, so the
/// player to the right of any seat is always an opponent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub players: Vec<Player>,
    pub forehand: usize, // seat of the "mano" for the current hand
}

impl Table {
    /// Seats the players alternating teams: team 0, team 1, team 0, ...
    pub fn new(players: Vec<Player>) -> Result<Self, TrucoError> {
        let (team0, team1): (Vec<Player>, Vec<Player>) = players.into_iter().partition(|p| p.team == 0);
        if team0.len() != team1.len() {
            return Err(TrucoError::TeamSizeMismatch(team0.len(), team1.len()));
        }

        let mut seats = Vec::with_capacity(team0.len() * 2);
        for (a, b) in team0.into_iter().zip(team1) {
            seats.push(a);
            seats.push(b);
        }
        Ok(Table { players: seats, forehand: 0 })
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Passes the forehand to the next seat.
    pub fn next_forehand(&mut self) -> usize {
        self.forehand = (self.forehand + 1) % self.players.len();
        self.forehand
    }

    pub fn seat_of(&self, id: &PlayerId) -> Option<usize> {
        self.players.iter().position(|p| &p.id == id)
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    pub fn player_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| &p.id == id)
    }

    /// How many seats after the forehand `seat` sits (the forehand is 0).
    pub fn forehand_distance(&self, seat: usize) -> usize {
        let n = self.players.len();
        (seat + n - self.forehand) % n
    }

    /// Every seat, starting at `from` and going around once.
    pub fn seats_from(&self, from: usize) -> impl Iterator<Item = usize> + '_ {
        let n = self.players.len();
        (0..n).map(move |i| (from + i) % n)
    }

    /// Active seats of one team, in order from the forehand.
    pub fn team_seats(&self, team: usize) -> Vec<usize> {
        self.seats_from(self.forehand)
            .filter(|&s| self.players[s].team == team && self.players[s].is_active())
            .collect()
    }

    /// Active seats of both teams, in order from the forehand.
    pub fn active_seats(&self) -> Vec<usize> {
        self.seats_from(self.forehand).filter(|&s| self.players[s].is_active()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn table(teams: &[usize]) -> Table {
        let players = teams
            .iter()
            .enumerate()
            .map(|(i, &t)| Player::new(Uuid::new_v4(), format!("p{}", i), t))
            .collect();
        Table::new(players).unwrap()
    }

    #[test]
    fn test_seats_alternate_teams() {
        let table = table(&[0, 0, 1, 1, 0, 1]);
        let teams: Vec<usize> = table.players.iter().map(|p| p.team).collect();
        assert_eq!(teams, vec![0, 1, 0, 1, 0, 1]);
    }

    #[test]
    fn test_uneven_teams_rejected() {
        let players = vec![
            Player::new(Uuid::new_v4(), "a", 0),
            Player::new(Uuid::new_v4(), "b", 0),
            Player::new(Uuid::new_v4(), "c", 1),
        ];
        assert_eq!(Table::new(players).unwrap_err(), TrucoError::TeamSizeMismatch(2, 1));
    }

    #[test]
    fn test_forehand_rotation_and_distance() {
        let mut table = table(&[0, 1, 0, 1]);
        assert_eq!(table.forehand_distance(0), 0);
        assert_eq!(table.next_forehand(), 1);
        assert_eq!(table.forehand_distance(0), 3);
        assert_eq!(table.forehand_distance(2), 1);
        table.next_forehand();
        table.next_forehand();
        assert_eq!(table.next_forehand(), 0);
    }

    #[test]
    fn test_team_seats_skip_disabled() {
        let mut table = table(&[0, 1, 0, 1]);
        table.next_forehand();
        table.players[3].disabled = true;
        assert_eq!(table.team_seats(1), vec![1]);
        assert_eq!(table.team_seats(0), vec![2, 0]);
        assert_eq!(table.active_seats(), vec![1, 2, 0]);
    }
}
