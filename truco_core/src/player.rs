use serde::{Deserialize, Serialize};

use crate::card::{Card, EnvidoCount, count_envido};
use crate::{PlayerId, TeamIdx};

/// Per-seat state. Hand-scoped fields are reset by [`Player::reset_for_hand`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub team: TeamIdx,
    pub hand: Vec<Card>,       // cards still held
    pub used: Vec<Card>,       // cards played this hand, face-down ones included
    pub prev_hand: Vec<Card>,  // the three cards of the previous hand, for reveal
    pub envido: EnvidoCount,
    pub disabled: bool,        // out of the current hand (mazo, declined truco)
    pub abandoned: bool,       // left the match
    pub ready: bool,
    pub is_turn: bool,
    pub is_envido_turn: bool,
    pub turn_expires_at: Option<u64>, // unix millis, managed by the transport
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, team: TeamIdx) -> Self {
        Player {
            id,
            name: name.into(),
            team,
            hand: Vec::with_capacity(3),
            used: Vec::with_capacity(3),
            prev_hand: Vec::new(),
            envido: EnvidoCount::default(),
            disabled: false,
            abandoned: false,
            ready: false,
            is_turn: false,
            is_envido_turn: false,
            turn_expires_at: None,
        }
    }

    /// Clears the previous deal. An abandoned player stays disabled.
    pub fn reset_for_hand(&mut self) {
        let mut previous: Vec<Card> = self.used.drain(..).collect();
        previous.append(&mut self.hand);
        self.prev_hand = previous;
        self.envido = EnvidoCount::default();
        self.disabled = self.abandoned;
        self.is_turn = false;
        self.is_envido_turn = false;
        self.turn_expires_at = None;
    }

    /// Gives the player a fresh hand and recomputes the envido candidates.
    pub fn set_hand(&mut self, cards: Vec<Card>) {
        self.used.clear();
        self.hand = cards;
        self.envido = count_envido(&self.hand);
    }

    /// Removes the card at `slot` if it matches `card`.
    pub(crate) fn take_from_hand(&mut self, slot: usize, card: Card) -> Option<Card> {
        if self.hand.get(slot) != Some(&card) {
            return None;
        }
        let card = self.hand.remove(slot);
        self.used.push(card);
        Some(card)
    }

    pub fn is_active(&self) -> bool {
        !self.disabled && !self.abandoned
    }
}

/// What other seats are allowed to see of a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicPlayer {
    pub id: PlayerId,
    pub name: String,
    pub team: TeamIdx,
    pub hand: Vec<Option<Card>>, // `None` for cards the viewer cannot see
    pub prev_hand: Vec<Card>,
    pub envido: Option<EnvidoCount>,
    pub disabled: bool,
    pub abandoned: bool,
    pub ready: bool,
    pub is_turn: bool,
    pub is_envido_turn: bool,
    pub turn_expires_at: Option<u64>,
}

impl Player {
    pub fn public_view(&self, viewer: Option<&PlayerId>) -> PublicPlayer {
        let is_owner = viewer == Some(&self.id);
        PublicPlayer {
            id: self.id,
            name: self.name.clone(),
            team: self.team,
            hand: self.hand.iter().map(|c| if is_owner { Some(*c) } else { None }).collect(),
            prev_hand: self.prev_hand.clone(),
            envido: if is_owner { Some(self.envido.clone()) } else { None },
            disabled: self.disabled,
            abandoned: self.abandoned,
            ready: self.ready,
            is_turn: self.is_turn,
            is_envido_turn: self.is_envido_turn,
            turn_expires_at: self.turn_expires_at,
        }
    }
}
