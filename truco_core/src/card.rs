use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TrucoError;

// --- Core data structures ---

/// Suit of the Spanish deck
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Suit {
    Espada, // swords
    Basto,  // clubs
    Oro,    // coins
    Copa,   // cups
}

/// Face value of a card. The Spanish deck used for truco has no 8 or 9.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Value {
    One,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Sota,    // 10
    Caballo, // 11
    Rey,     // 12
}

/// A single card of the 40-card deck
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct Card {
    pub value: Value,
    pub suit: Suit,
}

/// What actually lands on the table. A card played face-down is recorded as
/// `Burnt` and never takes part in rank comparisons.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum PlayedCard {
    Open(Card),
    Burnt,
}

pub const SUITS: [Suit; 4] = [Suit::Espada, Suit::Basto, Suit::Oro, Suit::Copa];

pub const VALUES: [Value; 10] = [
    Value::One, Value::Two, Value::Three, Value::Four, Value::Five,
    Value::Six, Value::Seven, Value::Sota, Value::Caballo, Value::Rey,
];

pub const DECK_SIZE: usize = 40;

/// Rank of the burnt sentinel, below every real card.
pub const BURNT_RANK: u8 = 0;

impl Value {
    /// The number printed on the card.
    pub fn number(self) -> u8 {
        match self {
            Value::One => 1,
            Value::Two => 2,
            Value::Three => 3,
            Value::Four => 4,
            Value::Five => 5,
            Value::Six => 6,
            Value::Seven => 7,
            Value::Sota => 10,
            Value::Caballo => 11,
            Value::Rey => 12,
        }
    }

    fn from_number(n: u8) -> Option<Value> {
        VALUES.iter().copied().find(|v| v.number() == n)
    }
}

impl Card {
    pub fn new(value: Value, suit: Suit) -> Card {
        Card { value, suit }
    }

    /// Position in the truco ranking, 1 (the fours) to 14 (ace of swords).
    /// Several cards share a rank, e.g. every three is a 10.
    pub fn rank(&self) -> u8 {
        use Suit::*;
        use Value::*;
        match (self.value, self.suit) {
            (One, Espada) => 14,
            (One, Basto) => 13,
            (Seven, Espada) => 12,
            (Seven, Oro) => 11,
            (Three, _) => 10,
            (Two, _) => 9,
            (One, _) => 8,
            (Rey, _) => 7,
            (Caballo, _) => 6,
            (Sota, _) => 5,
            (Seven, _) => 4,
            (Six, _) => 3,
            (Five, _) => 2,
            (Four, _) => 1,
        }
    }

    /// Contribution of the card to an envido count. Face cards count zero.
    pub fn envido_value(&self) -> u8 {
        match self.value {
            Value::Sota | Value::Caballo | Value::Rey => 0,
            v => v.number(),
        }
    }
}

impl PlayedCard {
    pub fn rank(&self) -> u8 {
        match self {
            PlayedCard::Open(card) => card.rank(),
            PlayedCard::Burnt => BURNT_RANK,
        }
    }

    pub fn card(&self) -> Option<Card> {
        match self {
            PlayedCard::Open(card) => Some(*card),
            PlayedCard::Burnt => None,
        }
    }

    pub fn is_burnt(&self) -> bool {
        matches!(self, PlayedCard::Burnt)
    }
}

// --- Helpers ---

impl Suit {
    fn letter(self) -> char {
        match self {
            Suit::Espada => 'e',
            Suit::Basto => 'b',
            Suit::Oro => 'o',
            Suit::Copa => 'c',
        }
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.value.number(), self.suit)
    }
}

impl fmt::Display for PlayedCard {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PlayedCard::Open(card) => write!(f, "{}", card),
            PlayedCard::Burnt => write!(f, "xx"),
        }
    }
}

/// Parses card codes such as `"1e"` or `"12o"`.
impl FromStr for Card {
    type Err = TrucoError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        let bad = || TrucoError::ParseCard(code.to_string());
        let (split, letter) = code.char_indices().last().ok_or_else(bad)?;
        let suit = match letter {
            'e' => Suit::Espada,
            'b' => Suit::Basto,
            'o' => Suit::Oro,
            'c' => Suit::Copa,
            _ => return Err(bad()),
        };
        let number: u8 = code[..split].parse().map_err(|_| bad())?;
        let value = Value::from_number(number).ok_or_else(bad)?;
        Ok(Card { value, suit })
    }
}

/// Builds the 40 cards in catalog order.
pub fn create_deck() -> Vec<Card> {
    let mut deck = Vec::with_capacity(DECK_SIZE);
    for &suit in &SUITS {
        for &value in &VALUES {
            deck.push(Card { value, suit });
        }
    }
    deck
}

// --- Envido counting ---

/// Envido candidates of one player's three cards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvidoCount {
    /// Every count the player may declare, highest first.
    pub points: Vec<u8>,
    /// Three cards of the same suit. Tracked only.
    pub flor: bool,
}

impl EnvidoCount {
    pub fn best(&self) -> u8 {
        self.points.first().copied().unwrap_or(0)
    }
}

/// Counts envido over a player's cards: each same-suit pair scores the sum of
/// its face values plus 20; without any pair the count is the highest single
/// face value.
pub fn count_envido(cards: &[Card]) -> EnvidoCount {
    let mut points = Vec::new();
    let mut flor = false;

    for &suit in &SUITS {
        let same: Vec<&Card> = cards.iter().filter(|c| c.suit == suit).collect();
        if same.len() >= 3 {
            flor = true;
        }
        for i in 0..same.len() {
            for j in (i + 1)..same.len() {
                points.push(same[i].envido_value() + same[j].envido_value() + 20);
            }
        }
    }

    if points.is_empty() {
        if let Some(high) = cards.iter().map(Card::envido_value).max() {
            points.push(high);
        }
    }

    points.sort_unstable_by(|a, b| b.cmp(a));
    points.dedup();
    EnvidoCount { points, flor }
}

// --- Unit tests ---

#[cfg(test)]
mod tests {
    use super::*;

    fn cards(codes: &[&str]) -> Vec<Card> {
        codes.iter().map(|c| c.parse().unwrap()).collect()
    }

    #[test]
    fn test_deck_has_forty_distinct_cards() {
        let mut deck = create_deck();
        assert_eq!(deck.len(), DECK_SIZE);
        deck.sort();
        deck.dedup();
        assert_eq!(deck.len(), DECK_SIZE);
    }

    #[test]
    fn test_rank_order() {
        let order = ["1e", "1b", "7e", "7o", "3c", "2b", "1o", "12e", "11e", "10e", "7c", "6e", "5e", "4e"];
        let ranks: Vec<u8> = cards(&order).iter().map(Card::rank).collect();
        assert!(ranks.windows(2).all(|w| w[0] > w[1]), "ranks not strictly descending: {:?}", ranks);
        assert_eq!(ranks[0], 14);
        assert_eq!(ranks[13], 1);
    }

    #[test]
    fn test_threes_share_rank() {
        for code in ["3e", "3b", "3o", "3c"] {
            assert_eq!(code.parse::<Card>().unwrap().rank(), 10);
        }
        assert_eq!("1c".parse::<Card>().unwrap().rank(), "1o".parse::<Card>().unwrap().rank());
    }

    #[test]
    fn test_burnt_ranks_below_everything() {
        assert_eq!(PlayedCard::Burnt.rank(), BURNT_RANK);
        assert!(create_deck().iter().all(|c| c.rank() > BURNT_RANK));
        assert_eq!(PlayedCard::Burnt.to_string(), "xx");
    }

    #[test]
    fn test_parse_and_display() {
        let card: Card = "12o".parse().unwrap();
        assert_eq!(card, Card::new(Value::Rey, Suit::Oro));
        assert_eq!(card.to_string(), "12o");
        assert!("8e".parse::<Card>().is_err());
        assert!("1x".parse::<Card>().is_err());
        assert!("".parse::<Card>().is_err());
    }

    #[test]
    fn test_envido_pair() {
        let count = count_envido(&cards(&["7e", "6e", "1o"]));
        assert_eq!(count.best(), 33);
        assert!(!count.flor);
    }

    #[test]
    fn test_envido_face_cards_count_zero() {
        assert_eq!(count_envido(&cards(&["12c", "11c", "4o"])).best(), 20);
        assert_eq!(count_envido(&cards(&["12c", "11o", "10e"])).best(), 0);
    }

    #[test]
    fn test_envido_without_pair_takes_highest_single() {
        let count = count_envido(&cards(&["5e", "3b", "12o"]));
        assert_eq!(count.points, vec![5]);
    }

    #[test]
    fn test_flor_offers_every_pair() {
        let count = count_envido(&cards(&["7b", "5b", "1b"]));
        assert!(count.flor);
        assert_eq!(count.points, vec![32, 28, 26]);
    }
}
