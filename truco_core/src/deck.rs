use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::card::{Card, DECK_SIZE, create_deck};
use crate::error::TrucoError;

/// The two piles of the deck. Every card is always in exactly one of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deck {
    pub cards: Vec<Card>,    // live pile, dealt from the back
    pub used: Vec<Card>,     // cards handed out since the last shuffle
}

impl Default for Deck {
    fn default() -> Self {
        Deck::new()
    }
}

impl Deck {
    pub fn new() -> Self {
        Deck { cards: create_deck(), used: Vec::with_capacity(DECK_SIZE) }
    }

    pub fn len(&self) -> usize {
        self.cards.len() + self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Moves the top card of the live pile to the used pile.
    pub fn take_card(&mut self) -> Result<Card, TrucoError> {
        let card = self.cards.pop().ok_or(TrucoError::EmptyDeck)?;
        self.used.push(card);
        Ok(card)
    }

    pub fn take_three(&mut self) -> Result<[Card; 3], TrucoError> {
        Ok([self.take_card()?, self.take_card()?, self.take_card()?])
    }

    pub fn shuffle(&mut self) -> Result<(), TrucoError> {
        self.shuffle_with(&mut rand::rng())
    }

    /// Puts every card back in the live pile and shuffles it twice.
    /// `SliceRandom::shuffle` is an in-place Fisher-Yates pass.
    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), TrucoError> {
        self.cards.append(&mut self.used);

        if self.cards.len() != DECK_SIZE {
            return Err(TrucoError::DeckSize { expected: DECK_SIZE, found: self.cards.len() });
        }

        self.cards.shuffle(rng);
        self.cards.shuffle(rng);
        Ok(())
    }
}

// --- Unit tests ---
