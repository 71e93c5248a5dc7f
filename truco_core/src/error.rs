use thiserror::Error;

/// Invariant violations. These point at a construction bug, never at a
/// player's decision, so callers are expected to bail out.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TrucoError {
    #[error("deck must hold {expected} cards after shuffle, found {found}")]
    DeckSize { expected: usize, found: usize },

    #[error("no cards left in the deck")]
    EmptyDeck,

    #[error("a match needs 2, 4 or 6 players (got {0})")]
    PlayerCount(usize),

    #[error("team index must be 0 or 1 (got {0})")]
    InvalidTeam(usize),

    #[error("team sizes differ: {0} vs {1}")]
    TeamSizeMismatch(usize, usize),

    #[error("more than {max} players (got {got})")]
    TooManyPlayers { got: usize, max: usize },

    #[error("unknown card code: {0}")]
    ParseCard(String),
}

/// Why an action was turned down. The decision point stays open, so this
/// never ends the game.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum IllegalAction {
    #[error("this decision was already resolved")]
    NotWaiting,
    #[error("no hand in progress")]
    NoHand,
    #[error("player is not seated at this table")]
    UnknownPlayer,
    #[error("player is disabled for this hand")]
    DisabledPlayer,
    #[error("not this player's turn")]
    WrongPlayer,
    #[error("command is not offered right now")]
    NotOffered,
    #[error("cards can only be played while waiting for a play")]
    NotPlaying,
    #[error("card is not in that slot of the player's hand")]
    CardNotInHand,
    #[error("cards cannot be played face-down in the first round")]
    FaceDownFirstRound,
}
