//! # Truco rules engine
//!
//! Argentine Truco for 2, 4 or 6 players in two teams: dealing, rounds,
//! the envido and truco negotiations, scoring in malas and buenas, and the
//! messages exchanged between a table server and its clients.
//!
//! The engine is an explicit state machine. [`Match::next_step`] surfaces
//! one decision at a time and actions are applied through [`Match::play`]
//! or the async [`GameLoop`]. Nothing here touches the network or a clock.

mod card;
mod command;
mod deck;
mod envido;
mod error;
mod game;
mod game_loop;
mod hand;
mod message;
mod play;
mod player;
mod round;
mod state;
mod table;
mod team;
mod truco;

pub use card::*;
pub use command::*;
pub use deck::*;
pub use envido::*;
pub use error::*;
pub use game::*;
pub use game_loop::*;
pub use hand::*;
pub use message::*;
pub use play::*;
pub use player::*;
pub use round::*;
pub use state::*;
pub use table::*;
pub use team::*;
pub use truco::*;

use uuid::Uuid;

pub type PlayerId = Uuid;
pub type RoomId = Uuid;
pub type MatchId = Uuid;
/// 0 or 1.
pub type TeamIdx = usize;
