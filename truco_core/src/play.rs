use std::collections::BTreeSet;
use tracing::debug;

use crate::PlayerId;
use crate::card::{Card, PlayedCard};
use crate::command::{Command, HandState};
use crate::error::IllegalAction;
use crate::game::Match;
use crate::state::MatchView;

/// The pending decision of one step.
///
/// Built from the current hand when the step is surfaced. It accepts exactly
/// one successful `use_card`/`burn_card`/`say`; after that it stops waiting
/// and the caller has to pull the next step.
pub struct PlayInstance<'a> {
    game: &'a mut Match,
    pub state: HandState,
    pub hand_idx: usize,
    pub round_idx: usize,
    pub player: Option<PlayerId>,
    pub commands: BTreeSet<Command>,
    pub truco_state: u8,
    waiting: bool,
}

impl<'a> PlayInstance<'a> {
    pub(crate) fn new(game: &'a mut Match) -> Self {
        let (state, hand_idx, round_idx, seat, truco_state) = match game.current_hand() {
            Some(hand) => (hand.state, hand.idx, hand.round_idx(), hand.current_player, hand.truco.state),
            None => (HandState::Finished, 0, 0, None, 1),
        };
        let player = seat.map(|s| game.table.players[s].id);
        let commands = player.map(|id| game.legal_commands(&id)).unwrap_or_default();
        let waiting = state != HandState::Finished && player.is_some() && game.winner.is_none();

        PlayInstance { game, state, hand_idx, round_idx, player, commands, truco_state, waiting }
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting
    }

    pub fn game(&self) -> &Match {
        self.game
    }

    /// Cards held by the player this decision belongs to.
    pub fn hand(&self) -> &[Card] {
        self.player
            .and_then(|id| self.game.player(&id))
            .map(|p| p.hand.as_slice())
            .unwrap_or(&[])
    }

    /// Legal commands of any seated player, e.g. a teammate answering a call.
    pub fn commands_for(&self, id: &PlayerId) -> BTreeSet<Command> {
        if !self.waiting {
            return BTreeSet::new();
        }
        self.game.legal_commands(id)
    }

    /// Plays the card at `slot` face up.
    pub fn use_card(&mut self, slot: usize, card: Card) -> Option<PlayedCard> {
        self.play_card(slot, card, false)
    }

    /// Plays the card at `slot` face down. Returns the burnt sentinel.
    pub fn burn_card(&mut self, slot: usize, card: Card) -> Option<PlayedCard> {
        self.play_card(slot, card, true)
    }

    fn play_card(&mut self, slot: usize, card: Card, face_down: bool) -> Option<PlayedCard> {
        if !self.waiting || self.state != HandState::WaitingPlay {
            return None;
        }
        let id = self.player?;
        match self.game.use_card(&id, slot, card, face_down) {
            Ok(played) => {
                self.waiting = false;
                Some(played)
            }
            Err(err) => {
                debug!(player = %id, %card, %err, "card rejected");
                None
            }
        }
    }

    /// Issues `command` on behalf of `player`.
    pub fn say(&mut self, command: Command, player: &PlayerId) -> Option<Command> {
        if !self.waiting {
            debug!(player = %player, %command, err = %IllegalAction::NotWaiting, "command rejected");
            return None;
        }
        match self.game.say(player, command) {
            Ok(command) => {
                self.waiting = false;
                Some(command)
            }
            Err(err) => {
                debug!(player = %player, %command, %err, "command rejected");
                None
            }
        }
    }

    /// Stamps the deadline the transport gave the deciding player.
    pub fn set_turn_expiry(&mut self, expires_at: Option<u64>) {
        if let Some(id) = self.player {
            self.game.set_turn_expiry(&id, expires_at);
        }
    }

    /// A player left while this decision was open. If it was theirs, the
    /// decision is dropped and the next step skips them.
    pub fn abandon(&mut self, player: &PlayerId) -> bool {
        if !self.game.abandon(player) {
            return false;
        }
        if self.player.as_ref() == Some(player) {
            self.waiting = false;
        }
        true
    }

    /// Redacted snapshot for one viewer.
    pub fn view_for(&self, viewer: &PlayerId) -> MatchView {
        self.game.for_client(viewer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::TrucoRaise;
    use crate::game::{MatchOptions, Step};
    use crate::player::Player;
    use uuid::Uuid;

    fn game() -> Match {
        let players = (0..4).map(|i| Player::new(Uuid::new_v4(), format!("p{}", i), i % 2)).collect();
        let mut game = Match::new(players, MatchOptions { seed: Some(3), ..MatchOptions::default() }).unwrap();
        while !matches!(game.next_step().unwrap(), Step::Awaiting { .. }) {}
        game
    }

    #[test]
    fn test_resolves_only_once() {
        let mut game = game();
        let forehand = game.table.players[0].id;
        let mut play = game.play().unwrap();
        assert_eq!(play.player, Some(forehand));
        assert!(play.is_waiting());

        let card = play.hand()[0];
        assert_eq!(play.use_card(0, card), Some(PlayedCard::Open(card)));
        assert!(!play.is_waiting());

        let next = play.hand()[0];
        assert_eq!(play.use_card(0, next), None);
        assert_eq!(play.say(Command::Mazo, &forehand), None);
        assert!(play.commands_for(&forehand).is_empty());
    }

    #[test]
    fn test_illegal_actions_keep_waiting() {
        let mut game = game();
        let other = game.table.players[1].id;
        let forehand = game.table.players[0].id;
        let mut play = game.play().unwrap();

        assert_eq!(play.say(Command::Quiero, &forehand), None);
        assert_eq!(play.say(Command::Mazo, &other), None);
        let missing = play.game().table.players[1].hand[0];
        assert_eq!(play.use_card(0, missing), None);
        assert_eq!(play.burn_card(0, play.hand()[0]), None);
        assert!(play.is_waiting());

        assert_eq!(play.say(Command::Truco(TrucoRaise::Truco), &forehand), Some(Command::Truco(TrucoRaise::Truco)));
    }

    #[test]
    fn test_teammate_may_answer() {
        let mut game = game();
        let forehand = game.table.players[0].id;
        game.say(&forehand, Command::Truco(TrucoRaise::Truco)).unwrap();
        game.next_step().unwrap();

        let mut play = game.play().unwrap();
        assert_eq!(play.state, HandState::WaitingForTrucoAnswer);
        let partner = play.game().table.players[3].id;
        assert_ne!(play.player, Some(partner));
        assert!(play.commands_for(&partner).contains(&Command::Quiero));
        assert_eq!(play.say(Command::Quiero, &partner), Some(Command::Quiero));
        assert_eq!(game.current_hand().unwrap().truco.answer, Some(true));
    }

    #[test]
    fn test_command_set_survives_serialization() {
        let mut game = game();
        let play = game.play().unwrap();
        let first = serde_json::to_string(&play.commands).unwrap();
        let restored: BTreeSet<Command> = serde_json::from_str(&first).unwrap();
        assert_eq!(restored, play.commands);
        drop(play);

        let again = game.play().unwrap();
        assert_eq!(serde_json::to_string(&again.commands).unwrap(), first);
    }

    #[test]
    fn test_abandon_drops_own_decision() {
        let mut game = game();
        let forehand = game.table.players[0].id;
        let partner = game.table.players[2].id;
        let mut play = game.play().unwrap();

        assert!(play.abandon(&partner));
        assert!(play.is_waiting());
        assert!(play.abandon(&forehand));
        assert!(!play.is_waiting());
        assert!(!play.abandon(&Uuid::new_v4()));

        assert_eq!(game.next_step().unwrap(), Step::MatchFinished { winner: 1 });
    }

    #[test]
    fn test_view_hides_other_hands() {
        let mut game = game();
        let forehand = game.table.players[0].id;
        let play = game.play().unwrap();
        let view = play.view_for(&forehand);
        assert!(view.players[0].hand.iter().all(Option::is_some));
        assert!(view.players[1].hand.iter().all(Option::is_none));
        assert_eq!(view.current_player, Some(forehand));
    }
}
