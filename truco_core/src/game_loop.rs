use std::future::Future;
use tracing::{error, info};

use crate::TeamIdx;
use crate::command::HandState;
use crate::error::TrucoError;
use crate::game::{Match, Step};
use crate::play::PlayInstance;

/// Team that takes the match when a handler fails.
pub const FORFEIT_WINNER: TeamIdx = 0;

/// Decision hooks of a [`GameLoop`].
///
/// Each hook receives the pending decision and is expected to resolve it
/// through `use_card`/`burn_card`/`say`. Returning without resolving it is
/// fine: the loop pulls the next step and the decision comes back. An `Err`
/// ends the match by forfeit.
pub trait MatchHandlers: Send {
    /// A seat has to play a card or call.
    fn on_turn(&mut self, play: &mut PlayInstance<'_>) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// A truco call waits for an answer.
    fn on_truco(&mut self, play: &mut PlayInstance<'_>) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// An envido call waits for an answer, or a seat has to declare points.
    fn on_envido(&mut self, play: &mut PlayInstance<'_>) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn on_hand_finished(
        &mut self,
        _game: &Match,
        _hand_idx: usize,
        _winner: Option<TeamIdx>,
    ) -> impl Future<Output = anyhow::Result<()>> + Send {
        async { Ok(()) }
    }

    fn on_winner(&mut self, _game: &Match, _winner: TeamIdx) -> impl Future<Output = anyhow::Result<()>> + Send {
        async { Ok(()) }
    }
}

/// Drives a [`Match`] to the end, one step at a time.
pub struct GameLoop {
    game: Match,
}

impl GameLoop {
    pub fn new(game: Match) -> Self {
        GameLoop { game }
    }

    pub fn game(&self) -> &Match {
        &self.game
    }

    pub fn into_inner(self) -> Match {
        self.game
    }

    /// Runs until a team wins and returns it. Only invariant violations of
    /// the engine come back as `Err`; handler failures forfeit the match.
    pub async fn run<H: MatchHandlers>(&mut self, handlers: &mut H) -> Result<TeamIdx, TrucoError> {
        info!(match_id = %self.game.id, players = self.game.table.len(), "match started");
        loop {
            let outcome = match self.game.next_step()? {
                Step::Skip => continue,
                Step::Awaiting { state, .. } => {
                    let Some(mut play) = self.game.play() else {
                        continue;
                    };
                    match state {
                        HandState::WaitingPlay => handlers.on_turn(&mut play).await,
                        HandState::WaitingForTrucoAnswer => handlers.on_truco(&mut play).await,
                        HandState::WaitingEnvidoAnswer | HandState::WaitingEnvidoPointsAnswer => {
                            handlers.on_envido(&mut play).await
                        }
                        HandState::Finished => Ok(()),
                    }
                }
                Step::HandFinished { hand_idx, winner } => handlers.on_hand_finished(&self.game, hand_idx, winner).await,
                Step::MatchFinished { winner } => {
                    if let Err(err) = handlers.on_winner(&self.game, winner).await {
                        error!(match_id = %self.game.id, error = %err, "winner handler failed");
                    }
                    return Ok(winner);
                }
            };

            if let Err(err) = outcome {
                error!(match_id = %self.game.id, error = %err, "handler failed, forfeiting the match");
                self.game.forfeit(FORFEIT_WINNER);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Command, EnvidoRaise, TrucoRaise};
    use crate::game::MatchOptions;
    use crate::player::Player;
    use anyhow::anyhow;
    use uuid::Uuid;

    fn new_match(n: usize, seed: u64) -> Match {
        let players = (0..n).map(|i| Player::new(Uuid::new_v4(), format!("bot{}", i), i % 2)).collect();
        Match::new(players, MatchOptions { seed: Some(seed), ..MatchOptions::default() }).unwrap()
    }

    /// Calls envido and truco whenever it may, accepts everything, then
    /// plays its first card.
    #[derive(Default)]
    struct Bots {
        turns: usize,
        truco_answers: usize,
        envido_answers: usize,
        hands: Vec<Option<TeamIdx>>,
        winner: Option<TeamIdx>,
    }

    impl MatchHandlers for Bots {
        async fn on_turn(&mut self, play: &mut PlayInstance<'_>) -> anyhow::Result<()> {
            self.turns += 1;
            let id = play.player.ok_or_else(|| anyhow!("no player"))?;
            for call in [Command::Envido(EnvidoRaise::Envido), Command::Truco(TrucoRaise::Truco)] {
                if play.commands.contains(&call) {
                    play.say(call, &id);
                    return Ok(());
                }
            }
            let card = play.hand()[0];
            play.use_card(0, card).ok_or_else(|| anyhow!("card refused"))?;
            Ok(())
        }

        async fn on_truco(&mut self, play: &mut PlayInstance<'_>) -> anyhow::Result<()> {
            self.truco_answers += 1;
            let id = play.player.ok_or_else(|| anyhow!("no player"))?;
            play.say(Command::Quiero, &id);
            Ok(())
        }

        async fn on_envido(&mut self, play: &mut PlayInstance<'_>) -> anyhow::Result<()> {
            self.envido_answers += 1;
            let id = play.player.ok_or_else(|| anyhow!("no player"))?;
            let command = if play.state == HandState::WaitingEnvidoAnswer {
                Command::Quiero
            } else {
                play.commands
                    .iter()
                    .rev()
                    .find(|c| matches!(c, Command::Points(_)))
                    .copied()
                    .ok_or_else(|| anyhow!("nothing to declare"))?
            };
            play.say(command, &id);
            Ok(())
        }

        async fn on_hand_finished(&mut self, _game: &Match, _hand_idx: usize, winner: Option<TeamIdx>) -> anyhow::Result<()> {
            self.hands.push(winner);
            Ok(())
        }

        async fn on_winner(&mut self, _game: &Match, winner: TeamIdx) -> anyhow::Result<()> {
            self.winner = Some(winner);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_bots_play_a_whole_match() {
        for players in [2, 4, 6] {
            let mut game_loop = GameLoop::new(new_match(players, 7));
            let mut bots = Bots::default();
            let winner = game_loop.run(&mut bots).await.unwrap();

            let game = game_loop.game();
            assert_eq!(game.winner, Some(winner));
            assert_eq!(bots.winner, Some(winner));
            assert!(game.teams[winner].points.won);
            assert!(game.teams[winner].points.buenas >= game.options.match_point);
            assert!(bots.turns > 0 && bots.truco_answers > 0 && bots.envido_answers > 0);
            assert_eq!(bots.hands.len(), game.hands.len());
            assert!(bots.hands.iter().all(Option::is_some));
        }
    }

    struct Failing {
        winner: Option<TeamIdx>,
    }

    impl MatchHandlers for Failing {
        async fn on_turn(&mut self, _play: &mut PlayInstance<'_>) -> anyhow::Result<()> {
            Err(anyhow!("connection lost"))
        }

        async fn on_truco(&mut self, _play: &mut PlayInstance<'_>) -> anyhow::Result<()> {
            Ok(())
        }

        async fn on_envido(&mut self, _play: &mut PlayInstance<'_>) -> anyhow::Result<()> {
            Ok(())
        }

        async fn on_winner(&mut self, _game: &Match, winner: TeamIdx) -> anyhow::Result<()> {
            self.winner = Some(winner);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failing_handler_forfeits() {
        let mut game_loop = GameLoop::new(new_match(4, 1));
        let mut handlers = Failing { winner: None };
        let winner = game_loop.run(&mut handlers).await.unwrap();

        assert_eq!(winner, FORFEIT_WINNER);
        assert_eq!(handlers.winner, Some(FORFEIT_WINNER));
        let game = game_loop.into_inner();
        assert_eq!(game.hands.len(), 1);
        assert!(game.current_hand().unwrap().is_finished());
    }
}
