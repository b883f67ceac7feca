//! One client's view of a match: board, turn ownership and the result.
//!
//! In multiplayer mode every accepted local launch yields a `move` message
//! for the relay, and launches received from the opponent are replayed
//! through the same turn controller. Both ends compute the cascade from
//! the same inputs; nothing is validated remotely.
//!
//! The opponent's launch can arrive before our own cascade has finished
//! animating. It is held back and started when our turn passes.

use thiserror::Error;

use crate::board::{Board, Outcome, Team};
use crate::config::BoardConfig;
use crate::protocol::{ClientMsg, MoveMsg};
use crate::turn::{LaunchError, LegId, MotionLeg, TurnController, TurnError, TurnEvent};
use crate::vec2::Vec2;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GameError {
    #[error(transparent)]
    Launch(#[from] LaunchError),
    #[error(transparent)]
    Turn(#[from] TurnError),
    #[error("the game is over")]
    GameOver,
    #[error("remote moves need a multiplayer game")]
    NotMultiplayer,
    #[error("opponent tried to move {0}, which belongs to us")]
    ForeignPiece(String),
    #[error("an opponent move is already waiting for the board to settle")]
    MoveAlreadyQueued,
}

/// What a completed leg (or a whole settle) changed.
#[derive(Debug, Default)]
pub struct Progress {
    pub events: Vec<TurnEvent>,
    /// Set exactly once, when the cascade that ended the game has settled
    pub finished: Option<Outcome>,
    /// Messages for the relay
    pub outbound: Vec<ClientMsg>,
    /// First leg of a held-back opponent move, started when the turn passed
    pub started: Option<MotionLeg>,
}

pub struct Game {
    turn: TurnController,
    /// Colour played by this client; `None` when both sides share a screen
    local: Option<Team>,
    /// Verdict implied by the latest capture, committed once the board settles
    pending_outcome: Option<Outcome>,
    outcome: Option<Outcome>,
    /// Opponent launch received while our cascade was still moving
    queued_remote: Option<MoveMsg>,
}

impl Game {
    /// Shared-screen game: either side may launch on its turn.
    pub fn local(config: BoardConfig) -> Self {
        Self::with_board(Board::new(config), None)
    }

    /// Networked game where this client plays `color`.
    pub fn multiplayer(config: BoardConfig, color: Team) -> Self {
        Self::with_board(Board::new(config), Some(color))
    }

    pub fn with_board(board: Board, local: Option<Team>) -> Self {
        Self {
            turn: TurnController::new(board),
            local,
            pending_outcome: None,
            outcome: None,
            queued_remote: None,
        }
    }

    pub fn board(&self) -> &Board {
        self.turn.board()
    }

    pub fn turn(&self) -> &TurnController {
        &self.turn
    }

    pub fn local_color(&self) -> Option<Team> {
        self.local
    }

    pub fn is_multiplayer(&self) -> bool {
        self.local.is_some()
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn is_over(&self) -> bool {
        self.outcome.is_some()
    }

    /// Take over leg numbering from the game this one replaces.
    pub fn succeed(mut self, previous: &Game) -> Self {
        self.turn.continue_leg_ids(previous.turn.next_leg_id());
        self
    }

    pub fn reset(&mut self) {
        self.turn.reset();
        self.pending_outcome = None;
        self.outcome = None;
        self.queued_remote = None;
    }

    /// Opponent move waiting for the current cascade to settle
    pub fn queued_remote(&self) -> Option<&MoveMsg> {
        self.queued_remote.as_ref()
    }

    /// Launch one of our pieces. In multiplayer mode also returns the `move`
    /// to forward to the opponent.
    pub fn launch(&mut self, piece: &str, velocity: Vec2) -> Result<(MotionLeg, Option<ClientMsg>), GameError> {
        if self.is_over() {
            return Err(GameError::GameOver);
        }
        let leg = self.turn.launch(piece, velocity, self.local)?;
        let outbound = self.local.map(|_| {
            ClientMsg::Move(MoveMsg {
                piece: piece.to_string(),
                vector: velocity.to_array(),
            })
        });
        Ok((leg, outbound))
    }

    /// Replay a launch received from the opponent.
    ///
    /// Returns `None` when our own cascade is still moving: the move is held
    /// and its first leg is reported in [`Progress::started`] once the turn
    /// passes.
    pub fn apply_remote_move(&mut self, msg: &MoveMsg) -> Result<Option<MotionLeg>, GameError> {
        let local = self.local.ok_or(GameError::NotMultiplayer)?;
        if self.is_over() {
            return Err(GameError::GameOver);
        }
        if self.turn.board().piece(&msg.piece).map(|p| p.team) == Some(local) {
            return Err(GameError::ForeignPiece(msg.piece.clone()));
        }
        if self.turn.move_in_progress() {
            if self.queued_remote.is_some() {
                return Err(GameError::MoveAlreadyQueued);
            }
            tracing::debug!(piece = %msg.piece, "board still moving, holding opponent move");
            self.queued_remote = Some(msg.clone());
            return Ok(None);
        }
        Ok(Some(self.turn.launch(&msg.piece, Vec2::from(msg.vector), None)?))
    }

    /// Forward a leg completion from the animator.
    pub fn complete_leg(&mut self, leg_id: LegId) -> Result<Progress, GameError> {
        let events = self.turn.complete_leg(leg_id)?;
        Ok(self.absorb(events))
    }

    /// Drive the current cascade to rest without an animator. A held-back
    /// opponent move is started but not driven.
    pub fn settle(&mut self) -> Result<Progress, GameError> {
        let events = self.turn.settle()?;
        Ok(self.absorb(events))
    }

    fn absorb(&mut self, events: Vec<TurnEvent>) -> Progress {
        let mut progress = Progress::default();
        let mut flipped = false;
        for event in &events {
            match event {
                TurnEvent::PieceCaptured { .. } => {
                    self.pending_outcome = self.turn.board().outcome();
                }
                TurnEvent::TurnFlipped { .. } => {
                    flipped = true;
                    if let (None, Some(outcome)) = (self.outcome, self.pending_outcome) {
                        self.outcome = Some(outcome);
                        progress.finished = Some(outcome);
                        tracing::debug!(?outcome, "game finished");
                        if let Some(local) = self.local {
                            progress.outbound.push(ClientMsg::GameResult {
                                result: outcome.result_for(local),
                            });
                        }
                    }
                }
                _ => {}
            }
        }
        if flipped {
            progress.started = self.launch_queued();
        }
        progress.events = events;
        progress
    }

    fn launch_queued(&mut self) -> Option<MotionLeg> {
        let msg = self.queued_remote.take()?;
        if self.is_over() {
            tracing::warn!(piece = %msg.piece, "game over, dropping held opponent move");
            return None;
        }
        match self.turn.launch(&msg.piece, Vec2::from(msg.vector), None) {
            Ok(leg) => Some(leg),
            Err(err) => {
                tracing::warn!(piece = %msg.piece, %err, "dropping held opponent move");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Piece;
    use crate::protocol::GameResult;
    use crate::vec2::vec2;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "Expected {} to be close to {}",
            actual,
            expected
        );
    }

    fn piece(id: &str, team: Team, x: f64, y: f64) -> Piece {
        Piece {
            id: id.to_string(),
            team,
            pos: vec2(x, y),
            vel: Vec2::ZERO,
        }
    }

    /// White w1 sits below red r1 near the top edge; a hard shot knocks r1 off.
    fn endgame(local: Option<Team>) -> Game {
        let board = Board::with_pieces(
            BoardConfig::default(),
            vec![
                piece("w1", Team::White, 225.0, 200.0),
                piece("r1", Team::Red, 225.0, 100.0),
            ],
        );
        Game::with_board(board, local)
    }

    #[test]
    fn fresh_game_white_to_move() {
        let game = Game::local(BoardConfig::default());
        assert_eq!(game.turn().current_team(), Team::White);
        assert!(!game.turn().move_in_progress());
        assert_eq!(game.board().count(Team::White), 8);
        assert_eq!(game.board().count(Team::Red), 8);
        assert!(!game.is_multiplayer());
    }

    #[test]
    fn local_launch_sends_nothing() {
        let mut game = Game::local(BoardConfig::default());
        let (_, outbound) = game.launch("w1", vec2(0.0, -1.0)).unwrap();
        assert!(outbound.is_none());
    }

    #[test]
    fn multiplayer_launch_produces_move() {
        let mut game = Game::multiplayer(BoardConfig::default(), Team::White);
        let (_, outbound) = game.launch("w2", vec2(1.5, -3.0)).unwrap();
        assert_eq!(
            outbound,
            Some(ClientMsg::Move(MoveMsg {
                piece: "w2".into(),
                vector: [1.5, -3.0]
            }))
        );
    }

    #[test]
    fn multiplayer_rejects_launch_out_of_turn() {
        let mut game = Game::multiplayer(BoardConfig::default(), Team::Red);
        assert_eq!(
            game.launch("w1", vec2(0.0, -1.0)).unwrap_err(),
            GameError::Launch(LaunchError::NotYourColor {
                local: Team::Red,
                current: Team::White
            })
        );
    }

    #[test]
    fn remote_move_replays_opponent_launch() {
        let mut game = Game::multiplayer(BoardConfig::default(), Team::Red);
        let leg = game
            .apply_remote_move(&MoveMsg {
                piece: "w1".into(),
                vector: [0.0, -1.0],
            })
            .unwrap()
            .unwrap();
        assert_eq!(leg.piece, "w1");
        game.settle().unwrap();
        assert_eq!(game.turn().current_team(), Team::Red);
    }

    #[test]
    fn remote_move_for_own_piece_is_rejected() {
        let mut game = Game::multiplayer(BoardConfig::default(), Team::White);
        let err = game
            .apply_remote_move(&MoveMsg {
                piece: "w1".into(),
                vector: [0.0, -1.0],
            })
            .unwrap_err();
        assert_eq!(err, GameError::ForeignPiece("w1".into()));
    }

    #[test]
    fn remote_move_needs_multiplayer() {
        let mut game = Game::local(BoardConfig::default());
        let msg = MoveMsg {
            piece: "w1".into(),
            vector: [0.0, -1.0],
        };
        assert_eq!(game.apply_remote_move(&msg), Err(GameError::NotMultiplayer));
    }

    #[test]
    fn knocking_out_last_red_wins_once_settled() {
        let mut game = endgame(Some(Team::White));
        let (_, outbound) = game.launch("w1", vec2(0.0, -10.0)).unwrap();
        assert!(outbound.is_some());

        let progress = game.settle().unwrap();
        assert!(progress
            .events
            .iter()
            .any(|e| matches!(e, TurnEvent::PieceCaptured { piece, .. } if piece == "r1")));
        assert_eq!(progress.finished, Some(Outcome::Winner(Team::White)));
        assert_eq!(
            progress.outbound,
            vec![ClientMsg::GameResult {
                result: GameResult::Won
            }]
        );
        assert!(game.is_over());
        assert_eq!(
            game.launch("w1", vec2(0.0, 1.0)).unwrap_err(),
            GameError::GameOver
        );
    }

    #[test]
    fn loser_reports_lost() {
        let mut game = endgame(Some(Team::Red));
        game.apply_remote_move(&MoveMsg {
            piece: "w1".into(),
            vector: [0.0, -10.0],
        })
        .unwrap();
        let progress = game.settle().unwrap();
        assert_eq!(
            progress.outbound,
            vec![ClientMsg::GameResult {
                result: GameResult::Lost
            }]
        );
    }

    #[test]
    fn both_sides_wiped_out_is_a_draw() {
        // A 45 degree glancing hit near the left edge sends the last white
        // down-left and the last red up-left; both leave the board.
        let s = 40.0 / 2f64.sqrt();
        let board = Board::with_pieces(
            BoardConfig::default(),
            vec![
                piece("w1", Team::White, 150.0, 200.0),
                piece("r1", Team::Red, 120.0 - s, 200.0 - s),
            ],
        );
        let mut game = Game::with_board(board, Some(Team::Red));
        game.apply_remote_move(&MoveMsg {
            piece: "w1".into(),
            vector: [-10.0, 0.0],
        })
        .unwrap();

        let progress = game.settle().unwrap();
        let captured = progress
            .events
            .iter()
            .filter(|e| matches!(e, TurnEvent::PieceCaptured { .. }))
            .count();
        assert_eq!(captured, 2);
        assert_eq!(progress.finished, Some(Outcome::Draw));
        assert_eq!(
            progress.outbound,
            vec![ClientMsg::GameResult {
                result: GameResult::Draw
            }]
        );
    }

    #[test]
    fn reset_starts_a_fresh_game() {
        let mut game = endgame(None);
        game.launch("w1", vec2(0.0, -10.0)).unwrap();
        game.settle().unwrap();
        assert!(game.is_over());

        game.reset();
        assert!(!game.is_over());
        assert_eq!(game.turn().current_team(), Team::White);
        assert_eq!(game.board().count(Team::Red), 8);
        assert_eq!(game.board().count(Team::White), 8);
    }

    #[test]
    fn no_result_while_both_sides_remain() {
        let mut game = Game::local(BoardConfig::default());
        game.launch("w1", vec2(0.0, 5.0)).unwrap();
        let progress = game.settle().unwrap();
        assert!(progress.finished.is_none());
        assert!(progress.outbound.is_empty());
        assert_eq!(game.board().count(Team::White), 7);
    }

    #[test]
    fn opponent_move_during_our_cascade_starts_when_turn_passes() {
        let mut game = Game::multiplayer(BoardConfig::default(), Team::White);
        let (leg, _) = game.launch("w1", vec2(0.0, -1.0)).unwrap();
        let reply = MoveMsg {
            piece: "r1".into(),
            vector: [0.0, 1.0],
        };

        // Our leg is still animating when the reply arrives.
        assert_eq!(game.apply_remote_move(&reply), Ok(None));
        assert_eq!(game.queued_remote(), Some(&reply));
        assert_eq!(game.board().piece("r1").unwrap().pos, vec2(75.0, 75.0));

        let progress = game.complete_leg(leg.id).unwrap();
        assert!(progress
            .events
            .contains(&TurnEvent::TurnFlipped { next: Team::Red }));
        let started = progress.started.expect("held move should start on the flip");
        assert_eq!(started.piece, "r1");
        assert!(game.queued_remote().is_none());
        assert!(game.turn().move_in_progress());
        assert_eq!(game.turn().current_team(), Team::Red);

        game.settle().unwrap();
        assert_close(game.board().piece("r1").unwrap().pos.y, 101.0);
        assert_eq!(game.turn().current_team(), Team::White);
        assert!(!game.turn().move_in_progress());
    }

    #[test]
    fn only_one_opponent_move_is_held() {
        let mut game = Game::multiplayer(BoardConfig::default(), Team::White);
        game.launch("w1", vec2(0.0, -1.0)).unwrap();
        let reply = MoveMsg {
            piece: "r1".into(),
            vector: [0.0, 1.0],
        };
        assert_eq!(game.apply_remote_move(&reply), Ok(None));
        assert_eq!(game.apply_remote_move(&reply), Err(GameError::MoveAlreadyQueued));
    }

    #[test]
    fn reset_drops_held_opponent_move() {
        let mut game = Game::multiplayer(BoardConfig::default(), Team::White);
        game.launch("w1", vec2(0.0, -1.0)).unwrap();
        game.apply_remote_move(&MoveMsg {
            piece: "r1".into(),
            vector: [0.0, 1.0],
        })
        .unwrap();
        game.reset();
        assert!(game.queued_remote().is_none());
    }

    /// A row of four discs: one shot causes three hits and knocks r3 off the board.
    fn chain_board() -> Board {
        Board::with_pieces(
            BoardConfig::default(),
            vec![
                piece("w1", Team::White, 250.0, 250.0),
                piece("r1", Team::Red, 300.0, 250.0),
                piece("r2", Team::Red, 350.0, 250.0),
                piece("r3", Team::Red, 400.0, 250.0),
                piece("r4", Team::Red, 75.0, 75.0),
            ],
        )
    }

    #[test]
    fn both_clients_reach_the_same_board() {
        let mut white = Game::with_board(chain_board(), Some(Team::White));
        let mut red = Game::with_board(chain_board(), Some(Team::Red));

        let (_, outbound) = white.launch("w1", vec2(5.0, 0.0)).unwrap();
        let Some(ClientMsg::Move(msg)) = outbound else {
            panic!("Expected a move message");
        };
        red.apply_remote_move(&msg).unwrap();

        let ours = white.settle().unwrap();
        let theirs = red.settle().unwrap();

        let collisions = |p: &Progress| {
            p.events
                .iter()
                .filter(|e| matches!(e, TurnEvent::Collided { .. }))
                .count()
        };
        assert_eq!(collisions(&ours), 3);
        assert_eq!(collisions(&theirs), 3);
        assert!(ours.events.contains(&TurnEvent::PieceCaptured {
            piece: "r3".into(),
            team: Team::Red
        }));
        assert!(white.board().piece("r3").is_none());

        assert_eq!(white.board().pieces(), red.board().pieces());
        for (a, b) in white.board().pieces().iter().zip(red.board().pieces()) {
            assert_eq!(a.id, b.id);
            assert!(a.pos.x == b.pos.x && a.pos.y == b.pos.y);
        }
        assert_eq!(white.turn().current_team(), red.turn().current_team());
        assert_eq!(white.turn().current_team(), Team::Red);
        assert_eq!(white.outcome(), red.outcome());
        assert_eq!(white.outcome(), None);
    }
}
