use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    chess::{START_FEN, Side},
    dao::models::{PlayerResult, TimeClass},
};

/// Lifecycle status of a live game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    /// Moves are accepted.
    InProgress,
    /// Terminal: white won by mate or resignation.
    WhiteWins,
    /// Terminal: black won by mate or resignation.
    BlackWins,
    /// Terminal: drawn by insufficient material or the fifty-move rule.
    Draw,
    /// Terminal: the side to move has no legal move and is not in check.
    Stalemate,
}

impl GameStatus {
    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        self != GameStatus::InProgress
    }

    /// Win for `side`.
    pub fn win_for(side: Side) -> Self {
        match side {
            Side::White => GameStatus::WhiteWins,
            Side::Black => GameStatus::BlackWins,
        }
    }

    /// Results from white's and black's point of view; `None` while the game is running.
    pub fn results(self) -> Option<(PlayerResult, PlayerResult)> {
        match self {
            GameStatus::InProgress => None,
            GameStatus::WhiteWins => Some((PlayerResult::Win, PlayerResult::Loss)),
            GameStatus::BlackWins => Some((PlayerResult::Loss, PlayerResult::Win)),
            GameStatus::Draw | GameStatus::Stalemate => {
                Some((PlayerResult::Draw, PlayerResult::Draw))
            }
        }
    }

    /// Result token appended to the rendered move list.
    pub fn result_token(self) -> &'static str {
        match self {
            GameStatus::WhiteWins => "1-0",
            GameStatus::BlackWins => "0-1",
            GameStatus::Draw | GameStatus::Stalemate => "1/2-1/2",
            GameStatus::InProgress => "*",
        }
    }
}

/// Classification of a successfully applied move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MoveOutcome {
    /// Ordinary move.
    MoveMade,
    /// Informational, the game continues.
    Check,
    /// The mover won.
    Checkmate,
    /// The opponent has no legal move and is not in check.
    Stalemate,
    /// Insufficient material or the fifty-move rule.
    Draw,
    /// A player resigned.
    Resigned,
}

/// Events accepted by [`LiveGameState::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// A legal move was played; carries the move and the position after it.
    Moved {
        mv: String,
        fen: String,
        outcome: MoveOutcome,
    },
    /// `side` resigned.
    Resigned { side: Side },
}

/// Error returned when an event arrives after the game ended.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while {from:?}")]
pub struct InvalidTransition {
    /// Status the game was in.
    pub from: GameStatus,
    /// Rejected event.
    pub event: GameEvent,
}

/// Authoritative state of one live game, stored serialized in the live store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveGameState {
    /// Game id, also the record id once finalized.
    pub game_id: Uuid,
    /// White player id.
    pub white_player: String,
    /// Black player id.
    pub black_player: String,
    /// Current position; its side-to-move field decides whose turn it is.
    pub fen: String,
    /// Lifecycle status.
    pub status: GameStatus,
    /// Last UCI move played.
    #[serde(default)]
    pub last_move: Option<String>,
    /// `None` for casual games.
    #[serde(default)]
    pub tournament_id: Option<String>,
    /// Time-control class of a casual game; tournament games take it from the tournament.
    #[serde(default)]
    pub game_type: Option<TimeClass>,
    /// UCI moves in play order.
    #[serde(default)]
    pub move_history: Vec<String>,
    /// Opening name, set at most once.
    #[serde(default)]
    pub detected_opening: Option<String>,
    /// ECO code of the detected opening.
    #[serde(default)]
    pub detected_opening_eco: Option<String>,
    /// Pairing time.
    pub created_at: SystemTime,
    /// Time of the last move, the pairing time before any move.
    pub last_move_at: SystemTime,
}

impl LiveGameState {
    /// Fresh game from the initial position.
    pub fn new(
        game_id: Uuid,
        white_player: impl Into<String>,
        black_player: impl Into<String>,
        tournament_id: Option<String>,
        game_type: Option<TimeClass>,
    ) -> Self {
        let now = SystemTime::now();
        // A game is either scoped to a tournament or typed, never both.
        let game_type = if tournament_id.is_some() {
            None
        } else {
            game_type
        };

        Self {
            game_id,
            white_player: white_player.into(),
            black_player: black_player.into(),
            fen: START_FEN.to_owned(),
            status: GameStatus::InProgress,
            last_move: None,
            tournament_id,
            game_type,
            move_history: Vec::new(),
            detected_opening: None,
            detected_opening_eco: None,
            created_at: now,
            last_move_at: now,
        }
    }

    /// Side played by `player`, `None` for non-participants.
    pub fn side_of(&self, player: &str) -> Option<Side> {
        if self.white_player == player {
            Some(Side::White)
        } else if self.black_player == player {
            Some(Side::Black)
        } else {
            None
        }
    }

    /// Player holding `side`.
    pub fn player(&self, side: Side) -> &str {
        match side {
            Side::White => &self.white_player,
            Side::Black => &self.black_player,
        }
    }

    /// Side to move according to the stored position.
    pub fn turn(&self) -> Option<Side> {
        Side::from_fen(&self.fen)
    }

    /// Whether an opening lookup is still worth attempting.
    pub fn wants_opening(&self, horizon: usize) -> bool {
        self.detected_opening.is_none() && self.move_history.len() <= horizon
    }

    /// Record the detected opening; later calls keep the first one.
    pub fn set_opening_once(&mut self, name: String, eco: Option<String>) -> bool {
        if self.detected_opening.is_some() {
            return false;
        }
        self.detected_opening = Some(name);
        self.detected_opening_eco = eco;
        true
    }

    /// Apply an event, returning the resulting status.
    pub fn apply(&mut self, event: GameEvent) -> Result<GameStatus, InvalidTransition> {
        if self.status.is_terminal() {
            return Err(InvalidTransition {
                from: self.status,
                event,
            });
        }

        let next = compute_transition(self.status, &event);
        match event {
            GameEvent::Moved { mv, fen, .. } => {
                self.fen = fen;
                self.last_move = Some(mv.clone());
                self.move_history.push(mv);
                self.last_move_at = SystemTime::now();
            }
            GameEvent::Resigned { .. } => {}
        }
        self.status = next;
        Ok(next)
    }
}

fn compute_transition(current: GameStatus, event: &GameEvent) -> GameStatus {
    match event {
        GameEvent::Moved { outcome, fen, .. } => match outcome {
            // The mover is the side that is no longer to move.
            MoveOutcome::Checkmate => Side::from_fen(fen)
                .map(|to_move| GameStatus::win_for(to_move.opposite()))
                .unwrap_or(current),
            MoveOutcome::Stalemate => GameStatus::Stalemate,
            MoveOutcome::Draw => GameStatus::Draw,
            MoveOutcome::MoveMade | MoveOutcome::Check | MoveOutcome::Resigned => current,
        },
        GameEvent::Resigned { side } => GameStatus::win_for(side.opposite()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game() -> LiveGameState {
        LiveGameState::new(Uuid::from_u128(1), "alice", "bob", None, Some(TimeClass::Blitz))
    }

    fn moved(mv: &str, fen: &str, outcome: MoveOutcome) -> GameEvent {
        GameEvent::Moved {
            mv: mv.into(),
            fen: fen.into(),
            outcome,
        }
    }

    #[test]
    fn tournament_games_carry_no_game_type() {
        let game = LiveGameState::new(
            Uuid::nil(),
            "a",
            "b",
            Some("t1".into()),
            Some(TimeClass::Bullet),
        );
        assert_eq!(game.game_type, None);
    }

    #[test]
    fn mate_awards_the_mover() {
        let mut game = game();
        let fen = "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3";
        let status = game.apply(moved("d8h4", fen, MoveOutcome::Checkmate)).unwrap();
        assert_eq!(status, GameStatus::BlackWins);
        assert_eq!(game.move_history, vec!["d8h4".to_owned()]);
    }

    #[test]
    fn check_keeps_game_running() {
        let mut game = game();
        let status = game
            .apply(moved("e2e4", "x b - - 0 1", MoveOutcome::Check))
            .unwrap();
        assert_eq!(status, GameStatus::InProgress);
        assert_eq!(game.last_move.as_deref(), Some("e2e4"));
    }

    #[test]
    fn terminal_states_reject_events() {
        let mut game = game();
        game.apply(GameEvent::Resigned { side: Side::White }).unwrap();
        assert_eq!(game.status, GameStatus::BlackWins);

        let err = game
            .apply(moved("e2e4", "x b - - 0 1", MoveOutcome::MoveMade))
            .unwrap_err();
        assert_eq!(err.from, GameStatus::BlackWins);
        assert!(game.move_history.is_empty());
    }

    #[test]
    fn opening_is_set_once() {
        let mut game = game();
        assert!(game.set_opening_once("King's Pawn".into(), Some("B00".into())));
        assert!(!game.set_opening_once("Other".into(), None));
        assert_eq!(game.detected_opening.as_deref(), Some("King's Pawn"));
        assert!(!game.wants_opening(30));
    }

    #[test]
    fn draw_results_are_symmetric() {
        assert_eq!(
            GameStatus::Stalemate.results(),
            Some((PlayerResult::Draw, PlayerResult::Draw))
        );
        assert_eq!(GameStatus::Draw.result_token(), "1/2-1/2");
        assert_eq!(GameStatus::InProgress.results(), None);
    }
}
