use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    chess::Side,
    dao::models::TimeClass,
    dto::{format_system_time, validation::validate_uci_move},
    state::live_game::{GameStatus, LiveGameState, MoveOutcome},
};

/// Payload accepted when joining matchmaking.
#[derive(Debug, Clone, Default, Deserialize, ToSchema, Validate)]
pub struct JoinRequest {
    /// Tournament to pair inside; the open pool when absent.
    #[serde(default)]
    #[validate(length(min = 1, max = 64))]
    pub tournament_id: Option<String>,
    /// Rating class of a casual game; ignored for tournament games.
    #[serde(default)]
    pub time_class: Option<TimeClass>,
}

/// Query of the leave route.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeaveQuery {
    /// Queue to leave; the open pool when absent.
    pub tournament_id: Option<String>,
}

/// Payload used to play one move.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct MoveRequest {
    /// Move in UCI notation (`e2e4`, `e7e8q`).
    #[serde(rename = "move")]
    #[validate(custom(function = "validate_uci_move"))]
    pub mv: String,
}

/// How a join request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// A game was created.
    Matched,
    /// No opponent showed up before the timeout; the player was removed from the queue.
    TimedOut,
    /// The player left the queue while waiting.
    Left,
}

/// Result of a join request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchmakingResponse {
    pub matched: bool,
    pub status: MatchStatus,
    /// Game id when matched.
    pub game_id: Option<Uuid>,
    pub white_player: Option<String>,
    pub black_player: Option<String>,
    /// Opponent of the caller when matched.
    pub opponent: Option<String>,
    pub tournament_id: Option<String>,
    pub message: String,
}

impl MatchmakingResponse {
    /// Response for `player` once `game` exists.
    pub fn matched(game: &LiveGameState, player: &str) -> Self {
        let opponent = if game.white_player == player {
            &game.black_player
        } else {
            &game.white_player
        };

        Self {
            matched: true,
            status: MatchStatus::Matched,
            game_id: Some(game.game_id),
            white_player: Some(game.white_player.clone()),
            black_player: Some(game.black_player.clone()),
            opponent: Some(opponent.clone()),
            tournament_id: game.tournament_id.clone(),
            message: format!("Matched with {opponent}"),
        }
    }

    /// No opponent before the timeout; the player was evicted.
    pub fn timed_out(tournament_id: Option<String>) -> Self {
        Self::unmatched(
            MatchStatus::TimedOut,
            tournament_id,
            "No opponent found. Removed from queue.",
        )
    }

    /// The player left while waiting.
    pub fn left(tournament_id: Option<String>) -> Self {
        Self::unmatched(MatchStatus::Left, tournament_id, "Left the queue.")
    }

    fn unmatched(status: MatchStatus, tournament_id: Option<String>, message: &str) -> Self {
        Self {
            matched: false,
            status,
            game_id: None,
            white_player: None,
            black_player: None,
            opponent: None,
            tournament_id,
            message: message.to_owned(),
        }
    }
}

/// Acknowledgement of a leave request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveResponse {
    /// Whether the player was actually queued.
    pub removed: bool,
    pub message: String,
}

/// Result of a move or resignation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MoveResponse {
    pub success: bool,
    pub outcome: Option<MoveOutcome>,
    pub fen: Option<String>,
    pub next_turn: Option<Side>,
    pub status: Option<GameStatus>,
    pub detected_opening: Option<String>,
    pub detected_opening_eco: Option<String>,
    /// `Some(true)` once every reconciliation step of a finished game succeeded.
    pub finalized: Option<bool>,
    /// Reason of a rejected move.
    pub message: Option<String>,
}

impl MoveResponse {
    /// Successful transition of `game`.
    pub fn applied(game: &LiveGameState, outcome: MoveOutcome, finalized: Option<bool>) -> Self {
        Self {
            success: true,
            outcome: Some(outcome),
            fen: Some(game.fen.clone()),
            next_turn: if game.status.is_terminal() {
                None
            } else {
                game.turn()
            },
            status: Some(game.status),
            detected_opening: game.detected_opening.clone(),
            detected_opening_eco: game.detected_opening_eco.clone(),
            finalized,
            message: None,
        }
    }

    /// Rejected move; nothing was changed.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            outcome: None,
            fen: None,
            next_turn: None,
            status: None,
            detected_opening: None,
            detected_opening_eco: None,
            finalized: None,
            message: Some(reason.into()),
        }
    }
}

/// Read-only projection of a live game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameStatusView {
    pub game_id: Uuid,
    pub white_player: String,
    pub black_player: String,
    pub status: GameStatus,
    pub fen: String,
    /// Side to move; absent once the game ended.
    pub turn: Option<Side>,
    pub last_move: Option<String>,
    /// RFC 3339 timestamp of the last move, absent before the first one.
    pub last_move_at: Option<String>,
    pub move_count: usize,
    pub move_history: Vec<String>,
    pub detected_opening: Option<String>,
    pub detected_opening_eco: Option<String>,
    pub tournament_id: Option<String>,
    pub game_type: Option<TimeClass>,
}

impl From<&LiveGameState> for GameStatusView {
    fn from(game: &LiveGameState) -> Self {
        Self {
            game_id: game.game_id,
            white_player: game.white_player.clone(),
            black_player: game.black_player.clone(),
            status: game.status,
            fen: game.fen.clone(),
            turn: if game.status.is_terminal() {
                None
            } else {
                game.turn()
            },
            last_move: game.last_move.clone(),
            last_move_at: game
                .last_move
                .as_ref()
                .map(|_| format_system_time(game.last_move_at)),
            move_count: game.move_history.len(),
            move_history: game.move_history.clone(),
            detected_opening: game.detected_opening.clone(),
            detected_opening_eco: game.detected_opening_eco.clone(),
            tournament_id: game.tournament_id.clone(),
            game_type: game.game_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_request_reads_the_move_field() {
        let request: MoveRequest = serde_json::from_str(r#"{ "move": "e2e4" }"#).unwrap();
        assert_eq!(request.mv, "e2e4");
        assert!(request.validate().is_ok());

        let request: MoveRequest = serde_json::from_str(r#"{ "move": "e2" }"#).unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn matched_response_names_the_opponent() {
        let game = LiveGameState::new(Uuid::from_u128(3), "alice", "bob", None, None);
        let response = MatchmakingResponse::matched(&game, "bob");
        assert!(response.matched);
        assert_eq!(response.opponent.as_deref(), Some("alice"));
        assert_eq!(response.white_player.as_deref(), Some("alice"));
    }

    #[test]
    fn fresh_game_has_no_last_move_time() {
        let game = LiveGameState::new(Uuid::from_u128(4), "alice", "bob", None, None);
        let view = GameStatusView::from(&game);
        assert_eq!(view.turn, Some(Side::White));
        assert_eq!(view.last_move_at, None);
        assert_eq!(view.move_count, 0);
    }
}
