use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{dao::storage::StorageError, state::live_game::GameStatus};

/// Rule violations reported to the caller as-is and never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("you are already in an active game")]
    AlreadyInGame,
    #[error("it's not your turn, waiting for {waiting_for}")]
    NotYourTurn { waiting_for: String },
    #[error("illegal move `{0}`")]
    IllegalMove(String),
    #[error("`{0}` is not a valid move")]
    InvalidMoveNotation(String),
    #[error("you are not a participant of this game")]
    NotParticipant,
    #[error("game not found")]
    GameNotFound,
    #[error("game already ended with status {status:?}")]
    GameAlreadyEnded { status: GameStatus },
    #[error("you are not subscribed to this tournament")]
    NotSubscribed,
    #[error("tournament not found")]
    TournamentNotFound,
    #[error("maximum number of tournament games ({limit}) reached")]
    CapacityReached { limit: i64 },
    #[error("already subscribed to this tournament")]
    AlreadySubscribed,
    #[error("tournament is full")]
    TournamentFull,
    #[error("rating {rating} is outside the tournament range {min}..={max}")]
    RatingOutOfRange { rating: i32, min: i32, max: i32 },
    #[error("subscriptions for this tournament are closed")]
    SubscriptionClosed,
    #[error("cannot unsubscribe after playing tournament games")]
    AlreadyPlayed,
    #[error("player `{0}` not found")]
    PlayerNotFound(String),
}

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Durable storage is not connected.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// A domain rule rejected the request.
    #[error(transparent)]
    Domain(#[from] GameError),
    /// A stored value could not be (de)serialized.
    #[error("corrupted state: {0}")]
    Corrupted(String),
    /// Another request is mutating the same game; retry shortly.
    #[error("game is busy, retry")]
    Busy,
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation exceeded its timeout limit.
    #[error("operation timed out")]
    Timeout,
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Corrupted { .. } => ServiceError::Corrupted(err.to_string()),
            other => ServiceError::Unavailable(other),
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Corrupted(err.to_string())
    }
}

impl ServiceError {
    /// Whether repeating the request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Unavailable(source) => source.is_retryable(),
            ServiceError::Degraded | ServiceError::Busy | ServiceError::Timeout => true,
            _ => false,
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Missing caller identity.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<GameError> for AppError {
    fn from(err: GameError) -> Self {
        let message = err.to_string();
        match err {
            GameError::GameNotFound
            | GameError::TournamentNotFound
            | GameError::PlayerNotFound(_) => AppError::NotFound(message),
            GameError::AlreadyInGame
            | GameError::GameAlreadyEnded { .. }
            | GameError::AlreadySubscribed
            | GameError::TournamentFull
            | GameError::CapacityReached { .. }
            | GameError::AlreadyPlayed
            | GameError::SubscriptionClosed => AppError::Conflict(message),
            GameError::NotYourTurn { .. }
            | GameError::IllegalMove(_)
            | GameError::InvalidMoveNotation(_)
            | GameError::NotParticipant
            | GameError::NotSubscribed
            | GameError::RatingOutOfRange { .. } => AppError::BadRequest(message),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Domain(domain) => domain.into(),
            ServiceError::Corrupted(message) => AppError::Internal(message),
            ServiceError::Busy => AppError::ServiceUnavailable("game is busy, retry".into()),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::Timeout => AppError::ServiceUnavailable("operation timed out".into()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl AppError {
    /// HTTP status reported for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
