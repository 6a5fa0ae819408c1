use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::live_game::{
        GameStatusView, JoinRequest, LeaveQuery, LeaveResponse, MatchmakingResponse, MoveRequest,
        MoveResponse,
    },
    error::{AppError, ServiceError},
    routes::identity::PlayerId,
    services::{live_game_service, matchmaking},
    state::SharedState,
};

/// Routes for matchmaking and live game play.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/live-games/matchmaking",
            post(join_matchmaking).delete(leave_matchmaking),
        )
        .route("/live-games/{id}/move", post(make_move))
        .route("/live-games/{id}/resign", post(resign))
        .route("/live-games/{id}/status", get(game_status))
}

/// Move rejection rendered as a [`MoveResponse`] with `success = false`.
pub struct MoveRejected(AppError);

impl From<AppError> for MoveRejected {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<ServiceError> for MoveRejected {
    fn from(err: ServiceError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for MoveRejected {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        (status, Json(MoveResponse::rejected(self.0.to_string()))).into_response()
    }
}

/// Join a queue and wait for an opponent, up to the matchmaking timeout.
#[utoipa::path(
    post,
    path = "/live-games/matchmaking",
    tag = "live-games",
    request_body = JoinRequest,
    params(("x-player" = String, Header, description = "Caller identity")),
    responses(
        (status = 200, description = "Matched, timed out or left", body = MatchmakingResponse),
        (status = 400, description = "Not subscribed to the tournament"),
        (status = 409, description = "Already in a game or tournament game cap reached")
    )
)]
pub async fn join_matchmaking(
    State(state): State<SharedState>,
    PlayerId(player): PlayerId,
    Valid(Json(payload)): Valid<Json<JoinRequest>>,
) -> Result<Json<MatchmakingResponse>, AppError> {
    let result = matchmaking::join(&state, &player, payload).await?;
    Ok(Json(result))
}

/// Leave a queue; succeeds when the caller was not queued.
#[utoipa::path(
    delete,
    path = "/live-games/matchmaking",
    tag = "live-games",
    params(
        ("x-player" = String, Header, description = "Caller identity"),
        LeaveQuery
    ),
    responses((status = 200, description = "Queue left", body = LeaveResponse))
)]
pub async fn leave_matchmaking(
    State(state): State<SharedState>,
    PlayerId(player): PlayerId,
    Query(query): Query<LeaveQuery>,
) -> Result<Json<LeaveResponse>, AppError> {
    let result = matchmaking::leave(&state, &player, query.tournament_id.as_deref()).await?;
    Ok(Json(result))
}

/// Play one move in UCI notation.
#[utoipa::path(
    post,
    path = "/live-games/{id}/move",
    tag = "live-games",
    request_body = MoveRequest,
    params(
        ("id" = Uuid, Path, description = "Live game identifier"),
        ("x-player" = String, Header, description = "Caller identity")
    ),
    responses(
        (status = 200, description = "Move applied", body = MoveResponse),
        (status = 400, description = "Move rejected", body = MoveResponse),
        (status = 404, description = "Game not found", body = MoveResponse),
        (status = 409, description = "Game already ended", body = MoveResponse)
    )
)]
pub async fn make_move(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    PlayerId(player): PlayerId,
    Json(payload): Json<MoveRequest>,
) -> Result<Json<MoveResponse>, MoveRejected> {
    payload.validate().map_err(AppError::from)?;
    let result = live_game_service::make_move(&state, id, &player, &payload.mv).await?;
    Ok(Json(result))
}

/// Resign; the opponent wins.
#[utoipa::path(
    post,
    path = "/live-games/{id}/resign",
    tag = "live-games",
    params(
        ("id" = Uuid, Path, description = "Live game identifier"),
        ("x-player" = String, Header, description = "Caller identity")
    ),
    responses(
        (status = 200, description = "Game resigned", body = MoveResponse),
        (status = 404, description = "Game not found", body = MoveResponse),
        (status = 409, description = "Game already ended", body = MoveResponse)
    )
)]
pub async fn resign(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    PlayerId(player): PlayerId,
) -> Result<Json<MoveResponse>, MoveRejected> {
    let result = live_game_service::resign(&state, id, &player).await?;
    Ok(Json(result))
}

/// Current state of a live game.
#[utoipa::path(
    get,
    path = "/live-games/{id}/status",
    tag = "live-games",
    params(("id" = Uuid, Path, description = "Live game identifier")),
    responses(
        (status = 200, description = "Game state", body = GameStatusView),
        (status = 404, description = "Game not found")
    )
)]
pub async fn game_status(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameStatusView>, AppError> {
    let view = live_game_service::get_status(&state, id).await?;
    Ok(Json(view))
}
