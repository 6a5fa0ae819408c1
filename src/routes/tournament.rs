use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};

use crate::{
    dto::tournament::SubscriptionResponse,
    error::AppError,
    routes::identity::PlayerId,
    services::tournament_service::{self, LiveTournamentData},
    state::SharedState,
};

/// Routes handling tournament subscriptions.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/tournaments/{id}/subscription",
            post(subscribe).delete(unsubscribe),
        )
        .route("/tournaments/{id}/publish", post(publish))
}

/// Subscribe the caller to a tournament.
#[utoipa::path(
    post,
    path = "/tournaments/{id}/subscription",
    tag = "tournaments",
    params(
        ("id" = String, Path, description = "Tournament identifier"),
        ("x-player" = String, Header, description = "Caller identity")
    ),
    responses(
        (status = 200, description = "Subscribed", body = SubscriptionResponse),
        (status = 400, description = "Rating outside the tournament range"),
        (status = 409, description = "Already subscribed, tournament full or subscriptions closed")
    )
)]
pub async fn subscribe(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    PlayerId(player): PlayerId,
) -> Result<Json<SubscriptionResponse>, AppError> {
    tournament_service::subscribe(&state, &id, &player).await?;
    Ok(Json(SubscriptionResponse {
        tournament_id: id,
        player,
        subscribed: true,
    }))
}

/// Withdraw the caller's subscription before their first tournament game.
#[utoipa::path(
    delete,
    path = "/tournaments/{id}/subscription",
    tag = "tournaments",
    params(
        ("id" = String, Path, description = "Tournament identifier"),
        ("x-player" = String, Header, description = "Caller identity")
    ),
    responses(
        (status = 200, description = "Unsubscribed", body = SubscriptionResponse),
        (status = 400, description = "Not subscribed"),
        (status = 409, description = "Already played or subscriptions closed")
    )
)]
pub async fn unsubscribe(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    PlayerId(player): PlayerId,
) -> Result<Json<SubscriptionResponse>, AppError> {
    tournament_service::unsubscribe(&state, &id, &player).await?;
    Ok(Json(SubscriptionResponse {
        tournament_id: id,
        player,
        subscribed: false,
    }))
}

/// Refresh the cached live data of a tournament from the record store.
#[utoipa::path(
    post,
    path = "/tournaments/{id}/publish",
    tag = "tournaments",
    params(("id" = String, Path, description = "Tournament identifier")),
    responses(
        (status = 200, description = "Tournament published", body = LiveTournamentData),
        (status = 404, description = "Tournament not found")
    )
)]
pub async fn publish(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<LiveTournamentData>, AppError> {
    let data = tournament_service::publish(&state, &id).await?;
    Ok(Json(data))
}
