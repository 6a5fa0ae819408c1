use axum::Router;

use crate::state::SharedState;

/// Swagger UI and OpenAPI routes.
pub mod docs;
/// Health check route.
pub mod health;
/// Caller identity extractor.
pub mod identity;
/// Matchmaking and live game routes.
pub mod live_game;
/// Tournament subscription routes.
pub mod tournament;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(live_game::router())
        .merge(tournament::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
