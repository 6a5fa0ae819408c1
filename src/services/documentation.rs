use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI document for Live Chess Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::live_game::join_matchmaking,
        crate::routes::live_game::leave_matchmaking,
        crate::routes::live_game::make_move,
        crate::routes::live_game::resign,
        crate::routes::live_game::game_status,
        crate::routes::tournament::subscribe,
        crate::routes::tournament::unsubscribe,
        crate::routes::tournament::publish,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::live_game::JoinRequest,
            crate::dto::live_game::MoveRequest,
            crate::dto::live_game::MatchStatus,
            crate::dto::live_game::MatchmakingResponse,
            crate::dto::live_game::LeaveResponse,
            crate::dto::live_game::MoveResponse,
            crate::dto::live_game::GameStatusView,
            crate::dto::tournament::SubscriptionResponse,
            crate::services::tournament_service::LiveTournamentData,
            crate::state::live_game::GameStatus,
            crate::state::live_game::MoveOutcome,
            crate::chess::Side,
            crate::dao::models::TimeClass,
            crate::dao::models::TournamentStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "live-games", description = "Matchmaking and live game play"),
        (name = "tournaments", description = "Tournament subscriptions"),
    )
)]
pub struct ApiDoc;
