/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Live game moves, resignations and status projection.
pub mod live_game_service;
/// Queue-based pairing of players.
pub mod matchmaking;
/// Opening table lookup.
pub mod opening_service;
/// Finalization saga for finished games.
pub mod reconciliation;
/// Backoff helper for store calls.
pub mod retry;
/// Periodic tournament sweep and finalization replay.
pub mod scheduler;
/// Record store connection supervision.
pub mod storage_supervisor;
/// Tournament subscriptions and cached tournament data.
pub mod tournament_service;
