/// Shared fast store: queues, live games, pointers and tournament sets.
pub mod live_store;
/// Entity definitions shared by every backend.
pub mod models;
/// Durable store of game records, players and tournaments.
pub mod record_store;
/// Storage error shared by every backend.
pub mod storage;
