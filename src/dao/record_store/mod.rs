pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::time::SystemTime;

use futures::future::BoxFuture;

use crate::dao::models::{
    GameRecordEntity, GameSummaryEntity, ParticipantStatsEntity, PlayerEntity, PlayerGameUpdate,
    PlayerResult, PlayerUpdateOutcome, SlotAppend, StatsOutcome, TournamentEntity,
};
use crate::dao::storage::StorageResult;
use uuid::Uuid;

/// Durable persistence for finished games, player profiles and tournament bookkeeping.
///
/// Every mutation is idempotent when keyed by the same game id, so a replayed
/// reconciliation never double counts.
pub trait RecordStore: Send + Sync {
    fn save_game(&self, record: GameRecordEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameRecordEntity>>>;
    fn find_player(&self, id: String) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    /// Apply the rating delta and history insert as one update.
    fn apply_player_game(
        &self,
        update: PlayerGameUpdate,
    ) -> BoxFuture<'static, StorageResult<PlayerUpdateOutcome>>;
    fn find_tournament(
        &self,
        id: String,
    ) -> BoxFuture<'static, StorageResult<Option<TournamentEntity>>>;
    fn append_tournament_slot(
        &self,
        tournament_id: String,
        entry: GameSummaryEntity,
    ) -> BoxFuture<'static, StorageResult<SlotAppend>>;
    /// Create the stats record when missing, then count `result` for `game_id`.
    fn upsert_participant_stats(
        &self,
        tournament_id: String,
        player_id: String,
        game_id: Uuid,
        result: PlayerResult,
    ) -> BoxFuture<'static, StorageResult<StatsOutcome>>;
    fn find_participant_stats(
        &self,
        tournament_id: String,
        player_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantStatsEntity>>>;
    /// Active tournaments whose finish time is at or before `now`.
    fn list_tournaments_to_finish(
        &self,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<TournamentEntity>>>;
    /// Flip an active tournament to finished; `false` when it was not active.
    fn mark_tournament_finished(&self, id: String) -> BoxFuture<'static, StorageResult<bool>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
