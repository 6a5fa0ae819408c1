//! In-process [`RecordStore`] backed by concurrent maps, used for local runs and tests.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::SystemTime,
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use uuid::Uuid;

use super::RecordStore;
use crate::dao::{
    models::{
        GameRecordEntity, GameSummaryEntity, ParticipantStatsEntity, PlayerEntity,
        PlayerGameUpdate, PlayerResult, PlayerUpdateOutcome, SlotAppend, StatsOutcome,
        TournamentEntity, TournamentStatus, history_slot,
    },
    storage::StorageResult,
};

#[derive(Default)]
struct MemoryInner {
    games: DashMap<Uuid, GameRecordEntity>,
    players: DashMap<String, PlayerEntity>,
    tournaments: DashMap<String, TournamentEntity>,
    slots: DashMap<String, Vec<GameSummaryEntity>>,
    stats: DashMap<(String, String), ParticipantStatsEntity>,
    save_game_calls: AtomicUsize,
}

/// Map-backed record store; clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    inner: Arc<MemoryInner>,
}

impl MemoryRecordStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a player profile.
    pub fn insert_player(&self, player: PlayerEntity) {
        self.inner.players.insert(player.id.clone(), player);
    }

    /// Register or replace a tournament document.
    pub fn insert_tournament(&self, tournament: TournamentEntity) {
        self.inner
            .tournaments
            .insert(tournament.id.clone(), tournament);
    }

    /// Snapshot of a player profile.
    pub fn player(&self, id: &str) -> Option<PlayerEntity> {
        self.inner.players.get(id).map(|entry| entry.clone())
    }

    /// Snapshot of a tournament document.
    pub fn tournament(&self, id: &str) -> Option<TournamentEntity> {
        self.inner.tournaments.get(id).map(|entry| entry.clone())
    }

    /// Game summaries buffered for a tournament, in slot order.
    pub fn tournament_slots(&self, id: &str) -> Vec<GameSummaryEntity> {
        self.inner
            .slots
            .get(id)
            .map(|entry| entry.clone())
            .unwrap_or_default()
    }

    /// Number of persisted game records.
    pub fn game_count(&self) -> usize {
        self.inner.games.len()
    }

    /// How many times `save_game` was invoked, duplicates included.
    pub fn save_game_calls(&self) -> usize {
        self.inner.save_game_calls.load(Ordering::SeqCst)
    }

    fn apply_player_game_sync(&self, update: PlayerGameUpdate) -> PlayerUpdateOutcome {
        let Some(mut player) = self.inner.players.get_mut(&update.player_id) else {
            return PlayerUpdateOutcome::PlayerNotFound;
        };

        if player.has_game(update.game_id) {
            return PlayerUpdateOutcome::AlreadyApplied;
        }

        let capacity = update.history_capacity.max(1);
        let (index, next) = history_slot(&player.games, player.buffered_games, capacity);
        if player.games.len() <= index {
            player.games.resize(index + 1, None);
        }
        player.games[index] = Some(update.summary);
        player.buffered_games = next;
        let rating = player
            .ratings
            .apply(update.time_class, update.rating_delta);

        PlayerUpdateOutcome::Applied { rating }
    }

    fn append_slot_sync(&self, tournament_id: &str, entry: GameSummaryEntity) -> Option<SlotAppend> {
        let mut tournament = self.inner.tournaments.get_mut(tournament_id)?;
        let mut slots = self.inner.slots.entry(tournament_id.to_owned()).or_default();

        if slots.iter().any(|slot| slot.id == entry.id) {
            return Some(SlotAppend::AlreadyRecorded);
        }
        if tournament.buffered_games >= tournament.capacity() {
            return Some(SlotAppend::Full);
        }

        let index = tournament.buffered_games;
        slots.push(entry);
        tournament.buffered_games += 1;
        Some(SlotAppend::Appended { index })
    }
}

impl RecordStore for MemoryRecordStore {
    fn save_game(&self, record: GameRecordEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.save_game_calls.fetch_add(1, Ordering::SeqCst);
            store.inner.games.insert(record.id, record);
            Ok(())
        })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameRecordEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.games.get(&id).map(|entry| entry.clone())) })
    }

    fn find_player(&self, id: String) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.player(&id)) })
    }

    fn apply_player_game(
        &self,
        update: PlayerGameUpdate,
    ) -> BoxFuture<'static, StorageResult<PlayerUpdateOutcome>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.apply_player_game_sync(update)) })
    }

    fn find_tournament(
        &self,
        id: String,
    ) -> BoxFuture<'static, StorageResult<Option<TournamentEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.tournament(&id)) })
    }

    fn append_tournament_slot(
        &self,
        tournament_id: String,
        entry: GameSummaryEntity,
    ) -> BoxFuture<'static, StorageResult<SlotAppend>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .append_slot_sync(&tournament_id, entry)
                .unwrap_or(SlotAppend::UnknownTournament))
        })
    }

    fn upsert_participant_stats(
        &self,
        tournament_id: String,
        player_id: String,
        game_id: Uuid,
        result: PlayerResult,
    ) -> BoxFuture<'static, StorageResult<StatsOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            let mut stats = store
                .inner
                .stats
                .entry((tournament_id.clone(), player_id.clone()))
                .or_insert_with(|| ParticipantStatsEntity::new(tournament_id, player_id));
            if stats.record(game_id, result) {
                Ok(StatsOutcome::Applied)
            } else {
                Ok(StatsOutcome::AlreadyApplied)
            }
        })
    }

    fn find_participant_stats(
        &self,
        tournament_id: String,
        player_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantStatsEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .stats
                .get(&(tournament_id, player_id))
                .map(|entry| entry.clone()))
        })
    }

    fn list_tournaments_to_finish(
        &self,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<TournamentEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .tournaments
                .iter()
                .filter(|entry| {
                    entry.status == TournamentStatus::Active && entry.finish_time <= now
                })
                .map(|entry| entry.clone())
                .collect())
        })
    }

    fn mark_tournament_finished(&self, id: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let Some(mut tournament) = store.inner.tournaments.get_mut(&id) else {
                return Ok(false);
            };
            if tournament.status != TournamentStatus::Active {
                return Ok(false);
            }
            tournament.status = TournamentStatus::Finished;
            Ok(true)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::{RatingsEntity, TimeClass};

    fn summary(n: u128) -> GameSummaryEntity {
        GameSummaryEntity {
            id: Uuid::from_u128(n),
            white: "alice".into(),
            black: "bob".into(),
            opening: None,
            winner: Some("alice".into()),
            date: SystemTime::UNIX_EPOCH,
        }
    }

    fn tournament(capacity_games: u32) -> TournamentEntity {
        TournamentEntity {
            id: "t1".into(),
            name: "Weekly".into(),
            status: TournamentStatus::Active,
            finish_time: SystemTime::UNIX_EPOCH,
            min_rating: 0,
            max_rating: 3000,
            max_participants: 1,
            games_per_player: capacity_games,
            time_class: TimeClass::Rapid,
            buffered_games: 0,
        }
    }

    #[tokio::test]
    async fn unknown_tournament_is_not_reported_as_full() {
        let store = MemoryRecordStore::new();
        let outcome = store
            .append_tournament_slot("missing".into(), summary(1))
            .await
            .unwrap();
        assert_eq!(outcome, SlotAppend::UnknownTournament);
        assert!(store.tournament_slots("missing").is_empty());
    }

    #[tokio::test]
    async fn slot_table_never_exceeds_capacity() {
        let store = MemoryRecordStore::new();
        store.insert_tournament(tournament(2));

        let first = store.append_tournament_slot("t1".into(), summary(1)).await.unwrap();
        let second = store.append_tournament_slot("t1".into(), summary(2)).await.unwrap();
        let third = store.append_tournament_slot("t1".into(), summary(3)).await.unwrap();

        assert_eq!(first, SlotAppend::Appended { index: 0 });
        assert_eq!(second, SlotAppend::Appended { index: 1 });
        assert_eq!(third, SlotAppend::Full);
        assert_eq!(store.tournament("t1").unwrap().buffered_games, 2);
        assert_eq!(store.tournament_slots("t1").len(), 2);
    }

    #[tokio::test]
    async fn replayed_slot_append_is_recorded_once() {
        let store = MemoryRecordStore::new();
        store.insert_tournament(tournament(4));

        store.append_tournament_slot("t1".into(), summary(1)).await.unwrap();
        let replay = store.append_tournament_slot("t1".into(), summary(1)).await.unwrap();

        assert_eq!(replay, SlotAppend::AlreadyRecorded);
        assert_eq!(store.tournament("t1").unwrap().buffered_games, 1);
    }

    #[tokio::test]
    async fn player_update_is_idempotent_per_game() {
        let store = MemoryRecordStore::new();
        store.insert_player(PlayerEntity::new(
            "alice",
            RatingsEntity {
                bullet: 1000,
                blitz: 1100,
                rapid: 1200,
            },
        ));

        let update = PlayerGameUpdate {
            player_id: "alice".into(),
            game_id: Uuid::from_u128(1),
            time_class: TimeClass::Rapid,
            rating_delta: 20,
            summary: summary(1),
            history_capacity: 50,
        };

        let first = store.apply_player_game(update.clone()).await.unwrap();
        let second = store.apply_player_game(update).await.unwrap();

        assert_eq!(first, PlayerUpdateOutcome::Applied { rating: 1220 });
        assert_eq!(second, PlayerUpdateOutcome::AlreadyApplied);
        assert_eq!(store.player("alice").unwrap().ratings.rapid, 1220);
    }
}
