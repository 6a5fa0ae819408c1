use std::{sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{Bson, DateTime, Document, doc},
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult, is_duplicate_key},
    models::{
        GAMES, GameDocument, PARTICIPANT_STATS, PLAYERS, ParticipantStatsDocument, PlayerDocument,
        TOURNAMENT_SLOTS, TOURNAMENTS, TournamentDocument, game_document, stats_counters,
        summary_document,
    },
};
use crate::dao::{
    models::{
        GameRecordEntity, GameSummaryEntity, ParticipantStatsEntity, PlayerEntity,
        PlayerGameUpdate, PlayerResult, PlayerUpdateOutcome, SlotAppend, StatsOutcome,
        TournamentEntity, history_slot,
    },
    record_store::RecordStore,
    storage::StorageResult,
};

const MAX_PLAYER_UPDATE_ATTEMPTS: u32 = 8;

/// MongoDB-backed [`RecordStore`].
#[derive(Clone)]
pub struct MongoRecordStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoRecordStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let store = Self {
            inner: Arc::new(MongoInner {
                state: RwLock::new(MongoState { client, database }),
                config,
            }),
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;
        let indexes: [(&'static str, &'static str, Document, &str); 3] = [
            (
                TOURNAMENT_SLOTS,
                "tournament_id,game_id",
                doc! { "tournament_id": 1, "game_id": 1 },
                "tournament_slot_game_idx",
            ),
            (
                PARTICIPANT_STATS,
                "tournament_id,player_id",
                doc! { "tournament_id": 1, "player_id": 1 },
                "participant_stats_idx",
            ),
            (
                TOURNAMENTS,
                "status,finish_time",
                doc! { "status": 1, "finish_time": 1 },
                "tournament_finish_idx",
            ),
        ];

        for (collection, index, keys, name) in indexes {
            let unique = collection != TOURNAMENTS;
            let model = IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                        .name(Some(name.to_owned()))
                        .unique(Some(unique))
                        .build(),
                )
                .build();
            database
                .collection::<Document>(collection)
                .create_index(model)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection,
                    index,
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        let guard = self.inner.state.read().await;
        guard.database.collection::<T>(name)
    }

    async fn save_game(&self, record: GameRecordEntity) -> MongoResult<()> {
        let id = record.id.to_string();
        self.collection::<Document>(GAMES)
            .await
            .replace_one(doc! { "_id": id }, game_document(&record))
            .upsert(true)
            .await
            .map_err(MongoDaoError::query(GAMES, "save game"))?;
        Ok(())
    }

    async fn find_game(&self, id: Uuid) -> MongoResult<Option<GameRecordEntity>> {
        self.collection::<GameDocument>(GAMES)
            .await
            .find_one(doc! { "_id": id.to_string() })
            .await
            .map_err(MongoDaoError::query(GAMES, "find game"))?
            .map(GameRecordEntity::try_from)
            .transpose()
    }

    async fn find_player(&self, id: &str) -> MongoResult<Option<PlayerEntity>> {
        self.collection::<PlayerDocument>(PLAYERS)
            .await
            .find_one(doc! { "_id": id })
            .await
            .map_err(MongoDaoError::query(PLAYERS, "find player"))?
            .map(PlayerEntity::try_from)
            .transpose()
    }

    /// Optimistic compare-and-set on the history slot and cursor the write was planned on.
    async fn apply_player_game(&self, update: PlayerGameUpdate) -> MongoResult<PlayerUpdateOutcome> {
        let players = self.collection::<Document>(PLAYERS).await;
        let game_id = update.game_id.to_string();
        let capacity = update.history_capacity.max(1);
        let rating_field = format!("ratings.{}", update.time_class.as_str());

        for attempt in 1..=MAX_PLAYER_UPDATE_ATTEMPTS {
            let Some(player) = self.find_player(&update.player_id).await? else {
                return Ok(PlayerUpdateOutcome::PlayerNotFound);
            };
            if player.has_game(update.game_id) {
                return Ok(PlayerUpdateOutcome::AlreadyApplied);
            }

            let (index, next) = history_slot(&player.games, player.buffered_games, capacity);
            let slot_field = format!("games.{index}");

            let mut filter = doc! {
                "_id": update.player_id.clone(),
                "games.id": { "$ne": game_id.clone() },
            };
            let cursor = player.buffered_games as i64;
            if cursor == 0 {
                filter.insert("buffered_games", doc! { "$in": [0_i64, Bson::Null] });
            } else {
                filter.insert("buffered_games", cursor);
            }
            match player.games.get(index) {
                Some(Some(existing)) => {
                    filter.insert(format!("{slot_field}.id"), existing.id.to_string());
                }
                _ => {
                    filter.insert(slot_field.clone(), Bson::Null);
                }
            }

            let mut set = doc! { "buffered_games": next as i64 };
            set.insert(slot_field, summary_document(&update.summary));
            let mut inc = Document::new();
            inc.insert(rating_field.clone(), update.rating_delta);

            let result = players
                .update_one(filter, doc! { "$set": set, "$inc": inc })
                .await
                .map_err(MongoDaoError::query(PLAYERS, "apply player game"))?;

            if result.matched_count > 0 {
                let rating = player.ratings.get(update.time_class) + update.rating_delta;
                return Ok(PlayerUpdateOutcome::Applied { rating });
            }
            debug!(player = %update.player_id, attempt, "player document changed; retrying update");
        }

        Err(MongoDaoError::Contended {
            id: update.player_id,
            attempts: MAX_PLAYER_UPDATE_ATTEMPTS,
        })
    }

    async fn find_tournament(&self, id: &str) -> MongoResult<Option<TournamentEntity>> {
        Ok(self
            .collection::<TournamentDocument>(TOURNAMENTS)
            .await
            .find_one(doc! { "_id": id })
            .await
            .map_err(MongoDaoError::query(TOURNAMENTS, "find tournament"))?
            .map(TournamentEntity::from))
    }

    async fn append_tournament_slot(
        &self,
        tournament_id: String,
        entry: GameSummaryEntity,
    ) -> MongoResult<SlotAppend> {
        let slots = self.collection::<Document>(TOURNAMENT_SLOTS).await;
        let game_id = entry.id.to_string();
        let slot_key = doc! { "tournament_id": tournament_id.clone(), "game_id": game_id.clone() };

        let existing = slots
            .find_one(slot_key.clone())
            .await
            .map_err(MongoDaoError::query(TOURNAMENT_SLOTS, "find slot"))?;
        if existing.is_some() {
            return Ok(SlotAppend::AlreadyRecorded);
        }

        let tournaments = self.collection::<TournamentDocument>(TOURNAMENTS).await;
        let claimed = tournaments
            .find_one_and_update(
                doc! {
                    "_id": tournament_id.clone(),
                    "$expr": {
                        "$lt": [
                            { "$ifNull": ["$buffered_games", 0] },
                            { "$multiply": ["$max_participants", "$games_per_player"] },
                        ]
                    },
                },
                doc! { "$inc": { "buffered_games": 1 } },
            )
            .return_document(ReturnDocument::Before)
            .await
            .map_err(MongoDaoError::query(TOURNAMENTS, "claim slot"))?;

        let Some(before) = claimed else {
            let known = tournaments
                .count_documents(doc! { "_id": tournament_id })
                .await
                .map_err(MongoDaoError::query(TOURNAMENTS, "count tournament"))?;
            return Ok(if known == 0 {
                SlotAppend::UnknownTournament
            } else {
                SlotAppend::Full
            });
        };
        let index = before.buffered_games.max(0);

        let mut slot = slot_key;
        slot.insert("index", index);
        slot.insert("game", summary_document(&entry));

        match slots.insert_one(slot).await {
            Ok(_) => Ok(SlotAppend::Appended {
                index: u32::try_from(index).unwrap_or(u32::MAX),
            }),
            Err(err) if is_duplicate_key(&err) => {
                // A concurrent replay stored this game first; hand the claimed slot back.
                tournaments
                    .update_one(
                        doc! { "_id": tournament_id },
                        doc! { "$inc": { "buffered_games": -1 } },
                    )
                    .await
                    .map_err(MongoDaoError::query(TOURNAMENTS, "release slot"))?;
                Ok(SlotAppend::AlreadyRecorded)
            }
            Err(source) => Err(MongoDaoError::query(TOURNAMENT_SLOTS, "insert slot")(source)),
        }
    }

    async fn upsert_participant_stats(
        &self,
        tournament_id: String,
        player_id: String,
        game_id: Uuid,
        result: PlayerResult,
    ) -> MongoResult<StatsOutcome> {
        let game_id = game_id.to_string();
        let (counter, zeroed) = stats_counters(result);
        let mut on_insert = doc! { "placement": Bson::Null };
        for field in zeroed {
            on_insert.insert(field, 0_i64);
        }
        let mut inc = Document::new();
        inc.insert(counter, 1_i64);

        let outcome = self
            .collection::<Document>(PARTICIPANT_STATS)
            .await
            .update_one(
                doc! {
                    "tournament_id": tournament_id,
                    "player_id": player_id,
                    "counted_games": { "$ne": game_id.clone() },
                },
                doc! {
                    "$inc": inc,
                    "$push": { "counted_games": game_id },
                    "$setOnInsert": on_insert,
                },
            )
            .upsert(true)
            .await;

        match outcome {
            Ok(_) => Ok(StatsOutcome::Applied),
            // The record exists and already counts this game, so the upsert collided.
            Err(err) if is_duplicate_key(&err) => Ok(StatsOutcome::AlreadyApplied),
            Err(source) => Err(MongoDaoError::query(PARTICIPANT_STATS, "upsert stats")(source)),
        }
    }

    async fn find_participant_stats(
        &self,
        tournament_id: String,
        player_id: String,
    ) -> MongoResult<Option<ParticipantStatsEntity>> {
        self.collection::<ParticipantStatsDocument>(PARTICIPANT_STATS)
            .await
            .find_one(doc! { "tournament_id": tournament_id, "player_id": player_id })
            .await
            .map_err(MongoDaoError::query(PARTICIPANT_STATS, "find stats"))?
            .map(ParticipantStatsEntity::try_from)
            .transpose()
    }

    async fn list_tournaments_to_finish(
        &self,
        now: SystemTime,
    ) -> MongoResult<Vec<TournamentEntity>> {
        let documents: Vec<TournamentDocument> = self
            .collection::<TournamentDocument>(TOURNAMENTS)
            .await
            .find(doc! {
                "status": "active",
                "finish_time": { "$lte": DateTime::from_system_time(now) },
            })
            .await
            .map_err(MongoDaoError::query(TOURNAMENTS, "list finishing"))?
            .try_collect()
            .await
            .map_err(MongoDaoError::query(TOURNAMENTS, "list finishing"))?;

        Ok(documents.into_iter().map(TournamentEntity::from).collect())
    }

    async fn mark_tournament_finished(&self, id: String) -> MongoResult<bool> {
        let result = self
            .collection::<Document>(TOURNAMENTS)
            .await
            .update_one(
                doc! { "_id": id, "status": "active" },
                doc! { "$set": { "status": "finished" } },
            )
            .await
            .map_err(MongoDaoError::query(TOURNAMENTS, "mark finished"))?;
        Ok(result.modified_count > 0)
    }
}

impl RecordStore for MongoRecordStore {
    fn save_game(&self, record: GameRecordEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_game(record).await.map_err(Into::into) })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameRecordEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_game(id).await.map_err(Into::into) })
    }

    fn find_player(&self, id: String) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_player(&id).await.map_err(Into::into) })
    }

    fn apply_player_game(
        &self,
        update: PlayerGameUpdate,
    ) -> BoxFuture<'static, StorageResult<PlayerUpdateOutcome>> {
        let store = self.clone();
        Box::pin(async move { store.apply_player_game(update).await.map_err(Into::into) })
    }

    fn find_tournament(
        &self,
        id: String,
    ) -> BoxFuture<'static, StorageResult<Option<TournamentEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_tournament(&id).await.map_err(Into::into) })
    }

    fn append_tournament_slot(
        &self,
        tournament_id: String,
        entry: GameSummaryEntity,
    ) -> BoxFuture<'static, StorageResult<SlotAppend>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .append_tournament_slot(tournament_id, entry)
                .await
                .map_err(Into::into)
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
            store
                .upsert_participant_stats(tournament_id, player_id, game_id, result)
                .await
                .map_err(Into::into)
        })
    }

    fn find_participant_stats(
        &self,
        tournament_id: String,
        player_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantStatsEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_participant_stats(tournament_id, player_id)
                .await
                .map_err(Into::into)
        })
    }

    fn list_tournaments_to_finish(
        &self,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<TournamentEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_tournaments_to_finish(now).await.map_err(Into::into) })
    }

    fn mark_tournament_finished(&self, id: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.mark_tournament_finished(id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
