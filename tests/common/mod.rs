#![allow(dead_code)]

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use live_chess_back::{
    chess::ShakmatyRules,
    config::AppConfig,
    dao::{
        live_store::{LiveStore, keys::LiveKey, memory::MemoryLiveStore},
        models::{
            PlayerEntity, RatingsEntity, TimeClass, TournamentEntity, TournamentStatus,
        },
        record_store::memory::MemoryRecordStore,
    },
    dto::live_game::JoinRequest,
    services::matchmaking,
    state::{AppState, SharedState},
};
use uuid::Uuid;

pub struct Harness {
    pub state: SharedState,
    pub live: MemoryLiveStore,
    pub records: MemoryRecordStore,
}

/// Short timeouts so waiting paths finish quickly.
pub fn test_config() -> AppConfig {
    AppConfig {
        matchmaking_timeout_secs: 1,
        poll_interval_ms: 10,
        store_retry_delay_ms: 1,
        game_lock_ttl_ms: 1_000,
        ..AppConfig::default()
    }
}

pub async fn harness() -> Harness {
    harness_with(test_config()).await
}

pub async fn harness_with(config: AppConfig) -> Harness {
    let live = MemoryLiveStore::new();
    let records = MemoryRecordStore::new();
    let state = AppState::with_stores(
        config,
        Arc::new(live.clone()),
        Arc::new(records.clone()),
        Arc::new(ShakmatyRules),
    )
    .await;
    Harness {
        state,
        live,
        records,
    }
}

/// State without a record store, as right after startup.
pub fn degraded_harness() -> Harness {
    let live = MemoryLiveStore::new();
    let state = AppState::new(
        test_config(),
        Arc::new(live.clone()),
        Arc::new(ShakmatyRules),
    );
    Harness {
        state,
        live,
        records: MemoryRecordStore::new(),
    }
}

pub fn player(id: &str, rating: i32) -> PlayerEntity {
    PlayerEntity::new(
        id,
        RatingsEntity {
            bullet: rating,
            blitz: rating,
            rapid: rating,
        },
    )
}

pub fn tournament(id: &str, finishes_in: Duration) -> TournamentEntity {
    TournamentEntity {
        id: id.to_owned(),
        name: format!("Tournament {id}"),
        status: TournamentStatus::Active,
        finish_time: SystemTime::now() + finishes_in,
        min_rating: 1000,
        max_rating: 1500,
        max_participants: 2,
        games_per_player: 2,
        time_class: TimeClass::Blitz,
        buffered_games: 0,
    }
}

pub const DAYS: u64 = 86_400;

/// Wait until `player` sits in `queue`.
pub async fn until_queued(live: &MemoryLiveStore, queue: String, player: &str) {
    for _ in 0..200 {
        if live
            .list_contains(queue.clone(), player.to_owned())
            .await
            .unwrap()
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("{player} never reached the queue");
}

/// Pair `white` (queued first) with `black` through matchmaking and return the game id.
pub async fn pair(harness: &Harness, white: &str, black: &str, request: JoinRequest) -> Uuid {
    let queue = LiveKey::queue(request.tournament_id.as_deref());
    let state = harness.state.clone();
    let waiting_player = white.to_owned();
    let waiting_request = request.clone();
    let waiting = tokio::spawn(async move {
        matchmaking::join(&state, &waiting_player, waiting_request).await
    });

    until_queued(&harness.live, queue, white).await;
    let pairer = matchmaking::join(&harness.state, black, request)
        .await
        .unwrap();
    let waiter = waiting.await.unwrap().unwrap();

    assert!(pairer.matched && waiter.matched);
    assert_eq!(pairer.game_id, waiter.game_id);
    assert_eq!(pairer.white_player.as_deref(), Some(white));
    pairer.game_id.unwrap()
}
