//! Queue-based pairing of players into live games.
//!
//! A join first tries to claim a waiting opponent atomically; when the queue holds nobody
//! else the caller is enqueued and parks until a pairer wakes it, the configured timeout
//! expires, or the player leaves. Parked callers also poll their shared-store game pointer
//! so pairings made by another node are seen.

use std::{sync::Arc, time::Duration};

use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        live_store::{QueueClaim, keys::LiveKey},
        models::TimeClass,
    },
    dto::live_game::{JoinRequest, LeaveResponse, MatchmakingResponse},
    error::{GameError, ServiceError},
    services::{live_game_service, tournament_service},
    state::{SharedState, Waiter, live_game::LiveGameState},
};

/// How long an evicted waiter keeps looking for a pairing that raced its eviction.
const EVICTION_GRACE: Duration = Duration::from_secs(1);

/// In-progress game `player` currently points to, ignoring stale or finished pointers.
pub async fn active_game(
    state: &SharedState,
    player: &str,
) -> Result<Option<LiveGameState>, ServiceError> {
    let Some(pointer) = state.live_store().get(LiveKey::player_game(player)).await? else {
        return Ok(None);
    };
    let Ok(game_id) = Uuid::parse_str(&pointer) else {
        warn!(player, pointer = %pointer, "ignoring malformed game pointer");
        return Ok(None);
    };

    Ok(live_game_service::load_game(state, game_id)
        .await?
        .filter(|game| !game.status.is_terminal()))
}

async fn tournament_games_played(
    state: &SharedState,
    tournament_id: &str,
    player: &str,
) -> Result<i64, ServiceError> {
    Ok(state
        .live_store()
        .get(LiveKey::tournament_player_games(tournament_id, player))
        .await?
        .and_then(|count| count.parse::<i64>().ok())
        .unwrap_or(0))
}

async fn ensure_can_play(
    state: &SharedState,
    tournament_id: &str,
    player: &str,
) -> Result<(), ServiceError> {
    if !tournament_service::is_subscribed(state, tournament_id, player).await? {
        return Err(GameError::NotSubscribed.into());
    }
    let limit = state.config().max_tournament_games;
    if tournament_games_played(state, tournament_id, player).await? >= limit {
        return Err(GameError::CapacityReached { limit }.into());
    }
    Ok(())
}

/// Join the open pool or a tournament queue and wait for an opponent.
pub async fn join(
    state: &SharedState,
    player: &str,
    request: JoinRequest,
) -> Result<MatchmakingResponse, ServiceError> {
    let tournament_id = request.tournament_id.as_deref();

    if active_game(state, player).await?.is_some() {
        return Err(GameError::AlreadyInGame.into());
    }
    if let Some(tournament_id) = tournament_id {
        ensure_can_play(state, tournament_id, player).await?;
    }

    // Registered before the enqueue so a pairer can never wake an absent waiter.
    let waiter = state.notifier().register(player);
    let mut ticket = QueueTicket::new(state, player, LiveKey::queue(tournament_id));
    let result = pair_or_wait(state, player, tournament_id, request.time_class, &waiter).await;
    if result.is_ok() {
        ticket.settle();
    }
    result
}

/// Cleanup owed by a `join` that may have left its player in the queue.
///
/// Dropping an unsettled ticket, as happens when the request future is cancelled, evicts the
/// player in a background task. The waiter is released in every case.
struct QueueTicket {
    state: SharedState,
    player: String,
    queue: String,
    settled: bool,
}

impl QueueTicket {
    fn new(state: &SharedState, player: &str, queue: String) -> Self {
        Self {
            state: state.clone(),
            player: player.to_owned(),
            queue,
            settled: false,
        }
    }

    /// The join finished and already left the queue consistent.
    fn settle(&mut self) {
        self.settled = true;
    }
}

impl Drop for QueueTicket {
    fn drop(&mut self) {
        self.state.notifier().release(&self.player);
        if self.settled {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(player = %self.player, "no runtime to evict abandoned queue ticket");
            return;
        };
        let live = self.state.live_store();
        let queue = std::mem::take(&mut self.queue);
        let player = std::mem::take(&mut self.player);
        runtime.spawn(async move {
            match live.list_remove(queue.clone(), player.clone()).await {
                Ok(0) => {}
                Ok(_) => info!(player = %player, queue = %queue, "evicted abandoned queue ticket"),
                Err(err) => {
                    warn!(player = %player, queue = %queue, error = %err, "failed to evict abandoned queue ticket")
                }
            }
        });
    }
}

async fn pair_or_wait(
    state: &SharedState,
    player: &str,
    tournament_id: Option<&str>,
    time_class: Option<TimeClass>,
    waiter: &Arc<Waiter>,
) -> Result<MatchmakingResponse, ServiceError> {
    let queue = LiveKey::queue(tournament_id);
    let live = state.live_store();

    loop {
        match live
            .take_or_enqueue(queue.clone(), player.to_owned())
            .await?
        {
            QueueClaim::Paired(opponent) => {
                if let Some(game) =
                    start_game(state, &opponent, player, tournament_id, time_class).await?
                {
                    return Ok(MatchmakingResponse::matched(&game, player));
                }
            }
            QueueClaim::Enqueued | QueueClaim::AlreadyQueued => {
                debug!(player, queue = %queue, "waiting for an opponent");
                return wait_for_opponent(state, player, &queue, tournament_id, waiter).await;
            }
        }
    }
}

/// Create the game between the popped `white` and the caller `black`.
///
/// Returns `None` when `white` already started another game; it is dropped from the queue.
async fn start_game(
    state: &SharedState,
    white: &str,
    black: &str,
    tournament_id: Option<&str>,
    time_class: Option<TimeClass>,
) -> Result<Option<LiveGameState>, ServiceError> {
    if active_game(state, white).await?.is_some() {
        info!(player = white, "skipping queued player already in a game");
        return Ok(None);
    }

    let game = LiveGameState::new(
        Uuid::new_v4(),
        white,
        black,
        tournament_id.map(str::to_owned),
        time_class,
    );
    live_game_service::store_game(state, &game).await?;

    let live = state.live_store();
    let config = state.config();
    let game_id = game.game_id.to_string();
    for player in [white, black] {
        live.set_ex(LiveKey::player_game(player), game_id.clone(), config.game_ttl())
            .await?;
    }
    if let Some(tournament_id) = tournament_id {
        for player in [white, black] {
            live.incr_with_expiry(
                LiveKey::tournament_player_games(tournament_id, player),
                config.tournament_counter_ttl(),
            )
            .await?;
        }
    }

    state.notifier().notify(white);
    info!(game_id = %game.game_id, white, black, tournament_id, "players matched");
    Ok(Some(game))
}

async fn wait_for_opponent(
    state: &SharedState,
    player: &str,
    queue: &str,
    tournament_id: Option<&str>,
    waiter: &Arc<Waiter>,
) -> Result<MatchmakingResponse, ServiceError> {
    let config = state.config();
    let deadline = Instant::now() + config.matchmaking_timeout();
    let poll = config.poll_interval();

    loop {
        if let Some(game) = active_game(state, player).await? {
            return Ok(MatchmakingResponse::matched(&game, player));
        }
        if waiter.has_left() {
            info!(player, "player left the queue while waiting");
            return Ok(MatchmakingResponse::left(tournament_id.map(str::to_owned)));
        }

        let now = Instant::now();
        if now >= deadline {
            break;
        }
        tokio::select! {
            _ = waiter.notified() => {}
            _ = sleep(poll.min(deadline - now)) => {}
        }
    }

    let removed = state
        .live_store()
        .list_remove(queue.to_owned(), player.to_owned())
        .await?;
    if removed == 0 {
        // Someone popped us before the eviction; give the pairer time to write the pointer.
        let grace = Instant::now() + EVICTION_GRACE;
        while Instant::now() < grace {
            if let Some(game) = active_game(state, player).await? {
                return Ok(MatchmakingResponse::matched(&game, player));
            }
            sleep(poll.min(Duration::from_millis(50))).await;
        }
    }
    if let Some(game) = active_game(state, player).await? {
        return Ok(MatchmakingResponse::matched(&game, player));
    }

    info!(player, queue, "matchmaking timed out; player removed from queue");
    Ok(MatchmakingResponse::timed_out(
        tournament_id.map(str::to_owned),
    ))
}

/// Remove `player` from the queue; succeeds whether or not it was queued.
pub async fn leave(
    state: &SharedState,
    player: &str,
    tournament_id: Option<&str>,
) -> Result<LeaveResponse, ServiceError> {
    let removed = state
        .live_store()
        .list_remove(LiveKey::queue(tournament_id), player.to_owned())
        .await?
        > 0;
    state.notifier().leave(player);

    if removed {
        info!(player, tournament_id, "player left matchmaking");
    }
    Ok(LeaveResponse {
        removed,
        message: if removed {
            "Removed from queue.".to_owned()
        } else {
            "Not in queue.".to_owned()
        },
    })
}
