use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    chess::RulesError,
    dao::{live_store::keys::LiveKey, storage::StorageError},
    dto::live_game::{GameStatusView, MoveResponse},
    error::{GameError, ServiceError},
    services::{opening_service, reconciliation},
    state::{
        SharedState,
        live_game::{GameEvent, InvalidTransition, LiveGameState, MoveOutcome},
    },
};

const LOCK_ATTEMPTS: u64 = 5;
const LOCK_BACKOFF_MS: u64 = 20;

/// Read a live game, `None` when it is unknown or expired.
pub async fn load_game(
    state: &SharedState,
    game_id: Uuid,
) -> Result<Option<LiveGameState>, ServiceError> {
    let key = LiveKey::game(&game_id.to_string());
    match state.live_store().get(key.clone()).await? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| StorageError::corrupted(key, err).into()),
        None => Ok(None),
    }
}

/// Write a live game back, refreshing its retention.
pub async fn store_game(state: &SharedState, game: &LiveGameState) -> Result<(), ServiceError> {
    let payload = serde_json::to_string(game)?;
    state
        .live_store()
        .set_ex(
            LiveKey::game(&game.game_id.to_string()),
            payload,
            state.config().game_ttl(),
        )
        .await?;
    Ok(())
}

struct GameLock {
    key: String,
    token: String,
}

/// Take the mutation lock of a game, giving up with [`ServiceError::Busy`].
async fn lock_game(state: &SharedState, game_id: Uuid) -> Result<GameLock, ServiceError> {
    let live = state.live_store();
    let key = LiveKey::game_lock(&game_id.to_string());
    let token = Uuid::new_v4().to_string();

    for attempt in 1..=LOCK_ATTEMPTS {
        if live
            .set_nx_ex(key.clone(), token.clone(), state.config().game_lock_ttl())
            .await?
        {
            return Ok(GameLock { key, token });
        }
        let jitter = rand::rng().random_range(0..LOCK_BACKOFF_MS);
        sleep(Duration::from_millis(LOCK_BACKOFF_MS * attempt + jitter)).await;
    }

    debug!(game_id = %game_id, "game lock still held; giving up");
    Err(ServiceError::Busy)
}

async fn unlock_game(state: &SharedState, lock: GameLock) {
    if let Err(err) = state
        .live_store()
        .delete_if_equals(lock.key, lock.token)
        .await
    {
        // The lock expires on its own.
        warn!(error = %err, "failed to release game lock");
    }
}

enum Action<'a> {
    Move { player: &'a str, mv: &'a str },
    Resign { player: &'a str },
}

fn rejected_transition(err: InvalidTransition) -> ServiceError {
    GameError::GameAlreadyEnded { status: err.from }.into()
}

/// Validate and apply a move to `game` without touching any store.
fn play(
    state: &SharedState,
    game: &mut LiveGameState,
    player: &str,
    mv: &str,
) -> Result<MoveOutcome, ServiceError> {
    let side = game.side_of(player).ok_or(GameError::NotParticipant)?;
    let turn = game.turn().ok_or_else(|| {
        ServiceError::Corrupted(format!("game {} has no side to move", game.game_id))
    })?;
    if side != turn {
        return Err(GameError::NotYourTurn {
            waiting_for: game.player(turn).to_owned(),
        }
        .into());
    }

    let mut board = state
        .rules()
        .load_position(&game.fen)
        .map_err(|err| ServiceError::Corrupted(err.to_string()))?;
    let fen = board.apply_move(mv).map_err(|err| match err {
        RulesError::InvalidNotation(mv) => GameError::InvalidMoveNotation(mv).into(),
        RulesError::IllegalMove(mv) => GameError::IllegalMove(mv).into(),
        RulesError::InvalidFen(fen) => ServiceError::Corrupted(format!("invalid position {fen}")),
    })?;

    let outcome = if board.is_mate() {
        MoveOutcome::Checkmate
    } else if board.is_stalemate() {
        MoveOutcome::Stalemate
    } else if board.is_draw() {
        MoveOutcome::Draw
    } else if board.is_check() {
        MoveOutcome::Check
    } else {
        MoveOutcome::MoveMade
    };

    game.apply(GameEvent::Moved {
        mv: mv.to_owned(),
        fen,
        outcome,
    })
    .map_err(rejected_transition)?;
    Ok(outcome)
}

/// Attach the opening reached by the current position, at most once per game.
async fn detect_opening(state: &SharedState, game: &mut LiveGameState) {
    if !game.wants_opening(state.config().opening_check_horizon) {
        return;
    }
    match opening_service::resolve(state, &game.fen).await {
        Ok(Some(opening)) => {
            if game.set_opening_once(opening.name, opening.eco) {
                debug!(game_id = %game.game_id, opening = ?game.detected_opening, "opening detected");
            }
        }
        Ok(None) => {}
        Err(err) => warn!(game_id = %game.game_id, error = %err, "opening lookup failed"),
    }
}

/// Load, transition and persist a game. Runs under the game lock.
async fn transition(
    state: &SharedState,
    game_id: Uuid,
    action: Action<'_>,
) -> Result<(LiveGameState, MoveOutcome), ServiceError> {
    let mut game = load_game(state, game_id)
        .await?
        .ok_or(GameError::GameNotFound)?;
    if game.status.is_terminal() {
        return Err(GameError::GameAlreadyEnded {
            status: game.status,
        }
        .into());
    }

    let outcome = match action {
        Action::Move { player, mv } => {
            let outcome = play(state, &mut game, player, mv)?;
            detect_opening(state, &mut game).await;
            outcome
        }
        Action::Resign { player } => {
            let side = game.side_of(player).ok_or(GameError::NotParticipant)?;
            game.apply(GameEvent::Resigned { side })
                .map_err(rejected_transition)?;
            MoveOutcome::Resigned
        }
    };

    if game.status.is_terminal() {
        // Marked before the terminal state is visible, so a crash leaves it replayable.
        state
            .live_store()
            .set_add(LiveKey::pending_finalize(), game_id.to_string())
            .await?;
    }
    store_game(state, &game).await?;
    Ok((game, outcome))
}

async fn run_locked(
    state: &SharedState,
    game_id: Uuid,
    action: Action<'_>,
) -> Result<MoveResponse, ServiceError> {
    let lock = lock_game(state, game_id).await?;
    let result = transition(state, game_id, action).await;
    unlock_game(state, lock).await;
    let (game, outcome) = result?;

    if !game.status.is_terminal() {
        return Ok(MoveResponse::applied(&game, outcome, None));
    }

    info!(game_id = %game_id, status = ?game.status, ?outcome, "game ended");
    let finalized = match reconciliation::finalize(state, &game).await {
        Ok(report) => report.is_complete(),
        Err(err) => {
            error!(game_id = %game_id, error = %err, "finalization failed; left for replay");
            false
        }
    };
    release_players(state, &game).await;

    Ok(MoveResponse::applied(&game, outcome, Some(finalized)))
}

/// Drop both player pointers that still reference `game`.
pub async fn release_players(state: &SharedState, game: &LiveGameState) {
    let live = state.live_store();
    for player in [&game.white_player, &game.black_player] {
        if let Err(err) = live
            .delete_if_equals(LiveKey::player_game(player), game.game_id.to_string())
            .await
        {
            warn!(game_id = %game.game_id, player = %player, error = %err, "failed to clear player game pointer");
        }
    }
}

/// Play `mv` for `player` in `game_id`.
pub async fn make_move(
    state: &SharedState,
    game_id: Uuid,
    player: &str,
    mv: &str,
) -> Result<MoveResponse, ServiceError> {
    run_locked(state, game_id, Action::Move { player, mv }).await
}

/// Resign on behalf of `player`; the opponent wins.
pub async fn resign(
    state: &SharedState,
    game_id: Uuid,
    player: &str,
) -> Result<MoveResponse, ServiceError> {
    run_locked(state, game_id, Action::Resign { player }).await
}

/// Read-only projection of a live game.
pub async fn get_status(state: &SharedState, game_id: Uuid) -> Result<GameStatusView, ServiceError> {
    let game = load_game(state, game_id)
        .await?
        .ok_or(GameError::GameNotFound)?;
    Ok(GameStatusView::from(&game))
}
