use std::time::SystemTime;

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    dao::live_store::keys::LiveKey,
    error::ServiceError,
    services::{live_game_service, reconciliation},
    state::SharedState,
};

/// Close every active tournament whose finish time passed and drop its transient keys.
///
/// Games already running in a closed tournament finish normally; new joins fail because the
/// subscriber set is gone.
pub async fn sweep_tournaments(state: &SharedState) -> Result<usize, ServiceError> {
    let store = state.require_record_store().await?;
    let due = store.list_tournaments_to_finish(SystemTime::now()).await?;
    let mut finished = 0;

    for tournament in due {
        match store.mark_tournament_finished(tournament.id.clone()).await {
            Ok(true) => finished += 1,
            Ok(false) => debug!(tournament_id = %tournament.id, "tournament already finished"),
            Err(err) => {
                error!(tournament_id = %tournament.id, error = %err, "failed to finish tournament");
                continue;
            }
        }

        match clear_tournament_keys(state, &tournament.id).await {
            Ok(removed) => info!(tournament_id = %tournament.id, removed, "tournament finished"),
            Err(err) => {
                warn!(tournament_id = %tournament.id, error = %err, "failed to clear tournament keys")
            }
        }
    }

    Ok(finished)
}

async fn clear_tournament_keys(state: &SharedState, tournament_id: &str) -> Result<u64, ServiceError> {
    let live = state.live_store();
    let mut keys = vec![
        LiveKey::tournament_subscribers(tournament_id),
        LiveKey::tournament_data(tournament_id),
        LiveKey::tournament_queue(tournament_id),
    ];
    keys.extend(
        live.scan_keys(LiveKey::tournament_player_games_pattern(tournament_id))
            .await?,
    );
    Ok(live.delete(keys).await?)
}

/// Re-run reconciliation for finished games whose finalization did not complete.
pub async fn replay_pending_finalizations(state: &SharedState) -> Result<usize, ServiceError> {
    let live = state.live_store();
    let pending = live.set_members(LiveKey::pending_finalize()).await?;
    let mut completed = 0;

    for id in pending {
        let game = match Uuid::parse_str(&id) {
            Ok(game_id) => live_game_service::load_game(state, game_id).await,
            Err(_) => Ok(None),
        };

        match game {
            Ok(Some(game)) if game.status.is_terminal() => {
                match reconciliation::finalize(state, &game).await {
                    Ok(report) if report.is_complete() => {
                        live_game_service::release_players(state, &game).await;
                        completed += 1;
                        continue;
                    }
                    Ok(_) => {}
                    Err(err) => warn!(game_id = %id, error = %err, "finalization replay failed"),
                }
                // Keep the game readable until a later replay completes it.
                if let Err(err) = live_game_service::store_game(state, &game).await {
                    warn!(game_id = %id, error = %err, "failed to refresh pending game expiry");
                }
            }
            Ok(_) => {
                error!(game_id = %id, "pending game is gone or still running; dropping marker");
                live.set_remove(LiveKey::pending_finalize(), id).await?;
            }
            Err(err) => warn!(game_id = %id, error = %err, "failed to load pending game"),
        }
    }

    Ok(completed)
}

/// Run the tournament sweep on its configured period.
pub async fn run_tournament_sweeps(state: SharedState) {
    let mut ticker = interval(state.config().tournament_sweep());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match sweep_tournaments(&state).await {
            Ok(0) => debug!("no tournament to finish"),
            Ok(finished) => info!(finished, "tournament sweep done"),
            Err(ServiceError::Degraded) => debug!("tournament sweep skipped (degraded mode)"),
            Err(err) => warn!(error = %err, "tournament sweep failed"),
        }
    }
}

/// Replay pending finalizations on their configured period.
pub async fn run_finalization_replays(state: SharedState) {
    let mut ticker = interval(state.config().finalize_sweep());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match replay_pending_finalizations(&state).await {
            Ok(0) => {}
            Ok(completed) => info!(completed, "replayed pending finalizations"),
            Err(err) => warn!(error = %err, "finalization replay sweep failed"),
        }
    }
}
