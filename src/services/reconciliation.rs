use std::{sync::Arc, time::SystemTime};

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    chess::START_FEN,
    dao::{
        live_store::keys::LiveKey,
        models::{
            GameRecordEntity, GameSummaryEntity, PlayerGameUpdate, PlayerResult,
            PlayerUpdateOutcome, SlotAppend, StatsOutcome, TimeClass,
        },
        record_store::RecordStore,
        storage::StorageResult,
    },
    error::ServiceError,
    services::retry::{RetryPolicy, with_retry},
    state::{SharedState, live_game::LiveGameState},
};

/// Outcome of the tournament leg of a finalization.
///
/// `None` in a field means the step failed after its retries and will be replayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TournamentLeg {
    /// Tournament the game belongs to.
    pub tournament_id: String,
    /// Outcome of buffering the game in the tournament slot table.
    pub slot: Option<SlotAppend>,
    /// Stats update of the white player.
    pub white_stats: Option<StatsOutcome>,
    /// Stats update of the black player.
    pub black_stats: Option<StatsOutcome>,
}

impl TournamentLeg {
    /// Whether every tournament step reached a final outcome.
    pub fn is_complete(&self) -> bool {
        self.slot.is_some() && self.white_stats.is_some() && self.black_stats.is_some()
    }
}

/// What a finalization run did for one game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeReport {
    /// Finalized game.
    pub game_id: Uuid,
    /// `false` when the record already existed from an earlier run.
    pub record_saved: bool,
    /// Rating and history update of the white player.
    pub white: PlayerUpdateOutcome,
    /// Rating and history update of the black player.
    pub black: PlayerUpdateOutcome,
    /// Tournament leg; `None` for casual games.
    pub tournament: Option<TournamentLeg>,
}

impl FinalizeReport {
    /// Whether every step is committed and the game can leave the pending set.
    pub fn is_complete(&self) -> bool {
        self.tournament
            .as_ref()
            .is_none_or(TournamentLeg::is_complete)
    }
}

fn rating_delta(result: PlayerResult, elo_change: i32) -> i32 {
    match result {
        PlayerResult::Win => elo_change,
        PlayerResult::Loss => -elo_change,
        PlayerResult::Draw => 0,
    }
}

/// SAN move list followed by the result token, or the raw UCI moves when rendering fails.
fn render_moves(state: &SharedState, game: &LiveGameState) -> String {
    let mut moves = match state.rules().render_san(START_FEN, &game.move_history) {
        Ok(san) => san,
        Err(err) => {
            warn!(game_id = %game.game_id, error = %err, "failed to render SAN; storing raw moves");
            game.move_history.clone()
        }
    };
    moves.push(game.status.result_token().to_owned());
    moves.join(" ")
}

/// Record a finished game: durable record, ratings and histories, then the tournament leg.
///
/// Every step is keyed by the game id, so running this twice for the same game changes
/// nothing the first run committed. Failures of the tournament leg are logged and reported
/// in [`FinalizeReport::tournament`] without undoing the rating update.
pub async fn finalize(
    state: &SharedState,
    game: &LiveGameState,
) -> Result<FinalizeReport, ServiceError> {
    let Some((white_result, black_result)) = game.status.results() else {
        return Err(ServiceError::InvalidInput(format!(
            "game {} is still in progress",
            game.game_id
        )));
    };
    let store = state.require_record_store().await?;
    let config = state.config();
    let policy = RetryPolicy::new(config.store_retry_attempts, config.store_retry_delay());

    let tournament = match &game.tournament_id {
        Some(id) => {
            let found = with_retry(policy, "find tournament", || store.find_tournament(id.clone()))
                .await?;
            if found.is_none() {
                warn!(game_id = %game.game_id, tournament_id = %id, "tournament of finished game not found");
            }
            found
        }
        None => None,
    };
    let time_class = game
        .game_type
        .or(tournament.as_ref().map(|t| t.time_class))
        .unwrap_or(config.default_time_class);

    let (record, record_saved) =
        match with_retry(policy, "find game", || store.find_game(game.game_id)).await? {
            Some(existing) => (existing, false),
            None => {
                let record = build_record(state, &store, policy, game, time_class).await?;
                with_retry(policy, "save game", || store.save_game(record.clone())).await?;
                (record, true)
            }
        };
    let summary = record.summarize();

    let mut outcomes = Vec::with_capacity(2);
    for (player, result) in [
        (&game.white_player, white_result),
        (&game.black_player, black_result),
    ] {
        let update = PlayerGameUpdate {
            player_id: player.clone(),
            game_id: game.game_id,
            time_class,
            rating_delta: rating_delta(result, config.elo_change),
            summary: summary.clone(),
            history_capacity: config.history_capacity,
        };
        let outcome =
            with_retry(policy, "update player", || store.apply_player_game(update.clone())).await?;
        if outcome == PlayerUpdateOutcome::PlayerNotFound {
            warn!(game_id = %game.game_id, player = %player, "no profile to update for player");
        }
        outcomes.push(outcome);
    }

    let tournament_leg = match &game.tournament_id {
        Some(tournament_id) => Some(
            tournament_leg(
                &store,
                policy,
                tournament_id,
                game,
                &summary,
                (white_result, black_result),
            )
            .await,
        ),
        None => None,
    };

    let report = FinalizeReport {
        game_id: game.game_id,
        record_saved,
        white: outcomes[0],
        black: outcomes[1],
        tournament: tournament_leg,
    };

    if report.is_complete() {
        if let Err(err) = state
            .live_store()
            .set_remove(LiveKey::pending_finalize(), game.game_id.to_string())
            .await
        {
            warn!(game_id = %game.game_id, error = %err, "failed to clear pending finalization marker");
        }
        info!(game_id = %game.game_id, status = ?game.status, "game finalized");
    } else {
        error!(game_id = %game.game_id, "game finalized partially; tournament leg will be replayed");
    }

    Ok(report)
}

async fn build_record(
    state: &SharedState,
    store: &Arc<dyn RecordStore>,
    policy: RetryPolicy,
    game: &LiveGameState,
    time_class: TimeClass,
) -> StorageResult<GameRecordEntity> {
    let (white_result, black_result) = game
        .status
        .results()
        .unwrap_or((PlayerResult::Draw, PlayerResult::Draw));
    let white = with_retry(policy, "find player", || {
        store.find_player(game.white_player.clone())
    })
    .await?;
    let black = with_retry(policy, "find player", || {
        store.find_player(game.black_player.clone())
    })
    .await?;

    Ok(GameRecordEntity {
        id: game.game_id,
        white_player: game.white_player.clone(),
        black_player: game.black_player.clone(),
        white_rating: white.map(|p| p.ratings.get(time_class)),
        black_rating: black.map(|p| p.ratings.get(time_class)),
        result_white: white_result,
        result_black: black_result,
        moves: render_moves(state, game),
        opening: game.detected_opening.clone(),
        eco: game.detected_opening_eco.clone(),
        time_class,
        tournament_id: game.tournament_id.clone(),
        rated: true,
        end_time: SystemTime::now(),
    })
}

async fn tournament_leg(
    store: &Arc<dyn RecordStore>,
    policy: RetryPolicy,
    tournament_id: &str,
    game: &LiveGameState,
    summary: &GameSummaryEntity,
    (white_result, black_result): (PlayerResult, PlayerResult),
) -> TournamentLeg {
    let slot = match with_retry(policy, "append tournament slot", || {
        store.append_tournament_slot(tournament_id.to_owned(), summary.clone())
    })
    .await
    {
        Ok(SlotAppend::Full) => {
            info!(game_id = %game.game_id, tournament_id, "tournament game buffer already full");
            Some(SlotAppend::Full)
        }
        Ok(SlotAppend::UnknownTournament) => {
            error!(game_id = %game.game_id, tournament_id, "game points to an unknown tournament; result not buffered");
            Some(SlotAppend::UnknownTournament)
        }
        Ok(slot) => Some(slot),
        Err(err) => {
            error!(game_id = %game.game_id, tournament_id, error = %err, "failed to append tournament game slot");
            None
        }
    };

    let mut stats = [None, None];
    for (index, (player, result)) in [
        (&game.white_player, white_result),
        (&game.black_player, black_result),
    ]
    .into_iter()
    .enumerate()
    {
        stats[index] = match with_retry(policy, "upsert participant stats", || {
            store.upsert_participant_stats(
                tournament_id.to_owned(),
                player.clone(),
                game.game_id,
                result,
            )
        })
        .await
        {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                error!(game_id = %game.game_id, tournament_id, player = %player, error = %err, "failed to update participant stats");
                None
            }
        };
    }

    TournamentLeg {
        tournament_id: tournament_id.to_owned(),
        slot,
        white_stats: stats[0],
        black_stats: stats[1],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draws_leave_ratings_untouched() {
        assert_eq!(rating_delta(PlayerResult::Win, 20), 20);
        assert_eq!(rating_delta(PlayerResult::Loss, 20), -20);
        assert_eq!(rating_delta(PlayerResult::Draw, 20), 0);
    }

    #[test]
    fn report_without_tournament_is_complete() {
        let report = FinalizeReport {
            game_id: Uuid::nil(),
            record_saved: true,
            white: PlayerUpdateOutcome::Applied { rating: 1220 },
            black: PlayerUpdateOutcome::Applied { rating: 1180 },
            tournament: None,
        };
        assert!(report.is_complete());

        let partial = FinalizeReport {
            tournament: Some(TournamentLeg {
                tournament_id: "t1".into(),
                slot: Some(SlotAppend::Full),
                white_stats: None,
                black_stats: Some(StatsOutcome::Applied),
            }),
            ..report
        };
        assert!(!partial.is_complete());
    }
}
