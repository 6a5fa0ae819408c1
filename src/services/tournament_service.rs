use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::{
    dao::{
        live_store::keys::LiveKey,
        models::{TimeClass, TournamentEntity, TournamentStatus},
        storage::StorageError,
    },
    error::{GameError, ServiceError},
    state::SharedState,
};

/// Tournament facts cached in the live store for subscription checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LiveTournamentData {
    /// Lifecycle status.
    pub status: TournamentStatus,
    /// Lowest rating allowed to subscribe.
    pub min_rating: i32,
    /// Highest rating allowed to subscribe.
    pub max_rating: i32,
    /// Subscriber cap.
    pub max_participants: u32,
    /// Time class checked against subscriber ratings.
    pub time_class: TimeClass,
    /// Finish time as seconds since the Unix epoch.
    pub finish_time: u64,
}

impl From<&TournamentEntity> for LiveTournamentData {
    fn from(value: &TournamentEntity) -> Self {
        Self {
            status: value.status,
            min_rating: value.min_rating,
            max_rating: value.max_rating,
            max_participants: value.max_participants,
            time_class: value.time_class,
            finish_time: value
                .finish_time
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| elapsed.as_secs())
                .unwrap_or_default(),
        }
    }
}

impl LiveTournamentData {
    fn finishes_at(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(self.finish_time)
    }
}

/// Cache the live summary of a tournament.
pub async fn publish_live_data(
    state: &SharedState,
    tournament: &TournamentEntity,
) -> Result<LiveTournamentData, ServiceError> {
    let data = LiveTournamentData::from(tournament);
    let payload = serde_json::to_string(&data)?;
    state
        .live_store()
        .set(LiveKey::tournament_data(&tournament.id), payload)
        .await?;
    debug!(tournament_id = %tournament.id, "published live tournament data");
    Ok(data)
}

/// Cached tournament data, loaded from the record store on a cache miss.
async fn live_data(
    state: &SharedState,
    tournament_id: &str,
) -> Result<LiveTournamentData, ServiceError> {
    let key = LiveKey::tournament_data(tournament_id);
    if let Some(raw) = state.live_store().get(key.clone()).await? {
        return serde_json::from_str(&raw).map_err(|err| StorageError::corrupted(key, err).into());
    }

    let store = state.require_record_store().await?;
    let tournament = store
        .find_tournament(tournament_id.to_owned())
        .await?
        .ok_or(GameError::TournamentNotFound)?;
    publish_live_data(state, &tournament).await
}

fn ensure_window_open(state: &SharedState, data: &LiveTournamentData) -> Result<(), GameError> {
    if data.status != TournamentStatus::Active {
        return Err(GameError::SubscriptionClosed);
    }
    let closes_at = data
        .finishes_at()
        .checked_sub(state.config().subscription_close())
        .unwrap_or(UNIX_EPOCH);
    if SystemTime::now() > closes_at {
        return Err(GameError::SubscriptionClosed);
    }
    Ok(())
}

/// Whether `player` is subscribed to `tournament_id`.
pub async fn is_subscribed(
    state: &SharedState,
    tournament_id: &str,
    player: &str,
) -> Result<bool, ServiceError> {
    Ok(state
        .live_store()
        .set_is_member(
            LiveKey::tournament_subscribers(tournament_id),
            player.to_owned(),
        )
        .await?)
}

/// Subscribe `player`, enforcing the window, the rating range and the participant cap.
pub async fn subscribe(
    state: &SharedState,
    tournament_id: &str,
    player: &str,
) -> Result<(), ServiceError> {
    let data = live_data(state, tournament_id).await?;
    ensure_window_open(state, &data)?;

    let store = state.require_record_store().await?;
    let profile = store
        .find_player(player.to_owned())
        .await?
        .ok_or_else(|| GameError::PlayerNotFound(player.to_owned()))?;
    let rating = profile.ratings.get(data.time_class);
    if rating < data.min_rating || rating > data.max_rating {
        return Err(GameError::RatingOutOfRange {
            rating,
            min: data.min_rating,
            max: data.max_rating,
        }
        .into());
    }

    // Add first, then check the size, so concurrent subscribers cannot overshoot the cap.
    let live = state.live_store();
    let key = LiveKey::tournament_subscribers(tournament_id);
    if !live.set_add(key.clone(), player.to_owned()).await? {
        return Err(GameError::AlreadySubscribed.into());
    }
    if live.set_size(key.clone()).await? > u64::from(data.max_participants) {
        live.set_remove(key, player.to_owned()).await?;
        return Err(GameError::TournamentFull.into());
    }

    info!(tournament_id, player, "player subscribed to tournament");
    Ok(())
}

/// Withdraw a subscription; refused once the player started a tournament game.
pub async fn unsubscribe(
    state: &SharedState,
    tournament_id: &str,
    player: &str,
) -> Result<(), ServiceError> {
    let data = live_data(state, tournament_id).await?;
    ensure_window_open(state, &data)?;

    if !is_subscribed(state, tournament_id, player).await? {
        return Err(GameError::NotSubscribed.into());
    }

    let live = state.live_store();
    let played = live
        .get(LiveKey::tournament_player_games(tournament_id, player))
        .await?
        .and_then(|count| count.parse::<i64>().ok())
        .unwrap_or(0);
    if played > 0 {
        return Err(GameError::AlreadyPlayed.into());
    }

    live.set_remove(
        LiveKey::tournament_subscribers(tournament_id),
        player.to_owned(),
    )
    .await?;
    info!(tournament_id, player, "player unsubscribed from tournament");
    Ok(())
}

/// Reload a tournament from the record store and refresh its cached live data.
pub async fn publish(
    state: &SharedState,
    tournament_id: &str,
) -> Result<LiveTournamentData, ServiceError> {
    let store = state.require_record_store().await?;
    let tournament = store
        .find_tournament(tournament_id.to_owned())
        .await?
        .ok_or(GameError::TournamentNotFound)?;
    let data = publish_live_data(state, &tournament).await?;
    info!(tournament_id, status = ?data.status, "published tournament");
    Ok(data)
}
