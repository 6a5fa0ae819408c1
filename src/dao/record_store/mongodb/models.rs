use mongodb::bson::{Bson, DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{MongoDaoError, MongoResult};
use crate::dao::models::{
    GameRecordEntity, GameSummaryEntity, ParticipantStatsEntity, PlayerEntity, PlayerResult,
    RatingsEntity, TimeClass, TournamentEntity, TournamentStatus,
};

pub const GAMES: &str = "games";
pub const PLAYERS: &str = "players";
pub const TOURNAMENTS: &str = "tournaments";
pub const TOURNAMENT_SLOTS: &str = "tournament_slots";
pub const PARTICIPANT_STATS: &str = "participant_stats";

fn parse_uuid(collection: &'static str, owner: &str, raw: &str) -> MongoResult<Uuid> {
    Uuid::parse_str(raw).map_err(|err| MongoDaoError::Decode {
        collection,
        id: owner.to_owned(),
        message: err.to_string(),
    })
}

fn optional_string(value: &Option<String>) -> Bson {
    match value {
        Some(value) => Bson::String(value.clone()),
        None => Bson::Null,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryDocument {
    id: String,
    white: String,
    black: String,
    #[serde(default)]
    opening: Option<String>,
    #[serde(default)]
    winner: Option<String>,
    date: DateTime,
}

impl SummaryDocument {
    fn into_entity(self, collection: &'static str, owner: &str) -> MongoResult<GameSummaryEntity> {
        Ok(GameSummaryEntity {
            id: parse_uuid(collection, owner, &self.id)?,
            white: self.white,
            black: self.black,
            opening: self.opening,
            winner: self.winner,
            date: self.date.to_system_time(),
        })
    }
}

/// Embedded summary as written by `$set` updates.
pub fn summary_document(summary: &GameSummaryEntity) -> Document {
    doc! {
        "id": summary.id.to_string(),
        "white": summary.white.clone(),
        "black": summary.black.clone(),
        "opening": optional_string(&summary.opening),
        "winner": optional_string(&summary.winner),
        "date": DateTime::from_system_time(summary.date),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingsDocument {
    bullet: i32,
    blitz: i32,
    rapid: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerDocument {
    #[serde(rename = "_id")]
    id: String,
    ratings: RatingsDocument,
    #[serde(default)]
    games: Vec<Option<SummaryDocument>>,
    #[serde(default)]
    buffered_games: i64,
}

impl TryFrom<PlayerDocument> for PlayerEntity {
    type Error = MongoDaoError;

    fn try_from(value: PlayerDocument) -> MongoResult<Self> {
        let games = value
            .games
            .into_iter()
            .map(|slot| {
                slot.map(|summary| summary.into_entity(PLAYERS, &value.id))
                    .transpose()
            })
            .collect::<MongoResult<Vec<_>>>()?;

        Ok(PlayerEntity {
            ratings: RatingsEntity {
                bullet: value.ratings.bullet,
                blitz: value.ratings.blitz,
                rapid: value.ratings.rapid,
            },
            games,
            buffered_games: usize::try_from(value.buffered_games.max(0)).unwrap_or_default(),
            id: value.id,
        })
    }
}

fn result_label(result: PlayerResult) -> &'static str {
    match result {
        PlayerResult::Win => "win",
        PlayerResult::Loss => "loss",
        PlayerResult::Draw => "draw",
    }
}

/// Game record as stored; the `_id` is the game id in its string form.
pub fn game_document(record: &GameRecordEntity) -> Document {
    doc! {
        "_id": record.id.to_string(),
        "white_player": record.white_player.clone(),
        "black_player": record.black_player.clone(),
        "white_rating": record.white_rating.map(Bson::Int32).unwrap_or(Bson::Null),
        "black_rating": record.black_rating.map(Bson::Int32).unwrap_or(Bson::Null),
        "result_white": result_label(record.result_white),
        "result_black": result_label(record.result_black),
        "moves": record.moves.clone(),
        "opening": optional_string(&record.opening),
        "eco": optional_string(&record.eco),
        "time_class": record.time_class.as_str(),
        "tournament_id": optional_string(&record.tournament_id),
        "rated": record.rated,
        "end_time": DateTime::from_system_time(record.end_time),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameDocument {
    #[serde(rename = "_id")]
    id: String,
    white_player: String,
    black_player: String,
    #[serde(default)]
    white_rating: Option<i32>,
    #[serde(default)]
    black_rating: Option<i32>,
    result_white: PlayerResult,
    result_black: PlayerResult,
    moves: String,
    #[serde(default)]
    opening: Option<String>,
    #[serde(default)]
    eco: Option<String>,
    time_class: TimeClass,
    #[serde(default)]
    tournament_id: Option<String>,
    rated: bool,
    end_time: DateTime,
}

impl TryFrom<GameDocument> for GameRecordEntity {
    type Error = MongoDaoError;

    fn try_from(value: GameDocument) -> MongoResult<Self> {
        Ok(GameRecordEntity {
            id: parse_uuid(GAMES, &value.id, &value.id)?,
            white_player: value.white_player,
            black_player: value.black_player,
            white_rating: value.white_rating,
            black_rating: value.black_rating,
            result_white: value.result_white,
            result_black: value.result_black,
            moves: value.moves,
            opening: value.opening,
            eco: value.eco,
            time_class: value.time_class,
            tournament_id: value.tournament_id,
            rated: value.rated,
            end_time: value.end_time.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentDocument {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    status: TournamentStatus,
    finish_time: DateTime,
    min_rating: i32,
    max_rating: i32,
    max_participants: i64,
    games_per_player: i64,
    #[serde(default)]
    time_class: TimeClass,
    #[serde(default)]
    pub buffered_games: i64,
}

fn to_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

impl From<TournamentDocument> for TournamentEntity {
    fn from(value: TournamentDocument) -> Self {
        TournamentEntity {
            id: value.id,
            name: value.name,
            status: value.status,
            finish_time: value.finish_time.to_system_time(),
            min_rating: value.min_rating,
            max_rating: value.max_rating,
            max_participants: to_u32(value.max_participants),
            games_per_player: to_u32(value.games_per_player),
            time_class: value.time_class,
            buffered_games: to_u32(value.buffered_games),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantStatsDocument {
    tournament_id: String,
    player_id: String,
    #[serde(default)]
    wins: i64,
    #[serde(default)]
    draws: i64,
    #[serde(default)]
    losses: i64,
    #[serde(default)]
    placement: Option<i64>,
    #[serde(default)]
    counted_games: Vec<String>,
}

impl TryFrom<ParticipantStatsDocument> for ParticipantStatsEntity {
    type Error = MongoDaoError;

    fn try_from(value: ParticipantStatsDocument) -> MongoResult<Self> {
        let owner = format!("{}:{}", value.tournament_id, value.player_id);
        let counted_games = value
            .counted_games
            .iter()
            .map(|raw| parse_uuid(PARTICIPANT_STATS, &owner, raw))
            .collect::<MongoResult<Vec<_>>>()?;

        Ok(ParticipantStatsEntity {
            tournament_id: value.tournament_id,
            player_id: value.player_id,
            wins: to_u32(value.wins),
            draws: to_u32(value.draws),
            losses: to_u32(value.losses),
            placement: value.placement.map(to_u32),
            counted_games,
        })
    }
}

/// Counter incremented for a result and the two left at zero on insert.
pub fn stats_counters(result: PlayerResult) -> (&'static str, [&'static str; 2]) {
    match result {
        PlayerResult::Win => ("wins", ["draws", "losses"]),
        PlayerResult::Draw => ("draws", ["wins", "losses"]),
        PlayerResult::Loss => ("losses", ["wins", "draws"]),
    }
}
