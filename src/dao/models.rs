use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Time-control class a rating is tracked for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TimeClass {
    /// Games under three minutes.
    Bullet,
    /// Three to ten minute games.
    Blitz,
    /// Games of ten minutes or more.
    #[default]
    Rapid,
}

impl TimeClass {
    /// Stable lowercase label used in keys and documents.
    pub fn as_str(self) -> &'static str {
        match self {
            TimeClass::Bullet => "bullet",
            TimeClass::Blitz => "blitz",
            TimeClass::Rapid => "rapid",
        }
    }
}

/// Ratings of a player, one per time-control class.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RatingsEntity {
    /// Bullet rating.
    pub bullet: i32,
    /// Blitz rating.
    pub blitz: i32,
    /// Rapid rating.
    pub rapid: i32,
}

impl RatingsEntity {
    /// Rating for the given class.
    pub fn get(&self, class: TimeClass) -> i32 {
        match class {
            TimeClass::Bullet => self.bullet,
            TimeClass::Blitz => self.blitz,
            TimeClass::Rapid => self.rapid,
        }
    }

    /// Shift the rating of one class by `delta`, returning the new value.
    pub fn apply(&mut self, class: TimeClass, delta: i32) -> i32 {
        let slot = match class {
            TimeClass::Bullet => &mut self.bullet,
            TimeClass::Blitz => &mut self.blitz,
            TimeClass::Rapid => &mut self.rapid,
        };
        *slot += delta;
        *slot
    }
}

/// Result of a finished game from one participant's point of view.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlayerResult {
    /// The player won.
    Win,
    /// The player lost.
    Loss,
    /// Drawn game, stalemate included.
    Draw,
}

impl PlayerResult {
    /// Result seen by the other side of the board.
    pub fn reversed(self) -> Self {
        match self {
            PlayerResult::Win => PlayerResult::Loss,
            PlayerResult::Loss => PlayerResult::Win,
            PlayerResult::Draw => PlayerResult::Draw,
        }
    }
}

/// Compact summary of a finished game embedded in player and tournament documents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameSummaryEntity {
    /// Identifier of the full game record.
    pub id: Uuid,
    /// White player id.
    pub white: String,
    /// Black player id.
    pub black: String,
    /// Detected opening name.
    pub opening: Option<String>,
    /// Winner username, `None` for drawn games.
    pub winner: Option<String>,
    /// When the game ended.
    pub date: SystemTime,
}

/// Rating profile and rolling game history of a player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Username, used as the player identity handle.
    pub id: String,
    /// Current rating per time class.
    pub ratings: RatingsEntity,
    /// Fixed-capacity circular buffer; `None` marks an empty slot.
    pub games: Vec<Option<GameSummaryEntity>>,
    /// Next slot to overwrite once the buffer has no empty slot left.
    pub buffered_games: usize,
}

impl PlayerEntity {
    /// Fresh profile with an empty history.
    pub fn new(id: impl Into<String>, ratings: RatingsEntity) -> Self {
        Self {
            id: id.into(),
            ratings,
            games: Vec::new(),
            buffered_games: 0,
        }
    }

    /// Whether the history already carries the summary of `game_id`.
    pub fn has_game(&self, game_id: Uuid) -> bool {
        self.games.iter().flatten().any(|game| game.id == game_id)
    }
}

/// Pick the history slot for a new summary and the cursor value after the write.
///
/// The first empty slot below `capacity` wins and leaves the cursor untouched; when the buffer
/// is full the summary overwrites the slot under the cursor, which then advances modulo
/// `capacity`.
pub fn history_slot(
    games: &[Option<GameSummaryEntity>],
    cursor: usize,
    capacity: usize,
) -> (usize, usize) {
    let capacity = capacity.max(1);
    let empty = (0..capacity).find(|index| !matches!(games.get(*index), Some(Some(_))));

    match empty {
        Some(index) => (index, cursor % capacity),
        None => {
            let index = cursor % capacity;
            (index, (index + 1) % capacity)
        }
    }
}

/// Rating and history mutation applied to one player after a finished game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerGameUpdate {
    /// Player to update.
    pub player_id: String,
    /// Game the update comes from; applied at most once.
    pub game_id: Uuid,
    /// Rating moved by the update.
    pub time_class: TimeClass,
    /// Signed rating change.
    pub rating_delta: i32,
    /// Summary written into the history ring.
    pub summary: GameSummaryEntity,
    /// Size of the history ring.
    pub history_capacity: usize,
}

/// Outcome of [`PlayerGameUpdate`] once the store processed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerUpdateOutcome {
    /// Rating and history were written; carries the new rating.
    Applied { rating: i32 },
    /// The game was already recorded for this player; nothing changed.
    AlreadyApplied,
    /// No profile exists for the player.
    PlayerNotFound,
}

/// Durable record of a completed live game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameRecordEntity {
    /// Game id, shared with the live game.
    pub id: Uuid,
    /// White player id.
    pub white_player: String,
    /// Black player id.
    pub black_player: String,
    /// White rating before the game, when the profile exists.
    pub white_rating: Option<i32>,
    /// Black rating before the game, when the profile exists.
    pub black_rating: Option<i32>,
    /// Result from white's point of view.
    pub result_white: PlayerResult,
    /// Result from black's point of view.
    pub result_black: PlayerResult,
    /// SAN move list followed by the result token.
    pub moves: String,
    /// Detected opening name.
    pub opening: Option<String>,
    /// ECO code of the detected opening.
    pub eco: Option<String>,
    /// Time class the ratings were taken from.
    pub time_class: TimeClass,
    /// Tournament of the game, if any.
    pub tournament_id: Option<String>,
    /// Whether ratings were adjusted.
    pub rated: bool,
    /// When the game was finalized.
    pub end_time: SystemTime,
}

impl GameRecordEntity {
    /// Summary embedded in player histories and tournament slots.
    pub fn summarize(&self) -> GameSummaryEntity {
        let winner = match self.result_white {
            PlayerResult::Win => Some(self.white_player.clone()),
            PlayerResult::Loss => Some(self.black_player.clone()),
            PlayerResult::Draw => None,
        };

        GameSummaryEntity {
            id: self.id,
            white: self.white_player.clone(),
            black: self.black_player.clone(),
            opening: self.opening.clone(),
            winner,
            date: self.end_time,
        }
    }
}

/// Lifecycle status of a tournament.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TournamentStatus {
    /// Accepting subscriptions and games.
    Active,
    /// Closed by the scheduler.
    Finished,
}

/// Tournament document with its bounded game slot table cursor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TournamentEntity {
    /// Tournament id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Lifecycle status.
    pub status: TournamentStatus,
    /// When the scheduler closes the tournament.
    pub finish_time: SystemTime,
    /// Lowest rating allowed to subscribe.
    pub min_rating: i32,
    /// Highest rating allowed to subscribe.
    pub max_rating: i32,
    /// Subscriber cap.
    pub max_participants: u32,
    /// Games each participant is expected to play.
    pub games_per_player: u32,
    /// Time class of every game of the tournament.
    pub time_class: TimeClass,
    /// Number of slots already claimed; never exceeds [`TournamentEntity::capacity`].
    pub buffered_games: u32,
}

impl TournamentEntity {
    /// Size of the game slot table.
    pub fn capacity(&self) -> u32 {
        self.max_participants * self.games_per_player
    }
}

/// Outcome of appending a result to a tournament slot table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotAppend {
    /// Written at the given index.
    Appended { index: u32 },
    /// The game already occupies a slot.
    AlreadyRecorded,
    /// Every slot is taken; the result is not buffered.
    Full,
    /// No tournament with that id exists.
    UnknownTournament,
}

/// Per (player, tournament) counters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantStatsEntity {
    /// Tournament the counters belong to.
    pub tournament_id: String,
    /// Participant.
    pub player_id: String,
    /// Games won.
    pub wins: u32,
    /// Games drawn.
    pub draws: u32,
    /// Games lost.
    pub losses: u32,
    /// `None` until the final placement is decided.
    pub placement: Option<u32>,
    /// Games already counted, so replays do not double count.
    pub counted_games: Vec<Uuid>,
}

impl ParticipantStatsEntity {
    /// Zeroed, unranked stats for a first tournament game.
    pub fn new(tournament_id: impl Into<String>, player_id: impl Into<String>) -> Self {
        Self {
            tournament_id: tournament_id.into(),
            player_id: player_id.into(),
            wins: 0,
            draws: 0,
            losses: 0,
            placement: None,
            counted_games: Vec::new(),
        }
    }

    /// Count one result for `game_id`; returns `false` when it was already counted.
    pub fn record(&mut self, game_id: Uuid, result: PlayerResult) -> bool {
        if self.counted_games.contains(&game_id) {
            return false;
        }
        match result {
            PlayerResult::Win => self.wins += 1,
            PlayerResult::Draw => self.draws += 1,
            PlayerResult::Loss => self.losses += 1,
        }
        self.counted_games.push(game_id);
        true
    }
}

/// Outcome of a participant stats upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsOutcome {
    /// Counters updated for this game.
    Applied,
    /// The game was already counted.
    AlreadyApplied,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(n: u128) -> Option<GameSummaryEntity> {
        Some(GameSummaryEntity {
            id: Uuid::from_u128(n),
            white: "w".into(),
            black: "b".into(),
            opening: None,
            winner: None,
            date: SystemTime::UNIX_EPOCH,
        })
    }

    #[test]
    fn history_fills_empty_slots_first() {
        assert_eq!(history_slot(&[], 0, 3), (0, 0));
        assert_eq!(history_slot(&[summary(1)], 0, 3), (1, 0));
        assert_eq!(history_slot(&[summary(1), None, summary(3)], 2, 3), (1, 2));
    }

    #[test]
    fn history_wraps_around_when_full() {
        let full = vec![summary(1), summary(2), summary(3)];
        assert_eq!(history_slot(&full, 0, 3), (0, 1));
        assert_eq!(history_slot(&full, 2, 3), (2, 0));
    }

    #[test]
    fn stats_count_each_game_once() {
        let mut stats = ParticipantStatsEntity::new("t1", "alice");
        let game = Uuid::from_u128(7);
        assert!(stats.record(game, PlayerResult::Win));
        assert!(!stats.record(game, PlayerResult::Win));
        assert_eq!((stats.wins, stats.draws, stats.losses), (1, 0, 0));
        assert_eq!(stats.placement, None);
    }

    #[test]
    fn summary_has_no_winner_on_draw() {
        let record = GameRecordEntity {
            id: Uuid::from_u128(1),
            white_player: "alice".into(),
            black_player: "bob".into(),
            white_rating: Some(1500),
            black_rating: None,
            result_white: PlayerResult::Draw,
            result_black: PlayerResult::Draw,
            moves: "1/2-1/2".into(),
            opening: None,
            eco: None,
            time_class: TimeClass::Rapid,
            tournament_id: None,
            rated: true,
            end_time: SystemTime::UNIX_EPOCH,
        };
        assert_eq!(record.summarize().winner, None);
    }
}
