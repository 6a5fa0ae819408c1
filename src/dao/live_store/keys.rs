//! Live store key naming.
//!
//! Format: `chess:{entity}:{identifier}[:{field}]`. Keys are shared with other services
//! reading the same store, so they must not drift.

/// Key prefixes.
pub mod prefix {
    /// Namespace of every key.
    pub const ROOT: &str = "chess";
    /// Matchmaking queues.
    pub const MATCHMAKING: &str = "chess:matchmaking";
    /// Live games, locks and the pending-finalization set.
    pub const GAME: &str = "chess:game";
    /// Tournament subscribers, data and counters.
    pub const TOURNAMENT: &str = "chess:tournament";
}

/// Live store key builders.
pub struct LiveKey;

impl LiveKey {
    /// Global matchmaking queue: `chess:matchmaking:queue`.
    pub fn global_queue() -> String {
        format!("{}:queue", prefix::MATCHMAKING)
    }

    /// Tournament queue: `chess:matchmaking:tournament:{id}`.
    pub fn tournament_queue(tournament_id: &str) -> String {
        format!("{}:tournament:{}", prefix::MATCHMAKING, tournament_id)
    }

    /// Queue a join request lands in.
    pub fn queue(tournament_id: Option<&str>) -> String {
        match tournament_id {
            Some(id) => Self::tournament_queue(id),
            None => Self::global_queue(),
        }
    }

    /// Serialized live game: `chess:game:{id}`.
    pub fn game(game_id: &str) -> String {
        format!("{}:{}", prefix::GAME, game_id)
    }

    /// Short-lived mutation lock of a game: `chess:game:{id}:lock`.
    pub fn game_lock(game_id: &str) -> String {
        format!("{}:{}:lock", prefix::GAME, game_id)
    }

    /// Player to live game pointer: `chess:player:game:{player}`.
    pub fn player_game(player_id: &str) -> String {
        format!("{}:player:game:{}", prefix::ROOT, player_id)
    }

    /// Games a player started in a tournament: `chess:tournament:{t}:player:{p}:games`.
    pub fn tournament_player_games(tournament_id: &str, player_id: &str) -> String {
        format!(
            "{}:{}:player:{}:games",
            prefix::TOURNAMENT,
            tournament_id,
            player_id
        )
    }

    /// Pattern matching every per-player counter of a tournament.
    pub fn tournament_player_games_pattern(tournament_id: &str) -> String {
        format!("{}:{}:player:*:games", prefix::TOURNAMENT, tournament_id)
    }

    /// Subscribed players of a tournament: `chess:tournament:{t}:subscribers`.
    pub fn tournament_subscribers(tournament_id: &str) -> String {
        format!("{}:{}:subscribers", prefix::TOURNAMENT, tournament_id)
    }

    /// Live tournament summary: `chess:tournament:{t}:data`.
    pub fn tournament_data(tournament_id: &str) -> String {
        format!("{}:{}:data", prefix::TOURNAMENT, tournament_id)
    }

    /// Opening table keyed by normalized FEN: `chess:openings`.
    pub fn openings() -> String {
        format!("{}:openings", prefix::ROOT)
    }

    /// Games whose durable reconciliation has not completed: `chess:game:pending-finalize`.
    pub fn pending_finalize() -> String {
        format!("{}:pending-finalize", prefix::GAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_keys() {
        assert_eq!(LiveKey::queue(None), "chess:matchmaking:queue");
        assert_eq!(LiveKey::queue(Some("t9")), "chess:matchmaking:tournament:t9");
    }

    #[test]
    fn tournament_counter_matches_pattern_prefix() {
        let key = LiveKey::tournament_player_games("t1", "alice");
        assert_eq!(key, "chess:tournament:t1:player:alice:games");
        let pattern = LiveKey::tournament_player_games_pattern("t1");
        assert!(key.starts_with(pattern.trim_end_matches("*:games")));
    }
}
