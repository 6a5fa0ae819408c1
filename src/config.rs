//! Application-level configuration loading: matchmaking, live game and reconciliation tunables.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::dao::models::TimeClass;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "LIVE_CHESS_CONFIG_PATH";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
/// Immutable runtime configuration shared across the application.
///
/// Every key is optional in the JSON file; missing keys keep their default.
pub struct AppConfig {
    /// How long a join waits for an opponent before leaving the queue.
    pub matchmaking_timeout_secs: u64,
    /// Interval of the shared-store pointer check while waiting.
    pub poll_interval_ms: u64,
    /// Retention of live games and player pointers.
    pub game_ttl_hours: u64,
    /// Games a player may start per tournament.
    pub max_tournament_games: i64,
    /// Expiry of the per-tournament game counters.
    pub tournament_counter_ttl_days: u64,
    /// Opening detection stops once the move history is longer than this.
    pub opening_check_horizon: usize,
    /// Fixed rating delta applied to winner and loser.
    pub elo_change: i32,
    /// Capacity of each player's rolling game history.
    pub history_capacity: usize,
    /// Rating class used for casual games created without a type.
    pub default_time_class: TimeClass,
    /// Subscriptions close this many days before the tournament finishes.
    pub subscription_close_days: u64,
    /// Period of the tournament lifecycle sweep.
    pub tournament_sweep_secs: u64,
    /// Period of the pending finalization replay.
    pub finalize_sweep_secs: u64,
    /// Lifetime of a per-game mutation lock.
    pub game_lock_ttl_ms: u64,
    /// Attempts per reconciliation step before giving up.
    pub store_retry_attempts: u32,
    /// Initial backoff between reconciliation retries.
    pub store_retry_delay_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            matchmaking_timeout_secs: 60,
            poll_interval_ms: 500,
            game_ttl_hours: 24,
            max_tournament_games: 8,
            tournament_counter_ttl_days: 7,
            opening_check_horizon: 30,
            elo_change: 20,
            history_capacity: 50,
            default_time_class: TimeClass::Rapid,
            subscription_close_days: 6,
            tournament_sweep_secs: 86_400,
            finalize_sweep_secs: 60,
            game_lock_ttl_ms: 5_000,
            store_retry_attempts: 3,
            store_retry_delay_ms: 100,
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        timeout_secs = config.matchmaking_timeout_secs,
                        elo_change = config.elo_change,
                        "loaded configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// How long a join waits for an opponent.
    pub fn matchmaking_timeout(&self) -> Duration {
        Duration::from_secs(self.matchmaking_timeout_secs)
    }

    /// Pause between game pointer checks while waiting.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Expiry of live games and player pointers.
    pub fn game_ttl(&self) -> Duration {
        Duration::from_secs(self.game_ttl_hours * 3_600)
    }

    /// Expiry of per-tournament game counters.
    pub fn tournament_counter_ttl(&self) -> Duration {
        Duration::from_secs(self.tournament_counter_ttl_days * 86_400)
    }

    /// How long before the finish time subscriptions close.
    pub fn subscription_close(&self) -> Duration {
        Duration::from_secs(self.subscription_close_days * 86_400)
    }

    /// Period of the tournament sweep.
    pub fn tournament_sweep(&self) -> Duration {
        Duration::from_secs(self.tournament_sweep_secs.max(1))
    }

    /// Period of the finalization replay.
    pub fn finalize_sweep(&self) -> Duration {
        Duration::from_secs(self.finalize_sweep_secs.max(1))
    }

    /// Expiry of a per-game mutation lock.
    pub fn game_lock_ttl(&self) -> Duration {
        Duration::from_millis(self.game_lock_ttl_ms.max(1))
    }

    /// First backoff delay of retried store calls.
    pub fn store_retry_delay(&self) -> Duration {
        Duration::from_millis(self.store_retry_delay_ms)
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "elo_change": 16, "default_time_class": "blitz" }"#)
                .unwrap();
        assert_eq!(config.elo_change, 16);
        assert_eq!(config.default_time_class, TimeClass::Blitz);
        assert_eq!(config.matchmaking_timeout(), Duration::from_secs(60));
        assert_eq!(config.history_capacity, 50);
    }
}
