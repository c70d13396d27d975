use game_core::{LifecycleSettings, DEFAULT_MIN_PLAYERS};
use game_persistence::DEFAULT_DATABASE_URL;
use game_types::GameSettings;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid {name}: {value:?}")]
    Unparseable { name: &'static str, value: String },
    #[error("Invalid {name}: {reason}")]
    OutOfRange { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub topics_directory: String,
    /// How often open rounds are checked for their close condition
    pub tick_interval: Duration,
    /// Defaults for games created without explicit settings
    pub game_settings: GameSettings,
    pub lifecycle: LifecycleSettings,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any key lookup; unset keys fall back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = GameSettings::default();
        let lifecycle_defaults = LifecycleSettings::default();

        let tick_interval_ms: u64 = parse_or(&lookup, "TICK_INTERVAL_MS", 1000)?;
        let config = Self {
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            topics_directory: lookup("TOPICS_DIRECTORY").unwrap_or_else(|| "./topics".to_string()),
            tick_interval: Duration::from_millis(tick_interval_ms),
            game_settings: GameSettings {
                round_count: parse_or(&lookup, "ROUND_COUNT", defaults.round_count)?,
                time_per_round_secs: parse_or(
                    &lookup,
                    "TIME_PER_ROUND_SECONDS",
                    defaults.time_per_round_secs,
                )?,
                max_players: parse_or(&lookup, "MAX_PLAYERS_PER_GAME", defaults.max_players)?,
            },
            lifecycle: LifecycleSettings {
                min_players: parse_or(&lookup, "MIN_PLAYERS_TO_START", lifecycle_defaults.min_players)?,
                max_words_per_round: parse_or(
                    &lookup,
                    "MAX_WORDS_PER_ROUND",
                    lifecycle_defaults.max_words_per_round,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval.is_zero() {
            return Err(out_of_range("TICK_INTERVAL_MS", "must be positive"));
        }
        if self.game_settings.round_count < 1 {
            return Err(out_of_range("ROUND_COUNT", "must be at least 1"));
        }
        if self.game_settings.time_per_round_secs < 1 {
            return Err(out_of_range("TIME_PER_ROUND_SECONDS", "must be at least 1"));
        }
        if self.game_settings.max_players < 2 {
            return Err(out_of_range("MAX_PLAYERS_PER_GAME", "must be at least 2"));
        }
        if self.lifecycle.min_players < DEFAULT_MIN_PLAYERS
            || self.lifecycle.min_players > self.game_settings.max_players as usize
        {
            return Err(out_of_range(
                "MIN_PLAYERS_TO_START",
                "must be between 2 and MAX_PLAYERS_PER_GAME",
            ));
        }
        if self.lifecycle.max_words_per_round < 1 {
            return Err(out_of_range("MAX_WORDS_PER_ROUND", "must be at least 1"));
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Unparseable { name, value }),
        None => Ok(default),
    }
}

fn out_of_range(name: &'static str, reason: &str) -> ConfigError {
    ConfigError::OutOfRange {
        name,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.topics_directory, "./topics");
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.game_settings, GameSettings::default());
        assert_eq!(config.lifecycle.min_players, 2);
        assert_eq!(config.lifecycle.max_words_per_round, 5);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("ROUND_COUNT", "3"),
            ("TIME_PER_ROUND_SECONDS", " 45 "),
            ("MIN_PLAYERS_TO_START", "3"),
            ("TICK_INTERVAL_MS", "250"),
        ])
        .unwrap();
        assert_eq!(config.game_settings.round_count, 3);
        assert_eq!(config.game_settings.time_per_round_secs, 45);
        assert_eq!(config.lifecycle.min_players, 3);
        assert_eq!(config.tick_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            config_from(&[("ROUND_COUNT", "five")]),
            Err(ConfigError::Unparseable { name: "ROUND_COUNT", .. })
        ));
        assert!(matches!(
            config_from(&[("TICK_INTERVAL_MS", "0")]),
            Err(ConfigError::OutOfRange { name: "TICK_INTERVAL_MS", .. })
        ));
        assert!(matches!(
            config_from(&[("MIN_PLAYERS_TO_START", "9")]),
            Err(ConfigError::OutOfRange { name: "MIN_PLAYERS_TO_START", .. })
        ));
    }

    #[test]
    fn test_single_player_games_are_rejected() {
        for value in ["0", "1"] {
            assert!(matches!(
                config_from(&[("MIN_PLAYERS_TO_START", value)]),
                Err(ConfigError::OutOfRange { name: "MIN_PLAYERS_TO_START", .. })
            ));
        }
        assert!(config_from(&[("MIN_PLAYERS_TO_START", "2")]).is_ok());
    }
}
