use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::GameId;

pub const DEFAULT_ROUND_COUNT: i32 = 5;
pub const DEFAULT_TIME_PER_ROUND_SECS: i32 = 60;
pub const DEFAULT_MAX_PLAYERS: i32 = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Game {
    pub id: GameId,
    pub join_code: String,
    pub status: GameStatus,
    pub round_count: i32,
    /// Number of the most recently opened round, 0 while in the lobby
    pub current_round: i32,
    pub time_per_round_secs: i32,
    pub max_players: i32,
    pub created_at: DateTime<Utc>,
}

impl Game {
    pub fn new(id: GameId, join_code: String, settings: &GameSettings, now: DateTime<Utc>) -> Self {
        Self {
            id,
            join_code,
            status: GameStatus::Lobby,
            round_count: settings.round_count,
            current_round: 0,
            time_per_round_secs: settings.time_per_round_secs,
            max_players: settings.max_players,
            created_at: now,
        }
    }

    pub fn is_last_round(&self, round_number: i32) -> bool {
        round_number >= self.round_count
    }
}

/// Knobs chosen by the host when a game is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GameSettings {
    pub round_count: i32,
    pub time_per_round_secs: i32,
    pub max_players: i32,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            round_count: DEFAULT_ROUND_COUNT,
            time_per_round_secs: DEFAULT_TIME_PER_ROUND_SECS,
            max_players: DEFAULT_MAX_PLAYERS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum GameStatus {
    Lobby,      // Accepting players, no rounds yet
    InProgress, // Rounds are being played
    Completed,  // Terminal, scores are final
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Lobby => "lobby",
            GameStatus::InProgress => "in-progress",
            GameStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown variant '{}'", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

impl FromStr for GameStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lobby" => Ok(GameStatus::Lobby),
            "in-progress" => Ok(GameStatus::InProgress),
            "completed" => Ok(GameStatus::Completed),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}
