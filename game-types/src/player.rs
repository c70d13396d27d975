use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{GameId, PlayerId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Player {
    pub id: PlayerId,
    pub game_id: GameId,
    pub name: String,
    /// Running total, only ever changed when a round's scores are applied
    pub score: i32,
    pub is_host: bool,
    pub joined_at: DateTime<Utc>,
}

impl Player {
    pub fn new(game_id: GameId, name: String, is_host: bool, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            game_id,
            name,
            score: 0,
            is_host,
            joined_at: now,
        }
    }
}

/// One line of the scoreboard. Tied players share a rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Standing {
    pub rank: i32,
    pub player_id: PlayerId,
    pub name: String,
    pub score: i32,
}
