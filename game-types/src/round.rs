use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::{GameId, PlayerId, RoundId, UnknownVariant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum RoundType {
    Match,   // Shared words score
    Unmatch, // Unique words score
}

impl RoundType {
    pub const ALL: [RoundType; 2] = [RoundType::Match, RoundType::Unmatch];

    pub fn toggled(self) -> Self {
        match self {
            RoundType::Match => RoundType::Unmatch,
            RoundType::Unmatch => RoundType::Match,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoundType::Match => "match",
            RoundType::Unmatch => "unmatch",
        }
    }
}

impl fmt::Display for RoundType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoundType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "match" => Ok(RoundType::Match),
            "unmatch" => Ok(RoundType::Unmatch),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// A prompt from one round type's pool. `id` is stable within that pool only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Topic {
    pub id: i32,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Round {
    pub id: RoundId,
    pub game_id: GameId,
    pub round_number: i32,
    pub round_type: RoundType,
    pub topic: Topic,
    pub start_time: DateTime<Utc>,
    /// Set exactly once, when the round is closed and scored
    pub end_time: Option<DateTime<Utc>>,
}

impl Round {
    pub fn open(
        game_id: GameId,
        round_number: i32,
        round_type: RoundType,
        topic: Topic,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            game_id,
            round_number,
            round_type,
            topic,
            start_time,
            end_time: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    pub fn deadline(&self, time_per_round_secs: i32) -> DateTime<Utc> {
        self.start_time + Duration::seconds(i64::from(time_per_round_secs))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Submission {
    pub round_id: RoundId,
    pub player_id: PlayerId,
    pub word: String,
    pub is_final: bool,
    pub submitted_at: DateTime<Utc>,
}

/// Persisted outcome of one player in one closed round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RoundScore {
    pub round_id: RoundId,
    pub player_id: PlayerId,
    pub score: i32,
    pub matched_words: Vec<String>,
    pub bonus_awarded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_type_toggle() {
        assert_eq!(RoundType::Match.toggled(), RoundType::Unmatch);
        assert_eq!(RoundType::Unmatch.toggled(), RoundType::Match);
        assert_eq!(RoundType::Match.toggled().toggled(), RoundType::Match);
    }

    #[test]
    fn test_round_type_parse() {
        assert_eq!("match".parse::<RoundType>().unwrap(), RoundType::Match);
        assert_eq!("unmatch".parse::<RoundType>().unwrap(), RoundType::Unmatch);
        assert!("Match".parse::<RoundType>().is_err());
    }

    #[test]
    fn test_round_deadline() {
        let start = Utc::now();
        let round = Round::open(
            uuid::Uuid::new_v4(),
            1,
            RoundType::Match,
            Topic { id: 0, prompt: "Animals".to_string() },
            start,
        );
        assert!(round.is_open());
        assert_eq!(round.deadline(60), start + Duration::seconds(60));
    }
}
