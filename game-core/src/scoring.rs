use game_types::{PlayerId, RoundId, RoundScore, RoundType};
use std::collections::{HashMap, HashSet};

/// Score a single player earned in a round, before it is attached to a round id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerRoundScore {
    pub score: i32,
    /// Normalized words this player shared with at least one other player
    pub matched_words: Vec<String>,
    pub bonus_awarded: bool,
}

impl PlayerRoundScore {
    pub fn into_round_score(self, round_id: RoundId, player_id: PlayerId) -> RoundScore {
        RoundScore {
            round_id,
            player_id,
            score: self.score,
            matched_words: self.matched_words,
            bonus_awarded: self.bonus_awarded,
        }
    }
}

/// Trim and lowercase a word. Returns `None` when nothing is left.
pub fn normalize_word(word: &str) -> Option<String> {
    let word = word.trim().to_lowercase();
    if word.is_empty() { None } else { Some(word) }
}

pub struct RoundScorer;

impl RoundScorer {
    /// Score every player present in `submissions` for a round of `round_type`.
    ///
    /// Each occurrence of a word in a player's own list is scored separately, so a
    /// player listing the same word twice gets it counted twice. The result is
    /// independent of map iteration order.
    pub fn score_round(
        submissions: &HashMap<PlayerId, Vec<String>>,
        round_type: RoundType,
    ) -> HashMap<PlayerId, PlayerRoundScore> {
        let normalized: HashMap<PlayerId, Vec<String>> = submissions
            .iter()
            .map(|(player_id, words)| {
                let words = words.iter().filter_map(|w| normalize_word(w)).collect();
                (*player_id, words)
            })
            .collect();

        // Which distinct players used each word
        let mut owners: HashMap<&str, HashSet<PlayerId>> = HashMap::new();
        for (player_id, words) in &normalized {
            for word in words {
                owners.entry(word.as_str()).or_default().insert(*player_id);
            }
        }

        normalized
            .iter()
            .map(|(player_id, words)| {
                let mut result = PlayerRoundScore::default();
                let mut all_scored = true;

                for word in words {
                    let shared = owners.get(word.as_str()).map_or(0, HashSet::len) >= 2;
                    if shared && !result.matched_words.contains(word) {
                        result.matched_words.push(word.clone());
                    }

                    let scores = match round_type {
                        RoundType::Match => shared,
                        RoundType::Unmatch => !shared,
                    };
                    if scores {
                        result.score += 1;
                    } else {
                        all_scored = false;
                    }
                }

                // An empty list never earns the perfect bonus
                if !words.is_empty() && all_scored {
                    result.bonus_awarded = true;
                    result.score += 1;
                }

                (*player_id, result)
            })
            .collect()
    }
}
