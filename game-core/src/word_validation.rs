use crate::normalize_word;

pub const DEFAULT_MAX_WORDS_PER_ROUND: usize = 5;
pub const MAX_WORD_LENGTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordRejection {
    TooLong { word: String },
    ControlCharacters { word: String },
}

/// Normalizes raw player input and carries the per-round word cap the store enforces.
#[derive(Debug, Clone)]
pub struct SubmissionValidator {
    max_words_per_round: usize,
}

impl SubmissionValidator {
    pub fn new(max_words_per_round: usize) -> Self {
        Self { max_words_per_round }
    }

    pub fn max_words_per_round(&self) -> usize {
        self.max_words_per_round
    }

    /// Normalize a batch of words. Blank entries are dropped, repeats within the
    /// batch are collapsed, and the first invalid word rejects the whole batch.
    pub fn normalize_batch(&self, words: &[String]) -> Result<Vec<String>, WordRejection> {
        let mut normalized: Vec<String> = Vec::with_capacity(words.len());

        for raw in words {
            let Some(word) = normalize_word(raw) else {
                continue;
            };

            if word.chars().any(char::is_control) {
                return Err(WordRejection::ControlCharacters { word });
            }
            if word.chars().count() > MAX_WORD_LENGTH {
                return Err(WordRejection::TooLong { word });
            }

            if !normalized.contains(&word) {
                normalized.push(word);
            }
        }

        Ok(normalized)
    }
}

impl Default for SubmissionValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WORDS_PER_ROUND)
    }
}
