use async_trait::async_trait;
use chrono::{DateTime, Utc};
use game_types::{Game, GameId, GameStatus, Player, Round, RoundId, RoundScore, Submission};

use crate::StoreError;

/// What happens to the game once a round's scores are applied.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundTransition {
    /// Insert this round and make it the game's current round
    OpenNext(Round),
    /// Mark the game completed, no further rounds
    CompleteGame,
}

/// Everything written when a round closes. Stores apply it as one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundCloseCommit {
    pub game_id: GameId,
    pub round_id: RoundId,
    pub end_time: DateTime<Utc>,
    /// How many submissions the scores were computed from
    pub scored_submissions: usize,
    pub scores: Vec<RoundScore>,
    pub transition: RoundTransition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCommitOutcome {
    Committed,
    /// Another caller closed the round first, nothing was written
    AlreadyClosed,
    /// Submissions arrived after the scores were computed, nothing was written
    StaleSubmissions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// `accepted` were written; `duplicates` had already been submitted by the player
    Recorded {
        accepted: Vec<String>,
        duplicates: Vec<String>,
    },
    RoundClosed,
    /// The new words would take the player past the per-round cap, nothing was written
    LimitReached,
}

/// Persistence boundary of the game core.
///
/// Two operations are compare-and-set: [`GameStore::start_game`] only applies
/// while the game is still in the lobby, and [`GameStore::commit_round_close`]
/// only applies while the round's end time is unset. Neither writes anything
/// when its precondition no longer holds.
#[async_trait]
pub trait GameStore: Send + Sync {
    async fn insert_game(&self, game: &Game) -> Result<(), StoreError>;

    async fn find_game(&self, game_id: GameId) -> Result<Option<Game>, StoreError>;

    async fn find_game_by_join_code(&self, join_code: &str) -> Result<Option<Game>, StoreError>;

    async fn list_games_by_status(&self, status: GameStatus) -> Result<Vec<Game>, StoreError>;

    async fn insert_player(&self, player: &Player) -> Result<(), StoreError>;

    async fn list_players(&self, game_id: GameId) -> Result<Vec<Player>, StoreError>;

    async fn find_round(&self, round_id: RoundId) -> Result<Option<Round>, StoreError>;

    /// Round with the highest round number in the game
    async fn latest_round(&self, game_id: GameId) -> Result<Option<Round>, StoreError>;

    async fn list_rounds(&self, game_id: GameId) -> Result<Vec<Round>, StoreError>;

    /// Record one player's words for a round as a unit. All entries share the
    /// round and player of the first. Words the player already has are skipped,
    /// and the batch is refused if the player would end up with more than
    /// `max_words` words in the round.
    async fn insert_submissions(
        &self,
        batch: &[Submission],
        max_words: usize,
    ) -> Result<SubmissionOutcome, StoreError>;

    async fn list_submissions(&self, round_id: RoundId) -> Result<Vec<Submission>, StoreError>;

    async fn list_round_scores(&self, round_id: RoundId) -> Result<Vec<RoundScore>, StoreError>;

    /// Move a lobby game to in-progress and insert its first round. Returns
    /// `false` if the game already left the lobby.
    async fn start_game(&self, game_id: GameId, first_round: &Round) -> Result<bool, StoreError>;

    /// Atomically stamp the round's end time, insert its scores, add them to the
    /// players' totals and apply the transition. The round must still be open
    /// and hold exactly `scored_submissions` submissions.
    async fn commit_round_close(
        &self,
        commit: &RoundCloseCommit,
    ) -> Result<CloseCommitOutcome, StoreError>;
}
