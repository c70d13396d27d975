use game_types::{GameId, GameStatus, PlayerId, RoundId, RoundType};

use crate::WordRejection;

/// Failure reported by a [`crate::GameStore`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("write rejected: {0}")]
    Conflict(String),
    #[error("storage backend failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError::Backend(Box::new(err))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Game not found: {0}")]
    GameNotFound(GameId),
    #[error("No game with join code {0}")]
    JoinCodeNotFound(String),
    #[error("Round not found: {0}")]
    RoundNotFound(RoundId),
    #[error("Player not in game: {0}")]
    PlayerNotInGame(PlayerId),
    #[error("Only the host can start the game")]
    NotHost,
    #[error("Need at least {required} players to start, have {actual}")]
    NotEnoughPlayers { required: usize, actual: usize },
    #[error("Game is full ({max_players} players)")]
    GameFull { max_players: i32 },
    #[error("Name already taken: {0}")]
    NameTaken(String),
    #[error("Invalid player name")]
    InvalidName,
    #[error("Invalid game settings: {0}")]
    InvalidSettings(String),
    #[error("Game is {actual}, expected {expected}")]
    InvalidGameState {
        expected: GameStatus,
        actual: GameStatus,
    },
    #[error("Round {0} is closed")]
    RoundClosed(RoundId),
    #[error("Game {0} has no open round")]
    NoOpenRound(GameId),
    #[error("Invalid word: {0:?}")]
    InvalidWord(WordRejection),
    #[error("At most {max} words per round")]
    TooManyWords { max: usize },
    #[error("No topics available for {0} rounds")]
    EmptyTopicPool(RoundType),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LifecycleError {
    /// The request itself was rejected before anything was written
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LifecycleError::GameNotFound(_)
                | LifecycleError::JoinCodeNotFound(_)
                | LifecycleError::RoundNotFound(_)
                | LifecycleError::PlayerNotInGame(_)
                | LifecycleError::NotHost
                | LifecycleError::NotEnoughPlayers { .. }
                | LifecycleError::GameFull { .. }
                | LifecycleError::NameTaken(_)
                | LifecycleError::InvalidName
                | LifecycleError::InvalidSettings(_)
                | LifecycleError::InvalidGameState { .. }
                | LifecycleError::RoundClosed(_)
                | LifecycleError::NoOpenRound(_)
                | LifecycleError::InvalidWord(_)
                | LifecycleError::TooManyWords { .. }
        )
    }

    /// The store failed; state is left as it was and the call can be retried
    pub fn is_persistence(&self) -> bool {
        matches!(self, LifecycleError::Store(_))
    }
}
