pub mod game;
pub mod player;
pub mod round;

// Re-export all types
pub use game::*;
pub use player::*;
pub use round::*;

pub type GameId = uuid::Uuid;
pub type PlayerId = uuid::Uuid;
pub type RoundId = uuid::Uuid;
