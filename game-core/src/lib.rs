pub mod errors;
pub mod game_events;
pub mod lifecycle;
pub mod lobby;
pub mod memory_store;
pub mod planner;
pub mod scoring;
pub mod store;
pub mod topics;
pub mod word_validation;

// Re-export main components
pub use errors::*;
pub use game_events::*;
pub use lifecycle::*;
pub use lobby::*;
pub use memory_store::*;
pub use planner::*;
pub use scoring::*;
pub use store::*;
pub use topics::*;
pub use word_validation::*;
