pub use super::games::Entity as Games;
pub use super::players::Entity as Players;
pub use super::round_scores::Entity as RoundScores;
pub use super::rounds::Entity as Rounds;
pub use super::submissions::Entity as Submissions;
