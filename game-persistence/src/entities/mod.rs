pub mod prelude;

pub mod games;
pub mod players;
pub mod round_scores;
pub mod rounds;
pub mod submissions;
