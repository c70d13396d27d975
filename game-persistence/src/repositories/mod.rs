pub mod game_store;

pub use game_store::SeaOrmGameStore;
