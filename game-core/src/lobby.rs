use chrono::{DateTime, Utc};
use game_types::{Game, GameSettings, GameStatus, Player};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{GameStore, LifecycleError, RandomSource, StoreError};

pub const JOIN_CODE_LENGTH: usize = 6;
pub const MAX_NAME_LENGTH: usize = 24;
const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const JOIN_CODE_ATTEMPTS: usize = 5;

/// Creates games and admits players before a game starts.
pub struct Lobby {
    store: Arc<dyn GameStore>,
    random: Mutex<Box<dyn RandomSource>>,
}

impl Lobby {
    pub fn new(store: Arc<dyn GameStore>, random: Box<dyn RandomSource>) -> Self {
        Self {
            store,
            random: Mutex::new(random),
        }
    }

    /// Create a lobby game with `host_name` as its first player
    pub async fn create_game(
        &self,
        host_name: &str,
        settings: GameSettings,
        now: DateTime<Utc>,
    ) -> Result<(Game, Player), LifecycleError> {
        validate_settings(&settings)?;
        let host_name = validate_name(host_name)?;

        let mut attempt = 0;
        let game = loop {
            attempt += 1;
            let join_code = self.generate_join_code().await;
            let game = Game::new(uuid::Uuid::new_v4(), join_code, &settings, now);

            match self.store.insert_game(&game).await {
                Ok(()) => break game,
                Err(StoreError::Conflict(reason)) if attempt < JOIN_CODE_ATTEMPTS => {
                    warn!("Join code collision, retrying: {}", reason);
                }
                Err(err) => return Err(err.into()),
            }
        };

        let host = Player::new(game.id, host_name, true, now);
        self.store.insert_player(&host).await?;

        info!(
            game_id = %game.id,
            join_code = %game.join_code,
            round_count = game.round_count,
            "Created game hosted by {}",
            host.name
        );
        Ok((game, host))
    }

    /// Add a player to a game that is still in the lobby
    pub async fn join_game(
        &self,
        join_code: &str,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<Player, LifecycleError> {
        let name = validate_name(name)?;
        let join_code = join_code.trim().to_uppercase();

        let game = self
            .store
            .find_game_by_join_code(&join_code)
            .await?
            .ok_or_else(|| LifecycleError::JoinCodeNotFound(join_code.clone()))?;

        if game.status != GameStatus::Lobby {
            return Err(LifecycleError::InvalidGameState {
                expected: GameStatus::Lobby,
                actual: game.status,
            });
        }

        let players = self.store.list_players(game.id).await?;
        if players.len() >= game.max_players as usize {
            return Err(LifecycleError::GameFull {
                max_players: game.max_players,
            });
        }
        if players.iter().any(|p| p.name.eq_ignore_ascii_case(&name)) {
            return Err(LifecycleError::NameTaken(name));
        }

        let player = Player::new(game.id, name, false, now);
        self.store.insert_player(&player).await?;

        info!(game_id = %game.id, player_id = %player.id, "{} joined the game", player.name);
        Ok(player)
    }

    async fn generate_join_code(&self) -> String {
        let mut random = self.random.lock().await;
        (0..JOIN_CODE_LENGTH)
            .map(|_| JOIN_CODE_ALPHABET[random.pick_index(JOIN_CODE_ALPHABET.len())] as char)
            .collect()
    }
}

fn validate_name(name: &str) -> Result<String, LifecycleError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LENGTH || name.chars().any(char::is_control) {
        return Err(LifecycleError::InvalidName);
    }
    Ok(name.to_string())
}

fn validate_settings(settings: &GameSettings) -> Result<(), LifecycleError> {
    if settings.round_count < 1 {
        return Err(LifecycleError::InvalidSettings("round_count must be at least 1".into()));
    }
    if settings.time_per_round_secs < 1 {
        return Err(LifecycleError::InvalidSettings(
            "time_per_round_secs must be at least 1".into(),
        ));
    }
    if settings.max_players < 2 {
        return Err(LifecycleError::InvalidSettings("max_players must be at least 2".into()));
    }
    Ok(())
}
