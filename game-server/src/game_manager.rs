use chrono::{DateTime, Utc};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use game_core::{
    CloseOutcome, GameEvent, GameEventHandler, GameStore, LifecycleError, LifecycleSettings,
    Lobby, NextStep, RngSource, RoundLifecycleController, SubmissionReceipt, TopicCatalog,
};
use game_types::{Game, GameId, GameSettings, GameStatus, Player, PlayerId, Round, RoundId, Standing};

/// Writes every lifecycle event to the log
struct EventLogger;

impl GameEventHandler for EventLogger {
    fn handle_event(&mut self, event: GameEvent) {
        match &event {
            GameEvent::GameStarted { game_id, first_round } => {
                debug!(game_id = %game_id, topic = %first_round.topic.prompt, "event: game started")
            }
            GameEvent::SubmissionRecorded { game_id, player_id, words, .. } => {
                debug!(game_id = %game_id, player_id = %player_id, words = words.len(), "event: submission recorded")
            }
            GameEvent::RoundClosed { game_id, round_number, .. } => {
                debug!(game_id = %game_id, round_number, "event: round closed")
            }
            GameEvent::RoundOpened { game_id, round } => {
                debug!(game_id = %game_id, round_number = round.round_number, "event: round opened")
            }
            GameEvent::GameCompleted { game_id, standings } => {
                debug!(game_id = %game_id, players = standings.len(), "event: game completed")
            }
        }
    }
}

/// Registry of live games. Holds one lifecycle controller per game that is in
/// the lobby or in progress and drives their rounds from [`GameManager::tick`].
pub struct GameManager {
    store: Arc<dyn GameStore>,
    catalog: Arc<TopicCatalog>,
    lobby: Lobby,
    default_settings: GameSettings,
    lifecycle: LifecycleSettings,
    active_games: RwLock<HashMap<GameId, Arc<RoundLifecycleController>>>,
}

impl GameManager {
    pub fn new(
        store: Arc<dyn GameStore>,
        catalog: Arc<TopicCatalog>,
        default_settings: GameSettings,
        lifecycle: LifecycleSettings,
    ) -> Self {
        Self {
            lobby: Lobby::new(store.clone(), Box::new(RngSource::from_entropy())),
            store,
            catalog,
            default_settings,
            lifecycle,
            active_games: RwLock::new(HashMap::new()),
        }
    }

    /// Create a game with the server's default settings
    pub async fn create_game(&self, host_name: &str) -> Result<(Game, Player), LifecycleError> {
        self.create_game_with_settings(host_name, self.default_settings.clone())
            .await
    }

    pub async fn create_game_with_settings(
        &self,
        host_name: &str,
        settings: GameSettings,
    ) -> Result<(Game, Player), LifecycleError> {
        let (game, host) = self.lobby.create_game(host_name, settings, Utc::now()).await?;

        let controller = self.build_controller(game.id).await;
        self.active_games.write().await.insert(game.id, controller);

        Ok((game, host))
    }

    pub async fn join_game(&self, join_code: &str, name: &str) -> Result<Player, LifecycleError> {
        self.lobby.join_game(join_code, name, Utc::now()).await
    }

    pub async fn start_game(&self, game_id: GameId, player_id: PlayerId) -> Result<Round, LifecycleError> {
        self.controller(game_id)
            .await?
            .start_game(player_id, Utc::now())
            .await
    }

    pub async fn submit_words(
        &self,
        game_id: GameId,
        player_id: PlayerId,
        words: &[String],
        is_final: bool,
    ) -> Result<SubmissionReceipt, LifecycleError> {
        self.controller(game_id)
            .await?
            .submit_words(player_id, words, is_final, Utc::now())
            .await
    }

    /// Close a round ahead of its deadline
    pub async fn close_round(&self, game_id: GameId, round_id: RoundId) -> Result<CloseOutcome, LifecycleError> {
        let outcome = self
            .controller(game_id)
            .await?
            .close_round(round_id, Utc::now())
            .await?;
        self.forget_if_completed(game_id, &outcome).await;
        Ok(outcome)
    }

    pub async fn standings(&self, game_id: GameId) -> Result<Vec<Standing>, LifecycleError> {
        self.controller(game_id).await?.standings().await
    }

    pub async fn subscribe(
        &self,
        game_id: GameId,
        handler: Box<dyn GameEventHandler>,
    ) -> Result<(), LifecycleError> {
        self.controller(game_id).await?.subscribe(handler).await;
        Ok(())
    }

    /// Close every round that is due at `now`. A failure in one game is logged
    /// and leaves that round open for the next tick.
    pub async fn tick(&self, now: DateTime<Utc>) -> Vec<(GameId, CloseOutcome)> {
        let controllers: Vec<Arc<RoundLifecycleController>> =
            self.active_games.read().await.values().cloned().collect();

        let mut closed = Vec::new();
        for controller in controllers {
            let game_id = controller.game_id();
            match controller.close_round_if_due(now).await {
                Ok(outcome @ CloseOutcome::Closed(_)) => {
                    self.forget_if_completed(game_id, &outcome).await;
                    closed.push((game_id, outcome));
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(game_id = %game_id, "Failed to close round, will retry: {}", e);
                }
            }
        }
        closed
    }

    /// Load controllers for every unfinished game in the store. Returns how
    /// many games were restored.
    pub async fn restore_active_games(&self) -> Result<usize, LifecycleError> {
        let mut games = self.store.list_games_by_status(GameStatus::Lobby).await?;
        games.extend(self.store.list_games_by_status(GameStatus::InProgress).await?);

        let mut restored = 0;
        for game in games {
            if self.active_games.read().await.contains_key(&game.id) {
                continue;
            }
            let controller = self.resume_controller(game.id).await?;
            // A request may have loaded the game while this one was resuming
            if let Entry::Vacant(slot) = self.active_games.write().await.entry(game.id) {
                slot.insert(controller);
                restored += 1;
            }
        }

        info!("Restored {} unfinished games", restored);
        Ok(restored)
    }

    pub async fn get_active_games_count(&self) -> usize {
        self.active_games.read().await.len()
    }

    async fn controller(&self, game_id: GameId) -> Result<Arc<RoundLifecycleController>, LifecycleError> {
        if let Some(controller) = self.active_games.read().await.get(&game_id) {
            return Ok(controller.clone());
        }

        // Completed games are not kept in the registry but can still be queried
        let controller = self.resume_controller(game_id).await?;
        if controller.game().await?.status == GameStatus::Completed {
            return Ok(controller);
        }
        let mut games = self.active_games.write().await;
        let controller = games.entry(game_id).or_insert(controller).clone();
        Ok(controller)
    }

    async fn build_controller(&self, game_id: GameId) -> Arc<RoundLifecycleController> {
        let controller = RoundLifecycleController::new(
            game_id,
            self.store.clone(),
            self.catalog.clone(),
            Box::new(RngSource::from_entropy()),
            &self.lifecycle,
        );
        controller.subscribe(Box::new(EventLogger)).await;
        Arc::new(controller)
    }

    async fn resume_controller(&self, game_id: GameId) -> Result<Arc<RoundLifecycleController>, LifecycleError> {
        let controller = RoundLifecycleController::resume(
            game_id,
            self.store.clone(),
            self.catalog.clone(),
            Box::new(RngSource::from_entropy()),
            &self.lifecycle,
        )
        .await?;
        controller.subscribe(Box::new(EventLogger)).await;
        Ok(Arc::new(controller))
    }

    async fn forget_if_completed(&self, game_id: GameId, outcome: &CloseOutcome) {
        if let CloseOutcome::Closed(summary) = outcome {
            if let NextStep::GameCompleted(_) = summary.next {
                self.active_games.write().await.remove(&game_id);
                info!(game_id = %game_id, "Removed completed game from registry");
            }
        }
    }
}
