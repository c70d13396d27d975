#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use game_core::{
    CloseCommitOutcome, GameEvent, GameEventHandler, GameStore, InMemoryGameStore,
    LifecycleSettings, Lobby, RandomSource, RngSource, RoundCloseCommit, RoundLifecycleController,
    StoreError, SubmissionOutcome, TopicCatalog,
};
use game_types::{
    Game, GameId, GameSettings, GameStatus, Player, Round, RoundId, RoundScore, Submission,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Replays a fixed list of picks, then always picks index 0
pub struct ScriptedRandom(VecDeque<usize>);

impl ScriptedRandom {
    pub fn new(picks: &[usize]) -> Self {
        Self(picks.iter().copied().collect())
    }
}

impl RandomSource for ScriptedRandom {
    fn pick_index(&mut self, len: usize) -> usize {
        self.0.pop_front().unwrap_or(0) % len
    }
}

/// Three topics per round type
pub fn create_test_catalog() -> Arc<TopicCatalog> {
    Arc::new(
        TopicCatalog::from_lists(
            "Animals\nFruit\nThings in a kitchen",
            "Colors\nCountries\nSports",
        )
        .unwrap(),
    )
}

pub fn game_start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 18, 0, 0).unwrap()
}

pub fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

pub struct TestGame {
    pub store: Arc<dyn GameStore>,
    pub controller: RoundLifecycleController,
    pub game: Game,
    /// Host first, then the others in join order
    pub players: Vec<Player>,
}

impl TestGame {
    pub fn player(&self, name: &str) -> &Player {
        self.players
            .iter()
            .find(|p| p.name == name)
            .unwrap_or_else(|| panic!("no player named {}", name))
    }

    pub fn host(&self) -> &Player {
        &self.players[0]
    }

    pub async fn start(&self) -> Round {
        self.controller
            .start_game(self.host().id, game_start_time())
            .await
            .unwrap()
    }

    pub async fn submit(&self, name: &str, list: &[&str], now: DateTime<Utc>) {
        self.controller
            .submit_words(self.player(name).id, &words(list), false, now)
            .await
            .unwrap();
    }

    pub async fn current_round(&self) -> Round {
        self.store.latest_round(self.game.id).await.unwrap().unwrap()
    }

    pub async fn reload_game(&self) -> Game {
        self.store.find_game(self.game.id).await.unwrap().unwrap()
    }

    pub async fn total(&self, name: &str) -> i32 {
        let id = self.player(name).id;
        self.store
            .list_players(self.game.id)
            .await
            .unwrap()
            .into_iter()
            .find(|p| p.id == id)
            .map(|p| p.score)
            .unwrap()
    }

    pub fn deadline(&self, round: &Round) -> DateTime<Utc> {
        round.deadline(self.game.time_per_round_secs)
    }
}

/// Creates a lobby game on `store` with the given player names, the first being the host
pub async fn setup_game_on(
    store: Arc<dyn GameStore>,
    names: &[&str],
    settings: GameSettings,
    random: Box<dyn RandomSource>,
) -> TestGame {
    let joined_at = game_start_time() - Duration::minutes(1);
    let lobby = Lobby::new(store.clone(), Box::new(RngSource::seeded(7)));

    let (game, host) = lobby
        .create_game(names[0], settings, joined_at)
        .await
        .unwrap();
    let mut players = vec![host];
    for (offset, name) in names[1..].iter().enumerate() {
        let player = lobby
            .join_game(&game.join_code, name, joined_at + Duration::seconds(offset as i64 + 1))
            .await
            .unwrap();
        players.push(player);
    }

    let controller = RoundLifecycleController::new(
        game.id,
        store.clone(),
        create_test_catalog(),
        random,
        &LifecycleSettings::default(),
    );

    TestGame {
        store,
        controller,
        game,
        players,
    }
}

pub async fn setup_game(names: &[&str]) -> TestGame {
    setup_game_with(names, GameSettings::default()).await
}

pub async fn setup_game_with(names: &[&str], settings: GameSettings) -> TestGame {
    // First pick decides the first round type: index 0 is a match round
    setup_game_on(
        Arc::new(InMemoryGameStore::new()),
        names,
        settings,
        Box::new(ScriptedRandom::new(&[0])),
    )
    .await
}

/// Event collector for testing event emissions
#[derive(Clone, Default)]
pub struct EventCollector {
    events: Arc<Mutex<Vec<GameEvent>>>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_events(&self) -> Vec<GameEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn count_matching(&self, check_fn: impl Fn(&GameEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| check_fn(e)).count()
    }
}

impl GameEventHandler for EventCollector {
    fn handle_event(&mut self, event: GameEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Store wrapper for exercising failure paths. Round close commits fail while
/// `failing` is set, and queued late submissions are recorded right before the
/// next close commits, one per commit attempt.
pub struct FlakyStore {
    inner: InMemoryGameStore,
    failing: AtomicBool,
    late_submissions: Mutex<VecDeque<Submission>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryGameStore::new(),
            failing: AtomicBool::new(false),
            late_submissions: Mutex::new(VecDeque::new()),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn queue_late_submission(&self, submission: Submission) {
        self.late_submissions.lock().unwrap().push_back(submission);
    }
}

#[async_trait]
impl GameStore for FlakyStore {
    async fn insert_game(&self, game: &Game) -> Result<(), StoreError> {
        self.inner.insert_game(game).await
    }

    async fn find_game(&self, game_id: GameId) -> Result<Option<Game>, StoreError> {
        self.inner.find_game(game_id).await
    }

    async fn find_game_by_join_code(&self, join_code: &str) -> Result<Option<Game>, StoreError> {
        self.inner.find_game_by_join_code(join_code).await
    }

    async fn list_games_by_status(&self, status: GameStatus) -> Result<Vec<Game>, StoreError> {
        self.inner.list_games_by_status(status).await
    }

    async fn insert_player(&self, player: &Player) -> Result<(), StoreError> {
        self.inner.insert_player(player).await
    }

    async fn list_players(&self, game_id: GameId) -> Result<Vec<Player>, StoreError> {
        self.inner.list_players(game_id).await
    }

    async fn find_round(&self, round_id: RoundId) -> Result<Option<Round>, StoreError> {
        self.inner.find_round(round_id).await
    }

    async fn latest_round(&self, game_id: GameId) -> Result<Option<Round>, StoreError> {
        self.inner.latest_round(game_id).await
    }

    async fn list_rounds(&self, game_id: GameId) -> Result<Vec<Round>, StoreError> {
        self.inner.list_rounds(game_id).await
    }

    async fn insert_submissions(
        &self,
        batch: &[Submission],
        max_words: usize,
    ) -> Result<SubmissionOutcome, StoreError> {
        // Let overlapping submissions interleave
        tokio::task::yield_now().await;
        self.inner.insert_submissions(batch, max_words).await
    }

    async fn list_submissions(&self, round_id: RoundId) -> Result<Vec<Submission>, StoreError> {
        self.inner.list_submissions(round_id).await
    }

    async fn list_round_scores(&self, round_id: RoundId) -> Result<Vec<RoundScore>, StoreError> {
        self.inner.list_round_scores(round_id).await
    }

    async fn start_game(&self, game_id: GameId, first_round: &Round) -> Result<bool, StoreError> {
        self.inner.start_game(game_id, first_round).await
    }

    async fn commit_round_close(
        &self,
        commit: &RoundCloseCommit,
    ) -> Result<CloseCommitOutcome, StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::backend(std::io::Error::other("database is locked")));
        }
        let late = self.late_submissions.lock().unwrap().pop_front();
        if let Some(submission) = late {
            self.inner.insert_submissions(&[submission], usize::MAX).await?;
        }
        self.inner.commit_round_close(commit).await
    }
}
