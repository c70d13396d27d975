use async_trait::async_trait;
use game_types::{Game, GameId, GameStatus, Player, PlayerId, Round, RoundId, RoundScore, Submission};
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::{CloseCommitOutcome, GameStore, RoundCloseCommit, RoundTransition, StoreError, SubmissionOutcome};

#[derive(Debug, Default)]
struct Tables {
    games: HashMap<GameId, Game>,
    players: HashMap<PlayerId, Player>,
    rounds: HashMap<RoundId, Round>,
    submissions: Vec<Submission>,
    round_scores: HashMap<RoundId, Vec<RoundScore>>,
}

/// Process-local [`GameStore`]. Every operation runs under one lock, which
/// makes the compare-and-set operations atomic.
#[derive(Debug, Default)]
pub struct InMemoryGameStore {
    tables: Mutex<Tables>,
}

impl InMemoryGameStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(entity: &'static str, id: impl ToString) -> StoreError {
    StoreError::NotFound {
        entity,
        id: id.to_string(),
    }
}

#[async_trait]
impl GameStore for InMemoryGameStore {
    async fn insert_game(&self, game: &Game) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.games.values().any(|g| g.join_code == game.join_code) {
            return Err(StoreError::Conflict(format!(
                "join code {} already in use",
                game.join_code
            )));
        }
        tables.games.insert(game.id, game.clone());
        Ok(())
    }

    async fn find_game(&self, game_id: GameId) -> Result<Option<Game>, StoreError> {
        Ok(self.tables.lock().await.games.get(&game_id).cloned())
    }

    async fn find_game_by_join_code(&self, join_code: &str) -> Result<Option<Game>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .games
            .values()
            .find(|g| g.join_code == join_code)
            .cloned())
    }

    async fn list_games_by_status(&self, status: GameStatus) -> Result<Vec<Game>, StoreError> {
        let tables = self.tables.lock().await;
        let mut games: Vec<Game> = tables
            .games
            .values()
            .filter(|g| g.status == status)
            .cloned()
            .collect();
        games.sort_by_key(|g| g.created_at);
        Ok(games)
    }

    async fn insert_player(&self, player: &Player) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if !tables.games.contains_key(&player.game_id) {
            return Err(not_found("game", player.game_id));
        }
        tables.players.insert(player.id, player.clone());
        Ok(())
    }

    async fn list_players(&self, game_id: GameId) -> Result<Vec<Player>, StoreError> {
        let tables = self.tables.lock().await;
        let mut players: Vec<Player> = tables
            .players
            .values()
            .filter(|p| p.game_id == game_id)
            .cloned()
            .collect();
        players.sort_by_key(|p| p.joined_at);
        Ok(players)
    }

    async fn find_round(&self, round_id: RoundId) -> Result<Option<Round>, StoreError> {
        Ok(self.tables.lock().await.rounds.get(&round_id).cloned())
    }

    async fn latest_round(&self, game_id: GameId) -> Result<Option<Round>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .rounds
            .values()
            .filter(|r| r.game_id == game_id)
            .max_by_key(|r| r.round_number)
            .cloned())
    }

    async fn list_rounds(&self, game_id: GameId) -> Result<Vec<Round>, StoreError> {
        let tables = self.tables.lock().await;
        let mut rounds: Vec<Round> = tables
            .rounds
            .values()
            .filter(|r| r.game_id == game_id)
            .cloned()
            .collect();
        rounds.sort_by_key(|r| r.round_number);
        Ok(rounds)
    }

    async fn insert_submissions(
        &self,
        batch: &[Submission],
        max_words: usize,
    ) -> Result<SubmissionOutcome, StoreError> {
        let Some(first) = batch.first() else {
            return Ok(SubmissionOutcome::Recorded {
                accepted: vec![],
                duplicates: vec![],
            });
        };

        let mut tables = self.tables.lock().await;
        let round = tables
            .rounds
            .get(&first.round_id)
            .ok_or_else(|| not_found("round", first.round_id))?;
        if !round.is_open() {
            return Ok(SubmissionOutcome::RoundClosed);
        }

        let existing: Vec<&str> = tables
            .submissions
            .iter()
            .filter(|s| s.round_id == first.round_id && s.player_id == first.player_id)
            .map(|s| s.word.as_str())
            .collect();
        let (duplicates, fresh): (Vec<&Submission>, Vec<&Submission>) = batch
            .iter()
            .partition(|s| existing.contains(&s.word.as_str()));
        if existing.len() + fresh.len() > max_words {
            return Ok(SubmissionOutcome::LimitReached);
        }

        let accepted = fresh.iter().map(|s| s.word.clone()).collect();
        let duplicates = duplicates.iter().map(|s| s.word.clone()).collect();
        tables.submissions.extend(fresh.into_iter().cloned());
        Ok(SubmissionOutcome::Recorded {
            accepted,
            duplicates,
        })
    }

    async fn list_submissions(&self, round_id: RoundId) -> Result<Vec<Submission>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .submissions
            .iter()
            .filter(|s| s.round_id == round_id)
            .cloned()
            .collect())
    }

    async fn list_round_scores(&self, round_id: RoundId) -> Result<Vec<RoundScore>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.round_scores.get(&round_id).cloned().unwrap_or_default())
    }

    async fn start_game(&self, game_id: GameId, first_round: &Round) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        let game = tables
            .games
            .get_mut(&game_id)
            .ok_or_else(|| not_found("game", game_id))?;
        if game.status != GameStatus::Lobby {
            return Ok(false);
        }

        game.status = GameStatus::InProgress;
        game.current_round = first_round.round_number;
        tables.rounds.insert(first_round.id, first_round.clone());
        Ok(true)
    }

    async fn commit_round_close(
        &self,
        commit: &RoundCloseCommit,
    ) -> Result<CloseCommitOutcome, StoreError> {
        let mut tables = self.tables.lock().await;

        // Validate everything before the first mutation so a failure writes nothing
        let round = tables
            .rounds
            .get(&commit.round_id)
            .ok_or_else(|| not_found("round", commit.round_id))?;
        if !round.is_open() {
            return Ok(CloseCommitOutcome::AlreadyClosed);
        }
        let recorded = tables
            .submissions
            .iter()
            .filter(|s| s.round_id == commit.round_id)
            .count();
        if recorded != commit.scored_submissions {
            return Ok(CloseCommitOutcome::StaleSubmissions);
        }
        if !tables.games.contains_key(&commit.game_id) {
            return Err(not_found("game", commit.game_id));
        }
        for score in &commit.scores {
            if !tables.players.contains_key(&score.player_id) {
                return Err(not_found("player", score.player_id));
            }
        }
        if let RoundTransition::OpenNext(next) = &commit.transition {
            let taken = tables
                .rounds
                .values()
                .any(|r| r.game_id == next.game_id && r.round_number == next.round_number);
            if taken {
                return Err(StoreError::Conflict(format!(
                    "round {} already exists",
                    next.round_number
                )));
            }
        }

        if let Some(round) = tables.rounds.get_mut(&commit.round_id) {
            round.end_time = Some(commit.end_time);
        }
        for score in &commit.scores {
            if let Some(player) = tables.players.get_mut(&score.player_id) {
                player.score += score.score;
            }
        }
        tables
            .round_scores
            .insert(commit.round_id, commit.scores.clone());

        match &commit.transition {
            RoundTransition::OpenNext(next) => {
                tables.rounds.insert(next.id, next.clone());
                if let Some(game) = tables.games.get_mut(&commit.game_id) {
                    game.current_round = next.round_number;
                }
            }
            RoundTransition::CompleteGame => {
                if let Some(game) = tables.games.get_mut(&commit.game_id) {
                    game.status = GameStatus::Completed;
                }
            }
        }

        Ok(CloseCommitOutcome::Committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use game_types::{GameSettings, RoundType, Topic};

    async fn seeded_store() -> (InMemoryGameStore, Game, Player, Round) {
        let store = InMemoryGameStore::new();
        let game = Game::new(uuid::Uuid::new_v4(), "QWERTY".to_string(), &GameSettings::default(), Utc::now());
        store.insert_game(&game).await.unwrap();
        let player = Player::new(game.id, "Alice".to_string(), true, Utc::now());
        store.insert_player(&player).await.unwrap();
        let round = Round::open(
            game.id,
            1,
            RoundType::Match,
            Topic { id: 0, prompt: "Animals".to_string() },
            Utc::now(),
        );
        assert!(store.start_game(game.id, &round).await.unwrap());
        (store, game, player, round)
    }

    #[tokio::test]
    async fn test_join_codes_are_unique() {
        let (store, game, _, _) = seeded_store().await;
        let mut other = game.clone();
        other.id = uuid::Uuid::new_v4();
        let result = store.insert_game(&other).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_start_game_is_compare_and_set() {
        let (store, game, _, round) = seeded_store().await;
        let mut second = round.clone();
        second.id = uuid::Uuid::new_v4();
        assert!(!store.start_game(game.id, &second).await.unwrap());
        assert_eq!(store.list_rounds(game.id).await.unwrap().len(), 1);
    }

    fn submission(round: &Round, player: &Player, word: &str) -> Submission {
        Submission {
            round_id: round.id,
            player_id: player.id,
            word: word.to_string(),
            is_final: false,
            submitted_at: Utc::now(),
        }
    }

    fn recorded(accepted: &[&str], duplicates: &[&str]) -> SubmissionOutcome {
        SubmissionOutcome::Recorded {
            accepted: accepted.iter().map(|w| w.to_string()).collect(),
            duplicates: duplicates.iter().map(|w| w.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_submission_duplicates_and_closed_rounds() {
        let (store, game, player, round) = seeded_store().await;
        let cat = submission(&round, &player, "cat");

        assert_eq!(store.insert_submissions(&[cat.clone()], 5).await.unwrap(), recorded(&["cat"], &[]));
        assert_eq!(store.insert_submissions(&[cat.clone()], 5).await.unwrap(), recorded(&[], &["cat"]));

        let commit = RoundCloseCommit {
            game_id: game.id,
            round_id: round.id,
            end_time: Utc::now(),
            scored_submissions: 0,
            scores: vec![],
            transition: RoundTransition::CompleteGame,
        };
        // The recorded word was not part of the computed scores
        assert_eq!(
            store.commit_round_close(&commit).await.unwrap(),
            CloseCommitOutcome::StaleSubmissions
        );

        let commit = RoundCloseCommit {
            scored_submissions: 1,
            ..commit
        };
        assert_eq!(
            store.commit_round_close(&commit).await.unwrap(),
            CloseCommitOutcome::Committed
        );
        assert_eq!(
            store.commit_round_close(&commit).await.unwrap(),
            CloseCommitOutcome::AlreadyClosed
        );

        let late = submission(&round, &player, "dog");
        assert_eq!(store.insert_submissions(&[late], 5).await.unwrap(), SubmissionOutcome::RoundClosed);
        assert_eq!(store.list_submissions(round.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_word_cap_counts_recorded_words() {
        let (store, _, player, round) = seeded_store().await;
        let batch = |list: &[&str]| -> Vec<Submission> {
            list.iter().map(|w| submission(&round, &player, w)).collect()
        };

        assert_eq!(
            store.insert_submissions(&batch(&["ant", "bee", "cow"]), 4).await.unwrap(),
            recorded(&["ant", "bee", "cow"], &[])
        );
        assert_eq!(
            store.insert_submissions(&batch(&["dog", "eel"]), 4).await.unwrap(),
            SubmissionOutcome::LimitReached
        );
        assert_eq!(store.list_submissions(round.id).await.unwrap().len(), 3);

        // Already-recorded words do not count against the cap a second time
        assert_eq!(
            store.insert_submissions(&batch(&["ant", "dog"]), 4).await.unwrap(),
            recorded(&["dog"], &["ant"])
        );
        assert_eq!(
            store.insert_submissions(&batch(&["cow"]), 4).await.unwrap(),
            recorded(&[], &["cow"])
        );
    }

    #[tokio::test]
    async fn test_failed_commit_writes_nothing() {
        let (store, game, player, round) = seeded_store().await;
        let commit = RoundCloseCommit {
            game_id: game.id,
            round_id: round.id,
            end_time: Utc::now(),
            scored_submissions: 0,
            scores: vec![
                RoundScore {
                    round_id: round.id,
                    player_id: player.id,
                    score: 3,
                    matched_words: vec![],
                    bonus_awarded: false,
                },
                RoundScore {
                    round_id: round.id,
                    player_id: uuid::Uuid::new_v4(),
                    score: 1,
                    matched_words: vec![],
                    bonus_awarded: false,
                },
            ],
            transition: RoundTransition::CompleteGame,
        };

        assert!(matches!(
            store.commit_round_close(&commit).await,
            Err(StoreError::NotFound { entity: "player", .. })
        ));
        assert!(store.find_round(round.id).await.unwrap().unwrap().is_open());
        assert_eq!(store.list_players(game.id).await.unwrap()[0].score, 0);
        assert!(store.list_round_scores(round.id).await.unwrap().is_empty());
    }
}
