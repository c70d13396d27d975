use chrono::{DateTime, Utc};
use game_types::{
    Game, GameId, GameStatus, Player, PlayerId, Round, RoundId, RoundScore, Standing, Submission,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    CloseCommitOutcome, GameEvent, GameEventBus, GameEventHandler, GameStore, LifecycleError,
    RandomSource, RoundCloseCommit, RoundPlanner, RoundScorer, RoundTransition, StoreError,
    SubmissionOutcome, SubmissionValidator, TopicCatalog, TopicUsage,
    word_validation::DEFAULT_MAX_WORDS_PER_ROUND,
};

pub const DEFAULT_MIN_PLAYERS: usize = 2;
const MAX_CLOSE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub min_players: usize,
    pub max_words_per_round: usize,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            min_players: DEFAULT_MIN_PLAYERS,
            max_words_per_round: DEFAULT_MAX_WORDS_PER_ROUND,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CloseOutcome {
    /// This call closed and scored the round
    Closed(RoundSummary),
    /// The round had already been closed, possibly by a concurrent caller
    AlreadyClosed,
    /// Neither the deadline passed nor has every player submitted
    NotDue { deadline: DateTime<Utc> },
    /// The game is in the lobby or completed
    NoOpenRound,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoundSummary {
    pub round: Round,
    pub scores: Vec<RoundScore>,
    pub next: NextStep,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NextStep {
    NextRound(Round),
    GameCompleted(Vec<Standing>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub round_number: i32,
    pub accepted: Vec<String>,
    /// Words this player had already submitted in the round
    pub duplicates: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreMismatch {
    pub player_id: PlayerId,
    pub recorded: i32,
    pub from_rounds: i32,
}

/// Drives one game from its first round to completion.
///
/// Closing is safe to call redundantly and concurrently: the store's
/// compare-and-set on the round's end time lets exactly one caller apply the
/// scores and open the next round. Everyone else gets
/// [`CloseOutcome::AlreadyClosed`].
pub struct RoundLifecycleController {
    game_id: GameId,
    store: Arc<dyn GameStore>,
    planner: Mutex<RoundPlanner>,
    validator: SubmissionValidator,
    min_players: usize,
    events: Mutex<GameEventBus>,
}

impl RoundLifecycleController {
    pub fn new(
        game_id: GameId,
        store: Arc<dyn GameStore>,
        catalog: Arc<TopicCatalog>,
        random: Box<dyn RandomSource>,
        settings: &LifecycleSettings,
    ) -> Self {
        Self::with_usage(game_id, store, catalog, random, settings, TopicUsage::new())
    }

    /// Controller for a game that may already have played rounds. Topics
    /// shown in those rounds count as used.
    pub async fn resume(
        game_id: GameId,
        store: Arc<dyn GameStore>,
        catalog: Arc<TopicCatalog>,
        random: Box<dyn RandomSource>,
        settings: &LifecycleSettings,
    ) -> Result<Self, LifecycleError> {
        if store.find_game(game_id).await?.is_none() {
            return Err(LifecycleError::GameNotFound(game_id));
        }
        let rounds = store.list_rounds(game_id).await?;
        let usage = TopicUsage::from_rounds(&catalog, &rounds);
        debug!(game_id = %game_id, rounds = rounds.len(), "Resumed round controller");

        Ok(Self::with_usage(game_id, store, catalog, random, settings, usage))
    }

    fn with_usage(
        game_id: GameId,
        store: Arc<dyn GameStore>,
        catalog: Arc<TopicCatalog>,
        random: Box<dyn RandomSource>,
        settings: &LifecycleSettings,
        usage: TopicUsage,
    ) -> Self {
        Self {
            game_id,
            store,
            planner: Mutex::new(RoundPlanner::new(catalog, usage, random)),
            validator: SubmissionValidator::new(settings.max_words_per_round),
            min_players: settings.min_players,
            events: Mutex::new(GameEventBus::new()),
        }
    }

    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    pub async fn subscribe(&self, handler: Box<dyn GameEventHandler>) {
        self.events.lock().await.add_handler(handler);
    }

    pub async fn game(&self) -> Result<Game, LifecycleError> {
        self.store
            .find_game(self.game_id)
            .await?
            .ok_or(LifecycleError::GameNotFound(self.game_id))
    }

    /// Leave the lobby and open round 1. Only the host may start, and only
    /// with enough players.
    pub async fn start_game(
        &self,
        requested_by: PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Round, LifecycleError> {
        let game = self.game().await?;
        require_status(&game, GameStatus::Lobby)?;

        let players = self.store.list_players(self.game_id).await?;
        let requester = players
            .iter()
            .find(|p| p.id == requested_by)
            .ok_or(LifecycleError::PlayerNotInGame(requested_by))?;
        if !requester.is_host {
            return Err(LifecycleError::NotHost);
        }
        // Never fewer than two, whatever the settings say
        let required = self.min_players.max(DEFAULT_MIN_PLAYERS);
        if players.len() < required {
            return Err(LifecycleError::NotEnoughPlayers {
                required,
                actual: players.len(),
            });
        }

        let plan = self.planner.lock().await.plan_round(1, None)?;
        let round = Round::open(self.game_id, 1, plan.round_type, plan.topic.clone(), now);

        if !self.store.start_game(self.game_id, &round).await? {
            return Err(LifecycleError::InvalidGameState {
                expected: GameStatus::Lobby,
                actual: GameStatus::InProgress,
            });
        }
        self.planner.lock().await.commit(&plan);

        info!(
            game_id = %self.game_id,
            players = players.len(),
            round_type = %round.round_type,
            topic = %round.topic.prompt,
            "Game started"
        );
        self.publish(GameEvent::GameStarted {
            game_id: self.game_id,
            first_round: round.clone(),
        })
        .await;

        Ok(round)
    }

    /// Record words for the current round. Words the player already submitted
    /// are reported back as duplicates rather than failing the call.
    pub async fn submit_words(
        &self,
        player_id: PlayerId,
        words: &[String],
        is_final: bool,
        now: DateTime<Utc>,
    ) -> Result<SubmissionReceipt, LifecycleError> {
        let game = self.game().await?;
        require_status(&game, GameStatus::InProgress)?;

        let players = self.store.list_players(self.game_id).await?;
        if !players.iter().any(|p| p.id == player_id) {
            return Err(LifecycleError::PlayerNotInGame(player_id));
        }

        let round = self
            .store
            .latest_round(self.game_id)
            .await?
            .ok_or(LifecycleError::NoOpenRound(self.game_id))?;
        if !round.is_open() {
            return Err(LifecycleError::RoundClosed(round.id));
        }

        let words = self
            .validator
            .normalize_batch(words)
            .map_err(LifecycleError::InvalidWord)?;

        let batch: Vec<Submission> = words
            .into_iter()
            .map(|word| Submission {
                round_id: round.id,
                player_id,
                word,
                is_final,
                submitted_at: now,
            })
            .collect();
        let max_words = self.validator.max_words_per_round();
        let (accepted, duplicates) = match self.store.insert_submissions(&batch, max_words).await? {
            SubmissionOutcome::Recorded {
                accepted,
                duplicates,
            } => (accepted, duplicates),
            SubmissionOutcome::RoundClosed => return Err(LifecycleError::RoundClosed(round.id)),
            SubmissionOutcome::LimitReached => {
                return Err(LifecycleError::TooManyWords { max: max_words });
            }
        };

        debug!(
            game_id = %self.game_id,
            player_id = %player_id,
            round_number = round.round_number,
            accepted = accepted.len(),
            duplicates = duplicates.len(),
            "Recorded submission"
        );
        if !accepted.is_empty() {
            self.publish(GameEvent::SubmissionRecorded {
                game_id: self.game_id,
                player_id,
                round_number: round.round_number,
                words: accepted.clone(),
            })
            .await;
        }

        Ok(SubmissionReceipt {
            round_number: round.round_number,
            accepted,
            duplicates,
        })
    }

    /// Close the current round if its deadline has passed or every player has
    /// submitted. Safe to call from any number of pollers at once.
    pub async fn close_round_if_due(&self, now: DateTime<Utc>) -> Result<CloseOutcome, LifecycleError> {
        let game = self.game().await?;
        if game.status != GameStatus::InProgress {
            return Ok(CloseOutcome::NoOpenRound);
        }

        let Some(round) = self.store.latest_round(self.game_id).await? else {
            return Ok(CloseOutcome::NoOpenRound);
        };
        if !round.is_open() {
            return Ok(CloseOutcome::AlreadyClosed);
        }

        let players = self.store.list_players(self.game_id).await?;
        let submissions = self.store.list_submissions(round.id).await?;
        if !round_is_due(&game, &round, &players, &submissions, now) {
            return Ok(CloseOutcome::NotDue {
                deadline: round.deadline(game.time_per_round_secs),
            });
        }

        self.close_open_round(game, round, players, submissions, now).await
    }

    /// Close a specific round right away, whether or not it is due.
    pub async fn close_round(
        &self,
        round_id: RoundId,
        now: DateTime<Utc>,
    ) -> Result<CloseOutcome, LifecycleError> {
        let round = self
            .store
            .find_round(round_id)
            .await?
            .filter(|r| r.game_id == self.game_id)
            .ok_or(LifecycleError::RoundNotFound(round_id))?;
        if !round.is_open() {
            return Ok(CloseOutcome::AlreadyClosed);
        }

        let game = self.game().await?;
        let players = self.store.list_players(self.game_id).await?;
        let submissions = self.store.list_submissions(round.id).await?;
        self.close_open_round(game, round, players, submissions, now).await
    }

    async fn close_open_round(
        &self,
        game: Game,
        mut round: Round,
        players: Vec<Player>,
        mut submissions: Vec<Submission>,
        now: DateTime<Utc>,
    ) -> Result<CloseOutcome, LifecycleError> {
        let plan = if game.is_last_round(round.round_number) {
            None
        } else {
            let mut planner = self.planner.lock().await;
            Some(planner.plan_round(round.round_number + 1, Some(round.round_type))?)
        };
        let transition = match &plan {
            Some(plan) => RoundTransition::OpenNext(Round::open(
                self.game_id,
                plan.round_number,
                plan.round_type,
                plan.topic.clone(),
                now,
            )),
            None => RoundTransition::CompleteGame,
        };

        let mut attempt = 0;
        let scores = loop {
            attempt += 1;
            let scores = score_submissions(&round, &players, &submissions);
            let commit = RoundCloseCommit {
                game_id: self.game_id,
                round_id: round.id,
                end_time: now,
                scored_submissions: submissions.len(),
                scores: scores.clone(),
                transition: transition.clone(),
            };

            match self.store.commit_round_close(&commit).await? {
                CloseCommitOutcome::Committed => break scores,
                CloseCommitOutcome::AlreadyClosed => {
                    debug!(
                        game_id = %self.game_id,
                        round_number = round.round_number,
                        "Round was closed by another caller"
                    );
                    return Ok(CloseOutcome::AlreadyClosed);
                }
                CloseCommitOutcome::StaleSubmissions if attempt < MAX_CLOSE_ATTEMPTS => {
                    warn!(
                        game_id = %self.game_id,
                        round_number = round.round_number,
                        "Submissions changed while closing, rescoring"
                    );
                    submissions = self.store.list_submissions(round.id).await?;
                }
                CloseCommitOutcome::StaleSubmissions => {
                    return Err(StoreError::Conflict(format!(
                        "submissions for round {} kept changing while closing",
                        round.round_number
                    ))
                    .into());
                }
            }
        };

        if let Some(plan) = &plan {
            self.planner.lock().await.commit(plan);
        }
        round.end_time = Some(now);

        info!(
            game_id = %self.game_id,
            round_number = round.round_number,
            round_type = %round.round_type,
            submissions = submissions.len(),
            "Round closed"
        );
        self.publish(GameEvent::RoundClosed {
            game_id: self.game_id,
            round_number: round.round_number,
            scores: scores.clone(),
        })
        .await;

        let next = match transition {
            RoundTransition::OpenNext(next_round) => {
                info!(
                    game_id = %self.game_id,
                    round_number = next_round.round_number,
                    round_type = %next_round.round_type,
                    topic = %next_round.topic.prompt,
                    "Round opened"
                );
                self.publish(GameEvent::RoundOpened {
                    game_id: self.game_id,
                    round: next_round.clone(),
                })
                .await;
                NextStep::NextRound(next_round)
            }
            RoundTransition::CompleteGame => {
                let standings = rank_players(&apply_scores(players, &scores));
                info!(game_id = %self.game_id, rounds = round.round_number, "Game completed");
                self.publish(GameEvent::GameCompleted {
                    game_id: self.game_id,
                    standings: standings.clone(),
                })
                .await;
                NextStep::GameCompleted(standings)
            }
        };

        Ok(CloseOutcome::Closed(RoundSummary {
            round,
            scores,
            next,
        }))
    }

    pub async fn standings(&self) -> Result<Vec<Standing>, LifecycleError> {
        let players = self.store.list_players(self.game_id).await?;
        Ok(rank_players(&players))
    }

    /// Compare every player's running total with the sum of their stored round scores
    pub async fn verify_totals(&self) -> Result<Vec<ScoreMismatch>, LifecycleError> {
        let mut from_rounds: HashMap<PlayerId, i32> = HashMap::new();
        for round in self.store.list_rounds(self.game_id).await? {
            if round.is_open() {
                continue;
            }
            for score in self.store.list_round_scores(round.id).await? {
                *from_rounds.entry(score.player_id).or_default() += score.score;
            }
        }

        let players = self.store.list_players(self.game_id).await?;
        Ok(players
            .into_iter()
            .filter_map(|p| {
                let expected = from_rounds.get(&p.id).copied().unwrap_or(0);
                (expected != p.score).then_some(ScoreMismatch {
                    player_id: p.id,
                    recorded: p.score,
                    from_rounds: expected,
                })
            })
            .collect())
    }

    async fn publish(&self, event: GameEvent) {
        self.events.lock().await.publish(event);
    }
}

fn require_status(game: &Game, expected: GameStatus) -> Result<(), LifecycleError> {
    if game.status != expected {
        return Err(LifecycleError::InvalidGameState {
            expected,
            actual: game.status,
        });
    }
    Ok(())
}

/// A round is due once its time is up or every player on the roster has
/// submitted at least one word. The roster is the players who had joined
/// when the round opened.
pub fn round_is_due(
    game: &Game,
    round: &Round,
    players: &[Player],
    submissions: &[Submission],
    now: DateTime<Utc>,
) -> bool {
    if now >= round.deadline(game.time_per_round_secs) {
        return true;
    }

    let mut roster = players.iter().filter(|p| p.joined_at <= round.start_time).peekable();
    roster.peek().is_some()
        && roster.all(|p| submissions.iter().any(|s| s.player_id == p.id))
}

/// One score row per player, in roster order. Players who submitted nothing score 0.
fn score_submissions(round: &Round, players: &[Player], submissions: &[Submission]) -> Vec<RoundScore> {
    let mut words: HashMap<PlayerId, Vec<String>> =
        players.iter().map(|p| (p.id, Vec::new())).collect();
    for submission in submissions {
        if let Some(list) = words.get_mut(&submission.player_id) {
            list.push(submission.word.clone());
        }
    }

    let mut results = RoundScorer::score_round(&words, round.round_type);
    players
        .iter()
        .map(|p| {
            results
                .remove(&p.id)
                .unwrap_or_default()
                .into_round_score(round.id, p.id)
        })
        .collect()
}

fn apply_scores(mut players: Vec<Player>, scores: &[RoundScore]) -> Vec<Player> {
    for player in &mut players {
        if let Some(score) = scores.iter().find(|s| s.player_id == player.id) {
            player.score += score.score;
        }
    }
    players
}

/// Order players by total score. Tied players share the better rank.
pub fn rank_players(players: &[Player]) -> Vec<Standing> {
    let mut ordered: Vec<&Player> = players.iter().collect();
    ordered.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.name.cmp(&b.name)));

    ordered
        .iter()
        .map(|p| Standing {
            rank: 1 + players.iter().filter(|other| other.score > p.score).count() as i32,
            player_id: p.id,
            name: p.name.clone(),
            score: p.score,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use game_types::{GameSettings, RoundType, Topic};

    fn player(name: &str, score: i32, joined_at: DateTime<Utc>) -> Player {
        Player {
            score,
            ..Player::new(uuid::Uuid::new_v4(), name.to_string(), false, joined_at)
        }
    }

    fn submission(round: &Round, player: &Player, word: &str) -> Submission {
        Submission {
            round_id: round.id,
            player_id: player.id,
            word: word.to_string(),
            is_final: false,
            submitted_at: round.start_time,
        }
    }

    #[test]
    fn test_rank_players_shares_ties() {
        let now = Utc::now();
        let players = vec![
            player("Cleo", 3, now),
            player("Ava", 7, now),
            player("Ben", 7, now),
            player("Dan", 1, now),
        ];

        let standings = rank_players(&players);
        let summary: Vec<(&str, i32)> = standings.iter().map(|s| (s.name.as_str(), s.rank)).collect();
        assert_eq!(summary, vec![("Ava", 1), ("Ben", 1), ("Cleo", 3), ("Dan", 4)]);
    }

    #[test]
    fn test_round_is_due() {
        let start = Utc::now();
        let game = Game::new(uuid::Uuid::new_v4(), "CODE42".into(), &GameSettings::default(), start);
        let round = Round::open(game.id, 1, RoundType::Match, Topic { id: 0, prompt: "Animals".into() }, start);
        let alice = player("Alice", 0, start - Duration::seconds(5));
        let bob = player("Bob", 0, start - Duration::seconds(5));
        let late = player("Late", 0, start + Duration::seconds(5));
        let players = vec![alice.clone(), bob.clone(), late];

        let soon = start + Duration::seconds(10);
        assert!(!round_is_due(&game, &round, &players, &[], soon));
        assert!(!round_is_due(&game, &round, &players, &[submission(&round, &alice, "cat")], soon));

        // The late joiner is not on the roster
        let everyone = vec![submission(&round, &alice, "cat"), submission(&round, &bob, "dog")];
        assert!(round_is_due(&game, &round, &players, &everyone, soon));

        let deadline = round.deadline(game.time_per_round_secs);
        assert!(round_is_due(&game, &round, &players, &[], deadline));
        assert!(!round_is_due(&game, &round, &players, &[], deadline - Duration::seconds(1)));
    }

    #[test]
    fn test_score_submissions_covers_whole_roster() {
        let start = Utc::now();
        let round = Round::open(uuid::Uuid::new_v4(), 1, RoundType::Unmatch, Topic { id: 0, prompt: "Fruit".into() }, start);
        let alice = player("Alice", 0, start);
        let bob = player("Bob", 0, start);
        let submissions = vec![submission(&round, &alice, "kiwi"), submission(&round, &alice, "plum")];

        let scores = score_submissions(&round, &[alice.clone(), bob.clone()], &submissions);
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].player_id, alice.id);
        assert_eq!(scores[0].score, 3);
        assert!(scores[0].bonus_awarded);
        assert_eq!(scores[1].player_id, bob.id);
        assert_eq!(scores[1].score, 0);
        assert!(!scores[1].bonus_awarded);
    }
}
