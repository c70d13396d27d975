use async_trait::async_trait;
use game_core::{
    CloseCommitOutcome, GameStore, RoundCloseCommit, RoundTransition, StoreError,
    SubmissionOutcome,
};
use game_types::{
    Game, GameId, GameStatus, Player, Round, RoundId, RoundScore, Submission, Topic,
};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, SqlErr, TransactionTrait,
};

use crate::entities::{games, players, prelude::*, round_scores, rounds, submissions};

/// [`GameStore`] backed by a SeaORM connection. Multi-row writes run in a
/// transaction, and the compare-and-set operations filter on the expected
/// state and check `rows_affected`.
#[derive(Clone)]
pub struct SeaOrmGameStore {
    db: DatabaseConnection,
}

impl SeaOrmGameStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn model_to_game(model: games::Model) -> Result<Game, StoreError> {
        Ok(Game {
            id: model.id,
            join_code: model.join_code,
            status: model.status.parse().map_err(StoreError::backend)?,
            round_count: model.round_count,
            current_round: model.current_round,
            time_per_round_secs: model.time_per_round_secs,
            max_players: model.max_players,
            created_at: model.created_at,
        })
    }

    fn model_to_player(model: players::Model) -> Player {
        Player {
            id: model.id,
            game_id: model.game_id,
            name: model.name,
            score: model.score,
            is_host: model.is_host,
            joined_at: model.joined_at,
        }
    }

    fn model_to_round(model: rounds::Model) -> Result<Round, StoreError> {
        Ok(Round {
            id: model.id,
            game_id: model.game_id,
            round_number: model.round_number,
            round_type: model.round_type.parse().map_err(StoreError::backend)?,
            topic: Topic {
                id: model.topic_id,
                prompt: model.topic_prompt,
            },
            start_time: model.start_time,
            end_time: model.end_time,
        })
    }

    fn model_to_submission(model: submissions::Model) -> Submission {
        Submission {
            round_id: model.round_id,
            player_id: model.player_id,
            word: model.word,
            is_final: model.is_final,
            submitted_at: model.submitted_at,
        }
    }

    fn model_to_round_score(model: round_scores::Model) -> Result<RoundScore, StoreError> {
        Ok(RoundScore {
            round_id: model.round_id,
            player_id: model.player_id,
            score: model.score,
            matched_words: serde_json::from_str(&model.matched_words)
                .map_err(StoreError::backend)?,
            bonus_awarded: model.bonus_awarded,
        })
    }

    fn round_to_active(round: &Round) -> rounds::ActiveModel {
        rounds::ActiveModel {
            id: Set(round.id),
            game_id: Set(round.game_id),
            round_number: Set(round.round_number),
            round_type: Set(round.round_type.as_str().to_string()),
            topic_id: Set(round.topic.id),
            topic_prompt: Set(round.topic.prompt.clone()),
            start_time: Set(round.start_time),
            end_time: Set(round.end_time),
        }
    }

    fn score_to_active(score: &RoundScore) -> Result<round_scores::ActiveModel, StoreError> {
        Ok(round_scores::ActiveModel {
            round_id: Set(score.round_id),
            player_id: Set(score.player_id),
            score: Set(score.score),
            matched_words: Set(
                serde_json::to_string(&score.matched_words).map_err(StoreError::backend)?
            ),
            bonus_awarded: Set(score.bonus_awarded),
        })
    }

    async fn round_exists<C: ConnectionTrait>(conn: &C, round_id: RoundId) -> Result<bool, StoreError> {
        Ok(Rounds::find_by_id(round_id)
            .one(conn)
            .await
            .map_err(StoreError::backend)?
            .is_some())
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

fn not_found(entity: &'static str, id: impl ToString) -> StoreError {
    StoreError::NotFound {
        entity,
        id: id.to_string(),
    }
}

#[async_trait]
impl GameStore for SeaOrmGameStore {
    async fn insert_game(&self, game: &Game) -> Result<(), StoreError> {
        let model = games::ActiveModel {
            id: Set(game.id),
            join_code: Set(game.join_code.clone()),
            status: Set(game.status.as_str().to_string()),
            round_count: Set(game.round_count),
            current_round: Set(game.current_round),
            time_per_round_secs: Set(game.time_per_round_secs),
            max_players: Set(game.max_players),
            created_at: Set(game.created_at),
        };

        match Games::insert(model).exec_without_returning(&self.db).await {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(StoreError::Conflict(format!(
                "join code {} already in use",
                game.join_code
            ))),
            Err(err) => Err(StoreError::backend(err)),
        }
    }

    async fn find_game(&self, game_id: GameId) -> Result<Option<Game>, StoreError> {
        Games::find_by_id(game_id)
            .one(&self.db)
            .await
            .map_err(StoreError::backend)?
            .map(Self::model_to_game)
            .transpose()
    }

    async fn find_game_by_join_code(&self, join_code: &str) -> Result<Option<Game>, StoreError> {
        Games::find()
            .filter(games::Column::JoinCode.eq(join_code))
            .one(&self.db)
            .await
            .map_err(StoreError::backend)?
            .map(Self::model_to_game)
            .transpose()
    }

    async fn list_games_by_status(&self, status: GameStatus) -> Result<Vec<Game>, StoreError> {
        Games::find()
            .filter(games::Column::Status.eq(status.as_str()))
            .order_by_asc(games::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(StoreError::backend)?
            .into_iter()
            .map(Self::model_to_game)
            .collect()
    }

    async fn insert_player(&self, player: &Player) -> Result<(), StoreError> {
        if Games::find_by_id(player.game_id)
            .one(&self.db)
            .await
            .map_err(StoreError::backend)?
            .is_none()
        {
            return Err(not_found("game", player.game_id));
        }

        let model = players::ActiveModel {
            id: Set(player.id),
            game_id: Set(player.game_id),
            name: Set(player.name.clone()),
            score: Set(player.score),
            is_host: Set(player.is_host),
            joined_at: Set(player.joined_at),
        };
        Players::insert(model)
            .exec_without_returning(&self.db)
            .await
            .map_err(StoreError::backend)?;
        Ok(())
    }

    async fn list_players(&self, game_id: GameId) -> Result<Vec<Player>, StoreError> {
        let players = Players::find()
            .filter(players::Column::GameId.eq(game_id))
            .order_by_asc(players::Column::JoinedAt)
            .all(&self.db)
            .await
            .map_err(StoreError::backend)?;

        Ok(players.into_iter().map(Self::model_to_player).collect())
    }

    async fn find_round(&self, round_id: RoundId) -> Result<Option<Round>, StoreError> {
        Rounds::find_by_id(round_id)
            .one(&self.db)
            .await
            .map_err(StoreError::backend)?
            .map(Self::model_to_round)
            .transpose()
    }

    async fn latest_round(&self, game_id: GameId) -> Result<Option<Round>, StoreError> {
        Rounds::find()
            .filter(rounds::Column::GameId.eq(game_id))
            .order_by_desc(rounds::Column::RoundNumber)
            .one(&self.db)
            .await
            .map_err(StoreError::backend)?
            .map(Self::model_to_round)
            .transpose()
    }

    async fn list_rounds(&self, game_id: GameId) -> Result<Vec<Round>, StoreError> {
        Rounds::find()
            .filter(rounds::Column::GameId.eq(game_id))
            .order_by_asc(rounds::Column::RoundNumber)
            .all(&self.db)
            .await
            .map_err(StoreError::backend)?
            .into_iter()
            .map(Self::model_to_round)
            .collect()
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

        // Every early return drops `txn`, which rolls back
        let txn = self.db.begin().await.map_err(StoreError::backend)?;

        // No-op write on the open round so the transaction holds the write lock
        // before it counts; a close or a second batch waits behind it
        let open = Rounds::update_many()
            .col_expr(rounds::Column::EndTime, Expr::col(rounds::Column::EndTime).into())
            .filter(rounds::Column::Id.eq(first.round_id))
            .filter(rounds::Column::EndTime.is_null())
            .exec(&txn)
            .await
            .map_err(StoreError::backend)?;
        if open.rows_affected == 0 {
            return if Self::round_exists(&txn, first.round_id).await? {
                Ok(SubmissionOutcome::RoundClosed)
            } else {
                Err(not_found("round", first.round_id))
            };
        }

        let existing: Vec<String> = Submissions::find()
            .filter(submissions::Column::RoundId.eq(first.round_id))
            .filter(submissions::Column::PlayerId.eq(first.player_id))
            .all(&txn)
            .await
            .map_err(StoreError::backend)?
            .into_iter()
            .map(|s| s.word)
            .collect();
        let (duplicates, fresh): (Vec<&Submission>, Vec<&Submission>) =
            batch.iter().partition(|s| existing.contains(&s.word));
        if existing.len() + fresh.len() > max_words {
            return Ok(SubmissionOutcome::LimitReached);
        }

        if !fresh.is_empty() {
            let models = fresh.iter().map(|submission| submissions::ActiveModel {
                round_id: Set(submission.round_id),
                player_id: Set(submission.player_id),
                word: Set(submission.word.clone()),
                is_final: Set(submission.is_final),
                submitted_at: Set(submission.submitted_at),
                ..Default::default()
            });
            match Submissions::insert_many(models).exec_without_returning(&txn).await {
                Ok(_) => {}
                Err(err) if is_unique_violation(&err) => {
                    return Err(StoreError::Conflict(format!(
                        "duplicate word in submission batch for round {}",
                        first.round_id
                    )));
                }
                Err(err) => return Err(StoreError::backend(err)),
            }
        }

        txn.commit().await.map_err(StoreError::backend)?;
        Ok(SubmissionOutcome::Recorded {
            accepted: fresh.iter().map(|s| s.word.clone()).collect(),
            duplicates: duplicates.iter().map(|s| s.word.clone()).collect(),
        })
    }

    async fn list_submissions(&self, round_id: RoundId) -> Result<Vec<Submission>, StoreError> {
        let submissions = Submissions::find()
            .filter(submissions::Column::RoundId.eq(round_id))
            .order_by_asc(submissions::Column::Id)
            .all(&self.db)
            .await
            .map_err(StoreError::backend)?;

        Ok(submissions
            .into_iter()
            .map(Self::model_to_submission)
            .collect())
    }

    async fn list_round_scores(&self, round_id: RoundId) -> Result<Vec<RoundScore>, StoreError> {
        RoundScores::find()
            .filter(round_scores::Column::RoundId.eq(round_id))
            .all(&self.db)
            .await
            .map_err(StoreError::backend)?
            .into_iter()
            .map(Self::model_to_round_score)
            .collect()
    }

    async fn start_game(&self, game_id: GameId, first_round: &Round) -> Result<bool, StoreError> {
        let txn = self.db.begin().await.map_err(StoreError::backend)?;

        let result = Games::update_many()
            .col_expr(
                games::Column::Status,
                Expr::value(GameStatus::InProgress.as_str()),
            )
            .col_expr(
                games::Column::CurrentRound,
                Expr::value(first_round.round_number),
            )
            .filter(games::Column::Id.eq(game_id))
            .filter(games::Column::Status.eq(GameStatus::Lobby.as_str()))
            .exec(&txn)
            .await
            .map_err(StoreError::backend)?;

        if result.rows_affected == 0 {
            let exists = Games::find_by_id(game_id)
                .one(&txn)
                .await
                .map_err(StoreError::backend)?
                .is_some();
            txn.rollback().await.map_err(StoreError::backend)?;
            return if exists {
                Ok(false)
            } else {
                Err(not_found("game", game_id))
            };
        }

        Rounds::insert(Self::round_to_active(first_round))
            .exec_without_returning(&txn)
            .await
            .map_err(StoreError::backend)?;

        txn.commit().await.map_err(StoreError::backend)?;
        Ok(true)
    }

    async fn commit_round_close(
        &self,
        commit: &RoundCloseCommit,
    ) -> Result<CloseCommitOutcome, StoreError> {
        // Every early return drops `txn`, which rolls back
        let txn = self.db.begin().await.map_err(StoreError::backend)?;

        let closed = Rounds::update_many()
            .col_expr(rounds::Column::EndTime, Expr::value(commit.end_time))
            .filter(rounds::Column::Id.eq(commit.round_id))
            .filter(rounds::Column::EndTime.is_null())
            .exec(&txn)
            .await
            .map_err(StoreError::backend)?;
        if closed.rows_affected == 0 {
            return if Self::round_exists(&txn, commit.round_id).await? {
                Ok(CloseCommitOutcome::AlreadyClosed)
            } else {
                Err(not_found("round", commit.round_id))
            };
        }

        let recorded = Submissions::find()
            .filter(submissions::Column::RoundId.eq(commit.round_id))
            .count(&txn)
            .await
            .map_err(StoreError::backend)?;
        if recorded != commit.scored_submissions as u64 {
            txn.rollback().await.map_err(StoreError::backend)?;
            return Ok(CloseCommitOutcome::StaleSubmissions);
        }

        for score in &commit.scores {
            let updated = Players::update_many()
                .col_expr(
                    players::Column::Score,
                    Expr::col(players::Column::Score).add(score.score),
                )
                .filter(players::Column::Id.eq(score.player_id))
                .filter(players::Column::GameId.eq(commit.game_id))
                .exec(&txn)
                .await
                .map_err(StoreError::backend)?;
            if updated.rows_affected == 0 {
                return Err(not_found("player", score.player_id));
            }
        }

        if !commit.scores.is_empty() {
            let models = commit
                .scores
                .iter()
                .map(Self::score_to_active)
                .collect::<Result<Vec<_>, _>>()?;
            RoundScores::insert_many(models)
                .exec_without_returning(&txn)
                .await
                .map_err(StoreError::backend)?;
        }

        let game_update = match &commit.transition {
            RoundTransition::OpenNext(next) => {
                match Rounds::insert(Self::round_to_active(next))
                    .exec_without_returning(&txn)
                    .await
                {
                    Ok(_) => {}
                    Err(err) if is_unique_violation(&err) => {
                        return Err(StoreError::Conflict(format!(
                            "round {} already exists",
                            next.round_number
                        )));
                    }
                    Err(err) => return Err(StoreError::backend(err)),
                }
                Games::update_many().col_expr(
                    games::Column::CurrentRound,
                    Expr::value(next.round_number),
                )
            }
            RoundTransition::CompleteGame => Games::update_many().col_expr(
                games::Column::Status,
                Expr::value(GameStatus::Completed.as_str()),
            ),
        };
        let updated = game_update
            .filter(games::Column::Id.eq(commit.game_id))
            .exec(&txn)
            .await
            .map_err(StoreError::backend)?;
        if updated.rows_affected == 0 {
            return Err(not_found("game", commit.game_id));
        }

        txn.commit().await.map_err(StoreError::backend)?;
        Ok(CloseCommitOutcome::Committed)
    }
}
