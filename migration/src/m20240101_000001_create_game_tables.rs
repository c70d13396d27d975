use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Games::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Games::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Games::JoinCode)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Games::Status).string().not_null())
                    .col(ColumnDef::new(Games::RoundCount).integer().not_null())
                    .col(
                        ColumnDef::new(Games::CurrentRound)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Games::TimePerRoundSecs).integer().not_null())
                    .col(ColumnDef::new(Games::MaxPlayers).integer().not_null())
                    .col(
                        ColumnDef::new(Games::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Startup restores in-progress games by status
        manager
            .create_index(
                Index::create()
                    .name("idx_games_status")
                    .table(Games::Table)
                    .col(Games::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Players::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Players::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Players::GameId).uuid().not_null())
                    .col(ColumnDef::new(Players::Name).string().not_null())
                    .col(
                        ColumnDef::new(Players::Score)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Players::IsHost).boolean().not_null())
                    .col(
                        ColumnDef::new(Players::JoinedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_players_game")
                            .from(Players::Table, Players::GameId)
                            .to(Games::Table, Games::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_players_game_id")
                    .table(Players::Table)
                    .col(Players::GameId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Rounds::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Rounds::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Rounds::GameId).uuid().not_null())
                    .col(ColumnDef::new(Rounds::RoundNumber).integer().not_null())
                    .col(ColumnDef::new(Rounds::RoundType).string().not_null())
                    .col(ColumnDef::new(Rounds::TopicId).integer().not_null())
                    .col(ColumnDef::new(Rounds::TopicPrompt).string().not_null())
                    .col(
                        ColumnDef::new(Rounds::StartTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Rounds::EndTime).timestamp_with_time_zone().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rounds_game")
                            .from(Rounds::Table, Rounds::GameId)
                            .to(Games::Table, Games::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_rounds_game_round_number")
                    .table(Rounds::Table)
                    .col(Rounds::GameId)
                    .col(Rounds::RoundNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Submissions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Submissions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Submissions::RoundId).uuid().not_null())
                    .col(ColumnDef::new(Submissions::PlayerId).uuid().not_null())
                    .col(ColumnDef::new(Submissions::Word).string().not_null())
                    .col(ColumnDef::new(Submissions::IsFinal).boolean().not_null())
                    .col(
                        ColumnDef::new(Submissions::SubmittedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_submissions_round")
                            .from(Submissions::Table, Submissions::RoundId)
                            .to(Rounds::Table, Rounds::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_submissions_player")
                            .from(Submissions::Table, Submissions::PlayerId)
                            .to(Players::Table, Players::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // A player may submit each word once per round
        manager
            .create_index(
                Index::create()
                    .name("idx_submissions_round_player_word")
                    .table(Submissions::Table)
                    .col(Submissions::RoundId)
                    .col(Submissions::PlayerId)
                    .col(Submissions::Word)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RoundScores::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(RoundScores::RoundId).uuid().not_null())
                    .col(ColumnDef::new(RoundScores::PlayerId).uuid().not_null())
                    .col(ColumnDef::new(RoundScores::Score).integer().not_null())
                    .col(ColumnDef::new(RoundScores::MatchedWords).text().not_null())
                    .col(ColumnDef::new(RoundScores::BonusAwarded).boolean().not_null())
                    .primary_key(
                        Index::create()
                            .col(RoundScores::RoundId)
                            .col(RoundScores::PlayerId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_round_scores_round")
                            .from(RoundScores::Table, RoundScores::RoundId)
                            .to(Rounds::Table, Rounds::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_round_scores_player")
                            .from(RoundScores::Table, RoundScores::PlayerId)
                            .to(Players::Table, Players::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RoundScores::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Submissions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Rounds::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Players::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Games::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Games {
    Table,
    Id,
    JoinCode,
    Status,
    RoundCount,
    CurrentRound,
    TimePerRoundSecs,
    MaxPlayers,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Players {
    Table,
    Id,
    GameId,
    Name,
    Score,
    IsHost,
    JoinedAt,
}

#[derive(DeriveIden)]
enum Rounds {
    Table,
    Id,
    GameId,
    RoundNumber,
    RoundType,
    TopicId,
    TopicPrompt,
    StartTime,
    EndTime,
}

#[derive(DeriveIden)]
enum Submissions {
    Table,
    Id,
    RoundId,
    PlayerId,
    Word,
    IsFinal,
    SubmittedAt,
}

#[derive(DeriveIden)]
enum RoundScores {
    Table,
    RoundId,
    PlayerId,
    Score,
    MatchedWords,
    BonusAwarded,
}
