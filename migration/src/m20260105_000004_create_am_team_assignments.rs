use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AmTeamAssignments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AmTeamAssignments::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AmTeamAssignments::UserId).uuid().not_null())
                    .col(ColumnDef::new(AmTeamAssignments::TeamName).string().not_null())
                    .col(ColumnDef::new(AmTeamAssignments::TiktokAccountId).uuid().null())
                    .col(ColumnDef::new(AmTeamAssignments::InstagramAccountId).uuid().null())
                    .col(
                        ColumnDef::new(AmTeamAssignments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_am_team_assignments_user_id")
                    .table(AmTeamAssignments::Table)
                    .col(AmTeamAssignments::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AmTeamAssignments::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AmTeamAssignments {
    Table,
    Id,
    UserId,
    TeamName,
    TiktokAccountId,
    InstagramAccountId,
    CreatedAt,
}
