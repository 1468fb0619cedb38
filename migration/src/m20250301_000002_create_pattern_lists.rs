use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Watchlist::Table)
                    .if_not_exists()
                    .col(big_integer(Watchlist::UserId))
                    .col(string(Watchlist::Pattern))
                    .col(boolean(Watchlist::IsRegex).default(false))
                    .primary_key(Index::create().col(Watchlist::UserId).col(Watchlist::Pattern))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_watchlist_pattern_regex")
                    .table(Watchlist::Table)
                    .col(Watchlist::Pattern)
                    .col(Watchlist::IsRegex)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(IgnoreList::Table)
                    .if_not_exists()
                    .col(big_integer(IgnoreList::UserId))
                    .col(string(IgnoreList::Pattern))
                    .col(boolean(IgnoreList::IsRegex).default(false))
                    .primary_key(Index::create().col(IgnoreList::UserId).col(IgnoreList::Pattern))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ignore_list_pattern_regex")
                    .table(IgnoreList::Table)
                    .col(IgnoreList::Pattern)
                    .col(IgnoreList::IsRegex)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(IgnoreList::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Watchlist::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Watchlist {
    Table,
    UserId,
    Pattern,
    IsRegex,
}

#[derive(DeriveIden)]
enum IgnoreList {
    Table,
    UserId,
    Pattern,
    IsRegex,
}
