use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Movies::Table)
                    .if_not_exists()
                    .col(string(Movies::Title).primary_key())
                    .col(string(Movies::ReleaseDate))
                    .col(string(Movies::DetailUrl))
                    .col(string(Movies::PosterUrl))
                    .col(boolean(Movies::IsAnime).default(false))
                    .col(text(Movies::Showtimes).default(""))
                    .col(text(Movies::Overview))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Movies::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Movies {
    Table,
    Title,
    ReleaseDate,
    DetailUrl,
    PosterUrl,
    IsAnime,
    Showtimes,
    Overview,
}
