use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "movies")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub title: String,
    pub release_date: String,
    pub detail_url: String,
    pub poster_url: String,
    pub is_anime: bool,
    #[sea_orm(column_type = "Text")]
    pub showtimes: String,
    #[sea_orm(column_type = "Text")]
    pub overview: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
