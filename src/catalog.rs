use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    sea_query::{Expr, OnConflict},
};

use crate::{
    entities::movie,
    error::AppResult,
    models::{Listing, MovieRecord, ShowtimeDates},
};

/// Every movie ever sighted, keyed by title.
#[derive(Clone)]
pub struct CatalogStore {
    db: DatabaseConnection,
}

impl CatalogStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn get(&self, title: &str) -> AppResult<Option<MovieRecord>> {
        let movie = movie::Entity::find_by_id(title.to_string()).one(&self.db).await?;
        Ok(movie.map(into_record))
    }

    pub async fn upsert(
        &self,
        listing: &Listing,
        showtimes: &ShowtimeDates,
        is_anime: bool,
        overview: &str,
    ) -> AppResult<()> {
        let model = movie::ActiveModel {
            title: Set(listing.title.clone()),
            release_date: Set(listing.release_date.clone()),
            detail_url: Set(listing.detail_url.clone()),
            poster_url: Set(listing.poster_url.clone()),
            is_anime: Set(is_anime),
            showtimes: Set(showtimes.format()),
            overview: Set(overview.to_string()),
        };

        movie::Entity::insert(model)
            .on_conflict(
                OnConflict::column(movie::Column::Title)
                    .update_columns([
                        movie::Column::ReleaseDate,
                        movie::Column::DetailUrl,
                        movie::Column::PosterUrl,
                        movie::Column::IsAnime,
                        movie::Column::Showtimes,
                        movie::Column::Overview,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        Ok(())
    }

    /// Rewrites only the showtimes column.
    pub async fn update_showtimes(&self, title: &str, showtimes: &ShowtimeDates) -> AppResult<()> {
        movie::Entity::update_many()
            .col_expr(movie::Column::Showtimes, Expr::value(showtimes.format()))
            .filter(movie::Column::Title.eq(title))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    pub async fn list_all_titles(&self) -> AppResult<Vec<String>> {
        let titles = movie::Entity::find()
            .select_only()
            .column(movie::Column::Title)
            .order_by_asc(movie::Column::Title)
            .into_tuple::<String>()
            .all(&self.db)
            .await?;
        Ok(titles)
    }

    /// Case-insensitive substring filter over all titles, for autocomplete.
    pub async fn search_titles(&self, query: &str, limit: usize) -> AppResult<Vec<String>> {
        let needle = query.trim().to_lowercase();
        let titles = self.list_all_titles().await?;
        Ok(titles.into_iter().filter(|t| t.to_lowercase().contains(&needle)).take(limit).collect())
    }
}

fn into_record(model: movie::Model) -> MovieRecord {
    MovieRecord {
        showtimes: ShowtimeDates::parse(&model.showtimes),
        title: model.title,
        release_date: model.release_date,
        detail_url: model.detail_url,
        poster_url: model.poster_url,
        is_anime: model.is_anime,
        overview: model.overview,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn listing(title: &str) -> Listing {
        Listing {
            title: title.to_string(),
            release_date: "2025-03-07".to_string(),
            detail_url: format!("https://www.cinemark.com/movies/{}", title.to_lowercase()),
            poster_url: "https://img.example/poster.jpg".to_string(),
        }
    }

    async fn store() -> CatalogStore {
        CatalogStore::new(db::memory().await)
    }

    #[tokio::test]
    async fn missing_title_is_absent() {
        assert_eq!(store().await.get("Nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let store = store().await;
        let dates = ShowtimeDates::from_labels(["Fri Mar 7", "Sat Mar 8"]);

        store.upsert(&listing("Flow"), &dates, true, "A cat and a flood.").await.unwrap();
        let once = store.get("Flow").await.unwrap();
        store.upsert(&listing("Flow"), &dates, true, "A cat and a flood.").await.unwrap();
        let twice = store.get("Flow").await.unwrap();

        assert_eq!(once, twice);
        let record = twice.unwrap();
        assert!(record.is_anime);
        assert_eq!(record.showtimes, dates);
        assert_eq!(store.list_all_titles().await.unwrap(), vec!["Flow"]);
    }

    #[tokio::test]
    async fn upsert_replaces_every_field() {
        let store = store().await;
        store.upsert(&listing("Flow"), &ShowtimeDates::default(), false, "old").await.unwrap();

        let mut updated = listing("Flow");
        updated.poster_url = "https://img.example/new.jpg".to_string();
        store.upsert(&updated, &ShowtimeDates::from_labels(["Sun"]), true, "new").await.unwrap();

        let record = store.get("Flow").await.unwrap().unwrap();
        assert_eq!(record.poster_url, "https://img.example/new.jpg");
        assert_eq!(record.overview, "new");
        assert!(record.is_anime);
        assert_eq!(record.showtimes.format(), "Sun");
    }

    #[tokio::test]
    async fn update_showtimes_leaves_other_fields() {
        let store = store().await;
        store.upsert(&listing("Flow"), &ShowtimeDates::from_labels(["Fri"]), true, "overview")
            .await
            .unwrap();

        store.update_showtimes("Flow", &ShowtimeDates::from_labels(["Fri", "Sat"])).await.unwrap();

        let record = store.get("Flow").await.unwrap().unwrap();
        assert_eq!(record.showtimes.format(), "Fri, Sat");
        assert_eq!(record.overview, "overview");
        assert!(record.is_anime);
    }

    #[tokio::test]
    async fn titles_are_sorted_and_searchable() {
        let store = store().await;
        for title in ["Wicked", "Anora", "Moana 2", "The Wild Robot"] {
            store.upsert(&listing(title), &ShowtimeDates::default(), false, "").await.unwrap();
        }

        assert_eq!(
            store.list_all_titles().await.unwrap(),
            vec!["Anora", "Moana 2", "The Wild Robot", "Wicked"]
        );
        assert_eq!(store.search_titles("WI", 25).await.unwrap(), vec!["The Wild Robot", "Wicked"]);
        assert_eq!(store.search_titles("", 2).await.unwrap(), vec!["Anora", "Moana 2"]);
    }
}
