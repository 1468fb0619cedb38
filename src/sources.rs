use async_trait::async_trait;

use crate::{
    error::AppResult,
    models::{Listing, MovieMetadata, ShowtimeLookup},
};

/// A theater website that can be browsed in short-lived sessions.
#[async_trait]
pub trait Cinema: Send + Sync {
    /// Opens a browsing session. The session is released when dropped.
    async fn open_session(&self) -> AppResult<Box<dyn CinemaSession>>;
}

#[async_trait]
pub trait CinemaSession: Send {
    /// Every listing across the theater's listing pages, one per title.
    async fn scrape_all_candidates(&mut self) -> AppResult<Vec<Listing>>;

    async fn fetch_showtimes(&mut self, detail_url: &str) -> ShowtimeLookup;
}

#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// `Ok(None)` when the title has no match.
    async fn lookup_by_title(&self, title: &str) -> AppResult<Option<MovieMetadata>>;
}
