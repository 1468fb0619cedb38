use std::{
    collections::HashMap,
    num::NonZeroU32,
    sync::{Arc, LazyLock},
};

use async_trait::async_trait;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use regex::Regex;
use serde::{Deserialize, de::DeserializeOwned};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::{
    error::{AppError, AppResult},
    models::MovieMetadata,
    sources::MetadataSource,
};

/// TMDB keyword id for "anime".
const ANIME_KEYWORD_ID: i64 = 210024;
const OVERVIEW_MAX_CHARS: usize = 500;
const EDITION_KEYWORDS: [&str; 5] =
    ["anniversary", "imax", "exclusive", "remastered", "director's cut"];

static PARENTHESISED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\(.*\)").expect("static regex"));

pub struct TmdbClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    genres: OnceCell<HashMap<i64, String>>,
}

impl TmdbClient {
    pub fn new(client: reqwest::Client, api_key: String, base_url: String, rps: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN));
        let limiter = Arc::new(RateLimiter::direct(quota));
        Self { client, api_key, base_url, limiter, genres: OnceCell::new() }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> AppResult<T> {
        self.limiter.until_ready().await;

        let resp = self
            .client
            .get(self.url(path))
            .query(&[("api_key", self.api_key.as_str())])
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp)
    }

    async fn search_movie(&self, title: &str) -> AppResult<Option<SearchMovie>> {
        let resp: SearchResponse = self.get("search/movie", &[("query", title)]).await?;
        Ok(resp.results.into_iter().next())
    }

    async fn genre_names(&self) -> AppResult<&HashMap<i64, String>> {
        self.genres
            .get_or_try_init(|| async {
                let resp: GenreListResponse = self.get("genre/movie/list", &[]).await?;
                debug!(genres = resp.genres.len(), "loaded TMDB genre list");
                Ok::<_, AppError>(resp.genres.into_iter().map(|g| (g.id, g.name)).collect())
            })
            .await
    }

    async fn has_anime_keyword(&self, tmdb_id: i64) -> AppResult<bool> {
        let resp: KeywordsResponse = self.get(&format!("movie/{tmdb_id}/keywords"), &[]).await?;
        Ok(resp.keywords.iter().any(|k| k.id == ANIME_KEYWORD_ID))
    }
}

#[async_trait]
impl MetadataSource for TmdbClient {
    async fn lookup_by_title(&self, title: &str) -> AppResult<Option<MovieMetadata>> {
        let query = clean_title(title);
        debug!(title = %title, query = %query, "searching TMDB");

        let Some(movie) = self.search_movie(&query).await? else {
            debug!(title = %title, "no TMDB match");
            return Ok(None);
        };

        let overview = truncate_overview(
            movie
                .overview
                .as_deref()
                .filter(|o| !o.is_empty())
                .unwrap_or("No description available."),
        );

        let genre_map = self.genre_names().await?;
        let genres = movie
            .genre_ids
            .iter()
            .map(|id| genre_map.get(id).map(String::as_str).unwrap_or("?"))
            .collect::<Vec<_>>()
            .join(", ");

        let is_anime = self.has_anime_keyword(movie.id).await?;

        Ok(Some(MovieMetadata { is_anime, genres, overview }))
    }
}

/// Strips theater-specific decorations so the title matches TMDB's.
pub fn clean_title(title: &str) -> String {
    let cleaned = PARENTHESISED.replace_all(title, "");
    let cleaned = cleaned.trim();
    if let Some((base, edition)) = cleaned.split_once(':') {
        let edition = edition.to_lowercase();
        if EDITION_KEYWORDS.iter().any(|kw| edition.contains(kw)) {
            return base.trim().to_string();
        }
    }
    cleaned.to_string()
}

pub fn truncate_overview(overview: &str) -> String {
    if overview.chars().count() <= OVERVIEW_MAX_CHARS {
        return overview.to_string();
    }
    let mut out: String = overview.chars().take(OVERVIEW_MAX_CHARS - 3).collect();
    out.push_str("...");
    out
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<SearchMovie>,
}

#[derive(Debug, Deserialize)]
struct SearchMovie {
    id: i64,
    overview: Option<String>,
    #[serde(default)]
    genre_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct GenreListResponse {
    genres: Vec<Genre>,
}

#[derive(Debug, Deserialize)]
struct Genre {
    id: i64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct KeywordsResponse {
    #[serde(default)]
    keywords: Vec<Keyword>,
}

#[derive(Debug, Deserialize)]
struct Keyword {
    id: i64,
}
