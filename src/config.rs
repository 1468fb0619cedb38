use std::{net::SocketAddr, time::Duration};

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub tmdb_api_key: String,
    pub tmdb_base_url: String,
    pub tmdb_rps: u32,
    pub theater_url: String,
    pub cinema_base_url: String,
    pub webhooks: Webhooks,
    pub check_interval_hours: u64,
    pub candidate_delay_ms: u64,
    pub page_delay_ms: u64,
}

/// Discord webhook per audience. The all-movies feed is optional.
#[derive(Clone, Debug, Default)]
pub struct Webhooks {
    pub all_movies: Option<String>,
    pub anime: Option<String>,
    pub watchlist: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "3000".to_string()).parse().context("PORT")?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://marquee.db?mode=rwc".to_string());

        let tmdb_api_key = required("TMDB_API_KEY")?;
        let tmdb_base_url = std::env::var("TMDB_BASE_URL")
            .unwrap_or_else(|_| "https://api.themoviedb.org/3".to_string());
        let tmdb_rps: u32 =
            std::env::var("TMDB_RPS").ok().and_then(|s| s.parse().ok()).unwrap_or(4);

        let theater_url = required("THEATER_URL")?;
        let cinema_base_url = std::env::var("CINEMA_BASE_URL")
            .unwrap_or_else(|_| "https://www.cinemark.com".to_string());

        let webhooks = Webhooks {
            all_movies: optional("DISCORD_WEBHOOK_ALL_MOVIES"),
            anime: Some(required("DISCORD_WEBHOOK_ANIME")?),
            watchlist: Some(required("DISCORD_WEBHOOK_WATCHLIST")?),
        };

        let check_interval_hours: u64 = std::env::var("CHECK_INTERVAL_HOURS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|h| *h > 0)
            .unwrap_or(24);

        let candidate_delay_ms: u64 =
            std::env::var("CANDIDATE_DELAY_MS").ok().and_then(|s| s.parse().ok()).unwrap_or(1000);

        let page_delay_ms: u64 =
            std::env::var("PAGE_DELAY_MS").ok().and_then(|s| s.parse().ok()).unwrap_or(500);

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            database_url,
            tmdb_api_key,
            tmdb_base_url,
            tmdb_rps,
            theater_url,
            cinema_base_url,
            webhooks,
            check_interval_hours,
            candidate_delay_ms,
            page_delay_ms,
        })
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_hours * 60 * 60)
    }
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn required(key: &str) -> anyhow::Result<String> {
    optional(key).with_context(|| format!("{key} must be set"))
}
