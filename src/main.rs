mod catalog;
mod config;
mod db;
mod detector;
mod discord;
mod entities;
mod error;
mod matcher;
mod models;
mod monitor;
mod notify;
mod routes;
mod scraper;
mod sources;
mod subscriptions;
mod tmdb;

use std::{sync::Arc, time::Duration};

use tower_http::trace::TraceLayer;

use crate::{
    catalog::CatalogStore, config::Config, discord::DiscordWebhookSink, monitor::Monitor,
    notify::Dispatcher, scraper::CinemarkScraper, subscriptions::SubscriptionStore,
    tmdb::TmdbClient,
};

#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<Monitor>,
    pub catalog: CatalogStore,
    pub subscriptions: SubscriptionStore,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,marquee=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Config::from_env()?;

    let http = reqwest::Client::builder()
        .user_agent("marquee/0.1")
        .timeout(Duration::from_secs(30))
        .build()?;

    let db = db::connect_and_migrate(&config.database_url).await?;
    let catalog = CatalogStore::new(db.clone());
    let subscriptions = SubscriptionStore::new(db);

    let tmdb = TmdbClient::new(
        http.clone(),
        config.tmdb_api_key.clone(),
        config.tmdb_base_url.clone(),
        config.tmdb_rps,
    );
    let cinema = CinemarkScraper::new(
        config.theater_url.clone(),
        &config.cinema_base_url,
        config.page_delay_ms,
    )?;
    let sink = DiscordWebhookSink::new(http, config.webhooks.clone());
    let dispatcher = Dispatcher::new(Arc::new(sink));

    let monitor = Arc::new(Monitor::new(
        catalog.clone(),
        subscriptions.clone(),
        Arc::new(cinema),
        Arc::new(tmdb),
        dispatcher,
        Duration::from_millis(config.candidate_delay_ms),
    ));

    tracing::info!(every_hours = config.check_interval_hours, "starting check loop");
    tokio::spawn(monitor.clone().run_schedule(config.check_interval()));

    let state = Arc::new(AppState { monitor, catalog, subscriptions });
    let app = routes::router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
