use std::{collections::BTreeSet, sync::Arc};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    detector::Change,
    error::AppResult,
    models::{Listing, MovieMetadata, ShowtimeDates, UserId},
};

const COLOR_DARK_GREY: u32 = 0x607d8b;
const COLOR_GREEN: u32 = 0x2ecc71;
const COLOR_GOLD: u32 = 0xf1c40f;
const COLOR_BLUE: u32 = 0x3498db;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    AllMovies,
    Anime,
    Watchlist,
}

impl Audience {
    pub fn as_str(self) -> &'static str {
        match self {
            Audience::AllMovies => "all_movies",
            Audience::Anime => "anime",
            Audience::Watchlist => "watchlist",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Notification {
    pub heading: String,
    pub url: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    /// Users to ping alongside the message.
    pub mentions: Vec<UserId>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Delivery {
    Sent,
    NoDestination,
}

#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn deliver(&self, audience: Audience, notification: &Notification) -> AppResult<Delivery>;
}

/// Everything the dispatcher needs to know about one classified movie.
pub struct MovieEvent<'a> {
    pub change: Change,
    pub listing: &'a Listing,
    pub metadata: &'a MovieMetadata,
    pub previous_dates: &'a ShowtimeDates,
    pub current_dates: &'a ShowtimeDates,
    pub watchers: &'a BTreeSet<UserId>,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct DispatchReport {
    pub delivered: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// One notification per audience the event concerns, in delivery order.
pub fn plan(event: &MovieEvent<'_>) -> Vec<(Audience, Notification)> {
    let mut out = Vec::new();
    let listing = event.listing;
    let is_anime = event.metadata.is_anime;
    let mentions: Vec<UserId> = event.watchers.iter().copied().collect();

    match event.change {
        Change::NoChange => {},
        Change::New => {
            let description = format!(
                "**Release Date:** {}\n**Genres:** {}\n\n**Description:**\n{}\n",
                listing.release_date, event.metadata.genres, event.metadata.overview
            );
            let available_dates = or_placeholder(event.current_dates, "Not yet listed");
            let available = field("Available Dates", available_dates, true);

            out.push((
                Audience::AllMovies,
                Notification {
                    heading: format!("🎬 New Movie Added: {}", listing.title),
                    url: listing.detail_url.clone(),
                    description: Some(description.clone()),
                    image_url: poster(listing),
                    color: if is_anime { COLOR_GREEN } else { COLOR_DARK_GREY },
                    fields: Vec::new(),
                    mentions: Vec::new(),
                },
            ));

            if is_anime {
                out.push((
                    Audience::Anime,
                    Notification {
                        heading: format!("✨ New Anime Movie: {}", listing.title),
                        url: listing.detail_url.clone(),
                        description: Some(description.clone()),
                        image_url: poster(listing),
                        color: COLOR_GREEN,
                        fields: vec![available.clone()],
                        mentions: Vec::new(),
                    },
                ));
            }

            if !mentions.is_empty() {
                out.push((
                    Audience::Watchlist,
                    Notification {
                        heading: format!("🔔 New Watchlist Movie: {}", listing.title),
                        url: listing.detail_url.clone(),
                        description: Some(description),
                        image_url: poster(listing),
                        color: COLOR_GOLD,
                        fields: vec![available],
                        mentions,
                    },
                ));
            }
        },
        Change::ShowtimeUpdate => {
            let update = Notification {
                heading: format!("🔄 Showtimes Updated for: {}", listing.title),
                url: listing.detail_url.clone(),
                description: None,
                image_url: poster(listing),
                color: COLOR_BLUE,
                fields: vec![
                    field("Old Dates", or_placeholder(event.previous_dates, "None"), false),
                    field("New Dates", or_placeholder(event.current_dates, "None"), false),
                ],
                mentions: Vec::new(),
            };

            if !mentions.is_empty() {
                out.push((Audience::Watchlist, Notification { mentions, ..update.clone() }));
            }
            if is_anime {
                out.push((Audience::Anime, update));
            }
        },
    }

    out
}

fn field(name: &str, value: String, inline: bool) -> EmbedField {
    EmbedField { name: name.to_string(), value, inline }
}

fn or_placeholder(dates: &ShowtimeDates, placeholder: &str) -> String {
    if dates.is_empty() { placeholder.to_string() } else { dates.format() }
}

fn poster(listing: &Listing) -> Option<String> {
    Some(listing.poster_url.clone()).filter(|p| !p.is_empty())
}

#[derive(Clone)]
pub struct Dispatcher {
    sink: Arc<dyn DeliverySink>,
}

impl Dispatcher {
    pub fn new(sink: Arc<dyn DeliverySink>) -> Self {
        Self { sink }
    }

    /// Delivers each planned notification once. Failures are logged and counted, never returned.
    pub async fn dispatch(&self, event: &MovieEvent<'_>) -> DispatchReport {
        let mut report = DispatchReport::default();

        for (audience, notification) in plan(event) {
            match self.sink.deliver(audience, &notification).await {
                Ok(Delivery::Sent) => {
                    debug!(
                        title = %event.listing.title,
                        audience = audience.as_str(),
                        "notification sent"
                    );
                    report.delivered += 1;
                },
                Ok(Delivery::NoDestination) => {
                    debug!(audience = audience.as_str(), "no destination configured, skipping");
                    report.skipped += 1;
                },
                Err(err) => {
                    warn!(
                        title = %event.listing.title,
                        audience = audience.as_str(),
                        error = %err,
                        "failed to send notification"
                    );
                    report.failed += 1;
                },
            }
        }

        report
    }
}
