use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use jiff::civil::DateTime;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;
use wreq::header::REFERER;
use wreq_util::Emulation;

use crate::{
    error::AppResult,
    models::{Listing, ShowtimeLookup, ShowtimeSnapshot, dedup_by_title},
    sources::{Cinema, CinemaSession},
};

const LISTING_PAGES: [(&str, &str); 2] =
    [("Coming Soon", "movies/coming-soon"), ("Now Playing", "movies/now-playing")];
const RELEASE_DATE_FORMAT: &str = "%m/%d/%Y %I:%M:%S %p";

pub struct CinemarkScraper {
    theater_url: String,
    base_url: Url,
    page_delay_ms: u64,
}

impl CinemarkScraper {
    pub fn new(theater_url: String, base_url: &str, page_delay_ms: u64) -> AppResult<Self> {
        Ok(Self { theater_url, base_url: Url::parse(base_url)?, page_delay_ms })
    }
}

#[async_trait]
impl Cinema for CinemarkScraper {
    async fn open_session(&self) -> AppResult<Box<dyn CinemaSession>> {
        let client = wreq::Client::builder()
            .emulation(Emulation::Firefox136)
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .build()?;

        debug!(url = %self.theater_url, "selecting theater");
        client.get(&self.theater_url).send().await?.error_for_status()?;

        Ok(Box::new(CinemarkSession {
            client,
            base_url: self.base_url.clone(),
            page_delay_ms: self.page_delay_ms,
        }))
    }
}

/// Holds the cookie jar carrying the selected theater.
pub struct CinemarkSession {
    client: wreq::Client,
    base_url: Url,
    page_delay_ms: u64,
}

impl CinemarkSession {
    async fn fetch_page(&self, url: &str) -> AppResult<String> {
        let html = self
            .client
            .get(url)
            .header(REFERER, self.base_url.as_str())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(html)
    }

    async fn pause(&self) {
        let delay = self.page_delay_ms + jitter_ms(150);
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    async fn collect_showtimes(&self, detail_url: &str) -> AppResult<Option<ShowtimeSnapshot>> {
        let detail_html = self.fetch_page(detail_url).await?;
        let base = Url::parse(detail_url)?;

        let links = parse_date_links(&detail_html, &base);
        if links.is_empty() {
            return Ok(None);
        }

        let mut snapshot = ShowtimeSnapshot::default();
        for link in links {
            let times = match &link.url {
                Some(url) => {
                    self.pause().await;
                    parse_showtimes(&self.fetch_page(url).await?)
                },
                None => parse_showtimes(&detail_html),
            };
            debug!(date = %link.label, times = times.len(), "parsed showtimes for date");
            snapshot.push(link.label, times);
        }

        Ok(Some(snapshot))
    }
}

impl Drop for CinemarkSession {
    fn drop(&mut self) {
        debug!("closing cinema session");
    }
}

#[async_trait]
impl CinemaSession for CinemarkSession {
    async fn scrape_all_candidates(&mut self) -> AppResult<Vec<Listing>> {
        let mut out = Vec::new();

        for (page_name, path) in LISTING_PAGES {
            let url = self.base_url.join(path)?;
            self.pause().await;

            debug!(page = page_name, url = %url, "fetching listing page");
            let html = self.fetch_page(url.as_str()).await?;
            let listings = parse_listing_page(&html, &self.base_url);
            debug!(page = page_name, movies_found = listings.len(), "parsed listing page");

            out.extend(listings);
        }

        Ok(dedup_by_title(out))
    }

    async fn fetch_showtimes(&mut self, detail_url: &str) -> ShowtimeLookup {
        if !is_cinema_url(detail_url, &self.base_url) {
            return ShowtimeLookup::Error("Invalid URL".to_string());
        }

        debug!(url = %detail_url, "visiting movie page for showtimes");
        match self.collect_showtimes(detail_url).await {
            Ok(None) => ShowtimeLookup::Notice("Showtimes not available yet.".to_string()),
            Ok(Some(snapshot)) if snapshot.dates.is_empty() => {
                ShowtimeLookup::Notice("No showtimes listed for available dates.".to_string())
            },
            Ok(Some(snapshot)) => ShowtimeLookup::Listed(snapshot),
            Err(err) => {
                warn!(url = %detail_url, error = %err, "failed to scrape showtimes");
                ShowtimeLookup::Error("Could not scrape showtimes.".to_string())
            },
        }
    }
}

/// True for the cinema's own domain and its subdomains, with or without `www.`.
fn is_cinema_url(url: &str, base: &Url) -> bool {
    let Some(domain) = base.host_str().map(|h| h.strip_prefix("www.").unwrap_or(h)) else {
        return false;
    };
    Url::parse(url).is_ok_and(|u| {
        u.host_str().is_some_and(|host| {
            host == domain || host.strip_suffix(domain).is_some_and(|sub| sub.ends_with('.'))
        })
    })
}

fn parse_listing_page(html: &str, base: &Url) -> Vec<Listing> {
    let doc = Html::parse_document(html);
    let block_selector = Selector::parse(".movieBlock").unwrap();
    let title_selector = Selector::parse(".title").unwrap();
    let poster_link_selector = Selector::parse(".movie-poster").unwrap();
    let img_selector = Selector::parse("img").unwrap();

    let mut out = Vec::new();

    for block in doc.select(&block_selector) {
        let Some(title) = block.select(&title_selector).next().map(text_of) else { continue };
        if title.is_empty() {
            continue;
        }
        let Some(poster_link) = block.select(&poster_link_selector).next() else { continue };
        let Some(detail_url) = poster_link.value().attr("href").and_then(|h| base.join(h).ok())
        else {
            continue;
        };
        let Some(img) = poster_link.select(&img_selector).next() else { continue };
        let poster_url = img
            .value()
            .attr("data-srcset")
            .or_else(|| img.value().attr("src"))
            .and_then(|s| s.split_whitespace().next())
            .unwrap_or_default()
            .to_string();

        out.push(Listing {
            title,
            release_date: format_release_date(block.value().attr("data-movie-releasedate")),
            detail_url: detail_url.to_string(),
            poster_url,
        });
    }

    out
}

struct DateLink {
    label: String,
    url: Option<String>,
}

fn parse_date_links(html: &str, base: &Url) -> Vec<DateLink> {
    let doc = Html::parse_document(html);
    let selector = Selector::parse("#showdatesCarousel .showdate-link").unwrap();

    doc.select(&selector)
        .filter_map(|el| {
            let label = text_of(el);
            if label.is_empty() {
                return None;
            }
            let url = el
                .value()
                .attr("href")
                .filter(|h| !h.is_empty() && !h.starts_with('#') && !h.starts_with("javascript:"))
                .and_then(|h| base.join(h).ok())
                .map(|u| u.to_string());
            Some(DateLink { label, url })
        })
        .collect()
}

fn parse_showtimes(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let selector = Selector::parse("#theaterList .showtime-link").unwrap();
    doc.select(&selector).map(text_of).filter(|t| !t.is_empty()).collect()
}

/// Element text with all whitespace runs, including line breaks, collapsed to single spaces.
fn text_of(el: ElementRef<'_>) -> String {
    el.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

fn format_release_date(raw: Option<&str>) -> String {
    raw.and_then(|s| DateTime::strptime(RELEASE_DATE_FORMAT, s.trim()).ok())
        .map(|dt| dt.date().to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

fn jitter_ms(max: u64) -> u64 {
    if max == 0 {
        return 0;
    }
    let nanos =
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.subsec_nanos() as u64).unwrap_or(0);
    nanos % (max + 1)
}
