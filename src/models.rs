use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Discord user snowflake.
pub type UserId = i64;

/// A freshly scraped listing, not yet reconciled against the catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub title: String,
    pub release_date: String,
    pub detail_url: String,
    pub poster_url: String,
}

/// Collapses listings sharing a title. A title keeps the position of its first
/// sighting and the data of its last.
pub fn dedup_by_title(listings: Vec<Listing>) -> Vec<Listing> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<Listing> = Vec::with_capacity(listings.len());

    for listing in listings {
        match positions.get(&listing.title) {
            Some(&idx) => out[idx] = listing,
            None => {
                positions.insert(listing.title.clone(), out.len());
                out.push(listing);
            },
        }
    }

    out
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MovieRecord {
    pub title: String,
    pub release_date: String,
    pub detail_url: String,
    pub poster_url: String,
    pub is_anime: bool,
    pub showtimes: ShowtimeDates,
    pub overview: String,
}

/// Ordered set of date labels, as persisted on a movie record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ShowtimeDates(Vec<String>);

impl ShowtimeDates {
    const SEPARATOR: &'static str = ", ";
    const UNLISTED_MARKER: &'static str = "not listed";

    /// Reads the persisted form. Blank strings and "not listed" placeholders mean no dates.
    pub fn parse(raw: &str) -> Self {
        if raw.contains(Self::UNLISTED_MARKER) {
            return Self::default();
        }
        Self::from_labels(raw.split(','))
    }

    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let dates = labels
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .filter(|s| seen.insert(s.clone()))
            .collect();
        Self(dates)
    }

    pub fn format(&self) -> String {
        self.0.join(Self::SEPARATOR)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.iter().any(|d| d == label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ShowDate {
    pub date: String,
    pub times: Vec<String>,
}

/// Showtimes from one detail-page visit, dates in page order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ShowtimeSnapshot {
    pub dates: Vec<ShowDate>,
}

impl ShowtimeSnapshot {
    pub fn date_keys(&self) -> ShowtimeDates {
        ShowtimeDates::from_labels(self.dates.iter().map(|d| d.date.as_str()))
    }

    pub fn push(&mut self, date: String, mut times: Vec<String>) {
        times.sort();
        times.dedup();
        if times.is_empty() {
            return;
        }
        match self.dates.iter_mut().find(|d| d.date == date) {
            Some(existing) => {
                existing.times.extend(times);
                existing.times.sort();
                existing.times.dedup();
            },
            None => self.dates.push(ShowDate { date, times }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ShowtimeLookup {
    Listed(ShowtimeSnapshot),
    Notice(String),
    Error(String),
}

impl ShowtimeLookup {
    /// Dates usable for diffing. Notices and errors count as no dates.
    pub fn date_keys(&self) -> ShowtimeDates {
        match self {
            ShowtimeLookup::Listed(snapshot) => snapshot.date_keys(),
            ShowtimeLookup::Notice(_) | ShowtimeLookup::Error(_) => ShowtimeDates::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MovieMetadata {
    pub is_anime: bool,
    pub genres: String,
    pub overview: String,
}

impl MovieMetadata {
    pub fn not_found() -> Self {
        Self { is_anime: false, genres: "N/A".to_string(), overview: "N/A".to_string() }
    }

    pub fn lookup_failed() -> Self {
        Self {
            is_anime: false,
            genres: "API Error".to_string(),
            overview: "API Error".to_string(),
        }
    }
}

/// Which per-user list an entry belongs to. Deserializes from the URL segment.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    #[serde(rename = "watchlist")]
    Watch,
    Ignore,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct PatternEntry {
    pub pattern: String,
    pub is_regex: bool,
}
