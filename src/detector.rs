//! Decides what a scraped listing means against the catalog's prior record.

use serde::Serialize;

use crate::models::{MovieRecord, ShowtimeDates};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Change {
    New,
    ShowtimeUpdate,
    NoChange,
}

/// Only anime or watched movies are worth a detail-page visit.
pub fn wants_showtimes(is_anime: bool, is_watched: bool) -> bool {
    is_anime || is_watched
}

pub fn classify(
    prior: Option<&MovieRecord>,
    scraped_dates: &ShowtimeDates,
    is_anime: bool,
    is_watched: bool,
) -> Change {
    let Some(prior) = prior else {
        return Change::New;
    };
    if wants_showtimes(is_anime, is_watched) && has_new_dates_added(&prior.showtimes, scraped_dates)
    {
        Change::ShowtimeUpdate
    } else {
        Change::NoChange
    }
}

/// Pure growth only: every old date must still be listed and at least one must be new.
/// A date swapped for another does not count.
pub fn has_new_dates_added(old: &ShowtimeDates, new: &ShowtimeDates) -> bool {
    if old.is_empty() {
        return !new.is_empty();
    }
    old.iter().all(|date| new.contains(date)) && new.len() > old.len()
}
