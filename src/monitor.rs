use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::{
    catalog::CatalogStore,
    detector::{self, Change},
    error::{AppError, AppResult},
    models::{Listing, MovieMetadata, MovieRecord, ShowtimeDates, ShowtimeLookup, dedup_by_title},
    notify::{DispatchReport, Dispatcher, MovieEvent},
    sources::{Cinema, CinemaSession, MetadataSource},
    subscriptions::SubscriptionStore,
};

/// At most one check cycle holds a permit at a time.
#[derive(Debug, Default)]
pub struct CheckGuard {
    running: AtomicBool,
}

impl CheckGuard {
    pub fn try_acquire(&self) -> Option<CheckPermit<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CheckPermit { guard: self })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Releases the guard when dropped.
#[derive(Debug)]
pub struct CheckPermit<'a> {
    guard: &'a CheckGuard,
}

impl Drop for CheckPermit<'_> {
    fn drop(&mut self) {
        self.guard.running.store(false, Ordering::Release);
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct CycleReport {
    pub scraped: usize,
    pub ignored: usize,
    pub new: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub notifications: DispatchReport,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CycleOutcome {
    AlreadyRunning,
    Completed(CycleReport),
    Failed(String),
}

enum Processed {
    Ignored,
    Classified(Change, DispatchReport),
}

pub struct Monitor {
    catalog: CatalogStore,
    subscriptions: SubscriptionStore,
    cinema: Arc<dyn Cinema>,
    metadata: Arc<dyn MetadataSource>,
    dispatcher: Dispatcher,
    guard: CheckGuard,
    candidate_delay: Duration,
}

impl Monitor {
    pub fn new(
        catalog: CatalogStore,
        subscriptions: SubscriptionStore,
        cinema: Arc<dyn Cinema>,
        metadata: Arc<dyn MetadataSource>,
        dispatcher: Dispatcher,
        candidate_delay: Duration,
    ) -> Self {
        Self {
            catalog,
            subscriptions,
            cinema,
            metadata,
            dispatcher,
            guard: CheckGuard::default(),
            candidate_delay,
        }
    }

    pub fn is_checking(&self) -> bool {
        self.guard.is_running()
    }

    /// Runs one full check unless another is already in progress.
    pub async fn run_check_cycle(&self) -> CycleOutcome {
        let Some(_permit) = self.guard.try_acquire() else {
            info!("check already in progress, skipping");
            return CycleOutcome::AlreadyRunning;
        };

        info!("running movie check");
        let started = Instant::now();

        let outcome = match self.check_all().await {
            Ok(report) => CycleOutcome::Completed(report),
            Err(err) => {
                error!(error = %err, "movie check failed");
                CycleOutcome::Failed(err.to_string())
            },
        };

        info!(elapsed_ms = started.elapsed().as_millis() as u64, "movie check finished");
        outcome
    }

    /// Ticks immediately, then every `period`.
    pub async fn run_schedule(self: Arc<Self>, period: Duration) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if let CycleOutcome::Completed(report) = self.run_check_cycle().await {
                info!(?report, "scheduled check completed");
            }
        }
    }

    /// Live showtimes for a movie already in the catalog. Nothing is persisted.
    pub async fn showtimes_for(&self, title: &str) -> AppResult<(MovieRecord, ShowtimeLookup)> {
        let record = self
            .catalog
            .get(title)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Movie '{title}' not found.")))?;

        let mut session = self.cinema.open_session().await?;
        let lookup = session.fetch_showtimes(&record.detail_url).await;
        Ok((record, lookup))
    }

    async fn check_all(&self) -> AppResult<CycleReport> {
        let mut session = self.cinema.open_session().await?;
        let candidates = dedup_by_title(session.scrape_all_candidates().await?);

        info!(count = candidates.len(), "found unique movies, processing");

        let mut report = CycleReport { scraped: candidates.len(), ..Default::default() };

        for (idx, listing) in candidates.iter().enumerate() {
            if idx > 0 && !self.candidate_delay.is_zero() {
                tokio::time::sleep(self.candidate_delay).await;
            }

            match self.process_candidate(session.as_mut(), listing).await {
                Ok(Processed::Ignored) => report.ignored += 1,
                Ok(Processed::Classified(change, dispatched)) => {
                    match change {
                        Change::New => report.new += 1,
                        Change::ShowtimeUpdate => report.updated += 1,
                        Change::NoChange => report.unchanged += 1,
                    }
                    report.notifications.delivered += dispatched.delivered;
                    report.notifications.skipped += dispatched.skipped;
                    report.notifications.failed += dispatched.failed;
                },
                Err(err) => {
                    warn!(title = %listing.title, error = %err, "failed to process movie");
                    report.failed += 1;
                },
            }
        }

        Ok(report)
    }

    async fn process_candidate(
        &self,
        session: &mut dyn CinemaSession,
        listing: &Listing,
    ) -> AppResult<Processed> {
        if self.subscriptions.is_globally_ignored(&listing.title).await? {
            info!(title = %listing.title, "skipping movie on an ignore list");
            return Ok(Processed::Ignored);
        }

        let metadata = match self.metadata.lookup_by_title(&listing.title).await {
            Ok(Some(metadata)) => metadata,
            Ok(None) => MovieMetadata::not_found(),
            Err(err) => {
                warn!(title = %listing.title, error = %err, "metadata lookup failed");
                MovieMetadata::lookup_failed()
            },
        };

        let prior = self.catalog.get(&listing.title).await?;
        let watchers = self.subscriptions.watchers_for(&listing.title).await?;
        let is_watched = !watchers.is_empty();

        debug!(
            title = %listing.title,
            anime = metadata.is_anime,
            watched = is_watched,
            "processing movie"
        );

        let lookup = if detector::wants_showtimes(metadata.is_anime, is_watched) {
            Some(session.fetch_showtimes(&listing.detail_url).await)
        } else {
            None
        };

        let scraped_dates = lookup.as_ref().map(ShowtimeLookup::date_keys).unwrap_or_default();
        let previous_dates = prior.as_ref().map(|p| p.showtimes.clone()).unwrap_or_default();
        let current_dates: ShowtimeDates = match &lookup {
            Some(ShowtimeLookup::Listed(_)) => scraped_dates.clone(),
            _ => previous_dates.clone(),
        };

        let change =
            detector::classify(prior.as_ref(), &scraped_dates, metadata.is_anime, is_watched);

        match change {
            Change::New => {
                info!(title = %listing.title, "new movie");
                self.catalog
                    .upsert(listing, &current_dates, metadata.is_anime, &metadata.overview)
                    .await?;
            },
            Change::ShowtimeUpdate => {
                info!(
                    title = %listing.title,
                    dates = %current_dates.format(),
                    "new showtimes added"
                );
                self.catalog.update_showtimes(&listing.title, &current_dates).await?;
            },
            Change::NoChange => {
                debug!(title = %listing.title, "no changes detected");
                return Ok(Processed::Classified(change, DispatchReport::default()));
            },
        }

        let event = MovieEvent {
            change,
            listing,
            metadata: &metadata,
            previous_dates: &previous_dates,
            current_dates: &current_dates,
            watchers: &watchers,
        };
        let dispatched = self.dispatcher.dispatch(&event).await;

        Ok(Processed::Classified(change, dispatched))
    }
}
