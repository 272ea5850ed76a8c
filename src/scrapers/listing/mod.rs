//! Incremental listing extraction.
//!
//! The search results are an infinite-scroll list that renders lazily,
//! recycles card nodes, shows placeholder cards before content arrives and
//! may live inside an iframe. The engine never trusts DOM position: every
//! step re-reads the visible cards, keys them by their stable listing id and
//! only counts ids it has not emitted yet. Scrolling stops when the target is
//! reached, when several consecutive steps produce nothing new, or when the
//! hard step bound is hit.

mod config;
mod ids;
mod locators;

pub use config::{ExtractionConfig, FieldLocators};
pub use ids::{absolutize, canonical_listing_url, listing_id_from_url, normalize_id};
pub use locators::{clean_text, Field, FieldMatch, FieldStrategy, Locator};

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::page::{ElementRef, FrameRef, PageDriver, PageError};
use crate::models::Listing;

/// Errors that abort an extraction run.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error(transparent)]
    Page(#[from] PageError),
    #[error("no {0} input found on the search page")]
    SearchInputMissing(&'static str),
}

/// What to search for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingQuery {
    pub keywords: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub experience_level: Option<String>,
    #[serde(default)]
    pub job_type: Option<String>,
}

impl ListingQuery {
    pub fn new(keywords: impl Into<String>) -> Self {
        Self {
            keywords: keywords.into(),
            ..Default::default()
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Why the scroll loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    TargetReached,
    /// No new listing for `max_stalled_steps` consecutive scrolls.
    Stalled,
    StepLimit,
    /// No result card ever appeared.
    NoResults,
}

/// Outcome of one extraction run.
#[derive(Debug)]
pub struct ExtractionReport {
    /// Unique listings in the order they were first seen.
    pub listings: Vec<Listing>,
    pub scroll_steps: u32,
    pub placeholders_skipped: usize,
    pub stop_reason: StopReason,
}

/// Field strategies built from the configured locators.
struct CardFields {
    title: FieldStrategy,
    link: FieldStrategy,
    company: FieldStrategy,
    company_link: FieldStrategy,
    location: FieldStrategy,
    posted: FieldStrategy,
}

impl CardFields {
    fn from_config(locators: &FieldLocators) -> Self {
        Self {
            title: FieldStrategy::new(Field::Title, locators.title.clone()),
            link: FieldStrategy::new(Field::Link, locators.link.clone()),
            company: FieldStrategy::new(Field::Company, locators.company.clone()),
            company_link: FieldStrategy::new(Field::CompanyLink, locators.company_link.clone()),
            location: FieldStrategy::new(Field::Location, locators.location.clone()),
            posted: FieldStrategy::new(Field::Posted, locators.posted.clone()),
        }
    }
}

/// Result of reading one card.
enum CardRead {
    Listing(Box<Listing>),
    /// Neither a stable id nor a title link: not rendered yet.
    Placeholder,
    /// Has an id but the required fields have not rendered yet.
    Incomplete(String),
    /// Already emitted earlier in this run.
    Seen,
}

/// Drives a search page and harvests unique listings.
pub struct ExtractionEngine {
    config: ExtractionConfig,
    fields: CardFields,
}

impl ExtractionEngine {
    pub fn new(config: ExtractionConfig) -> Self {
        let fields = CardFields::from_config(&config.fields);
        Self { config, fields }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Run one search and collect up to `target` unique listings.
    ///
    /// Fewer listings are returned when the list stops growing; that is a
    /// normal outcome, not an error.
    pub async fn extract<P: PageDriver + ?Sized>(
        &self,
        page: &P,
        query: &ListingQuery,
        target: usize,
    ) -> Result<ExtractionReport, ExtractionError> {
        let mut report = ExtractionReport {
            listings: Vec::new(),
            scroll_steps: 0,
            placeholders_skipped: 0,
            stop_reason: StopReason::NoResults,
        };
        if target == 0 {
            report.stop_reason = StopReason::TargetReached;
            return Ok(report);
        }

        info!("Opening search page {}", self.config.search_url);
        page.goto(&self.config.search_url).await?;
        self.submit_query(page, query).await?;
        self.apply_filters(page, query).await;

        let Some((frame, item_selector)) = self.wait_for_results(page).await? else {
            warn!("No result cards appeared for '{}'", query.keywords);
            return Ok(report);
        };
        debug!("Results found in frame {} via {}", frame.0, item_selector);

        let mut seen = HashSet::new();
        self.harvest(page, frame, &item_selector, target, &mut seen, &mut report)
            .await?;

        let mut stalled = 0u32;
        let settle = Duration::from_millis(self.config.settle_ms);
        report.stop_reason = loop {
            if report.listings.len() >= target {
                break StopReason::TargetReached;
            }
            if report.scroll_steps >= self.config.max_scroll_steps {
                break StopReason::StepLimit;
            }

            self.scroll(page, frame, &item_selector).await;
            report.scroll_steps += 1;
            page.pause(settle).await;

            let added = self
                .harvest(page, frame, &item_selector, target, &mut seen, &mut report)
                .await?;
            if added == 0 {
                stalled += 1;
                debug!(
                    "Scroll step {} found nothing new ({}/{})",
                    report.scroll_steps, stalled, self.config.max_stalled_steps
                );
                if stalled >= self.config.max_stalled_steps {
                    break StopReason::Stalled;
                }
            } else {
                stalled = 0;
            }
        };

        info!(
            "Extracted {} listing(s) in {} scroll step(s) ({:?})",
            report.listings.len(),
            report.scroll_steps,
            report.stop_reason
        );
        Ok(report)
    }

    /// Find the first matching input, searching every frame.
    async fn find_input<P: PageDriver + ?Sized>(
        &self,
        page: &P,
        selectors: &[String],
    ) -> Result<Option<ElementRef>, ExtractionError> {
        let frames = page.frames().await?;
        for selector in selectors {
            for frame in &frames {
                match page.query_first(*frame, selector).await {
                    Ok(Some(input)) => return Ok(Some(input)),
                    Ok(None) => {}
                    Err(e) => debug!("Input selector {} failed: {}", selector, e),
                }
            }
        }
        Ok(None)
    }

    /// Type keywords and location into their own typeahead inputs and submit.
    async fn submit_query<P: PageDriver + ?Sized>(
        &self,
        page: &P,
        query: &ListingQuery,
    ) -> Result<(), ExtractionError> {
        let typing_delay = Duration::from_millis(self.config.typing_delay_ms);

        let title_input = self
            .find_input(page, &self.config.title_inputs)
            .await?
            .ok_or(ExtractionError::SearchInputMissing("keyword"))?;
        page.type_text(&title_input, &query.keywords).await?;
        page.pause(typing_delay).await;

        let mut submit_on = title_input;
        if let Some(ref location) = query.location {
            match self.find_input(page, &self.config.location_inputs).await? {
                Some(location_input) => {
                    page.type_text(&location_input, location).await?;
                    page.pause(typing_delay).await;
                    submit_on = location_input;
                }
                None => warn!("No location input found; searching without location"),
            }
        }

        page.press_key(&submit_on, "Enter").await?;
        Ok(())
    }

    /// Click filter buttons for experience level and job type, best effort.
    async fn apply_filters<P: PageDriver + ?Sized>(&self, page: &P, query: &ListingQuery) {
        let values = [query.experience_level.as_deref(), query.job_type.as_deref()];
        for value in values.into_iter().flatten() {
            let selector = self
                .config
                .filter_template
                .replace("{value}", &value.replace('"', "\\\""));
            match self.find_input(page, std::slice::from_ref(&selector)).await {
                Ok(Some(button)) => {
                    if let Err(e) = page.click(&button).await {
                        warn!("Could not apply filter '{}': {}", value, e);
                    } else {
                        page.pause(Duration::from_millis(self.config.settle_ms))
                            .await;
                    }
                }
                Ok(None) => warn!("Filter '{}' not found on page", value),
                Err(e) => warn!("Could not apply filter '{}': {}", value, e),
            }
        }
    }

    /// Poll every frame until some item selector matches.
    async fn wait_for_results<P: PageDriver + ?Sized>(
        &self,
        page: &P,
    ) -> Result<Option<(FrameRef, String)>, ExtractionError> {
        let interval = Duration::from_millis(self.config.poll_interval_ms);
        for attempt in 0..self.config.result_poll_attempts.max(1) {
            for frame in page.frames().await? {
                for selector in &self.config.item_selectors {
                    match page.query_all(frame, selector).await {
                        Ok(items) if !items.is_empty() => {
                            return Ok(Some((frame, selector.clone())));
                        }
                        Ok(_) => {}
                        Err(e) => debug!("Result probe {} in frame {}: {}", selector, frame.0, e),
                    }
                }
            }
            debug!("No results yet (attempt {})", attempt + 1);
            page.pause(interval).await;
        }
        Ok(None)
    }

    /// Read all visible cards and append the ones not seen before.
    ///
    /// Returns how many new listings were added.
    async fn harvest<P: PageDriver + ?Sized>(
        &self,
        page: &P,
        frame: FrameRef,
        item_selector: &str,
        target: usize,
        seen: &mut HashSet<String>,
        report: &mut ExtractionReport,
    ) -> Result<usize, ExtractionError> {
        let items = page.query_all(frame, item_selector).await?;
        let mut added = 0;

        for item in &items {
            if report.listings.len() >= target {
                break;
            }
            match self.read_card(page, item, seen).await {
                Ok(CardRead::Listing(listing)) => {
                    seen.insert(listing.id.clone());
                    report.listings.push(*listing);
                    added += 1;
                }
                Ok(CardRead::Placeholder) => report.placeholders_skipped += 1,
                Ok(CardRead::Incomplete(id)) => debug!("Card {} not fully rendered yet", id),
                Ok(CardRead::Seen) => {}
                // Cards are recycled while scrolling; a vanished node is retried next step
                Err(e) => debug!("Skipping card {}: {}", item, e),
            }
        }

        Ok(added)
    }

    /// Stable listing id of a card, from its attributes or its title link.
    async fn read_id<P: PageDriver + ?Sized>(
        &self,
        page: &P,
        item: &ElementRef,
    ) -> Result<(Option<String>, Option<String>), PageError> {
        let link = self
            .fields
            .link
            .extract(page, item)
            .await?
            .and_then(|m| absolutize(&self.config.base_url, &m.value));

        for attribute in &self.config.id_attributes {
            if let Some(id) = page
                .attribute(item, attribute)
                .await?
                .as_deref()
                .and_then(normalize_id)
            {
                return Ok((Some(id), link));
            }
        }

        let id = link.as_deref().and_then(listing_id_from_url);
        Ok((id, link))
    }

    async fn read_card<P: PageDriver + ?Sized>(
        &self,
        page: &P,
        item: &ElementRef,
        seen: &HashSet<String>,
    ) -> Result<CardRead, PageError> {
        let (id, link) = self.read_id(page, item).await?;
        let Some(id) = id else {
            return Ok(CardRead::Placeholder);
        };
        if seen.contains(&id) {
            return Ok(CardRead::Seen);
        }

        let Some(title) = self.fields.title.extract(page, item).await? else {
            return Ok(CardRead::Incomplete(id));
        };
        let Some(company) = self.fields.company.extract(page, item).await? else {
            return Ok(CardRead::Incomplete(id));
        };

        let url = link.unwrap_or_else(|| canonical_listing_url(&self.config.base_url, &id));
        let mut listing = Listing::new(id, title.value, company.value, url);
        listing.company_url = self
            .fields
            .company_link
            .extract(page, item)
            .await?
            .and_then(|m| absolutize(&self.config.base_url, &m.value));
        listing.location = self
            .fields
            .location
            .extract(page, item)
            .await?
            .map(|m| m.value);
        listing.posted_date = self
            .fields
            .posted
            .extract(page, item)
            .await?
            .map(|m| m.value);

        Ok(CardRead::Listing(Box::new(listing)))
    }

    /// Trigger lazy loading: scroll the last card into view, falling back
    /// to scrolling the list container, then click "show more" if present.
    async fn scroll<P: PageDriver + ?Sized>(&self, page: &P, frame: FrameRef, item_selector: &str) {
        let scrolled = match page.query_all(frame, item_selector).await {
            Ok(items) => match items.last() {
                Some(last) => match page.scroll_into_view(last).await {
                    Ok(()) => true,
                    Err(e) => {
                        debug!("Could not scroll last card into view: {}", e);
                        false
                    }
                },
                None => false,
            },
            Err(e) => {
                debug!("Could not list cards before scrolling: {}", e);
                false
            }
        };

        if !scrolled {
            for selector in &self.config.list_containers {
                if let Ok(Some(container)) = page.query_first(frame, selector).await {
                    match page.scroll_by(&container, self.config.scroll_step_px).await {
                        Ok(()) => break,
                        Err(e) => debug!("Could not scroll {}: {}", selector, e),
                    }
                }
            }
        }

        for selector in &self.config.show_more_buttons {
            if let Ok(Some(button)) = page.query_first(frame, selector).await {
                match page.click(&button).await {
                    Ok(()) => {
                        debug!("Clicked show-more button {}", selector);
                        break;
                    }
                    Err(e) => debug!("Could not click {}: {}", selector, e),
                }
            }
        }
    }
}
