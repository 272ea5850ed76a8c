//! Where discovered listings come from.

use async_trait::async_trait;
use tracing::info;

use super::browser::BrowserEngineConfig;
use super::listing::{ExtractionConfig, ExtractionEngine, ListingQuery};
use super::page::PageDriver;
use crate::models::Listing;

/// Produces up to `max_count` unique listings for a query.
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn discover(&self, query: &ListingQuery, max_count: usize)
        -> anyhow::Result<Vec<Listing>>;
}

/// Launches a browser for each run and extracts from the live site.
pub struct BrowserListingSource {
    browser: BrowserEngineConfig,
    extraction: ExtractionConfig,
}

impl BrowserListingSource {
    pub fn new(browser: BrowserEngineConfig, extraction: ExtractionConfig) -> Self {
        Self {
            browser,
            extraction,
        }
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl ListingSource for BrowserListingSource {
    async fn discover(
        &self,
        query: &ListingQuery,
        max_count: usize,
    ) -> anyhow::Result<Vec<Listing>> {
        let mut session = super::browser::BrowserSession::new(self.browser.clone());
        let page = match session.new_page().await {
            Ok(page) => page,
            Err(e) => {
                session.close().await;
                return Err(e);
            }
        };

        let engine = ExtractionEngine::new(self.extraction.clone());
        let result = engine.extract(&page, query, max_count).await;
        session.close().await;

        let report = result?;
        info!(
            "Browser run found {} listing(s), skipped {} placeholder(s)",
            report.listings.len(),
            report.placeholders_skipped
        );
        Ok(report.listings)
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl ListingSource for BrowserListingSource {
    async fn discover(
        &self,
        _query: &ListingQuery,
        _max_count: usize,
    ) -> anyhow::Result<Vec<Listing>> {
        let _ = (&self.browser, &self.extraction);
        anyhow::bail!("Browser support not compiled. Rebuild with: cargo build --features browser")
    }
}

/// Extracts from an already open page.
pub struct PageListingSource<P> {
    page: P,
    engine: ExtractionEngine,
}

impl<P: PageDriver> PageListingSource<P> {
    pub fn new(page: P, extraction: ExtractionConfig) -> Self {
        Self {
            page,
            engine: ExtractionEngine::new(extraction),
        }
    }

    pub fn page(&self) -> &P {
        &self.page
    }
}

#[async_trait]
impl<P: PageDriver> ListingSource for PageListingSource<P> {
    async fn discover(
        &self,
        query: &ListingQuery,
        max_count: usize,
    ) -> anyhow::Result<Vec<Listing>> {
        let report = self.engine.extract(&self.page, query, max_count).await?;
        Ok(report.listings)
    }
}
