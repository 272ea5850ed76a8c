//! Enrichment and generation collaborators.
//!
//! The pipeline only sees the [`Enricher`] and [`DraftGenerator`] traits;
//! `None` from either means "no usable output" and is retried like an error.

mod draft;
mod page_text;
mod research;

pub use draft::{load_profile, DraftWriter};
pub use page_text::{about_url, find_website, visible_text};
pub use research::{summarize_with, CompanyResearcher, ResearchConfig};

use async_trait::async_trait;

use crate::models::{CompanyResearch, Draft, Listing};

/// Researches the company behind a listing.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, listing: &Listing) -> anyhow::Result<Option<CompanyResearch>>;
}

/// Writes an application draft from a listing, its research and a profile.
#[async_trait]
pub trait DraftGenerator: Send + Sync {
    async fn generate(
        &self,
        listing: &Listing,
        research: &CompanyResearch,
        profile: &str,
    ) -> anyhow::Result<Option<Draft>>;
}
