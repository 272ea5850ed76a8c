//! The listing pipeline: extraction, enrichment and generation stages.
//!
//! Each stage moves listings along the status graph in
//! [`ListingStatus`](crate::models::ListingStatus). The stage entry points on
//! [`Pipeline`] are what the CLI and the daemon call.

mod orchestrator;
mod processors;
mod runner;

pub use orchestrator::{Orchestrator, OrchestratorConfig, RunOptions, RunSummary};
pub use processors::{EnrichProcessor, GenerateProcessor};
pub use runner::{RecordOutcome, StageOutcome, StageProcessor, StageReport, StageRunner};

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::config::{Config, Settings};
use crate::llm::{LlmClient, TextModel};
use crate::repository::{DbContext, DieselError};
use crate::scrapers::{BrowserListingSource, ListingQuery, ListingSource};
use crate::services::{load_profile, CompanyResearcher, DraftGenerator, DraftWriter, Enricher};

/// Errors that stop a whole stage run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("database error: {0}")]
    Store(#[from] DieselError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Stage entry points over a database and the three collaborators.
#[derive(Clone)]
pub struct Pipeline {
    db: DbContext,
    source: Arc<dyn ListingSource>,
    enricher: Arc<dyn Enricher>,
    generator: Arc<dyn DraftGenerator>,
    resume_path: PathBuf,
}

impl Pipeline {
    pub fn new(
        db: DbContext,
        source: Arc<dyn ListingSource>,
        enricher: Arc<dyn Enricher>,
        generator: Arc<dyn DraftGenerator>,
        resume_path: PathBuf,
    ) -> Self {
        Self {
            db,
            source,
            enricher,
            generator,
            resume_path,
        }
    }

    /// Wire the browser source and LLM-backed collaborators from config.
    pub fn from_config(
        config: &Config,
        settings: &Settings,
        db: DbContext,
    ) -> anyhow::Result<Self> {
        let model: Arc<dyn TextModel> = Arc::new(LlmClient::new(config.llm.clone())?);
        let enricher = CompanyResearcher::new(
            model.clone(),
            config.research.clone(),
            config.llm.get_summary_prompt(),
        )?;
        let generator = DraftWriter::new(model, config.llm.get_draft_prompt());
        let source = BrowserListingSource::new(config.browser.clone(), config.extraction.clone());

        Ok(Self::new(
            db,
            Arc::new(source),
            Arc::new(enricher),
            Arc::new(generator),
            settings.resume_path.clone(),
        ))
    }

    pub fn db(&self) -> &DbContext {
        &self.db
    }

    pub fn runner(&self) -> StageRunner {
        StageRunner::new(self.db.listings())
    }

    pub fn enrich_processor(&self) -> EnrichProcessor {
        EnrichProcessor::new(self.db.research(), self.enricher.clone())
    }

    /// Generation processor with the resume loaded from disk.
    pub async fn generate_processor(&self) -> anyhow::Result<GenerateProcessor> {
        let profile = load_profile(&self.resume_path).await?;
        Ok(GenerateProcessor::new(
            self.db.research(),
            self.db.drafts(),
            self.generator.clone(),
            profile,
        ))
    }

    /// Discover listings and store them as `discovered`.
    ///
    /// Returns the number of listings saved.
    pub async fn run_extraction_stage(
        &self,
        max_count: usize,
        query: &ListingQuery,
    ) -> Result<usize, PipelineError> {
        info!(
            "Extracting up to {} listing(s) for '{}'",
            max_count, query.keywords
        );
        let listings = self.source.discover(query, max_count).await?;
        let saved = self.db.listings().upsert_all(&listings).await?;
        info!("Saved {} listing(s)", saved);
        Ok(saved)
    }

    /// Enrich up to `batch_size` discovered listings.
    ///
    /// Returns how many reached `enriched`.
    pub async fn run_enrichment_stage(
        &self,
        batch_size: usize,
        max_retries: u32,
    ) -> Result<usize, PipelineError> {
        let processor = self.enrich_processor();
        let report = self.runner().run(&processor, batch_size, max_retries).await?;
        Ok(report.succeeded)
    }

    /// Draft emails for up to `batch_size` enriched listings.
    ///
    /// Returns how many reached `generated`.
    pub async fn run_generation_stage(
        &self,
        batch_size: usize,
        max_retries: u32,
    ) -> Result<usize, PipelineError> {
        let processor = self.generate_processor().await?;
        let report = self.runner().run(&processor, batch_size, max_retries).await?;
        Ok(report.succeeded)
    }

    pub(crate) async fn discover(
        &self,
        query: &ListingQuery,
        max_count: usize,
    ) -> anyhow::Result<Vec<crate::models::Listing>> {
        self.source.discover(query, max_count).await
    }
}
