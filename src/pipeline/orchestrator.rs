//! One-shot end-to-end run: discover, enrich in small concurrent groups, then draft.

use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::runner::RecordOutcome;
use super::{Pipeline, PipelineError};
use crate::models::{Listing, ListingStatus};
use crate::scrapers::ListingQuery;

/// Concurrency knobs for [`Orchestrator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Listings enriched concurrently per group.
    #[serde(default = "default_group_size")]
    pub enrich_group_size: usize,
    /// Pause between groups, in milliseconds.
    #[serde(default = "default_group_delay_ms")]
    pub group_delay_ms: u64,
}

fn default_group_size() -> usize {
    5
}

fn default_group_delay_ms() -> u64 {
    2000
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            enrich_group_size: default_group_size(),
            group_delay_ms: default_group_delay_ms(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub query: ListingQuery,
    pub max_results: usize,
    pub enrich: bool,
    pub generate: bool,
    pub max_retries: u32,
}

impl RunOptions {
    pub fn new(query: ListingQuery, max_results: usize) -> Self {
        Self {
            query,
            max_results,
            enrich: true,
            generate: true,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub discovered: usize,
    pub saved: usize,
    pub enriched: usize,
    pub enrich_failed: usize,
    pub generated: usize,
    pub generate_failed: usize,
}

/// Drives one full pass over freshly discovered listings.
pub struct Orchestrator<'a> {
    pipeline: &'a Pipeline,
    config: OrchestratorConfig,
}

impl<'a> Orchestrator<'a> {
    pub fn new(pipeline: &'a Pipeline, config: OrchestratorConfig) -> Self {
        Self { pipeline, config }
    }

    pub async fn run(&self, options: &RunOptions) -> Result<RunSummary, PipelineError> {
        let mut summary = RunSummary::default();

        let found = self
            .pipeline
            .discover(&options.query, options.max_results)
            .await?;
        summary.discovered = found.len();
        summary.saved = self.pipeline.db().listings().upsert_all(&found).await?;
        info!(
            "Discovered {} listing(s), saved {}",
            summary.discovered, summary.saved
        );

        if !options.enrich {
            return Ok(summary);
        }

        // Listings seen before may already be past discovery
        let mut pending = Vec::with_capacity(found.len());
        for listing in &found {
            if let Some(stored) = self.pipeline.db().listings().get(&listing.id).await? {
                if stored.status == ListingStatus::Discovered {
                    pending.push(stored);
                }
            }
        }

        let enriched = self.enrich_in_groups(&pending, options, &mut summary).await;

        if options.generate && !enriched.is_empty() {
            self.generate(&enriched, options, &mut summary).await?;
        }

        Ok(summary)
    }

    async fn enrich_in_groups(
        &self,
        pending: &[Listing],
        options: &RunOptions,
        summary: &mut RunSummary,
    ) -> Vec<String> {
        let runner = self.pipeline.runner();
        let processor = self.pipeline.enrich_processor();
        let group_size = self.config.enrich_group_size.max(1);
        let delay = Duration::from_millis(self.config.group_delay_ms);
        let groups: Vec<&[Listing]> = pending.chunks(group_size).collect();
        let mut enriched = Vec::new();

        for (index, group) in groups.iter().enumerate() {
            info!(
                "Enriching group {}/{} ({} listing(s))",
                index + 1,
                groups.len(),
                group.len()
            );
            let results = join_all(
                group
                    .iter()
                    .map(|listing| runner.process_one(&processor, listing, options.max_retries)),
            )
            .await;

            for (listing, result) in group.iter().zip(results) {
                match result {
                    Ok(RecordOutcome::Succeeded) => {
                        summary.enriched += 1;
                        enriched.push(listing.id.clone());
                    }
                    Ok(RecordOutcome::Skipped) => {}
                    Ok(RecordOutcome::Retrying(_)) | Ok(RecordOutcome::Failed(_)) => {
                        summary.enrich_failed += 1;
                    }
                    Err(e) => {
                        error!("Enrichment of {} could not be recorded: {}", listing.id, e);
                        summary.enrich_failed += 1;
                    }
                }
            }

            if index + 1 < groups.len() && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        enriched
    }

    async fn generate(
        &self,
        ids: &[String],
        options: &RunOptions,
        summary: &mut RunSummary,
    ) -> Result<(), PipelineError> {
        let runner = self.pipeline.runner();
        let processor = self.pipeline.generate_processor().await?;

        for id in ids {
            let Some(listing) = self.pipeline.db().listings().get(id).await? else {
                warn!("Listing {} disappeared before generation", id);
                continue;
            };
            match runner
                .process_one(&processor, &listing, options.max_retries)
                .await
            {
                Ok(RecordOutcome::Succeeded) => summary.generated += 1,
                Ok(RecordOutcome::Skipped) => {}
                Ok(_) => summary.generate_failed += 1,
                Err(e) => {
                    error!("Generation of {} could not be recorded: {}", id, e);
                    summary.generate_failed += 1;
                }
            }
        }
        Ok(())
    }
}
