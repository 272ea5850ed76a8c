//! Bounded-retry stage execution.

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::PipelineError;
use crate::models::{Listing, Stage};
use crate::repository::DieselListingRepository;

/// What processing one listing produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// Output stored; the listing may advance.
    Completed,
    /// The collaborator ran but produced nothing usable.
    NoOutput(String),
}

/// Per-stage work applied to a single listing.
#[async_trait]
pub trait StageProcessor: Send + Sync {
    fn stage(&self) -> Stage;

    async fn process(&self, listing: &Listing) -> anyhow::Result<StageOutcome>;
}

/// Where a listing ended up after one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Succeeded,
    /// Rolled back to the stage's pending status with this error.
    Retrying(String),
    /// Retry budget exhausted; terminal.
    Failed(String),
    /// Could not be claimed (no longer pending).
    Skipped,
}

/// Counts for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageReport {
    pub selected: usize,
    pub succeeded: usize,
    pub retrying: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Records whose state could not be written.
    pub errors: usize,
}

impl StageReport {
    fn tally(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Succeeded => self.succeeded += 1,
            RecordOutcome::Retrying(_) => self.retrying += 1,
            RecordOutcome::Failed(_) => self.failed += 1,
            RecordOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// Applies the claim / process / advance-or-retry cycle to listings.
#[derive(Clone)]
pub struct StageRunner {
    listings: DieselListingRepository,
}

impl StageRunner {
    pub fn new(listings: DieselListingRepository) -> Self {
        Self { listings }
    }

    /// Process up to `batch_size` pending listings for the processor's stage.
    ///
    /// Listings are handled one at a time, oldest first. A failing listing
    /// never stops the batch.
    pub async fn run(
        &self,
        processor: &dyn StageProcessor,
        batch_size: usize,
        max_retries: u32,
    ) -> Result<StageReport, PipelineError> {
        let stage = processor.stage();
        let batch = self
            .listings
            .pending_for_stage(stage, max_retries, batch_size as i64)
            .await?;

        let mut report = StageReport {
            selected: batch.len(),
            ..Default::default()
        };
        if batch.is_empty() {
            debug!("No listings pending {}", stage);
            return Ok(report);
        }
        info!("Running {} on {} listing(s)", stage, batch.len());

        for listing in &batch {
            match self.process_one(processor, listing, max_retries).await {
                Ok(outcome) => report.tally(&outcome),
                Err(e) => {
                    error!("{} of {} could not be recorded: {}", stage, listing.id, e);
                    report.errors += 1;
                }
            }
        }

        info!(
            "{}: {} succeeded, {} will retry, {} failed",
            stage, report.succeeded, report.retrying, report.failed
        );
        Ok(report)
    }

    /// Claim one listing, run the processor on it and record the result.
    pub async fn process_one(
        &self,
        processor: &dyn StageProcessor,
        listing: &Listing,
        max_retries: u32,
    ) -> Result<RecordOutcome, PipelineError> {
        let stage = processor.stage();
        if !self.listings.mark_running(&listing.id, stage).await? {
            debug!("{} is no longer pending {}", listing.id, stage);
            return Ok(RecordOutcome::Skipped);
        }

        let error = match processor.process(listing).await {
            Ok(StageOutcome::Completed) => {
                self.listings.mark_done(&listing.id, stage).await?;
                debug!("{} completed {}", listing.id, stage);
                return Ok(RecordOutcome::Succeeded);
            }
            Ok(StageOutcome::NoOutput(reason)) => format!("no usable output: {}", reason),
            Err(e) => format!("{:#}", e),
        };

        let status = self
            .listings
            .record_failure(&listing.id, stage, &error, max_retries)
            .await?;
        if status == stage.failed_status() {
            warn!("{} failed {} permanently: {}", listing.id, stage, error);
            Ok(RecordOutcome::Failed(error))
        } else {
            warn!("{} failed {} (will retry): {}", listing.id, stage, error);
            Ok(RecordOutcome::Retrying(error))
        }
    }
}
