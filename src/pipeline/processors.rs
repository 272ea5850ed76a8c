//! Enrichment and generation stage processors.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::runner::{StageOutcome, StageProcessor};
use crate::models::{Listing, Stage};
use crate::repository::{DieselDraftRepository, DieselResearchRepository};
use crate::services::{DraftGenerator, Enricher};

/// Researches the company behind a listing and stores the result.
///
/// Research already stored for the same company is copied instead of
/// researching again.
pub struct EnrichProcessor {
    research: DieselResearchRepository,
    enricher: Arc<dyn Enricher>,
}

impl EnrichProcessor {
    pub fn new(research: DieselResearchRepository, enricher: Arc<dyn Enricher>) -> Self {
        Self { research, enricher }
    }
}

#[async_trait]
impl StageProcessor for EnrichProcessor {
    fn stage(&self) -> Stage {
        Stage::Enrich
    }

    async fn process(&self, listing: &Listing) -> anyhow::Result<StageOutcome> {
        if let Some(existing) = self.research.find_reusable(&listing.company).await? {
            info!(
                "Reusing research on {} from listing {} for {}",
                listing.company, existing.listing_id, listing.id
            );
            self.research.upsert(&existing.reuse_for(&listing.id)).await?;
            return Ok(StageOutcome::Completed);
        }

        let Some(mut research) = self.enricher.enrich(listing).await? else {
            return Ok(StageOutcome::NoOutput("research returned nothing".into()));
        };
        if !research.has_summaries() {
            return Ok(StageOutcome::NoOutput("research has no summaries".into()));
        }

        research.listing_id = listing.id.clone();
        self.research.upsert(&research).await?;
        Ok(StageOutcome::Completed)
    }
}

/// Drafts a cover email from stored research and the resume.
pub struct GenerateProcessor {
    research: DieselResearchRepository,
    drafts: DieselDraftRepository,
    generator: Arc<dyn DraftGenerator>,
    /// Resume text, loaded once per run. `None` when unavailable.
    profile: Option<String>,
}

impl GenerateProcessor {
    pub fn new(
        research: DieselResearchRepository,
        drafts: DieselDraftRepository,
        generator: Arc<dyn DraftGenerator>,
        profile: Option<String>,
    ) -> Self {
        Self {
            research,
            drafts,
            generator,
            profile,
        }
    }
}

#[async_trait]
impl StageProcessor for GenerateProcessor {
    fn stage(&self) -> Stage {
        Stage::Generate
    }

    async fn process(&self, listing: &Listing) -> anyhow::Result<StageOutcome> {
        let Some(research) = self.research.get(&listing.id).await? else {
            return Ok(StageOutcome::NoOutput("no company research stored".into()));
        };
        let Some(ref profile) = self.profile else {
            return Ok(StageOutcome::NoOutput("resume not available".into()));
        };

        match self.generator.generate(listing, &research, profile).await? {
            Some(mut draft) => {
                draft.listing_id = listing.id.clone();
                self.drafts.upsert(&draft).await?;
                Ok(StageOutcome::Completed)
            }
            None => Ok(StageOutcome::NoOutput("draft generator returned nothing".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompanyResearch, Draft, SOURCE_COMPANY_PAGE};
    use crate::repository::DbContext;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct CountingEnricher {
        calls: AtomicUsize,
        summary: Option<&'static str>,
    }

    #[async_trait]
    impl Enricher for CountingEnricher {
        async fn enrich(&self, listing: &Listing) -> anyhow::Result<Option<CompanyResearch>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut research = CompanyResearch::new("ignored".into(), listing.company.clone());
            if let Some(text) = self.summary {
                research.add_summary(SOURCE_COMPANY_PAGE, text);
            }
            Ok(Some(research))
        }
    }

    struct EchoGenerator;

    #[async_trait]
    impl DraftGenerator for EchoGenerator {
        async fn generate(
            &self,
            listing: &Listing,
            _research: &CompanyResearch,
            profile: &str,
        ) -> anyhow::Result<Option<Draft>> {
            Ok(Some(Draft::new(
                listing.id.clone(),
                format!("Subject: {}\n\n{}", listing.title, profile),
            )))
        }
    }

    fn listing(id: &str, company: &str) -> Listing {
        Listing::new(
            id.into(),
            "Engineer".into(),
            company.into(),
            format!("https://example.test/jobs/view/{}/", id),
        )
    }

    async fn open_db() -> (DbContext, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = DbContext::open(dir.path().join("jobs.db").to_str().unwrap())
            .await
            .unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn test_research_is_reused_per_company() {
        let (db, _dir) = open_db().await;
        let enricher = Arc::new(CountingEnricher {
            calls: AtomicUsize::new(0),
            summary: Some("Acme makes anvils."),
        });
        let processor = EnrichProcessor::new(db.research(), enricher.clone());

        let first = processor.process(&listing("1", "Acme")).await.unwrap();
        let second = processor.process(&listing("2", "Acme")).await.unwrap();

        assert_eq!(first, StageOutcome::Completed);
        assert_eq!(second, StageOutcome::Completed);
        assert_eq!(enricher.calls.load(Ordering::SeqCst), 1);

        let copied = db.research().get("2").await.unwrap().unwrap();
        assert_eq!(copied.listing_id, "2");
        assert_eq!(
            copied.summaries.get(SOURCE_COMPANY_PAGE).map(String::as_str),
            Some("Acme makes anvils.")
        );
    }

    #[tokio::test]
    async fn test_research_without_summaries_is_no_output() {
        let (db, _dir) = open_db().await;
        let enricher = Arc::new(CountingEnricher {
            calls: AtomicUsize::new(0),
            summary: None,
        });
        let processor = EnrichProcessor::new(db.research(), enricher);

        let outcome = processor.process(&listing("1", "Acme")).await.unwrap();
        assert!(matches!(outcome, StageOutcome::NoOutput(_)));
        assert!(db.research().get("1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_generation_needs_research_and_resume() {
        let (db, _dir) = open_db().await;
        let job = listing("1", "Acme");

        let processor = GenerateProcessor::new(
            db.research(),
            db.drafts(),
            Arc::new(EchoGenerator),
            Some("Rust for ten years".into()),
        );
        assert!(matches!(
            processor.process(&job).await.unwrap(),
            StageOutcome::NoOutput(_)
        ));

        let mut research = CompanyResearch::new("1".into(), "Acme".into());
        research.add_summary(SOURCE_COMPANY_PAGE, "Acme makes anvils.");
        db.research().upsert(&research).await.unwrap();

        let without_resume =
            GenerateProcessor::new(db.research(), db.drafts(), Arc::new(EchoGenerator), None);
        assert!(matches!(
            without_resume.process(&job).await.unwrap(),
            StageOutcome::NoOutput(_)
        ));

        assert_eq!(processor.process(&job).await.unwrap(), StageOutcome::Completed);
        let draft = db.drafts().get("1").await.unwrap().unwrap();
        assert_eq!(draft.subject(), Some("Engineer"));
    }
}
