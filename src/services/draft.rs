//! Cover email drafting.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::DraftGenerator;
use crate::llm::TextModel;
use crate::models::{
    parse_subject, CompanyResearch, Draft, Listing, SOURCE_COMPANY_ABOUT, SOURCE_COMPANY_PAGE,
    SOURCE_WEBSITE,
};

/// Generation collaborator: writes a cover email with the LLM.
pub struct DraftWriter {
    model: Arc<dyn TextModel>,
    /// Template with `{job_details}`, `{company_research}` and `{resume}`.
    template: String,
}

impl DraftWriter {
    pub fn new(model: Arc<dyn TextModel>, template: impl Into<String>) -> Self {
        Self {
            model,
            template: template.into(),
        }
    }

    pub fn build_prompt(&self, listing: &Listing, research: &CompanyResearch, resume: &str) -> String {
        let job_details = format!(
            "Job Title: {}\nCompany: {}\nLocation: {}",
            listing.title,
            listing.company,
            listing.location.as_deref().unwrap_or("Not specified")
        );

        self.template
            .replace("{job_details}", &job_details)
            .replace("{company_research}", &research_section(research))
            .replace("{resume}", resume.trim())
    }
}

/// Summaries in a fixed source order, each under its own heading.
fn research_section(research: &CompanyResearch) -> String {
    let known = [
        (SOURCE_COMPANY_PAGE, "Company Profile Summary"),
        (SOURCE_COMPANY_ABOUT, "Company About Page Summary"),
        (SOURCE_WEBSITE, "Company Website Summary"),
    ];

    let mut sections: Vec<String> = known
        .iter()
        .filter_map(|(key, heading)| {
            research
                .summaries
                .get(*key)
                .map(|text| format!("{}:\n{}\n", heading, text))
        })
        .collect();
    sections.extend(
        research
            .summaries
            .iter()
            .filter(|(key, _)| !known.iter().any(|(k, _)| *k == key.as_str()))
            .map(|(key, text)| format!("{} Summary:\n{}\n", key, text)),
    );
    sections.join("\n")
}

#[async_trait]
impl DraftGenerator for DraftWriter {
    async fn generate(
        &self,
        listing: &Listing,
        research: &CompanyResearch,
        profile: &str,
    ) -> anyhow::Result<Option<Draft>> {
        if !research.has_summaries() {
            warn!("No research summaries for listing {}", listing.id);
            return Ok(None);
        }
        if profile.trim().is_empty() {
            warn!("Resume text is empty; cannot draft for {}", listing.id);
            return Ok(None);
        }

        info!(
            "Drafting cover email for {} at {}",
            listing.title, listing.company
        );
        let prompt = self.build_prompt(listing, research, profile);
        debug!("Draft prompt is {} chars", prompt.len());

        let text = self.model.complete(&prompt).await?;
        let body = text.trim();
        if body.is_empty() {
            return Ok(None);
        }

        let mut draft = Draft::new(listing.id.clone(), body.to_string());
        draft.notes = Some(format!(
            "Generated from company research summaries. Subject: {}",
            parse_subject(body).unwrap_or("Not extracted")
        ));
        Ok(Some(draft))
    }
}

/// Read the resume/profile document as plain text.
///
/// A missing file is not an error: drafting just has nothing to work from.
pub async fn load_profile(path: &Path) -> anyhow::Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) if text.trim().is_empty() => Ok(None),
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Resume not found at {}", path.display());
            Ok(None)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read resume {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, DEFAULT_DRAFT_PROMPT};

    struct CannedModel(&'static str);

    #[async_trait]
    impl TextModel for CannedModel {
        async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }
    }

    fn listing() -> Listing {
        let mut listing = Listing::new(
            "42".into(),
            "Backend Engineer".into(),
            "Acme".into(),
            "https://www.linkedin.com/jobs/view/42/".into(),
        );
        listing.location = Some("Remote".into());
        listing
    }

    fn research() -> CompanyResearch {
        let mut research = CompanyResearch::new("42".into(), "Acme".into());
        research.add_summary(SOURCE_WEBSITE, "Acme sells anvils.");
        research.add_summary(SOURCE_COMPANY_PAGE, "Acme has 200 employees.");
        research
    }

    #[test]
    fn test_prompt_contains_job_research_and_resume() {
        let writer = DraftWriter::new(Arc::new(CannedModel("")), DEFAULT_DRAFT_PROMPT);
        let prompt = writer.build_prompt(&listing(), &research(), "  Ten years of Rust.\n");

        assert!(prompt.contains("Job Title: Backend Engineer"));
        assert!(prompt.contains("Location: Remote"));
        assert!(prompt.contains("Ten years of Rust."));
        let page = prompt.find("Acme has 200 employees.").unwrap();
        let site = prompt.find("Acme sells anvils.").unwrap();
        assert!(page < site);
    }

    #[tokio::test]
    async fn test_subject_goes_into_notes() {
        let writer = DraftWriter::new(
            Arc::new(CannedModel("Subject: Backend role at Acme\n\nHello Acme team,")),
            DEFAULT_DRAFT_PROMPT,
        );
        let draft = writer
            .generate(&listing(), &research(), "Rust")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(draft.listing_id, "42");
        assert_eq!(draft.subject(), Some("Backend role at Acme"));
        assert_eq!(
            draft.notes.as_deref(),
            Some("Generated from company research summaries. Subject: Backend role at Acme")
        );
    }

    #[tokio::test]
    async fn test_no_output_without_inputs() {
        let writer = DraftWriter::new(Arc::new(CannedModel("Subject: x")), DEFAULT_DRAFT_PROMPT);
        let empty = CompanyResearch::new("42".into(), "Acme".into());

        assert!(writer.generate(&listing(), &empty, "Rust").await.unwrap().is_none());
        assert!(writer.generate(&listing(), &research(), "  ").await.unwrap().is_none());

        let silent = DraftWriter::new(Arc::new(CannedModel("   ")), DEFAULT_DRAFT_PROMPT);
        assert!(silent.generate(&listing(), &research(), "Rust").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_profile_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_profile(&dir.path().join("resume.txt")).await.unwrap().is_none());

        let path = dir.path().join("cv.txt");
        std::fs::write(&path, "Rust engineer").unwrap();
        assert_eq!(
            load_profile(&path).await.unwrap().as_deref(),
            Some("Rust engineer")
        );
    }
}
