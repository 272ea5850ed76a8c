//! Company research gathered for a listing.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary key for the company profile page.
pub const SOURCE_COMPANY_PAGE: &str = "linkedin_page";
/// Summary key for the company profile's About page.
pub const SOURCE_COMPANY_ABOUT: &str = "linkedin_about";
/// Summary key for the company's own website.
pub const SOURCE_WEBSITE: &str = "website";

/// Enrichment result for one listing (at most one per listing id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyResearch {
    pub listing_id: String,
    pub company: String,
    /// Free-text summaries keyed by the source they were drawn from.
    pub summaries: BTreeMap<String, String>,
    /// Company website discovered while researching.
    pub website: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CompanyResearch {
    pub fn new(listing_id: String, company: String) -> Self {
        Self {
            listing_id,
            company,
            summaries: BTreeMap::new(),
            website: None,
            created_at: Utc::now(),
        }
    }

    /// Add a summary, ignoring blank text.
    pub fn add_summary(&mut self, source: &str, text: impl Into<String>) {
        let text = text.into();
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            self.summaries.insert(source.to_string(), trimmed.to_string());
        }
    }

    /// Research without a single summary is not usable downstream.
    pub fn has_summaries(&self) -> bool {
        self.summaries.values().any(|s| !s.trim().is_empty())
    }

    /// Copy this research onto another listing of the same company.
    pub fn reuse_for(&self, listing_id: &str) -> Self {
        Self {
            listing_id: listing_id.to_string(),
            company: self.company.clone(),
            summaries: self.summaries.clone(),
            website: self.website.clone(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_summaries_do_not_count() {
        let mut research = CompanyResearch::new("1".into(), "Acme".into());
        assert!(!research.has_summaries());

        research.add_summary(SOURCE_WEBSITE, "   \n");
        assert!(!research.has_summaries());

        research.add_summary(SOURCE_COMPANY_ABOUT, " Acme builds rockets. ");
        assert!(research.has_summaries());
        assert_eq!(research.summaries[SOURCE_COMPANY_ABOUT], "Acme builds rockets.");
    }

    #[test]
    fn test_reuse_keeps_summaries() {
        let mut research = CompanyResearch::new("1".into(), "Acme".into());
        research.add_summary(SOURCE_COMPANY_PAGE, "Rockets.");
        research.website = Some("https://acme.test".into());

        let copy = research.reuse_for("2");
        assert_eq!(copy.listing_id, "2");
        assert_eq!(copy.summaries, research.summaries);
        assert_eq!(copy.website, research.website);
    }
}
