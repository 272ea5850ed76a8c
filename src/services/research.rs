//! Company research over plain HTTP.
//!
//! Reads the company's profile page, its About page and the website linked
//! from there, and asks the model for a short summary of each source.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use super::page_text::{about_url, find_website, visible_text};
use super::Enricher;
use crate::llm::{truncate_content, TextModel};
use crate::models::{
    CompanyResearch, Listing, SOURCE_COMPANY_ABOUT, SOURCE_COMPANY_PAGE, SOURCE_WEBSITE,
};

/// Browser-like user agent; profile pages return a login wall to obvious bots.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// HTTP settings for research fetches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Pages with less visible text than this are not summarized
    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: usize,
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_min_text_chars() -> usize {
    200
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout: default_timeout(),
            min_text_chars: default_min_text_chars(),
        }
    }
}

/// Enrichment collaborator backed by HTTP fetches and an LLM.
pub struct CompanyResearcher {
    model: Arc<dyn TextModel>,
    http: Client,
    config: ResearchConfig,
    summary_prompt: String,
}

impl CompanyResearcher {
    pub fn new(
        model: Arc<dyn TextModel>,
        config: ResearchConfig,
        summary_prompt: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout))
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            model,
            http,
            config,
            summary_prompt: summary_prompt.into(),
        })
    }

    async fn fetch(&self, url: &str) -> anyhow::Result<String> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {}", url))?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("GET {} returned HTTP {}", url, status);
        }
        resp.text()
            .await
            .with_context(|| format!("Reading body of {}", url))
    }

    /// Summarize one page; `None` when it has too little text to work with.
    async fn summarize(
        &self,
        company: &str,
        source: &str,
        html: &str,
    ) -> anyhow::Result<Option<String>> {
        let text = visible_text(html);
        if text.len() < self.config.min_text_chars {
            debug!("Skipping {} for {}: only {} chars", source, company, text.len());
            return Ok(None);
        }

        let excerpt = truncate_content(&text, self.model.max_content_chars());
        let summary = summarize_with(
            self.model.as_ref(),
            &self.summary_prompt,
            company,
            source,
            excerpt,
        )
        .await?;
        Ok(Some(summary).filter(|s| !s.is_empty()))
    }
}

/// Ask `model` for a summary of one source's text.
///
/// `template` uses `{company}`, `{source}` and `{content}` placeholders.
pub async fn summarize_with(
    model: &dyn TextModel,
    template: &str,
    company: &str,
    source: &str,
    text: &str,
) -> anyhow::Result<String> {
    let prompt = template
        .replace("{company}", company)
        .replace("{source}", source_description(source))
        .replace("{content}", text);
    let response = model.complete(&prompt).await?;
    Ok(response.trim().to_string())
}

fn source_description(source: &str) -> &'static str {
    match source {
        SOURCE_COMPANY_PAGE => "company profile page",
        SOURCE_COMPANY_ABOUT => "company profile About page",
        SOURCE_WEBSITE => "own website",
        _ => "web page",
    }
}

#[async_trait]
impl Enricher for CompanyResearcher {
    async fn enrich(&self, listing: &Listing) -> anyhow::Result<Option<CompanyResearch>> {
        let Some(ref company_url) = listing.company_url else {
            warn!("{} ({}) has no company page to research", listing.company, listing.id);
            return Ok(None);
        };
        info!("Researching {} for listing {}", listing.company, listing.id);

        let mut research = CompanyResearch::new(listing.id.clone(), listing.company.clone());
        let profile_host = Url::parse(company_url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
            .unwrap_or_default();

        match self.fetch(company_url).await {
            Ok(html) => {
                if let Some(summary) = self
                    .summarize(&listing.company, SOURCE_COMPANY_PAGE, &html)
                    .await?
                {
                    research.add_summary(SOURCE_COMPANY_PAGE, summary);
                }
            }
            Err(e) => warn!("Could not fetch company page for {}: {:#}", listing.company, e),
        }

        if let Some(about) = about_url(company_url) {
            match self.fetch(&about).await {
                Ok(html) => {
                    research.website = find_website(&html, &profile_host);
                    if let Some(summary) = self
                        .summarize(&listing.company, SOURCE_COMPANY_ABOUT, &html)
                        .await?
                    {
                        research.add_summary(SOURCE_COMPANY_ABOUT, summary);
                    }
                }
                Err(e) => warn!("Could not fetch About page for {}: {:#}", listing.company, e),
            }
        }

        if let Some(website) = research.website.clone() {
            match self.fetch(&website).await {
                Ok(html) => {
                    if let Some(summary) = self
                        .summarize(&listing.company, SOURCE_WEBSITE, &html)
                        .await?
                    {
                        research.add_summary(SOURCE_WEBSITE, summary);
                    }
                }
                Err(e) => warn!("Could not fetch {}: {:#}", website, e),
            }
        }

        if research.has_summaries() {
            info!(
                "Collected {} summary(ies) for {}",
                research.summaries.len(),
                listing.company
            );
            Ok(Some(research))
        } else {
            Ok(None)
        }
    }
}
