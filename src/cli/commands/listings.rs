//! Read-only commands over stored listings.

use std::path::PathBuf;

use console::style;
use serde::Serialize;

use crate::config::Settings;
use crate::models::{CompanyResearch, Draft, Listing, ListingStatus};
use crate::repository::{DbContext, ListingFilter};

use super::super::helpers::{open_db, truncate};

/// List stored listings, newest first.
pub async fn cmd_list(
    settings: &Settings,
    status: Option<ListingStatus>,
    company: Option<String>,
    limit: i64,
) -> anyhow::Result<()> {
    let db = open_db(settings).await?;
    let filter = ListingFilter {
        status,
        company,
        limit: Some(limit),
        ..Default::default()
    };
    let listings = db.listings().list(&filter).await?;

    if listings.is_empty() {
        println!("{} No listings found", style("!").yellow());
        return Ok(());
    }

    println!(
        "{:<12} {:<16} {:<24} {:<40} {}",
        style("ID").bold(),
        style("STATUS").bold(),
        style("COMPANY").bold(),
        style("TITLE").bold(),
        style("FOUND").bold()
    );
    for listing in &listings {
        let status = match listing.status {
            ListingStatus::Generated => style(listing.status.as_str()).green(),
            ListingStatus::Failed(_) => style(listing.status.as_str()).red(),
            _ => style(listing.status.as_str()).cyan(),
        };
        println!(
            "{:<12} {:<16} {:<24} {:<40} {}",
            listing.id,
            status,
            truncate(&listing.company, 24),
            truncate(&listing.title, 40),
            listing.created_at.format("%Y-%m-%d")
        );
    }
    println!("\n{} listing(s)", listings.len());
    Ok(())
}

/// Listing counts per status.
pub async fn cmd_status(settings: &Settings) -> anyhow::Result<()> {
    let db = open_db(settings).await?;
    let counts = db.listings().count_by_status().await?;

    println!("{}", style("jobflow status").bold());
    println!("{}", "─".repeat(32));
    println!("Database: {}", settings.database_url());
    println!("Resume:   {}", settings.resume_path.display());
    println!();

    let mut total = 0;
    for status in ListingStatus::ALL {
        let count = counts
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, n)| *n)
            .unwrap_or(0);
        total += count;
        let line = format!("{:<18} {:>6}", status.as_str(), count);
        if count == 0 {
            println!("  {}", style(line).dim());
        } else {
            println!("  {}", line);
        }
    }
    println!("  {:<18} {:>6}", style("total").bold(), total);
    Ok(())
}

/// One exported row: the listing with whatever research and draft exist.
#[derive(Debug, Serialize)]
pub struct ExportRecord {
    #[serde(flatten)]
    pub listing: Listing,
    pub research: Option<CompanyResearch>,
    pub draft: Option<Draft>,
}

async fn collect_export(
    db: &DbContext,
    filter: &ListingFilter,
) -> anyhow::Result<Vec<ExportRecord>> {
    let research = db.research();
    let drafts = db.drafts();
    let mut records = Vec::new();
    for listing in db.listings().list(filter).await? {
        records.push(ExportRecord {
            research: research.get(&listing.id).await?,
            draft: drafts.get(&listing.id).await?,
            listing,
        });
    }
    Ok(records)
}

/// Export listings joined with research and drafts as pretty JSON.
pub async fn cmd_export(
    settings: &Settings,
    filter: ListingFilter,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let db = open_db(settings).await?;
    let records = collect_export(&db, &filter).await?;
    let json = serde_json::to_string_pretty(&records)?;

    match output {
        Some(path) => {
            tokio::fs::write(&path, json).await?;
            println!(
                "{} Exported {} listing(s) to {}",
                style("✓").green(),
                records.len(),
                path.display()
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SOURCE_WEBSITE;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_export_joins_research_and_draft() {
        let dir = tempdir().unwrap();
        let db = DbContext::open(dir.path().join("jobs.db").to_str().unwrap())
            .await
            .unwrap();
        for (id, company) in [("1", "Acme"), ("2", "Globex")] {
            let listing = Listing::new(
                id.into(),
                "Engineer".into(),
                company.into(),
                format!("https://example.test/jobs/view/{}/", id),
            );
            db.listings().upsert(&listing).await.unwrap();
        }
        let mut research = CompanyResearch::new("1".into(), "Acme".into());
        research.add_summary(SOURCE_WEBSITE, "Anvils.");
        db.research().upsert(&research).await.unwrap();
        db.drafts()
            .upsert(&Draft::new("1".into(), "Subject: Hi\n\nBody".into()))
            .await
            .unwrap();

        let filter = ListingFilter {
            company: Some("acme".into()),
            ..Default::default()
        };
        let records = collect_export(&db, &filter).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].research.is_some());

        let value = serde_json::to_value(&records[0]).unwrap();
        assert_eq!(value["id"], "1");
        assert_eq!(value["status"], "discovered");
        assert_eq!(value["research"]["summaries"]["website"], "Anvils.");
        assert_eq!(value["draft"]["status"], "pending");
    }
}
