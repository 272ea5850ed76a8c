//! Diesel-based company research repository for SQLite.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::models::ResearchRecord;
use super::pool::{AsyncSqlitePool, DieselError};
use super::{format_datetime, parse_datetime};
use crate::models::CompanyResearch;
use crate::schema::company_research;

impl From<ResearchRecord> for CompanyResearch {
    fn from(record: ResearchRecord) -> Self {
        CompanyResearch {
            listing_id: record.listing_id,
            company: record.company,
            summaries: serde_json::from_str(&record.summaries).unwrap_or_default(),
            website: record.website,
            created_at: parse_datetime(&record.created_at),
        }
    }
}

/// Company research keyed by listing id; the last write wins.
#[derive(Clone)]
pub struct DieselResearchRepository {
    pool: AsyncSqlitePool,
}

impl DieselResearchRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, listing_id: &str) -> Result<Option<CompanyResearch>, DieselError> {
        let mut conn = self.pool.get().await?;

        company_research::table
            .find(listing_id)
            .first::<ResearchRecord>(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(CompanyResearch::from))
    }

    /// Save research, replacing any earlier row for the same listing.
    pub async fn upsert(&self, research: &CompanyResearch) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;

        let summaries =
            serde_json::to_string(&research.summaries).unwrap_or_else(|_| "{}".to_string());
        let created_at = format_datetime(&research.created_at);

        diesel::replace_into(company_research::table)
            .values((
                company_research::listing_id.eq(&research.listing_id),
                company_research::company.eq(&research.company),
                company_research::summaries.eq(&summaries),
                company_research::website.eq(&research.website),
                company_research::created_at.eq(&created_at),
            ))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    /// Most recent research for a company that has at least one summary.
    pub async fn find_reusable(
        &self,
        company: &str,
    ) -> Result<Option<CompanyResearch>, DieselError> {
        let mut conn = self.pool.get().await?;

        let records = company_research::table
            .filter(company_research::company.eq(company))
            .order(company_research::created_at.desc())
            .load::<ResearchRecord>(&mut conn)
            .await?;

        Ok(records
            .into_iter()
            .map(CompanyResearch::from)
            .find(|r| r.has_summaries()))
    }

    /// Research rows, newest first.
    pub async fn list(&self, limit: i64) -> Result<Vec<CompanyResearch>, DieselError> {
        let mut conn = self.pool.get().await?;

        company_research::table
            .order(company_research::created_at.desc())
            .limit(limit)
            .load::<ResearchRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(CompanyResearch::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SOURCE_COMPANY_ABOUT, SOURCE_WEBSITE};
    use crate::repository::migrations::init_schema;
    use tempfile::tempdir;

    async fn setup_test_db() -> (AsyncSqlitePool, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let pool = AsyncSqlitePool::from_path(&dir.path().join("test.db"));
        init_schema(&pool).await.unwrap();
        (pool, dir)
    }

    #[tokio::test]
    async fn test_upsert_replaces_previous_row() {
        let (pool, _dir) = setup_test_db().await;
        let repo = DieselResearchRepository::new(pool);

        let mut first = CompanyResearch::new("1".into(), "Acme".into());
        first.add_summary(SOURCE_WEBSITE, "Old summary");
        repo.upsert(&first).await.unwrap();

        let mut second = CompanyResearch::new("1".into(), "Acme".into());
        second.add_summary(SOURCE_COMPANY_ABOUT, "New summary");
        second.website = Some("https://acme.test".into());
        repo.upsert(&second).await.unwrap();

        let stored = repo.get("1").await.unwrap().unwrap();
        assert_eq!(stored.summaries.len(), 1);
        assert_eq!(stored.summaries[SOURCE_COMPANY_ABOUT], "New summary");
        assert_eq!(stored.website.as_deref(), Some("https://acme.test"));
        assert_eq!(repo.list(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_find_reusable_skips_empty_research() {
        let (pool, _dir) = setup_test_db().await;
        let repo = DieselResearchRepository::new(pool);

        repo.upsert(&CompanyResearch::new("1".into(), "Acme".into()))
            .await
            .unwrap();
        assert!(repo.find_reusable("Acme").await.unwrap().is_none());

        let mut useful = CompanyResearch::new("2".into(), "Acme".into());
        useful.add_summary(SOURCE_WEBSITE, "Rockets");
        repo.upsert(&useful).await.unwrap();

        let found = repo.find_reusable("Acme").await.unwrap().unwrap();
        assert_eq!(found.listing_id, "2");
        assert!(repo.find_reusable("Globex").await.unwrap().is_none());
    }
}
