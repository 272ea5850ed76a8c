//! Diesel-based listing repository for SQLite.
//!
//! Listings are keyed by the site identifier. Discovery upserts never touch
//! pipeline columns, so re-discovering a listing refreshes its fields without
//! moving it backwards through the pipeline.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;

use super::models::{ListingRecord, NewListing};
use super::pool::{AsyncSqlitePool, DieselError};
use super::util::invalid_status;
use super::{format_datetime, parse_datetime, parse_datetime_opt};
use crate::models::{Listing, ListingStatus, Stage, StageAttempts};
use crate::schema::listings;

/// Convert a database row to a domain model, rejecting unknown statuses.
impl TryFrom<ListingRecord> for Listing {
    type Error = DieselError;

    fn try_from(record: ListingRecord) -> Result<Self, Self::Error> {
        let status = ListingStatus::from_str(&record.status)
            .ok_or_else(|| invalid_status("listing", &record.status))?;

        Ok(Listing {
            id: record.id,
            title: record.title,
            company: record.company,
            url: record.url,
            company_url: record.company_url,
            location: record.location,
            description: record.description,
            tags: serde_json::from_str(&record.tags).unwrap_or_default(),
            posted_date: record.posted_date,
            status,
            enrich: StageAttempts {
                count: record.enrich_attempts.max(0) as u32,
                last_attempt_at: parse_datetime_opt(record.enrich_last_attempt_at),
                last_error: record.enrich_last_error,
            },
            generate: StageAttempts {
                count: record.generate_attempts.max(0) as u32,
                last_attempt_at: parse_datetime_opt(record.generate_last_attempt_at),
                last_error: record.generate_last_error,
            },
            created_at: parse_datetime(&record.created_at),
            updated_at: parse_datetime(&record.updated_at),
        })
    }
}

fn to_listings(records: Vec<ListingRecord>) -> Result<Vec<Listing>, DieselError> {
    records.into_iter().map(Listing::try_from).collect()
}

/// Filter for [`DieselListingRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct ListingFilter {
    pub status: Option<ListingStatus>,
    /// Case-insensitive substring match on the company name.
    pub company: Option<String>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

/// Diesel-based listing repository.
#[derive(Clone)]
pub struct DieselListingRepository {
    pool: AsyncSqlitePool,
}

impl DieselListingRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Get a listing by id.
    pub async fn get(&self, id: &str) -> Result<Option<Listing>, DieselError> {
        let mut conn = self.pool.get().await?;

        listings::table
            .find(id)
            .first::<ListingRecord>(&mut conn)
            .await
            .optional()?
            .map(Listing::try_from)
            .transpose()
    }

    /// Insert a listing or refresh its discovered fields.
    ///
    /// Status, retry counters and `created_at` of an existing row are kept.
    pub async fn upsert(&self, listing: &Listing) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;

        let tags = serde_json::to_string(&listing.tags).unwrap_or_else(|_| "[]".to_string());
        let created_at = format_datetime(&listing.created_at);
        let updated_at = format_datetime(&Utc::now());

        let row = NewListing {
            id: &listing.id,
            title: &listing.title,
            company: &listing.company,
            url: &listing.url,
            company_url: listing.company_url.as_deref(),
            location: listing.location.as_deref(),
            description: listing.description.as_deref(),
            tags: &tags,
            posted_date: listing.posted_date.as_deref(),
            status: ListingStatus::Discovered.as_str(),
            created_at: &created_at,
            updated_at: &updated_at,
        };

        diesel::insert_into(listings::table)
            .values(&row)
            .on_conflict(listings::id)
            .do_update()
            .set((
                listings::title.eq(excluded(listings::title)),
                listings::company.eq(excluded(listings::company)),
                listings::url.eq(excluded(listings::url)),
                listings::company_url.eq(excluded(listings::company_url)),
                listings::location.eq(excluded(listings::location)),
                listings::description.eq(excluded(listings::description)),
                listings::tags.eq(excluded(listings::tags)),
                listings::posted_date.eq(excluded(listings::posted_date)),
                listings::updated_at.eq(excluded(listings::updated_at)),
            ))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    /// Upsert a batch of listings, returning how many were written.
    pub async fn upsert_all(&self, listings: &[Listing]) -> Result<usize, DieselError> {
        for listing in listings {
            self.upsert(listing).await?;
        }
        Ok(listings.len())
    }

    /// List listings matching a filter, newest first.
    pub async fn list(&self, filter: &ListingFilter) -> Result<Vec<Listing>, DieselError> {
        let mut conn = self.pool.get().await?;

        let mut query = listings::table.into_boxed();
        if let Some(status) = filter.status {
            query = query.filter(listings::status.eq(status.as_str()));
        }
        if let Some(ref company) = filter.company {
            query = query.filter(listings::company.like(format!("%{}%", company)));
        }
        if let Some(from) = filter.created_from {
            query = query.filter(listings::created_at.ge(format_datetime(&from)));
        }
        if let Some(to) = filter.created_to {
            query = query.filter(listings::created_at.le(format_datetime(&to)));
        }
        query = query.order((listings::created_at.desc(), listings::id.desc()));
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }

        let records = query
            .load::<ListingRecord>(&mut conn)
            .await?;
        to_listings(records)
    }

    /// Listings waiting for `stage` that still have retries left, oldest first.
    pub async fn pending_for_stage(
        &self,
        stage: Stage,
        max_retries: u32,
        limit: i64,
    ) -> Result<Vec<Listing>, DieselError> {
        let mut conn = self.pool.get().await?;
        let max_retries = max_retries.min(i32::MAX as u32) as i32;

        let query = listings::table
            .filter(listings::status.eq(stage.pending_status().as_str()))
            .into_boxed();

        let query = match stage {
            Stage::Enrich => query.filter(listings::enrich_attempts.lt(max_retries)),
            Stage::Generate => query.filter(listings::generate_attempts.lt(max_retries)),
        };

        let records = query
            .order((listings::created_at.asc(), listings::id.asc()))
            .limit(limit)
            .load::<ListingRecord>(&mut conn)
            .await?;
        to_listings(records)
    }

    /// Move a listing from the stage's pending status to its running status.
    ///
    /// Returns false when the listing is no longer pending, which means some
    /// other run already claimed it.
    pub async fn mark_running(&self, id: &str, stage: Stage) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;
        let now = format_datetime(&Utc::now());

        let rows = diesel::update(
            listings::table
                .filter(listings::id.eq(id))
                .filter(listings::status.eq(stage.pending_status().as_str())),
        )
        .set((
            listings::status.eq(stage.running_status().as_str()),
            listings::updated_at.eq(&now),
        ))
        .execute(&mut conn)
        .await?;

        Ok(rows == 1)
    }

    /// Advance a running listing past `stage` and clear its retry state.
    pub async fn mark_done(&self, id: &str, stage: Stage) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        let now = format_datetime(&Utc::now());
        let target = listings::table
            .filter(listings::id.eq(id))
            .filter(listings::status.eq(stage.running_status().as_str()));
        let status = stage.done_status();

        match stage {
            Stage::Enrich => {
                diesel::update(target)
                    .set((
                        listings::status.eq(status.as_str()),
                        listings::enrich_attempts.eq(0),
                        listings::enrich_last_attempt_at.eq(Some(&now)),
                        listings::enrich_last_error.eq(None::<String>),
                        listings::updated_at.eq(&now),
                    ))
                    .execute(&mut conn)
                    .await?
            }
            Stage::Generate => {
                diesel::update(target)
                    .set((
                        listings::status.eq(status.as_str()),
                        listings::generate_attempts.eq(0),
                        listings::generate_last_attempt_at.eq(Some(&now)),
                        listings::generate_last_error.eq(None::<String>),
                        listings::updated_at.eq(&now),
                    ))
                    .execute(&mut conn)
                    .await?
            }
        };

        Ok(())
    }

    /// Record a failed attempt at `stage`.
    ///
    /// The attempt counter is incremented and the error kept. Once the
    /// counter reaches `max_retries` the listing becomes `failed_<stage>`,
    /// otherwise it rolls back to the stage's pending status. Returns the
    /// status the listing ends up in.
    pub async fn record_failure(
        &self,
        id: &str,
        stage: Stage,
        error: &str,
        max_retries: u32,
    ) -> Result<ListingStatus, DieselError> {
        let listing = self.get(id).await?.ok_or(DieselError::NotFound)?;
        if listing.status != stage.running_status() {
            return Ok(listing.status);
        }

        let attempts = listing.attempts(stage).count.saturating_add(1);
        let status = if attempts >= max_retries {
            stage.failed_status()
        } else {
            stage.pending_status()
        };
        let attempts = attempts.min(i32::MAX as u32) as i32;

        let mut conn = self.pool.get().await?;
        let now = format_datetime(&Utc::now());
        let target = listings::table
            .filter(listings::id.eq(id))
            .filter(listings::status.eq(stage.running_status().as_str()));

        match stage {
            Stage::Enrich => {
                diesel::update(target)
                    .set((
                        listings::status.eq(status.as_str()),
                        listings::enrich_attempts.eq(attempts),
                        listings::enrich_last_attempt_at.eq(Some(&now)),
                        listings::enrich_last_error.eq(Some(error)),
                        listings::updated_at.eq(&now),
                    ))
                    .execute(&mut conn)
                    .await?
            }
            Stage::Generate => {
                diesel::update(target)
                    .set((
                        listings::status.eq(status.as_str()),
                        listings::generate_attempts.eq(attempts),
                        listings::generate_last_attempt_at.eq(Some(&now)),
                        listings::generate_last_error.eq(Some(error)),
                        listings::updated_at.eq(&now),
                    ))
                    .execute(&mut conn)
                    .await?
            }
        };

        Ok(status)
    }

    /// Roll listings left in the stage's running status back to pending.
    ///
    /// Only safe while no other run of the stage is active, e.g. when the
    /// daemon starts after an unclean exit.
    pub async fn release_running(&self, stage: Stage) -> Result<usize, DieselError> {
        let mut conn = self.pool.get().await?;
        let now = format_datetime(&Utc::now());

        diesel::update(listings::table.filter(listings::status.eq(stage.running_status().as_str())))
            .set((
                listings::status.eq(stage.pending_status().as_str()),
                listings::updated_at.eq(&now),
            ))
            .execute(&mut conn)
            .await
    }

    /// Number of listings per status, in pipeline order.
    pub async fn count_by_status(&self) -> Result<Vec<(ListingStatus, i64)>, DieselError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::count_star;
        let rows: Vec<(String, i64)> = listings::table
            .group_by(listings::status)
            .select((listings::status, count_star()))
            .load(&mut conn)
            .await?;

        let mut counts = Vec::with_capacity(ListingStatus::ALL.len());
        for status in ListingStatus::ALL {
            let count = rows
                .iter()
                .find(|(s, _)| s == status.as_str())
                .map(|(_, c)| *c)
                .unwrap_or(0);
            counts.push((status, count));
        }
        if let Some((unknown, _)) = rows
            .iter()
            .find(|(s, _)| ListingStatus::from_str(s).is_none())
        {
            return Err(invalid_status("listing", unknown));
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::migrations::init_schema;
    use crate::repository::util::is_invalid_status;
    use diesel_async::SimpleAsyncConnection;
    use tempfile::tempdir;

    async fn setup_test_db() -> (AsyncSqlitePool, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let pool = AsyncSqlitePool::from_path(&db_path);
        init_schema(&pool).await.unwrap();
        (pool, dir)
    }

    fn listing(id: &str, title: &str) -> Listing {
        Listing::new(
            id.to_string(),
            title.to_string(),
            "Acme".to_string(),
            format!("https://www.linkedin.com/jobs/view/{}/", id),
        )
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let (pool, _dir) = setup_test_db().await;
        let repo = DieselListingRepository::new(pool);

        repo.upsert(&listing("100", "Backend Engineer")).await.unwrap();
        let mut second = listing("100", "Senior Backend Engineer");
        second.location = Some("Berlin".to_string());
        second.tags = vec!["rust".to_string()];
        repo.upsert(&second).await.unwrap();

        let all = repo.list(&ListingFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "Senior Backend Engineer");
        assert_eq!(all[0].location.as_deref(), Some("Berlin"));
        assert_eq!(all[0].tags, vec!["rust"]);
    }

    #[tokio::test]
    async fn test_upsert_keeps_pipeline_progress() {
        let (pool, _dir) = setup_test_db().await;
        let repo = DieselListingRepository::new(pool);

        repo.upsert(&listing("7", "Engineer")).await.unwrap();
        assert!(repo.mark_running("7", Stage::Enrich).await.unwrap());
        repo.mark_done("7", Stage::Enrich).await.unwrap();

        repo.upsert(&listing("7", "Engineer II")).await.unwrap();
        let stored = repo.get("7").await.unwrap().unwrap();
        assert_eq!(stored.status, ListingStatus::Enriched);
        assert_eq!(stored.title, "Engineer II");
    }

    #[tokio::test]
    async fn test_mark_running_claims_once() {
        let (pool, _dir) = setup_test_db().await;
        let repo = DieselListingRepository::new(pool);

        repo.upsert(&listing("1", "Engineer")).await.unwrap();
        assert!(repo.mark_running("1", Stage::Enrich).await.unwrap());
        assert!(!repo.mark_running("1", Stage::Enrich).await.unwrap());
        assert!(!repo.mark_running("1", Stage::Generate).await.unwrap());
    }

    #[tokio::test]
    async fn test_failure_rolls_back_then_fails() {
        let (pool, _dir) = setup_test_db().await;
        let repo = DieselListingRepository::new(pool);
        repo.upsert(&listing("1", "Engineer")).await.unwrap();

        for expected in [1, 2] {
            assert!(repo.mark_running("1", Stage::Enrich).await.unwrap());
            let status = repo
                .record_failure("1", Stage::Enrich, "boom", 3)
                .await
                .unwrap();
            assert_eq!(status, ListingStatus::Discovered);
            let stored = repo.get("1").await.unwrap().unwrap();
            assert_eq!(stored.enrich.count, expected);
            assert_eq!(stored.enrich.last_error.as_deref(), Some("boom"));
            assert!(stored.enrich.last_attempt_at.is_some());
        }

        assert!(repo.mark_running("1", Stage::Enrich).await.unwrap());
        let status = repo
            .record_failure("1", Stage::Enrich, "still broken", 3)
            .await
            .unwrap();
        assert_eq!(status, ListingStatus::Failed(Stage::Enrich));

        let pending = repo.pending_for_stage(Stage::Enrich, 3, 10).await.unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_pending_is_oldest_first_and_respects_retries() {
        let (pool, _dir) = setup_test_db().await;
        let repo = DieselListingRepository::new(pool);

        let base = Utc::now();
        for (i, id) in ["c", "a", "b"].iter().enumerate() {
            let mut l = listing(id, "Engineer");
            l.created_at = base + chrono::Duration::seconds(i as i64);
            repo.upsert(&l).await.unwrap();
        }

        let ids: Vec<String> = repo
            .pending_for_stage(Stage::Enrich, 3, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);

        assert!(repo.mark_running("c", Stage::Enrich).await.unwrap());
        repo.record_failure("c", Stage::Enrich, "x", 3).await.unwrap();
        let ids: Vec<String> = repo
            .pending_for_stage(Stage::Enrich, 1, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(repo.pending_for_stage(Stage::Enrich, 3, 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_status_is_rejected() {
        let (pool, _dir) = setup_test_db().await;
        let repo = DieselListingRepository::new(pool.clone());
        repo.upsert(&listing("1", "Engineer")).await.unwrap();

        let mut conn = pool.get().await.unwrap();
        conn.batch_execute("UPDATE listings SET status = 'scraped' WHERE id = '1'")
            .await
            .unwrap();

        let err = repo.get("1").await.unwrap_err();
        assert!(is_invalid_status(&err));
        assert!(is_invalid_status(&repo.count_by_status().await.unwrap_err()));
    }

    #[tokio::test]
    async fn test_release_running() {
        let (pool, _dir) = setup_test_db().await;
        let repo = DieselListingRepository::new(pool);
        repo.upsert(&listing("1", "Engineer")).await.unwrap();
        repo.mark_running("1", Stage::Enrich).await.unwrap();

        assert_eq!(repo.release_running(Stage::Enrich).await.unwrap(), 1);
        let stored = repo.get("1").await.unwrap().unwrap();
        assert_eq!(stored.status, ListingStatus::Discovered);
    }

    #[tokio::test]
    async fn test_list_filters_and_counts() {
        let (pool, _dir) = setup_test_db().await;
        let repo = DieselListingRepository::new(pool);

        let mut other = listing("2", "Designer");
        other.company = "Globex Corp".to_string();
        repo.upsert(&listing("1", "Engineer")).await.unwrap();
        repo.upsert(&other).await.unwrap();
        repo.mark_running("2", Stage::Enrich).await.unwrap();

        let filter = ListingFilter {
            company: Some("globex".to_string()),
            ..Default::default()
        };
        let found = repo.list(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "2");

        let filter = ListingFilter {
            status: Some(ListingStatus::Discovered),
            ..Default::default()
        };
        assert_eq!(repo.list(&filter).await.unwrap().len(), 1);

        let filter = ListingFilter {
            limit: Some(1),
            ..Default::default()
        };
        assert_eq!(repo.list(&filter).await.unwrap().len(), 1);

        let counts = repo.count_by_status().await.unwrap();
        assert_eq!(counts.len(), ListingStatus::ALL.len());
        assert!(counts.contains(&(ListingStatus::Discovered, 1)));
        assert!(counts.contains(&(ListingStatus::Enriching, 1)));
        assert!(counts.contains(&(ListingStatus::Generated, 0)));
    }
}
