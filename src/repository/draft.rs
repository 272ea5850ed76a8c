//! Diesel-based draft repository for SQLite.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::models::DraftRecord;
use super::pool::{AsyncSqlitePool, DieselError};
use super::util::invalid_status;
use super::{format_datetime, parse_datetime};
use crate::models::{Draft, DraftStatus};
use crate::schema::drafts;

impl TryFrom<DraftRecord> for Draft {
    type Error = DieselError;

    fn try_from(record: DraftRecord) -> Result<Self, Self::Error> {
        let status = DraftStatus::from_str(&record.status)
            .ok_or_else(|| invalid_status("draft", &record.status))?;
        Ok(Draft {
            listing_id: record.listing_id,
            body: record.body,
            notes: record.notes,
            status,
            created_at: parse_datetime(&record.created_at),
            updated_at: parse_datetime(&record.updated_at),
        })
    }
}

/// Drafts keyed by listing id; the last write wins.
#[derive(Clone)]
pub struct DieselDraftRepository {
    pool: AsyncSqlitePool,
}

impl DieselDraftRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, listing_id: &str) -> Result<Option<Draft>, DieselError> {
        let mut conn = self.pool.get().await?;

        drafts::table
            .find(listing_id)
            .first::<DraftRecord>(&mut conn)
            .await
            .optional()?
            .map(Draft::try_from)
            .transpose()
    }

    /// Save a draft, replacing any earlier draft for the same listing.
    pub async fn upsert(&self, draft: &Draft) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;

        let created_at = format_datetime(&draft.created_at);
        let updated_at = format_datetime(&Utc::now());

        diesel::replace_into(drafts::table)
            .values((
                drafts::listing_id.eq(&draft.listing_id),
                drafts::body.eq(&draft.body),
                drafts::notes.eq(&draft.notes),
                drafts::status.eq(draft.status.as_str()),
                drafts::created_at.eq(&created_at),
                drafts::updated_at.eq(&updated_at),
            ))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    /// Drafts, optionally filtered by review status, newest first.
    pub async fn list(
        &self,
        status: Option<DraftStatus>,
        limit: i64,
    ) -> Result<Vec<Draft>, DieselError> {
        let mut conn = self.pool.get().await?;

        let mut query = drafts::table.into_boxed();
        if let Some(status) = status {
            query = query.filter(drafts::status.eq(status.as_str()));
        }

        let records = query
            .order(drafts::created_at.desc())
            .limit(limit)
            .load::<DraftRecord>(&mut conn)
            .await?;
        records.into_iter().map(Draft::try_from).collect()
    }
}
