//! Diesel row types.
//!
//! Timestamps are stored as RFC 3339 text and JSON columns as text, so the
//! rows stay plain strings and conversion happens in the repositories.

use diesel::prelude::*;

use crate::schema;

/// Listing row.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::listings)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ListingRecord {
    pub id: String,
    pub title: String,
    pub company: String,
    pub url: String,
    pub company_url: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub tags: String,
    pub posted_date: Option<String>,
    pub status: String,
    pub enrich_attempts: i32,
    pub enrich_last_attempt_at: Option<String>,
    pub enrich_last_error: Option<String>,
    pub generate_attempts: i32,
    pub generate_last_attempt_at: Option<String>,
    pub generate_last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// New listing for insertion. Retry columns take their defaults.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::listings)]
pub struct NewListing<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub company: &'a str,
    pub url: &'a str,
    pub company_url: Option<&'a str>,
    pub location: Option<&'a str>,
    pub description: Option<&'a str>,
    pub tags: &'a str,
    pub posted_date: Option<&'a str>,
    pub status: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Company research row.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::company_research)]
#[diesel(primary_key(listing_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ResearchRecord {
    pub listing_id: String,
    pub company: String,
    pub summaries: String,
    pub website: Option<String>,
    pub created_at: String,
}

/// Draft row.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::drafts)]
#[diesel(primary_key(listing_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DraftRecord {
    pub listing_id: String,
    pub body: String,
    pub notes: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}
