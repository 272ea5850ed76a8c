//! Schema bootstrap.
//!
//! The schema is small and additive, so it is applied as idempotent
//! `CREATE ... IF NOT EXISTS` statements on every start.

use diesel_async::SimpleAsyncConnection;
use tracing::debug;

use super::pool::{AsyncSqlitePool, DieselError};

/// Tables and indexes. Mirrors `crate::schema`.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS listings (
    id TEXT PRIMARY KEY NOT NULL,
    title TEXT NOT NULL,
    company TEXT NOT NULL,
    url TEXT NOT NULL,
    company_url TEXT,
    location TEXT,
    description TEXT,
    tags TEXT NOT NULL DEFAULT '[]',
    posted_date TEXT,
    status TEXT NOT NULL DEFAULT 'discovered',
    enrich_attempts INTEGER NOT NULL DEFAULT 0,
    enrich_last_attempt_at TEXT,
    enrich_last_error TEXT,
    generate_attempts INTEGER NOT NULL DEFAULT 0,
    generate_last_attempt_at TEXT,
    generate_last_error TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_listings_status_created ON listings(status, created_at);
CREATE INDEX IF NOT EXISTS idx_listings_company ON listings(company);

CREATE TABLE IF NOT EXISTS company_research (
    listing_id TEXT PRIMARY KEY NOT NULL,
    company TEXT NOT NULL,
    summaries TEXT NOT NULL DEFAULT '{}',
    website TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_company_research_company ON company_research(company);

CREATE TABLE IF NOT EXISTS drafts (
    listing_id TEXT PRIMARY KEY NOT NULL,
    body TEXT NOT NULL,
    notes TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Create any missing tables and indexes.
pub async fn init_schema(pool: &AsyncSqlitePool) -> Result<(), DieselError> {
    let mut conn = pool.get().await?;
    conn.batch_execute("PRAGMA journal_mode = WAL;").await?;
    conn.batch_execute(SCHEMA_SQL).await?;
    debug!("Schema ready at {}", pool.database_url());
    Ok(())
}
