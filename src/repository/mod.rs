//! Repository layer for database persistence.
//!
//! All database access uses Diesel ORM with compile-time query checking
//! against a SQLite file. Every write is an upsert keyed by listing id.

pub mod context;
pub mod draft;
pub mod listing;
pub mod migrations;
pub mod models;
pub mod pool;
pub mod research;
pub mod util;

pub use context::DbContext;
pub use draft::DieselDraftRepository;
pub use listing::{DieselListingRepository, ListingFilter};
pub use pool::{AsyncSqlitePool, DieselError};
pub use research::DieselResearchRepository;

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a timestamp for storage.
///
/// Fixed precision and a `Z` suffix keep stored values ordered the same way
/// as text and as time.
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse an optional datetime string from the database.
pub fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datetime_round_trip() {
        let now = Utc::now();
        let stored = format_datetime(&now);
        assert!(stored.ends_with('Z'));
        let parsed = parse_datetime(&stored);
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
        assert_eq!(parse_datetime("garbage"), DateTime::UNIX_EPOCH);
        assert_eq!(parse_datetime_opt(None), None);
    }
}
