//! Shared helper functions for CLI commands.

use chrono::{NaiveDate, TimeZone, Utc};

use crate::config::Settings;
use crate::models::ListingStatus;
use crate::repository::{DbContext, ListingFilter};

/// Open (and if needed create) the database.
pub async fn open_db(settings: &Settings) -> anyhow::Result<DbContext> {
    settings.ensure_directories()?;
    let db = DbContext::open(&settings.database_url()).await?;
    Ok(db)
}

pub fn parse_status(s: &str) -> Result<ListingStatus, String> {
    ListingStatus::from_str(&s.to_lowercase()).ok_or_else(|| {
        let known: Vec<_> = ListingStatus::ALL.iter().map(|s| s.as_str()).collect();
        format!("unknown status '{}' (expected one of: {})", s, known.join(", "))
    })
}

pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("{} (expected YYYY-MM-DD)", e))
}

/// Filter for `export`. Date bounds are inclusive whole days in UTC.
pub fn export_filter(
    status: Option<ListingStatus>,
    company: Option<String>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> ListingFilter {
    ListingFilter {
        status,
        company,
        created_from: from
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| Utc.from_utc_datetime(&dt)),
        created_to: to
            .and_then(|d| d.and_hms_milli_opt(23, 59, 59, 999))
            .map(|dt| Utc.from_utc_datetime(&dt)),
        limit: None,
    }
}

/// Truncate to `max` characters, marking the cut with "...".
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Stage;

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("Enriched"), Ok(ListingStatus::Enriched));
        assert_eq!(
            parse_status("failed_generate"),
            Ok(ListingStatus::Failed(Stage::Generate))
        );
        assert!(parse_status("archived").unwrap_err().contains("discovered"));
    }

    #[test]
    fn test_export_filter_bounds() {
        let filter = export_filter(
            None,
            None,
            Some(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()),
            Some(NaiveDate::from_ymd_opt(2024, 5, 31).unwrap()),
        );
        assert_eq!(
            filter.created_from.unwrap().to_rfc3339(),
            "2024-05-01T00:00:00+00:00"
        );
        assert!(filter.created_to.unwrap() > filter.created_from.unwrap());
        assert!(parse_date("05/01/2024").is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a much longer title", 10), "a much ...");
    }
}
