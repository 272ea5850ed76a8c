//! Generated application drafts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Review status of a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    Pending,
    Reviewed,
    Approved,
}

impl DraftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Reviewed => "reviewed",
            Self::Approved => "approved",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "reviewed" => Some(Self::Reviewed),
            "approved" => Some(Self::Approved),
            _ => None,
        }
    }
}

/// A cover email drafted for a listing (at most one per listing id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub listing_id: String,
    pub body: String,
    pub notes: Option<String>,
    pub status: DraftStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Draft {
    pub fn new(listing_id: String, body: String) -> Self {
        let now = Utc::now();
        Self {
            listing_id,
            body,
            notes: None,
            status: DraftStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Subject line, if the body starts with one.
    pub fn subject(&self) -> Option<&str> {
        parse_subject(&self.body)
    }
}

/// Find a `Subject:` line in generated email text.
pub fn parse_subject(text: &str) -> Option<&str> {
    let (_, rest) = text.split_once("Subject:")?;
    let line = rest.lines().next()?.trim();
    if line.is_empty() {
        None
    } else {
        Some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subject() {
        let text = "Subject: Backend Engineer at Acme\n\nHi team,\n...";
        assert_eq!(parse_subject(text), Some("Backend Engineer at Acme"));
        assert_eq!(parse_subject("Hello there"), None);
        assert_eq!(parse_subject("Subject:\nBody"), None);
    }

    #[test]
    fn test_new_draft_is_pending() {
        let draft = Draft::new("42".into(), "Subject: Hi\n\nBody".into());
        assert_eq!(draft.status, DraftStatus::Pending);
        assert_eq!(draft.subject(), Some("Hi"));
    }
}
