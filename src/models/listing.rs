//! Job listing model and the pipeline state machine.
//!
//! A listing moves forward through
//! `discovered → enriching → enriched → generating → generated`. Each
//! retryable stage has an in-progress status, a stable status it rolls back
//! to on a retryable failure, and a terminal `failed_<stage>` status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A retryable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Enrich,
    Generate,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enrich => "enrich",
            Self::Generate => "generate",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "enrich" => Some(Self::Enrich),
            "generate" => Some(Self::Generate),
            _ => None,
        }
    }

    /// Status a listing must hold to be picked up by this stage.
    pub fn pending_status(&self) -> ListingStatus {
        match self {
            Self::Enrich => ListingStatus::Discovered,
            Self::Generate => ListingStatus::Enriched,
        }
    }

    /// Status held while this stage is processing a listing.
    pub fn running_status(&self) -> ListingStatus {
        match self {
            Self::Enrich => ListingStatus::Enriching,
            Self::Generate => ListingStatus::Generating,
        }
    }

    /// Status reached when this stage succeeds.
    pub fn done_status(&self) -> ListingStatus {
        match self {
            Self::Enrich => ListingStatus::Enriched,
            Self::Generate => ListingStatus::Generated,
        }
    }

    pub fn failed_status(&self) -> ListingStatus {
        ListingStatus::Failed(*self)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline status of a listing.
///
/// This is a closed set. Strings outside of it are rejected when read from
/// the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListingStatus {
    Discovered,
    Enriching,
    Enriched,
    Generating,
    Generated,
    Failed(Stage),
}

impl ListingStatus {
    /// Every status, in pipeline order.
    pub const ALL: [ListingStatus; 7] = [
        Self::Discovered,
        Self::Enriching,
        Self::Enriched,
        Self::Generating,
        Self::Generated,
        Self::Failed(Stage::Enrich),
        Self::Failed(Stage::Generate),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Enriching => "enriching",
            Self::Enriched => "enriched",
            Self::Generating => "generating",
            Self::Generated => "generated",
            Self::Failed(Stage::Enrich) => "failed_enrich",
            Self::Failed(Stage::Generate) => "failed_generate",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "discovered" => Some(Self::Discovered),
            "enriching" => Some(Self::Enriching),
            "enriched" => Some(Self::Enriched),
            "generating" => Some(Self::Generating),
            "generated" => Some(Self::Generated),
            "failed_enrich" => Some(Self::Failed(Stage::Enrich)),
            "failed_generate" => Some(Self::Failed(Stage::Generate)),
            _ => None,
        }
    }

    /// Whether no stage will ever pick this listing up again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Generated | Self::Failed(_))
    }

    /// The transition table.
    ///
    /// Rollbacks from an in-progress status to its pending status exist only
    /// for retries.
    pub fn can_transition_to(&self, next: ListingStatus) -> bool {
        use ListingStatus::*;
        matches!(
            (*self, next),
            (Discovered, Enriching)
                | (Enriching, Enriched)
                | (Enriching, Discovered)
                | (Enriching, Failed(Stage::Enrich))
                | (Enriched, Generating)
                | (Generating, Generated)
                | (Generating, Enriched)
                | (Generating, Failed(Stage::Generate))
        )
    }
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ListingStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ListingStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown listing status: {}", s)))
    }
}

/// Retry bookkeeping for one stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageAttempts {
    pub count: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// A job listing discovered on the search surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    /// Stable site identifier (the numeric job id).
    pub id: String,
    pub title: String,
    pub company: String,
    pub url: String,
    /// Company profile page, when the card links one.
    pub company_url: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    /// Posting date as rendered by the site ("2 days ago", "2024-05-01").
    pub posted_date: Option<String>,
    pub status: ListingStatus,
    pub enrich: StageAttempts,
    pub generate: StageAttempts,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    /// Create a freshly discovered listing.
    pub fn new(id: String, title: String, company: String, url: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            title,
            company,
            url,
            company_url: None,
            location: None,
            description: None,
            tags: Vec::new(),
            posted_date: None,
            status: ListingStatus::Discovered,
            enrich: StageAttempts::default(),
            generate: StageAttempts::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn attempts(&self, stage: Stage) -> &StageAttempts {
        match stage {
            Stage::Enrich => &self.enrich,
            Stage::Generate => &self.generate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_strings() {
        for status in ListingStatus::ALL {
            assert_eq!(ListingStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(ListingStatus::from_str("pending"), None);
        assert_eq!(ListingStatus::from_str("FAILED"), None);
    }

    #[test]
    fn test_forward_transitions() {
        use ListingStatus::*;
        assert!(Discovered.can_transition_to(Enriching));
        assert!(Enriching.can_transition_to(Enriched));
        assert!(Enriched.can_transition_to(Generating));
        assert!(Generating.can_transition_to(Generated));

        assert!(!Discovered.can_transition_to(Enriched));
        assert!(!Discovered.can_transition_to(Generating));
        assert!(!Enriched.can_transition_to(Discovered));
        assert!(!Generated.can_transition_to(Generating));
    }

    #[test]
    fn test_rollback_and_failure_transitions() {
        for stage in [Stage::Enrich, Stage::Generate] {
            let running = stage.running_status();
            assert!(running.can_transition_to(stage.pending_status()));
            assert!(running.can_transition_to(stage.failed_status()));
            assert!(running.can_transition_to(stage.done_status()));
            assert!(stage.failed_status().is_terminal());
            for next in ListingStatus::ALL {
                assert!(!stage.failed_status().can_transition_to(next));
            }
        }
        assert!(!ListingStatus::Enriching.can_transition_to(ListingStatus::Failed(Stage::Generate)));
    }

    #[test]
    fn test_status_serde_rejects_unknown() {
        let ok: ListingStatus = serde_json::from_str("\"failed_enrich\"").unwrap();
        assert_eq!(ok, ListingStatus::Failed(Stage::Enrich));
        assert!(serde_json::from_str::<ListingStatus>("\"scraped\"").is_err());
    }
}
