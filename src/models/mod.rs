//! Data models for jobflow.

mod draft;
mod listing;
mod research;

pub use draft::{parse_subject, Draft, DraftStatus};
pub use listing::{Listing, ListingStatus, Stage, StageAttempts};
pub use research::{
    CompanyResearch, SOURCE_COMPANY_ABOUT, SOURCE_COMPANY_PAGE, SOURCE_WEBSITE,
};
