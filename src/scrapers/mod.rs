//! Job board scraping: browser sessions, page drivers and listing extraction.

pub mod browser;
pub mod listing;
pub mod page;
mod source;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use browser::{BrowserEngineConfig, BrowserSession};
#[cfg(feature = "browser")]
pub use browser::ChromePage;
pub use listing::{
    ExtractionConfig, ExtractionEngine, ExtractionError, ExtractionReport, ListingQuery,
    StopReason,
};
pub use page::{ElementRef, FrameRef, PageDriver, PageError};
pub use source::{BrowserListingSource, ListingSource, PageListingSource};
