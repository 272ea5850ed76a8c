//! Command implementations.

mod daemon;
mod listings;
mod pipeline;

pub use daemon::cmd_daemon;
pub use listings::{cmd_export, cmd_list, cmd_status};
pub use pipeline::{cmd_enrich, cmd_generate, cmd_run, cmd_scrape};
