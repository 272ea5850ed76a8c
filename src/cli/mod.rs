//! Command-line interface.
//!
//! Parses arguments, loads configuration once and dispatches to the command
//! modules.

mod commands;
mod helpers;

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{load_settings, Config, LoadOptions};
use crate::models::ListingStatus;
use crate::scrapers::ListingQuery;

use helpers::{parse_date, parse_status};

#[derive(Parser)]
#[command(name = "jobflow")]
#[command(about = "Job listing discovery, company research and application drafts")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides config file)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Search overrides shared by `run` and `scrape`.
#[derive(Args, Debug, Clone, Default)]
struct SearchArgs {
    /// Job title or keywords
    #[arg(short, long)]
    keywords: Option<String>,
    /// Location filter
    #[arg(short = 'L', long)]
    location: Option<String>,
    /// Experience level filter (e.g. "Entry level")
    #[arg(long)]
    experience_level: Option<String>,
    /// Job type filter (e.g. "Full-time")
    #[arg(long)]
    job_type: Option<String>,
}

impl SearchArgs {
    fn to_query(&self, config: &Config) -> ListingQuery {
        let mut query = config.search.to_query();
        if let Some(ref keywords) = self.keywords {
            query.keywords = keywords.clone();
        }
        if self.location.is_some() {
            query.location = self.location.clone();
        }
        if self.experience_level.is_some() {
            query.experience_level = self.experience_level.clone();
        }
        if self.job_type.is_some() {
            query.job_type = self.job_type.clone();
        }
        query
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Discover, enrich and draft in one pass
    Run {
        #[command(flatten)]
        search: SearchArgs,
        /// Maximum listings to discover
        #[arg(short = 'n', long, default_value = "25")]
        max_results: usize,
        /// Stop after saving discovered listings
        #[arg(long)]
        skip_enrich: bool,
        /// Do not draft emails for enriched listings
        #[arg(long)]
        skip_generate: bool,
    },

    /// Discover listings and store them
    Scrape {
        #[command(flatten)]
        search: SearchArgs,
        /// Maximum listings to discover (defaults to scraper.max_jobs_per_day)
        #[arg(short = 'n', long)]
        max_results: Option<usize>,
    },

    /// Research companies for discovered listings
    Enrich {
        /// Listings to process (defaults to enricher.batch_size)
        #[arg(short, long)]
        batch_size: Option<usize>,
    },

    /// Draft emails for enriched listings
    Generate {
        /// Listings to process (defaults to generator.batch_size)
        #[arg(short, long)]
        batch_size: Option<usize>,
    },

    /// Run the scheduler in the foreground
    Daemon,

    /// List stored listings
    List {
        /// Filter by status (e.g. discovered, enriched, failed_enrich)
        #[arg(short, long, value_parser = parse_status)]
        status: Option<ListingStatus>,
        /// Filter by company name (substring)
        #[arg(long)]
        company: Option<String>,
        /// Maximum rows to show
        #[arg(short, long, default_value = "50")]
        limit: i64,
    },

    /// Show listing counts per status
    Status,

    /// Export listings with research and drafts as JSON
    Export {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Filter by status
        #[arg(short, long, value_parser = parse_status)]
        status: Option<ListingStatus>,
        /// Filter by company name (substring)
        #[arg(long)]
        company: Option<String>,
        /// Created on or after this date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        from: Option<chrono::NaiveDate>,
        /// Created on or before this date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        to: Option<chrono::NaiveDate>,
    },
}

/// Install the tracing subscriber.
///
/// `log_file`, when given, receives a plain-text copy of every event.
fn init_tracing(verbose: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let default_filter = if verbose {
        "jobflow=info"
    } else {
        "jobflow=warn"
    };

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .try_init()?;
    Ok(())
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        data: cli.data,
    };
    let (settings, config) = load_settings(&options).await?;

    let log_file = matches!(cli.command, Commands::Daemon).then_some(settings.log_file.as_path());
    init_tracing(cli.verbose || log_file.is_some(), log_file)?;

    match cli.command {
        Commands::Run {
            search,
            max_results,
            skip_enrich,
            skip_generate,
        } => {
            let query = search.to_query(&config);
            commands::cmd_run(
                &settings,
                &config,
                query,
                max_results,
                !skip_enrich,
                !skip_generate,
            )
            .await
        }
        Commands::Scrape {
            search,
            max_results,
        } => {
            let query = search.to_query(&config);
            let max = max_results.unwrap_or(config.scraper.max_jobs_per_day);
            commands::cmd_scrape(&settings, &config, query, max).await
        }
        Commands::Enrich { batch_size } => {
            commands::cmd_enrich(&settings, &config, batch_size).await
        }
        Commands::Generate { batch_size } => {
            commands::cmd_generate(&settings, &config, batch_size).await
        }
        Commands::Daemon => commands::cmd_daemon(&settings, &config).await,
        Commands::List {
            status,
            company,
            limit,
        } => commands::cmd_list(&settings, status, company, limit).await,
        Commands::Status => commands::cmd_status(&settings).await,
        Commands::Export {
            output,
            status,
            company,
            from,
            to,
        } => {
            let filter = helpers::export_filter(status, company, from, to);
            commands::cmd_export(&settings, filter, output).await
        }
    }
}
