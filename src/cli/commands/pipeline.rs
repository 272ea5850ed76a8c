//! Stage commands: run, scrape, enrich, generate.

use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::{Config, Settings};
use crate::pipeline::{Orchestrator, Pipeline, RunOptions, StageReport};
use crate::scrapers::ListingQuery;

use super::super::helpers::open_db;

async fn build_pipeline(settings: &Settings, config: &Config) -> anyhow::Result<Pipeline> {
    let db = open_db(settings).await?;
    Pipeline::from_config(config, settings, db)
}

fn spinner(message: &str) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

fn describe_query(query: &ListingQuery) -> String {
    match query.location {
        Some(ref location) => format!("'{}' in {}", query.keywords, location),
        None => format!("'{}'", query.keywords),
    }
}

fn print_report(verb: &str, report: &StageReport) {
    if report.selected == 0 {
        println!("{} Nothing to {}", style("!").yellow(), verb);
        return;
    }
    println!(
        "{} {} {}/{} listing(s)",
        style("✓").green(),
        capitalize(verb),
        report.succeeded,
        report.selected
    );
    if report.retrying > 0 {
        println!(
            "  {} {} will be retried",
            style("→").cyan(),
            report.retrying
        );
    }
    if report.failed > 0 || report.errors > 0 {
        println!(
            "  {} {} failed",
            style("✗").red(),
            report.failed + report.errors
        );
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Discover, enrich and draft in one pass.
pub async fn cmd_run(
    settings: &Settings,
    config: &Config,
    query: ListingQuery,
    max_results: usize,
    enrich: bool,
    generate: bool,
) -> anyhow::Result<()> {
    let pipeline = build_pipeline(settings, config).await?;
    println!(
        "{} Searching for {} (up to {})",
        style("→").cyan(),
        describe_query(&query),
        max_results
    );

    let options = RunOptions {
        query,
        max_results,
        enrich,
        generate,
        max_retries: config.enricher.max_retries,
    };
    let pb = spinner("Running pipeline...")?;
    let result = Orchestrator::new(&pipeline, config.orchestrator.clone())
        .run(&options)
        .await;
    pb.finish_and_clear();
    let summary = result?;

    println!(
        "{} Discovered {} listing(s), saved {}",
        style("✓").green(),
        summary.discovered,
        summary.saved
    );
    if enrich {
        println!(
            "{} Enriched {} listing(s)",
            style("✓").green(),
            summary.enriched
        );
        if summary.enrich_failed > 0 {
            println!(
                "  {} {} could not be enriched",
                style("✗").red(),
                summary.enrich_failed
            );
        }
    }
    if enrich && generate {
        println!(
            "{} Drafted {} email(s)",
            style("✓").green(),
            summary.generated
        );
        if summary.generate_failed > 0 {
            println!(
                "  {} {} drafts failed",
                style("✗").red(),
                summary.generate_failed
            );
        }
    }
    Ok(())
}

/// Discover listings and store them.
pub async fn cmd_scrape(
    settings: &Settings,
    config: &Config,
    query: ListingQuery,
    max_results: usize,
) -> anyhow::Result<()> {
    let pipeline = build_pipeline(settings, config).await?;
    println!(
        "{} Searching for {} (up to {})",
        style("→").cyan(),
        describe_query(&query),
        max_results
    );

    let pb = spinner("Extracting listings...")?;
    let result = pipeline.run_extraction_stage(max_results, &query).await;
    pb.finish_and_clear();

    println!("{} Saved {} listing(s)", style("✓").green(), result?);
    Ok(())
}

/// Enrich one batch of discovered listings.
pub async fn cmd_enrich(
    settings: &Settings,
    config: &Config,
    batch_size: Option<usize>,
) -> anyhow::Result<()> {
    let pipeline = build_pipeline(settings, config).await?;
    let batch = batch_size.unwrap_or(config.enricher.batch_size);

    let pb = spinner("Researching companies...")?;
    let result = pipeline
        .runner()
        .run(&pipeline.enrich_processor(), batch, config.enricher.max_retries)
        .await;
    pb.finish_and_clear();

    print_report("enrich", &result?);
    Ok(())
}

/// Draft emails for one batch of enriched listings.
pub async fn cmd_generate(
    settings: &Settings,
    config: &Config,
    batch_size: Option<usize>,
) -> anyhow::Result<()> {
    let pipeline = build_pipeline(settings, config).await?;
    let batch = batch_size.unwrap_or(config.generator.batch_size);

    if !settings.resume_path.exists() {
        println!(
            "{} Resume not found at {}; drafts will not be generated",
            style("!").yellow(),
            settings.resume_path.display()
        );
    }

    let processor = pipeline.generate_processor().await?;
    let pb = spinner("Drafting emails...")?;
    let result = pipeline
        .runner()
        .run(&processor, batch, config.generator.max_retries)
        .await;
    pb.finish_and_clear();

    print_report("draft", &result?);
    Ok(())
}
