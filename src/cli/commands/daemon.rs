//! Foreground scheduler.

use console::style;

use crate::config::{Config, Settings};
use crate::daemon::{Daemon, ScheduledJob};
use crate::pipeline::Pipeline;

use super::super::helpers::open_db;

/// Run scheduled stages until SIGINT or SIGTERM.
///
/// Fails when another daemon holds the PID file.
pub async fn cmd_daemon(settings: &Settings, config: &Config) -> anyhow::Result<()> {
    let jobs = ScheduledJob::from_config(config)?;
    let db = open_db(settings).await?;
    let pipeline = Pipeline::from_config(config, settings, db)?;

    println!(
        "{} Starting daemon (PID file {}, log {})",
        style("→").cyan(),
        settings.pid_file.display(),
        settings.log_file.display()
    );
    for job in &jobs {
        println!("  {} {}", job.name, style(job.schedule).dim());
    }

    Daemon::new(pipeline, jobs).run(&settings.pid_file).await?;
    println!("{} Daemon stopped", style("✓").green());
    Ok(())
}
