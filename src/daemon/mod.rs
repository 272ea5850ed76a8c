//! Long-running scheduler for the three pipeline stages.
//!
//! Each enabled stage gets its own task that sleeps until its next firing
//! time, runs the stage entry point and goes back to sleep. A tick that is
//! already running is allowed to finish when shutdown is requested.

mod pid;
mod schedule;

pub use pid::{process_alive, read_pid, PidFile};
pub use schedule::CronSchedule;

use std::future::Future;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::models::Stage;
use crate::pipeline::{Pipeline, PipelineError};
use crate::repository::DieselError;
use crate::scrapers::ListingQuery;

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("another daemon is already running (pid {0})")]
    AlreadyRunning(i32),
    #[error("PID file {}: {source}", path.display())]
    PidFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid schedule for {job}: {reason}")]
    InvalidSchedule { job: &'static str, reason: String },
    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),
    #[error("database error: {0}")]
    Store(#[from] DieselError),
}

/// Files the daemon owns, relative to the data directory unless absolute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_log_file")]
    pub log_file: String,
    #[serde(default = "default_pid_file")]
    pub pid_file: String,
}

fn default_log_file() -> String {
    "logs/pipeline.log".to_string()
}

fn default_pid_file() -> String {
    ".pipeline.pid".to_string()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_file: default_log_file(),
            pid_file: default_pid_file(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_batch_size() -> usize {
    10
}

fn default_max_retries() -> u32 {
    3
}

/// Schedule and batch limits for the enrichment or generation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageJobConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Unset means every hour.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hour: Option<u32>,
    #[serde(default)]
    pub minute: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl StageJobConfig {
    pub fn hourly_at(minute: u32) -> Self {
        Self {
            enabled: true,
            hour: None,
            minute,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
        }
    }

    pub fn schedule(&self) -> CronSchedule {
        CronSchedule {
            hour: self.hour,
            minute: self.minute,
        }
    }
}

fn default_scraper_hour() -> Option<u32> {
    Some(9)
}

fn default_max_jobs_per_day() -> usize {
    50
}

/// Schedule and daily cap for the extraction stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScraperJobConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_scraper_hour")]
    pub hour: Option<u32>,
    #[serde(default)]
    pub minute: u32,
    #[serde(default = "default_max_jobs_per_day")]
    pub max_jobs_per_day: usize,
}

impl Default for ScraperJobConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hour: default_scraper_hour(),
            minute: 0,
            max_jobs_per_day: default_max_jobs_per_day(),
        }
    }
}

impl ScraperJobConfig {
    pub fn schedule(&self) -> CronSchedule {
        CronSchedule {
            hour: self.hour,
            minute: self.minute,
        }
    }
}

/// What a scheduled tick runs.
#[derive(Debug, Clone, PartialEq)]
pub enum JobKind {
    Extract {
        query: ListingQuery,
        max_count: usize,
    },
    Enrich {
        batch_size: usize,
        max_retries: u32,
    },
    Generate {
        batch_size: usize,
        max_retries: u32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledJob {
    pub name: &'static str,
    pub schedule: CronSchedule,
    pub kind: JobKind,
}

impl ScheduledJob {
    /// Enabled jobs from config, with their schedules validated.
    pub fn from_config(config: &Config) -> Result<Vec<Self>, DaemonError> {
        let mut jobs = Vec::new();
        if config.scraper.enabled {
            jobs.push(Self {
                name: "scraper",
                schedule: config.scraper.schedule(),
                kind: JobKind::Extract {
                    query: config.search.to_query(),
                    max_count: config.scraper.max_jobs_per_day,
                },
            });
        }
        if config.enricher.enabled {
            jobs.push(Self {
                name: "enricher",
                schedule: config.enricher.schedule(),
                kind: JobKind::Enrich {
                    batch_size: config.enricher.batch_size,
                    max_retries: config.enricher.max_retries,
                },
            });
        }
        if config.generator.enabled {
            jobs.push(Self {
                name: "generator",
                schedule: config.generator.schedule(),
                kind: JobKind::Generate {
                    batch_size: config.generator.batch_size,
                    max_retries: config.generator.max_retries,
                },
            });
        }

        for job in &jobs {
            job.schedule
                .validate()
                .map_err(|reason| DaemonError::InvalidSchedule {
                    job: job.name,
                    reason,
                })?;
        }
        Ok(jobs)
    }

    /// Run the job once. Returns the number of listings it advanced.
    pub async fn run_once(&self, pipeline: &Pipeline) -> Result<usize, PipelineError> {
        match &self.kind {
            JobKind::Extract { query, max_count } => {
                pipeline.run_extraction_stage(*max_count, query).await
            }
            JobKind::Enrich {
                batch_size,
                max_retries,
            } => pipeline.run_enrichment_stage(*batch_size, *max_retries).await,
            JobKind::Generate {
                batch_size,
                max_retries,
            } => pipeline.run_generation_stage(*batch_size, *max_retries).await,
        }
    }
}

pub struct Daemon {
    pipeline: Pipeline,
    jobs: Vec<ScheduledJob>,
}

impl Daemon {
    pub fn new(pipeline: Pipeline, jobs: Vec<ScheduledJob>) -> Self {
        Self { pipeline, jobs }
    }

    pub fn jobs(&self) -> &[ScheduledJob] {
        &self.jobs
    }

    /// Claim the PID file and run until SIGINT or SIGTERM.
    pub async fn run(self, pid_path: &Path) -> Result<(), DaemonError> {
        let signals = ShutdownSignal::install()?;
        let pid_file = PidFile::acquire(pid_path)?;
        info!(
            "Daemon started (pid {}, PID file {})",
            pid_file.pid(),
            pid_file.path().display()
        );

        let result = self.run_until(signals.recv()).await;
        drop(pid_file);
        info!("Daemon stopped");
        result
    }

    /// Run the scheduler until `shutdown` resolves.
    ///
    /// Listings left in a running status by an earlier crash are put back
    /// before any job starts.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), DaemonError>
    where
        F: Future<Output = Result<(), DaemonError>>,
    {
        let listings = self.pipeline.db().listings();
        for stage in [Stage::Enrich, Stage::Generate] {
            let released = listings.release_running(stage).await?;
            if released > 0 {
                warn!("Released {} listing(s) stuck in {}", released, stage);
            }
        }

        if self.jobs.is_empty() {
            warn!("No jobs enabled; waiting for shutdown");
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut handles = Vec::with_capacity(self.jobs.len());
        for job in self.jobs {
            info!("Scheduling {} {}", job.name, job.schedule);
            let pipeline = self.pipeline.clone();
            let stop = stop_rx.clone();
            handles.push(tokio::spawn(job_loop(job, pipeline, stop)));
        }

        let result = shutdown.await;
        info!("Shutting down; waiting for running jobs to finish");
        let _ = stop_tx.send(true);

        for handle in handles {
            if let Err(e) = handle.await {
                error!("Job task ended abnormally: {}", e);
            }
        }
        result
    }
}

async fn job_loop(job: ScheduledJob, pipeline: Pipeline, mut stop: watch::Receiver<bool>) {
    loop {
        let wait = job.schedule.until_next(Local::now());
        debug!("{} sleeping {}s", job.name, wait.as_secs());

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
                continue;
            }
        }

        info!("Running scheduled {}", job.name);
        match job.run_once(&pipeline).await {
            Ok(count) => info!("{} finished: {} listing(s)", job.name, count),
            Err(e) => error!("{} failed: {}", job.name, e),
        }

        if *stop.borrow() {
            break;
        }
    }
    debug!("{} stopped", job.name);
}

/// Termination signal handlers, installed as soon as this is created.
///
/// SIGINT and SIGTERM end the wait; SIGHUP is logged and otherwise ignored.
#[cfg(unix)]
pub struct ShutdownSignal {
    terminate: tokio::signal::unix::Signal,
    interrupt: tokio::signal::unix::Signal,
    hangup: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignal {
    pub fn install() -> Result<Self, DaemonError> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            terminate: signal(SignalKind::terminate()).map_err(DaemonError::Signal)?,
            interrupt: signal(SignalKind::interrupt()).map_err(DaemonError::Signal)?,
            hangup: signal(SignalKind::hangup()).map_err(DaemonError::Signal)?,
        })
    }

    /// Wait for SIGINT or SIGTERM.
    pub async fn recv(mut self) -> Result<(), DaemonError> {
        loop {
            tokio::select! {
                _ = self.terminate.recv() => {
                    info!("Received SIGTERM");
                    return Ok(());
                }
                _ = self.interrupt.recv() => {
                    info!("Received SIGINT");
                    return Ok(());
                }
                _ = self.hangup.recv() => info!("Ignoring SIGHUP"),
            }
        }
    }
}

#[cfg(not(unix))]
pub struct ShutdownSignal;

#[cfg(not(unix))]
impl ShutdownSignal {
    pub fn install() -> Result<Self, DaemonError> {
        Ok(Self)
    }

    pub async fn recv(self) -> Result<(), DaemonError> {
        tokio::signal::ctrl_c().await.map_err(DaemonError::Signal)?;
        info!("Received Ctrl-C");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompanyResearch, Draft, Listing, ListingStatus};
    use crate::repository::DbContext;
    use crate::scrapers::ListingSource;
    use crate::services::{DraftGenerator, Enricher};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};
    use tokio::sync::Notify;

    struct Nothing;

    #[async_trait]
    impl ListingSource for Nothing {
        async fn discover(&self, _: &ListingQuery, _: usize) -> anyhow::Result<Vec<Listing>> {
            Ok(Vec::new())
        }
    }

    #[async_trait]
    impl Enricher for Nothing {
        async fn enrich(&self, _: &Listing) -> anyhow::Result<Option<CompanyResearch>> {
            Ok(None)
        }
    }

    #[async_trait]
    impl DraftGenerator for Nothing {
        async fn generate(
            &self,
            _: &Listing,
            _: &CompanyResearch,
            _: &str,
        ) -> anyhow::Result<Option<Draft>> {
            Ok(None)
        }
    }

    #[test]
    fn test_jobs_from_default_config() {
        let jobs = ScheduledJob::from_config(&Config::default()).unwrap();
        let names: Vec<_> = jobs.iter().map(|j| j.name).collect();
        assert_eq!(names, vec!["scraper", "enricher", "generator"]);

        assert_eq!(jobs[0].schedule, CronSchedule::daily(9, 0));
        assert!(matches!(jobs[0].kind, JobKind::Extract { max_count: 50, .. }));
        assert_eq!(jobs[1].schedule, CronSchedule::hourly(0));
        assert_eq!(jobs[2].schedule, CronSchedule::hourly(30));
        assert_eq!(
            jobs[2].kind,
            JobKind::Generate {
                batch_size: 10,
                max_retries: 3
            }
        );
    }

    #[test]
    fn test_disabled_and_invalid_jobs() {
        let mut config = Config::default();
        config.scraper.enabled = false;
        let jobs = ScheduledJob::from_config(&config).unwrap();
        assert_eq!(jobs.len(), 2);

        config.enricher.minute = 75;
        assert!(matches!(
            ScheduledJob::from_config(&config),
            Err(DaemonError::InvalidSchedule { job: "enricher", .. })
        ));
    }

    #[tokio::test]
    async fn test_startup_releases_stuck_listings() {
        let dir = tempdir().unwrap();
        let db = DbContext::open(dir.path().join("jobs.db").to_str().unwrap())
            .await
            .unwrap();
        let listing = Listing::new(
            "1".into(),
            "Engineer".into(),
            "Acme".into(),
            "https://example.test/jobs/view/1/".into(),
        );
        db.listings().upsert(&listing).await.unwrap();
        assert!(db.listings().mark_running("1", Stage::Enrich).await.unwrap());

        let pipeline = Pipeline::new(
            db.clone(),
            Arc::new(Nothing),
            Arc::new(Nothing),
            Arc::new(Nothing),
            dir.path().join("resume.txt"),
        );
        let jobs = ScheduledJob::from_config(&Config::default()).unwrap();
        Daemon::new(pipeline, jobs)
            .run_until(async { Ok(()) })
            .await
            .unwrap();

        let stored = db.listings().get("1").await.unwrap().unwrap();
        assert_eq!(stored.status, ListingStatus::Discovered);
    }

    async fn open_store() -> (DbContext, TempDir) {
        let dir = tempdir().unwrap();
        let db = DbContext::open(dir.path().join("jobs.db").to_str().unwrap())
            .await
            .unwrap();
        (db, dir)
    }

    fn pipeline_with(db: DbContext, source: Arc<dyn ListingSource>, dir: &TempDir) -> Pipeline {
        Pipeline::new(
            db,
            source,
            Arc::new(Nothing),
            Arc::new(Nothing),
            dir.path().join("resume.txt"),
        )
    }

    fn hourly_scrape() -> ScheduledJob {
        ScheduledJob {
            name: "scraper",
            schedule: CronSchedule::hourly(0),
            kind: JobKind::Extract {
                query: ListingQuery::new("engineer"),
                max_count: 5,
            },
        }
    }

    #[derive(Default)]
    struct BrokenSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ListingSource for BrokenSource {
        async fn discover(&self, _: &ListingQuery, _: usize) -> anyhow::Result<Vec<Listing>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(anyhow::anyhow!("browser crashed"))
        }
    }

    /// Blocks inside `discover` until released.
    #[derive(Default)]
    struct SlowSource {
        calls: AtomicUsize,
        started: Notify,
        release: Notify,
        finished: AtomicBool,
    }

    #[async_trait]
    impl ListingSource for SlowSource {
        async fn discover(&self, _: &ListingQuery, _: usize) -> anyhow::Result<Vec<Listing>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.started.notify_one();
            self.release.notified().await;
            self.finished.store(true, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_tick_does_not_stop_later_ticks() {
        let (db, dir) = open_store().await;
        let source = Arc::new(BrokenSource::default());
        let pipeline = pipeline_with(db, source.clone(), &dir);

        let watched = source.clone();
        Daemon::new(pipeline, vec![hourly_scrape()])
            .run_until(async move {
                while watched.calls.load(Ordering::SeqCst) < 2 {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                Ok(())
            })
            .await
            .unwrap();

        assert!(source.calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_running_tick() {
        let (db, dir) = open_store().await;
        let source = Arc::new(SlowSource::default());
        let pipeline = pipeline_with(db, source.clone(), &dir);

        let running = source.clone();
        let shutdown = async move {
            running.started.notified().await;
            assert!(!running.finished.load(Ordering::SeqCst));
            let releaser = running.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                releaser.release.notify_one();
            });
            Ok(())
        };
        Daemon::new(pipeline, vec![hourly_scrape()])
            .run_until(shutdown)
            .await
            .unwrap();

        assert!(source.finished.load(Ordering::SeqCst));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hangup_is_ignored_until_terminate() {
        let signals = ShutdownSignal::install().unwrap();
        let waiting = tokio::spawn(signals.recv());

        unsafe { libc::raise(libc::SIGHUP) };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!waiting.is_finished());

        unsafe { libc::raise(libc::SIGTERM) };
        tokio::time::timeout(Duration::from_secs(5), waiting)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
