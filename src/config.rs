//! Configuration management for jobflow using the prefer crate.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::daemon::{DaemonConfig, ScraperJobConfig, StageJobConfig};
use crate::llm::LlmConfig;
use crate::pipeline::OrchestratorConfig;
use crate::scrapers::{BrowserEngineConfig, ExtractionConfig, ListingQuery};
use crate::services::ResearchConfig;

/// Default database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "jobflow.db";

/// Default resume filename inside the data directory.
pub const DEFAULT_RESUME_FILENAME: &str = "resume.txt";

/// Resolved runtime paths.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename within data_dir.
    pub database_filename: String,
    /// Database URL (overrides data_dir/database_filename if set).
    /// Set via DATABASE_URL env var or config.
    pub database_url: Option<String>,
    /// Plain-text resume used when drafting.
    pub resume_path: PathBuf,
    pub pid_file: PathBuf,
    pub log_file: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        // ~/.local/share/jobflow, falling back to the home dir, then the current dir
        let data_dir = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("jobflow");
        Self::with_data_dir(data_dir)
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        let daemon = DaemonConfig::default();
        Self {
            resume_path: data_dir.join(DEFAULT_RESUME_FILENAME),
            pid_file: data_dir.join(&daemon.pid_file),
            log_file: data_dir.join(&daemon.log_file),
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            database_url: None,
        }
    }

    /// Get the database URL, constructing from path if not explicitly set.
    pub fn database_url(&self) -> String {
        if let Some(ref url) = self.database_url {
            url.clone()
        } else {
            format!("sqlite:{}", self.database_path().display())
        }
    }

    /// Get the full path to the database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    /// Create the data directory and the log file's directory.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.data_dir).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create data directory {}: {}",
                    self.data_dir.display(),
                    e
                ),
            )
        })?;
        if let Some(parent) = self.log_file.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

fn default_keywords() -> String {
    "software engineer".to_string()
}

/// Default search used by `run`, `scrape` and the scheduled extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_keywords")]
    pub keywords: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
            location: None,
            experience_level: None,
            job_type: None,
        }
    }
}

impl SearchConfig {
    /// Apply JOB_KEYWORDS / JOB_LOCATION.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(keywords) = non_empty_env("JOB_KEYWORDS") {
            self.keywords = keywords;
        }
        if let Some(location) = non_empty_env("JOB_LOCATION") {
            self.location = Some(location);
        }
        self
    }

    pub fn to_query(&self) -> ListingQuery {
        ListingQuery {
            keywords: self.keywords.clone(),
            location: self.location.clone(),
            experience_level: self.experience_level.clone(),
            job_type: self.job_type.clone(),
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn default_enricher_job() -> StageJobConfig {
    StageJobConfig::hourly_at(0)
}

fn default_generator_job() -> StageJobConfig {
    StageJobConfig::hourly_at(30)
}

/// Configuration file model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Database filename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Database URL, overriding data_dir/database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    /// Resume path; relative paths resolve against the data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume: Option<String>,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub browser: BrowserEngineConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub research: ResearchConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub scraper: ScraperJobConfig,
    #[serde(default = "default_enricher_job")]
    pub enricher: StageJobConfig,
    #[serde(default = "default_generator_job")]
    pub generator: StageJobConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub daemon: DaemonConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            database: None,
            database_url: None,
            resume: None,
            search: SearchConfig::default(),
            browser: BrowserEngineConfig::default(),
            extraction: ExtractionConfig::default(),
            research: ResearchConfig::default(),
            llm: LlmConfig::default(),
            scraper: ScraperJobConfig::default(),
            enricher: default_enricher_job(),
            generator: default_generator_job(),
            orchestrator: OrchestratorConfig::default(),
            daemon: DaemonConfig::default(),
            source_path: None,
        }
    }
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Falls back to defaults when no file is found or it cannot be parsed.
    pub async fn load() -> Self {
        match prefer::load("jobflow").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("Ignoring config {}: {}", path.display(), e);
                            Self::default_with_env()
                        }
                    }
                } else {
                    Self::default_with_env()
                }
            }
            Err(_) => Self::default_with_env(),
        }
    }

    /// Defaults with environment variable overrides applied.
    pub fn default_with_env() -> Self {
        let mut config = Self::default();
        config.search = config.search.with_env_overrides();
        config
    }

    /// Load configuration from a specific file path.
    /// The format is chosen by extension: TOML, YAML, otherwise JSON.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        config.search = config.search.with_env_overrides();
        config.llm = config.llm.with_env_overrides();
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    /// Returns the config file's parent directory if available, otherwise None.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are joined onto `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    /// `data_dir` resolves against `base_dir`; the resume, PID and log files
    /// resolve against the resulting data directory.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
        }
        if let Some(ref database) = self.database {
            settings.database_filename = database.clone();
        }
        if let Some(ref url) = self.database_url {
            settings.database_url = Some(url.clone());
        }
        self.resolve_data_files(settings);
    }

    fn resolve_data_files(&self, settings: &mut Settings) {
        let data_dir = settings.data_dir.clone();
        settings.resume_path = self.resolve_path(
            self.resume.as_deref().unwrap_or(DEFAULT_RESUME_FILENAME),
            &data_dir,
        );
        settings.pid_file = self.resolve_path(&self.daemon.pid_file, &data_dir);
        settings.log_file = self.resolve_path(&self.daemon.log_file, &data_dir);
    }
}

/// Where configuration comes from.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file (--config). A file that fails to load is an error.
    pub config_path: Option<PathBuf>,
    /// Data directory override (--data).
    pub data: Option<PathBuf>,
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
pub async fn load_settings(options: &LoadOptions) -> anyhow::Result<(Settings, Config)> {
    let config = match options.config_path {
        Some(ref path) => Config::load_from_path(path)
            .await
            .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?,
        None => Config::load().await,
    };

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let base_dir = config.base_dir().unwrap_or_else(|| cwd.clone());

    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings, &base_dir);

    // --data takes precedence over the config file
    if let Some(ref data) = options.data {
        settings.data_dir = config.resolve_path(&data.to_string_lossy(), &cwd);
        config.resolve_data_files(&mut settings);
    }

    // DATABASE_URL environment variable takes highest precedence
    if let Some(database_url) = non_empty_env("DATABASE_URL") {
        tracing::debug!("Using DATABASE_URL from environment: {}", database_url);
        settings.database_url = Some(database_url);
    }

    Ok((settings, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_settings_paths() {
        let settings = Settings::with_data_dir(PathBuf::from("/srv/jobflow"));
        assert_eq!(settings.database_url(), "sqlite:/srv/jobflow/jobflow.db");
        assert_eq!(settings.resume_path, PathBuf::from("/srv/jobflow/resume.txt"));
        assert_eq!(settings.pid_file, PathBuf::from("/srv/jobflow/.pipeline.pid"));
        assert_eq!(
            settings.log_file,
            PathBuf::from("/srv/jobflow/logs/pipeline.log")
        );
    }

    #[test]
    fn test_default_schedules() {
        let config = Config::default();
        assert_eq!(config.scraper.hour, Some(9));
        assert_eq!(config.scraper.max_jobs_per_day, 50);
        assert_eq!(config.enricher.minute, 0);
        assert_eq!(config.generator.minute, 30);
        assert_eq!(config.generator.batch_size, 10);
        assert_eq!(config.orchestrator.enrich_group_size, 5);
    }

    #[tokio::test]
    async fn test_load_toml_resolves_relative_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("jobflow.toml");
        tokio::fs::write(
            &path,
            r#"
data_dir = "data"
resume = "cv.txt"

[search]
keywords = "rust developer"
experience_level = "Mid-Senior level"

[generator]
minute = 45
batch_size = 3

[daemon]
pid_file = "/run/jobflow.pid"
"#,
        )
        .await
        .unwrap();

        let options = LoadOptions {
            config_path: Some(path),
            data: None,
        };
        let (settings, config) = load_settings(&options).await.unwrap();

        assert_eq!(settings.data_dir, dir.path().join("data"));
        assert_eq!(settings.resume_path, dir.path().join("data").join("cv.txt"));
        assert_eq!(settings.pid_file, PathBuf::from("/run/jobflow.pid"));
        assert_eq!(config.generator.minute, 45);
        assert_eq!(config.generator.batch_size, 3);
        assert_eq!(config.generator.max_retries, 3);
        assert_eq!(config.enricher.minute, 0);
        assert_eq!(
            config.search.experience_level.as_deref(),
            Some("Mid-Senior level")
        );
    }

    #[tokio::test]
    async fn test_load_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("jobflow.yaml");
        tokio::fs::write(&path, "orchestrator:\n  enrich_group_size: 2\n")
            .await
            .unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.orchestrator.enrich_group_size, 2);
        assert_eq!(config.orchestrator.group_delay_ms, 2000);
        assert_eq!(config.base_dir().as_deref(), Some(dir.path()));
    }

    #[tokio::test]
    async fn test_explicit_config_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        tokio::fs::write(&path, "[search\nkeywords = ").await.unwrap();

        let options = LoadOptions {
            config_path: Some(path),
            data: None,
        };
        assert!(load_settings(&options).await.is_err());
    }

    #[tokio::test]
    async fn test_data_override() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("jobflow.json");
        tokio::fs::write(&path, r#"{"data_dir": "ignored"}"#)
            .await
            .unwrap();
        let data = dir.path().join("elsewhere");

        let options = LoadOptions {
            config_path: Some(path),
            data: Some(data.clone()),
        };
        let (settings, _) = load_settings(&options).await.unwrap();
        assert_eq!(settings.data_dir, data);
        assert_eq!(settings.pid_file, data.join(".pipeline.pid"));
    }
}
