//! Database context for managing connections and repository access.
//!
//! The DbContext is the primary entry point for all database operations.
//! It holds the connection factory and hands out repositories.

use std::path::Path;

use super::draft::DieselDraftRepository;
use super::listing::DieselListingRepository;
use super::migrations::init_schema;
use super::pool::{AsyncSqlitePool, DieselError};
use super::research::DieselResearchRepository;

/// Database context that provides repository access.
///
/// # Example
/// ```ignore
/// let ctx = DbContext::open(&settings.database_url()).await?;
/// let pending = ctx.listings().pending_for_stage(Stage::Enrich, 3, 10).await?;
/// ```
#[derive(Clone)]
pub struct DbContext {
    pool: AsyncSqlitePool,
}

impl DbContext {
    /// Create a context without touching the database.
    pub fn new(database_url: &str) -> Self {
        Self {
            pool: AsyncSqlitePool::new(database_url),
        }
    }

    pub fn from_path(db_path: &Path) -> Self {
        Self {
            pool: AsyncSqlitePool::from_path(db_path),
        }
    }

    /// Create a context and make sure the schema exists.
    ///
    /// This is the startup connectivity check: an error here is fatal.
    pub async fn open(database_url: &str) -> Result<Self, DieselError> {
        let ctx = Self::new(database_url);
        if let Some(parent) = Path::new(ctx.pool.database_url()).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(super::util::to_diesel_error)?;
            }
        }
        init_schema(&ctx.pool).await?;
        Ok(ctx)
    }

    pub fn pool(&self) -> &AsyncSqlitePool {
        &self.pool
    }

    pub fn listings(&self) -> DieselListingRepository {
        DieselListingRepository::new(self.pool.clone())
    }

    pub fn research(&self) -> DieselResearchRepository {
        DieselResearchRepository::new(self.pool.clone())
    }

    pub fn drafts(&self) -> DieselDraftRepository {
        DieselDraftRepository::new(self.pool.clone())
    }
}
