use sqlx::{
    migrate::Migrator,
    postgres::{PgPool, PgPoolOptions},
};
use std::{
    io::Read,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::models::{escape_html, NewDocument};
use crate::repo::{RepoError, SiteRepo};

/// Connect to the database and run migrations
///
/// # Errors
/// Returns an error if Postgres stays unreachable past the retry budget or a
/// migration fails.
pub async fn setup_database(config: &DatabaseConfig) -> Result<PgPool, anyhow::Error> {
    let retry_deadline = Duration::from_secs(60); // overall retry budget
    let max_interval = Duration::from_secs(30); // cap single waits
    let mut delay = Duration::from_millis(500);
    let start = Instant::now();
    let database_url = config.connection_url();

    let pool = loop {
        info!("Attempting to connect to Postgres...");

        match PgPoolOptions::new()
            .max_connections(config.max_connections)
            // Allow extra time to acquire a connection during startup bursts
            .acquire_timeout(Duration::from_secs(30))
            .connect(&database_url)
            .await
        {
            Ok(pool) => break pool,
            Err(err) => {
                if start.elapsed() >= retry_deadline {
                    warn!(error = %err, "Postgres not ready; retries exhausted");
                    return Err(err.into());
                }

                warn!(error = %err, "Postgres not ready yet; retrying");
                sleep(delay).await;
                delay = (delay.saturating_mul(2)).min(max_interval);
            }
        }
    };

    let migrator = Migrator::new(migrations_path(config)).await?;
    migrator.run(&pool).await?;
    info!("Migrations applied");
    Ok(pool)
}

/// Configured migrations directory, or the one bundled with the crate.
fn migrations_path(config: &DatabaseConfig) -> PathBuf {
    config.migrations_dir.as_deref().map_or_else(
        || Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/migrations")).to_path_buf(),
        PathBuf::from,
    )
}

/// Outcome of a seeding run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// Documents already existed; nothing was written.
    AlreadyPopulated,
    /// This many documents were inserted.
    Inserted(usize),
}

/// Errors raised while seeding documents.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("invalid seed data: {0}")]
    Csv(#[from] csv::Error),
    #[error("seed row {row} has {found} fields, expected title,url,category")]
    RowShape { row: usize, found: usize },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Populate `azure_document` from `title,url,category` CSV rows.
///
/// Only runs against an empty table. Fields are trimmed and HTML-escaped
/// before insertion.
///
/// # Errors
/// Returns an error on malformed CSV or when a database call fails. Rows
/// inserted before the failure are kept.
pub async fn seed_documents<R: Read>(
    repo: &dyn SiteRepo,
    source: R,
) -> Result<SeedOutcome, SeedError> {
    if repo.count_documents().await? > 0 {
        info!("Database already populated");
        return Ok(SeedOutcome::AlreadyPopulated);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(source);

    let mut documents = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        if record.len() != 3 {
            return Err(SeedError::RowShape {
                row: index + 1,
                found: record.len(),
            });
        }
        let field = |i: usize| escape_html(record.get(i).unwrap_or_default().trim());
        documents.push(NewDocument {
            title: field(0),
            url: field(1),
            category: field(2),
        });
    }

    for document in &documents {
        repo.save_document(document).await?;
    }

    info!(count = documents.len(), "Seeded documents");
    Ok(SeedOutcome::Inserted(documents.len()))
}
