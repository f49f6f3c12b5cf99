#![deny(
    clippy::expect_used,
    clippy::panic,
    clippy::print_stdout,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used
)]

//! Populate the document table from a CSV file.
//!
//! Runs migrations first, then inserts `title,url,category` rows when the
//! table is still empty.

use std::{fs::File, io::BufReader, path::PathBuf};

use clap::Parser;
use hello_service::{
    config::Config,
    db::{seed_documents, setup_database, SeedOutcome},
    repo::PgSiteRepo,
    secrets::HttpVaultClient,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(about = "Seed the document table")]
struct Args {
    /// CSV file with title,url,category rows (no header).
    #[arg(long, default_value = "seed-data/asis-content.csv")]
    csv: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    let mut config = Config::load().map_err(|e| anyhow::anyhow!("{e}"))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Some(vault) = HttpVaultClient::from_config(&config.vault) {
        config
            .resolve_secrets(&vault)
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))?;
    }
    config
        .validate_database()
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let file = File::open(&args.csv)
        .map_err(|e| anyhow::anyhow!("cannot open {}: {e}", args.csv.display()))?;

    let pool = setup_database(&config.database).await?;
    let repo = PgSiteRepo::new(pool);

    match seed_documents(&repo, BufReader::new(file)).await? {
        SeedOutcome::AlreadyPopulated => {
            tracing::info!("Nothing to seed");
        }
        SeedOutcome::Inserted(count) => {
            tracing::info!(count, path = %args.csv.display(), "Seeding complete");
        }
    }

    Ok(())
}
