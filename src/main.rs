use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use catalog_sync::config;
use catalog_sync::cursor::FileCursorStore;
use catalog_sync::db;
use catalog_sync::remote::RemoteCatalogClient;
use catalog_sync::sync::{CatalogSyncJob, SystemClock};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Pull new and modified products from the remote catalog into the local mirror"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    cfg.ensure_dirs()?;

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    let client = RemoteCatalogClient::from_config(&cfg)?;
    let cursor = FileCursorStore::new(cfg.cursor_path());
    let clock = SystemClock;

    info!(
        cursor_file = %cursor.path().display(),
        "starting catalog sync"
    );
    let mut job = CatalogSyncJob::new(&client, &pool, &cursor, &clock);
    match job.run_pass().await {
        Ok(summary) => {
            println!("{}", summary);
            Ok(())
        }
        Err(err) => {
            error!(%err, "catalog sync failed");
            Err(err).context("catalog sync failed")
        }
    }
}
