use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;

use catalog_sync::config;
use catalog_sync::db;
use catalog_sync::model::CatalogRecord;

#[derive(Debug, Parser)]
#[command(author, version, about = "Print the local product catalog mirror")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Only print the product with this code
    #[arg(long)]
    code: Option<String>,

    /// Emit JSON lines instead of a table
    #[arg(long)]
    json: bool,
}

fn print_row(r: &CatalogRecord) {
    println!(
        "{:<20} {:>8}  {:<32} {:<12} {}",
        r.code,
        r.remote_id,
        r.name,
        r.supplier_code.as_deref().unwrap_or("-"),
        r.supplier_name
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    let rows = match &args.code {
        Some(code) => vec![db::fetch_product(&pool, code)
            .await?
            .ok_or_else(|| anyhow!("no product with code {}", code))?],
        None => db::list_products(&pool).await?,
    };

    if args.json {
        for r in &rows {
            println!("{}", serde_json::to_string(r)?);
        }
        return Ok(());
    }

    println!(
        "{:<20} {:>8}  {:<32} {:<12} {}",
        "CODE", "ID", "NAME", "SUPPLIER", "SUPPLIER NAME"
    );
    for r in &rows {
        print_row(r);
    }
    println!(
        "{} products, max id {}",
        db::count_products(&pool).await?,
        db::max_remote_id(&pool).await?
    );
    Ok(())
}
