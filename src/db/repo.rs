use std::str::FromStr;

use crate::error::Result;
use crate::model::CatalogRecord;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{info, instrument};

pub type Pool = SqlitePool;

type DbResult<T> = std::result::Result<T, sqlx::Error>;

const SELECT_PRODUCT: &str = "SELECT code, COALESCE(id, 0) AS id, COALESCE(name, '') AS name, \
     COALESCE(styleCode, '') AS styleCode, COALESCE(stockControl, '') AS stockControl, \
     supplierCode, COALESCE(supplierName, '') AS supplierName, supplierId, \
     COALESCE(description, '') AS description, COALESCE(lastModified, '') AS lastModified \
     FROM products";

/// Open the catalog database. Every pooled connection runs in WAL mode with
/// `synchronous=FULL`.
pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let options = SqliteConnectOptions::from_str(&normalized)?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    info!(database_url = %normalized, "catalog database opened");
    Ok(pool)
}

/// Expand a leading `~/` in a file-backed SQLite URL, make sure the parent
/// directory exists and ask SQLite to create the file when missing.
/// In-memory and non-sqlite URLs pass through untouched.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = format!("sqlite://{}", expanded_path);
    match query_part {
        Some(q) if q.contains("mode=") => {
            rebuilt.push('?');
            rebuilt.push_str(q);
        }
        Some(q) => {
            rebuilt.push('?');
            rebuilt.push_str(q);
            rebuilt.push_str("&mode=rwc");
        }
        None => rebuilt.push_str("?mode=rwc"),
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Highest remote id mirrored locally, 0 when the catalog is empty.
#[instrument(skip_all)]
pub async fn max_remote_id(pool: &Pool) -> DbResult<i64> {
    let max: Option<i64> = sqlx::query_scalar("SELECT MAX(id) FROM products")
        .fetch_one(pool)
        .await?;
    Ok(max.unwrap_or(0))
}

/// Insert-or-overwrite by `code`, all rows in one transaction.
#[instrument(skip_all, fields(rows = records.len()))]
pub async fn upsert_products(pool: &Pool, records: &[CatalogRecord]) -> DbResult<usize> {
    let mut tx = pool.begin().await?;
    for r in records {
        sqlx::query(
            "INSERT INTO products (code, id, name, styleCode, stockControl, supplierCode, \
                                   supplierName, supplierId, description, lastModified) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(code) DO UPDATE SET \
                id = excluded.id, \
                name = excluded.name, \
                styleCode = excluded.styleCode, \
                stockControl = excluded.stockControl, \
                supplierCode = excluded.supplierCode, \
                supplierName = excluded.supplierName, \
                supplierId = excluded.supplierId, \
                description = excluded.description, \
                lastModified = excluded.lastModified",
        )
        .bind(&r.code)
        .bind(r.remote_id)
        .bind(&r.name)
        .bind(&r.style_code)
        .bind(&r.stock_control)
        .bind(&r.supplier_code)
        .bind(&r.supplier_name)
        .bind(r.supplier_id)
        .bind(&r.description)
        .bind(&r.last_modified)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(records.len())
}

#[instrument(skip_all)]
pub async fn count_products(pool: &Pool) -> DbResult<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM products")
        .fetch_one(pool)
        .await
}

#[instrument(skip_all)]
pub async fn list_products(pool: &Pool) -> DbResult<Vec<CatalogRecord>> {
    sqlx::query_as::<_, CatalogRecord>(&format!("{SELECT_PRODUCT} ORDER BY id, code"))
        .fetch_all(pool)
        .await
}

#[instrument(skip_all)]
pub async fn fetch_product(pool: &Pool, code: &str) -> DbResult<Option<CatalogRecord>> {
    sqlx::query_as::<_, CatalogRecord>(&format!("{SELECT_PRODUCT} WHERE code = ?"))
        .bind(code)
        .fetch_optional(pool)
        .await
}
