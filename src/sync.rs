//! One incremental pass of the product catalog mirror.
//!
//! A pass reads the cursor, pulls records modified since the cursor and
//! records newer than the highest local id, upserts them, and only then
//! advances the cursor. Any error before the cursor write leaves the cursor
//! untouched, so the next pass retries the same window. A malformed element
//! in either response is such an error: storing the rest would move the id
//! watermark past it.

use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use crate::cursor::CursorStore;
use crate::db::CatalogStore;
use crate::error::{Result, SyncError};
use crate::model::{CatalogRecord, SyncTimestamp};
use crate::remote::{CatalogSource, ProductFilter};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    FetchingModified,
    FetchingNew,
    Merging,
    Persisting,
    CommittingCursor,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Idle => "idle",
            SyncPhase::FetchingModified => "fetching_modified",
            SyncPhase::FetchingNew => "fetching_new",
            SyncPhase::Merging => "merging",
            SyncPhase::Persisting => "persisting",
            SyncPhase::CommittingCursor => "committing_cursor",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSummary {
    /// Cursor the pass started from; `None` on a first pass.
    pub since: Option<SyncTimestamp>,
    /// Lower bound used for the new-records query.
    pub max_known_id: i64,
    pub modified: usize,
    pub new: usize,
    pub upserted: usize,
    pub cursor: SyncTimestamp,
}

impl SyncSummary {
    pub fn skipped_modified(&self) -> bool {
        self.since.is_none()
    }
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.upserted == 0 {
            write!(f, "No new or modified products")?;
        } else {
            write!(
                f,
                "Updated {} products ({} modified, {} new)",
                self.upserted, self.modified, self.new
            )?;
        }
        write!(f, "; cursor now {}", self.cursor)
    }
}

pub struct CatalogSyncJob<'a> {
    source: &'a dyn CatalogSource,
    store: &'a dyn CatalogStore,
    cursor: &'a dyn CursorStore,
    clock: &'a dyn Clock,
    phase: SyncPhase,
}

impl<'a> CatalogSyncJob<'a> {
    pub fn new(
        source: &'a dyn CatalogSource,
        store: &'a dyn CatalogStore,
        cursor: &'a dyn CursorStore,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            source,
            store,
            cursor,
            clock,
            phase: SyncPhase::Idle,
        }
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    fn enter(&mut self, phase: SyncPhase) {
        info!(from = self.phase.as_str(), to = phase.as_str(), "sync phase");
        self.phase = phase;
    }

    /// Run a single pass. The job ends in `Idle` whether or not it succeeds.
    #[instrument(skip_all)]
    pub async fn run_pass(&mut self) -> Result<SyncSummary> {
        let result = self.pass().await;
        if let Err(err) = &result {
            warn!(phase = self.phase.as_str(), %err, "sync pass aborted; cursor left unchanged");
        }
        self.enter(SyncPhase::Idle);
        result
    }

    async fn pass(&mut self) -> Result<SyncSummary> {
        let since = self.cursor.read().await?;

        self.enter(SyncPhase::FetchingModified);
        let (modified, mut rejected) = match since {
            Some(ts) => {
                let batch = self
                    .source
                    .fetch_products(&ProductFilter::ModifiedSince(ts))
                    .await?;
                (batch.records, batch.rejected)
            }
            None => {
                info!("no previous sync recorded; skipping modified-products query");
                (Vec::new(), Vec::new())
            }
        };

        self.enter(SyncPhase::FetchingNew);
        let max_known_id = self.store.max_remote_id().await?;
        let batch = self
            .source
            .fetch_products(&ProductFilter::IdGreaterThan(max_known_id))
            .await?;
        let new = batch.records;
        rejected.extend(batch.rejected);

        self.enter(SyncPhase::Merging);
        let (modified_count, new_count) = (modified.len(), new.len());
        let products: Vec<CatalogRecord> = modified.into_iter().chain(new).collect();
        if !rejected.is_empty() {
            for r in &rejected {
                warn!(position = r.position, remote_id = ?r.remote_id, reason = %r.reason, "malformed product");
            }
            return Err(SyncError::Malformed { rejected });
        }

        let upserted = if products.is_empty() {
            0
        } else {
            self.enter(SyncPhase::Persisting);
            self.store.upsert_batch(&products).await?
        };

        self.enter(SyncPhase::CommittingCursor);
        let cursor = SyncTimestamp::from(self.clock.now());
        self.cursor.write(cursor).await?;

        let summary = SyncSummary {
            since,
            max_known_id,
            modified: modified_count,
            new: new_count,
            upserted,
            cursor,
        };
        info!(
            modified = summary.modified,
            new = summary.new,
            upserted = summary.upserted,
            cursor = %summary.cursor,
            "sync pass complete"
        );
        Ok(summary)
    }
}
