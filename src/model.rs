use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire format of the sync cursor and of `ModifiedDate` filters.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// One product as stored in the local catalog. `code` is the natural key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CatalogRecord {
    pub code: String,
    #[sqlx(rename = "id")]
    pub remote_id: i64,
    pub name: String,
    #[sqlx(rename = "styleCode")]
    pub style_code: String,
    #[sqlx(rename = "stockControl")]
    pub stock_control: String,
    #[sqlx(rename = "supplierCode")]
    pub supplier_code: Option<String>,
    #[sqlx(rename = "supplierName")]
    pub supplier_name: String,
    #[sqlx(rename = "supplierId")]
    pub supplier_id: Option<i64>,
    pub description: String,
    #[sqlx(rename = "lastModified")]
    pub last_modified: String,
}

/// UTC instant with second precision, rendered as `YYYY-MM-DDTHH:MM:SS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SyncTimestamp(NaiveDateTime);

impl From<DateTime<Utc>> for SyncTimestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value.trunc_subsecs(0).naive_utc())
    }
}

impl fmt::Display for SyncTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

impl FromStr for SyncTimestamp {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT).map(Self)
    }
}

/// A remote element that could not be turned into a `CatalogRecord`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed product at position {position} (id {remote_id:?}): {reason}")]
pub struct MalformedRecord {
    pub position: usize,
    pub remote_id: Option<i64>,
    pub reason: String,
}

/// Result of one remote product query, already split at the parse boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductBatch {
    pub records: Vec<CatalogRecord>,
    pub rejected: Vec<MalformedRecord>,
}

impl ProductBatch {
    pub fn extend(&mut self, other: ProductBatch) {
        self.records.extend(other.records);
        self.rejected.extend(other.rejected);
    }
}
