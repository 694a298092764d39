//! Incremental mirror of a remote product catalog into a local SQLite store.

pub mod config;
pub mod cursor;
pub mod db;
pub mod error;
pub mod model;
pub mod remote;
pub mod sync;

pub use error::{Result, SyncError};
