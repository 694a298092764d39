//! Persisted "last successful sync" watermark.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::model::SyncTimestamp;

#[async_trait]
pub trait CursorStore: Send + Sync {
    /// `None` means no pass has ever completed.
    async fn read(&self) -> Result<Option<SyncTimestamp>>;

    async fn write(&self, at: SyncTimestamp) -> Result<()>;
}

/// Cursor kept as a single line of text in a file.
#[derive(Debug, Clone)]
pub struct FileCursorStore {
    path: PathBuf,
}

impl FileCursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling of the cursor file with `.tmp` appended to its full name.
    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_err(&self, source: std::io::Error) -> SyncError {
        SyncError::Cursor {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl CursorStore for FileCursorStore {
    async fn read(&self) -> Result<Option<SyncTimestamp>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.io_err(err)),
        };
        let value = content.trim();
        if value.is_empty() {
            return Ok(None);
        }
        value
            .parse::<SyncTimestamp>()
            .map(Some)
            .map_err(|_| SyncError::InvalidCursor {
                path: self.path.clone(),
                value: value.to_string(),
            })
    }

    async fn write(&self, at: SyncTimestamp) -> Result<()> {
        // Write beside the target, then rename over it.
        let tmp_path = self.tmp_path();
        {
            let mut file = fs::File::create(&tmp_path)
                .await
                .map_err(|e| self.io_err(e))?;
            file.write_all(at.to_string().as_bytes())
                .await
                .map_err(|e| self.io_err(e))?;
            file.sync_all().await.map_err(|e| self.io_err(e))?;
        }
        fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| self.io_err(e))?;
        debug!(path = %self.path.display(), cursor = %at, "cursor written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_or_blank_file_reads_as_never_synced() {
        let td = tempdir().unwrap();
        let store = FileCursorStore::new(td.path().join("last_sync.txt"));
        assert_eq!(store.read().await.unwrap(), None);

        std::fs::write(store.path(), "  \n").unwrap();
        assert_eq!(store.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn write_then_read_and_overwrite() {
        let td = tempdir().unwrap();
        let store = FileCursorStore::new(td.path().join("last_sync.txt"));

        let first: SyncTimestamp = "2024-01-01T00:00:00".parse().unwrap();
        store.write(first).await.unwrap();
        assert_eq!(store.read().await.unwrap(), Some(first));

        let second: SyncTimestamp = "2024-06-30T12:34:56".parse().unwrap();
        store.write(second).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(store.path()).unwrap(),
            "2024-06-30T12:34:56"
        );
        assert!(!td.path().join("last_sync.txt.tmp").exists());
    }

    #[tokio::test]
    async fn cursor_file_named_tmp_survives_a_write() {
        let td = tempdir().unwrap();
        let store = FileCursorStore::new(td.path().join("cursor.tmp"));
        let at: SyncTimestamp = "2024-02-02T02:02:02".parse().unwrap();

        store.write(at).await.unwrap();

        assert_eq!(store.tmp_path(), td.path().join("cursor.tmp.tmp"));
        assert_eq!(store.read().await.unwrap(), Some(at));
        assert!(!store.tmp_path().exists());
    }

    #[tokio::test]
    async fn garbage_content_is_an_error() {
        let td = tempdir().unwrap();
        let store = FileCursorStore::new(td.path().join("last_sync.txt"));
        std::fs::write(store.path(), "2024-01-0").unwrap();
        assert!(matches!(
            store.read().await,
            Err(SyncError::InvalidCursor { .. })
        ));
    }

    #[tokio::test]
    async fn reads_cursor_file_with_trailing_newline() {
        let td = tempdir().unwrap();
        let store = FileCursorStore::new(td.path().join("last_sync.txt"));
        std::fs::write(store.path(), "2023-11-05T08:00:00\n").unwrap();
        assert_eq!(
            store.read().await.unwrap().map(|t| t.to_string()).as_deref(),
            Some("2023-11-05T08:00:00")
        );
    }
}
