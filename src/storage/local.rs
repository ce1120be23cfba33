// src/storage/local.rs

//! Local filesystem storage backend.
//!
//! One JSON file per board and record kind:
//!
//! ```text
//! {root}/
//! ├── postings/
//! │   └── {board_id}.json
//! └── runs/
//!     └── {board_id}.json
//! ```
//!
//! Writes are atomic (temp file + rename). Per-board files keep
//! concurrent writes for different boards disjoint on disk.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{CrawlRun, Posting};
use crate::storage::PostingStore;

/// Local filesystem storage backend.
#[derive(Clone)]
pub struct LocalStore {
    root_dir: PathBuf,
}

impl LocalStore {
    /// Create a new store rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    fn postings_key(board_id: &str) -> String {
        format!("postings/{}.json", sanitize(board_id))
    }

    fn runs_key(board_id: &str) -> String {
        format!("runs/{}.json", sanitize(board_id))
    }

    async fn ensure_dir(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if the file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

/// Board ids come from operator config, but they become file names;
/// keep them path-safe.
fn sanitize(board_id: &str) -> String {
    board_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl PostingStore for LocalStore {
    async fn get_posting(&self, board_id: &str, fingerprint: &str) -> Result<Option<Posting>> {
        let postings = self.list_postings(board_id).await?;
        Ok(postings.into_iter().find(|p| p.fingerprint == fingerprint))
    }

    async fn put_posting(&self, posting: &Posting) -> Result<()> {
        let key = Self::postings_key(&posting.board_id);
        let mut postings: Vec<Posting> = self.read_json(&key).await?.unwrap_or_default();

        match postings
            .iter_mut()
            .find(|p| p.fingerprint == posting.fingerprint)
        {
            Some(existing) => *existing = posting.clone(),
            None => postings.push(posting.clone()),
        }

        self.write_json(&key, &postings).await
    }

    async fn list_postings(&self, board_id: &str) -> Result<Vec<Posting>> {
        Ok(self
            .read_json(&Self::postings_key(board_id))
            .await?
            .unwrap_or_default())
    }

    async fn record_run(&self, run: &CrawlRun) -> Result<()> {
        let key = Self::runs_key(&run.board_id);
        let mut runs: Vec<CrawlRun> = self.read_json(&key).await?.unwrap_or_default();

        match runs.iter_mut().find(|r| r.id == run.id) {
            Some(existing) => *existing = run.clone(),
            None => runs.push(run.clone()),
        }

        self.write_json(&key, &runs).await
    }

    async fn list_runs(&self, board_id: &str) -> Result<Vec<CrawlRun>> {
        Ok(self
            .read_json(&Self::runs_key(board_id))
            .await?
            .unwrap_or_default())
    }
}
