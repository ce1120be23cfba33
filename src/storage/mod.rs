// src/storage/mod.rs

//! Posting store abstractions.
//!
//! The store is the only shared mutable resource in the pipeline. All
//! posting writes go through fingerprint-keyed `put_posting`; writes
//! for different boards land in disjoint keyspaces, and same-board
//! writes are serialized by the orchestrator's per-board run guard.

pub mod local;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{CrawlRun, Posting};

// Re-export for convenience
pub use local::LocalStore;
pub use memory::MemoryStore;

/// Storage backend for postings and crawl run records.
#[async_trait]
pub trait PostingStore: Send + Sync {
    /// Look up one posting by board and fingerprint.
    async fn get_posting(&self, board_id: &str, fingerprint: &str) -> Result<Option<Posting>>;

    /// Insert or replace a posting, keyed by its fingerprint.
    async fn put_posting(&self, posting: &Posting) -> Result<()>;

    /// All postings stored for a board.
    async fn list_postings(&self, board_id: &str) -> Result<Vec<Posting>>;

    /// Insert or replace a crawl run record, keyed by its id.
    async fn record_run(&self, run: &CrawlRun) -> Result<()>;

    /// All run records for a board.
    async fn list_runs(&self, board_id: &str) -> Result<Vec<CrawlRun>>;

    /// The most recently completed run for a board, if any.
    async fn last_completed_run(&self, board_id: &str) -> Result<Option<CrawlRun>> {
        let runs = self.list_runs(board_id).await?;
        Ok(runs
            .into_iter()
            .filter(|run| run.completed_at.is_some())
            .max_by_key(|run| run.completed_at))
    }
}
