// src/storage/memory.rs

//! In-memory storage backend for tests and ephemeral runs.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{CrawlRun, Posting};
use crate::storage::PostingStore;

/// Mutex-guarded map store. Same trait surface as `LocalStore`, no
/// disk involved.
#[derive(Default)]
pub struct MemoryStore {
    /// (board_id, fingerprint) -> posting
    postings: Mutex<HashMap<(String, String), Posting>>,
    /// board_id -> runs
    runs: Mutex<HashMap<String, Vec<CrawlRun>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PostingStore for MemoryStore {
    async fn get_posting(&self, board_id: &str, fingerprint: &str) -> Result<Option<Posting>> {
        let postings = self.postings.lock().unwrap();
        Ok(postings
            .get(&(board_id.to_string(), fingerprint.to_string()))
            .cloned())
    }

    async fn put_posting(&self, posting: &Posting) -> Result<()> {
        let mut postings = self.postings.lock().unwrap();
        postings.insert(
            (posting.board_id.clone(), posting.fingerprint.clone()),
            posting.clone(),
        );
        Ok(())
    }

    async fn list_postings(&self, board_id: &str) -> Result<Vec<Posting>> {
        let postings = self.postings.lock().unwrap();
        let mut result: Vec<Posting> = postings
            .values()
            .filter(|p| p.board_id == board_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.fingerprint.cmp(&b.fingerprint));
        Ok(result)
    }

    async fn record_run(&self, run: &CrawlRun) -> Result<()> {
        let mut runs = self.runs.lock().unwrap();
        let board_runs = runs.entry(run.board_id.clone()).or_default();
        match board_runs.iter_mut().find(|r| r.id == run.id) {
            Some(existing) => *existing = run.clone(),
            None => board_runs.push(run.clone()),
        }
        Ok(())
    }

    async fn list_runs(&self, board_id: &str) -> Result<Vec<CrawlRun>> {
        let runs = self.runs.lock().unwrap();
        Ok(runs.get(board_id).cloned().unwrap_or_default())
    }
}
