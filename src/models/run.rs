// src/models/run.rs

//! Crawl run records.
//!
//! One `CrawlRun` is created per crawl attempt of one board. It is
//! mutated only by its own run and becomes terminal once
//! `completed_at` is set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal and in-progress states of a crawl run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Succeeded,
    /// Some items were skipped for recoverable reasons, but the board
    /// itself was reachable.
    Partial,
    Failed,
}

/// Per-run item counters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunCounts {
    /// Candidate items discovered on list pages
    pub discovered: usize,
    /// New postings inserted
    pub inserted: usize,
    /// Existing postings updated in place
    pub updated: usize,
    /// Items resolved to an existing row with no change
    pub unchanged: usize,
    /// Items skipped with a recorded reason
    pub skipped: usize,
    /// Detail fetches retried after a transient failure
    pub retries: usize,
}

/// One execution attempt of a board's crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlRun {
    pub id: String,

    pub board_id: String,

    pub started_at: DateTime<Utc>,

    /// Set exactly once, when the run reaches a terminal status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    pub status: RunStatus,

    /// Diagnostic detail for failed runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default)]
    pub counts: RunCounts,
}

impl CrawlRun {
    /// Start a new run for a board.
    pub fn start(board_id: impl Into<String>) -> Self {
        let board_id = board_id.into();
        let started_at = Utc::now();
        Self {
            id: format!("{}-{}", board_id, started_at.format("%Y%m%dT%H%M%S%3f")),
            board_id,
            started_at,
            completed_at: None,
            status: RunStatus::Running,
            error: None,
            counts: RunCounts::default(),
        }
    }

    /// Finalize with a terminal status. No-op if already terminal.
    pub fn finish(&mut self, status: RunStatus, error: Option<String>) {
        if self.completed_at.is_some() {
            return;
        }
        self.status = status;
        self.error = error;
        self.completed_at = Some(Utc::now());
    }

    pub fn is_terminal(&self) -> bool {
        self.completed_at.is_some()
    }
}
