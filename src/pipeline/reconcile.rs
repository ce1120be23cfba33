// src/pipeline/reconcile.rs

//! Dedup and upsert reconciliation.
//!
//! Freshly extracted postings are reconciled against the store by
//! identity fingerprint: insert on first sight, update in place when a
//! tracked field changed, no write otherwise. The engine never
//! deletes; removal is an administrative operation outside the crawl
//! path.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{fingerprint, Posting};
use crate::storage::PostingStore;

/// One successfully extracted posting, ready for reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPosting {
    /// Stable source locator (fingerprint input, never stored fields)
    pub locator: String,
    pub source_url: String,
    pub organization: String,
    pub title: String,
    pub location: String,
    pub deadline: Option<chrono::NaiveDate>,
    pub body: String,
    /// Resolved (proxyable) attachment URL
    pub attachment_url: Option<String>,
    pub region: Option<String>,
}

/// Counts reported back for the crawl run summary.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

/// Reconcile a batch of extracted postings for one board.
pub async fn reconcile(
    store: &dyn PostingStore,
    board_id: &str,
    batch: &[ExtractedPosting],
) -> Result<ReconcileSummary> {
    let mut summary = ReconcileSummary::default();

    for item in batch {
        let fp = fingerprint(board_id, &item.locator);

        match store.get_posting(board_id, &fp).await? {
            None => {
                let now = Utc::now();
                let posting = Posting {
                    fingerprint: fp,
                    board_id: board_id.to_string(),
                    organization: item.organization.clone(),
                    title: item.title.clone(),
                    location: item.location.clone(),
                    deadline: item.deadline,
                    body: item.body.clone(),
                    attachment_url: item.attachment_url.clone(),
                    source_url: item.source_url.clone(),
                    region: item.region.clone(),
                    created_at: now,
                    updated_at: now,
                };
                store.put_posting(&posting).await?;
                summary.inserted += 1;
            }
            Some(existing) => {
                let mut candidate = existing.clone();
                candidate.organization = item.organization.clone();
                candidate.title = item.title.clone();
                candidate.location = item.location.clone();
                candidate.deadline = item.deadline;
                candidate.body = item.body.clone();
                candidate.attachment_url = item.attachment_url.clone();
                candidate.source_url = item.source_url.clone();
                candidate.region = item.region.clone();

                if existing.content_differs(&candidate) {
                    candidate.updated_at = Utc::now();
                    store.put_posting(&candidate).await?;
                    summary.updated += 1;
                } else {
                    summary.unchanged += 1;
                }
            }
        }
    }

    Ok(summary)
}
