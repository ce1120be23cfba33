// src/models/posting.rs

//! Posting data structure and identity fingerprint.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A normalized job posting stored in the shared store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Posting {
    /// Identity fingerprint, unique per board
    pub fingerprint: String,

    /// Owning board
    pub board_id: String,

    /// Publishing organization
    pub organization: String,

    /// Posting title
    pub title: String,

    /// Work location as displayed by the source
    #[serde(default)]
    pub location: String,

    /// Application deadline, when one could be parsed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,

    /// Body text
    pub body: String,

    /// Primary attachment download URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_url: Option<String>,

    /// Detail page URL on the origin board
    pub source_url: String,

    /// Inferred region
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Posting {
    /// True when any tracked content field differs from `other`.
    ///
    /// Tracked fields are the ones an origin board edits in place:
    /// title, deadline, body, and the attachment URL. Identity fields
    /// never participate.
    pub fn content_differs(&self, other: &Posting) -> bool {
        self.title != other.title
            || self.deadline != other.deadline
            || self.body != other.body
            || self.attachment_url != other.attachment_url
    }
}

/// Compute the identity fingerprint for a source item.
///
/// The fingerprint is a pure function of the owning board and the
/// item's stable source locator. Content fields are deliberately
/// excluded so that edits to a posting resolve to the same row.
pub fn fingerprint(board_id: &str, locator: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(board_id.as_bytes());
    hasher.update(b"\n");
    hasher.update(locator.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_posting() -> Posting {
        let now = Utc::now();
        Posting {
            fingerprint: fingerprint("b1", "1234"),
            board_id: "b1".to_string(),
            organization: "서울특별시교육청".to_string(),
            title: "기간제교사 채용 공고".to_string(),
            location: "서울".to_string(),
            deadline: NaiveDate::from_ymd_opt(2025, 11, 1),
            body: "모집 내용 본문".to_string(),
            attachment_url: Some("https://x/file.hwp".to_string()),
            source_url: "https://x/view?seq=1234".to_string(),
            region: Some("서울".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn fingerprint_is_stable() {
        assert_eq!(fingerprint("b1", "1234"), fingerprint("b1", "1234"));
    }

    #[test]
    fn fingerprint_differs_across_boards() {
        // Two boards producing the same raw locator must not collide.
        assert_ne!(fingerprint("b1", "1234"), fingerprint("b2", "1234"));
    }

    #[test]
    fn fingerprint_ignores_content() {
        let a = sample_posting();
        let mut b = a.clone();
        b.title = "정정 공고".to_string();
        b.deadline = NaiveDate::from_ymd_opt(2025, 11, 15);
        assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn content_differs_tracks_deadline() {
        let a = sample_posting();
        let mut b = a.clone();
        assert!(!a.content_differs(&b));
        b.deadline = NaiveDate::from_ymd_opt(2025, 11, 15);
        assert!(a.content_differs(&b));
    }

    #[test]
    fn content_differs_ignores_location() {
        let a = sample_posting();
        let mut b = a.clone();
        b.location = "부산".to_string();
        assert!(!a.content_differs(&b));
    }
}
