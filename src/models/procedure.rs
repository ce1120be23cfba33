// src/models/procedure.rs

//! Declarative extraction procedure for a single board.
//!
//! A procedure is an ordered list of candidate rules per field. The
//! extractor tries rules in order and the first one that yields a
//! plausible value wins, so specific selectors are listed before
//! generic fallbacks. Procedures are replaced wholesale when
//! regenerated, never patched field by field.

use serde::{Deserialize, Serialize};

/// One candidate rule: a CSS selector, plus an optional attribute to
/// read instead of the element's text content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldRule {
    /// CSS selector for the target element
    pub selector: String,

    /// Attribute to read (e.g. "href"); text content when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr: Option<String>,
}

impl FieldRule {
    /// Rule reading an element's text content.
    pub fn text(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            attr: None,
        }
    }

    /// Rule reading an attribute value.
    pub fn attr(selector: impl Into<String>, attr: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            attr: Some(attr.into()),
        }
    }
}

/// Rules for the board's list pages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListRules {
    /// Candidate selectors for one item row, tried in order
    pub rows: Vec<String>,

    /// Candidate rules for the detail-page link within a row
    pub link: Vec<FieldRule>,

    /// Candidate rules for the title visible in the list row
    #[serde(default)]
    pub title: Vec<FieldRule>,

    /// Candidate rules for the posted date visible in the list row
    #[serde(default)]
    pub posted: Vec<FieldRule>,
}

/// Rules for the detail page of one posting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DetailRules {
    /// Candidate rules for the posting title
    pub title: Vec<FieldRule>,

    /// Candidate rules for the publishing organization
    #[serde(default)]
    pub organization: Vec<FieldRule>,

    /// Candidate rules for the work location
    #[serde(default)]
    pub location: Vec<FieldRule>,

    /// Candidate rules for the application deadline
    #[serde(default)]
    pub deadline: Vec<FieldRule>,

    /// Candidate rules for the body content
    pub body: Vec<FieldRule>,
}

/// Rules for discovering attachment links on a detail page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttachmentRules {
    /// Candidate anchor selectors, tried in order before the generic scan
    #[serde(default)]
    pub anchors: Vec<String>,

    /// URL substrings / filename extensions that mark a link as a file
    #[serde(default = "default_file_patterns")]
    pub url_patterns: Vec<String>,
}

impl Default for AttachmentRules {
    fn default() -> Self {
        Self {
            anchors: Vec::new(),
            url_patterns: default_file_patterns(),
        }
    }
}

fn default_file_patterns() -> Vec<String> {
    [
        ".hwp", ".hwpx", ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".zip",
        "download.do", "filedown", "atchfile",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Substring pattern mapping an organization name to a region.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegionRule {
    /// Substring to search for in the organization text
    pub pattern: String,

    /// Region name to assign on match
    pub region: String,
}

/// Complete, versioned extraction procedure for one board.
///
/// Owned by exactly one board. Interpreted by the extractor; nothing in
/// here is executable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractionProcedure {
    /// Bumped on every regeneration
    #[serde(default = "default_version")]
    pub version: u32,

    pub list: ListRules,

    pub detail: DetailRules,

    #[serde(default)]
    pub attachments: AttachmentRules,

    /// Ordered region inference table, applied to the organization text
    #[serde(default)]
    pub region_rules: Vec<RegionRule>,
}

fn default_version() -> u32 {
    1
}

impl ExtractionProcedure {
    /// Generic table-board procedure that works on most CMS layouts.
    /// Used as the tail of every provisioned procedure.
    pub fn fallback() -> Self {
        Self {
            version: 1,
            list: ListRules {
                rows: vec!["table tr:has(a)".to_string(), "ul li:has(a)".to_string()],
                link: vec![FieldRule::attr("a", "href")],
                title: vec![FieldRule::text("a")],
                posted: vec![FieldRule::text("td:last-child")],
            },
            detail: DetailRules {
                title: vec![
                    FieldRule::text(".board-view-title"),
                    FieldRule::text("h1"),
                    FieldRule::text("h2"),
                ],
                organization: vec![FieldRule::text(".org"), FieldRule::text(".writer")],
                location: vec![FieldRule::text(".location")],
                deadline: vec![FieldRule::text(".deadline"), FieldRule::text(".period")],
                body: vec![
                    FieldRule::text(".board-view-content"),
                    FieldRule::text("div[class*=\"content\"]"),
                    FieldRule::text("article"),
                ],
            },
            attachments: AttachmentRules::default(),
            region_rules: Vec::new(),
        }
    }

    /// Infer a region from an organization name using the rule table.
    /// First matching pattern wins.
    pub fn infer_region(&self, organization: &str) -> Option<String> {
        self.region_rules
            .iter()
            .find(|rule| organization.contains(&rule.pattern))
            .map(|rule| rule.region.clone())
    }
}
