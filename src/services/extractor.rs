// src/services/extractor.rs

//! Page extraction against a board's declarative procedure.
//!
//! Extraction is a pure function of (page snapshot, procedure): no
//! shared state is touched, and every result is tagged with the rule
//! that matched. Candidate rules are evaluated in stored order and the
//! first plausible value wins, so a procedure lists its structural
//! selectors before the generic fallbacks.

use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{ExtractionConfig, ExtractionProcedure, FieldRule};
use crate::utils::date::parse_deadline;
use crate::utils::url::{resolve, source_locator};

/// One candidate item found on a list page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    /// Absolute detail-page URL
    pub link: String,

    /// Stable source locator derived from the link
    pub locator: String,

    /// Title visible in the list row, when one was found
    pub title: Option<String>,

    /// Posted date text visible in the list row
    pub posted: Option<String>,
}

/// A discovered attachment link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Absolute origin URL
    pub url: String,

    /// Display filename from the anchor text
    pub filename: Option<String>,
}

/// Which rule produced a field's value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRule {
    pub field: &'static str,
    pub selector: String,
}

/// Structured fields pulled from one detail page.
#[derive(Debug, Clone, Default)]
pub struct DetailFields {
    pub title: String,
    pub organization: String,
    pub location: String,
    pub deadline: Option<NaiveDate>,
    pub body: String,
    pub attachments: Vec<Attachment>,
    pub region: Option<String>,
    /// Rule provenance per extracted field
    pub matched: Vec<MatchedRule>,
}

impl DetailFields {
    /// Primary attachment: the first one discovered.
    pub fn primary_attachment(&self) -> Option<&Attachment> {
        self.attachments.first()
    }
}

/// Interprets one board's extraction procedure.
pub struct Extractor<'a> {
    procedure: &'a ExtractionProcedure,
    config: &'a ExtractionConfig,
}

impl<'a> Extractor<'a> {
    pub fn new(procedure: &'a ExtractionProcedure, config: &'a ExtractionConfig) -> Self {
        Self { procedure, config }
    }

    /// Extract candidate items from a list page.
    ///
    /// Rows without a resolvable detail link are dropped (header and
    /// notice-pin rows usually have none). Row selectors are tried in
    /// order; the first selector matching any row wins for the page.
    pub fn extract_list(&self, html: &str, page_url: &str) -> Vec<ListItem> {
        let document = Html::parse_document(html);
        let mut items = Vec::new();

        for row_selector in &self.procedure.list.rows {
            let Some(selector) = parse_selector(row_selector) else {
                continue;
            };

            for row in document.select(&selector) {
                if let Some(item) = self.extract_row(&row, page_url) {
                    items.push(item);
                }
            }

            if !items.is_empty() {
                break;
            }
        }

        items
    }

    fn extract_row(&self, row: &ElementRef<'_>, page_url: &str) -> Option<ListItem> {
        let (href, _) = first_value(row, &self.procedure.list.link, 1)?;
        let link = resolve(page_url, &href).unwrap_or(href);
        let locator = source_locator(&link);

        let title = first_value(row, &self.procedure.list.title, self.config.min_title_chars)
            .map(|(value, _)| value);
        let posted = first_value(row, &self.procedure.list.posted, 1).map(|(value, _)| value);

        Some(ListItem {
            link,
            locator,
            title,
            posted,
        })
    }

    /// Extract structured fields from a detail page.
    ///
    /// The title is mandatory: when every candidate rule fails, the
    /// whole item fails with `FieldMissing` and the caller skips it.
    pub fn extract_detail(&self, html: &str, page_url: &str) -> Result<DetailFields> {
        let document = Html::parse_document(html);
        let root = document.root_element();
        let mut fields = DetailFields::default();

        let detail = &self.procedure.detail;

        let (title, rule) = first_value(&root, &detail.title, self.config.min_title_chars)
            .ok_or_else(|| AppError::field_missing("title"))?;
        fields.title = title;
        fields.matched.push(MatchedRule {
            field: "title",
            selector: rule,
        });

        if let Some((organization, rule)) = first_value(&root, &detail.organization, 1) {
            fields.organization = organization;
            fields.matched.push(MatchedRule {
                field: "organization",
                selector: rule,
            });
        }

        if let Some((location, rule)) = first_value(&root, &detail.location, 1) {
            fields.location = location;
            fields.matched.push(MatchedRule {
                field: "location",
                selector: rule,
            });
        }

        if let Some((deadline_text, rule)) = first_value(&root, &detail.deadline, 1) {
            fields.deadline = parse_deadline(&deadline_text);
            if fields.deadline.is_some() {
                fields.matched.push(MatchedRule {
                    field: "deadline",
                    selector: rule,
                });
            }
        }

        // The plausibility floor rejects near-empty wrapper matches so
        // a later, more generic rule can find the real content.
        if let Some((body, rule)) = first_value(&root, &detail.body, self.config.min_body_chars) {
            fields.body = body;
            fields.matched.push(MatchedRule {
                field: "body",
                selector: rule,
            });
        }

        fields.attachments = self.extract_attachments(&root, page_url);
        fields.region = self.procedure.infer_region(&fields.organization);

        Ok(fields)
    }

    /// Collect attachment links: procedure anchors first, then a
    /// generic anchor scan filtered by file URL patterns. All matches
    /// are kept, first is primary; duplicates by URL are dropped.
    fn extract_attachments(&self, root: &ElementRef<'_>, page_url: &str) -> Vec<Attachment> {
        let rules = &self.procedure.attachments;
        let mut seen = std::collections::HashSet::new();
        let mut attachments = Vec::new();

        let mut collect = |element: ElementRef<'_>, require_pattern: bool| {
            let Some(href) = element.value().attr("href") else {
                return;
            };
            let href = href.trim();
            if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
                return;
            }

            let text = normalize(&element.text().collect::<String>());
            if require_pattern && !matches_pattern(href, &text, &rules.url_patterns) {
                return;
            }

            let url = resolve(page_url, href).unwrap_or_else(|| href.to_string());
            if !seen.insert(url.clone()) {
                return;
            }
            attachments.push(Attachment {
                url,
                filename: (!text.is_empty()).then_some(text),
            });
        };

        for anchor_selector in &rules.anchors {
            if let Some(selector) = parse_selector(anchor_selector) {
                for element in root.select(&selector) {
                    collect(element, false);
                }
            }
        }

        if let Some(selector) = parse_selector("a[href]") {
            for element in root.select(&selector) {
                collect(element, true);
            }
        }

        attachments
    }
}

/// Does a link look like a file download, by URL or by anchor text.
fn matches_pattern(href: &str, text: &str, patterns: &[String]) -> bool {
    let href = href.to_lowercase();
    let text = text.to_lowercase();
    patterns
        .iter()
        .any(|p| href.contains(p.as_str()) || text.ends_with(p.as_str()))
}

/// First rule whose value is non-empty and at least `min_len` chars.
/// Returns the value and the winning selector.
fn first_value(
    scope: &ElementRef<'_>,
    rules: &[FieldRule],
    min_len: usize,
) -> Option<(String, String)> {
    for rule in rules {
        let Some(selector) = parse_selector(&rule.selector) else {
            continue;
        };

        for element in scope.select(&selector) {
            let value = match &rule.attr {
                Some(attr) => element.value().attr(attr).unwrap_or("").trim().to_string(),
                None => normalize(&element.text().collect::<String>()),
            };

            if value.chars().count() >= min_len.max(1) {
                return Some((value, rule.selector.clone()));
            }
        }
    }
    None
}

/// An unparseable selector disables its rule rather than failing the
/// extraction; the remaining candidates still apply.
fn parse_selector(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            log::debug!("Skipping invalid selector '{}': {:?}", selector, e);
            None
        }
    }
}

/// Collapse runs of whitespace, as board markup is full of layout
/// newlines.
fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
