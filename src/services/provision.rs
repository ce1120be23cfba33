// src/services/provision.rs

//! Procedure provisioning boundary.
//!
//! Deriving an extraction procedure from a sample page is an external
//! concern (in production an AI-assisted generator sits behind this
//! trait). The crate ships `PatternProvider`, which recognizes known
//! CMS families by markup fingerprints and emits their canned rule
//! sets with generic fallbacks appended.

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{
    Board, DetailRules, ExtractionProcedure, FieldRule, ListRules, RegionRule,
};

/// Supplies or regenerates a board's extraction procedure.
#[async_trait]
pub trait ProcedureProvider: Send + Sync {
    /// Derive a procedure for `board` from a sample list page.
    ///
    /// Errors with `ProcedureMissing` when no plausible rule set can
    /// be derived.
    async fn provision(&self, board: &Board, sample_html: &str) -> Result<ExtractionProcedure>;
}

/// A known CMS family and the rules it implies.
#[derive(Debug, Clone)]
pub struct CmsPattern {
    /// Pattern name for identification
    pub name: String,

    /// URL substring to match
    pub detect_url_contains: Option<String>,

    /// HTML content substring to match
    pub detect_html_contains: Option<String>,

    pub list: ListRules,

    pub detail: DetailRules,
}

/// Detects known CMS families from the sample page.
pub struct PatternProvider {
    patterns: Vec<CmsPattern>,
    region_rules: Vec<RegionRule>,
}

impl PatternProvider {
    pub fn new() -> Self {
        Self {
            patterns: default_patterns(),
            region_rules: default_region_rules(),
        }
    }

    pub fn with_patterns(patterns: Vec<CmsPattern>, region_rules: Vec<RegionRule>) -> Self {
        Self {
            patterns,
            region_rules,
        }
    }

    fn detect(&self, board: &Board, sample_html: &str) -> Option<&CmsPattern> {
        self.patterns.iter().find(|pattern| {
            let url_hit = pattern
                .detect_url_contains
                .as_ref()
                .is_some_and(|needle| board.url_template.contains(needle.as_str()));
            let html_hit = pattern
                .detect_html_contains
                .as_ref()
                .is_some_and(|needle| sample_html.contains(needle.as_str()));
            url_hit || html_hit
        })
    }
}

impl Default for PatternProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcedureProvider for PatternProvider {
    async fn provision(&self, board: &Board, sample_html: &str) -> Result<ExtractionProcedure> {
        let Some(pattern) = self.detect(board, sample_html) else {
            log::warn!(
                "No CMS pattern matched board '{}'; cannot provision",
                board.id
            );
            return Err(AppError::ProcedureMissing {
                board: board.id.clone(),
            });
        };

        log::info!(
            "Provisioned board '{}' from CMS pattern '{}'",
            board.id,
            pattern.name
        );

        // Specific pattern rules first, generic fallbacks appended, so
        // the extractor's first-match ordering prefers the structural
        // selectors.
        let fallback = ExtractionProcedure::fallback();
        let mut list = pattern.list.clone();
        list.rows.extend(fallback.list.rows);
        list.link.extend(fallback.list.link);
        list.title.extend(fallback.list.title);
        list.posted.extend(fallback.list.posted);

        let mut detail = pattern.detail.clone();
        detail.title.extend(fallback.detail.title);
        detail.organization.extend(fallback.detail.organization);
        detail.location.extend(fallback.detail.location);
        detail.deadline.extend(fallback.detail.deadline);
        detail.body.extend(fallback.detail.body);

        let version = board
            .procedure
            .as_ref()
            .map(|p| p.version + 1)
            .unwrap_or(1);

        Ok(ExtractionProcedure {
            version,
            list,
            detail,
            attachments: fallback.attachments,
            region_rules: self.region_rules.clone(),
        })
    }
}

/// CMS families seen across Korean public-office boards.
fn default_patterns() -> Vec<CmsPattern> {
    vec![
        CmsPattern {
            name: "gov_board".to_string(),
            detect_url_contains: Some(".do".to_string()),
            detect_html_contains: Some("board-list".to_string()),
            list: ListRules {
                rows: vec!["table.board-list tbody tr:has(a)".to_string()],
                link: vec![FieldRule::attr("td.subject a", "href")],
                title: vec![FieldRule::text("td.subject a")],
                posted: vec![FieldRule::text("td.date")],
            },
            detail: DetailRules {
                title: vec![FieldRule::text(".board-view .subject")],
                organization: vec![FieldRule::text(".board-view .writer")],
                location: vec![],
                deadline: vec![FieldRule::text(".board-view .period")],
                body: vec![FieldRule::text(".board-view .content")],
            },
        },
        CmsPattern {
            name: "nx_cms".to_string(),
            detect_url_contains: None,
            detect_html_contains: Some("bl_list".to_string()),
            list: ListRules {
                rows: vec!["table.bl_list tr:has(td.td-subject)".to_string()],
                link: vec![FieldRule::attr("td.td-subject a", "href")],
                title: vec![FieldRule::text("td.td-subject a")],
                posted: vec![FieldRule::text("td.td-date")],
            },
            detail: DetailRules {
                title: vec![FieldRule::text(".bv_subject")],
                organization: vec![FieldRule::text(".bv_writer")],
                location: vec![],
                deadline: vec![],
                body: vec![FieldRule::text(".bv_content")],
            },
        },
        CmsPattern {
            name: "xe_board".to_string(),
            detect_url_contains: None,
            detect_html_contains: Some("xe-list-board".to_string()),
            list: ListRules {
                rows: vec![
                    "li.xe-list-board-list--item:not(.xe-list-board-list--header)".to_string(),
                ],
                link: vec![FieldRule::attr("a.xe-list-board-list__title-link", "href")],
                title: vec![FieldRule::text("a.xe-list-board-list__title-link")],
                posted: vec![FieldRule::text(".xe-list-board-list__created_at")],
            },
            detail: DetailRules {
                title: vec![FieldRule::text(".xe-board-view__title")],
                organization: vec![],
                location: vec![],
                deadline: vec![],
                body: vec![FieldRule::text(".xe-board-view__body")],
            },
        },
    ]
}

/// Region inference table applied to organization names.
fn default_region_rules() -> Vec<RegionRule> {
    [
        ("서울", "서울"),
        ("부산", "부산"),
        ("대구", "대구"),
        ("인천", "인천"),
        ("광주", "광주"),
        ("대전", "대전"),
        ("울산", "울산"),
        ("세종", "세종"),
        ("경기", "경기"),
        ("강원", "강원"),
        ("충북", "충북"),
        ("충남", "충남"),
        ("전북", "전북"),
        ("전남", "전남"),
        ("경북", "경북"),
        ("경남", "경남"),
        ("제주", "제주"),
    ]
    .iter()
    .map(|(pattern, region)| RegionRule {
        pattern: pattern.to_string(),
        region: region.to_string(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(url_template: &str) -> Board {
        Board {
            id: "b1".to_string(),
            name: "테스트 게시판".to_string(),
            url_template: url_template.to_string(),
            active: true,
            region: None,
            procedure: None,
        }
    }

    #[tokio::test]
    async fn provisions_from_html_fingerprint() {
        let provider = PatternProvider::new();
        let board = board("https://edu.example/jobs?page={page}");
        let html = r#"<table class="bl_list"><tr><td class="td-subject"><a href="v?seq=1">t</a></td></tr></table>"#;

        let procedure = provider.provision(&board, html).await.unwrap();
        assert_eq!(procedure.version, 1);
        assert_eq!(
            procedure.list.rows[0],
            "table.bl_list tr:has(td.td-subject)"
        );
        // Generic fallbacks are appended after the pattern's rules.
        assert!(procedure.list.rows.len() > 1);
        assert!(!procedure.region_rules.is_empty());
    }

    #[tokio::test]
    async fn unknown_markup_is_procedure_missing() {
        let provider = PatternProvider::new();
        let board = board("https://unknown.example/jobs");
        let err = provider
            .provision(&board, "<html><body>custom</body></html>")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ProcedureMissing { .. }));
    }

    #[tokio::test]
    async fn reprovision_bumps_version() {
        let provider = PatternProvider::new();
        let mut board = board("https://edu.example/list.do?page={page}");
        let html = r#"<div class="board-list">...</div>"#;

        let first = provider.provision(&board, html).await.unwrap();
        board.set_procedure(first);
        let second = provider.provision(&board, html).await.unwrap();
        assert_eq!(second.version, 2);
    }
}
