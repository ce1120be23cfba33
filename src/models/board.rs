// src/models/board.rs

//! Board registry data structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::ExtractionProcedure;

/// One external web board whose postings are crawled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
    /// Opaque unique identifier
    pub id: String,

    /// Display name (e.g. "서울특별시교육청 채용공고")
    pub name: String,

    /// List-page URL template. `{page}` is replaced with the 1-based
    /// page number; a template without the placeholder is a
    /// single-page board.
    pub url_template: String,

    /// Inactive boards are excluded from sweeps
    #[serde(default = "default_active")]
    pub active: bool,

    /// Last-known region for this board's postings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Current extraction procedure. A board without one cannot be
    /// crawled until provisioning supplies one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub procedure: Option<ExtractionProcedure>,
}

fn default_active() -> bool {
    true
}

impl Board {
    /// Render the list-page URL for a 1-based page number.
    pub fn list_url(&self, page: usize) -> String {
        self.url_template.replace("{page}", &page.to_string())
    }

    /// True when the template carries a page placeholder.
    pub fn is_paginated(&self) -> bool {
        self.url_template.contains("{page}")
    }

    /// Replace the extraction procedure wholesale.
    pub fn set_procedure(&mut self, procedure: ExtractionProcedure) {
        self.procedure = Some(procedure);
    }
}

/// Board registry loaded from a JSON file.
#[derive(Debug, Clone)]
pub struct BoardRegistry {
    boards: Vec<Board>,
}

impl BoardRegistry {
    /// Load all boards from a JSON registry file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let boards: Vec<Board> = serde_json::from_str(&content)?;
        let registry = Self { boards };
        registry.validate()?;
        Ok(registry)
    }

    pub fn from_boards(boards: Vec<Board>) -> Self {
        Self { boards }
    }

    /// Save the registry back to disk (pretty-printed, like the file
    /// an administrator would review).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.boards)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Reject duplicate or empty board ids.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for board in &self.boards {
            if board.id.trim().is_empty() {
                return Err(AppError::validation("board with empty id"));
            }
            if board.url_template.trim().is_empty() {
                return Err(AppError::validation(format!(
                    "board '{}' has an empty url_template",
                    board.id
                )));
            }
            if !seen.insert(board.id.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate board id '{}'",
                    board.id
                )));
            }
        }
        Ok(())
    }

    pub fn boards(&self) -> &[Board] {
        &self.boards
    }

    pub fn get(&self, id: &str) -> Option<&Board> {
        self.boards.iter().find(|b| b.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Board> {
        self.boards.iter_mut().find(|b| b.id == id)
    }

    /// Boards eligible for a sweep.
    pub fn active_boards(&self) -> impl Iterator<Item = &Board> {
        self.boards.iter().filter(|b| b.active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(id: &str) -> Board {
        Board {
            id: id.to_string(),
            name: format!("Board {id}"),
            url_template: "https://example.com/list?page={page}".to_string(),
            active: true,
            region: None,
            procedure: None,
        }
    }

    #[test]
    fn list_url_substitutes_page() {
        let b = board("b1");
        assert_eq!(b.list_url(3), "https://example.com/list?page=3");
        assert!(b.is_paginated());
    }

    #[test]
    fn single_page_template() {
        let mut b = board("b1");
        b.url_template = "https://example.com/jobs".to_string();
        assert!(!b.is_paginated());
        assert_eq!(b.list_url(1), "https://example.com/jobs");
    }

    #[test]
    fn registry_rejects_duplicate_ids() {
        let registry = BoardRegistry::from_boards(vec![board("b1"), board("b1")]);
        assert!(registry.validate().is_err());
    }

    #[test]
    fn active_filter() {
        let mut inactive = board("b2");
        inactive.active = false;
        let registry = BoardRegistry::from_boards(vec![board("b1"), inactive]);
        let active: Vec<_> = registry.active_boards().map(|b| b.id.as_str()).collect();
        assert_eq!(active, vec!["b1"]);
    }
}
