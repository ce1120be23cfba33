// src/error.rs

//! Unified error handling for the crawler.

use std::fmt;

use thiserror::Error;

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage backend error
    #[error("Storage error: {0}")]
    Storage(String),

    /// The board's list page could not be loaded at all. Fails the run.
    #[error("Board '{board}' unreachable: {message}")]
    BoardUnreachable { board: String, message: String },

    /// A mandatory field yielded nothing for every candidate rule.
    /// Skips the item, never the run.
    #[error("Mandatory field missing: {field}")]
    FieldMissing { field: String },

    /// A detail page fetch failed after its retry. Skips the item.
    #[error("Detail fetch failed for {url}: {message}")]
    DetailFetchFailed { url: String, message: String },

    /// The board has no extraction procedure and provisioning did not
    /// produce one. The run is skipped and surfaced for provisioning.
    #[error("Board '{board}' has no extraction procedure")]
    ProcedureMissing { board: String },

    /// The run exceeded its wall-clock budget.
    #[error("Crawl of board '{board}' timed out after {secs}s")]
    Timeout { board: String, secs: u64 },

    /// A run for this board is already in flight.
    #[error("Board '{board}' already has a run in flight")]
    AlreadyRunning { board: String },
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Create a board-unreachable error.
    pub fn unreachable(board: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::BoardUnreachable {
            board: board.into(),
            message: message.to_string(),
        }
    }

    /// Create a missing-field error.
    pub fn field_missing(field: impl Into<String>) -> Self {
        Self::FieldMissing {
            field: field.into(),
        }
    }

    /// Create a detail-fetch error.
    pub fn detail_fetch(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::DetailFetchFailed {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// True for errors worth a second attempt on the same page.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Http(_) | Self::DetailFetchFailed { .. })
    }
}
