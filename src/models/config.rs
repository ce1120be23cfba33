// src/models/config.rs

//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Per-run pagination and item caps
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Extraction plausibility thresholds
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Attachment URL resolution settings
    #[serde(default)]
    pub attachments: AttachmentConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        if self.crawler.run_timeout_secs == 0 {
            return Err(AppError::validation("crawler.run_timeout_secs must be > 0"));
        }
        if self.limits.page_cap == 0 {
            return Err(AppError::validation("limits.page_cap must be > 0"));
        }
        if self.limits.item_cap == 0 {
            return Err(AppError::validation("limits.item_cap must be > 0"));
        }
        if self.extraction.min_body_chars == 0 {
            return Err(AppError::validation("extraction.min_body_chars must be > 0"));
        }
        Ok(())
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Delay between requests within one board run, in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Maximum board runs in flight at once
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Backoff before the single retry of a failed detail fetch
    #[serde(default = "defaults::detail_retry_delay")]
    pub detail_retry_delay_ms: u64,

    /// Wall-clock budget for one board run, in seconds
    #[serde(default = "defaults::run_timeout")]
    pub run_timeout_secs: u64,

    /// Minimum minutes between two runs of the same board
    #[serde(default = "defaults::crawl_interval")]
    pub crawl_interval_mins: i64,

    /// Stored postings younger than this are not re-fetched
    #[serde(default = "defaults::staleness")]
    pub staleness_hours: i64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            max_concurrent: defaults::max_concurrent(),
            detail_retry_delay_ms: defaults::detail_retry_delay(),
            run_timeout_secs: defaults::run_timeout(),
            crawl_interval_mins: defaults::crawl_interval(),
            staleness_hours: defaults::staleness(),
        }
    }
}

/// Pagination and item caps for one board run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum list pages fetched per run
    #[serde(default = "defaults::page_cap")]
    pub page_cap: usize,

    /// Maximum candidate items per run
    #[serde(default = "defaults::item_cap")]
    pub item_cap: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            page_cap: defaults::page_cap(),
            item_cap: defaults::item_cap(),
        }
    }
}

/// Minimum lengths a matched value must have to be plausible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Minimum characters for a plausible title
    #[serde(default = "defaults::min_title_chars")]
    pub min_title_chars: usize,

    /// Minimum characters for a plausible body; rejects near-empty
    /// wrapper matches
    #[serde(default = "defaults::min_body_chars")]
    pub min_body_chars: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_title_chars: defaults::min_title_chars(),
            min_body_chars: defaults::min_body_chars(),
        }
    }
}

/// Attachment URL resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentConfig {
    /// Proxy endpoint that streams origin files past hotlink
    /// protection. Fragment fallback is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_base: Option<String>,

    /// Filename hint used when the source displays none
    #[serde(default = "defaults::default_filename")]
    pub default_filename: String,
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            proxy_base: None,
            default_filename: defaults::default_filename(),
        }
    }
}

mod defaults {
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; gongo/1.0)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn request_delay() -> u64 {
        200
    }
    pub fn max_concurrent() -> usize {
        4
    }
    pub fn detail_retry_delay() -> u64 {
        500
    }
    pub fn run_timeout() -> u64 {
        300
    }
    pub fn crawl_interval() -> i64 {
        60
    }
    pub fn staleness() -> i64 {
        0
    }
    pub fn page_cap() -> usize {
        5
    }
    pub fn item_cap() -> usize {
        100
    }
    pub fn min_title_chars() -> usize {
        2
    }
    pub fn min_body_chars() -> usize {
        20
    }
    pub fn default_filename() -> String {
        "attachment".into()
    }
}
