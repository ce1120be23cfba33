// src/models/mod.rs

//! Domain models for the crawler.
//!
//! This module contains all data structures used throughout the
//! application, organized by their primary purpose.

mod board;
mod config;
mod posting;
mod procedure;
mod run;

// Re-export all public types
pub use board::{Board, BoardRegistry};
pub use config::{AttachmentConfig, Config, CrawlerConfig, ExtractionConfig, LimitsConfig};
pub use posting::{fingerprint, Posting};
pub use procedure::{
    AttachmentRules, DetailRules, ExtractionProcedure, FieldRule, ListRules, RegionRule,
};
pub use run::{CrawlRun, RunCounts, RunStatus};
