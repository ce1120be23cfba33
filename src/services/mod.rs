// src/services/mod.rs

//! Extraction services: page extraction, attachment URL resolution,
//! and the procedure provisioning boundary.

pub mod attachments;
pub mod extractor;
pub mod provision;

pub use extractor::{Attachment, DetailFields, Extractor, ListItem, MatchedRule};
pub use provision::{CmsPattern, PatternProvider, ProcedureProvider};
