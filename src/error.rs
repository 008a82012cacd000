//! Error types for Folio Engage
//!
//! Tracker operations are total and never fail. Errors only arise at the
//! edges: parsing recorded sessions, validating configuration, encoding reports.

use thiserror::Error;

/// Errors that can occur while ingesting, configuring, or encoding
#[derive(Debug, Error)]
pub enum EngagementError {
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid visibility event: {0}")]
    InvalidEvent(String),

    #[error("Invalid scoring config: {0}")]
    InvalidConfig(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
