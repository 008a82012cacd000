//! Folio Engage - Section engagement tracking for single-page portfolio sites
//!
//! Engage turns viewport visibility events into an engagement score through a
//! small deterministic pipeline: event adaptation → per-section accumulation
//! → score derivation → report encoding.
//!
//! ## Modules
//!
//! - **Tracker**: Per-section visible time and the viewed-section latch
//! - **Scoring**: Coverage and dwell-time components of the 0-100 score
//! - **Pipeline**: One-shot session replay and a stateful live processor

pub mod adapter;
pub mod config;
pub mod encoder;
pub mod error;
pub mod pipeline;
pub mod scoring;
pub mod tracker;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::ScoringConfig;
pub use error::EngagementError;
pub use pipeline::{session_to_report, EngagementProcessor};
pub use tracker::EngagementTracker;
pub use types::{
    EngagementLevel, EngagementReport, EngagementSnapshot, Millis, SectionState,
    SectionVisibility, VisibilityEvent, VisibilitySession,
};

/// Engage version embedded in all reports
pub const ENGAGE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "folio-engage";
