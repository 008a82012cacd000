//! Engagement score derivation
//!
//! Pure functions turning section coverage and dwell time into a 0-100 score.
//! With the default config the score is split 40/60 between coverage and time.

use crate::config::ScoringConfig;
use crate::types::{EngagementLevel, Millis};

/// Compute the coverage component
///
/// Formula: `(viewed / total) * coverage_weight`
pub fn coverage_score(viewed: usize, total: usize, config: &ScoringConfig) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (viewed as f64 / total as f64) * config.coverage_weight
}

/// Seconds a section contributes, capped at `section_cap_sec`
pub fn capped_seconds(effective_ms: Millis, config: &ScoringConfig) -> f64 {
    (effective_ms as f64 / 1000.0).min(config.section_cap_sec)
}

/// Compute the time component
///
/// Formula: `(sum_capped_sec / (total * section_cap_sec)) * time_weight`
pub fn time_score(sum_capped_sec: f64, total: usize, config: &ScoringConfig) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let max_sec = total as f64 * config.section_cap_sec;
    (sum_capped_sec / max_sec) * config.time_weight
}

/// Round the components into the final score, clamped to 0-100
pub fn combine(coverage: f64, time: f64) -> u8 {
    let total = coverage + time;
    if !total.is_finite() {
        return 0;
    }
    total.round().clamp(0.0, 100.0) as u8
}

impl EngagementLevel {
    /// Bucket a score for widgets that react to interest
    pub fn from_score(score: u8) -> Self {
        match score {
            0 => EngagementLevel::Idle,
            1..=39 => EngagementLevel::Browsing,
            40..=69 => EngagementLevel::Interested,
            _ => EngagementLevel::Engaged,
        }
    }
}
