//! Scoring configuration
//!
//! The coverage/time split and the per-section cap are product-tunable. The
//! defaults reproduce the published scoring exactly.

use crate::error::EngagementError;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Points awarded for having seen every section
pub const DEFAULT_COVERAGE_WEIGHT: f64 = 40.0;

/// Points awarded for dwelling the full cap on every section
pub const DEFAULT_TIME_WEIGHT: f64 = 60.0;

/// Maximum seconds a single section contributes to the time score
pub const DEFAULT_SECTION_CAP_SEC: f64 = 60.0;

/// Fraction of a section that must be in the viewport to count as visible
pub const DEFAULT_VISIBILITY_THRESHOLD: f64 = 0.5;

/// Configuration for engagement scoring with tunable weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub coverage_weight: f64,
    pub time_weight: f64,
    pub section_cap_sec: f64,
    pub visibility_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            coverage_weight: DEFAULT_COVERAGE_WEIGHT,
            time_weight: DEFAULT_TIME_WEIGHT,
            section_cap_sec: DEFAULT_SECTION_CAP_SEC,
            visibility_threshold: DEFAULT_VISIBILITY_THRESHOLD,
        }
    }
}

impl ScoringConfig {
    /// Load a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, EngagementError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize config to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Check that the weights can produce a score within 0-100
    pub fn validate(&self) -> Result<(), EngagementError> {
        let fail = |msg: String| -> Result<(), EngagementError> {
            warn!(config = ?self, "{msg}");
            Err(EngagementError::InvalidConfig(msg))
        };

        for (name, value) in [
            ("coverage_weight", self.coverage_weight),
            ("time_weight", self.time_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return fail(format!("{name} must be a finite, non-negative number"));
            }
        }
        if self.coverage_weight + self.time_weight > 100.0 {
            return fail(format!(
                "coverage_weight + time_weight must not exceed 100 (got {})",
                self.coverage_weight + self.time_weight
            ));
        }
        if !self.section_cap_sec.is_finite() || self.section_cap_sec <= 0.0 {
            return fail("section_cap_sec must be positive".to_string());
        }
        if !(self.visibility_threshold > 0.0 && self.visibility_threshold <= 1.0) {
            return fail("visibility_threshold must be in (0, 1]".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_is_valid() {
        let config = ScoringConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.coverage_weight + config.time_weight, 100.0);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ScoringConfig::from_json(r#"{ "section_cap_sec": 30.0 }"#).unwrap();
        assert_eq!(
            config,
            ScoringConfig {
                section_cap_sec: 30.0,
                ..ScoringConfig::default()
            }
        );
    }

    #[test]
    fn test_json_roundtrip() {
        let config = ScoringConfig {
            coverage_weight: 50.0,
            time_weight: 50.0,
            ..ScoringConfig::default()
        };
        let json = config.to_json().unwrap();
        assert_eq!(ScoringConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_rejects_overweight() {
        let result = ScoringConfig::from_json(r#"{ "coverage_weight": 60.0, "time_weight": 60.0 }"#);
        assert!(matches!(result, Err(EngagementError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_bad_cap_and_threshold() {
        let zero_cap = ScoringConfig {
            section_cap_sec: 0.0,
            ..ScoringConfig::default()
        };
        assert!(zero_cap.validate().is_err());

        let bad_threshold = ScoringConfig {
            visibility_threshold: 1.5,
            ..ScoringConfig::default()
        };
        assert!(bad_threshold.validate().is_err());

        let negative = ScoringConfig {
            time_weight: -1.0,
            ..ScoringConfig::default()
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            ScoringConfig::from_json("not json"),
            Err(EngagementError::JsonError(_))
        ));
    }
}
