//! Engagement pipeline orchestration
//!
//! This module provides the public API for engagement processing, from
//! recorded session JSON or live events to snapshots and JSON reports.

use crate::adapter::{last_event_time, parse_session, replay};
use crate::config::ScoringConfig;
use crate::encoder::ReportEncoder;
use crate::error::EngagementError;
use crate::tracker::EngagementTracker;
use crate::types::{EngagementSnapshot, Millis, VisibilityEvent};

/// Convert a recorded session JSON to a report JSON (stateless, one-shot).
///
/// # Arguments
/// * `session_json` - Recorded visibility session JSON
/// * `now` - Evaluation time; defaults to the latest event timestamp
///
/// # Example
/// ```ignore
/// let report_json = session_to_report(session_json, Some(20_000))?;
/// ```
pub fn session_to_report(session_json: &str, now: Option<Millis>) -> Result<String, EngagementError> {
    session_to_report_with_config(session_json, now, ScoringConfig::default())
}

/// Same as [`session_to_report`] with custom scoring weights
pub fn session_to_report_with_config(
    session_json: &str,
    now: Option<Millis>,
    config: ScoringConfig,
) -> Result<String, EngagementError> {
    // Stage 1: Parse session JSON
    let session = parse_session(session_json)?;

    // Stage 2: Replay events into a fresh tracker
    let tracker = replay(&session, config)?;

    // Stage 3: Encode the report
    let now = now.or_else(|| last_event_time(&session)).unwrap_or(0);
    ReportEncoder::new().encode_to_json(&tracker, Some(&session.session_id), now)
}

/// Stateful processor for a live page view.
///
/// Owns the tracker for the life of the view; call [`reset`](Self::reset)
/// when the host starts a new one.
pub struct EngagementProcessor {
    tracker: EngagementTracker,
    encoder: ReportEncoder,
}

impl EngagementProcessor {
    /// Create a processor with default scoring
    pub fn new<I, S>(section_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tracker = EngagementTracker::new(section_ids);
        Self::from_tracker(tracker)
    }

    /// Create a processor with custom scoring weights
    pub fn with_config<I, S>(section_ids: I, config: ScoringConfig) -> Result<Self, EngagementError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tracker = EngagementTracker::with_config(section_ids, config)?;
        Ok(Self::from_tracker(tracker))
    }

    fn from_tracker(tracker: EngagementTracker) -> Self {
        Self {
            tracker,
            encoder: ReportEncoder::new(),
        }
    }

    /// Feed one visibility event
    pub fn push_event(&mut self, event: &VisibilityEvent) {
        self.tracker.apply(event);
    }

    /// Feed one visibility event encoded as JSON
    pub fn push_event_json(&mut self, event_json: &str) -> Result<(), EngagementError> {
        let event: VisibilityEvent = serde_json::from_str(event_json)?;
        self.push_event(&event);
        Ok(())
    }

    /// Current snapshot at `now`
    pub fn snapshot(&self, now: Millis) -> EngagementSnapshot {
        self.tracker.compute_snapshot(now)
    }

    /// Full report at `now` as JSON
    pub fn report_json(&self, now: Millis) -> Result<String, EngagementError> {
        self.encoder.encode_to_json(&self.tracker, None, now)
    }

    /// Start a new page view with the same sections and weights
    pub fn reset(&mut self) {
        self.tracker.reset();
    }

    pub fn tracker(&self) -> &EngagementTracker {
        &self.tracker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_session_json() -> &'static str {
        r#"{
            "session_id": "view-123",
            "sections": ["about", "skills", "projects", "experience", "contact"],
            "events": [
                { "section_id": "about", "visible": true, "timestamp_ms": 0 },
                { "section_id": "skills", "visible": true, "timestamp_ms": 2000 },
                { "section_id": "skills", "visible": false, "timestamp_ms": 8000 },
                { "section_id": "about", "visible": false, "timestamp_ms": 10000 }
            ]
        }"#
    }

    #[test]
    fn test_session_to_report_stateless() {
        let json = session_to_report(sample_session_json(), Some(20_000)).unwrap();
        let payload: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(payload["session_id"], "view-123");
        assert_eq!(payload["snapshot"]["score"], 19);
        assert_eq!(payload["observed_at_ms"], 20_000);
        assert_eq!(payload["producer"]["name"], "folio-engage");
    }

    #[test]
    fn test_session_to_report_defaults_now() {
        let json = session_to_report(sample_session_json(), None).unwrap();
        let payload: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(payload["observed_at_ms"], 10_000);
        assert_eq!(payload["snapshot"]["score"], 19);
    }

    #[test]
    fn test_session_to_report_without_sections() {
        let json = session_to_report(r#"{ "sections": [], "events": [] }"#, None).unwrap();
        let payload: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(payload["snapshot"]["score"], 0);
        assert_eq!(payload["snapshot"]["viewed_section_ids"], serde_json::json!([]));
        assert_eq!(payload["level"], "idle");
    }

    #[test]
    fn test_session_to_report_invalid_json() {
        assert!(session_to_report("not valid json", None).is_err());
    }

    #[test]
    fn test_session_to_report_rejects_bad_config() {
        let config = ScoringConfig {
            coverage_weight: 80.0,
            ..ScoringConfig::default()
        };
        let result = session_to_report_with_config(sample_session_json(), None, config);
        assert!(matches!(result, Err(EngagementError::InvalidConfig(_))));
    }

    #[test]
    fn test_processor_live_events() {
        let mut processor = EngagementProcessor::new(["about", "projects"]);
        processor
            .push_event_json(r#"{ "section_id": "about", "visible": true, "timestamp_ms": 0 }"#)
            .unwrap();

        let open = processor.snapshot(30_000);
        assert_eq!(open.viewed_section_ids, vec!["about"]);
        assert_eq!(open.score, 35);

        processor.push_event(&VisibilityEvent::hidden("about", 30_000));
        assert_eq!(processor.snapshot(90_000), open);
    }

    #[test]
    fn test_processor_rejects_malformed_event() {
        let mut processor = EngagementProcessor::new(["about"]);
        assert!(matches!(
            processor.push_event_json("{"),
            Err(EngagementError::JsonError(_))
        ));
    }

    #[test]
    fn test_processor_reset_keeps_sections_and_config() {
        let config = ScoringConfig {
            section_cap_sec: 10.0,
            ..ScoringConfig::default()
        };
        let mut processor = EngagementProcessor::with_config(["about", "skills"], config).unwrap();
        processor.push_event(&VisibilityEvent::shown("about", 0));
        processor.reset();

        assert_eq!(processor.snapshot(5_000), EngagementSnapshot::default());
        assert_eq!(processor.tracker().len(), 2);
        assert_eq!(processor.tracker().config().section_cap_sec, 10.0);
    }

    #[test]
    fn test_processor_report_json() {
        let processor = EngagementProcessor::new(["about"]);
        let payload: serde_json::Value =
            serde_json::from_str(&processor.report_json(0).unwrap()).unwrap();
        assert_eq!(payload["level"], "idle");
        assert_eq!(payload["sections"][0]["section_id"], "about");
    }
}
