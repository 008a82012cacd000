//! Visibility event adapter
//!
//! Parses recorded page views and event streams, and replays them into a tracker.

use tracing::info;

use crate::config::ScoringConfig;
use crate::error::EngagementError;
use crate::tracker::EngagementTracker;
use crate::types::{Millis, VisibilityEvent, VisibilitySession};

/// Parse a recorded page view
pub fn parse_session(json: &str) -> Result<VisibilitySession, EngagementError> {
    serde_json::from_str(json)
        .map_err(|e| EngagementError::ParseError(format!("Failed to parse visibility session: {}", e)))
}

/// Parse newline-delimited events, skipping blank lines
pub fn parse_events_ndjson(text: &str) -> Result<Vec<VisibilityEvent>, EngagementError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line.trim()).map_err(|e| {
                EngagementError::ParseError(format!("Line {}: {}", n + 1, e))
            })
        })
        .collect()
}

/// Parse a JSON array of events
pub fn parse_events_array(json: &str) -> Result<Vec<VisibilityEvent>, EngagementError> {
    serde_json::from_str(json)
        .map_err(|e| EngagementError::ParseError(format!("Failed to parse event array: {}", e)))
}

/// Check that an event carries a usable visibility signal
pub fn validate_event(event: &VisibilityEvent) -> Result<(), EngagementError> {
    if event.section_id.trim().is_empty() {
        return Err(EngagementError::InvalidEvent(
            "section_id must not be empty".to_string(),
        ));
    }
    match (event.visible, event.intersection_ratio) {
        (None, None) => Err(EngagementError::InvalidEvent(format!(
            "event for '{}' has neither visible nor intersection_ratio",
            event.section_id
        ))),
        (None, Some(ratio)) if !ratio.is_finite() || !(0.0..=1.0).contains(&ratio) => {
            Err(EngagementError::InvalidEvent(format!(
                "intersection_ratio {} for '{}' is outside [0, 1]",
                ratio, event.section_id
            )))
        }
        _ => Ok(()),
    }
}

/// Failed validation for one event in a stream
#[derive(Debug)]
pub struct EventValidationFailure {
    pub index: usize,
    pub section_id: String,
    pub error: EngagementError,
}

/// Validate a stream, returning only the failures
pub fn validate_events(events: &[VisibilityEvent]) -> Vec<EventValidationFailure> {
    events
        .iter()
        .enumerate()
        .filter_map(|(index, event)| {
            validate_event(event).err().map(|error| EventValidationFailure {
                index,
                section_id: event.section_id.clone(),
                error,
            })
        })
        .collect()
}

/// Build a tracker from a session and replay its events in timestamp order.
///
/// Events with equal timestamps keep their recorded order.
pub fn replay(
    session: &VisibilitySession,
    config: ScoringConfig,
) -> Result<EngagementTracker, EngagementError> {
    let mut tracker = EngagementTracker::with_config(session.sections.iter().cloned(), config)?;

    let mut events: Vec<&VisibilityEvent> = session.events.iter().collect();
    events.sort_by_key(|e| e.timestamp_ms);

    for event in &events {
        tracker.apply(event);
    }

    info!(
        session_id = %session.session_id,
        sections = tracker.len(),
        events = events.len(),
        "replayed visibility session"
    );

    Ok(tracker)
}

/// Latest event timestamp in a session, if any
pub fn last_event_time(session: &VisibilitySession) -> Option<Millis> {
    session.events.iter().map(|e| e.timestamp_ms).max()
}
