//! Engagement report encoder
//!
//! Encodes a tracker's state at a point in time into a versioned JSON report.

use chrono::Utc;
use uuid::Uuid;

use crate::error::EngagementError;
use crate::tracker::EngagementTracker;
use crate::types::{EngagementLevel, EngagementReport, Millis, ReportProducer};
use crate::{ENGAGE_VERSION, PRODUCER_NAME};

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

/// Engagement report encoder
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Encode the tracker state at `now` into a report
    pub fn encode(
        &self,
        tracker: &EngagementTracker,
        session_id: Option<&str>,
        now: Millis,
    ) -> EngagementReport {
        let snapshot = tracker.compute_snapshot(now);
        let level = EngagementLevel::from_score(snapshot.score);

        EngagementReport {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: ENGAGE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            session_id: session_id.map(str::to_string),
            computed_at_utc: Utc::now().to_rfc3339(),
            observed_at_ms: now,
            snapshot,
            level,
            sections: tracker.section_reports(now),
        }
    }

    /// Encode to a pretty-printed JSON string
    pub fn encode_to_json(
        &self,
        tracker: &EngagementTracker,
        session_id: Option<&str>,
        now: Millis,
    ) -> Result<String, EngagementError> {
        let report = self.encode(tracker, session_id, now);
        serde_json::to_string_pretty(&report).map_err(|e| EngagementError::EncodingError(e.to_string()))
    }
}
