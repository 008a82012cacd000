//! Engagement data types
//!
//! This module defines the per-section state table, the visibility events that
//! drive it, and the derived snapshot and report shapes handed to UI widgets.

use serde::{Deserialize, Serialize};

/// Milliseconds on the host's clock. The tracker never reads a clock itself.
pub type Millis = u64;

/// Per-section visibility state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionVisibility {
    #[default]
    Hidden,
    Visible,
}

/// Tracked state of one page section.
///
/// Only the tracker builds and mutates these, so `last_became_visible_at` is
/// set exactly while the section is visible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionState {
    pub(crate) section_id: String,
    pub(crate) is_currently_visible: bool,
    pub(crate) entered_view_at_least_once: bool,
    pub(crate) accumulated_visible_ms: Millis,
    pub(crate) last_became_visible_at: Option<Millis>,
}

impl SectionState {
    pub(crate) fn new(section_id: String) -> Self {
        Self {
            section_id,
            is_currently_visible: false,
            entered_view_at_least_once: false,
            accumulated_visible_ms: 0,
            last_became_visible_at: None,
        }
    }

    pub fn section_id(&self) -> &str {
        &self.section_id
    }

    pub fn is_currently_visible(&self) -> bool {
        self.is_currently_visible
    }

    pub fn entered_view_at_least_once(&self) -> bool {
        self.entered_view_at_least_once
    }

    /// Total of closed visibility intervals. Open intervals are not included.
    pub fn accumulated_visible_ms(&self) -> Millis {
        self.accumulated_visible_ms
    }

    pub fn last_became_visible_at(&self) -> Option<Millis> {
        self.last_became_visible_at
    }

    pub fn visibility(&self) -> SectionVisibility {
        if self.is_currently_visible {
            SectionVisibility::Visible
        } else {
            SectionVisibility::Hidden
        }
    }

    /// Length of the currently open interval at `now`, or 0 when hidden
    pub fn open_interval_ms(&self, now: Millis) -> Millis {
        self.last_became_visible_at
            .map(|since| now.saturating_sub(since))
            .unwrap_or(0)
    }

    /// Closed intervals plus the open one, without closing it
    pub fn effective_visible_ms(&self, now: Millis) -> Millis {
        self.accumulated_visible_ms
            .saturating_add(self.open_interval_ms(now))
    }

    /// Hidden -> Visible. Returns false when already visible.
    pub(crate) fn enter_view(&mut self, now: Millis) -> bool {
        if self.is_currently_visible {
            return false;
        }
        self.is_currently_visible = true;
        self.entered_view_at_least_once = true;
        self.last_became_visible_at = Some(now);
        true
    }

    /// Visible -> Hidden, folding the open interval. Returns false when already hidden.
    pub(crate) fn leave_view(&mut self, now: Millis) -> bool {
        if !self.is_currently_visible {
            return false;
        }
        let elapsed = self.open_interval_ms(now);
        self.accumulated_visible_ms = self.accumulated_visible_ms.saturating_add(elapsed);
        self.is_currently_visible = false;
        self.last_became_visible_at = None;
        true
    }
}

/// A single observation from the host's viewport-intersection primitive.
///
/// Producers report either a resolved `visible` flag or the raw
/// `intersection_ratio`; when both are present the flag wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityEvent {
    /// Identifier of the page region (usually its DOM id)
    pub section_id: String,
    /// Whether the section crossed into (true) or out of (false) view
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    /// Fraction of the section inside the viewport (0-1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intersection_ratio: Option<f64>,
    /// Host clock time of the observation
    #[serde(alias = "timestamp", alias = "now")]
    pub timestamp_ms: Millis,
}

impl VisibilityEvent {
    pub fn shown(section_id: impl Into<String>, timestamp_ms: Millis) -> Self {
        Self {
            section_id: section_id.into(),
            visible: Some(true),
            intersection_ratio: None,
            timestamp_ms,
        }
    }

    pub fn hidden(section_id: impl Into<String>, timestamp_ms: Millis) -> Self {
        Self {
            section_id: section_id.into(),
            visible: Some(false),
            intersection_ratio: None,
            timestamp_ms,
        }
    }

    pub fn with_ratio(section_id: impl Into<String>, ratio: f64, timestamp_ms: Millis) -> Self {
        Self {
            section_id: section_id.into(),
            visible: None,
            intersection_ratio: Some(ratio),
            timestamp_ms,
        }
    }

    /// Resolve to a visible flag given the configured threshold.
    /// Returns `None` when the event carries no usable signal.
    pub fn resolve_visibility(&self, threshold: f64) -> Option<bool> {
        match (self.visible, self.intersection_ratio) {
            (Some(flag), _) => Some(flag),
            (None, Some(ratio)) if ratio.is_finite() => Some(ratio >= threshold),
            _ => None,
        }
    }
}

/// A recorded page view: the tracked sections plus the events observed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibilitySession {
    /// Page view identifier
    #[serde(default = "default_session_id")]
    pub session_id: String,
    /// Tracked section identifiers, in page order
    pub sections: Vec<String>,
    /// Observed visibility events
    #[serde(default)]
    pub events: Vec<VisibilityEvent>,
}

fn default_session_id() -> String {
    "anonymous".to_string()
}

/// Derived engagement view, recomputed on demand
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementSnapshot {
    /// Engagement score (0-100)
    pub score: u8,
    /// Sections that have been in view at least once, in page order
    pub viewed_section_ids: Vec<String>,
}

/// Coarse engagement bucket for widgets that gate on interest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementLevel {
    /// Score 0
    Idle,
    /// Score 1-39
    Browsing,
    /// Score 40-69
    Interested,
    /// Score 70-100
    Engaged,
}

/// Per-section breakdown included in reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionReport {
    pub section_id: String,
    pub visibility: SectionVisibility,
    pub viewed: bool,
    pub accumulated_visible_ms: Millis,
    /// Accumulated time plus the open interval at report time
    pub effective_visible_ms: Millis,
    /// Seconds this section contributes to the time score
    pub capped_seconds: f64,
}

/// Report producer metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Versioned engagement report payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementReport {
    pub report_version: String,
    pub producer: ReportProducer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Wall-clock time the report was built (RFC3339)
    pub computed_at_utc: String,
    /// Host clock time the snapshot was taken at
    pub observed_at_ms: Millis,
    pub snapshot: EngagementSnapshot,
    pub level: EngagementLevel,
    pub sections: Vec<SectionReport>,
}
