//! Section visibility tracker
//!
//! Accumulates per-section visible time from viewport visibility events and
//! derives an engagement snapshot on demand. The section set is fixed at
//! construction. Events for unknown sections and repeated states are no-ops.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::config::ScoringConfig;
use crate::error::EngagementError;
use crate::scoring::{capped_seconds, combine, coverage_score, time_score};
use crate::types::{
    EngagementSnapshot, Millis, SectionReport, SectionState, VisibilityEvent,
};

/// Tracks which page sections have been seen and for how long.
///
/// Owned by the page view that created it; drop it when the view ends.
#[derive(Debug, Clone)]
pub struct EngagementTracker {
    sections: Vec<SectionState>,
    index: HashMap<String, usize>,
    config: ScoringConfig,
}

impl EngagementTracker {
    /// Create a tracker with the default scoring config.
    ///
    /// Duplicate identifiers are collapsed, keeping the first occurrence.
    pub fn new<I, S>(section_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut sections = Vec::new();
        let mut index = HashMap::new();

        for id in section_ids {
            let id: String = id.into();
            if index.contains_key(&id) {
                debug!(section_id = %id, "duplicate section id ignored");
                continue;
            }
            index.insert(id.clone(), sections.len());
            sections.push(SectionState::new(id));
        }

        Self {
            sections,
            index,
            config: ScoringConfig::default(),
        }
    }

    /// Create a tracker with custom scoring weights
    pub fn with_config<I, S>(section_ids: I, config: ScoringConfig) -> Result<Self, EngagementError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        config.validate()?;
        let mut tracker = Self::new(section_ids);
        tracker.config = config;
        Ok(tracker)
    }

    /// Record that a section crossed the visibility threshold.
    pub fn on_visibility_change(&mut self, section_id: &str, is_visible: bool, now: Millis) {
        let Some(&idx) = self.index.get(section_id) else {
            debug!(section_id, "visibility change for untracked section ignored");
            return;
        };
        let state = &mut self.sections[idx];

        let changed = if is_visible {
            state.enter_view(now)
        } else {
            state.leave_view(now)
        };

        if changed {
            trace!(
                section_id,
                visible = is_visible,
                now,
                accumulated_ms = state.accumulated_visible_ms,
                "section visibility changed"
            );
        } else {
            debug!(section_id, visible = is_visible, "duplicate visibility event ignored");
        }
    }

    /// Record a raw intersection ratio, resolved against the configured threshold
    pub fn observe_ratio(&mut self, section_id: &str, ratio: f64, now: Millis) {
        if !ratio.is_finite() {
            debug!(section_id, ratio, "non-finite intersection ratio ignored");
            return;
        }
        let visible = ratio >= self.config.visibility_threshold;
        self.on_visibility_change(section_id, visible, now);
    }

    /// Apply a recorded visibility event
    pub fn apply(&mut self, event: &VisibilityEvent) {
        match event.resolve_visibility(self.config.visibility_threshold) {
            Some(visible) => self.on_visibility_change(&event.section_id, visible, event.timestamp_ms),
            None => debug!(section_id = %event.section_id, "event without visibility signal ignored"),
        }
    }

    /// Discard all accumulated state, keeping the section set and config
    pub fn reset(&mut self) {
        for state in &mut self.sections {
            *state = SectionState::new(std::mem::take(&mut state.section_id));
        }
        debug!(sections = self.sections.len(), "tracker reset");
    }

    /// Derive the engagement snapshot at `now`.
    ///
    /// Open intervals count toward the score but are not folded into state.
    pub fn compute_snapshot(&self, now: Millis) -> EngagementSnapshot {
        let total = self.sections.len();
        if total == 0 {
            return EngagementSnapshot::default();
        }

        let viewed_section_ids: Vec<String> = self
            .sections
            .iter()
            .filter(|s| s.entered_view_at_least_once)
            .map(|s| s.section_id.clone())
            .collect();

        let sum_capped_sec: f64 = self
            .sections
            .iter()
            .map(|s| capped_seconds(s.effective_visible_ms(now), &self.config))
            .sum();

        let coverage = coverage_score(viewed_section_ids.len(), total, &self.config);
        let time = time_score(sum_capped_sec, total, &self.config);

        EngagementSnapshot {
            score: combine(coverage, time),
            viewed_section_ids,
        }
    }

    /// Per-section breakdown at `now`, in page order
    pub fn section_reports(&self, now: Millis) -> Vec<SectionReport> {
        self.sections
            .iter()
            .map(|s| {
                let effective_visible_ms = s.effective_visible_ms(now);
                SectionReport {
                    section_id: s.section_id.clone(),
                    visibility: s.visibility(),
                    viewed: s.entered_view_at_least_once,
                    accumulated_visible_ms: s.accumulated_visible_ms,
                    effective_visible_ms,
                    capped_seconds: capped_seconds(effective_visible_ms, &self.config),
                }
            })
            .collect()
    }

    /// Sections never seen yet, in page order
    pub fn unviewed_section_ids(&self) -> Vec<&str> {
        self.sections
            .iter()
            .filter(|s| !s.entered_view_at_least_once)
            .map(|s| s.section_id.as_str())
            .collect()
    }

    pub fn section(&self, section_id: &str) -> Option<&SectionState> {
        self.index.get(section_id).map(|&idx| &self.sections[idx])
    }

    pub fn sections(&self) -> &[SectionState] {
        &self.sections
    }

    pub fn section_ids(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.section_id.as_str())
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SectionVisibility;
    use pretty_assertions::assert_eq;

    const PAGE: [&str; 5] = ["about", "skills", "projects", "experience", "contact"];

    #[test]
    fn test_duplicate_show_is_idempotent() {
        let mut tracker = EngagementTracker::new(["about"]);
        tracker.on_visibility_change("about", true, 0);
        tracker.on_visibility_change("about", true, 2_000);
        tracker.on_visibility_change("about", false, 5_000);

        let about = tracker.section("about").unwrap();
        assert_eq!(about.accumulated_visible_ms(), 5_000);
        assert!(about.entered_view_at_least_once());
    }

    #[test]
    fn test_duplicate_hide_is_idempotent() {
        let mut tracker = EngagementTracker::new(["about"]);
        tracker.on_visibility_change("about", true, 0);
        tracker.on_visibility_change("about", false, 5_000);
        tracker.on_visibility_change("about", false, 9_000);

        assert_eq!(tracker.section("about").unwrap().accumulated_visible_ms(), 5_000);
    }

    #[test]
    fn test_hide_before_show_is_noop() {
        let mut tracker = EngagementTracker::new(["about"]);
        tracker.on_visibility_change("about", false, 5_000);

        let about = tracker.section("about").unwrap();
        assert_eq!(about.accumulated_visible_ms(), 0);
        assert!(!about.entered_view_at_least_once());
        assert_eq!(about.visibility(), SectionVisibility::Hidden);
    }

    #[test]
    fn test_latch_survives_hide() {
        let mut tracker = EngagementTracker::new(["about"]);
        tracker.on_visibility_change("about", true, 0);
        tracker.on_visibility_change("about", false, 100);
        tracker.on_visibility_change("about", false, 200);

        assert!(tracker.section("about").unwrap().entered_view_at_least_once());
    }

    #[test]
    fn test_accumulation_holds_until_next_show() {
        let mut tracker = EngagementTracker::new(["about"]);
        tracker.on_visibility_change("about", true, 0);
        tracker.on_visibility_change("about", false, 5_000);

        assert_eq!(tracker.section("about").unwrap().accumulated_visible_ms(), 5_000);
        let _ = tracker.compute_snapshot(1_000_000);
        assert_eq!(tracker.section("about").unwrap().accumulated_visible_ms(), 5_000);

        tracker.on_visibility_change("about", true, 10_000);
        tracker.on_visibility_change("about", false, 12_500);
        assert_eq!(tracker.section("about").unwrap().accumulated_visible_ms(), 7_500);
    }

    #[test]
    fn test_cap_enforced_for_long_dwell() {
        let mut tracker = EngagementTracker::new(["about"]);
        tracker.on_visibility_change("about", true, 0);
        tracker.on_visibility_change("about", false, 120_000);

        let reports = tracker.section_reports(120_000);
        assert_eq!(reports[0].capped_seconds, 60.0);
        // One section at full cap and full coverage
        assert_eq!(tracker.compute_snapshot(120_000).score, 100);
    }

    #[test]
    fn test_cap_enforced_against_other_sections() {
        let mut tracker = EngagementTracker::new(["about", "projects"]);
        tracker.on_visibility_change("about", true, 0);
        tracker.on_visibility_change("about", false, 120_000);

        // coverage = 20, time = (60 / 120) * 60 = 30
        assert_eq!(tracker.compute_snapshot(120_000).score, 50);
    }

    #[test]
    fn test_empty_tracker_is_inert() {
        let mut tracker = EngagementTracker::new(Vec::<String>::new());
        tracker.on_visibility_change("about", true, 0);

        assert!(tracker.is_empty());
        for now in [0, 1, 60_000, Millis::MAX] {
            assert_eq!(tracker.compute_snapshot(now), EngagementSnapshot::default());
        }
    }

    #[test]
    fn test_unknown_id_leaves_state_unchanged() {
        let mut tracker = EngagementTracker::new(["about", "projects"]);
        let before = tracker.sections().to_vec();

        tracker.on_visibility_change("nonexistent", true, 1_000);
        tracker.on_visibility_change("nonexistent", false, 2_000);

        assert_eq!(tracker.sections(), before.as_slice());
    }

    #[test]
    fn test_snapshot_is_pure_with_open_interval() {
        let mut tracker = EngagementTracker::new(["about", "projects"]);
        tracker.on_visibility_change("about", true, 0);

        let first = tracker.compute_snapshot(30_000);
        let second = tracker.compute_snapshot(30_000);
        assert_eq!(first, second);

        let about = tracker.section("about").unwrap();
        assert_eq!(about.accumulated_visible_ms(), 0);
        assert_eq!(about.last_became_visible_at(), Some(0));
        assert!(about.is_currently_visible());

        // coverage = 20, time = (30 / 120) * 60 = 15
        assert_eq!(first.score, 35);
    }

    #[test]
    fn test_end_to_end_scenario() {
        let mut tracker = EngagementTracker::new(PAGE);
        tracker.on_visibility_change("about", true, 0);
        tracker.on_visibility_change("skills", true, 2_000);
        tracker.on_visibility_change("skills", false, 8_000);
        tracker.on_visibility_change("about", false, 10_000);

        let snapshot = tracker.compute_snapshot(20_000);
        assert_eq!(snapshot.viewed_section_ids, vec!["about", "skills"]);
        assert_eq!(snapshot.score, 19);
    }

    #[test]
    fn test_viewed_ids_follow_page_order() {
        let mut tracker = EngagementTracker::new(PAGE);
        tracker.on_visibility_change("contact", true, 0);
        tracker.on_visibility_change("about", true, 10);

        let snapshot = tracker.compute_snapshot(20);
        assert_eq!(snapshot.viewed_section_ids, vec!["about", "contact"]);
        assert_eq!(tracker.unviewed_section_ids(), vec!["skills", "projects", "experience"]);
    }

    #[test]
    fn test_full_coverage_boundary() {
        let mut tracker = EngagementTracker::new(PAGE);
        for (i, id) in PAGE.iter().enumerate() {
            let start = i as Millis * 1_000;
            tracker.on_visibility_change(id, true, start);
            tracker.on_visibility_change(id, false, start + 60_000);
        }
        assert_eq!(tracker.compute_snapshot(500_000).score, 100);
    }

    #[test]
    fn test_full_coverage_with_open_intervals() {
        let mut tracker = EngagementTracker::new(PAGE);
        for id in PAGE {
            tracker.on_visibility_change(id, true, 0);
        }
        assert_eq!(tracker.compute_snapshot(59_999).score, 100);
        assert_eq!(tracker.compute_snapshot(90_000).score, 100);
    }

    #[test]
    fn test_duplicate_construction_ids_collapse() {
        let tracker = EngagementTracker::new(["about", "skills", "about"]);
        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.section_ids().collect::<Vec<_>>(), vec!["about", "skills"]);
    }

    #[test]
    fn test_observe_ratio_uses_threshold() {
        let mut tracker = EngagementTracker::new(["about"]);
        tracker.observe_ratio("about", 0.3, 0);
        assert!(!tracker.section("about").unwrap().is_currently_visible());

        tracker.observe_ratio("about", 0.5, 1_000);
        assert!(tracker.section("about").unwrap().is_currently_visible());

        tracker.observe_ratio("about", f64::NAN, 2_000);
        assert!(tracker.section("about").unwrap().is_currently_visible());

        tracker.observe_ratio("about", 0.1, 4_000);
        assert_eq!(tracker.section("about").unwrap().accumulated_visible_ms(), 3_000);
    }

    #[test]
    fn test_custom_config() {
        let config = ScoringConfig {
            section_cap_sec: 10.0,
            ..ScoringConfig::default()
        };
        let mut tracker = EngagementTracker::with_config(["about", "skills"], config).unwrap();
        tracker.on_visibility_change("about", true, 0);
        tracker.on_visibility_change("about", false, 10_000);

        // coverage = 20, time = (10 / 20) * 60 = 30
        assert_eq!(tracker.compute_snapshot(10_000).score, 50);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ScoringConfig {
            visibility_threshold: 0.0,
            ..ScoringConfig::default()
        };
        assert!(EngagementTracker::with_config(["about"], config).is_err());
    }

    #[test]
    fn test_reset_clears_state() {
        let mut tracker = EngagementTracker::new(["about", "skills"]);
        tracker.on_visibility_change("about", true, 0);
        tracker.on_visibility_change("skills", true, 0);
        tracker.on_visibility_change("skills", false, 4_000);
        tracker.reset();

        assert_eq!(tracker.section_ids().collect::<Vec<_>>(), vec!["about", "skills"]);
        assert_eq!(tracker.compute_snapshot(10_000), EngagementSnapshot::default());
        assert!(!tracker.section("about").unwrap().is_currently_visible());
        assert_eq!(tracker.section("skills").unwrap().accumulated_visible_ms(), 0);
    }

    #[test]
    fn test_apply_events() {
        let mut tracker = EngagementTracker::new(["about"]);
        tracker.apply(&VisibilityEvent::shown("about", 0));
        tracker.apply(&VisibilityEvent::with_ratio("about", 0.2, 4_000));

        assert_eq!(tracker.section("about").unwrap().accumulated_visible_ms(), 4_000);
    }
}
