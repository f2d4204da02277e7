//! Feedback reconciliation.
//!
//! Feedback rows are grouped by (pupil, target) and by source. Each source
//! keeps only its highest-ordinal row, and the two sources stay separate so
//! views can show teacher and automatic feedback side by side.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::latest::latest_per_group;
use crate::model::{FeedbackEntry, FeedbackSource, FeedbackTarget};

/// The latest row from one feedback source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFeedback {
    pub score: Option<f64>,
    pub text: Option<String>,
    pub ordinal: u64,
}

impl From<&FeedbackEntry> for SourceFeedback {
    fn from(entry: &FeedbackEntry) -> Self {
        Self {
            score: entry.score,
            text: entry.text.clone(),
            ordinal: entry.ordinal,
        }
    }
}

/// Teacher and automatic feedback for one (pupil, target).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedFeedback {
    pub teacher: Option<SourceFeedback>,
    pub automatic: Option<SourceFeedback>,
}

impl ResolvedFeedback {
    /// Teacher text, falling back to automatic text.
    pub fn text(&self) -> Option<&str> {
        self.teacher
            .as_ref()
            .and_then(|f| f.text.as_deref())
            .or_else(|| self.automatic.as_ref().and_then(|f| f.text.as_deref()))
    }

    /// Teacher rating, falling back to the automatic rating.
    pub fn rating(&self) -> Option<f64> {
        self.teacher
            .as_ref()
            .and_then(|f| f.score)
            .or_else(|| self.automatic.as_ref().and_then(|f| f.score))
    }

    /// Positive feedback means a resolved rating above zero.
    pub fn is_positive(&self) -> bool {
        self.rating().is_some_and(|r| r > 0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.teacher.is_none() && self.automatic.is_none()
    }
}

/// Reconciled feedback for a set of pupils.
#[derive(Debug, Clone, Default)]
pub struct FeedbackIndex {
    resolved: BTreeMap<(String, FeedbackTarget), ResolvedFeedback>,
}

impl FeedbackIndex {
    pub fn reconcile<'a>(entries: impl IntoIterator<Item = &'a FeedbackEntry>) -> Self {
        let latest = latest_per_group(
            entries,
            |e| (e.pupil_id.clone(), e.target.clone(), e.source),
            |e| e.ordinal,
        );

        let mut resolved: BTreeMap<(String, FeedbackTarget), ResolvedFeedback> = BTreeMap::new();
        for ((pupil_id, target, source), entry) in latest {
            let slot = resolved.entry((pupil_id, target)).or_default();
            match source {
                FeedbackSource::Teacher => slot.teacher = Some(entry.into()),
                FeedbackSource::Automatic => slot.automatic = Some(entry.into()),
            }
        }
        Self { resolved }
    }

    pub fn get(&self, pupil_id: &str, target: &FeedbackTarget) -> Option<&ResolvedFeedback> {
        self.resolved.get(&(pupil_id.to_string(), target.clone()))
    }

    pub fn for_criterion(&self, pupil_id: &str, criterion_id: &str) -> Option<&ResolvedFeedback> {
        self.get(pupil_id, &FeedbackTarget::Criterion(criterion_id.to_string()))
    }

    pub fn for_activity(&self, pupil_id: &str, activity_id: &str) -> Option<&ResolvedFeedback> {
        self.get(pupil_id, &FeedbackTarget::Activity(activity_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(
        pupil: &str,
        target: FeedbackTarget,
        source: FeedbackSource,
        score: Option<f64>,
        text: Option<&str>,
        ordinal: u64,
    ) -> FeedbackEntry {
        FeedbackEntry {
            pupil_id: pupil.into(),
            target,
            source,
            score,
            text: text.map(str::to_string),
            ordinal,
        }
    }

    fn crit(id: &str) -> FeedbackTarget {
        FeedbackTarget::Criterion(id.into())
    }

    #[test]
    fn highest_ordinal_wins_per_source() {
        let rows = vec![
            entry("p1", crit("c1"), FeedbackSource::Teacher, Some(1.0), Some("good"), 7),
            entry("p1", crit("c1"), FeedbackSource::Teacher, Some(0.0), Some("redo"), 9),
            entry("p1", crit("c1"), FeedbackSource::Automatic, Some(1.0), Some("auto"), 12),
        ];
        let index = FeedbackIndex::reconcile(&rows);
        let fb = index.for_criterion("p1", "c1").unwrap();

        assert_eq!(fb.teacher.as_ref().unwrap().ordinal, 9);
        assert_eq!(fb.automatic.as_ref().unwrap().ordinal, 12);
        // Teacher wins even though the automatic row is newer.
        assert_eq!(fb.text(), Some("redo"));
        assert_eq!(fb.rating(), Some(0.0));
        assert!(!fb.is_positive());
    }

    #[test]
    fn falls_back_to_automatic_text() {
        let rows = vec![
            entry("p1", crit("c1"), FeedbackSource::Teacher, Some(1.0), None, 3),
            entry("p1", crit("c1"), FeedbackSource::Automatic, None, Some("auto says hi"), 2),
        ];
        let index = FeedbackIndex::reconcile(&rows);
        let fb = index.for_criterion("p1", "c1").unwrap();
        assert_eq!(fb.text(), Some("auto says hi"));
        assert_eq!(fb.rating(), Some(1.0));
        assert!(fb.is_positive());
    }

    #[test]
    fn pupils_and_targets_are_kept_apart() {
        let rows = vec![
            entry("p1", crit("c1"), FeedbackSource::Teacher, Some(1.0), None, 1),
            entry("p2", crit("c1"), FeedbackSource::Teacher, Some(0.0), None, 2),
            entry(
                "p1",
                FeedbackTarget::Activity("c1".into()),
                FeedbackSource::Automatic,
                Some(0.5),
                None,
                3,
            ),
        ];
        let index = FeedbackIndex::reconcile(&rows);
        assert_eq!(index.len(), 3);
        assert!(index.for_criterion("p1", "c1").unwrap().is_positive());
        assert!(!index.for_criterion("p2", "c1").unwrap().is_positive());
        assert_eq!(index.for_activity("p1", "c1").unwrap().rating(), Some(0.5));
        assert!(index.for_criterion("p3", "c1").is_none());
    }

    #[test]
    fn no_feedback_resolves_to_nothing() {
        let fb = ResolvedFeedback::default();
        assert!(fb.is_empty());
        assert_eq!(fb.text(), None);
        assert_eq!(fb.rating(), None);
        assert!(!fb.is_positive());
    }
}
