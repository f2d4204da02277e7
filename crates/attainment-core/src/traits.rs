//! Core trait definitions for the storage collaborator and level lookup.
//!
//! Stores live outside the core (see the `attainment-store` crate). The
//! level-label table is likewise external and consumed as a pure function.

use async_trait::async_trait;
use uuid::Uuid;

use crate::model::{
    Activity, Curriculum, FeedbackDraft, FeedbackEntry, Pupil, Submission, Unit,
};

// ---------------------------------------------------------------------------
// Storage collaborator
// ---------------------------------------------------------------------------

/// Read and write access to activities, submissions and feedback.
///
/// Lookups of a single record return `Ok(None)` when it is absent; list
/// lookups for an unknown unit should fail with
/// [`ProgressError::NotFound`](crate::error::ProgressError) wrapped in
/// `anyhow`, which the engine downcasts.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Human-readable store name (e.g. "memory").
    fn name(&self) -> &str;

    async fn unit(&self, unit_id: &str) -> anyhow::Result<Option<Unit>>;

    /// All units taught for a subject.
    async fn units_for_subject(&self, subject: &str) -> anyhow::Result<Vec<Unit>>;

    /// The curriculum rows reachable from a unit.
    async fn curriculum(&self, unit_id: &str) -> anyhow::Result<Curriculum>;

    /// Activities assigned within a unit.
    async fn activities(&self, unit_id: &str) -> anyhow::Result<Vec<Activity>>;

    /// Pupils assigned to a unit.
    async fn pupils(&self, unit_id: &str) -> anyhow::Result<Vec<Pupil>>;

    /// Every stored submission for the given activities, resubmissions included.
    async fn submissions(&self, activity_ids: &[String]) -> anyhow::Result<Vec<Submission>>;

    /// Every stored feedback row for the given pupils.
    async fn feedback(&self, pupil_ids: &[String]) -> anyhow::Result<Vec<FeedbackEntry>>;

    async fn activity(&self, activity_id: &str) -> anyhow::Result<Option<Activity>>;

    /// Insert a submission, or replace the body of the one with the same id.
    async fn save_submission(&self, submission: Submission) -> anyhow::Result<Uuid>;

    /// Append a feedback row; the store assigns the next ordinal.
    async fn append_feedback(&self, draft: FeedbackDraft) -> anyhow::Result<FeedbackEntry>;
}

// ---------------------------------------------------------------------------
// Level-label lookup
// ---------------------------------------------------------------------------

/// Maps a year group and an assessment average (0..=1) to a label.
pub trait LevelLabelLookup: Send + Sync {
    fn label(&self, year: i32, average: f64) -> String;
}

impl<F> LevelLabelLookup for F
where
    F: Fn(i32, f64) -> String + Send + Sync,
{
    fn label(&self, year: i32, average: f64) -> String {
        self(year, average)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_lookups() {
        let lookup = |year: i32, avg: f64| format!("Y{year}:{:.0}%", avg * 100.0);
        assert_eq!(lookup.label(8, 0.5), "Y8:50%");

        let boxed: Box<dyn LevelLabelLookup> = Box::new(lookup);
        assert_eq!(boxed.label(10, 1.0), "Y10:100%");
    }
}
