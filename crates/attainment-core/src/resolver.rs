//! Score resolver: one [`Cell`] per (pupil, scorable activity).

use std::collections::BTreeMap;

use crate::config::ScoringConfig;
use crate::feedback::FeedbackIndex;
use crate::latest::{latest_by, latest_per_group};
use crate::model::{Activity, Cell, CellStatus, Pupil, Submission};
use crate::normalize::SubmissionBody;
use crate::trace::TraceContext;

/// Build the cell for one pupil and one activity.
///
/// `submissions` may contain rows for other pairs; they are ignored. Only
/// the submission with the strictly latest `submitted_at` is considered. A
/// body that fails validation is logged and treated as no submission.
pub fn build_cell(
    ctx: &TraceContext,
    activity: &Activity,
    pupil_id: &str,
    submissions: &[Submission],
    config: &ScoringConfig,
) -> Cell {
    let latest = latest_by(
        submissions
            .iter()
            .filter(|s| s.activity_id == activity.id && s.pupil_id == pupil_id),
        |s| s.submitted_at,
    );
    match latest {
        Some(submission) => resolve_submission(ctx, activity, submission, config),
        None => Cell::missing(activity, pupil_id),
    }
}

fn resolve_submission(
    ctx: &TraceContext,
    activity: &Activity,
    submission: &Submission,
    config: &ScoringConfig,
) -> Cell {
    let mut cell = Cell::missing(activity, &submission.pupil_id);

    let body = match SubmissionBody::parse(&activity.kind, &submission.body) {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(
                parent: ctx.span(),
                activity_id = %activity.id,
                pupil_id = %submission.pupil_id,
                submission_id = %submission.id,
                "ignoring submission: {e}"
            );
            return cell;
        }
    };

    let normalized = body.derive_score(activity, config);
    if body.is_placeholder() && normalized.override_score.is_none() {
        // Only an override ever put this row here, and it has been reset.
        return cell;
    }
    cell.submitted_at = Some(submission.submitted_at);
    cell.submission_id = Some(submission.id);
    cell.auto_score = normalized.auto_score;
    cell.override_score = normalized.override_score;
    cell.is_correct = normalized.is_correct;

    match (normalized.override_score, normalized.effective_score) {
        (Some(score), _) => {
            cell.status = CellStatus::Override;
            cell.score = score;
            cell.success_criteria_scores = normalized.success_criteria_scores;
        }
        (None, Some(score)) => {
            cell.status = CellStatus::Auto;
            cell.score = score;
            cell.success_criteria_scores = normalized.success_criteria_scores;
        }
        (None, None) => {
            // Submitted but nothing to score yet: keep the zeroed defaults.
            cell.needs_marking = true;
        }
    }
    cell
}

/// Every cell for a set of pupils and activities, grouped by pupil.
#[derive(Debug, Clone, Default)]
pub struct CellMatrix {
    by_pupil: BTreeMap<String, Vec<Cell>>,
}

impl CellMatrix {
    /// Resolve cells for every assigned pupil and scorable activity, and
    /// attach activity-level feedback.
    pub fn build(
        ctx: &TraceContext,
        activities: &[Activity],
        pupils: &[Pupil],
        submissions: &[Submission],
        feedback: &FeedbackIndex,
        config: &ScoringConfig,
    ) -> Self {
        let latest = latest_per_group(
            submissions.iter(),
            |s| (s.pupil_id.clone(), s.activity_id.clone()),
            |s| s.submitted_at,
        );

        let mut by_pupil = BTreeMap::new();
        for pupil in pupils {
            let cells: Vec<Cell> = activities
                .iter()
                .filter(|a| a.scorable)
                .map(|activity| {
                    let mut cell = match latest.get(&(pupil.id.clone(), activity.id.clone())) {
                        Some(submission) => resolve_submission(ctx, activity, submission, config),
                        None => Cell::missing(activity, &pupil.id),
                    };
                    if let Some(fb) = feedback.for_activity(&pupil.id, &activity.id) {
                        cell.feedback = fb.clone();
                    }
                    cell
                })
                .collect();
            by_pupil.insert(pupil.id.clone(), cells);
        }

        tracing::debug!(
            parent: ctx.span(),
            pupils = by_pupil.len(),
            activities = activities.len(),
            "resolved cell matrix"
        );
        Self { by_pupil }
    }

    /// Cells for one pupil, in activity order. Empty for unknown pupils.
    pub fn pupil(&self, pupil_id: &str) -> &[Cell] {
        self.by_pupil
            .get(pupil_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn pupils(&self) -> impl Iterator<Item = (&str, &[Cell])> {
        self.by_pupil
            .iter()
            .map(|(id, cells)| (id.as_str(), cells.as_slice()))
    }

    /// Number of pupil/activity pairs that have a submission awaiting marking.
    pub fn needs_marking_count(&self) -> usize {
        self.by_pupil
            .values()
            .flatten()
            .filter(|c| c.needs_marking)
            .count()
    }
}
