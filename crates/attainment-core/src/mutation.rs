//! Teacher overrides, resets and bulk clearing of AI marks.
//!
//! These are the only operations that write. Persistence, and serializing
//! writes per (activity, pupil), is the store's job; the functions here
//! read the latest stored body, change it, and hand it back.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{check_unit_score, ProgressError, Result};
use crate::latest::latest_by;
use crate::model::{Activity, FeedbackDraft, FeedbackSource, FeedbackTarget, Submission};
use crate::normalize::SubmissionBody;
use crate::trace::TraceContext;
use crate::traits::ProgressStore;

/// A teacher override for one pupil's activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideRequest {
    pub activity_id: String,
    pub pupil_id: String,
    pub score: f64,
    #[serde(default)]
    pub feedback: Option<String>,
    /// Per-criterion scores; every key must be declared by the activity.
    #[serde(default)]
    pub criterion_scores: Option<BTreeMap<String, f64>>,
}

/// Outcome of a bulk clear. Failures do not stop the batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClearOutcome {
    pub cleared: usize,
    pub failed: usize,
    pub failed_submissions: Vec<Uuid>,
}

async fn require_activity(store: &dyn ProgressStore, activity_id: &str) -> Result<Activity> {
    store
        .activity(activity_id)
        .await
        .map_err(ProgressError::from_store)?
        .ok_or_else(|| ProgressError::not_found("activity", activity_id))
}

async fn latest_submission(
    store: &dyn ProgressStore,
    activity_id: &str,
    pupil_id: &str,
) -> Result<Option<Submission>> {
    let rows = store
        .submissions(&[activity_id.to_string()])
        .await
        .map_err(ProgressError::from_store)?;
    Ok(latest_by(
        rows.into_iter().filter(|s| s.pupil_id == pupil_id),
        |s| s.submitted_at,
    ))
}

/// Record a teacher override and return the id of the submission it lives on.
///
/// The override is written onto the latest submission; a pupil with no
/// submission gets a placeholder one, which reads as missing again once the
/// override is reset. The automatic score already in the body is never
/// touched.
pub async fn apply_override(
    store: &dyn ProgressStore,
    ctx: &TraceContext,
    request: &OverrideRequest,
) -> Result<Uuid> {
    let subject = format!("override for {}/{}", request.activity_id, request.pupil_id);
    check_unit_score(&subject, "score", request.score)?;

    let activity = require_activity(store, &request.activity_id).await?;
    if let Some(map) = &request.criterion_scores {
        for (criterion, value) in map {
            if !activity.declares(criterion) {
                return Err(ProgressError::validation(
                    &subject,
                    format!("criterion {criterion} is not declared by the activity"),
                ));
            }
            check_unit_score(&subject, &format!("criterion_scores.{criterion}"), *value)?;
        }
    }

    let existing = latest_submission(store, &request.activity_id, &request.pupil_id).await?;
    let mut submission = match existing {
        Some(submission) => submission,
        None => Submission {
            id: Uuid::new_v4(),
            activity_id: request.activity_id.clone(),
            pupil_id: request.pupil_id.clone(),
            submitted_at: Utc::now(),
            body: SubmissionBody::placeholder_for(&activity.kind).to_value()?,
        },
    };

    // A body we cannot read is not silently replaced.
    let mut body = SubmissionBody::parse(&activity.kind, &submission.body)?;
    body.set_override(request.score, request.criterion_scores.clone());
    submission.body = body.to_value()?;

    let submission_id = store
        .save_submission(submission)
        .await
        .map_err(ProgressError::from_store)?;

    if let Some(text) = &request.feedback {
        store
            .append_feedback(FeedbackDraft {
                pupil_id: request.pupil_id.clone(),
                target: FeedbackTarget::Activity(request.activity_id.clone()),
                source: FeedbackSource::Teacher,
                score: Some(request.score),
                text: Some(text.clone()),
            })
            .await
            .map_err(ProgressError::from_store)?;
    }

    tracing::info!(
        parent: ctx.span(),
        activity_id = %request.activity_id,
        pupil_id = %request.pupil_id,
        %submission_id,
        score = request.score,
        "override recorded"
    );
    Ok(submission_id)
}

/// Clear a teacher override so the automatic baseline applies again.
///
/// Resetting a pupil with no submission is a no-op.
pub async fn reset_override(
    store: &dyn ProgressStore,
    ctx: &TraceContext,
    activity_id: &str,
    pupil_id: &str,
) -> Result<()> {
    let activity = require_activity(store, activity_id).await?;
    let Some(mut submission) = latest_submission(store, activity_id, pupil_id).await? else {
        tracing::debug!(parent: ctx.span(), activity_id, pupil_id, "nothing to reset");
        return Ok(());
    };

    let mut body = SubmissionBody::parse(&activity.kind, &submission.body)?;
    body.clear_override();
    submission.body = body.to_value()?;
    let submission_id = store
        .save_submission(submission)
        .await
        .map_err(ProgressError::from_store)?;

    tracing::info!(
        parent: ctx.span(),
        activity_id,
        pupil_id,
        %submission_id,
        "override reset"
    );
    Ok(())
}

/// Remove AI marker scores from every submission of an activity.
///
/// Continues past failures: each one is logged and counted, and the batch
/// carries on. Only a missing activity or a failed initial fetch aborts.
pub async fn clear_ai_marks(
    store: &dyn ProgressStore,
    ctx: &TraceContext,
    activity_id: &str,
) -> Result<ClearOutcome> {
    let activity = require_activity(store, activity_id).await?;
    let submissions = store
        .submissions(&[activity_id.to_string()])
        .await
        .map_err(ProgressError::from_store)?;

    let mut outcome = ClearOutcome::default();
    for mut submission in submissions {
        let id = submission.id;
        let result = async {
            let mut body = SubmissionBody::parse(&activity.kind, &submission.body)?;
            if !body.clear_ai_score() {
                return Ok(false);
            }
            submission.body = body.to_value()?;
            store
                .save_submission(submission)
                .await
                .map_err(ProgressError::from_store)?;
            Ok::<bool, ProgressError>(true)
        }
        .await;

        match result {
            Ok(true) => outcome.cleared += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(
                    parent: ctx.span(),
                    activity_id,
                    submission_id = %id,
                    "failed to clear AI mark: {e}"
                );
                outcome.failed += 1;
                outcome.failed_submissions.push(id);
            }
        }
    }

    tracing::info!(
        parent: ctx.span(),
        activity_id,
        cleared = outcome.cleared,
        failed = outcome.failed,
        "cleared AI marks"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringConfig;
    use crate::model::{ActivityKind, CellStatus, Curriculum, FeedbackEntry, Pupil, Unit};
    use crate::resolver::build_cell;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Minimal store holding one unit's worth of activities and rows.
    #[derive(Default)]
    struct TestStore {
        activities: Vec<Activity>,
        submissions: Mutex<Vec<Submission>>,
        feedback: Mutex<Vec<FeedbackEntry>>,
        reject_writes: bool,
    }

    #[async_trait]
    impl ProgressStore for TestStore {
        fn name(&self) -> &str {
            "test"
        }
        async fn unit(&self, _unit_id: &str) -> anyhow::Result<Option<Unit>> {
            Ok(None)
        }
        async fn units_for_subject(&self, _subject: &str) -> anyhow::Result<Vec<Unit>> {
            Ok(vec![])
        }
        async fn curriculum(&self, _unit_id: &str) -> anyhow::Result<Curriculum> {
            Ok(Curriculum::default())
        }
        async fn activities(&self, _unit_id: &str) -> anyhow::Result<Vec<Activity>> {
            Ok(self.activities.clone())
        }
        async fn pupils(&self, _unit_id: &str) -> anyhow::Result<Vec<Pupil>> {
            Ok(vec![])
        }
        async fn submissions(&self, activity_ids: &[String]) -> anyhow::Result<Vec<Submission>> {
            Ok(self
                .submissions
                .lock()
                .unwrap()
                .iter()
                .filter(|s| activity_ids.contains(&s.activity_id))
                .cloned()
                .collect())
        }
        async fn feedback(&self, _pupil_ids: &[String]) -> anyhow::Result<Vec<FeedbackEntry>> {
            Ok(self.feedback.lock().unwrap().clone())
        }
        async fn activity(&self, activity_id: &str) -> anyhow::Result<Option<Activity>> {
            Ok(self.activities.iter().find(|a| a.id == activity_id).cloned())
        }
        async fn save_submission(&self, submission: Submission) -> anyhow::Result<Uuid> {
            if self.reject_writes {
                anyhow::bail!("read-only store");
            }
            let mut rows = self.submissions.lock().unwrap();
            let id = submission.id;
            match rows.iter_mut().find(|s| s.id == id) {
                Some(existing) => *existing = submission,
                None => rows.push(submission),
            }
            Ok(id)
        }
        async fn append_feedback(&self, draft: FeedbackDraft) -> anyhow::Result<FeedbackEntry> {
            let mut rows = self.feedback.lock().unwrap();
            let entry = draft.into_entry(rows.len() as u64 + 1);
            rows.push(entry.clone());
            Ok(entry)
        }
    }

    fn short_text() -> Activity {
        Activity {
            id: "a1".into(),
            title: "Explain osmosis".into(),
            kind: ActivityKind::ShortText,
            is_summative: false,
            scorable: true,
            success_criteria: vec!["C1".into()],
        }
    }

    fn submission(pupil: &str, minutes: i64, body: serde_json::Value) -> Submission {
        Submission {
            id: Uuid::new_v4(),
            activity_id: "a1".into(),
            pupil_id: pupil.into(),
            submitted_at: chrono::DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::minutes(minutes),
            body,
        }
    }

    fn store_with(rows: Vec<Submission>) -> TestStore {
        TestStore {
            activities: vec![short_text()],
            submissions: Mutex::new(rows),
            ..Default::default()
        }
    }

    fn request(score: f64) -> OverrideRequest {
        OverrideRequest {
            activity_id: "a1".into(),
            pupil_id: "p1".into(),
            score,
            feedback: None,
            criterion_scores: None,
        }
    }

    fn body_of(store: &TestStore, id: Uuid) -> serde_json::Value {
        store
            .submissions
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.body.clone())
            .unwrap()
    }

    #[tokio::test]
    async fn override_then_reset_restores_ai_score() {
        let first = submission("p1", 0, json!({"answer": "x", "ai_model_score": 0.6}));
        let store = store_with(vec![first.clone()]);
        let ctx = TraceContext::detached();

        let id = apply_override(&store, &ctx, &request(0.9)).await.unwrap();
        assert_eq!(id, first.id);
        assert_eq!(body_of(&store, id)["teacher_override_score"], 0.9);
        assert_eq!(body_of(&store, id)["ai_model_score"], 0.6);

        reset_override(&store, &ctx, "a1", "p1").await.unwrap();
        let body = body_of(&store, id);
        assert!(body.get("teacher_override_score").is_none());
        assert_eq!(body["ai_model_score"], 0.6);
    }

    #[tokio::test]
    async fn override_targets_latest_submission() {
        let old = submission("p1", 0, json!({"answer": "old", "ai_model_score": 0.2}));
        let new = submission("p1", 5, json!({"answer": "new", "ai_model_score": 0.4}));
        let store = store_with(vec![old.clone(), new.clone()]);

        let id = apply_override(&store, &TraceContext::detached(), &request(1.0))
            .await
            .unwrap();
        assert_eq!(id, new.id);
        assert!(body_of(&store, old.id).get("teacher_override_score").is_none());
    }

    #[tokio::test]
    async fn override_without_submission_creates_one() {
        let store = store_with(vec![]);
        let mut req = request(0.5);
        req.feedback = Some("Good effort".into());

        let id = apply_override(&store, &TraceContext::detached(), &req)
            .await
            .unwrap();
        let rows = store.submissions.lock().unwrap().clone();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, id);
        assert_eq!(rows[0].body["teacher_override_score"], 0.5);

        let feedback = store.feedback.lock().unwrap().clone();
        assert_eq!(feedback.len(), 1);
        assert_eq!(feedback[0].source, FeedbackSource::Teacher);
        assert_eq!(feedback[0].target, FeedbackTarget::Activity("a1".into()));
    }

    #[tokio::test]
    async fn override_validation() {
        let store = store_with(vec![]);
        let ctx = TraceContext::detached();

        let err = apply_override(&store, &ctx, &request(1.5)).await.unwrap_err();
        assert!(matches!(err, ProgressError::Validation { .. }));

        let mut req = request(0.5);
        req.criterion_scores = Some(BTreeMap::from([("C9".to_string(), 1.0)]));
        let err = apply_override(&store, &ctx, &req).await.unwrap_err();
        assert!(matches!(err, ProgressError::Validation { .. }));

        let mut req = request(0.5);
        req.activity_id = "nope".into();
        let err = apply_override(&store, &ctx, &req).await.unwrap_err();
        assert!(matches!(err, ProgressError::NotFound { kind: "activity", .. }));

        assert!(store.submissions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reset_keeps_pupil_criterion_scores() {
        let upload = Activity {
            id: "a2".into(),
            title: "Poster".into(),
            kind: ActivityKind::Generic,
            is_summative: false,
            scorable: true,
            success_criteria: vec!["C1".into()],
        };
        let mut original = submission(
            "p1",
            0,
            json!({"file_name": "e.pdf", "success_criteria_scores": {"C1": 1.0}}),
        );
        original.activity_id = "a2".into();
        let store = TestStore {
            activities: vec![upload.clone()],
            submissions: Mutex::new(vec![original.clone()]),
            ..Default::default()
        };
        let ctx = TraceContext::detached();
        let config = ScoringConfig::default();
        let score_of = |store: &TestStore| {
            let body = SubmissionBody::parse(&upload.kind, &body_of(store, original.id)).unwrap();
            body.derive_score(&upload, &config)
        };
        let before = score_of(&store);

        let mut req = request(0.2);
        req.activity_id = "a2".into();
        apply_override(&store, &ctx, &req).await.unwrap();
        assert_eq!(score_of(&store).effective_score, Some(0.2));

        reset_override(&store, &ctx, "a2", "p1").await.unwrap();
        let after = score_of(&store);
        assert_eq!(after, before);
        assert_eq!(after.effective_score, Some(1.0));
        assert_eq!(after.success_criteria_scores["C1"], 1.0);
        assert_eq!(body_of(&store, original.id)["file_name"], "e.pdf");
    }

    #[tokio::test]
    async fn placeholder_reads_as_missing_after_reset() {
        let quiz = Activity {
            id: "a3".into(),
            title: "Quiz".into(),
            kind: ActivityKind::MultipleChoice {
                correct_option_id: "B".into(),
            },
            is_summative: false,
            scorable: true,
            success_criteria: vec!["C1".into()],
        };
        let store = TestStore {
            activities: vec![short_text(), quiz.clone()],
            ..Default::default()
        };
        let ctx = TraceContext::detached();
        let config = ScoringConfig::default();

        for activity in [short_text(), quiz] {
            let mut req = request(0.8);
            req.activity_id = activity.id.clone();
            apply_override(&store, &ctx, &req).await.unwrap();
            let rows = store.submissions.lock().unwrap().clone();
            let cell = build_cell(&ctx, &activity, "p1", &rows, &config);
            assert_eq!(cell.status, CellStatus::Override);
            assert_eq!(cell.score, 0.8);

            reset_override(&store, &ctx, &activity.id, "p1").await.unwrap();
            let rows = store.submissions.lock().unwrap().clone();
            let cell = build_cell(&ctx, &activity, "p1", &rows, &config);
            assert_eq!(cell.status, CellStatus::Missing, "{}", activity.id);
            assert_eq!(cell.auto_score, None);
            assert!(!cell.needs_marking);
            assert!(cell.submitted_at.is_none());
        }
    }

    #[tokio::test]
    async fn reset_without_submission_is_noop() {
        let store = store_with(vec![]);
        reset_override(&store, &TraceContext::detached(), "a1", "p1")
            .await
            .unwrap();
        assert!(store.submissions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn clear_ai_marks_counts_and_continues() {
        let rows = vec![
            submission("p1", 0, json!({"answer": "x", "ai_model_score": 0.6})),
            submission("p2", 0, json!({"answer": "y"})),
            submission("p3", 0, json!("corrupt")),
            submission("p4", 0, json!({"answer": "z", "ai_model_score": 1.0})),
        ];
        let corrupt = rows[2].id;
        let store = store_with(rows);

        let outcome = clear_ai_marks(&store, &TraceContext::detached(), "a1")
            .await
            .unwrap();
        assert_eq!(outcome.cleared, 2);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.failed_submissions, vec![corrupt]);
        assert!(store
            .submissions
            .lock()
            .unwrap()
            .iter()
            .all(|s| s.body.get("ai_model_score").is_none()));
    }

    #[tokio::test]
    async fn clear_ai_marks_reports_write_failures() {
        let mut store = store_with(vec![submission(
            "p1",
            0,
            json!({"answer": "x", "ai_model_score": 0.6}),
        )]);
        store.reject_writes = true;

        let outcome = clear_ai_marks(&store, &TraceContext::detached(), "a1")
            .await
            .unwrap();
        assert_eq!(outcome.cleared, 0);
        assert_eq!(outcome.failed, 1);
    }
}
