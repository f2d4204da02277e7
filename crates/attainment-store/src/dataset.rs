//! The snapshot dataset shared by every store.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use attainment_core::error::ProgressError;
use attainment_core::model::{
    Activity, ActivityKind, AssessmentObjective, Curriculum, FeedbackDraft, FeedbackEntry,
    FeedbackSource, FeedbackTarget, LearningObjective, Pupil, Submission, SuccessCriterion, Unit,
};
use attainment_core::normalize::SubmissionBody;

/// A unit with its curriculum and assignments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRecord {
    #[serde(flatten)]
    pub unit: Unit,
    #[serde(default)]
    pub curriculum: Curriculum,
    /// Activities in lesson order.
    #[serde(default)]
    pub activity_ids: Vec<String>,
    /// Pupils in class-list order.
    #[serde(default)]
    pub pupil_ids: Vec<String>,
}

/// Everything a store holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub units: Vec<UnitRecord>,
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub pupils: Vec<Pupil>,
    #[serde(default)]
    pub submissions: Vec<Submission>,
    #[serde(default)]
    pub feedback: Vec<FeedbackEntry>,
}

/// A problem found by [`Dataset::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetIssue {
    /// What kind of record the issue is about (e.g. "submission").
    pub kind: String,
    pub id: String,
    pub message: String,
}

impl DatasetIssue {
    fn new(kind: &str, id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            id: id.into(),
            message: message.into(),
        }
    }
}

impl Dataset {
    pub fn unit_record(&self, unit_id: &str) -> Option<&UnitRecord> {
        self.units.iter().find(|u| u.unit.id == unit_id)
    }

    fn require_unit(&self, unit_id: &str) -> anyhow::Result<&UnitRecord> {
        self.unit_record(unit_id)
            .ok_or_else(|| anyhow::Error::from(ProgressError::not_found("unit", unit_id)))
    }

    pub fn activity(&self, activity_id: &str) -> Option<&Activity> {
        self.activities.iter().find(|a| a.id == activity_id)
    }

    pub fn units_for_subject(&self, subject: &str) -> Vec<Unit> {
        self.units
            .iter()
            .filter(|u| u.unit.subject == subject)
            .map(|u| u.unit.clone())
            .collect()
    }

    pub fn curriculum(&self, unit_id: &str) -> anyhow::Result<Curriculum> {
        Ok(self.require_unit(unit_id)?.curriculum.clone())
    }

    /// The unit's activities in lesson order. A dangling id is `NotFound`.
    pub fn activities_for(&self, unit_id: &str) -> anyhow::Result<Vec<Activity>> {
        self.require_unit(unit_id)?
            .activity_ids
            .iter()
            .map(|id| {
                self.activity(id)
                    .cloned()
                    .ok_or_else(|| anyhow::Error::from(ProgressError::not_found("activity", id)))
            })
            .collect()
    }

    /// The unit's pupils in class-list order. A dangling id is `NotFound`.
    pub fn pupils_for(&self, unit_id: &str) -> anyhow::Result<Vec<Pupil>> {
        self.require_unit(unit_id)?
            .pupil_ids
            .iter()
            .map(|id| {
                self.pupils
                    .iter()
                    .find(|p| &p.id == id)
                    .cloned()
                    .ok_or_else(|| anyhow::Error::from(ProgressError::not_found("pupil", id)))
            })
            .collect()
    }

    pub fn submissions_for(&self, activity_ids: &[String]) -> Vec<Submission> {
        self.submissions
            .iter()
            .filter(|s| activity_ids.contains(&s.activity_id))
            .cloned()
            .collect()
    }

    pub fn feedback_for(&self, pupil_ids: &[String]) -> Vec<FeedbackEntry> {
        self.feedback
            .iter()
            .filter(|f| pupil_ids.contains(&f.pupil_id))
            .cloned()
            .collect()
    }

    /// Insert a submission or replace the one with the same id.
    pub fn upsert_submission(&mut self, submission: Submission) -> Uuid {
        let id = submission.id;
        match self.submissions.iter_mut().find(|s| s.id == id) {
            Some(existing) => *existing = submission,
            None => self.submissions.push(submission),
        }
        id
    }

    /// Append a feedback row with the next free ordinal.
    pub fn append_feedback(&mut self, draft: FeedbackDraft) -> FeedbackEntry {
        let ordinal = self
            .feedback
            .iter()
            .map(|f| f.ordinal)
            .max()
            .map_or(1, |max| max + 1);
        let entry = draft.into_entry(ordinal);
        self.feedback.push(entry.clone());
        entry
    }

    /// Check references and submission bodies without building any report.
    pub fn validate(&self) -> Vec<DatasetIssue> {
        let mut issues = Vec::new();
        let activities: HashMap<&str, &Activity> =
            self.activities.iter().map(|a| (a.id.as_str(), a)).collect();
        let pupils: BTreeSet<&str> = self.pupils.iter().map(|p| p.id.as_str()).collect();

        for record in &self.units {
            let unit_id = &record.unit.id;
            for (kind, id) in record.curriculum.dangling_references() {
                issues.push(DatasetIssue::new(
                    kind,
                    id,
                    format!("referenced by the curriculum of unit {unit_id} but not defined"),
                ));
            }
            let criteria: BTreeSet<&str> = record
                .curriculum
                .success_criteria
                .iter()
                .map(|c| c.id.as_str())
                .collect();
            for activity_id in &record.activity_ids {
                match activities.get(activity_id.as_str()) {
                    None => issues.push(DatasetIssue::new(
                        "activity",
                        activity_id,
                        format!("assigned to unit {unit_id} but not defined"),
                    )),
                    Some(activity) => {
                        for criterion in &activity.success_criteria {
                            if !criteria.contains(criterion.as_str()) {
                                issues.push(DatasetIssue::new(
                                    "activity",
                                    activity_id,
                                    format!(
                                        "declares criterion {criterion} outside unit {unit_id}"
                                    ),
                                ));
                            }
                        }
                    }
                }
            }
            for pupil_id in &record.pupil_ids {
                if !pupils.contains(pupil_id.as_str()) {
                    issues.push(DatasetIssue::new(
                        "pupil",
                        pupil_id,
                        format!("assigned to unit {unit_id} but not defined"),
                    ));
                }
            }
        }

        for submission in &self.submissions {
            let id = submission.id.to_string();
            match activities.get(submission.activity_id.as_str()) {
                None => issues.push(DatasetIssue::new(
                    "submission",
                    id,
                    format!("unknown activity {}", submission.activity_id),
                )),
                Some(activity) => {
                    if let Err(e) = SubmissionBody::parse(&activity.kind, &submission.body) {
                        issues.push(DatasetIssue::new("submission", id, e.to_string()));
                    }
                }
            }
        }

        let mut ordinals = BTreeSet::new();
        for entry in &self.feedback {
            if !ordinals.insert(entry.ordinal) {
                issues.push(DatasetIssue::new(
                    "feedback",
                    entry.ordinal.to_string(),
                    "duplicate ordinal",
                ));
            }
        }

        issues
    }

    /// A small two-unit science dataset, used by `attainment init` and tests.
    pub fn sample() -> Self {
        let criterion = |id: &str, lo: &str, level: u8, description: &str| SuccessCriterion {
            id: id.into(),
            learning_objective_id: lo.into(),
            level,
            description: description.into(),
        };
        let objective = |id: &str, title: &str| LearningObjective {
            id: id.into(),
            assessment_objective_id: "AO1".into(),
            title: title.into(),
        };
        let knowledge = AssessmentObjective {
            id: "AO1".into(),
            code: "AO1".into(),
            title: "Knowledge and understanding".into(),
        };
        let activity = |id: &str, title: &str, kind: ActivityKind, summative: bool, criteria: &[&str]| {
            Activity {
                id: id.into(),
                title: title.into(),
                kind,
                is_summative: summative,
                scorable: true,
                success_criteria: criteria.iter().map(|c| c.to_string()).collect(),
            }
        };
        let epoch = DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(1_725_958_800);
        let submission = |n: u128, activity: &str, pupil: &str, minutes: i64, body| Submission {
            id: Uuid::from_u128(n),
            activity_id: activity.into(),
            pupil_id: pupil.into(),
            submitted_at: epoch + Duration::minutes(minutes),
            body,
        };
        let feedback = |ordinal: u64, pupil: &str, criterion: &str, source, score: f64| FeedbackEntry {
            pupil_id: pupil.into(),
            target: FeedbackTarget::Criterion(criterion.into()),
            source,
            score: Some(score),
            text: None,
            ordinal,
        };

        Dataset {
            units: vec![
                UnitRecord {
                    unit: Unit {
                        id: "cells".into(),
                        title: "Cells and organisation".into(),
                        subject: "science".into(),
                        year: 7,
                    },
                    curriculum: Curriculum {
                        assessment_objectives: vec![knowledge.clone()],
                        learning_objectives: vec![
                            objective("LO1", "Describe cell structure"),
                            objective("LO2", "Explain diffusion"),
                        ],
                        success_criteria: vec![
                            criterion("C1", "LO1", 1, "Name the parts of a cell"),
                            criterion("C2", "LO1", 2, "Compare plant and animal cells"),
                            criterion("C3", "LO2", 3, "Explain diffusion in terms of particles"),
                        ],
                    },
                    activity_ids: vec!["cells-quiz".into(), "diffusion-text".into(), "cells-poster".into()],
                    pupil_ids: vec!["p-ada".into(), "p-ben".into()],
                },
                UnitRecord {
                    unit: Unit {
                        id: "energy".into(),
                        title: "Energy stores".into(),
                        subject: "science".into(),
                        year: 7,
                    },
                    curriculum: Curriculum {
                        assessment_objectives: vec![knowledge],
                        learning_objectives: vec![objective("LO3", "Identify energy stores")],
                        success_criteria: vec![criterion("C4", "LO3", 2, "Name four energy stores")],
                    },
                    activity_ids: vec!["energy-quiz".into()],
                    pupil_ids: vec!["p-ada".into()],
                },
            ],
            activities: vec![
                activity(
                    "cells-quiz",
                    "Cell parts quiz",
                    ActivityKind::MultipleChoice { correct_option_id: "B".into() },
                    false,
                    &["C1", "C2"],
                ),
                activity("diffusion-text", "Explain diffusion", ActivityKind::ShortText, true, &["C2", "C3"]),
                activity("cells-poster", "Cell poster", ActivityKind::Generic, false, &["C3"]),
                activity(
                    "energy-quiz",
                    "Energy stores quiz",
                    ActivityKind::MultipleChoice { correct_option_id: "A".into() },
                    true,
                    &["C4"],
                ),
            ],
            pupils: vec![
                Pupil { id: "p-ada".into(), name: "Ada".into() },
                Pupil { id: "p-ben".into(), name: "Ben".into() },
            ],
            submissions: vec![
                submission(1, "cells-quiz", "p-ada", 0, json!({"answer_chosen": "B"})),
                submission(2, "diffusion-text", "p-ada", 10, json!({
                    "answer": "Particles spread from high to low concentration",
                    "ai_model_score": 0.6
                })),
                submission(3, "cells-quiz", "p-ben", 2, json!({"answer_chosen": "A"})),
                submission(4, "cells-poster", "p-ben", 30, json!({"file_name": "poster.png"})),
                submission(5, "energy-quiz", "p-ada", 60, json!({"answer_chosen": "A"})),
            ],
            feedback: vec![
                feedback(1, "p-ada", "C1", FeedbackSource::Teacher, 1.0),
                feedback(2, "p-ada", "C2", FeedbackSource::Automatic, 1.0),
                feedback(3, "p-ben", "C1", FeedbackSource::Teacher, 0.0),
                feedback(4, "p-ada", "C4", FeedbackSource::Teacher, 1.0),
            ],
        }
    }
}
