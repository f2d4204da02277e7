//! Core data model types for attainment.
//!
//! Reference data (curriculum, activities, pupils) and raw rows
//! (submissions, feedback) arrive from a store as a read-only snapshot.
//! [`Cell`] is derived per request and never persisted by the core.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::feedback::ResolvedFeedback;

// ---------------------------------------------------------------------------
// Curriculum hierarchy
// ---------------------------------------------------------------------------

/// The smallest gradable curriculum unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessCriterion {
    pub id: String,
    pub learning_objective_id: String,
    /// Small integer level the criterion is pitched at.
    pub level: u8,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningObjective {
    pub id: String,
    pub assessment_objective_id: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentObjective {
    pub id: String,
    pub code: String,
    #[serde(default)]
    pub title: String,
}

/// A unit of study for one subject and year group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub subject: String,
    /// Year group, fed to the level-label lookup.
    pub year: i32,
}

/// The curriculum rows reachable from one unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Curriculum {
    #[serde(default)]
    pub assessment_objectives: Vec<AssessmentObjective>,
    #[serde(default)]
    pub learning_objectives: Vec<LearningObjective>,
    #[serde(default)]
    pub success_criteria: Vec<SuccessCriterion>,
}

impl Curriculum {
    /// Criteria owned by one learning objective, in declaration order.
    pub fn criteria_for_objective<'a>(
        &'a self,
        learning_objective_id: &'a str,
    ) -> impl Iterator<Item = &'a SuccessCriterion> + 'a {
        self.success_criteria
            .iter()
            .filter(move |c| c.learning_objective_id == learning_objective_id)
    }

    /// Learning objectives owned by one assessment objective.
    pub fn objectives_for_assessment_objective<'a>(
        &'a self,
        assessment_objective_id: &'a str,
    ) -> impl Iterator<Item = &'a LearningObjective> + 'a {
        self.learning_objectives
            .iter()
            .filter(move |lo| lo.assessment_objective_id == assessment_objective_id)
    }

    /// Every criterion reachable through the unit's learning objectives,
    /// each exactly once, ordered by objective then declaration.
    pub fn flattened_criteria(&self) -> Vec<&SuccessCriterion> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for lo in &self.learning_objectives {
            for criterion in self.criteria_for_objective(&lo.id) {
                if seen.insert(criterion.id.as_str()) {
                    out.push(criterion);
                }
            }
        }
        out
    }

    /// Dangling parent references, as `(kind, id)` pairs.
    pub fn dangling_references(&self) -> Vec<(&'static str, String)> {
        let objectives: BTreeSet<&str> = self
            .learning_objectives
            .iter()
            .map(|lo| lo.id.as_str())
            .collect();
        let assessment_objectives: BTreeSet<&str> = self
            .assessment_objectives
            .iter()
            .map(|ao| ao.id.as_str())
            .collect();

        let mut missing = Vec::new();
        for criterion in &self.success_criteria {
            if !objectives.contains(criterion.learning_objective_id.as_str()) {
                missing.push((
                    "learning objective",
                    criterion.learning_objective_id.clone(),
                ));
            }
        }
        for lo in &self.learning_objectives {
            if !assessment_objectives.contains(lo.assessment_objective_id.as_str()) {
                missing.push(("assessment objective", lo.assessment_objective_id.clone()));
            }
        }
        missing
    }
}

// ---------------------------------------------------------------------------
// Activities and pupils
// ---------------------------------------------------------------------------

/// What kind of activity this is, with the answer key the kind needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ActivityKind {
    MultipleChoice { correct_option_id: String },
    ShortText,
    /// Uploads, free text, media and anything else scored by hand.
    #[serde(alias = "upload")]
    Generic,
}

impl ActivityKind {
    pub fn label(&self) -> &'static str {
        match self {
            ActivityKind::MultipleChoice { .. } => "multiple-choice",
            ActivityKind::ShortText => "short-text",
            ActivityKind::Generic => "generic",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A gradable piece of work within a lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub kind: ActivityKind,
    /// Summative activities also feed the assessment average.
    #[serde(default)]
    pub is_summative: bool,
    /// Display-only activities are excluded from every rollup.
    #[serde(default = "default_true")]
    pub scorable: bool,
    /// Declared success criteria, in order.
    #[serde(default)]
    pub success_criteria: Vec<String>,
}

impl Activity {
    pub fn declares(&self, criterion_id: &str) -> bool {
        self.success_criteria.iter().any(|c| c == criterion_id)
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pupil {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

// ---------------------------------------------------------------------------
// Raw rows
// ---------------------------------------------------------------------------

/// A pupil's attempt at an activity. The body is opaque until normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub activity_id: String,
    pub pupil_id: String,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub body: serde_json::Value,
}

/// Who wrote a feedback entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackSource {
    Teacher,
    Automatic,
}

impl fmt::Display for FeedbackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedbackSource::Teacher => write!(f, "teacher"),
            FeedbackSource::Automatic => write!(f, "automatic"),
        }
    }
}

impl FromStr for FeedbackSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "teacher" => Ok(FeedbackSource::Teacher),
            "automatic" | "auto" | "ai" => Ok(FeedbackSource::Automatic),
            other => Err(format!("unknown feedback source: {other}")),
        }
    }
}

/// What a feedback entry is about.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum FeedbackTarget {
    Criterion(String),
    Activity(String),
}

/// One stored feedback row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub pupil_id: String,
    pub target: FeedbackTarget,
    pub source: FeedbackSource,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub text: Option<String>,
    /// Monotonic and collision-free; the highest ordinal is the latest.
    pub ordinal: u64,
}

/// A feedback row before the store has assigned its ordinal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackDraft {
    pub pupil_id: String,
    pub target: FeedbackTarget,
    pub source: FeedbackSource,
    pub score: Option<f64>,
    pub text: Option<String>,
}

impl FeedbackDraft {
    pub fn into_entry(self, ordinal: u64) -> FeedbackEntry {
        FeedbackEntry {
            pupil_id: self.pupil_id,
            target: self.target,
            source: self.source,
            score: self.score,
            text: self.text,
            ordinal,
        }
    }
}

// ---------------------------------------------------------------------------
// Cells
// ---------------------------------------------------------------------------

/// How a cell's score was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellStatus {
    Missing,
    Auto,
    Override,
}

impl fmt::Display for CellStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellStatus::Missing => write!(f, "missing"),
            CellStatus::Auto => write!(f, "auto"),
            CellStatus::Override => write!(f, "override"),
        }
    }
}

/// The resolved scoring record for one (pupil, activity) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub activity_id: String,
    pub pupil_id: String,
    pub status: CellStatus,
    /// Override if present, else the automatic score, else 0.
    pub score: f64,
    pub auto_score: Option<f64>,
    pub override_score: Option<f64>,
    pub is_correct: Option<bool>,
    /// One entry per declared criterion, never absent.
    pub success_criteria_scores: BTreeMap<String, f64>,
    pub needs_marking: bool,
    pub submitted_at: Option<DateTime<Utc>>,
    pub submission_id: Option<Uuid>,
    pub is_summative: bool,
    #[serde(default)]
    pub feedback: ResolvedFeedback,
}

impl Cell {
    /// A cell for a pupil who has not submitted anything usable.
    pub fn missing(activity: &Activity, pupil_id: &str) -> Self {
        Self {
            activity_id: activity.id.clone(),
            pupil_id: pupil_id.to_string(),
            status: CellStatus::Missing,
            score: 0.0,
            auto_score: None,
            override_score: None,
            is_correct: None,
            success_criteria_scores: activity
                .success_criteria
                .iter()
                .map(|c| (c.clone(), 0.0))
                .collect(),
            needs_marking: false,
            submitted_at: None,
            submission_id: None,
            is_summative: activity.is_summative,
            feedback: ResolvedFeedback::default(),
        }
    }

    /// The score this cell contributes to `criterion_id`, if it declares it.
    pub fn criterion_score(&self, criterion_id: &str) -> Option<f64> {
        self.success_criteria_scores.get(criterion_id).copied()
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curriculum() -> Curriculum {
        Curriculum {
            assessment_objectives: vec![AssessmentObjective {
                id: "ao1".into(),
                code: "AO1".into(),
                title: "Knowledge".into(),
            }],
            learning_objectives: vec![
                LearningObjective {
                    id: "lo1".into(),
                    assessment_objective_id: "ao1".into(),
                    title: "Cells".into(),
                },
                LearningObjective {
                    id: "lo2".into(),
                    assessment_objective_id: "ao1".into(),
                    title: "Tissues".into(),
                },
            ],
            success_criteria: vec![
                SuccessCriterion {
                    id: "c3".into(),
                    learning_objective_id: "lo2".into(),
                    level: 2,
                    description: String::new(),
                },
                SuccessCriterion {
                    id: "c1".into(),
                    learning_objective_id: "lo1".into(),
                    level: 1,
                    description: String::new(),
                },
                SuccessCriterion {
                    id: "c2".into(),
                    learning_objective_id: "lo1".into(),
                    level: 2,
                    description: String::new(),
                },
            ],
        }
    }

    #[test]
    fn flattened_criteria_follow_objective_order() {
        let c = curriculum();
        let ids: Vec<&str> = c.flattened_criteria().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
    }

    #[test]
    fn dangling_references_are_reported() {
        let mut c = curriculum();
        c.success_criteria.push(SuccessCriterion {
            id: "c9".into(),
            learning_objective_id: "lo-gone".into(),
            level: 1,
            description: String::new(),
        });
        let missing = c.dangling_references();
        assert_eq!(missing, vec![("learning objective", "lo-gone".to_string())]);
    }

    #[test]
    fn activity_kind_serde() {
        let json = r#"{"id":"a1","kind":{"type":"multiple-choice","correct_option_id":"B"},"success_criteria":["c1"]}"#;
        let activity: Activity = serde_json::from_str(json).unwrap();
        assert!(activity.scorable);
        assert!(!activity.is_summative);
        assert_eq!(
            activity.kind,
            ActivityKind::MultipleChoice {
                correct_option_id: "B".into()
            }
        );

        let upload: ActivityKind = serde_json::from_str(r#"{"type":"upload"}"#).unwrap();
        assert_eq!(upload, ActivityKind::Generic);
        assert_eq!(ActivityKind::ShortText.to_string(), "short-text");
    }

    #[test]
    fn feedback_source_parse() {
        assert_eq!("Teacher".parse::<FeedbackSource>().unwrap(), FeedbackSource::Teacher);
        assert_eq!("ai".parse::<FeedbackSource>().unwrap(), FeedbackSource::Automatic);
        assert!("parent".parse::<FeedbackSource>().is_err());
    }

    #[test]
    fn missing_cell_has_zero_for_every_declared_criterion() {
        let activity = Activity {
            id: "a1".into(),
            title: String::new(),
            kind: ActivityKind::ShortText,
            is_summative: true,
            scorable: true,
            success_criteria: vec!["c1".into(), "c2".into()],
        };
        let cell = Cell::missing(&activity, "p1");
        assert_eq!(cell.status, CellStatus::Missing);
        assert_eq!(cell.score, 0.0);
        assert_eq!(cell.criterion_score("c1"), Some(0.0));
        assert_eq!(cell.criterion_score("c2"), Some(0.0));
        assert_eq!(cell.criterion_score("c3"), None);
        assert!(cell.is_summative);
        assert!(!cell.is_submitted());
    }
}
