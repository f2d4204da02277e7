//! Aggregation: criterion → learning objective → unit → subject.
//!
//! Every level carries an activities average (all scorable activities) and
//! an assessment average (summative activities only).
//!
//! The unit averages are taken over the unit's flattened criteria, not over
//! its learning objective averages. With objectives of unequal size the two
//! give different numbers; the flattened form is the one reports use.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;
use crate::feedback::{FeedbackIndex, ResolvedFeedback};
use crate::level::{assessment_level_label, positive_fractions, working_level};
use crate::model::{
    AssessmentObjective, Cell, Curriculum, LearningObjective, SuccessCriterion, Unit,
};
use crate::statistics::{mean, mode_prefer_higher};
use crate::traits::LevelLabelLookup;

/// Rollup of one criterion for one pupil.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionSummary {
    pub criterion_id: String,
    /// `None` when no scorable activity declares the criterion.
    pub activities_average: Option<f64>,
    /// `None` when no summative activity declares the criterion.
    pub assessment_average: Option<f64>,
    /// Declaring activities the pupil has submitted to.
    pub submitted_count: usize,
    /// Declaring activities, submitted or not.
    pub activity_count: usize,
}

/// Average one criterion over a single pupil's cells.
///
/// Each declaring cell counts once; a missing cell contributes its zero.
pub fn build_criterion_summary(criterion_id: &str, cells: &[Cell]) -> CriterionSummary {
    let declaring: Vec<(&Cell, f64)> = cells
        .iter()
        .filter_map(|c| c.criterion_score(criterion_id).map(|s| (c, s)))
        .collect();

    CriterionSummary {
        criterion_id: criterion_id.to_string(),
        activities_average: mean(declaring.iter().map(|(_, s)| Some(*s))),
        assessment_average: mean(
            declaring
                .iter()
                .filter(|(c, _)| c.is_summative)
                .map(|(_, s)| Some(*s)),
        ),
        submitted_count: declaring.iter().filter(|(c, _)| c.is_submitted()).count(),
        activity_count: declaring.len(),
    }
}

/// Rollup of one learning objective for one pupil.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveSummary {
    pub learning_objective_id: String,
    pub title: String,
    pub activities_average: Option<f64>,
    pub assessment_average: Option<f64>,
    pub criterion_count: usize,
}

/// Average of the objective's criterion averages, each weighted equally.
pub fn build_objective_summary(
    objective: &LearningObjective,
    criteria: &[&CriterionSummary],
) -> ObjectiveSummary {
    ObjectiveSummary {
        learning_objective_id: objective.id.clone(),
        title: objective.title.clone(),
        activities_average: mean(criteria.iter().map(|c| c.activities_average)),
        assessment_average: mean(criteria.iter().map(|c| c.assessment_average)),
        criterion_count: criteria.len(),
    }
}

/// Rollup of one assessment objective for one pupil.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentObjectiveSummary {
    pub assessment_objective_id: String,
    pub code: String,
    pub activities_average: Option<f64>,
    pub assessment_average: Option<f64>,
}

fn build_assessment_objective_summary(
    ao: &AssessmentObjective,
    criteria: &[&CriterionSummary],
) -> AssessmentObjectiveSummary {
    AssessmentObjectiveSummary {
        assessment_objective_id: ao.id.clone(),
        code: ao.code.clone(),
        activities_average: mean(criteria.iter().map(|c| c.activities_average)),
        assessment_average: mean(criteria.iter().map(|c| c.assessment_average)),
    }
}

/// One criterion as shown in a unit report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionRow {
    pub learning_objective_id: String,
    pub level: u8,
    pub description: String,
    #[serde(flatten)]
    pub summary: CriterionSummary,
    pub feedback: ResolvedFeedback,
    pub positive_feedback: bool,
}

/// Everything a unit report needs for one pupil.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSummary {
    pub unit_id: String,
    pub subject: String,
    pub pupil_id: String,
    /// Criterion rows keyed by level, ascending.
    pub grouped_by_level: BTreeMap<u8, Vec<CriterionRow>>,
    /// Positive-feedback fraction per level bucket.
    pub level_fractions: BTreeMap<u8, f64>,
    pub working_level: Option<u8>,
    pub activities_average: Option<f64>,
    pub assessment_average: Option<f64>,
    pub assessment_level_label: String,
    pub objectives: Vec<ObjectiveSummary>,
    pub assessment_objectives: Vec<AssessmentObjectiveSummary>,
}

impl CriterionRow {
    pub fn criterion_id(&self) -> &str {
        &self.summary.criterion_id
    }
}

impl UnitSummary {
    pub fn criteria(&self) -> impl Iterator<Item = &CriterionRow> {
        self.grouped_by_level.values().flatten()
    }
}

/// Inputs shared by every pupil's unit summary.
pub struct UnitContext<'a> {
    pub unit: &'a Unit,
    pub curriculum: &'a Curriculum,
    pub lookup: &'a dyn LevelLabelLookup,
    pub config: &'a ScoringConfig,
}

/// Build one pupil's unit summary from their cells and reconciled feedback.
pub fn build_unit_summary(
    ctx: &UnitContext<'_>,
    pupil_id: &str,
    cells: &[Cell],
    feedback: &FeedbackIndex,
) -> UnitSummary {
    let flattened: Vec<&SuccessCriterion> = ctx.curriculum.flattened_criteria();
    let summaries: BTreeMap<&str, CriterionSummary> = flattened
        .iter()
        .map(|c| (c.id.as_str(), build_criterion_summary(&c.id, cells)))
        .collect();

    let objectives: Vec<ObjectiveSummary> = ctx
        .curriculum
        .learning_objectives
        .iter()
        .map(|lo| {
            let owned: Vec<&CriterionSummary> = ctx
                .curriculum
                .criteria_for_objective(&lo.id)
                .filter_map(|c| summaries.get(c.id.as_str()))
                .collect();
            build_objective_summary(lo, &owned)
        })
        .collect();

    let assessment_objectives: Vec<AssessmentObjectiveSummary> = ctx
        .curriculum
        .assessment_objectives
        .iter()
        .map(|ao| {
            let reachable: Vec<&CriterionSummary> = ctx
                .curriculum
                .objectives_for_assessment_objective(&ao.id)
                .flat_map(|lo| ctx.curriculum.criteria_for_objective(&lo.id))
                .filter_map(|c| summaries.get(c.id.as_str()))
                .collect();
            build_assessment_objective_summary(ao, &reachable)
        })
        .collect();

    let mut grouped_by_level: BTreeMap<u8, Vec<CriterionRow>> = BTreeMap::new();
    for criterion in &flattened {
        let resolved = feedback
            .for_criterion(pupil_id, &criterion.id)
            .cloned()
            .unwrap_or_default();
        let summary = summaries
            .get(criterion.id.as_str())
            .cloned()
            .unwrap_or_else(|| build_criterion_summary(&criterion.id, cells));
        grouped_by_level
            .entry(criterion.level)
            .or_default()
            .push(CriterionRow {
                learning_objective_id: criterion.learning_objective_id.clone(),
                level: criterion.level,
                description: criterion.description.clone(),
                summary,
                positive_feedback: resolved.is_positive(),
                feedback: resolved,
            });
    }

    // Flattened criteria, not objective averages.
    let activities_average = mean(summaries.values().map(|s| s.activities_average));
    let assessment_average = mean(summaries.values().map(|s| s.assessment_average));

    let level_fractions = positive_fractions(
        grouped_by_level
            .values()
            .flatten()
            .map(|row| (row.level, row.positive_feedback)),
    );
    let working_level = working_level(&level_fractions, ctx.config.working_level_threshold);

    UnitSummary {
        unit_id: ctx.unit.id.clone(),
        subject: ctx.unit.subject.clone(),
        pupil_id: pupil_id.to_string(),
        grouped_by_level,
        level_fractions,
        working_level,
        activities_average,
        assessment_average,
        assessment_level_label: assessment_level_label(
            ctx.lookup,
            ctx.unit.year,
            assessment_average,
        ),
        objectives,
        assessment_objectives,
    }
}

/// A pupil's standing across every unit of a subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectSummary {
    pub subject: String,
    pub pupil_id: String,
    /// Mode of the unit working levels; ties go to the higher level.
    pub working_level: Option<u8>,
    /// Working level per unit id, `None` where no level was established.
    pub unit_levels: BTreeMap<String, Option<u8>>,
}

/// Tally unit working levels into a subject working level.
pub fn build_subject_summary(
    subject: &str,
    pupil_id: &str,
    unit_summaries: &[UnitSummary],
) -> SubjectSummary {
    let relevant: Vec<&UnitSummary> = unit_summaries
        .iter()
        .filter(|u| u.subject == subject && u.pupil_id == pupil_id)
        .collect();

    SubjectSummary {
        subject: subject.to_string(),
        pupil_id: pupil_id.to_string(),
        working_level: mode_prefer_higher(relevant.iter().filter_map(|u| u.working_level)),
        unit_levels: relevant
            .iter()
            .map(|u| (u.unit_id.clone(), u.working_level))
            .collect(),
    }
}
