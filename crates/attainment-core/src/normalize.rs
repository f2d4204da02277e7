//! Submission normalizer.
//!
//! Raw submission bodies are parsed into a closed [`SubmissionBody`] enum,
//! chosen by the activity's kind, and each variant derives its own
//! [`NormalizedScore`]. Adding an activity type means adding a variant.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;
use crate::error::{check_unit_score, ProgressError, Result};
use crate::model::{Activity, ActivityKind};

/// Body of a multiple-choice submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultipleChoiceBody {
    /// Option id the pupil picked; `None` when a teacher marked a pupil who
    /// never answered.
    #[serde(default)]
    pub answer_chosen: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_override_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_criteria_scores: Option<BTreeMap<String, f64>>,
    /// Per-criterion scores given with the override. Only read while
    /// `teacher_override_score` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_override_criteria: Option<BTreeMap<String, f64>>,
    /// Set on a body created only to carry an override.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub override_placeholder: bool,
}

/// Body of a short-text submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShortTextBody {
    #[serde(default)]
    pub answer: String,
    /// Score assigned by the AI marker, if it has run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_model_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_override_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_criteria_scores: Option<BTreeMap<String, f64>>,
    /// Per-criterion scores given with the override. Only read while
    /// `teacher_override_score` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_override_criteria: Option<BTreeMap<String, f64>>,
    /// Set on a body created only to carry an override.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub override_placeholder: bool,
}

/// Body of an upload, free-text or media submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenericBody {
    #[serde(default, alias = "auto_score", skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(
        default,
        alias = "override_score",
        skip_serializing_if = "Option::is_none"
    )]
    pub teacher_override_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_criteria_scores: Option<BTreeMap<String, f64>>,
    /// Per-criterion scores given with the override. Only read while
    /// `teacher_override_score` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_override_criteria: Option<BTreeMap<String, f64>>,
    /// Set on a body created only to carry an override.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub override_placeholder: bool,
    /// Everything else (file names, media urls, ...), kept verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A parsed submission body.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionBody {
    MultipleChoice(MultipleChoiceBody),
    ShortText(ShortTextBody),
    Generic(GenericBody),
}

/// Output of normalizing one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedScore {
    /// `override ?? auto`, or `None` when nothing could be derived.
    pub effective_score: Option<f64>,
    pub auto_score: Option<f64>,
    pub override_score: Option<f64>,
    pub is_correct: Option<bool>,
    /// One entry per declared criterion.
    pub success_criteria_scores: BTreeMap<String, f64>,
}

impl SubmissionBody {
    /// Parse a raw body according to the activity kind.
    pub fn parse(kind: &ActivityKind, raw: &serde_json::Value) -> Result<Self> {
        let body = match kind {
            ActivityKind::MultipleChoice { .. } => {
                SubmissionBody::MultipleChoice(decode(kind, raw)?)
            }
            ActivityKind::ShortText => SubmissionBody::ShortText(decode(kind, raw)?),
            ActivityKind::Generic => SubmissionBody::Generic(decode(kind, raw)?),
        };
        body.check_ranges(kind)?;
        Ok(body)
    }

    /// Serialize back into the stored JSON shape.
    pub fn to_value(&self) -> Result<serde_json::Value> {
        let value = match self {
            SubmissionBody::MultipleChoice(b) => serde_json::to_value(b),
            SubmissionBody::ShortText(b) => serde_json::to_value(b),
            SubmissionBody::Generic(b) => serde_json::to_value(b),
        };
        value.map_err(|e| ProgressError::validation("submission body", e.to_string()))
    }

    pub fn override_score(&self) -> Option<f64> {
        match self {
            SubmissionBody::MultipleChoice(b) => b.teacher_override_score,
            SubmissionBody::ShortText(b) => b.teacher_override_score,
            SubmissionBody::Generic(b) => b.teacher_override_score,
        }
    }

    pub fn ai_score(&self) -> Option<f64> {
        match self {
            SubmissionBody::ShortText(b) => b.ai_model_score,
            _ => None,
        }
    }

    /// The pupil's own per-criterion map, ignoring any override.
    fn own_criteria(&self) -> Option<&BTreeMap<String, f64>> {
        match self {
            SubmissionBody::MultipleChoice(b) => b.success_criteria_scores.as_ref(),
            SubmissionBody::ShortText(b) => b.success_criteria_scores.as_ref(),
            SubmissionBody::Generic(b) => b.success_criteria_scores.as_ref(),
        }
    }

    fn override_criteria(&self) -> Option<&BTreeMap<String, f64>> {
        match self {
            SubmissionBody::MultipleChoice(b) => b.teacher_override_criteria.as_ref(),
            SubmissionBody::ShortText(b) => b.teacher_override_criteria.as_ref(),
            SubmissionBody::Generic(b) => b.teacher_override_criteria.as_ref(),
        }
    }

    /// The per-criterion map in force: the override's while one is set,
    /// otherwise the pupil's own.
    fn explicit_criteria(&self) -> Option<&BTreeMap<String, f64>> {
        match (self.override_score(), self.override_criteria()) {
            (Some(_), Some(map)) => Some(map),
            _ => self.own_criteria(),
        }
    }

    /// `true` when the body exists only because an override was recorded
    /// for a pupil who never submitted.
    pub fn is_placeholder(&self) -> bool {
        match self {
            SubmissionBody::MultipleChoice(b) => b.override_placeholder,
            SubmissionBody::ShortText(b) => b.override_placeholder,
            SubmissionBody::Generic(b) => b.override_placeholder,
        }
    }

    fn override_slots(&mut self) -> (&mut Option<f64>, &mut Option<BTreeMap<String, f64>>) {
        match self {
            SubmissionBody::MultipleChoice(b) => {
                (&mut b.teacher_override_score, &mut b.teacher_override_criteria)
            }
            SubmissionBody::ShortText(b) => {
                (&mut b.teacher_override_score, &mut b.teacher_override_criteria)
            }
            SubmissionBody::Generic(b) => {
                (&mut b.teacher_override_score, &mut b.teacher_override_criteria)
            }
        }
    }

    /// Record a teacher override. The automatic score and the pupil's own
    /// criterion map are left untouched.
    pub fn set_override(&mut self, score: f64, criterion_scores: Option<BTreeMap<String, f64>>) {
        let (override_slot, criteria_slot) = self.override_slots();
        *override_slot = Some(score);
        *criteria_slot = criterion_scores;
    }

    /// Drop the override so the automatic baseline applies again.
    pub fn clear_override(&mut self) {
        let (override_slot, criteria_slot) = self.override_slots();
        *override_slot = None;
        *criteria_slot = None;
    }

    /// Remove the AI marker's score. Returns `true` if there was one.
    pub fn clear_ai_score(&mut self) -> bool {
        match self {
            SubmissionBody::ShortText(b) => b.ai_model_score.take().is_some(),
            _ => false,
        }
    }

    /// An empty placeholder body of the right variant, for an override on a
    /// pupil with no submission.
    pub fn placeholder_for(kind: &ActivityKind) -> Self {
        match kind {
            ActivityKind::MultipleChoice { .. } => {
                SubmissionBody::MultipleChoice(MultipleChoiceBody {
                    override_placeholder: true,
                    ..Default::default()
                })
            }
            ActivityKind::ShortText => SubmissionBody::ShortText(ShortTextBody {
                override_placeholder: true,
                ..Default::default()
            }),
            ActivityKind::Generic => SubmissionBody::Generic(GenericBody {
                override_placeholder: true,
                ..Default::default()
            }),
        }
    }

    /// Derive scalar and per-criterion scores for this body.
    pub fn derive_score(&self, activity: &Activity, config: &ScoringConfig) -> NormalizedScore {
        let criteria = &activity.success_criteria;
        let explicit = self.explicit_criteria();
        let override_score = self.override_score();

        let (auto_score, effective_score, is_correct) = match self {
            SubmissionBody::MultipleChoice(b) => {
                let correct_option = match &activity.kind {
                    ActivityKind::MultipleChoice { correct_option_id } => {
                        Some(correct_option_id.as_str())
                    }
                    _ => None,
                };
                // No answer means nothing to mark automatically.
                let answered_correctly = b
                    .answer_chosen
                    .as_deref()
                    .map(|chosen| correct_option == Some(chosen));
                let auto = answered_correctly.map(|ok| if ok { 1.0 } else { 0.0 });
                let effective = override_score.or(auto);
                let is_correct = match override_score {
                    Some(o) => Some(o >= config.correctness_threshold),
                    None => answered_correctly,
                };
                (auto, effective, is_correct)
            }
            SubmissionBody::ShortText(b) => {
                let effective = override_score.or(b.ai_model_score);
                let is_correct = effective.map(|s| s >= config.correctness_threshold);
                (b.ai_model_score, effective, is_correct)
            }
            SubmissionBody::Generic(b) => {
                let effective = override_score
                    .or(b.score)
                    .or_else(|| explicit.and_then(|map| mean_of_declared(map, criteria)));
                (b.score, effective, None)
            }
        };

        NormalizedScore {
            effective_score,
            auto_score,
            override_score,
            is_correct,
            success_criteria_scores: fill_criteria(criteria, explicit, effective_score),
        }
    }

    fn check_ranges(&self, kind: &ActivityKind) -> Result<()> {
        let subject = format!("{kind} submission body");
        let scalars = [
            ("teacher_override_score", self.override_score()),
            ("ai_model_score", self.ai_score()),
            (
                "score",
                match self {
                    SubmissionBody::Generic(b) => b.score,
                    _ => None,
                },
            ),
        ];
        for (field, value) in scalars {
            if let Some(v) = value {
                check_unit_score(&subject, field, v)?;
            }
        }
        let maps = [
            ("success_criteria_scores", self.own_criteria()),
            ("teacher_override_criteria", self.override_criteria()),
        ];
        for (field, map) in maps {
            for (criterion, v) in map.into_iter().flatten() {
                check_unit_score(&subject, &format!("{field}.{criterion}"), *v)?;
            }
        }
        Ok(())
    }
}

fn decode<T: serde::de::DeserializeOwned>(kind: &ActivityKind, raw: &serde_json::Value) -> Result<T> {
    if !raw.is_object() {
        return Err(ProgressError::validation(
            format!("{kind} submission body"),
            "expected a JSON object",
        ));
    }
    T::deserialize(raw)
        .map_err(|e| ProgressError::validation(format!("{kind} submission body"), e.to_string()))
}

/// Build the per-criterion map: explicit values where given (0 for declared
/// criteria the map omits), otherwise the effective score broadcast.
fn fill_criteria(
    criteria: &[String],
    explicit: Option<&BTreeMap<String, f64>>,
    effective: Option<f64>,
) -> BTreeMap<String, f64> {
    let broadcast = effective.unwrap_or(0.0);
    criteria
        .iter()
        .map(|c| {
            let value = match explicit {
                Some(map) => map.get(c).copied().unwrap_or(0.0),
                None => broadcast,
            };
            (c.clone(), value)
        })
        .collect()
}

fn mean_of_declared(map: &BTreeMap<String, f64>, criteria: &[String]) -> Option<f64> {
    let values: Vec<f64> = criteria.iter().filter_map(|c| map.get(c).copied()).collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn activity(kind: ActivityKind, criteria: &[&str]) -> Activity {
        Activity {
            id: "a1".into(),
            title: String::new(),
            kind,
            is_summative: false,
            scorable: true,
            success_criteria: criteria.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn mcq() -> ActivityKind {
        ActivityKind::MultipleChoice {
            correct_option_id: "B".into(),
        }
    }

    #[test]
    fn multiple_choice_correct_answer_broadcasts() {
        let act = activity(mcq(), &["C1", "C2"]);
        let body = SubmissionBody::parse(&act.kind, &json!({"answer_chosen": "B"})).unwrap();
        let score = body.derive_score(&act, &ScoringConfig::default());

        assert_eq!(score.auto_score, Some(1.0));
        assert_eq!(score.effective_score, Some(1.0));
        assert_eq!(score.is_correct, Some(true));
        assert_eq!(score.success_criteria_scores["C1"], 1.0);
        assert_eq!(score.success_criteria_scores["C2"], 1.0);
    }

    #[test]
    fn multiple_choice_wrong_answer_scores_zero() {
        let act = activity(mcq(), &["C1"]);
        let body = SubmissionBody::parse(&act.kind, &json!({"answer_chosen": "A"})).unwrap();
        let score = body.derive_score(&act, &ScoringConfig::default());
        assert_eq!(score.auto_score, Some(0.0));
        assert_eq!(score.is_correct, Some(false));
        assert_eq!(score.success_criteria_scores["C1"], 0.0);
    }

    #[test]
    fn explicit_map_beats_broadcast_and_zero_fills() {
        let act = activity(mcq(), &["C1", "C2"]);
        let raw = json!({
            "answer_chosen": "B",
            "success_criteria_scores": {"C1": 0.25, "stray": 1.0}
        });
        let body = SubmissionBody::parse(&act.kind, &raw).unwrap();
        let score = body.derive_score(&act, &ScoringConfig::default());
        assert_eq!(score.success_criteria_scores.len(), 2);
        assert_eq!(score.success_criteria_scores["C1"], 0.25);
        assert_eq!(score.success_criteria_scores["C2"], 0.0);
    }

    #[test]
    fn short_text_below_threshold_is_incorrect() {
        let act = activity(ActivityKind::ShortText, &["C1"]);
        let body = SubmissionBody::parse(
            &act.kind,
            &json!({"answer": "photosynthesis", "ai_model_score": 0.6}),
        )
        .unwrap();
        let score = body.derive_score(&act, &ScoringConfig::default());
        assert_eq!(score.effective_score, Some(0.6));
        assert_eq!(score.is_correct, Some(false));
        assert_eq!(score.success_criteria_scores["C1"], 0.6);
    }

    #[test]
    fn short_text_override_recomputes_correctness() {
        let act = activity(ActivityKind::ShortText, &["C1"]);
        let raw = json!({"answer": "x", "ai_model_score": 0.6, "teacher_override_score": 0.9});
        let body = SubmissionBody::parse(&act.kind, &raw).unwrap();
        let score = body.derive_score(&act, &ScoringConfig::default());
        assert_eq!(score.auto_score, Some(0.6));
        assert_eq!(score.override_score, Some(0.9));
        assert_eq!(score.effective_score, Some(0.9));
        assert_eq!(score.is_correct, Some(true));
    }

    #[test]
    fn short_text_without_ai_score_has_nothing_effective() {
        let act = activity(ActivityKind::ShortText, &["C1"]);
        let body = SubmissionBody::parse(&act.kind, &json!({"answer": "x"})).unwrap();
        let score = body.derive_score(&act, &ScoringConfig::default());
        assert_eq!(score.effective_score, None);
        assert_eq!(score.is_correct, None);
        assert_eq!(score.success_criteria_scores["C1"], 0.0);
    }

    #[test]
    fn generic_upload_waiting_for_review() {
        let act = activity(ActivityKind::Generic, &["C1"]);
        let raw = json!({"file_name": "essay.pdf"});
        let body = SubmissionBody::parse(&act.kind, &raw).unwrap();
        let score = body.derive_score(&act, &ScoringConfig::default());
        assert_eq!(score.effective_score, None);
        assert_eq!(score.success_criteria_scores["C1"], 0.0);

        // Unknown fields survive a round trip through the typed body.
        assert_eq!(body.to_value().unwrap()["file_name"], "essay.pdf");
    }

    #[test]
    fn generic_scalar_from_criteria_map() {
        let act = activity(ActivityKind::Generic, &["C1", "C2"]);
        let raw = json!({"success_criteria_scores": {"C1": 1.0, "C2": 0.5}});
        let body = SubmissionBody::parse(&act.kind, &raw).unwrap();
        let score = body.derive_score(&act, &ScoringConfig::default());
        assert_eq!(score.effective_score, Some(0.75));
        assert_eq!(score.success_criteria_scores["C2"], 0.5);
    }

    #[test]
    fn generic_override_alias() {
        let act = activity(ActivityKind::Generic, &[]);
        let raw = json!({"score": 0.4, "override_score": 0.7});
        let body = SubmissionBody::parse(&act.kind, &raw).unwrap();
        let score = body.derive_score(&act, &ScoringConfig::default());
        assert_eq!(score.auto_score, Some(0.4));
        assert_eq!(score.effective_score, Some(0.7));
        assert!(score.success_criteria_scores.is_empty());
    }

    #[test]
    fn malformed_bodies_fail_validation() {
        let kind = ActivityKind::ShortText;
        assert!(matches!(
            SubmissionBody::parse(&kind, &json!("just a string")),
            Err(ProgressError::Validation { .. })
        ));
        assert!(SubmissionBody::parse(&kind, &json!({"ai_model_score": "high"})).is_err());
        assert!(SubmissionBody::parse(&kind, &json!({"ai_model_score": 1.2})).is_err());
        assert!(SubmissionBody::parse(
            &ActivityKind::Generic,
            &json!({"success_criteria_scores": {"C1": -0.5}})
        )
        .is_err());
    }

    #[test]
    fn unanswered_multiple_choice_has_no_auto_score() {
        let act = activity(mcq(), &["C1"]);
        let body = SubmissionBody::parse(&act.kind, &json!({})).unwrap();
        let score = body.derive_score(&act, &ScoringConfig::default());
        assert_eq!(score.auto_score, None);
        assert_eq!(score.effective_score, None);
        assert_eq!(score.is_correct, None);
    }

    #[test]
    fn override_criteria_do_not_replace_own_map() {
        let act = activity(ActivityKind::Generic, &["C1", "C2"]);
        let raw = json!({"file_name": "e.pdf", "success_criteria_scores": {"C1": 1.0, "C2": 0.5}});
        let mut body = SubmissionBody::parse(&act.kind, &raw).unwrap();
        let config = ScoringConfig::default();

        body.set_override(0.2, Some(BTreeMap::from([("C1".to_string(), 0.2)])));
        let overridden = body.derive_score(&act, &config);
        assert_eq!(overridden.effective_score, Some(0.2));
        assert_eq!(overridden.success_criteria_scores["C1"], 0.2);
        assert_eq!(overridden.success_criteria_scores["C2"], 0.0);

        let stored = body.to_value().unwrap();
        assert_eq!(stored["success_criteria_scores"]["C1"], 1.0);
        assert_eq!(stored["teacher_override_criteria"]["C1"], 0.2);

        body.clear_override();
        let reset = body.derive_score(&act, &config);
        assert_eq!(reset.override_score, None);
        assert_eq!(reset.effective_score, Some(0.75));
        assert_eq!(reset.success_criteria_scores["C1"], 1.0);
        assert_eq!(reset.success_criteria_scores["C2"], 0.5);
        assert!(body.to_value().unwrap().get("teacher_override_criteria").is_none());
    }

    #[test]
    fn placeholder_flag_round_trips() {
        let kind = mcq();
        let body = SubmissionBody::placeholder_for(&kind);
        let stored = body.to_value().unwrap();
        assert_eq!(stored["override_placeholder"], true);
        assert!(SubmissionBody::parse(&kind, &stored).unwrap().is_placeholder());

        let real = SubmissionBody::parse(&kind, &json!({"answer_chosen": "B"})).unwrap();
        assert!(!real.is_placeholder());
        assert!(real.to_value().unwrap().get("override_placeholder").is_none());
    }

    #[test]
    fn override_and_clear_preserve_ai_score() {
        let kind = ActivityKind::ShortText;
        let mut body =
            SubmissionBody::parse(&kind, &json!({"answer": "x", "ai_model_score": 0.6})).unwrap();
        body.set_override(0.9, None);
        assert_eq!(body.override_score(), Some(0.9));
        assert_eq!(body.ai_score(), Some(0.6));

        body.clear_override();
        assert_eq!(body.override_score(), None);
        assert_eq!(body.ai_score(), Some(0.6));

        assert!(body.clear_ai_score());
        assert!(!body.clear_ai_score());
    }
}
