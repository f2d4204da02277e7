//! The `attainment override`, `reset` and `clear-ai-marks` commands.

use std::collections::BTreeMap;

use anyhow::{Context, Result};

use attainment_core::mutation::{self, OverrideRequest};
use attainment_core::TraceContext;

use super::{Paths, Workspace};

/// Parse repeated `ID=SCORE` arguments.
fn parse_criteria(raw: &[String]) -> Result<Option<BTreeMap<String, f64>>> {
    if raw.is_empty() {
        return Ok(None);
    }
    let mut map = BTreeMap::new();
    for item in raw {
        let (id, score) = item
            .split_once('=')
            .with_context(|| format!("expected CRITERION=SCORE, got {item:?}"))?;
        let score: f64 = score
            .trim()
            .parse()
            .with_context(|| format!("invalid score for criterion {id}: {score:?}"))?;
        map.insert(id.trim().to_string(), score);
    }
    Ok(Some(map))
}

pub async fn override_score(
    paths: &Paths,
    activity_id: String,
    pupil_id: String,
    score: f64,
    feedback: Option<String>,
    criteria: Vec<String>,
) -> Result<()> {
    let workspace = Workspace::open(paths)?;
    let request = OverrideRequest {
        activity_id,
        pupil_id,
        score,
        feedback,
        criterion_scores: parse_criteria(&criteria)?,
    };

    let ctx = TraceContext::new("override");
    let submission_id =
        mutation::apply_override(workspace.store.as_ref(), &ctx, &request).await?;

    println!(
        "Override {:.2} recorded for {} on {} (submission {submission_id}) in {}",
        request.score,
        request.pupil_id,
        request.activity_id,
        workspace.snapshot_path().display()
    );
    Ok(())
}

pub async fn reset(paths: &Paths, activity_id: String, pupil_id: String) -> Result<()> {
    let workspace = Workspace::open(paths)?;
    let ctx = TraceContext::new("reset");
    mutation::reset_override(workspace.store.as_ref(), &ctx, &activity_id, &pupil_id).await?;
    println!("Override cleared for {pupil_id} on {activity_id}");
    Ok(())
}

pub async fn clear_ai_marks(paths: &Paths, activity_id: String) -> Result<()> {
    let workspace = Workspace::open(paths)?;
    let ctx = TraceContext::new("clear_ai_marks");
    let outcome =
        mutation::clear_ai_marks(workspace.store.as_ref(), &ctx, &activity_id).await?;

    println!(
        "Cleared {} AI mark(s) on {activity_id}, {} failed",
        outcome.cleared, outcome.failed
    );
    for id in &outcome.failed_submissions {
        println!("  failed: {id}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn criteria_arguments() {
        assert_eq!(parse_criteria(&[]).unwrap(), None);

        let parsed = parse_criteria(&["C1=0.5".to_string(), " C2 = 1 ".to_string()])
            .unwrap()
            .unwrap();
        assert_eq!(parsed["C1"], 0.5);
        assert_eq!(parsed["C2"], 1.0);

        assert!(parse_criteria(&["C1".to_string()]).is_err());
        assert!(parse_criteria(&["C1=high".to_string()]).is_err());
    }
}
