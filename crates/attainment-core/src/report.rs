//! Report types with JSON persistence and progress comparison.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{Cell, Pupil, Unit};
use crate::rollup::{SubjectSummary, UnitSummary};

/// One pupil's row in a unit report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PupilUnitReport {
    pub pupil: Pupil,
    pub cells: Vec<Cell>,
    pub summary: UnitSummary,
}

/// A complete unit report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitReport {
    /// Request id of the run that built this report.
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub unit: Unit,
    /// Pupils in assignment order.
    pub pupils: Vec<PupilUnitReport>,
}

/// A pupil's report across the units of one subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectReport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub summary: SubjectSummary,
    pub units: Vec<UnitSummary>,
}

impl UnitReport {
    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: UnitReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    pub fn pupil(&self, pupil_id: &str) -> Option<&PupilUnitReport> {
        self.pupils.iter().find(|p| p.pupil.id == pupil_id)
    }

    /// Compare this report against an earlier one for the same unit.
    ///
    /// Pupils whose unit activities average moved by more than `threshold`
    /// are listed as declines or improvements. A pupil with no average in
    /// either report is counted as unchanged.
    pub fn compare(&self, baseline: &UnitReport, threshold: f64) -> ProgressComparison {
        let averages = |report: &UnitReport| -> HashMap<String, Option<f64>> {
            report
                .pupils
                .iter()
                .map(|p| (p.pupil.id.clone(), p.summary.activities_average))
                .collect()
        };

        let baseline_avgs = averages(baseline);
        let current_avgs = averages(self);

        let mut declines = Vec::new();
        let mut improvements = Vec::new();
        let mut unchanged = 0usize;
        let mut new_pupils = 0usize;

        for pupil in &self.pupils {
            let id = &pupil.pupil.id;
            let Some(&baseline_avg) = baseline_avgs.get(id) else {
                new_pupils += 1;
                continue;
            };
            let current_avg = current_avgs.get(id).copied().flatten();
            let change = ProgressChange {
                pupil_id: id.clone(),
                pupil_name: pupil.pupil.name.clone(),
                baseline_average: baseline_avg.unwrap_or(0.0),
                current_average: current_avg.unwrap_or(0.0),
                delta: current_avg.unwrap_or(0.0) - baseline_avg.unwrap_or(0.0),
            };
            if baseline_avg.is_none() && current_avg.is_none() {
                unchanged += 1;
            } else if change.delta < -threshold {
                declines.push(change);
            } else if change.delta > threshold {
                improvements.push(change);
            } else {
                unchanged += 1;
            }
        }

        let removed_pupils = baseline_avgs
            .keys()
            .filter(|k| !current_avgs.contains_key(*k))
            .count();

        ProgressComparison {
            unit_id: self.unit.id.clone(),
            declines,
            improvements,
            unchanged,
            new_pupils,
            removed_pupils,
        }
    }
}

/// Result of comparing two unit reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressComparison {
    pub unit_id: String,
    /// Pupils whose average went down.
    pub declines: Vec<ProgressChange>,
    /// Pupils whose average went up.
    pub improvements: Vec<ProgressChange>,
    pub unchanged: usize,
    /// Pupils in current but not baseline.
    pub new_pupils: usize,
    /// Pupils in baseline but not current.
    pub removed_pupils: usize,
}

/// A pupil whose average moved past the threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressChange {
    pub pupil_id: String,
    pub pupil_name: String,
    pub baseline_average: f64,
    pub current_average: f64,
    pub delta: f64,
}

impl ProgressComparison {
    /// Format the comparison as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "**Unit {}:** {} declines, {} improvements, {} unchanged\n\n",
            self.unit_id,
            self.declines.len(),
            self.improvements.len(),
            self.unchanged
        ));

        for (heading, rows) in [
            ("Declines", &self.declines),
            ("Improvements", &self.improvements),
        ] {
            if rows.is_empty() {
                continue;
            }
            md.push_str(&format!("### {heading}\n\n"));
            md.push_str("| Pupil | Baseline | Current | Delta |\n");
            md.push_str("|-------|----------|---------|-------|\n");
            for r in rows {
                md.push_str(&format!(
                    "| {} | {:.1}% | {:.1}% | {:+.1}% |\n",
                    display_name(r),
                    r.baseline_average * 100.0,
                    r.current_average * 100.0,
                    r.delta * 100.0
                ));
            }
            md.push('\n');
        }

        md
    }

    pub fn has_declines(&self) -> bool {
        !self.declines.is_empty()
    }
}

fn display_name(change: &ProgressChange) -> &str {
    if change.pupil_name.is_empty() {
        &change.pupil_id
    } else {
        &change.pupil_name
    }
}
