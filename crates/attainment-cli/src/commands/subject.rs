//! The `attainment subject` command.

use anyhow::Result;
use comfy_table::{Cell, Table};

use attainment_core::TraceContext;

use super::{level, pct, Paths, Workspace};

pub async fn execute(
    paths: &Paths,
    subject: String,
    pupil_id: String,
    format: String,
) -> Result<()> {
    let workspace = Workspace::open(paths)?;
    let engine = workspace.engine();
    let ctx = TraceContext::new("subject_report");

    let report = engine.subject_report(&ctx, &subject, &pupil_id).await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "Unit",
        "Activities avg",
        "Assessment avg",
        "Assessment level",
        "Working level",
    ]);
    for unit in &report.units {
        table.add_row(vec![
            Cell::new(&unit.unit_id),
            Cell::new(pct(unit.activities_average)),
            Cell::new(pct(unit.assessment_average)),
            Cell::new(&unit.assessment_level_label),
            Cell::new(level(unit.working_level)),
        ]);
    }
    println!("Subject {subject} for {pupil_id}\n{table}");
    println!(
        "Subject working level: {}",
        level(report.summary.working_level)
    );
    Ok(())
}
