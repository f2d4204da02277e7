//! The `attainment report` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use attainment_core::model::CellStatus;
use attainment_core::report::UnitReport;
use attainment_core::TraceContext;

use super::{level, pct, Paths, Workspace};

pub async fn execute(
    paths: &Paths,
    unit_id: String,
    pupil_id: Option<String>,
    format: String,
    output: Option<PathBuf>,
) -> Result<()> {
    let workspace = Workspace::open(paths)?;
    let engine = workspace.engine();
    let ctx = TraceContext::new("unit_report");

    let report = engine
        .unit_report(&ctx, &unit_id, pupil_id.as_deref())
        .await?;

    if let Some(path) = &output {
        report.save_json(path)?;
        eprintln!("Report saved to {}", path.display());
    }

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_text(&report, pupil_id.is_some()),
    }
    Ok(())
}

fn print_text(report: &UnitReport, detailed: bool) {
    println!(
        "Unit {} — {} ({}, year {})",
        report.unit.id, report.unit.title, report.unit.subject, report.unit.year
    );

    let mut table = Table::new();
    table.set_header(vec![
        "Pupil",
        "Activities avg",
        "Assessment avg",
        "Assessment level",
        "Working level",
        "Needs marking",
    ]);
    for row in &report.pupils {
        let needs_marking = row.cells.iter().filter(|c| c.needs_marking).count();
        table.add_row(vec![
            Cell::new(&row.pupil.name),
            Cell::new(pct(row.summary.activities_average)),
            Cell::new(pct(row.summary.assessment_average)),
            Cell::new(&row.summary.assessment_level_label),
            Cell::new(level(row.summary.working_level)),
            Cell::new(needs_marking),
        ]);
    }
    println!("{table}");

    if !detailed {
        return;
    }

    for row in &report.pupils {
        let mut cells = Table::new();
        cells.set_header(vec!["Activity", "Status", "Score", "Auto", "Override", "Correct"]);
        for cell in &row.cells {
            let status = match (cell.status, cell.needs_marking) {
                (CellStatus::Missing, true) => "needs marking",
                (CellStatus::Missing, false) => "missing",
                (CellStatus::Auto, _) => "auto",
                (CellStatus::Override, _) => "override",
            };
            cells.add_row(vec![
                Cell::new(&cell.activity_id),
                Cell::new(status),
                Cell::new(format!("{:.2}", cell.score)),
                Cell::new(cell.auto_score.map_or("-".into(), |s| format!("{s:.2}"))),
                Cell::new(cell.override_score.map_or("-".into(), |s| format!("{s:.2}"))),
                Cell::new(cell.is_correct.map_or("-", |c| if c { "yes" } else { "no" })),
            ]);
        }
        println!("\n{}\n{cells}", row.pupil.name);

        let mut criteria = Table::new();
        criteria.set_header(vec!["Level", "Criterion", "Activities avg", "Assessment avg", "Feedback"]);
        for criterion in row.summary.criteria() {
            criteria.add_row(vec![
                Cell::new(criterion.level),
                Cell::new(criterion.criterion_id()),
                Cell::new(pct(criterion.summary.activities_average)),
                Cell::new(pct(criterion.summary.assessment_average)),
                Cell::new(criterion.feedback.text().unwrap_or("")),
            ]);
        }
        println!("{criteria}");
    }
}
