//! The `attainment compare` command.

use std::path::PathBuf;

use anyhow::Result;

use attainment_core::report::{ProgressChange, UnitReport};

use super::pct;

pub fn execute(
    baseline_path: PathBuf,
    current_path: PathBuf,
    threshold: f64,
    fail_on_decline: bool,
    format: String,
) -> Result<()> {
    let baseline = UnitReport::load_json(&baseline_path)?;
    let current = UnitReport::load_json(&current_path)?;
    anyhow::ensure!(
        baseline.unit.id == current.unit.id,
        "reports are for different units: {} vs {}",
        baseline.unit.id,
        current.unit.id
    );

    let comparison = current.compare(&baseline, threshold);

    match format.as_str() {
        "markdown" | "md" => println!("{}", comparison.to_markdown()),
        "json" => println!("{}", serde_json::to_string_pretty(&comparison)?),
        _ => {
            println!(
                "Comparison: {} declines, {} improvements, {} unchanged",
                comparison.declines.len(),
                comparison.improvements.len(),
                comparison.unchanged
            );
            print_changes("Declines", &comparison.declines);
            print_changes("Improvements", &comparison.improvements);
            if comparison.new_pupils > 0 {
                println!("\n{} new pupil(s)", comparison.new_pupils);
            }
            if comparison.removed_pupils > 0 {
                println!("{} removed pupil(s)", comparison.removed_pupils);
            }
        }
    }

    if fail_on_decline && comparison.has_declines() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_changes(heading: &str, changes: &[ProgressChange]) {
    if changes.is_empty() {
        return;
    }
    println!("\n{heading}:");
    for c in changes {
        println!(
            "  {} {} -> {} ({:+.1}%)",
            c.pupil_id,
            pct(Some(c.baseline_average)),
            pct(Some(c.current_average)),
            c.delta * 100.0
        );
    }
}
