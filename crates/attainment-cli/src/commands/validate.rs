//! The `attainment validate` command.

use anyhow::Result;

use super::{Paths, Workspace};

pub fn execute(paths: &Paths, strict: bool) -> Result<()> {
    let workspace = Workspace::open(paths)?;
    let dataset = workspace.store.dataset()?;

    println!(
        "Snapshot: {} ({} units, {} activities, {} pupils, {} submissions)",
        workspace.snapshot_path().display(),
        dataset.units.len(),
        dataset.activities.len(),
        dataset.pupils.len(),
        dataset.submissions.len()
    );

    let issues = dataset.validate();
    for issue in &issues {
        println!("  [{} {}] WARNING: {}", issue.kind, issue.id, issue.message);
    }

    if issues.is_empty() {
        println!("Snapshot valid.");
    } else {
        println!("\n{} issue(s) found.", issues.len());
        anyhow::ensure!(!strict, "{} validation issue(s)", issues.len());
    }
    Ok(())
}
