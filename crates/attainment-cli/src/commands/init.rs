//! The `attainment init` command.

use std::path::Path;

use anyhow::Result;

use attainment_store::{Dataset, JsonFileStore};

use super::DEFAULT_SNAPSHOT;

pub fn execute() -> Result<()> {
    if Path::new("attainment.toml").exists() {
        println!("attainment.toml already exists, skipping.");
    } else {
        std::fs::write("attainment.toml", SAMPLE_CONFIG)?;
        println!("Created attainment.toml");
    }

    let snapshot = Path::new(DEFAULT_SNAPSHOT);
    if snapshot.exists() {
        println!("{DEFAULT_SNAPSHOT} already exists, skipping.");
    } else {
        JsonFileStore::write_dataset(snapshot, &Dataset::sample())?;
        println!("Created {DEFAULT_SNAPSHOT}");
    }

    println!("\nNext steps:");
    println!("  1. Run: attainment validate");
    println!("  2. Run: attainment report --unit cells");
    println!("  3. Run: attainment subject --subject science --pupil p-ada");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# attainment configuration

snapshot = "attainment-snapshot.json"

[scoring]
# Short-text answers at or above this effective score count as correct.
correctness_threshold = 0.8
# A level bucket counts towards the working level above this fraction.
working_level_threshold = 0.5

# Assessment level labels. Bands with a year apply to that year group only
# and shadow the bands without one.
[[levels.bands]]
min = 0.0
label = "Emerging"

[[levels.bands]]
min = 0.5
label = "Developing"

[[levels.bands]]
min = 0.8
label = "Secure"

[[levels.bands]]
year = 11
min = 0.7
label = "Grade 7+"
"#;
