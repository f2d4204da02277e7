//! Configuration: scoring thresholds and the level-label band table.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::level::NOT_ESTABLISHED;
use crate::traits::LevelLabelLookup;

/// Thresholds used while scoring and deriving levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Effective score at or above which a short-text answer counts as correct.
    #[serde(default = "default_correctness_threshold")]
    pub correctness_threshold: f64,
    /// Positive-feedback fraction a level bucket must exceed to count.
    #[serde(default = "default_working_level_threshold")]
    pub working_level_threshold: f64,
}

fn default_correctness_threshold() -> f64 {
    0.8
}

fn default_working_level_threshold() -> f64 {
    0.5
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            correctness_threshold: default_correctness_threshold(),
            working_level_threshold: default_working_level_threshold(),
        }
    }
}

/// One row of the year/score → label table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelBand {
    /// Year group this band applies to; `None` applies to every year.
    #[serde(default)]
    pub year: Option<i32>,
    /// Lowest assessment average (0..=1) that earns this label.
    pub min: f64,
    pub label: String,
}

/// Band table used as the level-label lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelBands {
    #[serde(default)]
    pub bands: Vec<LevelBand>,
}

impl LevelLabelLookup for LevelBands {
    fn label(&self, year: i32, average: f64) -> String {
        // Year-specific bands shadow the catch-all ones.
        let specific: Vec<&LevelBand> =
            self.bands.iter().filter(|b| b.year == Some(year)).collect();
        let candidates: Vec<&LevelBand> = if specific.is_empty() {
            self.bands.iter().filter(|b| b.year.is_none()).collect()
        } else {
            specific
        };

        candidates
            .into_iter()
            .filter(|b| average >= b.min)
            .max_by(|a, b| a.min.total_cmp(&b.min))
            .map(|b| b.label.clone())
            .unwrap_or_else(|| NOT_ESTABLISHED.to_string())
    }
}

/// Top-level attainment configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttainmentConfig {
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub levels: LevelBands,
    /// Default snapshot file used by the CLI.
    #[serde(default)]
    pub snapshot: Option<PathBuf>,
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `attainment.toml` in the current directory
/// 2. `~/.config/attainment/config.toml`
///
/// Environment variable overrides: `ATTAINMENT_CORRECTNESS_THRESHOLD`,
/// `ATTAINMENT_WORKING_LEVEL_THRESHOLD`.
pub fn load_config() -> Result<AttainmentConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<AttainmentConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("attainment.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|dir| dir.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => AttainmentConfig::default(),
    };

    if let Ok(raw) = std::env::var("ATTAINMENT_CORRECTNESS_THRESHOLD") {
        config.scoring.correctness_threshold = raw
            .parse()
            .with_context(|| format!("ATTAINMENT_CORRECTNESS_THRESHOLD is not a number: {raw}"))?;
    }
    if let Ok(raw) = std::env::var("ATTAINMENT_WORKING_LEVEL_THRESHOLD") {
        config.scoring.working_level_threshold = raw.parse().with_context(|| {
            format!("ATTAINMENT_WORKING_LEVEL_THRESHOLD is not a number: {raw}")
        })?;
    }

    validate_scoring(&config.scoring)?;
    Ok(config)
}

/// Parse a TOML string into a config (useful for testing).
pub fn parse_config(content: &str) -> Result<AttainmentConfig> {
    let config: AttainmentConfig = toml::from_str(content)?;
    validate_scoring(&config.scoring)?;
    Ok(config)
}

fn validate_scoring(scoring: &ScoringConfig) -> Result<()> {
    for (name, value) in [
        ("correctness_threshold", scoring.correctness_threshold),
        ("working_level_threshold", scoring.working_level_threshold),
    ] {
        if !(0.0..=1.0).contains(&value) {
            anyhow::bail!("scoring.{name} must be within [0, 1], got {value}");
        }
    }
    Ok(())
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("attainment"))
}
