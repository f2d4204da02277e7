//! Subcommand implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use attainment_core::config::{load_config_from, AttainmentConfig};
use attainment_core::ProgressEngine;
use attainment_store::JsonFileStore;

pub mod compare;
pub mod init;
pub mod mutate;
pub mod report;
pub mod subject;
pub mod validate;

/// Snapshot file used when neither `--snapshot` nor the config names one.
pub const DEFAULT_SNAPSHOT: &str = "attainment-snapshot.json";

/// Paths given on the command line.
pub struct Paths {
    pub config: Option<PathBuf>,
    pub snapshot: Option<PathBuf>,
}

/// Config and store shared by the commands that read a snapshot.
pub struct Workspace {
    pub config: AttainmentConfig,
    pub store: Arc<JsonFileStore>,
}

impl Workspace {
    pub fn open(paths: &Paths) -> Result<Self> {
        let config = load_config_from(paths.config.as_deref())?;
        let snapshot = paths
            .snapshot
            .clone()
            .or_else(|| config.snapshot.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT));
        let store = JsonFileStore::open(&snapshot).with_context(|| {
            format!(
                "failed to open snapshot {} (run `attainment init` to create a sample)",
                snapshot.display()
            )
        })?;
        Ok(Self {
            config,
            store: Arc::new(store),
        })
    }

    pub fn engine(&self) -> ProgressEngine {
        ProgressEngine::new(
            self.store.clone(),
            Arc::new(self.config.levels.clone()),
            self.config.scoring,
        )
    }

    pub fn snapshot_path(&self) -> &Path {
        self.store.path()
    }
}

/// Render an optional fraction as a percentage.
pub fn pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}%", v * 100.0),
        None => "-".to_string(),
    }
}

/// Render an optional working level.
pub fn level(value: Option<u8>) -> String {
    value.map_or_else(|| "-".to_string(), |l| l.to_string())
}
