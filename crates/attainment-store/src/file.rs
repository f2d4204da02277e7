//! JSON snapshot-file store used by the CLI.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use attainment_core::model::{
    Activity, Curriculum, FeedbackDraft, FeedbackEntry, Pupil, Submission, Unit,
};
use attainment_core::traits::ProgressStore;

use crate::dataset::Dataset;
use crate::error::StoreError;
use crate::memory::MemoryStore;

/// A store loaded from a JSON snapshot file.
///
/// Reads are served from memory. A write is applied to a copy of the
/// dataset, the copy is written through a sibling temp file and a rename,
/// and only then does it replace what readers see. A failed write leaves
/// both the file and the in-memory state untouched. Writes are serialized
/// by `write_lock`.
pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Load a snapshot file.
    pub fn open(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let dataset: Dataset =
            serde_json::from_str(&content).map_err(|source| StoreError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::debug!(
            path = %path.display(),
            units = dataset.units.len(),
            submissions = dataset.submissions.len(),
            "opened snapshot"
        );
        Ok(Self {
            path: path.to_path_buf(),
            inner: MemoryStore::new(dataset),
            write_lock: Mutex::new(()),
        })
    }

    /// Write a dataset to a new snapshot file.
    pub fn write_dataset(path: &Path, dataset: &Dataset) -> Result<()> {
        let json = serde_json::to_string_pretty(dataset).context("failed to serialize snapshot")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write snapshot to {}", path.display()))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A copy of the current dataset.
    pub fn dataset(&self) -> Result<Dataset> {
        self.inner.snapshot()
    }

    async fn persist(&self, dataset: &Dataset) -> Result<()> {
        let json =
            serde_json::to_string_pretty(dataset).context("failed to serialize snapshot")?;
        let tmp = self.path.with_extension("json.tmp");
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        tokio::fs::write(&tmp, json).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        tracing::debug!(path = %self.path.display(), "persisted snapshot");
        Ok(())
    }
}

#[async_trait]
impl ProgressStore for JsonFileStore {
    fn name(&self) -> &str {
        "json-file"
    }

    async fn unit(&self, unit_id: &str) -> anyhow::Result<Option<Unit>> {
        self.inner.unit(unit_id).await
    }

    async fn units_for_subject(&self, subject: &str) -> anyhow::Result<Vec<Unit>> {
        self.inner.units_for_subject(subject).await
    }

    async fn curriculum(&self, unit_id: &str) -> anyhow::Result<Curriculum> {
        self.inner.curriculum(unit_id).await
    }

    async fn activities(&self, unit_id: &str) -> anyhow::Result<Vec<Activity>> {
        self.inner.activities(unit_id).await
    }

    async fn pupils(&self, unit_id: &str) -> anyhow::Result<Vec<Pupil>> {
        self.inner.pupils(unit_id).await
    }

    async fn submissions(&self, activity_ids: &[String]) -> anyhow::Result<Vec<Submission>> {
        self.inner.submissions(activity_ids).await
    }

    async fn feedback(&self, pupil_ids: &[String]) -> anyhow::Result<Vec<FeedbackEntry>> {
        self.inner.feedback(pupil_ids).await
    }

    async fn activity(&self, activity_id: &str) -> anyhow::Result<Option<Activity>> {
        self.inner.activity(activity_id).await
    }

    async fn save_submission(&self, submission: Submission) -> anyhow::Result<Uuid> {
        let _guard = self.write_lock.lock().await;
        let mut next = self.inner.snapshot()?;
        let id = next.upsert_submission(submission);
        self.persist(&next).await?;
        self.inner.replace(next)?;
        Ok(id)
    }

    async fn append_feedback(&self, draft: FeedbackDraft) -> anyhow::Result<FeedbackEntry> {
        let _guard = self.write_lock.lock().await;
        let mut next = self.inner.snapshot()?;
        let entry = next.append_feedback(draft);
        self.persist(&next).await?;
        self.inner.replace(next)?;
        Ok(entry)
    }
}
