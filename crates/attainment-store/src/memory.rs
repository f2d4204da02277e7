//! In-memory store for tests and embedding.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use attainment_core::model::{
    Activity, Curriculum, FeedbackDraft, FeedbackEntry, Pupil, Submission, Unit,
};
use attainment_core::traits::ProgressStore;

use crate::dataset::Dataset;
use crate::error::StoreError;

/// A [`ProgressStore`] over a [`Dataset`] held behind a mutex.
///
/// Each write takes the lock once, so concurrent upserts to the same
/// submission are applied one after the other. Failures can be injected to
/// exercise the engine's fail-closed paths.
pub struct MemoryStore {
    dataset: Mutex<Dataset>,
    /// When set, every read fails with this message.
    read_failure: Option<String>,
    /// Submissions whose writes are rejected.
    rejected_writes: HashSet<Uuid>,
    /// Number of successful writes.
    write_count: AtomicU32,
}

impl MemoryStore {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset: Mutex::new(dataset),
            read_failure: None,
            rejected_writes: HashSet::new(),
            write_count: AtomicU32::new(0),
        }
    }

    /// Make every read fail, as if the backing database were down.
    pub fn with_read_failure(mut self, message: &str) -> Self {
        self.read_failure = Some(message.to_string());
        self
    }

    /// Reject writes to one submission.
    pub fn with_rejected_write(mut self, submission_id: Uuid) -> Self {
        self.rejected_writes.insert(submission_id);
        self
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> u32 {
        self.write_count.load(Ordering::Relaxed)
    }

    /// A copy of the current dataset.
    pub fn snapshot(&self) -> anyhow::Result<Dataset> {
        Ok(self.lock()?.clone())
    }

    /// Swap in a whole dataset.
    pub(crate) fn replace(&self, dataset: Dataset) -> anyhow::Result<()> {
        *self.lock()? = dataset;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Dataset>, StoreError> {
        self.dataset.lock().map_err(|_| StoreError::Poisoned)
    }

    fn read(&self) -> anyhow::Result<MutexGuard<'_, Dataset>> {
        if let Some(message) = &self.read_failure {
            return Err(StoreError::Injected(message.clone()).into());
        }
        Ok(self.lock()?)
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn unit(&self, unit_id: &str) -> anyhow::Result<Option<Unit>> {
        Ok(self.read()?.unit_record(unit_id).map(|r| r.unit.clone()))
    }

    async fn units_for_subject(&self, subject: &str) -> anyhow::Result<Vec<Unit>> {
        Ok(self.read()?.units_for_subject(subject))
    }

    async fn curriculum(&self, unit_id: &str) -> anyhow::Result<Curriculum> {
        self.read()?.curriculum(unit_id)
    }

    async fn activities(&self, unit_id: &str) -> anyhow::Result<Vec<Activity>> {
        self.read()?.activities_for(unit_id)
    }

    async fn pupils(&self, unit_id: &str) -> anyhow::Result<Vec<Pupil>> {
        self.read()?.pupils_for(unit_id)
    }

    async fn submissions(&self, activity_ids: &[String]) -> anyhow::Result<Vec<Submission>> {
        Ok(self.read()?.submissions_for(activity_ids))
    }

    async fn feedback(&self, pupil_ids: &[String]) -> anyhow::Result<Vec<FeedbackEntry>> {
        Ok(self.read()?.feedback_for(pupil_ids))
    }

    async fn activity(&self, activity_id: &str) -> anyhow::Result<Option<Activity>> {
        Ok(self.read()?.activity(activity_id).cloned())
    }

    async fn save_submission(&self, submission: Submission) -> anyhow::Result<Uuid> {
        if self.rejected_writes.contains(&submission.id) {
            return Err(StoreError::WriteRejected(submission.id).into());
        }
        let id = self.lock()?.upsert_submission(submission);
        self.write_count.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(store = "memory", %id, "saved submission");
        Ok(id)
    }

    async fn append_feedback(&self, draft: FeedbackDraft) -> anyhow::Result<FeedbackEntry> {
        let entry = self.lock()?.append_feedback(draft);
        self.write_count.fetch_add(1, Ordering::Relaxed);
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attainment_core::error::ProgressError;

    #[tokio::test]
    async fn reads_follow_assignment_order() {
        let store = MemoryStore::new(Dataset::sample());
        let activities = store.activities("cells").await.unwrap();
        let ids: Vec<&str> = activities.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["cells-quiz", "diffusion-text", "cells-poster"]);

        let pupils = store.pupils("energy").await.unwrap();
        assert_eq!(pupils.len(), 1);
        assert_eq!(pupils[0].name, "Ada");

        assert!(store.unit("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn injected_read_failure_is_persistence() {
        let store = MemoryStore::new(Dataset::sample()).with_read_failure("connection reset");
        let err = store.units_for_subject("science").await.unwrap_err();
        let classified = ProgressError::from_store(err);
        assert!(matches!(classified, ProgressError::Persistence(ref m) if m.contains("connection reset")));
    }

    #[tokio::test]
    async fn rejected_write_leaves_data_untouched() {
        let data = Dataset::sample();
        let mut target = data.submissions[0].clone();
        let store = MemoryStore::new(data).with_rejected_write(target.id);

        target.body = serde_json::json!({"answer_chosen": "D"});
        assert!(store.save_submission(target).await.is_err());
        assert_eq!(store.write_count(), 0);
        assert_eq!(
            store.snapshot().unwrap().submissions[0].body["answer_chosen"],
            "B"
        );
    }
}
