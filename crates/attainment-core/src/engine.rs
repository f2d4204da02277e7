//! Central progress engine orchestrator.
//!
//! Fetches a read-only snapshot through a [`ProgressStore`] and turns it into
//! unit and subject reports. Fetching is the only async part; building
//! reports is a pure function of the snapshot.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::Instrument;

use crate::config::ScoringConfig;
use crate::error::{ProgressError, Result};
use crate::feedback::FeedbackIndex;
use crate::model::{Activity, Curriculum, FeedbackEntry, Pupil, Submission, Unit};
use crate::report::{PupilUnitReport, SubjectReport, UnitReport};
use crate::resolver::CellMatrix;
use crate::rollup::{build_subject_summary, build_unit_summary, UnitContext};
use crate::trace::TraceContext;
use crate::traits::{LevelLabelLookup, ProgressStore};

/// Everything needed to report on one unit, fetched up front.
#[derive(Debug, Clone)]
pub struct UnitSnapshot {
    pub unit: Unit,
    pub curriculum: Curriculum,
    pub activities: Vec<Activity>,
    pub pupils: Vec<Pupil>,
    pub submissions: Vec<Submission>,
    pub feedback: Vec<FeedbackEntry>,
}

impl UnitSnapshot {
    /// Fail on the first dangling curriculum reference.
    pub fn check(&self) -> Result<()> {
        match self.curriculum.dangling_references().into_iter().next() {
            Some((kind, id)) => Err(ProgressError::not_found(kind, id)),
            None => Ok(()),
        }
    }

    pub fn pupil(&self, pupil_id: &str) -> Option<&Pupil> {
        self.pupils.iter().find(|p| p.id == pupil_id)
    }
}

/// The central progress engine.
pub struct ProgressEngine {
    store: Arc<dyn ProgressStore>,
    lookup: Arc<dyn LevelLabelLookup>,
    config: ScoringConfig,
}

impl ProgressEngine {
    pub fn new(
        store: Arc<dyn ProgressStore>,
        lookup: Arc<dyn LevelLabelLookup>,
        config: ScoringConfig,
    ) -> Self {
        Self {
            store,
            lookup,
            config,
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ProgressStore> {
        &self.store
    }

    /// Fetch a unit snapshot. Any missing record or store failure aborts the
    /// whole load; no partial snapshot is returned.
    pub async fn load_unit_snapshot(
        &self,
        ctx: &TraceContext,
        unit_id: &str,
    ) -> Result<UnitSnapshot> {
        let store = self.store.as_ref();
        async move {
            let unit = store
                .unit(unit_id)
                .await
                .map_err(ProgressError::from_store)?
                .ok_or_else(|| ProgressError::not_found("unit", unit_id))?;

            let (curriculum, activities, pupils) = futures::try_join!(
                store.curriculum(unit_id),
                store.activities(unit_id),
                store.pupils(unit_id),
            )
            .map_err(ProgressError::from_store)?;

            let activity_ids: Vec<String> = activities.iter().map(|a| a.id.clone()).collect();
            let pupil_ids: Vec<String> = pupils.iter().map(|p| p.id.clone()).collect();
            let (submissions, feedback) = futures::try_join!(
                store.submissions(&activity_ids),
                store.feedback(&pupil_ids),
            )
            .map_err(ProgressError::from_store)?;

            let snapshot = UnitSnapshot {
                unit,
                curriculum,
                activities,
                pupils,
                submissions,
                feedback,
            };
            snapshot.check()?;

            tracing::info!(
                store = store.name(),
                unit_id,
                activities = snapshot.activities.len(),
                pupils = snapshot.pupils.len(),
                submissions = snapshot.submissions.len(),
                feedback = snapshot.feedback.len(),
                "loaded unit snapshot"
            );
            Ok(snapshot)
        }
        .instrument(ctx.span().clone())
        .await
        .inspect_err(|e| {
            tracing::error!(parent: ctx.span(), unit_id, "snapshot load failed: {e}");
        })
    }

    /// Build a unit report from an already loaded snapshot.
    ///
    /// With `pupil_id` set, only that pupil is reported; an unassigned pupil
    /// is a `NotFound` error.
    pub fn build_unit_report(
        &self,
        ctx: &TraceContext,
        snapshot: &UnitSnapshot,
        pupil_id: Option<&str>,
    ) -> Result<UnitReport> {
        let _entered = ctx.span().enter();

        let pupils: Vec<Pupil> = match pupil_id {
            Some(id) => vec![snapshot
                .pupil(id)
                .cloned()
                .ok_or_else(|| ProgressError::not_found("pupil", id))?],
            None => snapshot.pupils.clone(),
        };

        let feedback = FeedbackIndex::reconcile(&snapshot.feedback);
        let matrix = CellMatrix::build(
            ctx,
            &snapshot.activities,
            &pupils,
            &snapshot.submissions,
            &feedback,
            &self.config,
        );

        let unit_ctx = UnitContext {
            unit: &snapshot.unit,
            curriculum: &snapshot.curriculum,
            lookup: self.lookup.as_ref(),
            config: &self.config,
        };

        let rows: Vec<PupilUnitReport> = pupils
            .into_iter()
            .map(|pupil| {
                let cells = matrix.pupil(&pupil.id).to_vec();
                let summary = build_unit_summary(&unit_ctx, &pupil.id, &cells, &feedback);
                PupilUnitReport {
                    pupil,
                    cells,
                    summary,
                }
            })
            .collect();

        tracing::info!(
            unit_id = %snapshot.unit.id,
            pupils = rows.len(),
            needs_marking = matrix.needs_marking_count(),
            "built unit report"
        );

        Ok(UnitReport {
            id: ctx.request_id(),
            created_at: chrono::Utc::now(),
            unit: snapshot.unit.clone(),
            pupils: rows,
        })
    }

    /// Load and report on one unit.
    pub async fn unit_report(
        &self,
        ctx: &TraceContext,
        unit_id: &str,
        pupil_id: Option<&str>,
    ) -> Result<UnitReport> {
        let snapshot = self.load_unit_snapshot(ctx, unit_id).await?;
        self.build_unit_report(ctx, &snapshot, pupil_id)
    }

    /// Report on one pupil across every unit of a subject.
    ///
    /// Units the pupil is not assigned to are skipped; a pupil assigned to
    /// none of them is a `NotFound` error.
    pub async fn subject_report(
        &self,
        ctx: &TraceContext,
        subject: &str,
        pupil_id: &str,
    ) -> Result<SubjectReport> {
        let units = self
            .store
            .units_for_subject(subject)
            .await
            .map_err(ProgressError::from_store)?;
        if units.is_empty() {
            return Err(ProgressError::not_found("subject", subject));
        }

        let snapshots = try_join_all(
            units
                .iter()
                .map(|unit| self.load_unit_snapshot(ctx, &unit.id)),
        )
        .await?;

        let mut unit_summaries = Vec::new();
        for snapshot in snapshots.iter().filter(|s| s.pupil(pupil_id).is_some()) {
            let report = self.build_unit_report(ctx, snapshot, Some(pupil_id))?;
            unit_summaries.extend(report.pupils.into_iter().map(|row| row.summary));
        }
        if unit_summaries.is_empty() {
            return Err(ProgressError::not_found("pupil", pupil_id));
        }

        let summary = build_subject_summary(subject, pupil_id, &unit_summaries);
        tracing::info!(
            parent: ctx.span(),
            subject,
            pupil_id,
            units = unit_summaries.len(),
            working_level = ?summary.working_level,
            "built subject report"
        );

        Ok(SubjectReport {
            id: ctx.request_id(),
            created_at: chrono::Utc::now(),
            summary,
            units: unit_summaries,
        })
    }
}
