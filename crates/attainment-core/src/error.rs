//! Error taxonomy for scoring and aggregation.
//!
//! Stores report failures as `anyhow::Error`; the engine downcasts them back
//! to [`ProgressError`] where possible so callers can tell a missing record
//! from a broken backend without string matching.

use thiserror::Error;

/// Errors produced by the attainment core.
#[derive(Debug, Error)]
pub enum ProgressError {
    /// A submission or feedback body had the wrong shape or out-of-range scores.
    #[error("invalid {subject}: {message}")]
    Validation { subject: String, message: String },

    /// A referenced pupil, activity, unit or curriculum row is absent.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The storage collaborator failed to fetch or write.
    #[error("storage failure: {0}")]
    Persistence(String),

    /// The caller is not allowed to perform the operation.
    #[error("not authorized: {0}")]
    Authorization(String),
}

impl ProgressError {
    pub fn validation(subject: impl Into<String>, message: impl Into<String>) -> Self {
        ProgressError::Validation {
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        ProgressError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Returns `true` if this error must abort a whole aggregation request.
    ///
    /// Validation failures on a single submission are absorbed by the
    /// resolver instead.
    pub fn is_fail_closed(&self) -> bool {
        matches!(
            self,
            ProgressError::NotFound { .. } | ProgressError::Persistence(_)
        )
    }

    /// Classify an error returned by a store.
    pub fn from_store(err: anyhow::Error) -> Self {
        match err.downcast::<ProgressError>() {
            Ok(classified) => classified,
            Err(other) => ProgressError::Persistence(format!("{other:#}")),
        }
    }
}

/// Result alias used throughout the core.
pub type Result<T> = std::result::Result<T, ProgressError>;

/// Check that a score lies in the closed unit interval.
pub fn check_unit_score(subject: &str, field: &str, value: f64) -> Result<f64> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ProgressError::validation(
            subject,
            format!("{field} must be within [0, 1], got {value}"),
        ))
    }
}
