//! Level deriver: working levels and assessment level labels.

use std::collections::BTreeMap;

use crate::traits::LevelLabelLookup;

/// Label used when a unit has no assessment average to look up.
pub const NOT_ESTABLISHED: &str = "not established";

/// Fraction of positive-feedback criteria per level bucket.
///
/// Input pairs are `(level, has_positive_feedback)`, one per criterion.
pub fn positive_fractions<I>(criteria: I) -> BTreeMap<u8, f64>
where
    I: IntoIterator<Item = (u8, bool)>,
{
    let mut counts: BTreeMap<u8, (usize, usize)> = BTreeMap::new();
    for (level, positive) in criteria {
        let (total, hits) = counts.entry(level).or_default();
        *total += 1;
        if positive {
            *hits += 1;
        }
    }
    counts
        .into_iter()
        .map(|(level, (total, hits))| (level, hits as f64 / total as f64))
        .collect()
}

/// Highest level whose positive fraction exceeds `threshold`.
///
/// Buckets are scanned in ascending order and every qualifying bucket
/// replaces the candidate, so a qualifying low level never hides a
/// qualifying higher one.
pub fn working_level(fractions: &BTreeMap<u8, f64>, threshold: f64) -> Option<u8> {
    let mut candidate = None;
    for (&level, &fraction) in fractions {
        if fraction > threshold {
            candidate = Some(level);
        }
    }
    candidate
}

/// Human-readable label for a unit's assessment average.
pub fn assessment_level_label(
    lookup: &dyn LevelLabelLookup,
    year: i32,
    assessment_average: Option<f64>,
) -> String {
    match assessment_average {
        Some(avg) => lookup.label(year, avg),
        None => NOT_ESTABLISHED.to_string(),
    }
}
