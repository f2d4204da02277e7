//! Averaging and mode helpers shared by every rollup level.
//!
//! Contributors without a numeric value are skipped, never zero-filled, and
//! an empty input has no average at all.

use std::collections::BTreeMap;

/// Mean of the present values; `None` when nothing is present.
pub fn mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for v in values.into_iter().flatten() {
        sum += v;
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Most frequent value; ties go to the numerically higher value.
pub fn mode_prefer_higher<I>(values: I) -> Option<u8>
where
    I: IntoIterator<Item = u8>,
{
    let mut tally: BTreeMap<u8, usize> = BTreeMap::new();
    for v in values {
        *tally.entry(v).or_default() += 1;
    }
    // Ascending key order plus `>=` lets a later (higher) level win ties.
    let mut best: Option<(u8, usize)> = None;
    for (level, count) in tally {
        match best {
            Some((_, best_count)) if count < best_count => {}
            _ => best = Some((level, count)),
        }
    }
    best.map(|(level, _)| level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_skips_missing_values() {
        assert_eq!(mean([Some(1.0), None, Some(0.0)]), Some(0.5));
    }

    #[test]
    fn mean_of_nothing_is_none() {
        assert_eq!(mean(Vec::<Option<f64>>::new()), None);
        assert_eq!(mean([None, None]), None);
    }

    #[test]
    fn zero_is_a_value() {
        assert_eq!(mean([Some(0.0)]), Some(0.0));
    }

    #[test]
    fn mode_basic() {
        assert_eq!(mode_prefer_higher([2, 3, 2, 1]), Some(2));
    }

    #[test]
    fn mode_tie_prefers_higher_level() {
        assert_eq!(mode_prefer_higher([1, 3, 3, 1, 2]), Some(3));
        assert_eq!(mode_prefer_higher([4, 2]), Some(4));
    }

    #[test]
    fn mode_of_nothing_is_none() {
        assert_eq!(mode_prefer_higher(Vec::new()), None);
    }
}
