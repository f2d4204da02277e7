//! "Latest row wins" reduction shared by submissions and feedback.
//!
//! A candidate only replaces the current winner when its key is strictly
//! greater; ties keep whichever row was seen first.

use std::collections::BTreeMap;

/// Return the item with the strictly greatest key.
pub fn latest_by<T, K, F>(items: impl IntoIterator<Item = T>, mut key: F) -> Option<T>
where
    K: Ord,
    F: FnMut(&T) -> K,
{
    let mut best: Option<(K, T)> = None;
    for item in items {
        let k = key(&item);
        let replace = match &best {
            Some((current, _)) => k > *current,
            None => true,
        };
        if replace {
            best = Some((k, item));
        }
    }
    best.map(|(_, item)| item)
}

/// Group items and keep the latest item of each group.
pub fn latest_per_group<T, G, K, FG, FK>(
    items: impl IntoIterator<Item = T>,
    mut group: FG,
    mut key: FK,
) -> BTreeMap<G, T>
where
    G: Ord,
    K: Ord,
    FG: FnMut(&T) -> G,
    FK: FnMut(&T) -> K,
{
    let mut grouped: BTreeMap<G, Vec<T>> = BTreeMap::new();
    for item in items {
        grouped.entry(group(&item)).or_default().push(item);
    }
    grouped
        .into_iter()
        .filter_map(|(g, rows)| latest_by(rows, &mut key).map(|winner| (g, winner)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strictly_greater_replaces() {
        let rows = vec![("a", 1), ("b", 3), ("c", 2)];
        assert_eq!(latest_by(rows, |r| r.1), Some(("b", 3)));
    }

    #[test]
    fn ties_keep_first_seen() {
        let rows = vec![("first", 5), ("second", 5), ("older", 4)];
        assert_eq!(latest_by(rows, |r| r.1), Some(("first", 5)));
    }

    #[test]
    fn empty_input() {
        let rows: Vec<(&str, u32)> = vec![];
        assert_eq!(latest_by(rows, |r| r.1), None);
    }

    #[test]
    fn grouping_keeps_one_winner_per_group() {
        let rows = vec![("x", 1), ("y", 7), ("x", 4), ("y", 2)];
        let winners = latest_per_group(rows, |r| r.0, |r| r.1);
        assert_eq!(winners.len(), 2);
        assert_eq!(winners["x"], ("x", 4));
        assert_eq!(winners["y"], ("y", 7));
    }
}
