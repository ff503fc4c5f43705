//! Majority vote over per-row class predictions.

use std::collections::BTreeMap;

/// Statistical mode of `predictions`.
///
/// Ties resolve to the lowest class index. Returns `None` for an empty slice.
pub fn majority_vote(predictions: &[usize]) -> Option<usize> {
    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    for &class in predictions {
        *counts.entry(class).or_insert(0) += 1;
    }
    // Ascending class order: the first class to reach the top count wins.
    let mut best: Option<(usize, usize)> = None;
    for (class, count) in counts {
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((class, count)),
        }
    }
    best.map(|(class, _)| class)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_most_frequent_class() {
        assert_eq!(majority_vote(&[0, 0, 1, 0]), Some(0));
        assert_eq!(majority_vote(&[1, 1, 0]), Some(1));
        assert_eq!(majority_vote(&[1]), Some(1));
    }

    #[test]
    fn ties_resolve_to_lowest_class() {
        assert_eq!(majority_vote(&[0, 1]), Some(0));
        assert_eq!(majority_vote(&[1, 0]), Some(0));
        assert_eq!(majority_vote(&[3, 1, 3, 1, 2]), Some(1));
    }

    #[test]
    fn empty_has_no_vote() {
        assert_eq!(majority_vote(&[]), None);
    }
}
